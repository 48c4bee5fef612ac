// ==========================================
// 选课席位分配系统 - 命令行入口
// ==========================================
// 用法:
//   course-alloc <db_path> run <term>
//   course-alloc <db_path> reset <term>
//   course-alloc <db_path> preview <term>
//   course-alloc <db_path> report <term>
// 结果以 JSON 打印到标准输出; COURSE_ALLOC_LOG_FORMAT=json 时日志为 JSON 行
// ==========================================

use anyhow::{bail, Context, Result};
use course_alloc::engine::CancellationFlag;
use course_alloc::{logging, SimulationApi};
use serde::Serialize;

const USAGE: &str = "usage: course-alloc <db_path> <run|reset|preview|report> <term>";

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("COURSE_ALLOC_LOG_FORMAT").as_deref() == Ok("json") {
        logging::init_json();
    } else {
        logging::init();
    }

    let mut args = std::env::args().skip(1);
    let db_path = args.next().context(USAGE)?;
    let command = args.next().context(USAGE)?;
    let term = args
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .context(USAGE)?;

    tracing::info!(
        version = course_alloc::VERSION,
        db_path = %db_path,
        command = %command,
        term = %term,
        "{}",
        course_alloc::APP_NAME
    );

    let api = SimulationApi::open(&db_path).context("无法打开数据库")?;

    match command.as_str() {
        "run" => {
            let cancel = CancellationFlag::new();
            let ctrl_c_flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c_flag.cancel();
                }
            });
            let outcome = api.run_simulation(&term, &cancel).await?;
            print_json(&outcome.metrics)
        }
        "reset" => print_json(&api.reset_latest(&term)?),
        "preview" => print_json(&api.preview(&term).await?),
        "report" => print_json(&api.latest_report(&term)?),
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }
}
