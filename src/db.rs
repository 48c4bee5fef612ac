// ==========================================
// 选课席位分配系统 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 提供幂等建表,测试与命令行共用同一套 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建表（幂等）
///
/// 说明：
/// - 所有表使用 IF NOT EXISTS,可在已有库上重复调用
/// - 写入 CURRENT_SCHEMA_VERSION（已存在则忽略）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

-- ===== 学生与成绩单 =====
CREATE TABLE IF NOT EXISTS students (
    student_id TEXT PRIMARY KEY,
    class_level INTEGER NOT NULL,
    gpa REAL NOT NULL,
    remaining_courses INTEGER NOT NULL DEFAULT 0,
    special_status TEXT NOT NULL DEFAULT 'none',
    is_active INTEGER NOT NULL DEFAULT 1,
    is_admin INTEGER NOT NULL DEFAULT 0,
    priority_score REAL NOT NULL DEFAULT 0,
    score_updated_at TEXT
);

CREATE TABLE IF NOT EXISTS completed_courses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT NOT NULL REFERENCES students(student_id),
    course_code TEXT NOT NULL,
    grade TEXT NOT NULL,
    credit INTEGER NOT NULL DEFAULT 0,
    term TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_completed_student ON completed_courses(student_id);

-- ===== 课程目录 =====
CREATE TABLE IF NOT EXISTS courses (
    code TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    credit INTEGER NOT NULL DEFAULT 0,
    course_type TEXT NOT NULL DEFAULT 'elective',
    is_active INTEGER NOT NULL DEFAULT 1,
    quota INTEGER NOT NULL,
    enrolled_count INTEGER NOT NULL DEFAULT 0,
    is_open INTEGER NOT NULL DEFAULT 1,
    CHECK (enrolled_count >= 0 AND enrolled_count <= quota)
);

CREATE TABLE IF NOT EXISTS course_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_code TEXT NOT NULL REFERENCES courses(code),
    day TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    room TEXT
);
CREATE INDEX IF NOT EXISTS idx_sessions_course ON course_sessions(course_code);

-- required_code 不加外键: 原始先修数据可能引用已下线课程
CREATE TABLE IF NOT EXISTS prerequisites (
    course_code TEXT NOT NULL REFERENCES courses(code),
    required_code TEXT NOT NULL,
    min_grade TEXT NOT NULL DEFAULT 'DD',
    kind TEXT NOT NULL DEFAULT 'required',
    PRIMARY KEY (course_code, required_code)
);

-- ===== 申请 / 注册 / 候补 =====
CREATE TABLE IF NOT EXISTS course_requests (
    request_id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT NOT NULL REFERENCES students(student_id),
    course_code TEXT NOT NULL REFERENCES courses(code),
    rank INTEGER NOT NULL,
    is_mandatory INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    rejection_cause TEXT,
    rejection_reason TEXT,
    processed_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (student_id, course_code)
);

CREATE TABLE IF NOT EXISTS enrollments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT NOT NULL REFERENCES students(student_id),
    course_code TEXT NOT NULL REFERENCES courses(code),
    term TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'approved',
    simulation_id TEXT,
    enrolled_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_enrollment_approved
    ON enrollments(student_id, course_code, term) WHERE status = 'approved';

CREATE TABLE IF NOT EXISTS waitlist (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT NOT NULL REFERENCES students(student_id),
    course_code TEXT NOT NULL REFERENCES courses(code),
    position INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'waiting',
    simulation_id TEXT,
    added_at TEXT NOT NULL,
    UNIQUE (student_id, course_code)
);

-- ===== 运行记录 =====
CREATE TABLE IF NOT EXISTS simulation_metrics (
    simulation_id TEXT PRIMARY KEY,
    term TEXT NOT NULL,
    total_students INTEGER NOT NULL,
    total_courses INTEGER NOT NULL,
    total_requests INTEGER NOT NULL,
    total_approved INTEGER NOT NULL,
    total_rejected INTEGER NOT NULL,
    rejected_quota INTEGER NOT NULL,
    rejected_conflict INTEGER NOT NULL,
    rejected_prerequisite INTEGER NOT NULL,
    rejected_other INTEGER NOT NULL,
    courses_full INTEGER NOT NULL,
    total_waitlist INTEGER NOT NULL,
    avg_courses_per_student REAL NOT NULL,
    avg_approval_rate REAL NOT NULL,
    processing_time_seconds REAL NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS simulation_results (
    simulation_id TEXT NOT NULL REFERENCES simulation_metrics(simulation_id) ON DELETE CASCADE,
    student_id TEXT NOT NULL,
    requested_courses INTEGER NOT NULL,
    approved_courses INTEGER NOT NULL,
    rejected_courses INTEGER NOT NULL,
    waitlisted_courses INTEGER NOT NULL,
    cause_tally_json TEXT NOT NULL,
    rejection_details_json TEXT NOT NULL,
    priority_score_at_simulation REAL NOT NULL,
    PRIMARY KEY (simulation_id, student_id)
);

CREATE TABLE IF NOT EXISTS simulation_checkpoint (
    simulation_id TEXT PRIMARY KEY,
    term TEXT NOT NULL,
    enrolled_counts_json TEXT NOT NULL,
    processed_request_ids_json TEXT NOT NULL,
    config_snapshot_json TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    reset_at TEXT
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_course_seat_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO courses (code, name, quota, enrolled_count) VALUES ('X1', 'X', 1, 2)",
            [],
        );
        assert!(result.is_err());
    }
}
