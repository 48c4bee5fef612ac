// ==========================================
// 选课席位分配系统 - 运行记录仓储
// ==========================================
// 职责: simulation_metrics / simulation_results / simulation_checkpoint 表的读写
// commit: 检查点、分配变更、优先级分数、指标与结果行在同一事务内落库
// reset: 按检查点回退一次运行（单事务,仅限该学期最新一次未回退的运行）
//   - 席位计数恢复为运行前值
//   - 删除该运行创建的注册
//   - 清空全部候补记录
//   - 该运行处理过的申请回到 pending
// ==========================================

use crate::domain::simulation::{RunCheckpoint, SimulationMetrics, SimulationResult};
use crate::domain::student::Student;
use crate::engine::orchestrator::ResetSummary;
use crate::repository::codec::{
    parse_json, parse_optional_timestamp, parse_timestamp, timestamp_text,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::request_repo::{AllocationWriteSet, PersistSummary, RequestRepository};
use crate::repository::student_repo::StudentRepository;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

const METRICS_COLUMNS: &str = r#"
    simulation_id, term, total_students, total_courses, total_requests,
    total_approved, total_rejected,
    rejected_quota, rejected_conflict, rejected_prerequisite, rejected_other,
    courses_full, total_waitlist, avg_courses_per_student, avg_approval_rate,
    processing_time_seconds, started_at, completed_at
"#;

// ==========================================
// RunCommit - 一次运行要在同一事务内落库的全部内容
// ==========================================
pub struct RunCommit<'a> {
    pub checkpoint: &'a RunCheckpoint,
    pub allocation: AllocationWriteSet<'a>,
    pub students: &'a [Student],
    pub metrics: &'a SimulationMetrics,
    pub results: &'a [SimulationResult],
}

/// 运行落库统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCommitSummary {
    pub allocation: PersistSummary,
    pub students_scored: usize,
    pub results_saved: usize,
}

// ==========================================
// SimulationRepository - 运行记录仓储
// ==========================================
pub struct SimulationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SimulationRepository {
    /// 创建新的 SimulationRepository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_metrics(row: &Row<'_>) -> SqliteResult<SimulationMetrics> {
        Ok(SimulationMetrics {
            simulation_id: row.get(0)?,
            term: row.get(1)?,
            total_students: row.get(2)?,
            total_courses: row.get(3)?,
            total_requests: row.get(4)?,
            total_approved: row.get(5)?,
            total_rejected: row.get(6)?,
            rejected_quota: row.get(7)?,
            rejected_conflict: row.get(8)?,
            rejected_prerequisite: row.get(9)?,
            rejected_other: row.get(10)?,
            courses_full: row.get(11)?,
            total_waitlist: row.get(12)?,
            avg_courses_per_student: row.get(13)?,
            avg_approval_rate: row.get(14)?,
            processing_time_seconds: row.get(15)?,
            started_at: parse_timestamp(16, &row.get::<_, String>(16)?)?,
            completed_at: parse_optional_timestamp(17, row.get(17)?)?,
        })
    }

    fn map_result(row: &Row<'_>) -> SqliteResult<SimulationResult> {
        Ok(SimulationResult {
            simulation_id: row.get(0)?,
            student_id: row.get(1)?,
            requested_courses: row.get(2)?,
            approved_courses: row.get(3)?,
            rejected_courses: row.get(4)?,
            waitlisted_courses: row.get(5)?,
            cause_tally: parse_json(6, &row.get::<_, String>(6)?)?,
            rejection_details: parse_json(7, &row.get::<_, String>(7)?)?,
            priority_score_at_simulation: row.get(8)?,
        })
    }

    fn map_checkpoint(row: &Row<'_>) -> SqliteResult<RunCheckpoint> {
        Ok(RunCheckpoint {
            simulation_id: row.get(0)?,
            term: row.get(1)?,
            enrolled_counts: parse_json(2, &row.get::<_, String>(2)?)?,
            processed_request_ids: parse_json(3, &row.get::<_, String>(3)?)?,
            config_snapshot_json: row.get(4)?,
        })
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 保存运行指标与学生结果行（单事务）
    #[instrument(skip(self, metrics, results), fields(
        simulation_id = %metrics.simulation_id,
        results_count = results.len()
    ))]
    pub fn save_run(
        &self,
        metrics: &SimulationMetrics,
        results: &[SimulationResult],
    ) -> RepositoryResult<()> {
        // 序列化在加锁前完成
        let encoded = Self::encode_results(results)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        Self::write_run(&tx, metrics, results, &encoded)?;
        tx.commit()?;
        Ok(())
    }

    fn encode_results(results: &[SimulationResult]) -> RepositoryResult<Vec<(String, String)>> {
        let mut encoded = Vec::with_capacity(results.len());
        for result in results {
            encoded.push((
                serde_json::to_string(&result.cause_tally)?,
                serde_json::to_string(&result.rejection_details)?,
            ));
        }
        Ok(encoded)
    }

    fn write_run(
        tx: &Connection,
        metrics: &SimulationMetrics,
        results: &[SimulationResult],
        encoded: &[(String, String)],
    ) -> RepositoryResult<()> {
        tx.execute(
            &format!(
                "INSERT INTO simulation_metrics ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                METRICS_COLUMNS
            ),
            params![
                metrics.simulation_id,
                metrics.term,
                metrics.total_students,
                metrics.total_courses,
                metrics.total_requests,
                metrics.total_approved,
                metrics.total_rejected,
                metrics.rejected_quota,
                metrics.rejected_conflict,
                metrics.rejected_prerequisite,
                metrics.rejected_other,
                metrics.courses_full,
                metrics.total_waitlist,
                metrics.avg_courses_per_student,
                metrics.avg_approval_rate,
                metrics.processing_time_seconds,
                timestamp_text(&metrics.started_at),
                metrics.completed_at.as_ref().map(timestamp_text),
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO simulation_results (
                    simulation_id, student_id, requested_courses, approved_courses,
                    rejected_courses, waitlisted_courses, cause_tally_json,
                    rejection_details_json, priority_score_at_simulation
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )?;
            for (result, (tally_json, details_json)) in results.iter().zip(encoded.iter()) {
                stmt.execute(params![
                    result.simulation_id,
                    result.student_id,
                    result.requested_courses,
                    result.approved_courses,
                    result.rejected_courses,
                    result.waitlisted_courses,
                    tally_json,
                    details_json,
                    result.priority_score_at_simulation,
                ])?;
            }
        }
        Ok(())
    }

    /// 保存运行检查点
    pub fn save_checkpoint(&self, checkpoint: &RunCheckpoint) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::write_checkpoint(&conn, checkpoint)
    }

    fn write_checkpoint(tx: &Connection, checkpoint: &RunCheckpoint) -> RepositoryResult<()> {
        let counts_json = serde_json::to_string(&checkpoint.enrolled_counts)?;
        let ids_json = serde_json::to_string(&checkpoint.processed_request_ids)?;

        tx.execute(
            r#"
            INSERT INTO simulation_checkpoint (
                simulation_id, term, enrolled_counts_json, processed_request_ids_json,
                config_snapshot_json, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                checkpoint.simulation_id,
                checkpoint.term,
                counts_json,
                ids_json,
                checkpoint.config_snapshot_json,
                timestamp_text(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// 一次运行的全部落库（单事务）
    ///
    /// 顺序: 检查点 → 分配变更 → 优先级分数 → 指标与结果行。
    /// 任一步失败整个事务回滚,数据库保持运行前状态。
    ///
    /// # 返回
    /// - Ok(RunCommitSummary): 各表写入行数
    #[instrument(skip(self, run), fields(simulation_id = %run.checkpoint.simulation_id))]
    pub fn commit_run(&self, run: &RunCommit<'_>) -> RepositoryResult<RunCommitSummary> {
        let encoded = Self::encode_results(run.results)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        Self::write_checkpoint(&tx, run.checkpoint)?;
        let allocation = RequestRepository::write_allocation(&tx, &run.allocation)?;
        let students_scored = StudentRepository::write_priority_scores(&tx, run.students)?;
        Self::write_run(&tx, run.metrics, run.results, &encoded)?;

        tx.commit()?;
        Ok(RunCommitSummary {
            allocation,
            students_scored,
            results_saved: run.results.len(),
        })
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按运行ID查询指标
    pub fn find_metrics(&self, simulation_id: &str) -> RepositoryResult<Option<SimulationMetrics>> {
        let conn = self.get_conn()?;
        let metrics = conn
            .query_row(
                &format!(
                    "SELECT {} FROM simulation_metrics WHERE simulation_id = ?1",
                    METRICS_COLUMNS
                ),
                params![simulation_id],
                Self::map_metrics,
            )
            .optional()?;
        Ok(metrics)
    }

    /// 某学期最近一次运行
    pub fn latest_by_term(&self, term: &str) -> RepositoryResult<Option<SimulationMetrics>> {
        let conn = self.get_conn()?;
        let metrics = conn
            .query_row(
                &format!(
                    "SELECT {} FROM simulation_metrics WHERE term = ?1 ORDER BY started_at DESC, rowid DESC LIMIT 1",
                    METRICS_COLUMNS
                ),
                params![term],
                Self::map_metrics,
            )
            .optional()?;
        Ok(metrics)
    }

    /// 全部运行（最近的在前）
    pub fn list_all(&self) -> RepositoryResult<Vec<SimulationMetrics>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM simulation_metrics ORDER BY started_at DESC, rowid DESC",
            METRICS_COLUMNS
        ))?;
        let all = stmt
            .query_map([], Self::map_metrics)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(all)
    }

    /// 一次运行的学生结果行（按优先级分数降序,学号升序）
    pub fn find_results(&self, simulation_id: &str) -> RepositoryResult<Vec<SimulationResult>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT simulation_id, student_id, requested_courses, approved_courses,
                   rejected_courses, waitlisted_courses, cause_tally_json,
                   rejection_details_json, priority_score_at_simulation
            FROM simulation_results
            WHERE simulation_id = ?1
            ORDER BY priority_score_at_simulation DESC, student_id ASC
            "#,
        )?;
        let results = stmt
            .query_map(params![simulation_id], Self::map_result)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(results)
    }

    /// 一次运行中某个学生的结果行
    pub fn find_student_result(
        &self,
        simulation_id: &str,
        student_id: &str,
    ) -> RepositoryResult<Option<SimulationResult>> {
        let conn = self.get_conn()?;
        let result = conn
            .query_row(
                r#"
                SELECT simulation_id, student_id, requested_courses, approved_courses,
                       rejected_courses, waitlisted_courses, cause_tally_json,
                       rejection_details_json, priority_score_at_simulation
                FROM simulation_results
                WHERE simulation_id = ?1 AND student_id = ?2
                "#,
                params![simulation_id, student_id],
                Self::map_result,
            )
            .optional()?;
        Ok(result)
    }

    /// 按运行ID查询检查点
    pub fn find_checkpoint(&self, simulation_id: &str) -> RepositoryResult<Option<RunCheckpoint>> {
        let conn = self.get_conn()?;
        let checkpoint = conn
            .query_row(
                r#"
                SELECT simulation_id, term, enrolled_counts_json, processed_request_ids_json,
                       config_snapshot_json
                FROM simulation_checkpoint
                WHERE simulation_id = ?1
                "#,
                params![simulation_id],
                Self::map_checkpoint,
            )
            .optional()?;
        Ok(checkpoint)
    }

    /// 某学期最近一次尚未回退的检查点
    pub fn latest_active_checkpoint(&self, term: &str) -> RepositoryResult<Option<RunCheckpoint>> {
        let conn = self.get_conn()?;
        let checkpoint = conn
            .query_row(
                r#"
                SELECT simulation_id, term, enrolled_counts_json, processed_request_ids_json,
                       config_snapshot_json
                FROM simulation_checkpoint
                WHERE term = ?1 AND reset_at IS NULL
                ORDER BY created_at DESC, rowid DESC
                LIMIT 1
                "#,
                params![term],
                Self::map_checkpoint,
            )
            .optional()?;
        Ok(checkpoint)
    }

    // ==========================================
    // reset
    // ==========================================

    /// 按检查点回退一次运行（单事务）
    ///
    /// # 返回
    /// - Ok(ResetSummary): 各表影响行数
    /// - Err(NotFound): 检查点不存在
    /// - Err(ValidationError): 检查点已回退过,或同学期还有更新的未回退运行
    #[instrument(skip(self))]
    pub fn reset_run(&self, simulation_id: &str) -> RepositoryResult<ResetSummary> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let row: Option<(String, String, String, Option<String>)> = tx
            .query_row(
                r#"
                SELECT term, enrolled_counts_json, processed_request_ids_json, reset_at
                FROM simulation_checkpoint
                WHERE simulation_id = ?1
                "#,
                params![simulation_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let (term, counts_json, ids_json, reset_at) =
            row.ok_or_else(|| RepositoryError::not_found("simulation_checkpoint", simulation_id))?;
        if reset_at.is_some() {
            return Err(RepositoryError::ValidationError(format!(
                "运行 {} 已经回退过",
                simulation_id
            )));
        }

        // 只有本学期最新一次未回退的运行可以回退
        let latest: Option<String> = tx
            .query_row(
                r#"
                SELECT simulation_id
                FROM simulation_checkpoint
                WHERE term = ?1 AND reset_at IS NULL
                ORDER BY created_at DESC, rowid DESC
                LIMIT 1
                "#,
                params![term],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(latest) = latest.filter(|id| id != simulation_id) {
            return Err(RepositoryError::ValidationError(format!(
                "运行 {} 之后还有未回退的运行 {},需先回退后者",
                simulation_id, latest
            )));
        }

        let counts: BTreeMap<String, u32> = serde_json::from_str(&counts_json)?;
        let request_ids: Vec<i64> = serde_json::from_str(&ids_json)?;

        let mut summary = ResetSummary {
            simulation_id: simulation_id.to_string(),
            ..Default::default()
        };

        {
            let mut stmt = tx.prepare(
                "UPDATE courses SET enrolled_count = ?1, is_open = (?1 < quota) WHERE code = ?2",
            )?;
            for (code, count) in &counts {
                summary.courses_restored += stmt.execute(params![count, code])?;
            }
        }

        summary.enrollments_removed = tx.execute(
            "DELETE FROM enrollments WHERE simulation_id = ?1",
            params![simulation_id],
        )?;

        summary.waitlist_removed = tx.execute("DELETE FROM waitlist", [])?;

        {
            let mut stmt = tx.prepare(
                r#"
                UPDATE course_requests
                SET status = 'pending', rejection_cause = NULL, rejection_reason = NULL,
                    processed_at = NULL
                WHERE request_id = ?1 AND status != 'pending'
                "#,
            )?;
            for id in &request_ids {
                summary.requests_reverted += stmt.execute(params![id])?;
            }
        }

        tx.execute(
            "UPDATE simulation_checkpoint SET reset_at = ?1 WHERE simulation_id = ?2",
            params![timestamp_text(&Utc::now()), simulation_id],
        )?;

        tx.commit()?;
        info!(
            courses_restored = summary.courses_restored,
            enrollments_removed = summary.enrollments_removed,
            waitlist_removed = summary.waitlist_removed,
            requests_reverted = summary.requests_reverted,
            "运行已回退"
        );
        Ok(summary)
    }
}
