// ==========================================
// 选课席位分配系统 - 申请 / 注册 / 候补 数据仓储
// ==========================================
// 职责: course_requests / enrollments / waitlist 表的读写
// 红线: 一次运行的结果（席位计数、申请状态、新注册、候补）必须在同一事务内落库
// ==========================================

use crate::domain::course::Course;
use crate::domain::request::{CourseRequest, Enrollment, WaitlistEntry};
use crate::repository::codec::{
    parse_optional_text, parse_optional_timestamp, parse_text, parse_timestamp, timestamp_text,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

// ==========================================
// AllocationWriteSet - 一次运行要落库的变更
// ==========================================
pub struct AllocationWriteSet<'a> {
    pub simulation_id: &'a str,
    pub courses: Vec<&'a Course>,
    pub requests: Vec<&'a CourseRequest>,
    pub enrollments: Vec<&'a Enrollment>,
    pub waitlist: Vec<&'a WaitlistEntry>,
}

/// 落库统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistSummary {
    pub courses_updated: usize,
    pub requests_updated: usize,
    pub enrollments_inserted: usize,
    pub waitlist_inserted: usize,
}

// ==========================================
// RequestRepository - 申请仓储
// ==========================================
pub struct RequestRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RequestRepository {
    /// 创建新的 RequestRepository 实例
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

    fn map_request(row: &Row<'_>) -> SqliteResult<CourseRequest> {
        Ok(CourseRequest {
            request_id: row.get(0)?,
            student_id: row.get(1)?,
            course_code: row.get(2)?,
            rank: row.get(3)?,
            is_mandatory: row.get(4)?,
            status: parse_text(5, &row.get::<_, String>(5)?)?,
            rejection_cause: parse_optional_text(6, row.get(6)?)?,
            rejection_reason: row.get(7)?,
            processed_at: parse_optional_timestamp(8, row.get(8)?)?,
        })
    }

    fn map_enrollment(row: &Row<'_>) -> SqliteResult<Enrollment> {
        Ok(Enrollment {
            student_id: row.get(0)?,
            course_code: row.get(1)?,
            term: row.get(2)?,
            status: parse_text(3, &row.get::<_, String>(3)?)?,
            simulation_id: row.get(4)?,
            enrolled_at: parse_timestamp(5, &row.get::<_, String>(5)?)?,
        })
    }

    fn map_waitlist(row: &Row<'_>) -> SqliteResult<WaitlistEntry> {
        Ok(WaitlistEntry {
            student_id: row.get(0)?,
            course_code: row.get(1)?,
            position: row.get(2)?,
            status: parse_text(3, &row.get::<_, String>(3)?)?,
            added_at: parse_timestamp(4, &row.get::<_, String>(4)?)?,
        })
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 新增 pending 申请
    ///
    /// # 返回
    /// 数据库分配的 request_id
    pub fn insert_request(
        &self,
        student_id: &str,
        course_code: &str,
        rank: i32,
        is_mandatory: bool,
    ) -> RepositoryResult<i64> {
        if rank < 1 {
            return Err(RepositoryError::field("rank", format!("必须 >= 1, 实际 {}", rank)));
        }
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO course_requests (student_id, course_code, rank, is_mandatory, status)
            VALUES (?1, ?2, ?3, ?4, 'pending')
            "#,
            params![student_id, course_code, rank, is_mandatory],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 新增注册记录（外部导入的已批准课程等）
    pub fn insert_enrollment(&self, enrollment: &Enrollment) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::write_enrollment(&conn, enrollment)?;
        Ok(())
    }

    fn write_enrollment(conn: &Connection, enrollment: &Enrollment) -> SqliteResult<usize> {
        conn.execute(
            r#"
            INSERT INTO enrollments (student_id, course_code, term, status, simulation_id, enrolled_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                enrollment.student_id,
                enrollment.course_code,
                enrollment.term,
                enrollment.status.to_string(),
                enrollment.simulation_id,
                timestamp_text(&enrollment.enrolled_at),
            ],
        )
    }

    /// 落库一次运行的全部变更（单事务）
    ///
    /// - 课程: enrolled_count / is_open
    /// - 申请: status / rejection_cause / rejection_reason / processed_at
    /// - 新注册: 插入
    /// - 候补: 不存在则插入（已有记录保持不变）
    #[instrument(skip(self, write), fields(simulation_id = %write.simulation_id))]
    pub fn persist_allocation(&self, write: &AllocationWriteSet<'_>) -> RepositoryResult<PersistSummary> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let summary = Self::write_allocation(&tx, write)?;
        tx.commit()?;
        Ok(summary)
    }

    /// 在调用方的事务内写入一次运行的分配变更（不提交）
    pub(crate) fn write_allocation(
        tx: &Connection,
        write: &AllocationWriteSet<'_>,
    ) -> RepositoryResult<PersistSummary> {
        let mut summary = PersistSummary::default();

        {
            let mut stmt = tx.prepare(
                "UPDATE courses SET enrolled_count = ?1, is_open = ?2 WHERE code = ?3",
            )?;
            for course in &write.courses {
                summary.courses_updated +=
                    stmt.execute(params![course.enrolled_count, course.is_open, course.code])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                r#"
                UPDATE course_requests
                SET status = ?1, rejection_cause = ?2, rejection_reason = ?3, processed_at = ?4
                WHERE request_id = ?5
                "#,
            )?;
            for request in &write.requests {
                summary.requests_updated += stmt.execute(params![
                    request.status.to_string(),
                    request.rejection_cause.map(|c| c.to_string()),
                    request.rejection_reason,
                    request.processed_at.as_ref().map(timestamp_text),
                    request.request_id,
                ])?;
            }
        }

        for enrollment in &write.enrollments {
            summary.enrollments_inserted += Self::write_enrollment(tx, enrollment)?;
        }

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO waitlist
                    (student_id, course_code, position, status, simulation_id, added_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for entry in &write.waitlist {
                summary.waitlist_inserted += stmt.execute(params![
                    entry.student_id,
                    entry.course_code,
                    entry.position,
                    entry.status.to_string(),
                    write.simulation_id,
                    timestamp_text(&entry.added_at),
                ])?;
            }
        }

        debug!(
            courses_updated = summary.courses_updated,
            requests_updated = summary.requests_updated,
            enrollments_inserted = summary.enrollments_inserted,
            waitlist_inserted = summary.waitlist_inserted,
            "分配变更已写入"
        );
        Ok(summary)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 全部申请（按学号、rank、request_id）
    pub fn list_all(&self) -> RepositoryResult<Vec<CourseRequest>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT request_id, student_id, course_code, rank, is_mandatory,
                   status, rejection_cause, rejection_reason, processed_at
            FROM course_requests
            ORDER BY student_id, rank, request_id
            "#,
        )?;
        let requests = stmt
            .query_map([], Self::map_request)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(requests)
    }

    /// 全部 pending 申请（按学号、rank、request_id）
    pub fn list_pending(&self) -> RepositoryResult<Vec<CourseRequest>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|r| r.is_pending())
            .collect())
    }

    /// 一个学生的申请（按 rank）
    pub fn list_by_student(&self, student_id: &str) -> RepositoryResult<Vec<CourseRequest>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT request_id, student_id, course_code, rank, is_mandatory,
                   status, rejection_cause, rejection_reason, processed_at
            FROM course_requests
            WHERE student_id = ?1
            ORDER BY rank, request_id
            "#,
        )?;
        let requests = stmt
            .query_map(params![student_id], Self::map_request)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(requests)
    }

    /// 某学期的全部注册记录（插入顺序）
    pub fn list_enrollments(&self, term: &str) -> RepositoryResult<Vec<Enrollment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT student_id, course_code, term, status, simulation_id, enrolled_at
            FROM enrollments
            WHERE term = ?1
            ORDER BY id
            "#,
        )?;
        let enrollments = stmt
            .query_map(params![term], Self::map_enrollment)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(enrollments)
    }

    /// 全部候补记录（按课程、位置）
    pub fn list_waitlist(&self) -> RepositoryResult<Vec<WaitlistEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT student_id, course_code, position, status, added_at
            FROM waitlist
            ORDER BY course_code, position, id
            "#,
        )?;
        let entries = stmt
            .query_map([], Self::map_waitlist)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }

    /// 某课程的候补队列（按位置）
    pub fn list_course_waitlist(&self, course_code: &str) -> RepositoryResult<Vec<WaitlistEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT student_id, course_code, position, status, added_at
            FROM waitlist
            WHERE course_code = ?1
            ORDER BY position, id
            "#,
        )?;
        let entries = stmt
            .query_map(params![course_code], Self::map_waitlist)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::types::{
        EnrollmentStatus, RejectionCause, RequestStatus, WaitlistStatus,
    };
    use chrono::Utc;

    fn setup() -> RequestRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO students (student_id, class_level, gpa) VALUES ('S1', 3, 3.0), ('S2', 2, 2.5);
            INSERT INTO courses (code, name, quota) VALUES ('BIL202', 'Data Structures', 1);
            INSERT INTO courses (code, name, quota) VALUES ('MAT101', 'Calculus', 5);
            "#,
        )
        .unwrap();
        RequestRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_insert_and_list_pending_in_rank_order() {
        let repo = setup();
        repo.insert_request("S1", "MAT101", 2, false).unwrap();
        repo.insert_request("S1", "BIL202", 1, true).unwrap();

        let pending = repo.list_pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].course_code, "BIL202");
        assert!(pending[0].is_mandatory);
        assert_eq!(pending[0].status, RequestStatus::Pending);
    }

    #[test]
    fn test_duplicate_request_violates_unique() {
        let repo = setup();
        repo.insert_request("S1", "BIL202", 1, false).unwrap();
        let err = repo.insert_request("S1", "BIL202", 2, false).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_invalid_rank_rejected() {
        let repo = setup();
        assert!(matches!(
            repo.insert_request("S1", "BIL202", 0, false),
            Err(RepositoryError::FieldValueError { .. })
        ));
    }

    #[test]
    fn test_persist_allocation_in_one_transaction() {
        let repo = setup();
        let id1 = repo.insert_request("S1", "BIL202", 1, false).unwrap();
        let id2 = repo.insert_request("S2", "BIL202", 1, false).unwrap();
        let now = Utc::now();

        let mut approved = CourseRequest::pending(id1, "S1", "BIL202", 1);
        approved.approve(now);
        let mut rejected = CourseRequest::pending(id2, "S2", "BIL202", 1);
        rejected.reject(
            RejectionCause::QuotaFull,
            "quota full - waitlisted at position 1".to_string(),
            now,
        );

        let course = Course {
            code: "BIL202".to_string(),
            name: "Data Structures".to_string(),
            credit: 4,
            course_type: crate::domain::types::CourseType::Required,
            is_active: true,
            quota: 1,
            enrolled_count: 1,
            is_open: false,
            sessions: vec![],
            prerequisites: vec![],
        };
        let enrollment = Enrollment {
            student_id: "S1".to_string(),
            course_code: "BIL202".to_string(),
            term: "2024-FALL".to_string(),
            status: EnrollmentStatus::Approved,
            simulation_id: Some("SIM1".to_string()),
            enrolled_at: now,
        };
        let entry = WaitlistEntry {
            student_id: "S2".to_string(),
            course_code: "BIL202".to_string(),
            position: 1,
            status: WaitlistStatus::Waiting,
            added_at: now,
        };

        let summary = repo
            .persist_allocation(&AllocationWriteSet {
                simulation_id: "SIM1",
                courses: vec![&course],
                requests: vec![&approved, &rejected],
                enrollments: vec![&enrollment],
                waitlist: vec![&entry],
            })
            .unwrap();

        assert_eq!(summary.requests_updated, 2);
        assert_eq!(summary.enrollments_inserted, 1);
        assert_eq!(summary.waitlist_inserted, 1);

        let stored = repo.list_by_student("S2").unwrap();
        assert_eq!(stored[0].rejection_cause, Some(RejectionCause::QuotaFull));
        assert_eq!(stored[0].processed_at, Some(now));
        assert_eq!(repo.list_enrollments("2024-FALL").unwrap()[0], enrollment);
        assert_eq!(repo.list_course_waitlist("BIL202").unwrap()[0], entry);
    }
}
