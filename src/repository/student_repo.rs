// ==========================================
// 选课席位分配系统 - 学生数据仓储
// ==========================================
// 职责: students / completed_courses 表的读写
// 红线: Repository 不含业务逻辑（分数由引擎计算,这里只落库）
// ==========================================

use crate::domain::student::{CompletedCourse, Student, Transcript};
use crate::repository::codec::{parse_text, timestamp_text};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// StudentRepository - 学生仓储
// ==========================================
pub struct StudentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StudentRepository {
    /// 创建新的 StudentRepository 实例
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

    fn map_student(row: &Row<'_>) -> SqliteResult<Student> {
        Ok(Student {
            student_id: row.get(0)?,
            class_level: row.get(1)?,
            gpa: row.get(2)?,
            remaining_courses: row.get(3)?,
            special_status: parse_text(4, &row.get::<_, String>(4)?)?,
            is_active: row.get(5)?,
            is_admin: row.get(6)?,
            priority_score: row.get(7)?,
        })
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 新增学生
    pub fn insert(&self, student: &Student) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO students (
                student_id, class_level, gpa, remaining_courses, special_status,
                is_active, is_admin, priority_score
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                student.student_id,
                student.class_level,
                student.gpa,
                student.remaining_courses,
                student.special_status.to_string(),
                student.is_active,
                student.is_admin,
                student.priority_score,
            ],
        )?;
        Ok(())
    }

    /// 追加成绩单条目
    pub fn add_completed_course(&self, entry: &CompletedCourse) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO completed_courses (student_id, course_code, grade, credit, term)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                entry.student_id,
                entry.course_code,
                entry.grade.to_string(),
                entry.credit,
                entry.term,
            ],
        )?;
        Ok(())
    }

    /// 批量落库优先级分数（单事务）
    ///
    /// # 返回
    /// 更新的行数
    pub fn update_priority_scores(&self, students: &[Student]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let updated = Self::write_priority_scores(&tx, students)?;
        tx.commit()?;
        Ok(updated)
    }

    /// 在调用方的事务内写入优先级分数（不提交）
    pub(crate) fn write_priority_scores(
        tx: &Connection,
        students: &[Student],
    ) -> RepositoryResult<usize> {
        let now = timestamp_text(&Utc::now());
        let mut stmt = tx.prepare(
            "UPDATE students SET priority_score = ?1, score_updated_at = ?2 WHERE student_id = ?3",
        )?;
        let mut updated = 0;
        for student in students.iter().filter(|s| s.is_allocatable()) {
            updated += stmt.execute(params![student.priority_score, now, student.student_id])?;
        }
        Ok(updated)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按学号查询
    pub fn find_by_id(&self, student_id: &str) -> RepositoryResult<Option<Student>> {
        let conn = self.get_conn()?;
        let student = conn
            .query_row(
                r#"
                SELECT student_id, class_level, gpa, remaining_courses, special_status,
                       is_active, is_admin, priority_score
                FROM students
                WHERE student_id = ?1
                "#,
                params![student_id],
                Self::map_student,
            )
            .optional()?;
        Ok(student)
    }

    /// 全部学生（含非活跃与管理员,按学号）
    pub fn list_all(&self) -> RepositoryResult<Vec<Student>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT student_id, class_level, gpa, remaining_courses, special_status,
                   is_active, is_admin, priority_score
            FROM students
            ORDER BY student_id
            "#,
        )?;
        let students = stmt
            .query_map([], Self::map_student)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(students)
    }

    /// 所有活跃且非管理员的学生（按学号）
    pub fn list_allocatable(&self) -> RepositoryResult<Vec<Student>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT student_id, class_level, gpa, remaining_courses, special_status,
                   is_active, is_admin, priority_score
            FROM students
            WHERE is_active = 1 AND is_admin = 0
            ORDER BY student_id
            "#,
        )?;
        let students = stmt
            .query_map([], Self::map_student)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(students)
    }

    /// 已按优先级排序的学生（分数降序,学号升序）
    pub fn list_by_priority(&self) -> RepositoryResult<Vec<Student>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT student_id, class_level, gpa, remaining_courses, special_status,
                   is_active, is_admin, priority_score
            FROM students
            WHERE is_active = 1 AND is_admin = 0
            ORDER BY priority_score DESC, student_id ASC
            "#,
        )?;
        let students = stmt
            .query_map([], Self::map_student)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(students)
    }

    /// 一个学生的成绩单条目（追加顺序）
    pub fn completed_courses_of(&self, student_id: &str) -> RepositoryResult<Vec<CompletedCourse>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT student_id, course_code, grade, credit, term
            FROM completed_courses
            WHERE student_id = ?1
            ORDER BY id
            "#,
        )?;
        let entries = stmt
            .query_map(params![student_id], |row| {
                Ok(CompletedCourse {
                    student_id: row.get(0)?,
                    course_code: row.get(1)?,
                    grade: parse_text(2, &row.get::<_, String>(2)?)?,
                    credit: row.get(3)?,
                    term: row.get(4)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }

    /// 全部成绩单（student_id -> Transcript,同课程以最后追加为准）
    pub fn load_transcripts(&self) -> RepositoryResult<HashMap<String, Transcript>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT student_id, course_code, grade, credit, term
            FROM completed_courses
            ORDER BY student_id, id
            "#,
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(CompletedCourse {
                    student_id: row.get(0)?,
                    course_code: row.get(1)?,
                    grade: parse_text(2, &row.get::<_, String>(2)?)?,
                    credit: row.get(3)?,
                    term: row.get(4)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut grouped: HashMap<String, Vec<CompletedCourse>> = HashMap::new();
        for entry in entries {
            grouped.entry(entry.student_id.clone()).or_default().push(entry);
        }

        Ok(grouped
            .into_iter()
            .map(|(student_id, entries)| (student_id, Transcript::from_entries(&entries)))
            .collect())
    }
}
