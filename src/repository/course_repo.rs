// ==========================================
// 选课席位分配系统 - 课程数据仓储
// ==========================================
// 职责: courses / course_sessions / prerequisites 表的读写
// 红线: Repository 不含业务逻辑; 席位计数只落库引擎给出的值
// ==========================================

use crate::domain::course::{Course, PrerequisiteEdge, Session};
use crate::repository::codec::parse_text;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

// ==========================================
// CourseRepository - 课程仓储
// ==========================================
pub struct CourseRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CourseRepository {
    /// 创建新的 CourseRepository 实例
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

    fn map_course(row: &Row<'_>) -> SqliteResult<Course> {
        Ok(Course {
            code: row.get(0)?,
            name: row.get(1)?,
            credit: row.get(2)?,
            course_type: parse_text(3, &row.get::<_, String>(3)?)?,
            is_active: row.get(4)?,
            quota: row.get(5)?,
            enrolled_count: row.get(6)?,
            is_open: row.get(7)?,
            sessions: Vec::new(),
            prerequisites: Vec::new(),
        })
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 新增课程（含课时与先修边,单事务）
    pub fn insert(&self, course: &Course) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO courses (
                code, name, credit, course_type, is_active, quota, enrolled_count, is_open
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                course.code,
                course.name,
                course.credit,
                course.course_type.to_string(),
                course.is_active,
                course.quota,
                course.enrolled_count,
                course.is_open,
            ],
        )?;

        for session in &course.sessions {
            tx.execute(
                r#"
                INSERT INTO course_sessions (course_code, day, start_time, end_time, room)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    course.code,
                    session.day.to_string(),
                    session.start_time,
                    session.end_time,
                    session.room,
                ],
            )?;
        }

        for edge in &course.prerequisites {
            Self::insert_edge(&tx, edge)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn insert_edge(conn: &Connection, edge: &PrerequisiteEdge) -> SqliteResult<usize> {
        conn.execute(
            r#"
            INSERT INTO prerequisites (course_code, required_code, min_grade, kind)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                edge.course_code,
                edge.required_code,
                edge.min_grade.to_string(),
                edge.kind.to_string(),
            ],
        )
    }

    /// 新增先修边（是否成环由调用方先用 PrerequisiteResolver 判断）
    pub fn add_prerequisite(&self, edge: &PrerequisiteEdge) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_edge(&conn, edge)?;
        Ok(())
    }

    /// 落库席位计数与 is_open（单事务）
    pub fn save_seat_counters<'a, I>(&self, courses: I) -> RepositoryResult<usize>
    where
        I: IntoIterator<Item = &'a Course>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE courses SET enrolled_count = ?1, is_open = ?2 WHERE code = ?3",
            )?;
            for course in courses {
                updated += stmt.execute(params![course.enrolled_count, course.is_open, course.code])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按课程代码查询（含课时与先修边）
    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<Course>> {
        let conn = self.get_conn()?;
        let course = conn
            .query_row(
                r#"
                SELECT code, name, credit, course_type, is_active, quota, enrolled_count, is_open
                FROM courses
                WHERE code = ?1
                "#,
                params![code],
                Self::map_course,
            )
            .optional()?;

        let Some(mut course) = course else {
            return Ok(None);
        };

        let mut sessions = Self::load_sessions(&conn)?;
        let mut edges = Self::load_edges(&conn)?;
        course.sessions = sessions.remove(code).unwrap_or_default();
        course.prerequisites = edges.remove(code).unwrap_or_default();
        Ok(Some(course))
    }

    /// 全部课程目录（course_code -> Course）
    pub fn load_catalog(&self) -> RepositoryResult<BTreeMap<String, Course>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT code, name, credit, course_type, is_active, quota, enrolled_count, is_open
            FROM courses
            ORDER BY code
            "#,
        )?;
        let courses = stmt
            .query_map([], Self::map_course)?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut sessions = Self::load_sessions(&conn)?;
        let mut edges = Self::load_edges(&conn)?;

        Ok(courses
            .into_iter()
            .map(|mut course| {
                course.sessions = sessions.remove(&course.code).unwrap_or_default();
                course.prerequisites = edges.remove(&course.code).unwrap_or_default();
                (course.code.clone(), course)
            })
            .collect())
    }

    /// 已满员的活跃课程代码
    pub fn list_full_courses(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT code FROM courses
            WHERE is_active = 1 AND enrolled_count >= quota
            ORDER BY code
            "#,
        )?;
        let codes = stmt
            .query_map([], |row| row.get(0))?
            .collect::<SqliteResult<Vec<String>>>()?;
        Ok(codes)
    }

    fn load_sessions(conn: &Connection) -> RepositoryResult<HashMap<String, Vec<Session>>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT course_code, day, start_time, end_time, room
            FROM course_sessions
            ORDER BY course_code, id
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    Session {
                        day: parse_text(1, &row.get::<_, String>(1)?)?,
                        start_time: row.get(2)?,
                        end_time: row.get(3)?,
                        room: row.get(4)?,
                    },
                ))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut grouped: HashMap<String, Vec<Session>> = HashMap::new();
        for (code, session) in rows {
            grouped.entry(code).or_default().push(session);
        }
        Ok(grouped)
    }

    fn load_edges(conn: &Connection) -> RepositoryResult<HashMap<String, Vec<PrerequisiteEdge>>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT course_code, required_code, min_grade, kind
            FROM prerequisites
            ORDER BY course_code, rowid
            "#,
        )?;
        let edges = stmt
            .query_map([], |row| {
                Ok(PrerequisiteEdge {
                    course_code: row.get(0)?,
                    required_code: row.get(1)?,
                    min_grade: parse_text(2, &row.get::<_, String>(2)?)?,
                    kind: parse_text(3, &row.get::<_, String>(3)?)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut grouped: HashMap<String, Vec<PrerequisiteEdge>> = HashMap::new();
        for edge in edges {
            grouped.entry(edge.course_code.clone()).or_default().push(edge);
        }
        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::types::{CourseType, LetterGrade, Weekday};

    fn repo() -> CourseRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        CourseRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn course(code: &str, quota: u32) -> Course {
        Course {
            code: code.to_string(),
            name: format!("{} course", code),
            credit: 4,
            course_type: CourseType::TechnicalElective,
            is_active: true,
            quota,
            enrolled_count: 0,
            is_open: quota > 0,
            sessions: vec![
                Session::new(Weekday::Monday, "09:00", "10:50").with_room("D-101"),
                Session::new(Weekday::Wednesday, "09:00", "09:50"),
            ],
            prerequisites: vec![],
        }
    }

    #[test]
    fn test_catalog_round_trip_with_sessions_and_edges() {
        let repo = repo();
        repo.insert(&course("BIL201", 30)).unwrap();
        let mut target = course("BIL202", 2);
        target
            .prerequisites
            .push(PrerequisiteEdge::required("BIL202", "BIL201", LetterGrade::Dd));
        repo.insert(&target).unwrap();

        let catalog = repo.load_catalog().unwrap();
        let loaded = &catalog["BIL202"];
        assert_eq!(loaded.course_type, CourseType::TechnicalElective);
        assert_eq!(loaded.sessions.len(), 2);
        assert_eq!(loaded.sessions[0].room.as_deref(), Some("D-101"));
        assert_eq!(loaded.prerequisites[0].required_code, "BIL201");
        assert!(catalog["BIL201"].prerequisites.is_empty());

        let single = repo.find_by_code("BIL202").unwrap().unwrap();
        assert_eq!(single.sessions, loaded.sessions);
        assert!(repo.find_by_code("NOPE").unwrap().is_none());
    }

    #[test]
    fn test_save_seat_counters_and_full_listing() {
        let repo = repo();
        let mut c = course("BIL202", 1);
        repo.insert(&c).unwrap();

        c.enrolled_count = 1;
        c.is_open = false;
        assert_eq!(repo.save_seat_counters([&c]).unwrap(), 1);

        assert_eq!(repo.list_full_courses().unwrap(), vec!["BIL202".to_string()]);
        let loaded = repo.find_by_code("BIL202").unwrap().unwrap();
        assert!(!loaded.is_open);
    }

    #[test]
    fn test_seat_counter_above_quota_is_rejected_by_schema() {
        let repo = repo();
        let mut c = course("BIL202", 1);
        repo.insert(&c).unwrap();

        c.enrolled_count = 2;
        assert!(repo.save_seat_counters([&c]).is_err());
    }
}
