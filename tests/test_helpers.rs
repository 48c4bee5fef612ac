// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

use course_alloc::config::{AllocationConfig, ConfigManager};
use course_alloc::db::{init_schema, open_sqlite_connection};
use course_alloc::domain::types::{CourseType, LetterGrade, SpecialStatus, Weekday};
use course_alloc::domain::{CompletedCourse, Course, PrerequisiteEdge, Session, Student};
use course_alloc::repository::{CourseRepository, RequestRepository, StudentRepository};
use std::error::Error;
use tempfile::NamedTempFile;

/// 测试统一使用的学期
pub const TERM: &str = "2025-SPRING";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 写入完整分配配置
pub fn store_config(db_path: &str, config: &AllocationConfig) {
    let manager = ConfigManager::new(db_path).unwrap();
    manager.store_allocation_config(config).unwrap();
}

// ==========================================
// 实体构造
// ==========================================

/// 创建测试用学生
pub fn student(student_id: &str, class_level: u8, gpa: f64, remaining_courses: u32) -> Student {
    Student {
        student_id: student_id.to_string(),
        class_level,
        gpa,
        remaining_courses,
        special_status: SpecialStatus::None,
        is_active: true,
        is_admin: false,
        priority_score: 0.0,
    }
}

/// 周课时段
pub fn session(day: Weekday, start_time: &str, end_time: &str) -> Session {
    Session::new(day, start_time, end_time)
}

/// 创建测试用课程（活跃,未选）
pub fn course(code: &str, quota: u32, sessions: Vec<Session>) -> Course {
    Course {
        code: code.to_string(),
        name: format!("{} test course", code),
        credit: 3,
        course_type: CourseType::Required,
        is_active: true,
        quota,
        enrolled_count: 0,
        is_open: quota > 0,
        sessions,
        prerequisites: Vec::new(),
    }
}

/// 带一条先修边的课程
pub fn course_requiring(
    code: &str,
    quota: u32,
    sessions: Vec<Session>,
    required_code: &str,
    min_grade: LetterGrade,
) -> Course {
    let mut c = course(code, quota, sessions);
    c.prerequisites
        .push(PrerequisiteEdge::required(code, required_code, min_grade));
    c
}

// ==========================================
// Seeder - 测试数据写入
// ==========================================
pub struct Seeder {
    pub students: StudentRepository,
    pub courses: CourseRepository,
    pub requests: RequestRepository,
}

impl Seeder {
    pub fn new(db_path: &str) -> Self {
        Self {
            students: StudentRepository::new(db_path).unwrap(),
            courses: CourseRepository::new(db_path).unwrap(),
            requests: RequestRepository::new(db_path).unwrap(),
        }
    }

    pub fn student(&self, student: &Student) -> &Self {
        self.students.insert(student).unwrap();
        self
    }

    pub fn course(&self, course: &Course) -> &Self {
        self.courses.insert(course).unwrap();
        self
    }

    pub fn grade(&self, student_id: &str, course_code: &str, grade: LetterGrade) -> &Self {
        self.students
            .add_completed_course(&CompletedCourse {
                student_id: student_id.to_string(),
                course_code: course_code.to_string(),
                grade,
                credit: 3,
                term: "2024-FALL".to_string(),
            })
            .unwrap();
        self
    }

    pub fn request(&self, student_id: &str, course_code: &str, rank: i32) -> i64 {
        self.requests
            .insert_request(student_id, course_code, rank, false)
            .unwrap()
    }
}

// ==========================================
// 综合数据集
// ==========================================

/// 课程目录: 含时间重叠(MAT101/FIZ101)与先修边(BIL202 <- BIL101)
pub const CAMPUS_COURSES: [&str; 6] = ["MAT101", "FIZ101", "BIL101", "BIL202", "TAR101", "ING101"];

/// 写入 12 名学生、6 门课程与每人 3 条申请
///
/// 名额总和小于申请总数,保证出现满员、候补、冲突与先修拒绝
pub fn seed_campus(db_path: &str) -> Seeder {
    let seeder = Seeder::new(db_path);

    seeder
        .course(&course("MAT101", 4, vec![session(Weekday::Monday, "09:00", "10:50")]))
        .course(&course("FIZ101", 3, vec![session(Weekday::Monday, "10:00", "11:50")]))
        .course(&course("BIL101", 5, vec![session(Weekday::Tuesday, "13:00", "14:50")]))
        .course(&course_requiring(
            "BIL202",
            2,
            vec![session(Weekday::Wednesday, "09:00", "10:50")],
            "BIL101",
            LetterGrade::Dd,
        ))
        .course(&course("TAR101", 6, vec![session(Weekday::Thursday, "15:00", "16:50")]))
        .course(&course("ING101", 3, vec![session(Weekday::Friday, "09:00", "09:50")]));

    for n in 1..=12u32 {
        let student_id = format!("S{:02}", n);
        let mut s = student(
            &student_id,
            (n % 4) as u8 + 1,
            2.0 + f64::from(n % 5) * 0.4,
            5 + n * 2,
        );
        if n == 7 {
            s.special_status = SpecialStatus::HonorStudent;
        }
        seeder.student(&s);

        if n % 3 == 0 {
            seeder.grade(&student_id, "BIL101", LetterGrade::Ff);
        } else if n % 2 == 0 {
            seeder.grade(&student_id, "BIL101", LetterGrade::Cc);
        }

        for k in 0..3u32 {
            let code = CAMPUS_COURSES[((n + k) % 6) as usize];
            seeder.request(&student_id, code, k as i32 + 1);
        }
    }

    seeder
}
