// ==========================================
// 选课席位分配系统 - 课程领域模型
// ==========================================
// 红线: 0 <= enrolled_count <= quota, 且 is_open == (enrolled_count < quota)
// 用途: 席位池管理,周课表,先修边
// ==========================================

use crate::domain::types::{CourseType, LetterGrade, PrereqKind, Weekday};
use serde::{Deserialize, Serialize};

// ==========================================
// Session - 周课时段
// ==========================================
// 时间为 "HH:MM" 字符串,解析与比较由 ScheduleConflict 负责
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub day: Weekday,
    pub start_time: String,
    pub end_time: String,
    pub room: Option<String>,
}

impl Session {
    pub fn new(day: Weekday, start_time: &str, end_time: &str) -> Self {
        Self {
            day,
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            room: None,
        }
    }

    pub fn with_room(mut self, room: &str) -> Self {
        self.room = Some(room.to_string());
        self
    }

    /// 展示文本,例如 "MONDAY 09:00-10:50"
    pub fn display_text(&self) -> String {
        format!("{} {}-{}", self.day, self.start_time, self.end_time)
    }
}

// ==========================================
// PrerequisiteEdge - 先修边 (course -> required course)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteEdge {
    pub course_code: String,   // 目标课程
    pub required_code: String, // 先修课程
    pub min_grade: LetterGrade,
    pub kind: PrereqKind,
}

impl PrerequisiteEdge {
    pub fn required(course_code: &str, required_code: &str, min_grade: LetterGrade) -> Self {
        Self {
            course_code: course_code.to_string(),
            required_code: required_code.to_string(),
            min_grade,
            kind: PrereqKind::Required,
        }
    }
}

// ==========================================
// Course - 课程
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    // ===== 主键 =====
    pub code: String,
    pub name: String,

    // ===== 属性 =====
    pub credit: u32,
    pub course_type: CourseType,
    pub is_active: bool,

    // ===== 席位 =====
    pub quota: u32,
    pub enrolled_count: u32,
    pub is_open: bool,

    // ===== 课表与先修 =====
    pub sessions: Vec<Session>,
    pub prerequisites: Vec<PrerequisiteEdge>,
}

impl Course {
    /// 占用一个席位并维护 is_open
    ///
    /// 仅由分配引擎的提交步骤调用; 调用前必须已通过名额检查
    pub(crate) fn take_seat(&mut self) {
        debug_assert!(self.enrolled_count < self.quota);
        self.enrolled_count = (self.enrolled_count + 1).min(self.quota);
        self.is_open = self.enrolled_count < self.quota;
    }

    /// 恢复到指定的已选人数（reset 使用）
    pub(crate) fn restore_enrolled_count(&mut self, enrolled_count: u32) {
        self.enrolled_count = enrolled_count.min(self.quota);
        self.is_open = self.enrolled_count < self.quota;
    }
}

// ==========================================
// Trait: SeatConstraint
// ==========================================
// 用途: 名额检查与报表只读访问
pub trait SeatConstraint {
    /// 名额是否已满
    fn is_full(&self) -> bool;

    /// 剩余名额
    fn available_quota(&self) -> u32;

    /// 填充率 (0-100, 保留一位小数)
    fn fill_percentage(&self) -> f64;

    /// 不变式检查: 0 <= enrolled <= quota 且 is_open 与名额一致
    fn seat_invariant_holds(&self) -> bool;
}

impl SeatConstraint for Course {
    fn is_full(&self) -> bool {
        self.enrolled_count >= self.quota
    }

    fn available_quota(&self) -> u32 {
        self.quota.saturating_sub(self.enrolled_count)
    }

    fn fill_percentage(&self) -> f64 {
        if self.quota == 0 {
            return 0.0;
        }
        let pct = self.enrolled_count as f64 / self.quota as f64 * 100.0;
        (pct * 10.0).round() / 10.0
    }

    fn seat_invariant_holds(&self) -> bool {
        self.enrolled_count <= self.quota && self.is_open == (self.enrolled_count < self.quota)
    }
}
