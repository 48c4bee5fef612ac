// ==========================================
// 选课席位分配系统 - 学生领域模型
// ==========================================
// 红线: priority_score 只能由 PriorityScorer 根据四个属性 + 权重表得出
// ==========================================

use crate::domain::types::{LetterGrade, SpecialStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// Student - 学生
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    // ===== 主键 =====
    pub student_id: String, // 学号（同时作为稳定排序的次级键）

    // ===== 学业属性 =====
    pub class_level: u8,         // 年级 (1-4)
    pub gpa: f64,                // 绩点 (0-4)
    pub remaining_courses: u32,  // 距毕业剩余课程数
    pub special_status: SpecialStatus,

    // ===== 账户标志 =====
    pub is_active: bool,
    pub is_admin: bool,

    // ===== 派生字段 (每次运行重算) =====
    pub priority_score: f64,
}

impl Student {
    /// 是否参与分配（活跃且非管理员）
    pub fn is_allocatable(&self) -> bool {
        self.is_active && !self.is_admin
    }
}

// ==========================================
// CompletedCourse - 成绩单条目 (只追加)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedCourse {
    pub student_id: String,
    pub course_code: String,
    pub grade: LetterGrade,
    pub credit: u32,
    pub term: String, // 例如 "2024-FALL"
}

// ==========================================
// Transcript - 成绩查询视图
// ==========================================
// 同一课程多条记录时以最后追加的为准
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    grades: HashMap<String, LetterGrade>,
}

impl Transcript {
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a CompletedCourse>,
    {
        let mut grades = HashMap::new();
        for entry in entries {
            grades.insert(entry.course_code.clone(), entry.grade);
        }
        Self { grades }
    }

    pub fn grade_of(&self, course_code: &str) -> Option<LetterGrade> {
        self.grades.get(course_code).copied()
    }

    pub fn len(&self) -> usize {
        self.grades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grades.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, grade: LetterGrade, term: &str) -> CompletedCourse {
        CompletedCourse {
            student_id: "S1".to_string(),
            course_code: code.to_string(),
            grade,
            credit: 3,
            term: term.to_string(),
        }
    }

    #[test]
    fn test_transcript_last_entry_wins() {
        let entries = vec![
            entry("BIL201", LetterGrade::Ff, "2023-FALL"),
            entry("BIL201", LetterGrade::Cc, "2024-SPRING"),
            entry("MAT101", LetterGrade::Aa, "2023-FALL"),
        ];

        let transcript = Transcript::from_entries(&entries);

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.grade_of("BIL201"), Some(LetterGrade::Cc));
        assert_eq!(transcript.grade_of("MAT101"), Some(LetterGrade::Aa));
        assert_eq!(transcript.grade_of("FIZ101"), None);
    }
}
