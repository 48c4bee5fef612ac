// ==========================================
// 选课席位分配系统 - 优先级评分引擎
// ==========================================
// 职责: 学生综合优先级分数 + 分配顺序
// 公式:
//   class      = clamp(class_level, 1, 4) / 4 * w.class_level
//   remaining  = max(0, 1 - remaining_courses / 40) * w.remaining_courses
//   gpa        = clamp(gpa, 0, 4) / 4 * w.gpa
//   special    = bonus[status]（不乘权重,缺省 0）
// 红线: 比较使用未舍入的原始分数,舍入只用于展示
// ==========================================

use crate::config::allocation_config::AllocationConfig;
use crate::domain::student::Student;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, instrument};

/// 剩余课程数归一化分母
pub const REMAINING_COURSES_HORIZON: f64 = 40.0;

// ==========================================
// 输出类型
// ==========================================

/// 单项得分明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub value: String,
    pub weight: f64,
    pub score: f64, // 展示用,保留两位小数
    pub description: String,
}

/// 优先级分数明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityBreakdown {
    pub student_id: String,
    pub total_score: f64, // 展示用,保留两位小数
    pub class_level: ScoreComponent,
    pub remaining_courses: ScoreComponent,
    pub gpa: ScoreComponent,
    pub special_status: ScoreComponent,
}

/// 两名学生的优先级比较
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityComparison {
    pub first: PriorityBreakdown,
    pub second: PriorityBreakdown,
    pub winner: String,
    pub difference: f64,
}

/// 四项原始得分（未舍入）
#[derive(Debug, Clone, Copy, PartialEq)]
struct RawTerms {
    class_level: f64,
    remaining_courses: f64,
    gpa: f64,
    special_status: f64,
}

impl RawTerms {
    fn total(&self) -> f64 {
        self.class_level + self.remaining_courses + self.gpa + self.special_status
    }
}

// ==========================================
// PriorityScorer - 优先级评分引擎
// ==========================================
pub struct PriorityScorer {
    // 无状态引擎,权重由调用方传入
}

impl PriorityScorer {
    pub fn new() -> Self {
        Self {}
    }

    fn raw_terms(&self, student: &Student, config: &AllocationConfig) -> RawTerms {
        let weights = &config.priority_weights;

        let class_level = f64::from(student.class_level.clamp(1, 4));
        let gpa = if student.gpa.is_nan() {
            0.0
        } else {
            student.gpa.clamp(0.0, 4.0)
        };
        let remaining_factor =
            (1.0 - student.remaining_courses as f64 / REMAINING_COURSES_HORIZON).max(0.0);

        RawTerms {
            class_level: class_level / 4.0 * weights.class_level,
            remaining_courses: remaining_factor * weights.remaining_courses,
            gpa: gpa / 4.0 * weights.gpa,
            special_status: config.special_status_bonus.lookup(student.special_status),
        }
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 计算优先级分数（纯函数,不舍入）
    pub fn score(&self, student: &Student, config: &AllocationConfig) -> f64 {
        self.raw_terms(student, config).total()
    }

    /// 重算所有可分配学生的 priority_score
    ///
    /// # 返回
    /// 被重算的学生数（非活跃/管理员不计）
    #[instrument(skip(self, students, config), fields(students_count = students.len()))]
    pub fn score_all(&self, students: &mut [Student], config: &AllocationConfig) -> usize {
        let mut count = 0;
        for student in students.iter_mut().filter(|s| s.is_allocatable()) {
            student.priority_score = self.score(student, config);
            count += 1;
        }
        debug!(scored = count, "优先级分数重算完成");
        count
    }

    /// 分配顺序比较: 分数降序,学号升序
    pub fn allocation_order(a: &Student, b: &Student) -> Ordering {
        b.priority_score
            .total_cmp(&a.priority_score)
            .then_with(|| a.student_id.cmp(&b.student_id))
    }

    /// 可分配学生的分配顺序（引用列表,不修改输入）
    pub fn order<'a>(&self, students: &'a [Student]) -> Vec<&'a Student> {
        let mut ordered: Vec<&Student> = students.iter().filter(|s| s.is_allocatable()).collect();
        ordered.sort_by(|a, b| Self::allocation_order(a, b));
        ordered
    }

    // ==========================================
    // 展示方法
    // ==========================================

    /// 分数明细
    pub fn breakdown(&self, student: &Student, config: &AllocationConfig) -> PriorityBreakdown {
        let terms = self.raw_terms(student, config);
        let weights = &config.priority_weights;

        PriorityBreakdown {
            student_id: student.student_id.clone(),
            total_score: round2(terms.total()),
            class_level: ScoreComponent {
                value: student.class_level.to_string(),
                weight: weights.class_level,
                score: round2(terms.class_level),
                description: format!("class level {}", student.class_level),
            },
            remaining_courses: ScoreComponent {
                value: student.remaining_courses.to_string(),
                weight: weights.remaining_courses,
                score: round2(terms.remaining_courses),
                description: format!(
                    "{} courses remaining to graduate",
                    student.remaining_courses
                ),
            },
            gpa: ScoreComponent {
                value: format!("{:.2}", student.gpa),
                weight: weights.gpa,
                score: round2(terms.gpa),
                description: format!("grade point average {:.2}", student.gpa),
            },
            special_status: ScoreComponent {
                value: student.special_status.to_string(),
                weight: weights.special_status,
                score: round2(terms.special_status),
                description: student.special_status.description().to_string(),
            },
        }
    }

    /// 比较两名学生（winner 为分配顺序中靠前者）
    pub fn compare(
        &self,
        first: &Student,
        second: &Student,
        config: &AllocationConfig,
    ) -> PriorityComparison {
        let score_first = self.score(first, config);
        let score_second = self.score(second, config);

        let first_wins = score_second
            .total_cmp(&score_first)
            .then_with(|| first.student_id.cmp(&second.student_id))
            != Ordering::Greater;

        PriorityComparison {
            first: self.breakdown(first, config),
            second: self.breakdown(second, config),
            winner: if first_wins {
                first.student_id.clone()
            } else {
                second.student_id.clone()
            },
            difference: round2((score_first - score_second).abs()),
        }
    }
}

impl Default for PriorityScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
