// ==========================================
// 选课席位分配系统 - 单条申请判定
// ==========================================
// 职责: 对一条申请给出 准入/拒绝 判定及唯一原因
// 顺序（固定）:
// 0) 已注册同一课程 => other
// 1) 名额: enrolled_count >= quota => quota_full
// 2) 先修: 资格检查失败 => prerequisite（列出缺失课程代码）
// 3) 冲突: 先比已批准课表,再比本轮已授予课程 => conflict（给出第一个冲突课程）
// 4) 课程未启用 => other
// 红线: 只报告第一个失败项; 策略拒绝不是错误
// ==========================================

use crate::domain::course::{Course, SeatConstraint};
use crate::domain::student::Transcript;
use crate::domain::types::RejectionCause;
use crate::engine::conflict_checker::{ConflictChecker, ScheduledCourse};
use crate::engine::error::EngineResult;
use crate::engine::prerequisite::PrerequisiteResolver;
use serde::{Deserialize, Serialize};

// ==========================================
// Verdict - 判定结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub can_enroll: bool,
    pub cause: Option<RejectionCause>,
    pub message: String,
}

impl Verdict {
    pub fn admit(course_code: &str) -> Self {
        Self {
            can_enroll: true,
            cause: None,
            message: format!("enrolled in {}", course_code),
        }
    }

    pub fn reject(cause: RejectionCause, message: String) -> Self {
        Self {
            can_enroll: false,
            cause: Some(cause),
            message,
        }
    }
}

// ==========================================
// RequestEvaluator - 申请判定器
// ==========================================
pub struct RequestEvaluator<'a> {
    resolver: &'a PrerequisiteResolver,
    checker: &'a ConflictChecker,
}

impl<'a> RequestEvaluator<'a> {
    pub fn new(resolver: &'a PrerequisiteResolver, checker: &'a ConflictChecker) -> Self {
        Self { resolver, checker }
    }

    /// 判定一条申请
    ///
    /// # 参数
    /// - `course`: 申请的课程（当前席位计数）
    /// - `transcript`: 学生成绩单
    /// - `approved_schedule`: 学生已批准注册的课表（本次运行之前）
    /// - `granted_this_pass`: 本轮已授予的课程（按授予顺序）
    ///
    /// # 返回
    /// - Ok(Verdict): 策略判定
    /// - Err: 课时时间格式错误等输入契约违反
    pub fn evaluate(
        &self,
        course: &Course,
        transcript: &Transcript,
        approved_schedule: &[ScheduledCourse],
        granted_this_pass: &[ScheduledCourse],
    ) -> EngineResult<Verdict> {
        // 0) 重复注册
        let already_enrolled = approved_schedule
            .iter()
            .chain(granted_this_pass.iter())
            .any(|c| c.course_code == course.code);
        if already_enrolled {
            return Ok(Verdict::reject(
                RejectionCause::Other,
                format!("already enrolled in {}", course.code),
            ));
        }

        // 1) 名额
        if course.is_full() {
            return Ok(Verdict::reject(
                RejectionCause::QuotaFull,
                format!(
                    "quota full for {} ({}/{})",
                    course.code, course.enrolled_count, course.quota
                ),
            ));
        }

        // 2) 先修
        let eligibility = self.resolver.check_eligibility(transcript, &course.code);
        if !eligibility.can_enroll {
            let mut codes: Vec<&str> = Vec::new();
            for code in eligibility.missing_codes() {
                if !codes.contains(&code) {
                    codes.push(code);
                }
            }
            return Ok(Verdict::reject(
                RejectionCause::Prerequisite,
                format!("missing prerequisites: {}", codes.join(", ")),
            ));
        }

        // 3) 冲突: 已批准课表优先,其后本轮授予
        for schedule in [approved_schedule, granted_this_pass] {
            let check = self.checker.check(schedule, &course.code, &course.sessions)?;
            if let Some(conflicting) = check.first_conflicting_course {
                return Ok(Verdict::reject(
                    RejectionCause::Conflict,
                    format!("time conflict with {}", conflicting),
                ));
            }
        }

        // 4) 课程已停开
        if !course.is_active {
            return Ok(Verdict::reject(
                RejectionCause::Other,
                format!("course not active: {}", course.code),
            ));
        }

        Ok(Verdict::admit(&course.code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::course::{PrerequisiteEdge, Session};
    use crate::domain::student::CompletedCourse;
    use crate::domain::types::{CourseType, LetterGrade, Weekday};
    use crate::engine::prerequisite::PrerequisiteGraph;

    fn course(code: &str, quota: u32, enrolled: u32, sessions: Vec<Session>) -> Course {
        Course {
            code: code.to_string(),
            name: code.to_string(),
            credit: 3,
            course_type: CourseType::Required,
            is_active: true,
            quota,
            enrolled_count: enrolled,
            is_open: enrolled < quota,
            sessions,
            prerequisites: vec![],
        }
    }

    fn monday(start: &str, end: &str) -> Vec<Session> {
        vec![Session::new(Weekday::Monday, start, end)]
    }

    fn resolver() -> PrerequisiteResolver {
        let mut graph = PrerequisiteGraph::new();
        graph.add_edge(PrerequisiteEdge::required("BIL202", "BIL201", LetterGrade::Dd));
        PrerequisiteResolver::new(graph)
    }

    fn transcript(grade: LetterGrade) -> Transcript {
        Transcript::from_entries(&[CompletedCourse {
            student_id: "S1".to_string(),
            course_code: "BIL201".to_string(),
            grade,
            credit: 4,
            term: "2023-FALL".to_string(),
        }])
    }

    #[test]
    fn test_quota_checked_before_prerequisite() {
        let resolver = resolver();
        let checker = ConflictChecker::new();
        let evaluator = RequestEvaluator::new(&resolver, &checker);

        // 名额满且先修不足: 只报告名额
        let full = course("BIL202", 1, 1, monday("09:00", "10:50"));
        let verdict = evaluator
            .evaluate(&full, &transcript(LetterGrade::Ff), &[], &[])
            .unwrap();

        assert!(!verdict.can_enroll);
        assert_eq!(verdict.cause, Some(RejectionCause::QuotaFull));
    }

    #[test]
    fn test_prerequisite_checked_before_conflict() {
        let resolver = resolver();
        let checker = ConflictChecker::new();
        let evaluator = RequestEvaluator::new(&resolver, &checker);

        let target = course("BIL202", 5, 0, monday("09:00", "10:50"));
        let clash = ScheduledCourse::from_course(&course("MAT101", 5, 1, monday("09:30", "10:30")));

        let verdict = evaluator
            .evaluate(&target, &transcript(LetterGrade::Ff), &[clash], &[])
            .unwrap();

        assert_eq!(verdict.cause, Some(RejectionCause::Prerequisite));
        assert_eq!(verdict.message, "missing prerequisites: BIL201");
    }

    #[test]
    fn test_conflict_against_approved_before_granted() {
        let resolver = resolver();
        let checker = ConflictChecker::new();
        let evaluator = RequestEvaluator::new(&resolver, &checker);

        let target = course("BIL202", 5, 0, monday("09:00", "10:50"));
        let approved = ScheduledCourse::from_course(&course("FIZ101", 5, 1, monday("10:00", "11:00")));
        let granted = ScheduledCourse::from_course(&course("MAT101", 5, 1, monday("09:00", "09:30")));

        let verdict = evaluator
            .evaluate(&target, &transcript(LetterGrade::Cc), &[approved], &[granted])
            .unwrap();

        assert_eq!(verdict.cause, Some(RejectionCause::Conflict));
        assert_eq!(verdict.message, "time conflict with FIZ101");
    }

    #[test]
    fn test_admit_when_all_checks_pass() {
        let resolver = resolver();
        let checker = ConflictChecker::new();
        let evaluator = RequestEvaluator::new(&resolver, &checker);

        let target = course("BIL202", 5, 4, monday("09:00", "10:50"));
        let granted = ScheduledCourse::from_course(&course("MAT101", 5, 1, monday("11:00", "12:00")));

        let verdict = evaluator
            .evaluate(&target, &transcript(LetterGrade::Dd), &[], &[granted])
            .unwrap();

        assert!(verdict.can_enroll);
        assert_eq!(verdict.cause, None);
    }

    #[test]
    fn test_inactive_and_duplicate_are_other() {
        let resolver = resolver();
        let checker = ConflictChecker::new();
        let evaluator = RequestEvaluator::new(&resolver, &checker);

        let mut inactive = course("ART101", 5, 0, monday("15:00", "16:00"));
        inactive.is_active = false;
        let verdict = evaluator
            .evaluate(&inactive, &Transcript::default(), &[], &[])
            .unwrap();
        assert_eq!(verdict.cause, Some(RejectionCause::Other));
        assert_eq!(verdict.message, "course not active: ART101");

        let art = course("ART102", 5, 1, monday("15:00", "16:00"));
        let verdict = evaluator
            .evaluate(&art, &Transcript::default(), &[ScheduledCourse::from_course(&art)], &[])
            .unwrap();
        assert_eq!(verdict.cause, Some(RejectionCause::Other));
    }

    #[test]
    fn test_full_inactive_course_reports_quota() {
        let resolver = resolver();
        let checker = ConflictChecker::new();
        let evaluator = RequestEvaluator::new(&resolver, &checker);

        let mut closed = course("BIL202", 2, 2, monday("09:00", "10:50"));
        closed.is_active = false;
        let verdict = evaluator
            .evaluate(&closed, &transcript(LetterGrade::Ff), &[], &[])
            .unwrap();
        assert_eq!(verdict.cause, Some(RejectionCause::QuotaFull));
        assert_eq!(verdict.message, "quota full for BIL202 (2/2)");

        // 有空位但先修不足: 仍先报告先修
        closed.enrolled_count = 0;
        let verdict = evaluator
            .evaluate(&closed, &transcript(LetterGrade::Ff), &[], &[])
            .unwrap();
        assert_eq!(verdict.cause, Some(RejectionCause::Prerequisite));
    }

    #[test]
    fn test_malformed_session_is_an_error() {
        let resolver = resolver();
        let checker = ConflictChecker::new();
        let evaluator = RequestEvaluator::new(&resolver, &checker);

        let target = course("ART101", 5, 0, monday("3pm", "16:00"));
        let other = ScheduledCourse::from_course(&course("MAT101", 5, 1, monday("15:00", "16:00")));
        assert!(evaluator
            .evaluate(&target, &Transcript::default(), &[other], &[])
            .is_err());
    }
}
