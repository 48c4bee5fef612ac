// ==========================================
// 选课席位分配系统 - 单个学生分配引擎
// ==========================================
// 职责: 对一个学生按 rank 升序单向扫描其 pending 申请
// 状态: pending -> approved | rejected(可附带候补)
// 规则:
// - 可准入 => 占用席位,创建注册,记入本轮已授予课表
// - 名额满且候补开启 => 尝试入队,原因为候补结果
// - 其他 => 以判定消息拒绝
// 红线: 已决申请不再回看; 后续申请不能挤掉前面的申请
// ==========================================

use crate::config::allocation_config::AllocationConfig;
use crate::domain::request::Enrollment;
use crate::domain::simulation::{CauseTally, RejectionDetail, SimulationResult};
use crate::domain::student::Transcript;
use crate::domain::types::{EnrollmentStatus, RejectionCause};
use crate::engine::conflict_checker::{ConflictChecker, ScheduledCourse};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::evaluator::RequestEvaluator;
use crate::engine::prerequisite::PrerequisiteResolver;
use crate::engine::snapshot::AllocationSnapshot;
use crate::engine::waitlist::WaitlistManager;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

// ==========================================
// AllocationEngine - 单个学生分配引擎
// ==========================================
pub struct AllocationEngine<'a> {
    evaluator: RequestEvaluator<'a>,
    config: &'a AllocationConfig,
}

impl<'a> AllocationEngine<'a> {
    pub fn new(
        resolver: &'a PrerequisiteResolver,
        checker: &'a ConflictChecker,
        config: &'a AllocationConfig,
    ) -> Self {
        Self {
            evaluator: RequestEvaluator::new(resolver, checker),
            config,
        }
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 处理一个学生的全部 pending 申请
    ///
    /// # 参数
    /// - `snapshot`: 运行状态（课程席位、申请、注册会被修改）
    /// - `waitlist`: 候补队列
    /// - `student_id`: 学生
    /// - `simulation_id`: 当前运行ID（写入新注册记录）
    /// - `now`: 处理时间
    ///
    /// # 返回
    /// - Ok(SimulationResult): 该学生的结果行
    /// - Err: 学生/课程不存在或课时格式错误（提交任何变更之前发现）
    #[instrument(skip(self, snapshot, waitlist, now))]
    pub fn process_student(
        &self,
        snapshot: &mut AllocationSnapshot,
        waitlist: &mut WaitlistManager,
        student_id: &str,
        simulation_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<SimulationResult> {
        let priority_score = snapshot
            .student(student_id)
            .map(|s| s.priority_score)
            .ok_or_else(|| EngineError::StudentNotFound {
                student_id: student_id.to_string(),
            })?;

        let approved_schedule = snapshot.approved_schedule_of(student_id)?;
        let indices = snapshot.pending_request_indices(student_id);

        // 提交前确认所有申请课程存在,避免半途失败
        for &idx in &indices {
            let code = &snapshot.requests[idx].course_code;
            if !snapshot.courses.contains_key(code) {
                return Err(EngineError::CourseNotFound {
                    course_code: code.clone(),
                });
            }
        }

        let empty = Transcript::default();
        let transcript = snapshot.transcripts.get(student_id).unwrap_or(&empty);

        let mut granted: Vec<ScheduledCourse> = Vec::new();
        let mut tally = CauseTally::default();
        let mut details: Vec<RejectionDetail> = Vec::new();
        let mut approved = 0u32;
        let mut waitlisted = 0u32;

        for &idx in &indices {
            let code = snapshot.requests[idx].course_code.clone();
            let course = snapshot
                .courses
                .get_mut(&code)
                .ok_or_else(|| EngineError::CourseNotFound {
                    course_code: code.clone(),
                })?;

            let verdict = self
                .evaluator
                .evaluate(course, transcript, &approved_schedule, &granted)?;

            if verdict.can_enroll {
                // 提交: 占座 + 本轮课表 + 注册 + 申请状态
                course.take_seat();
                granted.push(ScheduledCourse::from_course(course));
                snapshot.enrollments.push(Enrollment {
                    student_id: student_id.to_string(),
                    course_code: code.clone(),
                    term: snapshot.term.clone(),
                    status: EnrollmentStatus::Approved,
                    simulation_id: Some(simulation_id.to_string()),
                    enrolled_at: now,
                });
                snapshot.requests[idx].approve(now);
                approved += 1;
                debug!(course_code = %code, "申请通过");
                continue;
            }

            let cause = verdict.cause.unwrap_or(RejectionCause::Other);
            let mut reason = verdict.message;

            if cause == RejectionCause::QuotaFull && self.config.waitlist_enabled {
                let outcome = waitlist.enqueue(student_id, &code, now);
                if outcome.success {
                    waitlisted += 1;
                } else {
                    warn!(course_code = %code, message = %outcome.message, "候补入队失败");
                }
                reason = outcome.message;
            }

            debug!(course_code = %code, cause = %cause, "申请被拒");
            tally.record(cause);
            details.push(RejectionDetail {
                course_code: code,
                cause,
                reason: reason.clone(),
            });
            snapshot.requests[idx].reject(cause, reason, now);
        }

        Ok(SimulationResult {
            simulation_id: simulation_id.to_string(),
            student_id: student_id.to_string(),
            requested_courses: indices.len() as u32,
            approved_courses: approved,
            rejected_courses: tally.total(),
            waitlisted_courses: waitlisted,
            cause_tally: tally,
            rejection_details: details,
            priority_score_at_simulation: priority_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::course::{Course, PrerequisiteEdge, SeatConstraint, Session};
    use crate::domain::request::CourseRequest;
    use crate::domain::student::Student;
    use crate::domain::types::{
        CourseType, LetterGrade, RequestStatus, SpecialStatus, Weekday,
    };

    fn course(code: &str, quota: u32, day: Weekday, start: &str, end: &str) -> Course {
        Course {
            code: code.to_string(),
            name: code.to_string(),
            credit: 3,
            course_type: CourseType::Required,
            is_active: true,
            quota,
            enrolled_count: 0,
            is_open: quota > 0,
            sessions: vec![Session::new(day, start, end)],
            prerequisites: vec![],
        }
    }

    fn student(id: &str, score: f64) -> Student {
        Student {
            student_id: id.to_string(),
            class_level: 3,
            gpa: 3.0,
            remaining_courses: 10,
            special_status: SpecialStatus::None,
            is_active: true,
            is_admin: false,
            priority_score: score,
        }
    }

    fn run(
        snapshot: &mut AllocationSnapshot,
        waitlist: &mut WaitlistManager,
        config: &AllocationConfig,
        student_id: &str,
    ) -> SimulationResult {
        let resolver = PrerequisiteResolver::new(snapshot.prerequisite_graph());
        let checker = ConflictChecker::new();
        let engine = AllocationEngine::new(&resolver, &checker, config);
        engine
            .process_student(snapshot, waitlist, student_id, "SIM-T", Utc::now())
            .unwrap()
    }

    #[test]
    fn test_conflict_with_earlier_grant_in_same_pass() {
        let mut snap = AllocationSnapshot::new("2024-FALL");
        snap.students.push(student("S1", 50.0));
        snap.add_course(course("BIL101", 10, Weekday::Monday, "09:00", "10:50"));
        snap.add_course(course("MAT101", 10, Weekday::Monday, "09:00", "10:50"));
        snap.requests.push(CourseRequest::pending(1, "S1", "BIL101", 1));
        snap.requests.push(CourseRequest::pending(2, "S1", "MAT101", 2));

        let config = AllocationConfig::default();
        let mut waitlist = WaitlistManager::new(config.waitlist_max_size);
        let result = run(&mut snap, &mut waitlist, &config, "S1");

        assert_eq!(result.approved_courses, 1);
        assert_eq!(result.cause_tally.conflict, 1);
        assert_eq!(result.rejection_details[0].reason, "time conflict with BIL101");
        assert_eq!(snap.requests[0].status, RequestStatus::Approved);
        assert_eq!(snap.requests[1].status, RequestStatus::Rejected);
        assert_eq!(snap.courses["MAT101"].enrolled_count, 0);
        assert_eq!(snap.enrollments.len(), 1);
        assert_eq!(snap.enrollments[0].simulation_id.as_deref(), Some("SIM-T"));
    }

    #[test]
    fn test_quota_full_goes_to_waitlist() {
        let mut snap = AllocationSnapshot::new("2024-FALL");
        snap.students.push(student("S1", 90.0));
        snap.students.push(student("S2", 80.0));
        snap.add_course(course("BIL202", 1, Weekday::Friday, "13:00", "14:50"));
        snap.requests.push(CourseRequest::pending(1, "S1", "BIL202", 1));
        snap.requests.push(CourseRequest::pending(2, "S2", "BIL202", 1));

        let config = AllocationConfig::default();
        let mut waitlist = WaitlistManager::new(config.waitlist_max_size);
        run(&mut snap, &mut waitlist, &config, "S1");
        let second = run(&mut snap, &mut waitlist, &config, "S2");

        assert_eq!(second.waitlisted_courses, 1);
        assert_eq!(second.cause_tally.quota_full, 1);
        assert_eq!(
            snap.requests[1].rejection_reason.as_deref(),
            Some("quota full - waitlisted at position 1")
        );
        assert_eq!(snap.requests[1].rejection_cause, Some(RejectionCause::QuotaFull));
        assert!(snap.courses["BIL202"].is_full());
        assert!(!snap.courses["BIL202"].is_open);
    }

    #[test]
    fn test_waitlist_disabled_keeps_evaluator_message() {
        let mut snap = AllocationSnapshot::new("2024-FALL");
        snap.students.push(student("S1", 90.0));
        snap.add_course(course("BIL202", 0, Weekday::Friday, "13:00", "14:50"));
        snap.requests.push(CourseRequest::pending(1, "S1", "BIL202", 1));

        let config = AllocationConfig::default().without_waitlist();
        let mut waitlist = WaitlistManager::new(config.waitlist_max_size);
        let result = run(&mut snap, &mut waitlist, &config, "S1");

        assert_eq!(result.waitlisted_courses, 0);
        assert!(result.rejection_details[0].reason.starts_with("quota full for BIL202"));
        assert!(waitlist.entries().is_empty());
    }

    #[test]
    fn test_prerequisite_rejection_does_not_take_seat() {
        let mut snap = AllocationSnapshot::new("2024-FALL");
        snap.students.push(student("S1", 90.0));
        let mut target = course("BIL202", 5, Weekday::Monday, "09:00", "10:50");
        target
            .prerequisites
            .push(PrerequisiteEdge::required("BIL202", "BIL201", LetterGrade::Dd));
        snap.add_course(target);
        snap.requests.push(CourseRequest::pending(1, "S1", "BIL202", 1));

        let config = AllocationConfig::default();
        let mut waitlist = WaitlistManager::new(config.waitlist_max_size);
        let result = run(&mut snap, &mut waitlist, &config, "S1");

        assert_eq!(result.cause_tally.prerequisite, 1);
        assert_eq!(snap.courses["BIL202"].enrolled_count, 0);
        assert!(snap.enrollments.is_empty());
    }

    #[test]
    fn test_unknown_student_is_error() {
        let mut snap = AllocationSnapshot::new("2024-FALL");
        let config = AllocationConfig::default();
        let resolver = PrerequisiteResolver::new(snap.prerequisite_graph());
        let checker = ConflictChecker::new();
        let engine = AllocationEngine::new(&resolver, &checker, &config);
        let mut waitlist = WaitlistManager::new(2);

        let err = engine
            .process_student(&mut snap, &mut waitlist, "S404", "SIM-T", Utc::now())
            .unwrap_err();
        assert!(matches!(err, EngineError::StudentNotFound { .. }));
    }
}
