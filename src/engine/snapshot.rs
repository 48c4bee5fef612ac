// ==========================================
// 选课席位分配系统 - 分配输入快照
// ==========================================
// 职责: 一次运行所需的全部内存状态（学生/成绩单/课程/申请/注册/候补）
// 来源: 仓储层加载,或测试直接构造
// 红线: 快照校验失败时不得开始任何提交
// ==========================================

use crate::domain::course::{Course, SeatConstraint};
use crate::domain::request::{CourseRequest, Enrollment, WaitlistEntry};
use crate::domain::student::{Student, Transcript};
use crate::engine::conflict_checker::ScheduledCourse;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::prerequisite::PrerequisiteGraph;
use crate::engine::schedule_conflict::ScheduleConflict;
use std::collections::{BTreeMap, HashMap, HashSet};

// ==========================================
// AllocationSnapshot - 分配输入快照
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct AllocationSnapshot {
    pub term: String,
    pub students: Vec<Student>,
    pub transcripts: HashMap<String, Transcript>, // student_id -> 成绩单
    pub courses: BTreeMap<String, Course>,        // course_code -> 课程
    pub requests: Vec<CourseRequest>,
    pub enrollments: Vec<Enrollment>,
    pub waitlist: Vec<WaitlistEntry>,
}

impl AllocationSnapshot {
    pub fn new(term: &str) -> Self {
        Self {
            term: term.to_string(),
            ..Default::default()
        }
    }

    pub fn add_course(&mut self, course: Course) {
        self.courses.insert(course.code.clone(), course);
    }

    pub fn student(&self, student_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.student_id == student_id)
    }

    pub fn transcript_of(&self, student_id: &str) -> Option<&Transcript> {
        self.transcripts.get(student_id)
    }

    /// 学生的 pending 申请下标（按 rank 升序,request_id 升序）
    pub fn pending_request_indices(&self, student_id: &str) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .requests
            .iter()
            .enumerate()
            .filter(|(_, r)| r.student_id == student_id && r.is_pending())
            .map(|(i, _)| i)
            .collect();
        indices.sort_by_key(|&i| (self.requests[i].rank, self.requests[i].request_id));
        indices
    }

    pub fn pending_count(&self, student_id: &str) -> usize {
        self.requests
            .iter()
            .filter(|r| r.student_id == student_id && r.is_pending())
            .count()
    }

    pub fn total_pending(&self) -> usize {
        self.requests.iter().filter(|r| r.is_pending()).count()
    }

    /// 学生在本学期已批准的课表（按注册顺序）
    pub fn approved_schedule_of(&self, student_id: &str) -> EngineResult<Vec<ScheduledCourse>> {
        self.enrollments
            .iter()
            .filter(|e| e.student_id == student_id && e.term == self.term && e.is_approved())
            .map(|e| {
                self.courses
                    .get(&e.course_code)
                    .map(ScheduledCourse::from_course)
                    .ok_or_else(|| EngineError::CourseNotFound {
                        course_code: e.course_code.clone(),
                    })
            })
            .collect()
    }

    /// 当前席位计数（course_code -> enrolled_count）
    pub fn seat_counts(&self) -> BTreeMap<String, u32> {
        self.courses
            .iter()
            .map(|(code, c)| (code.clone(), c.enrolled_count))
            .collect()
    }

    pub fn prerequisite_graph(&self) -> PrerequisiteGraph {
        PrerequisiteGraph::from_courses(self.courses.values())
    }

    pub fn active_course_count(&self) -> usize {
        self.courses.values().filter(|c| c.is_active).count()
    }

    pub fn full_course_count(&self) -> usize {
        self.courses.values().filter(|c| c.is_full()).count()
    }

    /// 所有课程满足席位不变式
    pub fn seat_invariants_hold(&self) -> bool {
        self.courses.values().all(|c| c.seat_invariant_holds())
    }

    // ==========================================
    // 输入契约校验
    // ==========================================

    /// 校验快照: 引用完整性、活跃申请唯一性、课时格式
    ///
    /// # 返回
    /// - Ok(()): 可以开始运行
    /// - Err: 第一个发现的脏数据
    pub fn validate(&self) -> EngineResult<()> {
        let schedule = ScheduleConflict::new();
        for course in self.courses.values() {
            for session in &course.sessions {
                schedule.validate_session(&course.code, session)?;
            }
        }

        let student_ids: HashSet<&str> =
            self.students.iter().map(|s| s.student_id.as_str()).collect();
        let mut active_pairs: HashSet<(&str, &str)> = HashSet::new();

        for request in &self.requests {
            if !student_ids.contains(request.student_id.as_str()) {
                return Err(EngineError::StudentNotFound {
                    student_id: request.student_id.clone(),
                });
            }
            if !self.courses.contains_key(&request.course_code) {
                return Err(EngineError::CourseNotFound {
                    course_code: request.course_code.clone(),
                });
            }
            if request.is_pending()
                && !active_pairs.insert((request.student_id.as_str(), request.course_code.as_str()))
            {
                return Err(EngineError::InvalidRank {
                    student_id: request.student_id.clone(),
                    course_code: request.course_code.clone(),
                });
            }
        }

        for enrollment in self.enrollments.iter().filter(|e| e.is_approved()) {
            if !self.courses.contains_key(&enrollment.course_code) {
                return Err(EngineError::CourseNotFound {
                    course_code: enrollment.course_code.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::course::Session;
    use crate::domain::types::{CourseType, EnrollmentStatus, SpecialStatus, Weekday};
    use chrono::Utc;

    fn course(code: &str, start: &str, end: &str) -> Course {
        Course {
            code: code.to_string(),
            name: code.to_string(),
            credit: 3,
            course_type: CourseType::Elective,
            is_active: true,
            quota: 10,
            enrolled_count: 0,
            is_open: true,
            sessions: vec![Session::new(Weekday::Tuesday, start, end)],
            prerequisites: vec![],
        }
    }

    fn student(id: &str) -> Student {
        Student {
            student_id: id.to_string(),
            class_level: 2,
            gpa: 3.0,
            remaining_courses: 20,
            special_status: SpecialStatus::None,
            is_active: true,
            is_admin: false,
            priority_score: 0.0,
        }
    }

    fn snapshot() -> AllocationSnapshot {
        let mut snap = AllocationSnapshot::new("2024-FALL");
        snap.students.push(student("S1"));
        snap.add_course(course("BIL101", "09:00", "10:00"));
        snap.add_course(course("MAT101", "10:00", "11:00"));
        snap
    }

    #[test]
    fn test_pending_indices_sorted_by_rank() {
        let mut snap = snapshot();
        snap.requests.push(CourseRequest::pending(1, "S1", "MAT101", 2));
        snap.requests.push(CourseRequest::pending(2, "S1", "BIL101", 1));

        let order: Vec<&str> = snap
            .pending_request_indices("S1")
            .into_iter()
            .map(|i| snap.requests[i].course_code.as_str())
            .collect();

        assert_eq!(order, vec!["BIL101", "MAT101"]);
        assert!(snap.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_active_request() {
        let mut snap = snapshot();
        snap.requests.push(CourseRequest::pending(1, "S1", "BIL101", 1));
        snap.requests.push(CourseRequest::pending(2, "S1", "BIL101", 2));

        assert!(matches!(snap.validate(), Err(EngineError::InvalidRank { .. })));
    }

    #[test]
    fn test_validate_rejects_dangling_references() {
        let mut snap = snapshot();
        snap.requests.push(CourseRequest::pending(1, "S404", "BIL101", 1));
        assert!(matches!(
            snap.validate(),
            Err(EngineError::StudentNotFound { .. })
        ));

        let mut snap = snapshot();
        snap.requests.push(CourseRequest::pending(1, "S1", "XXX999", 1));
        assert!(matches!(
            snap.validate(),
            Err(EngineError::CourseNotFound { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_malformed_session() {
        let mut snap = snapshot();
        snap.add_course(course("FIZ101", "25:00", "26:00"));
        assert!(matches!(
            snap.validate(),
            Err(EngineError::InvalidTimeFormat { .. })
        ));
    }

    #[test]
    fn test_approved_schedule_filters_term_and_status() {
        let mut snap = snapshot();
        let now = Utc::now();
        for (code, term, status) in [
            ("BIL101", "2024-FALL", EnrollmentStatus::Approved),
            ("MAT101", "2024-FALL", EnrollmentStatus::Dropped),
            ("MAT101", "2023-FALL", EnrollmentStatus::Approved),
        ] {
            snap.enrollments.push(Enrollment {
                student_id: "S1".to_string(),
                course_code: code.to_string(),
                term: term.to_string(),
                status,
                simulation_id: None,
                enrolled_at: now,
            });
        }

        let schedule = snap.approved_schedule_of("S1").unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].course_code, "BIL101");
    }
}
