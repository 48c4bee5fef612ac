// ==========================================
// 选课席位分配系统 - 课表冲突检查
// ==========================================
// 职责: 学生已定课表 vs 候选课程的全配对课时比较
// 模式:
// - check: 分配引擎使用,按已定顺序遇到第一个冲突课程即返回
// - full_report: 诊断使用,穷举所有冲突课时对
// 红线: 同一课程内部的课时不互相比较
// ==========================================

use crate::domain::course::{Course, Session};
use crate::domain::request::{CourseRequest, Enrollment};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::schedule_conflict::ScheduleConflict;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;

// ==========================================
// ScheduledCourse - 已定课表中的一门课
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCourse {
    pub course_code: String,
    pub sessions: Vec<Session>,
}

impl ScheduledCourse {
    pub fn from_course(course: &Course) -> Self {
        Self {
            course_code: course.code.clone(),
            sessions: course.sessions.clone(),
        }
    }
}

// ==========================================
// SessionConflict - 一对冲突课时
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConflict {
    pub existing_course: String,
    pub existing_session: Session,
    pub candidate_course: String,
    pub candidate_session: Session,
    pub time_overlap: String, // "HH:MM-HH:MM"
}

// ==========================================
// ConflictCheck - 冲突检查结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictCheck {
    pub has_conflict: bool,
    pub first_conflicting_course: Option<String>,
    pub details: Vec<SessionConflict>,
}

impl ConflictCheck {
    fn clear() -> Self {
        Self {
            has_conflict: false,
            first_conflicting_course: None,
            details: Vec::new(),
        }
    }
}

// ==========================================
// 诊断输出类型
// ==========================================

/// 待处理申请之间的冲突对（按 rank 顺序,request1 在前）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestConflict {
    pub course1: String,
    pub course2: String,
    pub request1_rank: i32,
    pub request2_rank: i32,
    pub request1_mandatory: bool,
    pub request2_mandatory: bool,
    pub details: Vec<SessionConflict>,
}

/// 冲突裁决结果（仅诊断）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub keep_course: String,
    pub drop_course: String,
    pub reason: String,
}

/// 已批准课程之间的冲突对
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolledConflict {
    pub course1: String,
    pub course2: String,
    pub details: Vec<SessionConflict>,
}

/// 学生冲突报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub student_id: String,
    pub pending_conflicts: Vec<RequestConflict>,
    pub enrolled_conflicts: Vec<EnrolledConflict>,
    pub total_pending_conflicts: usize,
    pub total_enrolled_conflicts: usize,
}

// ==========================================
// ConflictChecker - 课表冲突检查器
// ==========================================
pub struct ConflictChecker {
    schedule: ScheduleConflict,
}

impl ConflictChecker {
    pub fn new() -> Self {
        Self {
            schedule: ScheduleConflict::new(),
        }
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 分配模式检查: 在已定顺序中返回第一个冲突课程
    ///
    /// # 参数
    /// - `existing`: 已定课表（已批准注册 + 本轮已授予,按提交顺序）
    /// - `candidate_code`: 候选课程代码
    /// - `candidate_sessions`: 候选课程课时
    ///
    /// # 返回
    /// - has_conflict=false: 可加入
    /// - has_conflict=true: first_conflicting_course 为第一个冲突课程,details 为首个冲突课时对
    pub fn check(
        &self,
        existing: &[ScheduledCourse],
        candidate_code: &str,
        candidate_sessions: &[Session],
    ) -> EngineResult<ConflictCheck> {
        for committed in existing {
            if committed.course_code == candidate_code {
                continue;
            }

            if let Some(conflict) =
                self.first_pair(committed, candidate_code, candidate_sessions)?
            {
                return Ok(ConflictCheck {
                    has_conflict: true,
                    first_conflicting_course: Some(committed.course_code.clone()),
                    details: vec![conflict],
                });
            }
        }

        Ok(ConflictCheck::clear())
    }

    /// 诊断模式检查: 穷举所有冲突课时对
    #[instrument(skip(self, existing, candidate_sessions), fields(
        candidate = %candidate_code,
        existing_count = existing.len()
    ))]
    pub fn full_report(
        &self,
        existing: &[ScheduledCourse],
        candidate_code: &str,
        candidate_sessions: &[Session],
    ) -> EngineResult<ConflictCheck> {
        let mut result = ConflictCheck::clear();

        for committed in existing {
            if committed.course_code == candidate_code {
                continue;
            }

            let pairs = self.all_pairs(
                &committed.course_code,
                &committed.sessions,
                candidate_code,
                candidate_sessions,
            )?;

            if !pairs.is_empty() {
                if result.first_conflicting_course.is_none() {
                    result.first_conflicting_course = Some(committed.course_code.clone());
                }
                result.details.extend(pairs);
            }
        }

        result.has_conflict = !result.details.is_empty();
        Ok(result)
    }

    fn first_pair(
        &self,
        committed: &ScheduledCourse,
        candidate_code: &str,
        candidate_sessions: &[Session],
    ) -> EngineResult<Option<SessionConflict>> {
        for existing_session in &committed.sessions {
            for candidate_session in candidate_sessions {
                if let Some(window) = self
                    .schedule
                    .overlap_window(existing_session, candidate_session)?
                {
                    return Ok(Some(SessionConflict {
                        existing_course: committed.course_code.clone(),
                        existing_session: existing_session.clone(),
                        candidate_course: candidate_code.to_string(),
                        candidate_session: candidate_session.clone(),
                        time_overlap: window,
                    }));
                }
            }
        }
        Ok(None)
    }

    fn all_pairs(
        &self,
        code_a: &str,
        sessions_a: &[Session],
        code_b: &str,
        sessions_b: &[Session],
    ) -> EngineResult<Vec<SessionConflict>> {
        let mut pairs = Vec::new();
        for session_a in sessions_a {
            for session_b in sessions_b {
                if let Some(window) = self.schedule.overlap_window(session_a, session_b)? {
                    pairs.push(SessionConflict {
                        existing_course: code_a.to_string(),
                        existing_session: session_a.clone(),
                        candidate_course: code_b.to_string(),
                        candidate_session: session_b.clone(),
                        time_overlap: window,
                    });
                }
            }
        }
        Ok(pairs)
    }

    // ==========================================
    // 诊断方法（不参与分配）
    // ==========================================

    /// 两门课程之间的所有冲突课时对
    pub fn courses_conflict(&self, a: &Course, b: &Course) -> EngineResult<Vec<SessionConflict>> {
        if a.code == b.code {
            return Ok(Vec::new());
        }
        self.all_pairs(&a.code, &a.sessions, &b.code, &b.sessions)
    }

    /// 学生待处理申请之间的冲突对（按 rank 升序两两比较）
    pub fn check_request_list(
        &self,
        requests: &[CourseRequest],
        catalog: &BTreeMap<String, Course>,
    ) -> EngineResult<Vec<RequestConflict>> {
        let mut pending: Vec<&CourseRequest> = requests.iter().filter(|r| r.is_pending()).collect();
        pending.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.request_id.cmp(&b.request_id)));

        let mut conflicts = Vec::new();
        for i in 0..pending.len() {
            for j in (i + 1)..pending.len() {
                let first = pending[i];
                let second = pending[j];
                let course1 = lookup(catalog, &first.course_code)?;
                let course2 = lookup(catalog, &second.course_code)?;

                let details = self.courses_conflict(course1, course2)?;
                if !details.is_empty() {
                    conflicts.push(RequestConflict {
                        course1: course1.code.clone(),
                        course2: course2.code.clone(),
                        request1_rank: first.rank,
                        request2_rank: second.rank,
                        request1_mandatory: first.is_mandatory,
                        request2_mandatory: second.is_mandatory,
                        details,
                    });
                }
            }
        }

        Ok(conflicts)
    }

    /// 冲突裁决（仅诊断,分配引擎不使用）
    ///
    /// 规则（按顺序）:
    /// 1) mandatory 申请胜过非 mandatory 申请
    /// 2) rank 小者胜
    /// 3) 课程类型: required > technical_elective > elective; 仍相同则保留 course2
    pub fn resolve_conflict(
        &self,
        pair: &RequestConflict,
        catalog: &BTreeMap<String, Course>,
    ) -> EngineResult<ConflictResolution> {
        let decide = |keep: &str, drop: &str, reason: String| ConflictResolution {
            keep_course: keep.to_string(),
            drop_course: drop.to_string(),
            reason,
        };

        // 规则1: mandatory
        if pair.request1_mandatory && !pair.request2_mandatory {
            return Ok(decide(
                &pair.course1,
                &pair.course2,
                format!("{} is marked mandatory", pair.course1),
            ));
        }
        if pair.request2_mandatory && !pair.request1_mandatory {
            return Ok(decide(
                &pair.course2,
                &pair.course1,
                format!("{} is marked mandatory", pair.course2),
            ));
        }

        // 规则2: rank
        if pair.request1_rank < pair.request2_rank {
            return Ok(decide(
                &pair.course1,
                &pair.course2,
                format!("{} has higher preference (rank {})", pair.course1, pair.request1_rank),
            ));
        }
        if pair.request2_rank < pair.request1_rank {
            return Ok(decide(
                &pair.course2,
                &pair.course1,
                format!("{} has higher preference (rank {})", pair.course2, pair.request2_rank),
            ));
        }

        // 规则3: 课程类型
        let type1 = lookup(catalog, &pair.course1)?.course_type;
        let type2 = lookup(catalog, &pair.course2)?.course_type;
        if type1.resolution_rank() < type2.resolution_rank() {
            Ok(decide(
                &pair.course1,
                &pair.course2,
                format!("{} is a {} course", pair.course1, type1),
            ))
        } else {
            Ok(decide(
                &pair.course2,
                &pair.course1,
                format!("{} is a {} course", pair.course2, type2),
            ))
        }
    }

    /// 学生冲突报告: 待处理申请之间 + 已批准注册之间
    #[instrument(skip(self, catalog, enrollments, requests), fields(student_id = %student_id))]
    pub fn conflict_report(
        &self,
        student_id: &str,
        catalog: &BTreeMap<String, Course>,
        enrollments: &[Enrollment],
        requests: &[CourseRequest],
    ) -> EngineResult<ConflictReport> {
        let own_requests: Vec<CourseRequest> = requests
            .iter()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect();
        let pending_conflicts = self.check_request_list(&own_requests, catalog)?;

        let approved: Vec<&Enrollment> = enrollments
            .iter()
            .filter(|e| e.student_id == student_id && e.is_approved())
            .collect();

        let mut enrolled_conflicts = Vec::new();
        for i in 0..approved.len() {
            for j in (i + 1)..approved.len() {
                let course1 = lookup(catalog, &approved[i].course_code)?;
                let course2 = lookup(catalog, &approved[j].course_code)?;
                let details = self.courses_conflict(course1, course2)?;
                if !details.is_empty() {
                    enrolled_conflicts.push(EnrolledConflict {
                        course1: course1.code.clone(),
                        course2: course2.code.clone(),
                        details,
                    });
                }
            }
        }

        Ok(ConflictReport {
            student_id: student_id.to_string(),
            total_pending_conflicts: pending_conflicts.len(),
            total_enrolled_conflicts: enrolled_conflicts.len(),
            pending_conflicts,
            enrolled_conflicts,
        })
    }
}

impl Default for ConflictChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup<'a>(catalog: &'a BTreeMap<String, Course>, code: &str) -> EngineResult<&'a Course> {
    catalog.get(code).ok_or_else(|| EngineError::CourseNotFound {
        course_code: code.to_string(),
    })
}
