// ==========================================
// 选课席位分配系统 - 申请 / 注册 / 候补 领域模型
// ==========================================
// 唯一性:
// - 每个 (student, course) 至多一条活跃申请
// - 每个 (student, course, term) 至多一条 approved 注册
// - 每个 (student, course) 至多一条候补记录
// ==========================================

use crate::domain::types::{
    EnrollmentStatus, RejectionCause, RequestStatus, WaitlistStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// CourseRequest - 选课申请
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRequest {
    pub request_id: i64,
    pub student_id: String,
    pub course_code: String,
    pub rank: i32,          // 学生自定顺序,越小越优先
    pub is_mandatory: bool, // 仅诊断型冲突裁决使用

    // ===== 处理结果 =====
    pub status: RequestStatus,
    pub rejection_cause: Option<RejectionCause>,
    pub rejection_reason: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl CourseRequest {
    pub fn pending(request_id: i64, student_id: &str, course_code: &str, rank: i32) -> Self {
        Self {
            request_id,
            student_id: student_id.to_string(),
            course_code: course_code.to_string(),
            rank,
            is_mandatory: false,
            status: RequestStatus::Pending,
            rejection_cause: None,
            rejection_reason: None,
            processed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    pub(crate) fn approve(&mut self, now: DateTime<Utc>) {
        self.status = RequestStatus::Approved;
        self.rejection_cause = None;
        self.rejection_reason = None;
        self.processed_at = Some(now);
    }

    pub(crate) fn reject(&mut self, cause: RejectionCause, reason: String, now: DateTime<Utc>) {
        self.status = RequestStatus::Rejected;
        self.rejection_cause = Some(cause);
        self.rejection_reason = Some(reason);
        self.processed_at = Some(now);
    }

    /// 回退为 pending（reset 契约）
    pub(crate) fn revert_to_pending(&mut self) {
        self.status = RequestStatus::Pending;
        self.rejection_cause = None;
        self.rejection_reason = None;
        self.processed_at = None;
    }
}

// ==========================================
// Enrollment - 注册记录 (仅由分配引擎创建)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: String,
    pub course_code: String,
    pub term: String,
    pub status: EnrollmentStatus,
    pub simulation_id: Option<String>, // 创建该记录的运行ID (外部导入为 None)
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn is_approved(&self) -> bool {
        self.status == EnrollmentStatus::Approved
    }
}

// ==========================================
// WaitlistEntry - 候补记录 (仅由分配引擎创建)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub student_id: String,
    pub course_code: String,
    pub position: u32, // 1 起始,稠密
    pub status: WaitlistStatus,
    pub added_at: DateTime<Utc>,
}

impl WaitlistEntry {
    pub fn is_waiting(&self) -> bool {
        self.status == WaitlistStatus::Waiting
    }
}
