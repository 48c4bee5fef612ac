// ==========================================
// 选课席位分配系统 - 模拟运行结果领域模型
// ==========================================
// 红线: 派生平均值只在运行结束时由原始计数一次性计算,不做增量累加
// ==========================================

use crate::domain::types::RejectionCause;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// RejectionDetail - 单条拒绝明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionDetail {
    pub course_code: String,
    pub cause: RejectionCause,
    pub reason: String,
}

// ==========================================
// CauseTally - 拒绝原因计数
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauseTally {
    pub quota_full: u32,
    pub prerequisite: u32,
    pub conflict: u32,
    pub other: u32,
}

impl CauseTally {
    pub fn record(&mut self, cause: RejectionCause) {
        match cause {
            RejectionCause::QuotaFull => self.quota_full += 1,
            RejectionCause::Prerequisite => self.prerequisite += 1,
            RejectionCause::Conflict => self.conflict += 1,
            RejectionCause::Other => self.other += 1,
        }
    }

    pub fn merge(&mut self, other: &CauseTally) {
        self.quota_full += other.quota_full;
        self.prerequisite += other.prerequisite;
        self.conflict += other.conflict;
        self.other += other.other;
    }

    pub fn total(&self) -> u32 {
        self.quota_full + self.prerequisite + self.conflict + self.other
    }
}

// ==========================================
// SimulationResult - 单个学生的运行结果行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub simulation_id: String,
    pub student_id: String,
    pub requested_courses: u32,
    pub approved_courses: u32,
    pub rejected_courses: u32,
    pub waitlisted_courses: u32,
    pub cause_tally: CauseTally,
    pub rejection_details: Vec<RejectionDetail>,
    pub priority_score_at_simulation: f64,
}

// ==========================================
// SimulationMetrics - 单次运行指标
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetrics {
    pub simulation_id: String,
    pub term: String,

    // ===== 总量 =====
    pub total_students: u32,
    pub total_courses: u32,
    pub total_requests: u32,

    // ===== 通过 / 拒绝 =====
    pub total_approved: u32,
    pub total_rejected: u32,

    // ===== 拒绝原因分桶 =====
    pub rejected_quota: u32,
    pub rejected_conflict: u32,
    pub rejected_prerequisite: u32,
    pub rejected_other: u32,

    // ===== 课程 / 候补 =====
    pub courses_full: u32,
    pub total_waitlist: u32,

    // ===== 派生平均值 =====
    pub avg_courses_per_student: f64,
    pub avg_approval_rate: f64, // 百分比

    // ===== 耗时 =====
    pub processing_time_seconds: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SimulationMetrics {
    pub fn new(simulation_id: &str, term: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            simulation_id: simulation_id.to_string(),
            term: term.to_string(),
            total_students: 0,
            total_courses: 0,
            total_requests: 0,
            total_approved: 0,
            total_rejected: 0,
            rejected_quota: 0,
            rejected_conflict: 0,
            rejected_prerequisite: 0,
            rejected_other: 0,
            courses_full: 0,
            total_waitlist: 0,
            avg_courses_per_student: 0.0,
            avg_approval_rate: 0.0,
            processing_time_seconds: 0.0,
            started_at,
            completed_at: None,
        }
    }

    /// 计算派生平均值（只在运行结束时调用一次）
    pub fn calculate_averages(&mut self) {
        self.avg_courses_per_student = if self.total_students > 0 {
            self.total_approved as f64 / self.total_students as f64
        } else {
            0.0
        };

        self.avg_approval_rate = if self.total_requests > 0 {
            self.total_approved as f64 / self.total_requests as f64 * 100.0
        } else {
            0.0
        };
    }

    /// 拒绝原因分桶视图
    pub fn cause_tally(&self) -> CauseTally {
        CauseTally {
            quota_full: self.rejected_quota,
            prerequisite: self.rejected_prerequisite,
            conflict: self.rejected_conflict,
            other: self.rejected_other,
        }
    }

    /// 比较两次运行的分配结果（忽略运行ID与时间字段）
    pub fn same_outcome(&self, other: &SimulationMetrics) -> bool {
        self.term == other.term
            && self.total_students == other.total_students
            && self.total_courses == other.total_courses
            && self.total_requests == other.total_requests
            && self.total_approved == other.total_approved
            && self.total_rejected == other.total_rejected
            && self.cause_tally() == other.cause_tally()
            && self.courses_full == other.courses_full
            && self.total_waitlist == other.total_waitlist
            && self.avg_courses_per_student == other.avg_courses_per_student
            && self.avg_approval_rate == other.avg_approval_rate
    }
}

// ==========================================
// RunCheckpoint - 运行前快照 (reset 契约)
// ==========================================
// 记录运行前的席位计数和本次处理过的申请,用于精确回退
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCheckpoint {
    pub simulation_id: String,
    pub term: String,
    pub enrolled_counts: BTreeMap<String, u32>,
    pub processed_request_ids: Vec<i64>,
    pub config_snapshot_json: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_averages_from_raw_counters() {
        let mut m = SimulationMetrics::new("SIM1", "2024-FALL", Utc::now());
        m.total_students = 4;
        m.total_requests = 10;
        m.total_approved = 6;

        m.calculate_averages();

        assert_eq!(m.avg_courses_per_student, 1.5);
        assert_eq!(m.avg_approval_rate, 60.0);
    }

    #[test]
    fn test_calculate_averages_with_zero_population() {
        let mut m = SimulationMetrics::new("SIM1", "2024-FALL", Utc::now());
        m.calculate_averages();
        assert_eq!(m.avg_courses_per_student, 0.0);
        assert_eq!(m.avg_approval_rate, 0.0);
    }

    #[test]
    fn test_cause_tally_merge_and_total() {
        let mut a = CauseTally::default();
        a.record(RejectionCause::QuotaFull);
        a.record(RejectionCause::Conflict);

        let mut b = CauseTally::default();
        b.record(RejectionCause::QuotaFull);
        b.record(RejectionCause::Other);

        a.merge(&b);

        assert_eq!(a.quota_full, 2);
        assert_eq!(a.conflict, 1);
        assert_eq!(a.other, 1);
        assert_eq!(a.total(), 4);
    }
}
