// ==========================================
// 选课席位分配系统 - 运行指标汇总与详细报告
// ==========================================
// 职责:
// - MetricsCollector: 逐个累加学生结果行,运行结束时一次性收尾
// - detailed_report: 学生/课程/拒绝原因三个维度的分析
// 红线: 拒绝分桶只按 RejectionCause 枚举计数,不解析消息文本
// ==========================================

use crate::domain::course::{Course, SeatConstraint};
use crate::domain::simulation::{SimulationMetrics, SimulationResult};
use crate::domain::types::RejectionCause;
use crate::engine::snapshot::AllocationSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 报告中最多/最少选课课程的条数
pub const REPORT_TOP_N: usize = 10;

// ==========================================
// MetricsCollector - 指标累加器
// ==========================================
pub struct MetricsCollector {
    metrics: SimulationMetrics,
}

impl MetricsCollector {
    /// # 参数
    /// - `total_students`: 参与排序的可分配学生数
    /// - `total_courses`: 活跃课程数
    pub fn new(
        simulation_id: &str,
        term: &str,
        started_at: DateTime<Utc>,
        total_students: u32,
        total_courses: u32,
    ) -> Self {
        let mut metrics = SimulationMetrics::new(simulation_id, term, started_at);
        metrics.total_students = total_students;
        metrics.total_courses = total_courses;
        Self { metrics }
    }

    /// 累加一个学生的结果行
    pub fn record(&mut self, result: &SimulationResult) {
        let m = &mut self.metrics;
        m.total_requests += result.requested_courses;
        m.total_approved += result.approved_courses;
        m.total_rejected += result.rejected_courses;
        m.rejected_quota += result.cause_tally.quota_full;
        m.rejected_prerequisite += result.cause_tally.prerequisite;
        m.rejected_conflict += result.cause_tally.conflict;
        m.rejected_other += result.cause_tally.other;
        m.total_waitlist += result.waitlisted_courses;
    }

    pub fn current(&self) -> &SimulationMetrics {
        &self.metrics
    }

    /// 收尾: 满员课程数（运行后）、派生平均值、耗时
    pub fn finish(
        mut self,
        snapshot: &AllocationSnapshot,
        completed_at: DateTime<Utc>,
        processing_time_seconds: f64,
    ) -> SimulationMetrics {
        self.metrics.courses_full = snapshot
            .courses
            .values()
            .filter(|c| c.is_active && c.is_full())
            .count() as u32;
        self.metrics.calculate_averages();
        self.metrics.processing_time_seconds = processing_time_seconds;
        self.metrics.completed_at = Some(completed_at);
        self.metrics
    }
}

// ==========================================
// 详细报告类型
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAnalysis {
    pub full_enrollment: u32,    // 无拒绝且至少一门通过
    pub partial_enrollment: u32, // 有通过也有拒绝
    pub no_enrollment: u32,      // 一门都没有通过
    pub success_rate: f64,       // full / 结果行数 * 100,一位小数
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseFill {
    pub code: String,
    pub name: String,
    pub quota: u32,
    pub enrolled: u32,
    pub fill_rate: f64,
    pub is_full: bool,
}

impl CourseFill {
    fn from_course(course: &Course) -> Self {
        Self {
            code: course.code.clone(),
            name: course.name.clone(),
            quota: course.quota,
            enrolled: course.enrolled_count,
            fill_rate: course.fill_percentage(),
            is_full: course.is_full(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseAnalysis {
    pub total_courses: u32,
    pub full_courses: u32,
    pub empty_courses: u32,
    pub most_enrolled: Vec<CourseFill>,
    pub least_enrolled: Vec<CourseFill>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionShare {
    pub cause: RejectionCause,
    pub count: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedReport {
    pub metrics: SimulationMetrics,
    pub student_analysis: StudentAnalysis,
    pub course_analysis: CourseAnalysis,
    pub rejection_breakdown: Vec<RejectionShare>,
}

// ==========================================
// 报告生成
// ==========================================

/// 生成详细报告
///
/// # 参数
/// - `metrics`: 运行指标
/// - `results`: 该运行的学生结果行
/// - `courses`: 运行后的课程状态（只统计活跃课程）
pub fn detailed_report<'a, I>(
    metrics: &SimulationMetrics,
    results: &[SimulationResult],
    courses: I,
) -> DetailedReport
where
    I: IntoIterator<Item = &'a Course>,
{
    DetailedReport {
        metrics: metrics.clone(),
        student_analysis: analyze_students(results),
        course_analysis: analyze_courses(courses),
        rejection_breakdown: rejection_breakdown(metrics),
    }
}

fn analyze_students(results: &[SimulationResult]) -> StudentAnalysis {
    let mut full = 0u32;
    let mut partial = 0u32;
    let mut none = 0u32;

    for result in results {
        if result.rejected_courses == 0 && result.approved_courses > 0 {
            full += 1;
        } else if result.approved_courses > 0 {
            partial += 1;
        } else {
            none += 1;
        }
    }

    let success_rate = if results.is_empty() {
        0.0
    } else {
        round1(full as f64 / results.len() as f64 * 100.0)
    };

    StudentAnalysis {
        full_enrollment: full,
        partial_enrollment: partial,
        no_enrollment: none,
        success_rate,
    }
}

fn analyze_courses<'a, I>(courses: I) -> CourseAnalysis
where
    I: IntoIterator<Item = &'a Course>,
{
    let stats: Vec<CourseFill> = courses
        .into_iter()
        .filter(|c| c.is_active)
        .map(CourseFill::from_course)
        .collect();

    // 稳定排序,同人数保持输入顺序
    let mut most = stats.clone();
    most.sort_by(|a, b| b.enrolled.cmp(&a.enrolled));
    most.truncate(REPORT_TOP_N);

    let mut least = stats.clone();
    least.sort_by(|a, b| a.enrolled.cmp(&b.enrolled));
    least.truncate(REPORT_TOP_N);

    CourseAnalysis {
        total_courses: stats.len() as u32,
        full_courses: stats.iter().filter(|c| c.is_full).count() as u32,
        empty_courses: stats.iter().filter(|c| c.enrolled == 0).count() as u32,
        most_enrolled: most,
        least_enrolled: least,
    }
}

fn rejection_breakdown(metrics: &SimulationMetrics) -> Vec<RejectionShare> {
    let tally = metrics.cause_tally();
    [
        (RejectionCause::QuotaFull, tally.quota_full),
        (RejectionCause::Conflict, tally.conflict),
        (RejectionCause::Prerequisite, tally.prerequisite),
        (RejectionCause::Other, tally.other),
    ]
    .into_iter()
    .map(|(cause, count)| RejectionShare {
        cause,
        count,
        percentage: if metrics.total_rejected > 0 {
            round1(count as f64 / metrics.total_rejected as f64 * 100.0)
        } else {
            0.0
        },
    })
    .collect()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::simulation::CauseTally;
    use crate::domain::types::CourseType;

    fn result(student: &str, approved: u32, tally: CauseTally, waitlisted: u32) -> SimulationResult {
        SimulationResult {
            simulation_id: "SIM1".to_string(),
            student_id: student.to_string(),
            requested_courses: approved + tally.total(),
            approved_courses: approved,
            rejected_courses: tally.total(),
            waitlisted_courses: waitlisted,
            cause_tally: tally,
            rejection_details: vec![],
            priority_score_at_simulation: 50.0,
        }
    }

    fn course(code: &str, quota: u32, enrolled: u32) -> Course {
        Course {
            code: code.to_string(),
            name: code.to_string(),
            credit: 3,
            course_type: CourseType::Elective,
            is_active: true,
            quota,
            enrolled_count: enrolled,
            is_open: enrolled < quota,
            sessions: vec![],
            prerequisites: vec![],
        }
    }

    #[test]
    fn test_collector_sums_and_buckets_add_up() {
        let mut collector = MetricsCollector::new("SIM1", "2024-FALL", Utc::now(), 3, 2);

        collector.record(&result(
            "S1",
            2,
            CauseTally {
                quota_full: 1,
                ..Default::default()
            },
            1,
        ));
        collector.record(&result(
            "S2",
            0,
            CauseTally {
                conflict: 1,
                prerequisite: 1,
                ..Default::default()
            },
            0,
        ));

        let mut snap = AllocationSnapshot::new("2024-FALL");
        snap.add_course(course("BIL202", 1, 1));
        snap.add_course(course("MAT101", 5, 2));
        let m = collector.finish(&snap, Utc::now(), 0.5);

        assert_eq!(m.total_requests, 5);
        assert_eq!(m.total_approved, 2);
        assert_eq!(m.total_rejected, 3);
        assert_eq!(
            m.total_rejected,
            m.rejected_quota + m.rejected_conflict + m.rejected_prerequisite + m.rejected_other
        );
        assert_eq!(m.total_waitlist, 1);
        assert_eq!(m.courses_full, 1);
        assert_eq!(m.avg_approval_rate, 40.0);
        assert!(m.completed_at.is_some());
    }

    #[test]
    fn test_detailed_report_student_and_rejection_analysis() {
        let results = vec![
            result("S1", 2, CauseTally::default(), 0),
            result(
                "S2",
                1,
                CauseTally {
                    quota_full: 1,
                    ..Default::default()
                },
                1,
            ),
            result(
                "S3",
                0,
                CauseTally {
                    conflict: 2,
                    ..Default::default()
                },
                0,
            ),
        ];
        let mut m = SimulationMetrics::new("SIM1", "2024-FALL", Utc::now());
        m.total_rejected = 3;
        m.rejected_quota = 1;
        m.rejected_conflict = 2;

        let courses = vec![course("BIL202", 2, 2), course("MAT101", 4, 0), course("FIZ101", 4, 1)];
        let report = detailed_report(&m, &results, &courses);

        assert_eq!(report.student_analysis.full_enrollment, 1);
        assert_eq!(report.student_analysis.partial_enrollment, 1);
        assert_eq!(report.student_analysis.no_enrollment, 1);
        assert_eq!(report.student_analysis.success_rate, 33.3);

        assert_eq!(report.course_analysis.full_courses, 1);
        assert_eq!(report.course_analysis.empty_courses, 1);
        assert_eq!(report.course_analysis.most_enrolled[0].code, "BIL202");
        assert_eq!(report.course_analysis.least_enrolled[0].code, "MAT101");

        let quota = &report.rejection_breakdown[0];
        assert_eq!(quota.cause, RejectionCause::QuotaFull);
        assert_eq!(quota.percentage, 33.3);
        assert_eq!(report.rejection_breakdown[1].percentage, 66.7);
    }

    #[test]
    fn test_empty_run_has_zero_rates() {
        let m = SimulationMetrics::new("SIM1", "2024-FALL", Utc::now());
        let report = detailed_report(&m, &[], std::iter::empty());
        assert_eq!(report.student_analysis.success_rate, 0.0);
        assert!(report.rejection_breakdown.iter().all(|r| r.percentage == 0.0));
    }
}
