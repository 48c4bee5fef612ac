// ==========================================
// 分配不变量测试
// ==========================================
// 职责: 运行综合数据集后,对落库状态逐条检查
// - 席位计数在 [0, quota] 且 is_open 与之一致
// - 同一学生的已批准课程两两无时间重叠
// - 已批准课程的先修链全部满足
// - 候补位置按课程稠密 1..N
// - 拒绝原因分项之和等于总拒绝数
// ==========================================

mod test_helpers;

use course_alloc::config::AllocationConfig;
use course_alloc::domain::types::RequestStatus;
use course_alloc::domain::{CauseTally, SeatConstraint};
use course_alloc::engine::{
    CancellationFlag, ConflictChecker, PrerequisiteGraph, PrerequisiteResolver,
};
use course_alloc::SimulationApi;
use std::collections::{BTreeMap, BTreeSet};
use test_helpers::{create_test_db, seed_campus, store_config, TERM};

async fn run_campus(config: AllocationConfig) -> (tempfile::NamedTempFile, test_helpers::Seeder) {
    let (tmp, db_path) = create_test_db().unwrap();
    store_config(&db_path, &config);
    let seeder = seed_campus(&db_path);
    let api = SimulationApi::open(&db_path).unwrap();
    api.run_simulation(TERM, &CancellationFlag::new()).await.unwrap();
    (tmp, seeder)
}

#[tokio::test]
async fn test_seat_counters_stay_within_quota() {
    let (_tmp, seeder) = run_campus(AllocationConfig::default()).await;

    let catalog = seeder.courses.load_catalog().unwrap();
    let enrollments = seeder.requests.list_enrollments(TERM).unwrap();
    for course in catalog.values() {
        assert!(course.seat_invariant_holds(), "{}", course.code);
        let holders = enrollments
            .iter()
            .filter(|e| e.course_code == course.code)
            .count() as u32;
        assert_eq!(holders, course.enrolled_count, "{}", course.code);
    }
    // 数据集中名额少于申请数
    assert!(!seeder.courses.list_full_courses().unwrap().is_empty());
}

#[tokio::test]
async fn test_approved_schedules_have_no_overlaps() {
    let (_tmp, seeder) = run_campus(AllocationConfig::default()).await;

    let catalog = seeder.courses.load_catalog().unwrap();
    let enrollments = seeder.requests.list_enrollments(TERM).unwrap();
    let checker = ConflictChecker::new();

    let students: BTreeSet<&str> = enrollments.iter().map(|e| e.student_id.as_str()).collect();
    for student_id in students {
        let report = checker
            .conflict_report(student_id, &catalog, &enrollments, &[])
            .unwrap();
        assert_eq!(report.total_enrolled_conflicts, 0, "{}", student_id);
    }
}

#[tokio::test]
async fn test_approved_courses_satisfy_prerequisites() {
    let (_tmp, seeder) = run_campus(AllocationConfig::default()).await;

    let catalog = seeder.courses.load_catalog().unwrap();
    let resolver = PrerequisiteResolver::new(PrerequisiteGraph::from_courses(catalog.values()));
    let transcripts = seeder.students.load_transcripts().unwrap();

    let mut checked_with_chain = 0;
    for enrollment in seeder.requests.list_enrollments(TERM).unwrap() {
        let transcript = transcripts
            .get(&enrollment.student_id)
            .cloned()
            .unwrap_or_default();
        let check = resolver.check_eligibility(&transcript, &enrollment.course_code);
        assert!(
            check.can_enroll,
            "{} -> {}",
            enrollment.student_id, enrollment.course_code
        );
        if !check.satisfied.is_empty() {
            checked_with_chain += 1;
        }
    }
    assert!(checked_with_chain > 0);
}

#[tokio::test]
async fn test_waitlist_positions_are_dense() {
    let (_tmp, seeder) =
        run_campus(AllocationConfig::default().with_waitlist_max_size(2)).await;

    let mut by_course: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for entry in seeder.requests.list_waitlist().unwrap() {
        assert!(entry.is_waiting());
        by_course.entry(entry.course_code).or_default().push(entry.position);
    }
    assert!(!by_course.is_empty());
    for (code, positions) in by_course {
        let expected: Vec<u32> = (1..=positions.len() as u32).collect();
        assert_eq!(positions, expected, "{}", code);
        assert!(positions.len() <= 2, "{}", code);
    }
}

#[tokio::test]
async fn test_cause_totals_match_student_tallies() {
    let (tmp, db_path) = create_test_db().unwrap();
    let seeder = seed_campus(&db_path);
    let api = SimulationApi::open(&db_path).unwrap();
    let outcome = api.run_simulation(TERM, &CancellationFlag::new()).await.unwrap();
    let metrics = &outcome.metrics;

    let mut tally = CauseTally::default();
    let mut rejected = 0;
    let mut waitlisted = 0;
    for result in &outcome.results {
        assert_eq!(
            result.requested_courses,
            result.approved_courses + result.rejected_courses
        );
        assert_eq!(result.cause_tally.total(), result.rejected_courses);
        assert_eq!(result.rejection_details.len() as u32, result.rejected_courses);
        tally.merge(&result.cause_tally);
        rejected += result.rejected_courses;
        waitlisted += result.waitlisted_courses;
    }

    assert_eq!(metrics.cause_tally(), tally);
    assert_eq!(metrics.total_rejected, rejected);
    assert_eq!(metrics.total_waitlist, waitlisted);
    assert_eq!(
        metrics.total_rejected,
        metrics.rejected_quota
            + metrics.rejected_conflict
            + metrics.rejected_prerequisite
            + metrics.rejected_other
    );
    assert_eq!(metrics.total_requests, 36);
    assert_eq!(metrics.total_approved + metrics.total_rejected, 36);

    // 落库的申请状态与指标一致
    let requests = seeder.requests.list_all().unwrap();
    let approved = requests
        .iter()
        .filter(|r| r.status == RequestStatus::Approved)
        .count() as u32;
    assert_eq!(approved, metrics.total_approved);
    assert!(requests
        .iter()
        .filter(|r| r.status == RequestStatus::Rejected)
        .all(|r| r.rejection_cause.is_some() && r.rejection_reason.is_some()));

    // 数据集覆盖三类策略拒绝
    assert!(metrics.rejected_quota > 0);
    assert!(metrics.rejected_conflict > 0);
    assert!(metrics.rejected_prerequisite > 0);
    drop(tmp);
}
