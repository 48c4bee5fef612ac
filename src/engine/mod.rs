// ==========================================
// 选课席位分配系统 - 引擎层
// ==========================================
// 职责: 实现分配规则,不拼 SQL
// 依赖顺序:
//   schedule_conflict -> conflict_checker
//   prerequisite, conflict_checker -> evaluator
//   evaluator, waitlist -> allocation -> orchestrator
//   priority, metrics -> orchestrator
// 红线: Engine 不拼 SQL; 每个拒绝都必须带原因枚举与消息
// ==========================================

pub mod allocation;
pub mod conflict_checker;
pub mod error;
pub mod evaluator;
pub mod metrics;
pub mod orchestrator;
pub mod prerequisite;
pub mod priority;
pub mod schedule_conflict;
pub mod snapshot;
pub mod waitlist;

// 重导出核心引擎
pub use allocation::AllocationEngine;
pub use conflict_checker::{
    ConflictCheck, ConflictChecker, ConflictReport, ConflictResolution, RequestConflict,
    ScheduledCourse, SessionConflict,
};
pub use error::{EngineError, EngineResult};
pub use evaluator::{RequestEvaluator, Verdict};
pub use metrics::{detailed_report, DetailedReport, MetricsCollector};
pub use orchestrator::{
    CancellationFlag, PreviewReport, PreviewStudent, ResetSummary, SimulationOrchestrator,
    SimulationOutcome,
};
pub use prerequisite::{
    ChainEntry, EligibilityCheck, MissingPrerequisite, MissingReason, PrerequisiteGraph,
    PrerequisiteResolver,
};
pub use priority::{PriorityBreakdown, PriorityComparison, PriorityScorer};
pub use schedule_conflict::ScheduleConflict;
pub use snapshot::AllocationSnapshot;
pub use waitlist::{WaitlistManager, WaitlistOutcome};
