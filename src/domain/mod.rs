// ==========================================
// 选课席位分配系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、闭合枚举、席位约束接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod course;
pub mod request;
pub mod simulation;
pub mod student;
pub mod types;

// 重导出核心类型
pub use course::{Course, PrerequisiteEdge, SeatConstraint, Session};
pub use request::{CourseRequest, Enrollment, WaitlistEntry};
pub use simulation::{
    CauseTally, RejectionDetail, RunCheckpoint, SimulationMetrics, SimulationResult,
};
pub use student::{CompletedCourse, Student, Transcript};
pub use types::{
    CourseType, EnrollmentStatus, LetterGrade, PrereqKind, RejectionCause, RequestStatus,
    SpecialStatus, WaitlistStatus, Weekday,
};
