// ==========================================
// 选课席位分配系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 按优先级顺序分配课程席位,
//           校验时间冲突与先修链,满员时进入候补
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分配规则
pub mod engine;

// 配置层 - 分配配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/schema）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    CourseType, EnrollmentStatus, LetterGrade, PrereqKind, RejectionCause, RequestStatus,
    SpecialStatus, WaitlistStatus, Weekday,
};

// 领域实体
pub use domain::{
    CompletedCourse, Course, CourseRequest, Enrollment, PrerequisiteEdge, RunCheckpoint, Session,
    SimulationMetrics, SimulationResult, Student, Transcript, WaitlistEntry,
};

// 引擎
pub use engine::{
    AllocationEngine, AllocationSnapshot, CancellationFlag, ConflictChecker, PrerequisiteResolver,
    PriorityScorer, RequestEvaluator, SimulationOrchestrator, WaitlistManager,
};

// 配置
pub use config::{AllocationConfig, AllocationConfigReader, ConfigManager};

// API
pub use api::{ApiError, ApiResult, SimulationApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "选课席位分配系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
