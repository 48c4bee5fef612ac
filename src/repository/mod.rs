// ==========================================
// 选课席位分配系统 - 数据仓储层
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

mod codec;
pub mod course_repo;
pub mod error;
pub mod request_repo;
pub mod simulation_repo;
pub mod student_repo;

// 重导出核心仓储
pub use course_repo::CourseRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use request_repo::{AllocationWriteSet, PersistSummary, RequestRepository};
pub use simulation_repo::{RunCommit, RunCommitSummary, SimulationRepository};
pub use student_repo::StudentRepository;
