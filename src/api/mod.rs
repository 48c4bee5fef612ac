// ==========================================
// 选课席位分配系统 - API 层
// ==========================================
// 职责: 提供面向调用方(CLI/上层服务)的业务接口
// ==========================================

pub mod error;
pub mod simulation_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use simulation_api::SimulationApi;
