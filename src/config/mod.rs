// ==========================================
// 选课席位分配系统 - 配置层
// ==========================================
// 职责: 分配配置定义、读取接口、config_kv 读取实现
// 存储: config_kv 表
// ==========================================

pub mod allocation_config;
pub mod allocation_config_trait;
pub mod config_manager;

// 重导出核心配置类型
pub use allocation_config::{AllocationConfig, PriorityWeights, SpecialStatusBonus};
pub use allocation_config_trait::AllocationConfigReader;
pub use config_manager::{config_keys, ConfigManager};
