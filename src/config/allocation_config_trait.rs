// ==========================================
// 选课席位分配系统 - 分配配置读取 Trait
// ==========================================
// 职责: 定义分配引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::allocation_config::{AllocationConfig, PriorityWeights, SpecialStatusBonus};
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// AllocationConfigReader Trait
// ==========================================
// 实现者:
// - AllocationConfig（内存静态配置,测试与预览使用）
// - ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait AllocationConfigReader: Send + Sync {
    // ===== 选课数量 (上游校验使用) =====

    /// 每个学生最多申请课程数
    ///
    /// # 默认值
    /// - 8
    async fn get_max_courses_per_student(&self) -> Result<u32, Box<dyn Error>>;

    /// 每个学生最少申请课程数
    ///
    /// # 默认值
    /// - 3
    async fn get_min_courses_per_student(&self) -> Result<u32, Box<dyn Error>>;

    // ===== 候补 =====

    /// 是否启用候补
    ///
    /// # 默认值
    /// - true
    async fn is_waitlist_enabled(&self) -> Result<bool, Box<dyn Error>>;

    /// 每门课程候补队列上限
    ///
    /// # 默认值
    /// - 10
    async fn get_waitlist_max_size(&self) -> Result<u32, Box<dyn Error>>;

    // ===== 优先级 =====

    /// 优先级权重表
    async fn get_priority_weights(&self) -> Result<PriorityWeights, Box<dyn Error>>;

    /// 特殊身份加分表
    async fn get_special_status_bonus(&self) -> Result<SpecialStatusBonus, Box<dyn Error>>;

    /// 一次性读取完整配置（每次运行开始时调用,运行期间不再读取）
    async fn load_allocation_config(&self) -> Result<AllocationConfig, Box<dyn Error>> {
        let max_courses_per_student = self.get_max_courses_per_student().await?;
        let min_courses_per_student = self.get_min_courses_per_student().await?;
        let waitlist_enabled = self.is_waitlist_enabled().await?;
        let waitlist_max_size = self.get_waitlist_max_size().await?;
        let priority_weights = self.get_priority_weights().await?;
        let special_status_bonus = self.get_special_status_bonus().await?;

        Ok(AllocationConfig {
            max_courses_per_student,
            min_courses_per_student,
            waitlist_enabled,
            waitlist_max_size,
            priority_weights,
            special_status_bonus,
        })
    }
}

// ==========================================
// 内存配置实现
// ==========================================
#[async_trait]
impl AllocationConfigReader for AllocationConfig {
    async fn get_max_courses_per_student(&self) -> Result<u32, Box<dyn Error>> {
        Ok(self.max_courses_per_student)
    }

    async fn get_min_courses_per_student(&self) -> Result<u32, Box<dyn Error>> {
        Ok(self.min_courses_per_student)
    }

    async fn is_waitlist_enabled(&self) -> Result<bool, Box<dyn Error>> {
        Ok(self.waitlist_enabled)
    }

    async fn get_waitlist_max_size(&self) -> Result<u32, Box<dyn Error>> {
        Ok(self.waitlist_max_size)
    }

    async fn get_priority_weights(&self) -> Result<PriorityWeights, Box<dyn Error>> {
        Ok(self.priority_weights)
    }

    async fn get_special_status_bonus(&self) -> Result<SpecialStatusBonus, Box<dyn Error>> {
        Ok(self.special_status_bonus.clone())
    }

    async fn load_allocation_config(&self) -> Result<AllocationConfig, Box<dyn Error>> {
        Ok(self.clone())
    }
}
