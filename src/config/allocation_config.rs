// ==========================================
// 选课席位分配系统 - 分配配置
// ==========================================
// 职责: 分配引擎识别的配置项及其默认值
// 说明: max/min_courses_per_student 由上游申请入口校验,引擎只透传
// ==========================================

use crate::domain::types::SpecialStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// PriorityWeights - 优先级权重表
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityWeights {
    pub class_level: f64,
    pub remaining_courses: f64,
    pub gpa: f64,
    pub special_status: f64, // 保留项: 特殊身份项直接取加分表,不乘此权重
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            class_level: 30.0,
            remaining_courses: 25.0,
            gpa: 20.0,
            special_status: 25.0,
        }
    }
}

// ==========================================
// SpecialStatusBonus - 特殊身份加分表
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecialStatusBonus(pub BTreeMap<SpecialStatus, f64>);

impl SpecialStatusBonus {
    /// 查表; 表中不存在的身份加分为 0
    pub fn lookup(&self, status: SpecialStatus) -> f64 {
        self.0.get(&status).copied().unwrap_or(0.0)
    }
}

impl Default for SpecialStatusBonus {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert(SpecialStatus::None, 0.0);
        table.insert(SpecialStatus::Scholarship, 10.0);
        table.insert(SpecialStatus::DoubleMajor, 15.0);
        table.insert(SpecialStatus::HonorStudent, 12.0);
        table.insert(SpecialStatus::Exchange, 8.0);
        Self(table)
    }
}

// ==========================================
// AllocationConfig - 分配配置全集
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationConfig {
    pub max_courses_per_student: u32,
    pub min_courses_per_student: u32,
    pub waitlist_enabled: bool,
    pub waitlist_max_size: u32,
    pub priority_weights: PriorityWeights,
    pub special_status_bonus: SpecialStatusBonus,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_courses_per_student: 8,
            min_courses_per_student: 3,
            waitlist_enabled: true,
            waitlist_max_size: 10,
            priority_weights: PriorityWeights::default(),
            special_status_bonus: SpecialStatusBonus::default(),
        }
    }
}

impl AllocationConfig {
    /// 关闭候补
    pub fn without_waitlist(mut self) -> Self {
        self.waitlist_enabled = false;
        self
    }

    /// 设置候补队列上限
    pub fn with_waitlist_max_size(mut self, max_size: u32) -> Self {
        self.waitlist_max_size = max_size;
        self
    }

    /// 配置合法性校验
    ///
    /// # 返回
    /// - Ok(()): 合法
    /// - Err(String): 第一个不合法项的说明
    pub fn validate(&self) -> Result<(), String> {
        let w = &self.priority_weights;
        for (name, value) in [
            ("class_level", w.class_level),
            ("remaining_courses", w.remaining_courses),
            ("gpa", w.gpa),
            ("special_status", w.special_status),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("priority weight {} must be a non-negative number", name));
            }
        }

        for (status, bonus) in &self.special_status_bonus.0 {
            if !bonus.is_finite() {
                return Err(format!("special status bonus for {} is not a number", status));
            }
        }

        if self.min_courses_per_student > self.max_courses_per_student {
            return Err(format!(
                "min_courses_per_student ({}) exceeds max_courses_per_student ({})",
                self.min_courses_per_student, self.max_courses_per_student
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = AllocationConfig::default();
        assert_eq!(config.max_courses_per_student, 8);
        assert_eq!(config.min_courses_per_student, 3);
        assert!(config.waitlist_enabled);
        assert_eq!(config.waitlist_max_size, 10);
        assert_eq!(config.priority_weights.class_level, 30.0);
        assert_eq!(config.special_status_bonus.lookup(SpecialStatus::DoubleMajor), 15.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bonus_lookup_defaults_to_zero() {
        let bonus = SpecialStatusBonus(BTreeMap::new());
        assert_eq!(bonus.lookup(SpecialStatus::Scholarship), 0.0);
    }

    #[test]
    fn test_bonus_table_json_shape() {
        let json = serde_json::to_string(&SpecialStatusBonus::default()).unwrap();
        assert!(json.contains("\"honor_student\":12.0"));

        let parsed: SpecialStatusBonus =
            serde_json::from_str(r#"{"scholarship": 20, "exchange": 1.5}"#).unwrap();
        assert_eq!(parsed.lookup(SpecialStatus::Scholarship), 20.0);
        assert_eq!(parsed.lookup(SpecialStatus::Exchange), 1.5);
        assert_eq!(parsed.lookup(SpecialStatus::HonorStudent), 0.0);
    }

    #[test]
    fn test_validate_rejects_negative_weight_and_inverted_bounds() {
        let mut config = AllocationConfig::default();
        config.priority_weights.gpa = -1.0;
        assert!(config.validate().is_err());

        let mut config = AllocationConfig::default();
        config.min_courses_per_student = 9;
        assert!(config.validate().is_err());
    }
}
