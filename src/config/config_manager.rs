// ==========================================
// 选课席位分配系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、快照
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::allocation_config::{AllocationConfig, PriorityWeights, SpecialStatusBonus};
use crate::config::allocation_config_trait::AllocationConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 每次运行记录配置快照,保证结果可复现
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 解析布尔配置（"true"/"1"/"yes" 为真,其余为假）
    fn parse_bool(value: &str) -> bool {
        matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
    }
}

// ==========================================
// AllocationConfigReader Trait 实现
// ==========================================
#[async_trait]
impl AllocationConfigReader for ConfigManager {
    // ===== 选课数量 =====

    async fn get_max_courses_per_student(&self) -> Result<u32, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::MAX_COURSES_PER_STUDENT, "8")?;
        Ok(value.trim().parse::<u32>().unwrap_or(8))
    }

    async fn get_min_courses_per_student(&self) -> Result<u32, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::MIN_COURSES_PER_STUDENT, "3")?;
        Ok(value.trim().parse::<u32>().unwrap_or(3))
    }

    // ===== 候补 =====

    async fn is_waitlist_enabled(&self) -> Result<bool, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::WAITLIST_ENABLED, "true")?;
        Ok(Self::parse_bool(&value))
    }

    async fn get_waitlist_max_size(&self) -> Result<u32, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::WAITLIST_MAX_SIZE, "10")?;
        Ok(value.trim().parse::<u32>().unwrap_or(10))
    }

    // ===== 优先级 =====

    async fn get_priority_weights(&self) -> Result<PriorityWeights, Box<dyn Error>> {
        let value = match self.get_config_value(config_keys::PRIORITY_WEIGHTS)? {
            Some(v) => v,
            None => return Ok(PriorityWeights::default()),
        };

        let weights: PriorityWeights = serde_json::from_str(&value).unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::PRIORITY_WEIGHTS,
                raw_value = %value,
                "优先级权重配置格式错误，使用默认权重"
            );
            PriorityWeights::default()
        });
        Ok(weights)
    }

    async fn get_special_status_bonus(&self) -> Result<SpecialStatusBonus, Box<dyn Error>> {
        let value = match self.get_config_value(config_keys::SPECIAL_STATUS_BONUS)? {
            Some(v) => v,
            None => return Ok(SpecialStatusBonus::default()),
        };

        let bonus: SpecialStatusBonus = serde_json::from_str(&value).unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::SPECIAL_STATUS_BONUS,
                raw_value = %value,
                "特殊身份加分配置格式错误，使用默认加分表"
            );
            SpecialStatusBonus::default()
        });
        Ok(bonus)
    }
}

impl ConfigManager {
    /// 将完整配置写回 config_kv（命令行初始化与测试使用）
    pub fn store_allocation_config(&self, config: &AllocationConfig) -> Result<(), Box<dyn Error>> {
        self.set_global_config_value(
            config_keys::MAX_COURSES_PER_STUDENT,
            &config.max_courses_per_student.to_string(),
        )?;
        self.set_global_config_value(
            config_keys::MIN_COURSES_PER_STUDENT,
            &config.min_courses_per_student.to_string(),
        )?;
        self.set_global_config_value(
            config_keys::WAITLIST_ENABLED,
            &config.waitlist_enabled.to_string(),
        )?;
        self.set_global_config_value(
            config_keys::WAITLIST_MAX_SIZE,
            &config.waitlist_max_size.to_string(),
        )?;
        self.set_global_config_value(
            config_keys::PRIORITY_WEIGHTS,
            &serde_json::to_string(&config.priority_weights)?,
        )?;
        self.set_global_config_value(
            config_keys::SPECIAL_STATUS_BONUS,
            &serde_json::to_string(&config.special_status_bonus)?,
        )?;
        Ok(())
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 选课数量（上游校验）
    pub const MAX_COURSES_PER_STUDENT: &str = "max_courses_per_student";
    pub const MIN_COURSES_PER_STUDENT: &str = "min_courses_per_student";

    // 候补
    pub const WAITLIST_ENABLED: &str = "waitlist_enabled";
    pub const WAITLIST_MAX_SIZE: &str = "waitlist_max_size";

    // 优先级
    pub const PRIORITY_WEIGHTS: &str = "priority_weights"; // JSON
    pub const SPECIAL_STATUS_BONUS: &str = "special_status_bonus"; // JSON
}
