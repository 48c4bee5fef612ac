// ==========================================
// 选课席位分配系统 - 候补队列管理
// ==========================================
// 职责: 每门课程一个有界、先到先得的候补队列
// 规则:
// - 同一 (student, course) 已有候补记录 => 拒绝
// - 该课程 waiting 数 >= max_size => 拒绝
// - 位置 = 当前 waiting 数 + 1（1 起始,稠密）
// 红线: 只接收仅因名额已满被拒的申请; 不做重排
// ==========================================

use crate::domain::request::WaitlistEntry;
use crate::domain::types::WaitlistStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

// ==========================================
// WaitlistOutcome - 入队结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistOutcome {
    pub success: bool,
    pub position: Option<u32>,
    pub message: String,
}

// ==========================================
// WaitlistManager - 候补队列管理器
// ==========================================
#[derive(Debug, Clone)]
pub struct WaitlistManager {
    max_size: u32,
    queues: BTreeMap<String, Vec<WaitlistEntry>>, // course_code -> 按入队顺序
}

impl WaitlistManager {
    pub fn new(max_size: u32) -> Self {
        Self {
            max_size,
            queues: BTreeMap::new(),
        }
    }

    /// 以已有候补记录初始化（保持原有顺序）
    pub fn with_entries(max_size: u32, entries: &[WaitlistEntry]) -> Self {
        let mut manager = Self::new(max_size);
        for entry in entries {
            manager
                .queues
                .entry(entry.course_code.clone())
                .or_default()
                .push(entry.clone());
        }
        manager
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    /// 课程当前 waiting 人数
    pub fn waiting_count(&self, course_code: &str) -> u32 {
        self.queues
            .get(course_code)
            .map(|q| q.iter().filter(|e| e.is_waiting()).count() as u32)
            .unwrap_or(0)
    }

    pub fn contains(&self, student_id: &str, course_code: &str) -> bool {
        self.queues
            .get(course_code)
            .map(|q| q.iter().any(|e| e.student_id == student_id))
            .unwrap_or(false)
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 加入候补队列
    ///
    /// # 返回
    /// - success=true: position 为分配到的位置
    /// - success=false: 重复或队列已满,message 说明原因
    pub fn enqueue(
        &mut self,
        student_id: &str,
        course_code: &str,
        now: DateTime<Utc>,
    ) -> WaitlistOutcome {
        if self.contains(student_id, course_code) {
            return WaitlistOutcome {
                success: false,
                position: None,
                message: format!("already on waitlist for {}", course_code),
            };
        }

        let waiting = self.waiting_count(course_code);
        if waiting >= self.max_size {
            return WaitlistOutcome {
                success: false,
                position: None,
                message: format!(
                    "quota full - waitlist full for {} ({}/{})",
                    course_code, waiting, self.max_size
                ),
            };
        }

        let position = waiting + 1;
        self.queues
            .entry(course_code.to_string())
            .or_default()
            .push(WaitlistEntry {
                student_id: student_id.to_string(),
                course_code: course_code.to_string(),
                position,
                status: WaitlistStatus::Waiting,
                added_at: now,
            });

        debug!(student_id, course_code, position, "加入候补队列");

        WaitlistOutcome {
            success: true,
            position: Some(position),
            message: format!("quota full - waitlisted at position {}", position),
        }
    }

    /// 某课程的候补队列（入队顺序）
    pub fn queue(&self, course_code: &str) -> &[WaitlistEntry] {
        self.queues
            .get(course_code)
            .map(|q| q.as_slice())
            .unwrap_or(&[])
    }

    /// 所有候补记录（按课程代码,再按入队顺序）
    pub fn entries(&self) -> Vec<WaitlistEntry> {
        self.queues.values().flatten().cloned().collect()
    }

    /// 清空全部队列（reset 使用）
    pub fn clear(&mut self) {
        self.queues.clear();
    }

    /// 每门课程 waiting 记录位置是否为 1..N 且无重复
    pub fn positions_are_dense(&self) -> bool {
        self.queues.values().all(|queue| {
            let mut positions: Vec<u32> = queue
                .iter()
                .filter(|e| e.is_waiting())
                .map(|e| e.position)
                .collect();
            positions.sort_unstable();
            positions
                .iter()
                .enumerate()
                .all(|(i, p)| *p == i as u32 + 1)
        })
    }
}
