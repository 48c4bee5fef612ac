// ==========================================
// 选课席位分配系统 - 模拟运行编排器
// ==========================================
// 职责: 协调整次运行
// 流程:
// 1) 加载并校验配置
// 2) 校验输入快照（失败则不做任何提交）
// 3) 重算所有可分配学生的优先级分数
// 4) 分数降序 + 学号升序 排序
// 5) 逐个学生执行单学生分配（学生之间检查取消标志）
// 6) 汇总指标、记录耗时
// 红线: 提交阶段严格串行; 不在学生处理中途取消
// ==========================================

use crate::config::allocation_config::AllocationConfig;
use crate::config::allocation_config_trait::AllocationConfigReader;
use crate::domain::course::SeatConstraint;
use crate::domain::simulation::{RunCheckpoint, SimulationMetrics, SimulationResult};
use crate::engine::allocation::AllocationEngine;
use crate::engine::conflict_checker::ConflictChecker;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::metrics::MetricsCollector;
use crate::engine::prerequisite::PrerequisiteResolver;
use crate::engine::priority::PriorityScorer;
use crate::engine::snapshot::AllocationSnapshot;
use crate::engine::waitlist::WaitlistManager;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 预览结果最多返回的学生数
pub const PREVIEW_LIMIT: usize = 50;

// ==========================================
// CancellationFlag - 协作式取消标志
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ==========================================
// 输出类型
// ==========================================

/// 一次完整运行的输出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub metrics: SimulationMetrics,
    pub results: Vec<SimulationResult>,
    pub checkpoint: RunCheckpoint,
}

/// 预览: 单个学生的可能结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewStudent {
    pub student_id: String,
    pub priority_score: f64,
    pub requested: u32,
    pub likely_approved: u32,
    pub likely_rejected: u32,
    pub issues: Vec<String>,
}

/// 预览报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewReport {
    pub total_students: usize,
    pub results: Vec<PreviewStudent>,
}

/// reset 统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSummary {
    pub simulation_id: String,
    pub courses_restored: usize,
    pub enrollments_removed: usize,
    pub waitlist_removed: usize,
    pub requests_reverted: usize,
}

// ==========================================
// SimulationOrchestrator - 模拟运行编排器
// ==========================================
pub struct SimulationOrchestrator<C>
where
    C: AllocationConfigReader,
{
    config: Arc<C>,
    scorer: PriorityScorer,
    checker: ConflictChecker,
}

impl<C> SimulationOrchestrator<C>
where
    C: AllocationConfigReader,
{
    /// 创建新的编排器实例
    ///
    /// # 参数
    /// - config: 配置读取器
    pub fn new(config: Arc<C>) -> Self {
        Self {
            config,
            scorer: PriorityScorer::new(),
            checker: ConflictChecker::new(),
        }
    }

    async fn load_config(&self) -> EngineResult<AllocationConfig> {
        let config = self
            .config
            .load_allocation_config()
            .await
            .map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate().map_err(EngineError::Config)?;
        Ok(config)
    }

    /// 生成运行前检查点（新运行ID、运行前席位计数、待处理申请）
    ///
    /// 检查点需与运行结果在同一事务内持久化,保证每个落库的运行都能 reset
    pub fn prepare(&self, snapshot: &AllocationSnapshot) -> RunCheckpoint {
        RunCheckpoint {
            simulation_id: Uuid::new_v4().to_string(),
            term: snapshot.term.clone(),
            enrolled_counts: snapshot.seat_counts(),
            processed_request_ids: snapshot
                .requests
                .iter()
                .filter(|r| r.is_pending())
                .map(|r| r.request_id)
                .collect(),
            config_snapshot_json: None,
        }
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 准备检查点并执行完整运行
    pub async fn simulate(
        &self,
        snapshot: &mut AllocationSnapshot,
        cancel: &CancellationFlag,
    ) -> EngineResult<SimulationOutcome> {
        let checkpoint = self.prepare(snapshot);
        self.run(snapshot, &checkpoint, cancel).await
    }

    /// 执行完整运行
    ///
    /// # 参数
    /// - snapshot: 运行状态（会被修改）
    /// - checkpoint: prepare 生成的检查点
    /// - cancel: 取消标志（仅在学生之间检查）
    ///
    /// # 返回
    /// - Ok(SimulationOutcome): 指标 + 学生结果行 + 检查点
    /// - Err: 配置/输入错误或被取消（已提交的学生需通过 reset 回退）
    #[instrument(skip(self, snapshot, checkpoint, cancel), fields(
        term = %snapshot.term,
        simulation_id = %checkpoint.simulation_id
    ))]
    pub async fn run(
        &self,
        snapshot: &mut AllocationSnapshot,
        checkpoint: &RunCheckpoint,
        cancel: &CancellationFlag,
    ) -> EngineResult<SimulationOutcome> {
        let timer = Instant::now();
        let started_at = Utc::now();
        let simulation_id = checkpoint.simulation_id.as_str();

        // ==========================================
        // 步骤1: 加载配置
        // ==========================================
        let config = self.load_config().await?;
        info!(
            waitlist_enabled = config.waitlist_enabled,
            waitlist_max_size = config.waitlist_max_size,
            "步骤1: 配置加载完成"
        );

        // ==========================================
        // 步骤2: 输入快照校验
        // ==========================================
        snapshot.validate()?;
        info!(
            students = snapshot.students.len(),
            courses = snapshot.courses.len(),
            pending_requests = snapshot.total_pending(),
            "步骤2: 输入校验通过"
        );

        // ==========================================
        // 步骤3: 优先级评分
        // ==========================================
        let scored = self.scorer.score_all(&mut snapshot.students, &config);
        info!(scored, "步骤3: 优先级分数重算完成");

        // ==========================================
        // 步骤4: 分配顺序
        // ==========================================
        let order: Vec<String> = self
            .scorer
            .order(&snapshot.students)
            .into_iter()
            .map(|s| s.student_id.clone())
            .collect();
        info!(ordered = order.len(), "步骤4: 分配顺序确定");

        // ==========================================
        // 步骤5: 逐个学生分配
        // ==========================================
        let mut collector = MetricsCollector::new(
            simulation_id,
            &snapshot.term,
            started_at,
            order.len() as u32,
            snapshot.active_course_count() as u32,
        );
        let resolver = PrerequisiteResolver::new(snapshot.prerequisite_graph());
        let engine = AllocationEngine::new(&resolver, &self.checker, &config);
        let mut waitlist = WaitlistManager::with_entries(config.waitlist_max_size, &snapshot.waitlist);

        let allocated = Self::allocate_in_order(
            &engine,
            snapshot,
            &mut waitlist,
            &order,
            simulation_id,
            cancel,
        );
        // 无论成功与否,候补队列都写回快照
        snapshot.waitlist = waitlist.entries();
        let results = allocated?;

        for result in &results {
            collector.record(result);
        }
        info!(
            processed_students = results.len(),
            approved = collector.current().total_approved,
            rejected = collector.current().total_rejected,
            "步骤5: 分配完成"
        );

        // ==========================================
        // 步骤6: 汇总指标
        // ==========================================
        let metrics = collector.finish(snapshot, Utc::now(), timer.elapsed().as_secs_f64());
        info!(
            courses_full = metrics.courses_full,
            total_waitlist = metrics.total_waitlist,
            avg_approval_rate = metrics.avg_approval_rate,
            processing_time_seconds = metrics.processing_time_seconds,
            "步骤6: 指标汇总完成"
        );

        Ok(SimulationOutcome {
            metrics,
            results,
            checkpoint: checkpoint.clone(),
        })
    }

    fn allocate_in_order(
        engine: &AllocationEngine<'_>,
        snapshot: &mut AllocationSnapshot,
        waitlist: &mut WaitlistManager,
        order: &[String],
        simulation_id: &str,
        cancel: &CancellationFlag,
    ) -> EngineResult<Vec<SimulationResult>> {
        let mut results = Vec::new();

        for (processed, student_id) in order.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(processed_students = processed, "运行被取消");
                return Err(EngineError::Cancelled {
                    processed_students: processed as u32,
                });
            }

            if snapshot.pending_count(student_id) == 0 {
                continue;
            }

            let result =
                engine.process_student(snapshot, waitlist, student_id, simulation_id, Utc::now())?;
            debug!(
                student_id = %student_id,
                approved = result.approved_courses,
                rejected = result.rejected_courses,
                "学生分配完成"
            );
            results.push(result);
        }

        Ok(results)
    }

    // ==========================================
    // 预览（只读）
    // ==========================================

    /// 不修改任何状态的预演: 只按临时剩余名额估计结果
    pub async fn preview(&self, snapshot: &AllocationSnapshot) -> EngineResult<PreviewReport> {
        let config = self.load_config().await?;

        let mut students = snapshot.students.clone();
        self.scorer.score_all(&mut students, &config);

        let mut temp_seats: BTreeMap<&str, u32> = snapshot
            .courses
            .values()
            .filter(|c| c.is_active)
            .map(|c| (c.code.as_str(), c.available_quota()))
            .collect();

        let mut previews = Vec::new();
        for student in self.scorer.order(&students) {
            let indices = snapshot.pending_request_indices(&student.student_id);
            if indices.is_empty() {
                continue;
            }

            let mut preview = PreviewStudent {
                student_id: student.student_id.clone(),
                priority_score: student.priority_score,
                requested: indices.len() as u32,
                likely_approved: 0,
                likely_rejected: 0,
                issues: Vec::new(),
            };

            for idx in indices {
                let code = snapshot.requests[idx].course_code.as_str();
                match temp_seats.get_mut(code) {
                    Some(seats) if *seats > 0 => {
                        *seats -= 1;
                        preview.likely_approved += 1;
                    }
                    _ => {
                        preview.likely_rejected += 1;
                        preview.issues.push(format!("{}: quota may be full", code));
                    }
                }
            }
            previews.push(preview);
        }

        let total_students = previews.len();
        previews.truncate(PREVIEW_LIMIT);
        info!(total_students, "预览完成");

        Ok(PreviewReport {
            total_students,
            results: previews,
        })
    }

    // ==========================================
    // reset
    // ==========================================

    /// 按检查点回退一次运行
    ///
    /// - 席位计数恢复为运行前值
    /// - 删除该运行创建的注册
    /// - 清空全部候补记录
    /// - 该运行处理过的申请回到 pending
    #[instrument(skip(self, snapshot, checkpoint), fields(simulation_id = %checkpoint.simulation_id))]
    pub fn reset(&self, snapshot: &mut AllocationSnapshot, checkpoint: &RunCheckpoint) -> ResetSummary {
        let mut summary = ResetSummary {
            simulation_id: checkpoint.simulation_id.clone(),
            ..Default::default()
        };

        for (code, count) in &checkpoint.enrolled_counts {
            if let Some(course) = snapshot.courses.get_mut(code) {
                course.restore_enrolled_count(*count);
                summary.courses_restored += 1;
            }
        }

        let before = snapshot.enrollments.len();
        snapshot
            .enrollments
            .retain(|e| e.simulation_id.as_deref() != Some(checkpoint.simulation_id.as_str()));
        summary.enrollments_removed = before - snapshot.enrollments.len();

        summary.waitlist_removed = snapshot.waitlist.len();
        snapshot.waitlist.clear();

        let processed: HashSet<i64> = checkpoint.processed_request_ids.iter().copied().collect();
        for request in snapshot
            .requests
            .iter_mut()
            .filter(|r| processed.contains(&r.request_id) && !r.is_pending())
        {
            request.revert_to_pending();
            summary.requests_reverted += 1;
        }

        info!(
            courses_restored = summary.courses_restored,
            enrollments_removed = summary.enrollments_removed,
            waitlist_removed = summary.waitlist_removed,
            requests_reverted = summary.requests_reverted,
            "运行已回退"
        );
        summary
    }
}
