// ==========================================
// 选课席位分配系统 - 模拟运行 API
// ==========================================
// 职责: 把数据库状态装配为分配快照,驱动编排器,并把结果落库
// 流程(run):
// 1) 读取快照（学生、成绩单、课程目录、申请、本学期注册、候补）
// 2) prepare 检查点并附带配置快照
// 3) 编排器运行（失败或取消时不落库任何变更）
// 4) 检查点、分配结果、优先级分数与运行记录在同一事务内落库
// ==========================================

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::{AllocationConfigReader, ConfigManager};
use crate::domain::simulation::{SimulationMetrics, SimulationResult};
use crate::engine::conflict_checker::{ConflictChecker, ConflictReport};
use crate::engine::metrics::{detailed_report, DetailedReport};
use crate::engine::orchestrator::{
    CancellationFlag, PreviewReport, ResetSummary, SimulationOrchestrator, SimulationOutcome,
};
use crate::engine::prerequisite::{PrerequisiteGraph, PrerequisiteResolver};
use crate::engine::priority::{PriorityBreakdown, PriorityScorer};
use crate::engine::snapshot::AllocationSnapshot;
use crate::repository::{
    AllocationWriteSet, CourseRepository, RequestRepository, RunCommit, SimulationRepository,
    StudentRepository,
};

pub struct SimulationApi {
    config_manager: Arc<ConfigManager>,
    student_repo: StudentRepository,
    course_repo: CourseRepository,
    request_repo: RequestRepository,
    simulation_repo: SimulationRepository,
    orchestrator: SimulationOrchestrator<ConfigManager>,
}

impl SimulationApi {
    /// 从共享连接创建 API（连接需已完成 schema 初始化）
    pub fn new(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| ApiError::ConfigError(e.to_string()))?,
        );

        Ok(Self {
            orchestrator: SimulationOrchestrator::new(config_manager.clone()),
            config_manager,
            student_repo: StudentRepository::from_connection(conn.clone()),
            course_repo: CourseRepository::from_connection(conn.clone()),
            request_repo: RequestRepository::from_connection(conn.clone()),
            simulation_repo: SimulationRepository::from_connection(conn),
        })
    }

    /// 打开数据库文件、初始化 schema 并创建 API
    pub fn open(db_path: &str) -> ApiResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        crate::db::init_schema(&conn)?;
        Self::new(Arc::new(Mutex::new(conn)))
    }

    pub fn config_manager(&self) -> &ConfigManager {
        &self.config_manager
    }

    fn validate_term(term: &str) -> ApiResult<&str> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ApiError::InvalidInput("学期不能为空".to_string()));
        }
        Ok(term)
    }

    // ==========================================
    // 快照装配
    // ==========================================

    /// 读取一个学期的分配快照
    ///
    /// 学生集合包含非活跃与管理员（其申请仍需通过引用校验,但不参与分配）
    pub fn load_snapshot(&self, term: &str) -> ApiResult<AllocationSnapshot> {
        let term = Self::validate_term(term)?;

        Ok(AllocationSnapshot {
            term: term.to_string(),
            students: self.student_repo.list_all()?,
            transcripts: self.student_repo.load_transcripts()?,
            courses: self.course_repo.load_catalog()?,
            requests: self.request_repo.list_all()?,
            enrollments: self.request_repo.list_enrollments(term)?,
            waitlist: self.request_repo.list_waitlist()?,
        })
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 执行一次完整分配运行并落库
    ///
    /// # 返回
    /// - Ok(SimulationOutcome): 本次运行的指标、结果行与检查点
    /// - Err(ApiError::Cancelled): 被取消,数据库保持运行前状态
    #[instrument(skip(self, cancel))]
    pub async fn run_simulation(
        &self,
        term: &str,
        cancel: &CancellationFlag,
    ) -> ApiResult<SimulationOutcome> {
        let mut snapshot = self.load_snapshot(term)?;

        let mut checkpoint = self.orchestrator.prepare(&snapshot);
        match self.config_manager.get_config_snapshot() {
            Ok(json) => checkpoint.config_snapshot_json = Some(json),
            Err(e) => warn!(error = %e, "配置快照生成失败,检查点不含配置"),
        }

        let outcome = self.orchestrator.run(&mut snapshot, &checkpoint, cancel).await?;
        let simulation_id = checkpoint.simulation_id.as_str();

        let processed: HashSet<i64> = checkpoint.processed_request_ids.iter().copied().collect();
        let write = AllocationWriteSet {
            simulation_id,
            courses: snapshot.courses.values().collect(),
            requests: snapshot
                .requests
                .iter()
                .filter(|r| processed.contains(&r.request_id) && !r.is_pending())
                .collect(),
            enrollments: snapshot
                .enrollments
                .iter()
                .filter(|e| e.simulation_id.as_deref() == Some(simulation_id))
                .collect(),
            waitlist: snapshot.waitlist.iter().collect(),
        };
        let committed = self.simulation_repo.commit_run(&RunCommit {
            checkpoint: &checkpoint,
            allocation: write,
            students: &snapshot.students,
            metrics: &outcome.metrics,
            results: &outcome.results,
        })?;

        info!(
            simulation_id,
            requests_updated = committed.allocation.requests_updated,
            enrollments_inserted = committed.allocation.enrollments_inserted,
            waitlist_inserted = committed.allocation.waitlist_inserted,
            scored = committed.students_scored,
            results_saved = committed.results_saved,
            "运行结果已保存"
        );
        Ok(outcome)
    }

    /// 只读预览（不写数据库）
    pub async fn preview(&self, term: &str) -> ApiResult<PreviewReport> {
        let snapshot = self.load_snapshot(term)?;
        Ok(self.orchestrator.preview(&snapshot).await?)
    }

    // ==========================================
    // reset
    // ==========================================

    /// 按运行ID回退
    pub fn reset_simulation(&self, simulation_id: &str) -> ApiResult<ResetSummary> {
        Ok(self.simulation_repo.reset_run(simulation_id)?)
    }

    /// 回退某学期最近一次尚未回退的运行
    pub fn reset_latest(&self, term: &str) -> ApiResult<ResetSummary> {
        let term = Self::validate_term(term)?;
        let checkpoint = self
            .simulation_repo
            .latest_active_checkpoint(term)?
            .ok_or_else(|| ApiError::NotFound(format!("学期{}没有可回退的运行", term)))?;
        self.reset_simulation(&checkpoint.simulation_id)
    }

    // ==========================================
    // 报告查询
    // ==========================================

    pub fn list_simulations(&self) -> ApiResult<Vec<SimulationMetrics>> {
        Ok(self.simulation_repo.list_all()?)
    }

    /// 一次运行的详细报告（学生分布、课程满员情况、拒绝原因占比）
    pub fn detailed_report(&self, simulation_id: &str) -> ApiResult<DetailedReport> {
        let metrics = self
            .simulation_repo
            .find_metrics(simulation_id)?
            .ok_or_else(|| ApiError::NotFound(format!("运行(id={})不存在", simulation_id)))?;
        let results = self.simulation_repo.find_results(simulation_id)?;
        let catalog = self.course_repo.load_catalog()?;

        Ok(detailed_report(&metrics, &results, catalog.values()))
    }

    /// 某学期最近一次运行的详细报告
    pub fn latest_report(&self, term: &str) -> ApiResult<DetailedReport> {
        let term = Self::validate_term(term)?;
        let latest = self
            .simulation_repo
            .latest_by_term(term)?
            .ok_or_else(|| ApiError::NotFound(format!("学期{}没有运行记录", term)))?;
        self.detailed_report(&latest.simulation_id)
    }

    pub fn student_result(
        &self,
        simulation_id: &str,
        student_id: &str,
    ) -> ApiResult<SimulationResult> {
        self.simulation_repo
            .find_student_result(simulation_id, student_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "运行(id={})中学生(id={})没有结果",
                    simulation_id, student_id
                ))
            })
    }

    // ==========================================
    // 诊断
    // ==========================================

    /// 学生优先级分数明细（按当前配置计算）
    pub async fn priority_breakdown(&self, student_id: &str) -> ApiResult<PriorityBreakdown> {
        let student = self
            .student_repo
            .find_by_id(student_id)?
            .ok_or_else(|| ApiError::NotFound(format!("学生(id={})不存在", student_id)))?;
        let config = self
            .config_manager
            .load_allocation_config()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;

        Ok(PriorityScorer::new().breakdown(&student, &config))
    }

    /// 课程先修树文本
    pub fn prerequisite_tree(&self, course_code: &str) -> ApiResult<String> {
        let catalog = self.course_repo.load_catalog()?;
        if !catalog.contains_key(course_code) {
            return Err(ApiError::NotFound(format!("课程(code={})不存在", course_code)));
        }
        let resolver = PrerequisiteResolver::new(PrerequisiteGraph::from_courses(catalog.values()));
        Ok(resolver.render_tree(course_code))
    }

    /// 学生冲突报告（待处理申请之间 + 本学期已批准注册之间）
    pub fn conflict_report(&self, student_id: &str, term: &str) -> ApiResult<ConflictReport> {
        let term = Self::validate_term(term)?;
        if self.student_repo.find_by_id(student_id)?.is_none() {
            return Err(ApiError::NotFound(format!("学生(id={})不存在", student_id)));
        }
        let catalog = self.course_repo.load_catalog()?;
        let enrollments = self.request_repo.list_enrollments(term)?;
        let requests = self.request_repo.list_by_student(student_id)?;

        Ok(ConflictChecker::new().conflict_report(student_id, &catalog, &enrollments, &requests)?)
    }
}
