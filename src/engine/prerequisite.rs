// ==========================================
// 选课席位分配系统 - 先修链解析
// ==========================================
// 职责: 先修图深度优先展开 + 成绩充分性检查
// 规则:
// - 逐路径 visited 集合（按值复制传递）,当前路径上已出现的课程不再展开
// - 菱形依赖会被完整展开,同一课程可能在结果中出现多次
// - 原始数据可含环,环在展开中自行终止,不报错
// ==========================================

use crate::domain::course::{Course, PrerequisiteEdge};
use crate::domain::student::Transcript;
use crate::domain::types::{LetterGrade, PrereqKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::instrument;

// ==========================================
// PrerequisiteGraph - 先修图（邻接表）
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct PrerequisiteGraph {
    edges: HashMap<String, Vec<PrerequisiteEdge>>,
}

impl PrerequisiteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从课程目录构建（边顺序保持课程内的定义顺序）
    pub fn from_courses<'a, I>(courses: I) -> Self
    where
        I: IntoIterator<Item = &'a Course>,
    {
        let mut graph = Self::new();
        for course in courses {
            for edge in &course.prerequisites {
                graph.add_edge(edge.clone());
            }
        }
        graph
    }

    pub fn add_edge(&mut self, edge: PrerequisiteEdge) {
        self.edges
            .entry(edge.course_code.clone())
            .or_default()
            .push(edge);
    }

    /// 课程的直接先修边
    pub fn direct(&self, course_code: &str) -> &[PrerequisiteEdge] {
        self.edges
            .get(course_code)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|v| v.len()).sum()
    }
}

// ==========================================
// 输出类型
// ==========================================

/// 先修链条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    pub code: String,
    pub min_grade: LetterGrade,
    pub kind: PrereqKind,
    pub level: u32, // 1 = 直接先修
}

/// 缺失原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    NotTaken,
    InsufficientGrade,
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingReason::NotTaken => write!(f, "not taken"),
            MissingReason::InsufficientGrade => write!(f, "insufficient grade"),
        }
    }
}

/// 未满足的先修
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingPrerequisite {
    pub code: String,
    pub reason: MissingReason,
    pub level: u32,
    pub min_grade: LetterGrade,
    pub student_grade: Option<LetterGrade>,
}

/// 已满足的先修
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatisfiedPrerequisite {
    pub code: String,
    pub grade: LetterGrade,
    pub level: u32,
}

/// 资格检查结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityCheck {
    pub can_enroll: bool,
    pub missing: Vec<MissingPrerequisite>,
    pub satisfied: Vec<SatisfiedPrerequisite>,
}

impl EligibilityCheck {
    /// 缺失课程代码（按链顺序,可能重复）
    pub fn missing_codes(&self) -> Vec<&str> {
        self.missing.iter().map(|m| m.code.as_str()).collect()
    }
}

// ==========================================
// PrerequisiteResolver - 先修链解析器
// ==========================================
pub struct PrerequisiteResolver {
    graph: PrerequisiteGraph,
}

impl PrerequisiteResolver {
    pub fn new(graph: PrerequisiteGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &PrerequisiteGraph {
        &self.graph
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 展开先修链（深度优先,逐路径 visited）
    ///
    /// # 示例
    /// A -> B -> A 时 chain("A") = [B(1), A(2)]
    pub fn chain(&self, course_code: &str) -> Vec<ChainEntry> {
        self.expand(course_code, HashSet::new())
    }

    fn expand(&self, course_code: &str, mut visited: HashSet<String>) -> Vec<ChainEntry> {
        if visited.contains(course_code) {
            return Vec::new();
        }
        visited.insert(course_code.to_string());

        let mut chain = Vec::new();
        for edge in self.graph.direct(course_code) {
            chain.push(ChainEntry {
                code: edge.required_code.clone(),
                min_grade: edge.min_grade,
                kind: edge.kind,
                level: 1,
            });

            for mut sub in self.expand(&edge.required_code, visited.clone()) {
                sub.level += 1;
                chain.push(sub);
            }
        }
        chain
    }

    /// 检查学生是否满足课程的全部先修链
    ///
    /// 规则:
    /// - 成绩单中不存在 => missing("not taken")
    /// - 成绩数值低于最低要求 => missing("insufficient grade")
    /// - 否则 satisfied
    /// - recommended 与 required 同样检查
    #[instrument(skip(self, transcript), fields(course_code = %course_code))]
    pub fn check_eligibility(&self, transcript: &Transcript, course_code: &str) -> EligibilityCheck {
        let mut missing = Vec::new();
        let mut satisfied = Vec::new();

        for entry in self.chain(course_code) {
            match transcript.grade_of(&entry.code) {
                None => missing.push(MissingPrerequisite {
                    code: entry.code,
                    reason: MissingReason::NotTaken,
                    level: entry.level,
                    min_grade: entry.min_grade,
                    student_grade: None,
                }),
                Some(grade) if !grade.satisfies(entry.min_grade) => {
                    missing.push(MissingPrerequisite {
                        code: entry.code,
                        reason: MissingReason::InsufficientGrade,
                        level: entry.level,
                        min_grade: entry.min_grade,
                        student_grade: Some(grade),
                    })
                }
                Some(grade) => satisfied.push(SatisfiedPrerequisite {
                    code: entry.code,
                    grade,
                    level: entry.level,
                }),
            }
        }

        EligibilityCheck {
            can_enroll: missing.is_empty(),
            missing,
            satisfied,
        }
    }

    /// 新增边 course -> new_prereq 是否会形成环
    ///
    /// 即 course 出现在 chain(new_prereq) 中; 仅供目录编辑方使用
    pub fn would_create_cycle(&self, course_code: &str, new_prereq_code: &str) -> bool {
        if course_code == new_prereq_code {
            return true;
        }
        self.chain(new_prereq_code)
            .iter()
            .any(|entry| entry.code == course_code)
    }

    // ==========================================
    // 展示方法
    // ==========================================

    /// 缺失先修的可读说明
    pub fn missing_message(missing: &[MissingPrerequisite]) -> String {
        if missing.is_empty() {
            return "All prerequisites are satisfied.".to_string();
        }

        let lines: Vec<String> = missing
            .iter()
            .map(|item| {
                let level_text = if item.level == 1 {
                    "direct prerequisite".to_string()
                } else {
                    format!("level {} prerequisite", item.level)
                };
                let reason = match (item.reason, item.student_grade) {
                    (MissingReason::InsufficientGrade, Some(grade)) => format!(
                        "insufficient grade ({}, minimum {} required)",
                        grade, item.min_grade
                    ),
                    (reason, _) => reason.to_string(),
                };
                format!("- {}: {} ({})", item.code, reason, level_text)
            })
            .collect();

        format!("Missing prerequisites:\n{}", lines.join("\n"))
    }

    /// 先修树文本（按 (level, code) 排序缩进）
    pub fn render_tree(&self, course_code: &str) -> String {
        let mut chain = self.chain(course_code);
        if chain.is_empty() {
            return format!("{}: no prerequisites", course_code);
        }

        chain.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.code.cmp(&b.code)));

        let mut lines = vec![course_code.to_string()];
        for entry in &chain {
            let indent = "  ".repeat(entry.level as usize);
            lines.push(format!("{}└─ {} (min: {})", indent, entry.code, entry.min_grade));
        }
        lines.join("\n")
    }

    /// 按层级统计链条目数（诊断）
    pub fn level_histogram(&self, course_code: &str) -> BTreeMap<u32, usize> {
        let mut histogram = BTreeMap::new();
        for entry in self.chain(course_code) {
            *histogram.entry(entry.level).or_insert(0) += 1;
        }
        histogram
    }
}
