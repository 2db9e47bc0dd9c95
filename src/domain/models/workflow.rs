// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

use super::lifecycle::{string_enum, DomainError, Transition};
use super::record::RecordMeta;
use crate::utils::retry_policy::RetryStrategy;
use crate::utils::validators::{validate_not_blank, ValidationReport, SEMVER};

/// 新建工作流的初始版本号
pub const INITIAL_REVISION: &str = "1.0.0";

string_enum! {
    /// 工作流类型
    pub enum WorkflowType {
        Approval => "approval",
        Review => "review",
        Deployment => "deployment",
        Testing => "testing",
        Notification => "notification",
        Automation => "automation",
        Custom => "custom",
    }
}

string_enum! {
    /// 工作流状态
    ///
    /// Draft → Active ⇄ Inactive → Archived，任意状态都可以被删除。
    pub enum WorkflowStatus {
        Draft => "draft",
        Active => "active",
        Inactive => "inactive",
        Archived => "archived",
        Deleted => "deleted",
    }
}

string_enum! {
    /// 审批模式
    pub enum ApprovalMode {
        /// 任意一人通过即可
        Any => "any",
        /// 全部通过
        All => "all",
    }
}

impl Default for ApprovalMode {
    fn default() -> Self {
        ApprovalMode::Any
    }
}

fn default_http_method() -> String {
    "GET".to_string()
}

/// 节点类型及其配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    End,
    Task {
        #[serde(default)]
        assignee: Option<String>,
        #[serde(default)]
        auto_assign: bool,
    },
    Decision {
        #[serde(default)]
        conditions: Vec<String>,
    },
    Parallel,
    Merge,
    Delay {
        seconds: u64,
    },
    Notification {
        #[serde(default)]
        recipients: Vec<String>,
        #[serde(default)]
        template: Option<String>,
    },
    Approval {
        #[serde(default)]
        approvers: Vec<String>,
        #[serde(default)]
        mode: ApprovalMode,
    },
    Script {
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        code: String,
    },
    Api {
        #[serde(default)]
        url: String,
        #[serde(default = "default_http_method")]
        method: String,
    },
    Condition {
        #[serde(default)]
        expression: String,
        #[serde(default)]
        true_output: Option<String>,
        #[serde(default)]
        false_output: Option<String>,
    },
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Task { .. } => "task",
            NodeKind::Decision { .. } => "decision",
            NodeKind::Parallel => "parallel",
            NodeKind::Merge => "merge",
            NodeKind::Delay { .. } => "delay",
            NodeKind::Notification { .. } => "notification",
            NodeKind::Approval { .. } => "approval",
            NodeKind::Script { .. } => "script",
            NodeKind::Api { .. } => "api",
            NodeKind::Condition { .. } => "condition",
        }
    }

    /// 节点自身配置的问题，返回 (错误码, 描述)
    fn config_issue(&self) -> Option<(&'static str, &'static str)> {
        match self {
            NodeKind::Task {
                assignee,
                auto_assign,
            } if assignee.is_none() && !auto_assign => {
                Some(("missing_assignee", "task node needs an assignee or auto_assign"))
            }
            NodeKind::Decision { conditions } if conditions.is_empty() => {
                Some(("missing_conditions", "decision node needs at least one condition"))
            }
            NodeKind::Notification { recipients, .. } if recipients.is_empty() => {
                Some(("missing_recipients", "notification node needs recipients"))
            }
            NodeKind::Approval { approvers, .. } if approvers.is_empty() => {
                Some(("missing_approvers", "approval node needs approvers"))
            }
            NodeKind::Script { code, .. } if code.trim().is_empty() => {
                Some(("missing_code", "script node needs code"))
            }
            NodeKind::Api { url, .. } if url.trim().is_empty() => {
                Some(("missing_url", "api node needs a url"))
            }
            NodeKind::Condition { expression, .. } if expression.trim().is_empty() => {
                Some(("missing_expression", "condition node needs an expression"))
            }
            _ => None,
        }
    }
}

/// 工作流节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// 节点之间的连线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub condition: Option<String>,
}

/// 工作流级重试设置，执行实例创建时复制一份
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub enabled: bool,
    pub max_retries: i32,
    pub retry_delay_secs: u64,
    pub strategy: RetryStrategy,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            retry_delay_secs: 60,
            strategy: RetryStrategy::Exponential,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// 单次执行超时时间（秒）
    pub timeout_secs: Option<u64>,
    pub retry: RetrySettings,
}

/// 工作流定义
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
    #[serde(default)]
    pub settings: Option<WorkflowSettings>,
}

impl WorkflowDefinition {
    pub fn node(&self, node_id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|node| node.id == node_id)
    }

    pub fn retry_settings(&self) -> RetrySettings {
        self.settings
            .as_ref()
            .map(|settings| settings.retry.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionCounts {
    /// 已结束的执行数，开始次数见 `UsageStats::execution_count`
    pub total: i64,
    pub successful: i64,
    pub failed: i64,
    pub running: i64,
    pub cancelled: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceStats {
    pub average_duration_ms: f64,
    pub min_duration_ms: i64,
    pub max_duration_ms: i64,
    pub last_duration_ms: Option<i64>,
    /// 参与平均值计算的样本数
    pub samples: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageStats {
    pub last_executed_at: Option<DateTime<Utc>>,
    pub execution_count: i64,
}

/// 执行统计
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowStatistics {
    pub executions: ExecutionCounts,
    pub performance: Option<PerformanceStats>,
    pub usage: UsageStats,
}

string_enum! {
    /// 执行结束时计入统计的结果
    pub enum ExecutionOutcome {
        Successful => "successful",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// 创建工作流的输入
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewWorkflow {
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub workflow_type: WorkflowType,
    #[validate(length(min = 1, max = 50), custom(function = "validate_not_blank"))]
    pub category: String,
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub creator_id: String,
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub is_template: bool,
    #[validate(regex(path = *SEMVER))]
    pub revision: Option<String>,
    pub definition: Option<WorkflowDefinition>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// 工作流
///
/// 执行实例所依据的定义记录，同时累计执行统计。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub description: Option<String>,
    pub workflow_type: WorkflowType,
    pub category: String,
    pub status: WorkflowStatus,
    pub is_template: bool,
    /// 语义化版本号
    pub revision: String,
    pub creator_id: String,
    pub project_id: Option<Uuid>,
    pub definition: Option<WorkflowDefinition>,
    pub tags: Vec<String>,
    pub statistics: WorkflowStatistics,
}

impl Workflow {
    /// 创建草稿状态的工作流
    pub fn create(input: NewWorkflow) -> Result<Self, DomainError> {
        input.validate()?;

        let mut meta = RecordMeta::new(Some(input.creator_id.clone()));
        meta.is_active = false;

        let mut workflow = Self {
            meta,
            name: input.name,
            description: input.description,
            workflow_type: input.workflow_type,
            category: input.category,
            status: WorkflowStatus::Draft,
            is_template: input.is_template,
            revision: input
                .revision
                .unwrap_or_else(|| INITIAL_REVISION.to_string()),
            creator_id: input.creator_id,
            project_id: input.project_id,
            definition: input.definition,
            tags: Vec::new(),
            statistics: WorkflowStatistics::default(),
        };
        for tag in input.tags {
            workflow.add_tag(tag);
        }
        Ok(workflow)
    }

    fn reject(&self, event: Transition) -> DomainError {
        DomainError::invalid(self.status.as_str(), event)
    }

    pub fn is_runnable(&self) -> bool {
        self.status == WorkflowStatus::Active && self.meta.is_active
    }

    pub fn activate(&mut self) -> Result<(), DomainError> {
        if !matches!(
            self.status,
            WorkflowStatus::Draft | WorkflowStatus::Inactive
        ) {
            return Err(self.reject(Transition::Activate));
        }
        self.status = WorkflowStatus::Active;
        self.meta.is_active = true;
        Ok(())
    }

    pub fn deactivate(&mut self) -> Result<(), DomainError> {
        if self.status != WorkflowStatus::Active {
            return Err(self.reject(Transition::Deactivate));
        }
        self.status = WorkflowStatus::Inactive;
        self.meta.is_active = false;
        Ok(())
    }

    pub fn archive(&mut self) -> Result<(), DomainError> {
        if matches!(
            self.status,
            WorkflowStatus::Archived | WorkflowStatus::Deleted
        ) {
            return Err(self.reject(Transition::Archive));
        }
        self.status = WorkflowStatus::Archived;
        self.meta.is_active = false;
        Ok(())
    }

    /// 软删除
    pub fn mark_as_deleted(&mut self) -> Result<(), DomainError> {
        if self.status == WorkflowStatus::Deleted {
            return Err(self.reject(Transition::Delete));
        }
        self.status = WorkflowStatus::Deleted;
        self.meta.is_active = false;
        self.meta.deleted_at = Some(Utc::now());
        Ok(())
    }

    /// 添加标签，忽略空白和重复
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into().trim().to_string();
        if !tag.is_empty() && !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }

    /// 记录一次执行开始
    pub fn record_execution_started(&mut self) {
        self.statistics.executions.running += 1;
        self.statistics.usage.execution_count += 1;
        self.statistics.usage.last_executed_at = Some(Utc::now());
    }

    /// 记录一次运行中的执行停止（结束、失败或取消）
    pub fn record_execution_stopped(&mut self) {
        let executions = &mut self.statistics.executions;
        executions.running = (executions.running - 1).max(0);
    }

    /// 记录一次执行结束
    ///
    /// # 参数
    ///
    /// * `outcome` - 执行结果
    /// * `duration_ms` - 执行耗时，未开始的执行没有耗时
    pub fn update_execution_stats(&mut self, outcome: ExecutionOutcome, duration_ms: Option<i64>) {
        let executions = &mut self.statistics.executions;
        executions.total += 1;
        match outcome {
            ExecutionOutcome::Successful => executions.successful += 1,
            ExecutionOutcome::Failed => executions.failed += 1,
            ExecutionOutcome::Cancelled => executions.cancelled += 1,
        }

        if let Some(duration) = duration_ms {
            let perf = self
                .statistics
                .performance
                .get_or_insert_with(|| PerformanceStats {
                    min_duration_ms: duration,
                    max_duration_ms: duration,
                    ..Default::default()
                });
            let samples = perf.samples + 1;
            perf.average_duration_ms =
                (perf.average_duration_ms * perf.samples as f64 + duration as f64) / samples as f64;
            perf.min_duration_ms = perf.min_duration_ms.min(duration);
            perf.max_duration_ms = perf.max_duration_ms.max(duration);
            perf.last_duration_ms = Some(duration);
            perf.samples = samples;
        }
    }

    /// 校验工作流定义
    ///
    /// 检查节点 ID 唯一、名称非空、恰有开始与结束节点、
    /// 节点配置完整，以及连线两端的节点存在。
    pub fn validate_definition(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        let Some(definition) = &self.definition else {
            report.push("definition", "required", "workflow definition is required");
            return report;
        };

        if definition.nodes.is_empty() {
            report.push("definition.nodes", "empty", "workflow needs at least one node");
            return report;
        }

        let mut node_ids = HashSet::new();
        let mut has_start = false;
        let mut has_end = false;
        for (index, node) in definition.nodes.iter().enumerate() {
            let field = format!("definition.nodes[{index}]");
            if !node_ids.insert(node.id.as_str()) {
                report.push(
                    format!("{field}.id"),
                    "duplicate_node",
                    format!("duplicate node id: {}", node.id),
                );
            }
            if node.name.trim().is_empty() {
                report.push(
                    format!("{field}.name"),
                    "missing_name",
                    format!("node {} has no name", node.id),
                );
            }
            match node.kind {
                NodeKind::Start => has_start = true,
                NodeKind::End => has_end = true,
                _ => {}
            }
            if let Some((code, message)) = node.kind.config_issue() {
                report.push(field, code, format!("node {}: {message}", node.id));
            }
        }
        if !has_start {
            report.push("definition.nodes", "missing_start", "workflow needs a start node");
        }
        if !has_end {
            report.push("definition.nodes", "missing_end", "workflow needs an end node");
        }

        let mut edge_ids = HashSet::new();
        for (index, edge) in definition.edges.iter().enumerate() {
            let field = format!("definition.edges[{index}]");
            if !edge_ids.insert(edge.id.as_str()) {
                report.push(
                    format!("{field}.id"),
                    "duplicate_edge",
                    format!("duplicate edge id: {}", edge.id),
                );
            }
            if !node_ids.contains(edge.source.as_str()) {
                report.push(
                    format!("{field}.source"),
                    "unknown_node",
                    format!("edge {} source {} does not exist", edge.id, edge.source),
                );
            }
            if !node_ids.contains(edge.target.as_str()) {
                report.push(
                    format!("{field}.target"),
                    "unknown_node",
                    format!("edge {} target {} does not exist", edge.id, edge.target),
                );
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition() -> WorkflowDefinition {
        serde_json::from_value(json!({
            "nodes": [
                { "id": "start", "name": "Start", "type": "start" },
                { "id": "review", "name": "Review", "type": "approval", "approvers": ["u1"] },
                { "id": "end", "name": "End", "type": "end" }
            ],
            "edges": [
                { "id": "e1", "source": "start", "target": "review" },
                { "id": "e2", "source": "review", "target": "end" }
            ]
        }))
        .unwrap()
    }

    fn new_workflow() -> NewWorkflow {
        NewWorkflow {
            name: "Release review".to_string(),
            description: None,
            workflow_type: WorkflowType::Review,
            category: "release".to_string(),
            creator_id: "user-1".to_string(),
            project_id: None,
            is_template: false,
            revision: None,
            definition: Some(definition()),
            tags: vec!["ops".to_string(), "ops".to_string(), " ".to_string()],
        }
    }

    #[test]
    fn test_create_defaults() {
        let workflow = Workflow::create(new_workflow()).unwrap();
        assert_eq!(workflow.status, WorkflowStatus::Draft);
        assert_eq!(workflow.revision, INITIAL_REVISION);
        assert!(!workflow.meta.is_active);
        assert_eq!(workflow.tags, vec!["ops".to_string()]);
        assert!(!workflow.is_runnable());
    }

    #[test]
    fn test_create_rejects_bad_revision_and_name() {
        let mut input = new_workflow();
        input.revision = Some("v2".to_string());
        input.name = String::new();
        let Err(DomainError::Validation(report)) = Workflow::create(input) else {
            panic!("expected validation error");
        };
        assert!(report.has_code("regex"));
        assert!(report.has_code("length"));
    }

    #[test]
    fn test_status_transitions() {
        let mut workflow = Workflow::create(new_workflow()).unwrap();
        workflow.activate().unwrap();
        assert!(workflow.is_runnable());
        assert!(workflow.activate().is_err());

        workflow.deactivate().unwrap();
        assert_eq!(workflow.status, WorkflowStatus::Inactive);
        workflow.archive().unwrap();
        assert!(workflow.activate().is_err());

        workflow.mark_as_deleted().unwrap();
        assert!(workflow.meta.deleted_at.is_some());
        assert!(workflow.mark_as_deleted().is_err());
    }

    #[test]
    fn test_definition_round_trip_keeps_node_config() {
        let definition = definition();
        assert_eq!(definition.nodes[1].kind.type_name(), "approval");
        let value = serde_json::to_value(&definition).unwrap();
        assert_eq!(value["nodes"][1]["type"], "approval");
        assert_eq!(value["nodes"][1]["mode"], "any");
    }

    #[test]
    fn test_valid_definition() {
        let workflow = Workflow::create(new_workflow()).unwrap();
        let report = workflow.validate_definition();
        assert!(report.is_valid(), "{report}");
    }

    #[test]
    fn test_definition_problems_are_reported() {
        let mut workflow = Workflow::create(new_workflow()).unwrap();
        let definition: WorkflowDefinition = serde_json::from_value(json!({
            "nodes": [
                { "id": "a", "name": "", "type": "task" },
                { "id": "a", "name": "Script", "type": "script", "code": "  " }
            ],
            "edges": [
                { "id": "e1", "source": "a", "target": "ghost" }
            ]
        }))
        .unwrap();
        workflow.definition = Some(definition);

        let report = workflow.validate_definition();
        assert!(!report.is_valid());
        for code in [
            "duplicate_node",
            "missing_name",
            "missing_assignee",
            "missing_code",
            "missing_start",
            "missing_end",
            "unknown_node",
        ] {
            assert!(report.has_code(code), "missing {code}");
        }

        workflow.definition = None;
        assert!(workflow.validate_definition().has_code("required"));
    }

    #[test]
    fn test_execution_stats() {
        let mut workflow = Workflow::create(new_workflow()).unwrap();
        workflow.record_execution_started();
        workflow.record_execution_started();
        workflow.record_execution_stopped();
        workflow.update_execution_stats(ExecutionOutcome::Successful, Some(100));
        workflow.record_execution_stopped();
        workflow.update_execution_stats(ExecutionOutcome::Failed, Some(300));

        let stats = &workflow.statistics;
        assert_eq!(stats.executions.total, 2);
        assert_eq!(stats.executions.successful, 1);
        assert_eq!(stats.executions.failed, 1);
        assert_eq!(stats.executions.running, 0);
        assert_eq!(stats.usage.execution_count, 2);

        let perf = stats.performance.as_ref().unwrap();
        assert_eq!(perf.average_duration_ms, 200.0);
        assert_eq!(perf.min_duration_ms, 100);
        assert_eq!(perf.max_duration_ms, 300);
        assert_eq!(perf.last_duration_ms, Some(300));

        workflow.record_execution_stopped();
        workflow.update_execution_stats(ExecutionOutcome::Cancelled, None);
        assert_eq!(workflow.statistics.executions.running, 0);
        assert_eq!(workflow.statistics.executions.cancelled, 1);
    }

    #[test]
    fn test_total_counts_finished_executions_only() {
        let mut workflow = Workflow::create(new_workflow()).unwrap();
        workflow.record_execution_started();
        workflow.record_execution_started();
        assert_eq!(workflow.statistics.executions.total, 0);
        assert_eq!(workflow.statistics.usage.execution_count, 2);

        workflow.record_execution_stopped();
        workflow.update_execution_stats(ExecutionOutcome::Successful, Some(50));
        assert_eq!(workflow.statistics.executions.total, 1);
        assert_eq!(workflow.statistics.executions.running, 1);
        assert_eq!(workflow.statistics.usage.execution_count, 2);
    }

    #[test]
    fn test_tags() {
        let mut workflow = Workflow::create(new_workflow()).unwrap();
        workflow.add_tag("release");
        workflow.remove_tag("ops");
        assert_eq!(workflow.tags, vec!["release".to_string()]);
    }
}
