// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use super::lifecycle::{clamp_percentage, elapsed_ms, string_enum, DomainError, Transition};
use super::record::{ErrorPayload, RecordMeta};
use super::workflow::{RetrySettings, Workflow, WorkflowNode};
use crate::utils::retry_policy::RetryStrategy;
use crate::utils::validators::validate_not_blank;

string_enum! {
    /// 执行状态
    ///
    /// Pending → Running ⇄ Paused → Completed / Failed / Cancelled / Timeout
    pub enum ExecutionStatus {
        Pending => "pending",
        Running => "running",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
        Timeout => "timeout",
    }
}

impl ExecutionStatus {
    /// 是否已结束
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Cancelled
                | ExecutionStatus::Timeout
        )
    }

    /// 失败类状态，允许重试
    pub fn is_failure(&self) -> bool {
        matches!(self, ExecutionStatus::Failed | ExecutionStatus::Timeout)
    }
}

string_enum! {
    /// 执行优先级
    pub enum Priority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// 触发方式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    Manual {
        #[serde(default)]
        reason: Option<String>,
    },
    Event {
        event_type: String,
        entity_id: String,
        entity_type: String,
    },
    Schedule {
        cron_expression: String,
        #[serde(default)]
        timezone: Option<String>,
    },
    Webhook {
        url: String,
        method: String,
    },
    Api {
        endpoint: String,
        method: String,
        #[serde(default)]
        request_id: Option<String>,
    },
    Dependency {
        parent_execution_id: Uuid,
        parent_workflow_id: Uuid,
        dependency_type: String,
    },
}

impl Trigger {
    pub fn type_name(&self) -> &'static str {
        match self {
            Trigger::Manual { .. } => "manual",
            Trigger::Event { .. } => "event",
            Trigger::Schedule { .. } => "schedule",
            Trigger::Webhook { .. } => "webhook",
            Trigger::Api { .. } => "api",
            Trigger::Dependency { .. } => "dependency",
        }
    }
}

string_enum! {
    /// 节点执行状态
    pub enum NodeStatus {
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

/// 节点执行记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: String,
    pub node_name: String,
    pub node_type: String,
    pub status: NodeStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub output: Option<serde_json::Value>,
    pub error: Option<ErrorPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeProgress {
    pub status: NodeStatus,
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OverallProgress {
    pub percentage: f64,
    pub completed_nodes: i32,
    pub total_nodes: i32,
}

/// 执行进度
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionProgress {
    pub overall: OverallProgress,
    pub nodes: BTreeMap<String, NodeProgress>,
}

impl ExecutionProgress {
    fn with_total(total_nodes: i32) -> Self {
        Self {
            overall: OverallProgress {
                total_nodes,
                ..Default::default()
            },
            nodes: BTreeMap::new(),
        }
    }

    /// 重新计算总体进度，只增不减
    fn recompute(&mut self) {
        let reported = i32::try_from(self.nodes.len()).unwrap_or(i32::MAX);
        let denominator = self.overall.total_nodes.max(reported);
        if denominator == 0 {
            return;
        }
        let sum: f64 = self.nodes.values().map(|node| node.percentage).sum();
        let percentage = clamp_percentage((sum / f64::from(denominator)).floor());
        self.overall.percentage = self.overall.percentage.max(percentage);
    }
}

string_enum! {
    /// 执行错误分类
    pub enum ErrorKind {
        System => "system",
        Business => "business",
        Validation => "validation",
        Timeout => "timeout",
        Permission => "permission",
        Network => "network",
    }
}

/// 执行错误
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub message: String,
    pub code: Option<String>,
    pub kind: ErrorKind,
    pub node_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub details: Option<String>,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            kind,
            node_id: None,
            timestamp: Utc::now(),
            details: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn at_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }
}

/// 单次重试记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryAttempt {
    pub attempt: i32,
    pub retried_at: DateTime<Utc>,
    pub previous_status: ExecutionStatus,
    pub reason: Option<String>,
}

/// 重试信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryInfo {
    pub enabled: bool,
    pub max_retries: i32,
    pub current_retry: i32,
    pub retry_delay_secs: u64,
    pub strategy: RetryStrategy,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub history: Vec<RetryAttempt>,
}

impl From<RetrySettings> for RetryInfo {
    fn from(settings: RetrySettings) -> Self {
        Self {
            enabled: settings.enabled,
            max_retries: settings.max_retries,
            current_retry: 0,
            retry_delay_secs: settings.retry_delay_secs,
            strategy: settings.strategy,
            last_retry_at: None,
            next_retry_at: None,
            history: Vec::new(),
        }
    }
}

string_enum! {
    pub enum LogLevel {
        Debug => "debug",
        Info => "info",
        Warn => "warn",
        Error => "error",
    }
}

/// 执行日志
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub node_id: Option<String>,
}

string_enum! {
    pub enum ApprovalAction {
        Approve => "approve",
        Reject => "reject",
        Delegate => "delegate",
        RequestInfo => "request_info",
    }
}

/// 审批记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub node_id: String,
    pub approver_id: String,
    pub approver_name: String,
    pub action: ApprovalAction,
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

string_enum! {
    pub enum NotificationChannel {
        Email => "email",
        Sms => "sms",
        InApp => "in_app",
        Webhook => "webhook",
    }
}

string_enum! {
    pub enum NotificationStatus {
        Pending => "pending",
        Sent => "sent",
        Failed => "failed",
    }
}

/// 通知记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub channel: NotificationChannel,
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    pub content: String,
    pub status: NotificationStatus,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// 执行摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSummary {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: ExecutionStatus,
    pub progress: f64,
    pub duration_ms: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// 创建执行实例的输入
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewExecution {
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub executor_id: String,
    pub trigger: Trigger,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub input_data: Option<serde_json::Value>,
}

/// 工作流执行实例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub workflow_id: Uuid,
    pub executor_id: String,
    pub status: ExecutionStatus,
    pub priority: Priority,
    pub trigger: Trigger,
    pub input_data: Option<serde_json::Value>,
    pub output_data: Option<serde_json::Value>,
    pub current_node_id: Option<String>,
    pub node_history: Vec<NodeRecord>,
    pub progress: ExecutionProgress,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub resumed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error: Option<ExecutionError>,
    pub retry: RetryInfo,
    pub logs: Vec<ExecutionLog>,
    pub approvals: Vec<ApprovalRecord>,
    pub notifications: Vec<NotificationRecord>,
}

impl WorkflowExecution {
    /// 基于工作流创建执行实例
    ///
    /// 节点总数和重试设置取自工作流定义。
    pub fn create(workflow: &Workflow, input: NewExecution) -> Result<Self, DomainError> {
        input.validate()?;

        let (total_nodes, retry) = match &workflow.definition {
            Some(definition) => (
                i32::try_from(definition.nodes.len()).unwrap_or(i32::MAX),
                definition.retry_settings(),
            ),
            None => (0, RetrySettings::default()),
        };

        Ok(Self {
            meta: RecordMeta::new(Some(input.executor_id.clone())),
            workflow_id: workflow.meta.id,
            executor_id: input.executor_id,
            status: ExecutionStatus::Pending,
            priority: input.priority,
            trigger: input.trigger,
            input_data: input.input_data,
            output_data: None,
            current_node_id: None,
            node_history: Vec::new(),
            progress: ExecutionProgress::with_total(total_nodes),
            started_at: None,
            completed_at: None,
            paused_at: None,
            resumed_at: None,
            failed_at: None,
            duration_ms: None,
            error: None,
            retry: retry.into(),
            logs: Vec::new(),
            approvals: Vec::new(),
            notifications: Vec::new(),
        })
    }

    fn reject(&self, event: Transition) -> DomainError {
        DomainError::invalid(self.status.as_str(), event)
    }

    fn require_running(&self, event: Transition) -> Result<(), DomainError> {
        if self.status != ExecutionStatus::Running {
            return Err(self.reject(event));
        }
        Ok(())
    }

    /// 结束执行，写入结束时间并缓存耗时
    fn finish(&mut self, status: ExecutionStatus) -> DateTime<Utc> {
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        self.duration_ms = self.started_at.map(|started| elapsed_ms(started, now));
        now
    }

    pub fn can_pause(&self) -> bool {
        self.status == ExecutionStatus::Running
    }

    pub fn can_resume(&self) -> bool {
        self.status == ExecutionStatus::Paused
    }

    pub fn can_cancel(&self) -> bool {
        matches!(
            self.status,
            ExecutionStatus::Pending | ExecutionStatus::Running | ExecutionStatus::Paused
        )
    }

    /// 失败或超时、重试已启用且未用尽时可以重试
    pub fn can_retry(&self) -> bool {
        self.status.is_failure() && self.retry.enabled && self.retry.current_retry < self.retry.max_retries
    }

    /// 开始执行
    pub fn start(&mut self) -> Result<(), DomainError> {
        if self.status != ExecutionStatus::Pending {
            return Err(self.reject(Transition::Start));
        }
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.progress = ExecutionProgress::with_total(self.progress.overall.total_nodes);
        self.retry.next_retry_at = None;
        self.add_log(LogLevel::Info, "execution started", None);
        Ok(())
    }

    /// 进入节点
    ///
    /// 已存在的节点记录会被重新置为 Running。
    pub fn update_current_node(&mut self, node: &WorkflowNode) -> Result<(), DomainError> {
        self.require_running(Transition::EnterNode)?;
        let now = Utc::now();
        match self
            .node_history
            .iter_mut()
            .find(|record| record.node_id == node.id)
        {
            Some(record) => {
                record.status = NodeStatus::Running;
                record.started_at = now;
                record.completed_at = None;
                record.duration_ms = None;
                record.error = None;
            }
            None => self.node_history.push(NodeRecord {
                node_id: node.id.clone(),
                node_name: node.name.clone(),
                node_type: node.kind.type_name().to_string(),
                status: NodeStatus::Running,
                started_at: now,
                completed_at: None,
                duration_ms: None,
                output: None,
                error: None,
            }),
        }

        let entry = self
            .progress
            .nodes
            .entry(node.id.clone())
            .or_insert(NodeProgress {
                status: NodeStatus::Running,
                percentage: 0.0,
                message: None,
            });
        entry.status = NodeStatus::Running;

        self.current_node_id = Some(node.id.clone());
        self.add_log(
            LogLevel::Info,
            format!("entered node {}", node.id),
            Some(node.id.clone()),
        );
        Ok(())
    }

    fn running_node_index(&self, node_id: &str, event: Transition) -> Result<usize, DomainError> {
        self.require_running(event)?;
        let index = self
            .node_history
            .iter()
            .position(|record| record.node_id == node_id)
            .ok_or_else(|| DomainError::UnknownNode(node_id.to_string()))?;
        let status = self.node_history[index].status;
        if status != NodeStatus::Running {
            return Err(DomainError::invalid(status.as_str(), event));
        }
        Ok(index)
    }

    /// 完成节点
    pub fn complete_node(
        &mut self,
        node_id: &str,
        output: Option<serde_json::Value>,
    ) -> Result<(), DomainError> {
        let index = self.running_node_index(node_id, Transition::CompleteNode)?;
        let now = Utc::now();
        let record = &mut self.node_history[index];
        record.status = NodeStatus::Completed;
        record.completed_at = Some(now);
        record.duration_ms = Some(elapsed_ms(record.started_at, now));
        record.output = output;

        self.progress.nodes.insert(
            node_id.to_string(),
            NodeProgress {
                status: NodeStatus::Completed,
                percentage: 100.0,
                message: None,
            },
        );
        let completed = self
            .progress
            .nodes
            .values()
            .filter(|node| node.status == NodeStatus::Completed)
            .count();
        self.progress.overall.completed_nodes = i32::try_from(completed).unwrap_or(i32::MAX);
        self.progress.recompute();
        self.add_log(
            LogLevel::Info,
            format!("completed node {node_id}"),
            Some(node_id.to_string()),
        );
        Ok(())
    }

    /// 节点失败，执行本身保持 Running，由调用方决定是否整体失败
    pub fn fail_node(&mut self, node_id: &str, error: ErrorPayload) -> Result<(), DomainError> {
        let index = self.running_node_index(node_id, Transition::FailNode)?;
        let now = Utc::now();
        let message = error.message.clone();
        let record = &mut self.node_history[index];
        record.status = NodeStatus::Failed;
        record.completed_at = Some(now);
        record.duration_ms = Some(elapsed_ms(record.started_at, now));
        record.error = Some(error);

        if let Some(progress) = self.progress.nodes.get_mut(node_id) {
            progress.status = NodeStatus::Failed;
            progress.message = Some(message.clone());
        }
        self.add_log(
            LogLevel::Error,
            format!("node {node_id} failed: {message}"),
            Some(node_id.to_string()),
        );
        Ok(())
    }

    /// 更新节点进度
    ///
    /// 百分比先限制在 [0, 100]；节点进度回退会被拒绝。
    pub fn update_progress(
        &mut self,
        node_id: &str,
        percentage: f64,
        message: Option<String>,
    ) -> Result<(), DomainError> {
        self.require_running(Transition::UpdateProgress)?;
        let percentage = clamp_percentage(percentage);
        if let Some(current) = self.progress.nodes.get(node_id) {
            if percentage < current.percentage {
                return Err(DomainError::ProgressRegression {
                    current: current.percentage,
                    requested: percentage,
                });
            }
        }
        self.progress.nodes.insert(
            node_id.to_string(),
            NodeProgress {
                status: NodeStatus::Running,
                percentage,
                message,
            },
        );
        self.progress.recompute();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), DomainError> {
        if !self.can_pause() {
            return Err(self.reject(Transition::Pause));
        }
        self.status = ExecutionStatus::Paused;
        self.paused_at = Some(Utc::now());
        self.add_log(LogLevel::Info, "execution paused", None);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), DomainError> {
        if !self.can_resume() {
            return Err(self.reject(Transition::Resume));
        }
        self.status = ExecutionStatus::Running;
        self.resumed_at = Some(Utc::now());
        self.paused_at = None;
        self.add_log(LogLevel::Info, "execution resumed", None);
        Ok(())
    }

    /// 执行完成，总体进度置为 100
    pub fn complete(&mut self, output_data: Option<serde_json::Value>) -> Result<(), DomainError> {
        self.require_running(Transition::Complete)?;
        self.finish(ExecutionStatus::Completed);
        if output_data.is_some() {
            self.output_data = output_data;
        }
        self.progress.overall.percentage = 100.0;
        self.current_node_id = None;
        self.add_log(LogLevel::Info, "execution completed", None);
        Ok(())
    }

    /// 执行失败，错误原样保存
    pub fn fail(&mut self, error: ExecutionError) -> Result<(), DomainError> {
        if !matches!(
            self.status,
            ExecutionStatus::Pending | ExecutionStatus::Running | ExecutionStatus::Paused
        ) {
            return Err(self.reject(Transition::Fail));
        }
        let now = self.finish(ExecutionStatus::Failed);
        self.failed_at = Some(now);
        self.add_log(
            LogLevel::Error,
            format!("execution failed: {}", error.message),
            error.node_id.clone(),
        );
        self.error = Some(error);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if !self.can_cancel() {
            return Err(self.reject(Transition::Cancel));
        }
        self.finish(ExecutionStatus::Cancelled);
        self.retry.next_retry_at = None;
        self.add_log(LogLevel::Info, "execution cancelled", None);
        Ok(())
    }

    /// 执行超时
    pub fn timeout(&mut self) -> Result<(), DomainError> {
        if !matches!(
            self.status,
            ExecutionStatus::Running | ExecutionStatus::Paused
        ) {
            return Err(self.reject(Transition::Timeout));
        }
        let now = self.finish(ExecutionStatus::Timeout);
        self.failed_at = Some(now);
        let mut error =
            ExecutionError::new(ErrorKind::Timeout, "execution timed out").with_code("EXECUTION_TIMEOUT");
        error.timestamp = now;
        error.node_id = self.current_node_id.clone();
        self.error = Some(error);
        self.add_log(LogLevel::Error, "execution timed out", None);
        Ok(())
    }

    /// 重试
    ///
    /// 不满足 `can_retry` 时返回错误且不修改任何字段。
    /// 节点历史保留，进度和时间戳清空。
    pub fn retry(&mut self, reason: Option<String>) -> Result<(), DomainError> {
        if !self.can_retry() {
            return Err(self.reject(Transition::Retry));
        }
        let now = Utc::now();
        self.retry.current_retry += 1;
        self.retry.last_retry_at = Some(now);
        self.retry.history.push(RetryAttempt {
            attempt: self.retry.current_retry,
            retried_at: now,
            previous_status: self.status,
            reason,
        });
        self.status = ExecutionStatus::Pending;
        self.clear_attempt();
        self.add_log(
            LogLevel::Warn,
            format!("retry attempt {}", self.retry.current_retry),
            None,
        );
        Ok(())
    }

    /// 重置为全新的 Pending 执行
    pub fn reset(&mut self) {
        self.status = ExecutionStatus::Pending;
        self.retry.current_retry = 0;
        self.retry.last_retry_at = None;
        self.retry.history.clear();
        self.node_history.clear();
        self.output_data = None;
        self.clear_attempt();
    }

    fn clear_attempt(&mut self) {
        self.progress = ExecutionProgress::with_total(self.progress.overall.total_nodes);
        self.current_node_id = None;
        self.started_at = None;
        self.completed_at = None;
        self.paused_at = None;
        self.resumed_at = None;
        self.failed_at = None;
        self.duration_ms = None;
        self.error = None;
        self.retry.next_retry_at = None;
    }

    pub fn add_log(
        &mut self,
        level: LogLevel,
        message: impl Into<String>,
        node_id: Option<String>,
    ) {
        self.logs.push(ExecutionLog {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            node_id,
        });
    }

    pub fn add_approval(
        &mut self,
        node_id: impl Into<String>,
        approver_id: impl Into<String>,
        approver_name: impl Into<String>,
        action: ApprovalAction,
        comment: Option<String>,
    ) {
        let node_id = node_id.into();
        self.add_log(
            LogLevel::Info,
            format!("approval action: {action}"),
            Some(node_id.clone()),
        );
        self.approvals.push(ApprovalRecord {
            node_id,
            approver_id: approver_id.into(),
            approver_name: approver_name.into(),
            action,
            comment,
            timestamp: Utc::now(),
        });
    }

    pub fn add_notification(
        &mut self,
        channel: NotificationChannel,
        recipients: Vec<String>,
        subject: Option<String>,
        content: impl Into<String>,
    ) {
        self.notifications.push(NotificationRecord {
            channel,
            recipients,
            subject,
            content: content.into(),
            status: NotificationStatus::Pending,
            error: None,
            sent_at: Utc::now(),
        });
    }

    /// 耗时（毫秒），未结束时以当前时间为终点
    pub fn elapsed_ms(&self) -> Option<i64> {
        let started = self.started_at?;
        Some(elapsed_ms(started, self.completed_at.unwrap_or_else(Utc::now)))
    }

    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            id: self.meta.id,
            workflow_id: self.workflow_id,
            status: self.status,
            progress: self.progress.overall.percentage,
            duration_ms: self.duration_ms,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error.as_ref().map(|error| error.message.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::workflow::{NewWorkflow, WorkflowDefinition, WorkflowType};
    use chrono::Duration;
    use serde_json::json;

    fn workflow() -> Workflow {
        let definition: WorkflowDefinition = serde_json::from_value(json!({
            "nodes": [
                { "id": "start", "name": "Start", "type": "start" },
                { "id": "build", "name": "Build", "type": "task", "auto_assign": true },
                { "id": "end", "name": "End", "type": "end" }
            ],
            "edges": [],
            "settings": { "retry": { "enabled": true, "max_retries": 2 } }
        }))
        .unwrap();
        Workflow::create(NewWorkflow {
            name: "Pipeline".to_string(),
            description: None,
            workflow_type: WorkflowType::Deployment,
            category: "ci".to_string(),
            creator_id: "user-1".to_string(),
            project_id: None,
            is_template: false,
            revision: None,
            definition: Some(definition),
            tags: Vec::new(),
        })
        .unwrap()
    }

    fn execution(workflow: &Workflow) -> WorkflowExecution {
        WorkflowExecution::create(
            workflow,
            NewExecution {
                executor_id: "user-2".to_string(),
                trigger: Trigger::Manual { reason: None },
                priority: Priority::default(),
                input_data: Some(json!({ "branch": "main" })),
            },
        )
        .unwrap()
    }

    fn node<'a>(workflow: &'a Workflow, id: &str) -> &'a WorkflowNode {
        workflow.definition.as_ref().unwrap().node(id).unwrap()
    }

    #[test]
    fn test_create_copies_workflow_settings() {
        let workflow = workflow();
        let execution = execution(&workflow);
        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert_eq!(execution.priority, Priority::Medium);
        assert_eq!(execution.progress.overall.total_nodes, 3);
        assert_eq!(execution.retry.max_retries, 2);
        assert!(execution.retry.enabled);
        assert_eq!(execution.workflow_id, workflow.meta.id);
    }

    #[test]
    fn test_trigger_is_tagged() {
        let trigger: Trigger = serde_json::from_value(json!({
            "type": "schedule",
            "cron_expression": "0 * * * *"
        }))
        .unwrap();
        assert_eq!(trigger.type_name(), "schedule");
        assert!(serde_json::from_value::<Trigger>(json!({ "type": "carrier_pigeon" })).is_err());
    }

    #[test]
    fn test_node_progress_drives_overall() {
        let workflow = workflow();
        let mut execution = execution(&workflow);
        execution.start().unwrap();

        execution.update_current_node(node(&workflow, "start")).unwrap();
        execution.complete_node("start", None).unwrap();
        assert_eq!(execution.progress.overall.completed_nodes, 1);
        assert_eq!(execution.progress.overall.percentage, 33.0);

        execution.update_current_node(node(&workflow, "build")).unwrap();
        execution.update_progress("build", 150.0, None).unwrap();
        assert_eq!(execution.progress.nodes["build"].percentage, 100.0);
        assert_eq!(execution.progress.overall.percentage, 66.0);

        let before = execution.clone();
        let err = execution.update_progress("build", 20.0, None).unwrap_err();
        assert!(matches!(err, DomainError::ProgressRegression { .. }));
        assert_eq!(execution, before);
    }

    #[test]
    fn test_unknown_node_is_rejected() {
        let workflow = workflow();
        let mut execution = execution(&workflow);
        execution.start().unwrap();
        assert_eq!(
            execution.complete_node("ghost", None).unwrap_err(),
            DomainError::UnknownNode("ghost".to_string())
        );
    }

    #[test]
    fn test_fail_node_keeps_execution_running() {
        let workflow = workflow();
        let mut execution = execution(&workflow);
        execution.start().unwrap();
        execution.update_current_node(node(&workflow, "build")).unwrap();
        execution
            .fail_node("build", ErrorPayload::new("compile error"))
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Running);
        assert_eq!(execution.node_history[0].status, NodeStatus::Failed);
        assert!(execution.complete_node("build", None).is_err());

        execution.update_current_node(node(&workflow, "build")).unwrap();
        execution.complete_node("build", None).unwrap();
        assert_eq!(execution.node_history.len(), 1);
    }

    #[test]
    fn test_pause_and_resume() {
        let workflow = workflow();
        let mut execution = execution(&workflow);
        assert!(execution.pause().is_err());
        execution.start().unwrap();
        execution.pause().unwrap();
        assert!(execution.paused_at.is_some());
        assert!(execution.update_progress("build", 10.0, None).is_err());
        execution.resume().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Running);
        assert!(execution.resumed_at.is_some());
        assert!(execution.paused_at.is_none());
    }

    #[test]
    fn test_complete_sets_duration() {
        let workflow = workflow();
        let mut execution = execution(&workflow);
        execution.start().unwrap();
        let started = Utc::now() - Duration::milliseconds(2500);
        execution.started_at = Some(started);
        execution.complete(Some(json!({ "artifact": "v1" }))).unwrap();

        assert_eq!(execution.progress.overall.percentage, 100.0);
        let completed = execution.completed_at.unwrap();
        assert_eq!(
            execution.duration_ms,
            Some((completed - started).num_milliseconds())
        );
        assert_eq!(execution.summary().duration_ms, execution.duration_ms);
    }

    #[test]
    fn test_timeout_is_retryable() {
        let workflow = workflow();
        let mut execution = execution(&workflow);
        execution.start().unwrap();
        execution.timeout().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Timeout);
        assert_eq!(
            execution.error.as_ref().map(|e| e.kind),
            Some(ErrorKind::Timeout)
        );
        assert!(execution.can_retry());

        execution.retry(Some("flaky runner".to_string())).unwrap();
        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert_eq!(execution.retry.current_retry, 1);
        assert_eq!(execution.retry.history.len(), 1);
        assert_eq!(
            execution.retry.history[0].previous_status,
            ExecutionStatus::Timeout
        );
        assert!(execution.error.is_none());
        assert!(execution.started_at.is_none());
    }

    #[test]
    fn test_retry_budget_and_disabled_retry() {
        let workflow = workflow();
        let mut execution = execution(&workflow);
        for _ in 0..2 {
            execution.start().unwrap();
            execution
                .fail(ExecutionError::new(ErrorKind::Network, "unreachable"))
                .unwrap();
            execution.retry(None).unwrap();
        }
        execution.start().unwrap();
        execution
            .fail(ExecutionError::new(ErrorKind::Network, "unreachable"))
            .unwrap();
        let before = execution.clone();
        assert!(!execution.can_retry());
        assert!(execution.retry(None).is_err());
        assert_eq!(execution, before);

        execution.reset();
        assert_eq!(execution.retry.current_retry, 0);
        execution.retry.enabled = false;
        execution.start().unwrap();
        execution.cancel().unwrap();
        assert!(!execution.can_retry());
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let workflow = workflow();
        let mut execution = execution(&workflow);
        execution.cancel().unwrap();
        assert!(execution.status.is_terminal());
        assert!(execution.start().is_err());
        assert!(execution.cancel().is_err());
        assert!(execution.timeout().is_err());
    }

    #[test]
    fn test_approvals_and_notifications() {
        let workflow = workflow();
        let mut execution = execution(&workflow);
        execution.add_approval("review", "u1", "Ada", ApprovalAction::Approve, None);
        execution.add_notification(
            NotificationChannel::Email,
            vec!["ops@example.com".to_string()],
            Some("done".to_string()),
            "pipeline finished",
        );
        assert_eq!(execution.approvals.len(), 1);
        assert_eq!(execution.notifications[0].status, NotificationStatus::Pending);
        assert_eq!(execution.logs.last().unwrap().message, "approval action: approve");
    }
}
