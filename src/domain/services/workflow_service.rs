// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{check_version, ServiceError};
use crate::domain::models::lifecycle::{DomainError, Transition};
use crate::domain::models::record::ErrorPayload;
use crate::domain::models::workflow::{ExecutionOutcome, NewWorkflow, Workflow};
use crate::domain::models::workflow_execution::{
    ExecutionError, ExecutionStatus, NewExecution, WorkflowExecution,
};
use crate::domain::repositories::workflow_execution_repository::{
    ExecutionQuery, WorkflowExecutionRepository,
};
use crate::domain::repositories::workflow_repository::{WorkflowQuery, WorkflowRepository};
use crate::domain::repositories::RepositoryError;
use crate::utils::retry_policy::RetryPolicy;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 更新工作流统计时的最大尝试次数
const STATS_UPDATE_ATTEMPTS: usize = 3;

/// 工作流服务
///
/// 管理工作流定义的状态，以及执行实例从启动到结束的全过程。
/// 执行进入终态时同步更新所属工作流的统计信息。
pub struct WorkflowService {
    workflows: Arc<dyn WorkflowRepository>,
    executions: Arc<dyn WorkflowExecutionRepository>,
    retry_policy: RetryPolicy,
}

impl WorkflowService {
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        executions: Arc<dyn WorkflowExecutionRepository>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            workflows,
            executions,
            retry_policy,
        }
    }

    pub async fn create_workflow(&self, input: NewWorkflow) -> Result<Workflow, ServiceError> {
        let workflow = Workflow::create(input)?;
        let workflow = self.workflows.create(&workflow).await?;
        counter!("workflows_created_total", "workflow_type" => workflow.workflow_type.as_str())
            .increment(1);
        info!(id = %workflow.meta.id, name = %workflow.name, "Workflow created");
        Ok(workflow)
    }

    pub async fn get_workflow(&self, id: Uuid) -> Result<Workflow, ServiceError> {
        self.workflows
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("workflow", id))
    }

    pub async fn list_workflows(
        &self,
        query: WorkflowQuery,
    ) -> Result<(Vec<Workflow>, u64), ServiceError> {
        Ok(self.workflows.query(query).await?)
    }

    async fn transition_workflow<F>(
        &self,
        id: Uuid,
        expected_version: i32,
        event: Transition,
        apply: F,
    ) -> Result<Workflow, ServiceError>
    where
        F: FnOnce(&mut Workflow) -> Result<(), ServiceError>,
    {
        let mut workflow = self.get_workflow(id).await?;
        check_version(id, expected_version, workflow.meta.version)?;
        apply(&mut workflow)?;
        let saved = self.workflows.update(&workflow, expected_version).await?;
        info!(id = %id, status = %saved.status, event = %event, "Workflow status changed");
        Ok(saved)
    }

    /// 激活工作流，定义必须通过校验
    pub async fn activate_workflow(
        &self,
        id: Uuid,
        expected_version: i32,
    ) -> Result<Workflow, ServiceError> {
        self.transition_workflow(id, expected_version, Transition::Activate, |workflow| {
            let report = workflow.validate_definition();
            if !report.is_valid() {
                return Err(DomainError::Validation(report).into());
            }
            Ok(workflow.activate()?)
        })
        .await
    }

    pub async fn deactivate_workflow(
        &self,
        id: Uuid,
        expected_version: i32,
    ) -> Result<Workflow, ServiceError> {
        self.transition_workflow(id, expected_version, Transition::Deactivate, |workflow| {
            Ok(workflow.deactivate()?)
        })
        .await
    }

    pub async fn archive_workflow(
        &self,
        id: Uuid,
        expected_version: i32,
    ) -> Result<Workflow, ServiceError> {
        self.transition_workflow(id, expected_version, Transition::Archive, |workflow| {
            Ok(workflow.archive()?)
        })
        .await
    }

    /// 更新工作流统计
    ///
    /// 同一工作流的多个执行会并发结束，版本冲突时重新加载后再试。
    async fn update_workflow_stats<F>(&self, workflow_id: Uuid, apply: F) -> Result<(), ServiceError>
    where
        F: Fn(&mut Workflow),
    {
        for attempt in 1..=STATS_UPDATE_ATTEMPTS {
            let mut workflow = self.get_workflow(workflow_id).await?;
            let version = workflow.meta.version;
            apply(&mut workflow);
            match self.workflows.update(&workflow, version).await {
                Ok(_) => return Ok(()),
                Err(RepositoryError::ConcurrentModification { .. }) if attempt < STATS_UPDATE_ATTEMPTS => {
                    debug!(workflow_id = %workflow_id, attempt, "Workflow statistics conflict, reloading");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// 启动执行
    ///
    /// 工作流必须处于激活状态且定义有效。执行记录创建后立即进入 Running。
    pub async fn start_execution(
        &self,
        workflow_id: Uuid,
        input: NewExecution,
    ) -> Result<WorkflowExecution, ServiceError> {
        let workflow = self.get_workflow(workflow_id).await?;
        if !workflow.is_runnable() {
            return Err(ServiceError::Conflict(format!(
                "workflow {workflow_id} is {}",
                workflow.status
            )));
        }
        let report = workflow.validate_definition();
        if !report.is_valid() {
            return Err(DomainError::Validation(report).into());
        }

        let mut execution = WorkflowExecution::create(&workflow, input)?;
        execution.start()?;
        let execution = self.executions.create(&execution).await?;
        self.update_workflow_stats(workflow_id, Workflow::record_execution_started)
            .await?;

        counter!(
            "workflow_executions_started_total",
            "trigger" => execution.trigger.type_name()
        )
        .increment(1);
        info!(
            id = %execution.meta.id,
            workflow_id = %workflow_id,
            trigger = execution.trigger.type_name(),
            priority = %execution.priority,
            "Workflow execution started"
        );
        Ok(execution)
    }

    pub async fn get_execution(&self, id: Uuid) -> Result<WorkflowExecution, ServiceError> {
        self.executions
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("workflow execution", id))
    }

    pub async fn list_executions(
        &self,
        query: ExecutionQuery,
    ) -> Result<(Vec<WorkflowExecution>, u64), ServiceError> {
        Ok(self.executions.query(query).await?)
    }

    async fn save_execution(
        &self,
        execution: &WorkflowExecution,
        expected_version: i32,
        event: Transition,
    ) -> Result<WorkflowExecution, ServiceError> {
        let saved = self.executions.update(execution, expected_version).await?;
        counter!("workflow_execution_transitions_total", "event" => event.as_str()).increment(1);
        debug!(
            id = %saved.meta.id,
            status = %saved.status,
            version = saved.meta.version,
            event = %event,
            "Workflow execution saved"
        );
        Ok(saved)
    }

    async fn transition_execution<F>(
        &self,
        id: Uuid,
        expected_version: i32,
        event: Transition,
        apply: F,
    ) -> Result<WorkflowExecution, ServiceError>
    where
        F: FnOnce(&mut WorkflowExecution) -> Result<(), ServiceError>,
    {
        let mut execution = self.get_execution(id).await?;
        check_version(id, expected_version, execution.meta.version)?;
        apply(&mut execution)?;
        self.save_execution(&execution, expected_version, event).await
    }

    /// 开始一个处于 Pending 的执行（重试或重置之后）
    pub async fn begin_execution(
        &self,
        id: Uuid,
        expected_version: i32,
    ) -> Result<WorkflowExecution, ServiceError> {
        let execution = self
            .transition_execution(id, expected_version, Transition::Start, |execution| {
                Ok(execution.start()?)
            })
            .await?;
        self.update_workflow_stats(execution.workflow_id, Workflow::record_execution_started)
            .await?;
        Ok(execution)
    }

    /// 进入节点，节点必须存在于工作流定义中
    pub async fn enter_node(
        &self,
        id: Uuid,
        expected_version: i32,
        node_id: &str,
    ) -> Result<WorkflowExecution, ServiceError> {
        let execution = self.get_execution(id).await?;
        let workflow = self.get_workflow(execution.workflow_id).await?;
        let node = workflow
            .definition
            .as_ref()
            .and_then(|definition| definition.node(node_id))
            .ok_or_else(|| DomainError::UnknownNode(node_id.to_string()))?;

        self.transition_execution(id, expected_version, Transition::EnterNode, |execution| {
            Ok(execution.update_current_node(node)?)
        })
        .await
    }

    pub async fn complete_node(
        &self,
        id: Uuid,
        expected_version: i32,
        node_id: &str,
        output: Option<serde_json::Value>,
    ) -> Result<WorkflowExecution, ServiceError> {
        self.transition_execution(id, expected_version, Transition::CompleteNode, |execution| {
            Ok(execution.complete_node(node_id, output)?)
        })
        .await
    }

    pub async fn fail_node(
        &self,
        id: Uuid,
        expected_version: i32,
        node_id: &str,
        error: ErrorPayload,
    ) -> Result<WorkflowExecution, ServiceError> {
        self.transition_execution(id, expected_version, Transition::FailNode, |execution| {
            Ok(execution.fail_node(node_id, error)?)
        })
        .await
    }

    pub async fn update_node_progress(
        &self,
        id: Uuid,
        expected_version: i32,
        node_id: &str,
        percentage: f64,
        message: Option<String>,
    ) -> Result<WorkflowExecution, ServiceError> {
        self.transition_execution(id, expected_version, Transition::UpdateProgress, |execution| {
            Ok(execution.update_progress(node_id, percentage, message)?)
        })
        .await
    }

    pub async fn pause_execution(
        &self,
        id: Uuid,
        expected_version: i32,
    ) -> Result<WorkflowExecution, ServiceError> {
        self.transition_execution(id, expected_version, Transition::Pause, |execution| {
            Ok(execution.pause()?)
        })
        .await
    }

    pub async fn resume_execution(
        &self,
        id: Uuid,
        expected_version: i32,
    ) -> Result<WorkflowExecution, ServiceError> {
        self.transition_execution(id, expected_version, Transition::Resume, |execution| {
            Ok(execution.resume()?)
        })
        .await
    }

    /// 执行进入终态后的收尾：写入统计、记录指标
    async fn finish_execution(
        &self,
        execution: &WorkflowExecution,
        was_started: bool,
        outcome: ExecutionOutcome,
    ) -> Result<(), ServiceError> {
        let duration_ms = execution.duration_ms;
        self.update_workflow_stats(execution.workflow_id, |workflow| {
            if was_started {
                workflow.record_execution_stopped();
            }
            workflow.update_execution_stats(outcome, duration_ms);
        })
        .await?;

        counter!(
            "workflow_executions_finished_total",
            "status" => execution.status.as_str()
        )
        .increment(1);
        if let Some(duration_ms) = duration_ms {
            histogram!("workflow_execution_duration_seconds").record(duration_ms as f64 / 1000.0);
        }
        Ok(())
    }

    /// 加载、转换、保存并写入统计
    async fn terminate_execution<F>(
        &self,
        id: Uuid,
        expected_version: i32,
        event: Transition,
        outcome: ExecutionOutcome,
        apply: F,
    ) -> Result<WorkflowExecution, ServiceError>
    where
        F: FnOnce(&mut WorkflowExecution) -> Result<(), ServiceError>,
    {
        let mut execution = self.get_execution(id).await?;
        check_version(id, expected_version, execution.meta.version)?;
        let was_started = matches!(
            execution.status,
            ExecutionStatus::Running | ExecutionStatus::Paused
        );
        apply(&mut execution)?;
        let saved = self.save_execution(&execution, expected_version, event).await?;
        self.finish_execution(&saved, was_started, outcome).await?;
        Ok(saved)
    }

    /// 失败或超时后根据工作流自带的重试设置写入下次重试时间
    fn schedule_retry(&self, execution: &mut WorkflowExecution) {
        if !execution.can_retry() {
            return;
        }
        let retry = &execution.retry;
        let policy = self.retry_policy.with_overrides(
            retry.strategy,
            u32::try_from(retry.max_retries).unwrap_or(0),
            Duration::from_secs(retry.retry_delay_secs),
        );
        let attempt = u32::try_from(retry.current_retry + 1).unwrap_or(1);
        execution.retry.next_retry_at = Some(policy.next_retry_time(attempt, Utc::now()));
    }

    pub async fn complete_execution(
        &self,
        id: Uuid,
        expected_version: i32,
        output: Option<serde_json::Value>,
    ) -> Result<WorkflowExecution, ServiceError> {
        let execution = self
            .terminate_execution(
                id,
                expected_version,
                Transition::Complete,
                ExecutionOutcome::Successful,
                |execution| Ok(execution.complete(output)?),
            )
            .await?;
        info!(id = %id, duration_ms = ?execution.duration_ms, "Workflow execution completed");
        Ok(execution)
    }

    pub async fn fail_execution(
        &self,
        id: Uuid,
        expected_version: i32,
        error: ExecutionError,
    ) -> Result<WorkflowExecution, ServiceError> {
        let execution = self
            .terminate_execution(
                id,
                expected_version,
                Transition::Fail,
                ExecutionOutcome::Failed,
                |execution| {
                    execution.fail(error)?;
                    self.schedule_retry(execution);
                    Ok(())
                },
            )
            .await?;
        warn!(
            id = %id,
            error = execution.error.as_ref().map(|e| e.message.as_str()).unwrap_or_default(),
            next_retry_at = ?execution.retry.next_retry_at,
            "Workflow execution failed"
        );
        Ok(execution)
    }

    pub async fn timeout_execution(
        &self,
        id: Uuid,
        expected_version: i32,
    ) -> Result<WorkflowExecution, ServiceError> {
        let execution = self
            .terminate_execution(
                id,
                expected_version,
                Transition::Timeout,
                ExecutionOutcome::Failed,
                |execution| {
                    execution.timeout()?;
                    self.schedule_retry(execution);
                    Ok(())
                },
            )
            .await?;
        warn!(id = %id, next_retry_at = ?execution.retry.next_retry_at, "Workflow execution timed out");
        Ok(execution)
    }

    pub async fn cancel_execution(
        &self,
        id: Uuid,
        expected_version: i32,
    ) -> Result<WorkflowExecution, ServiceError> {
        let execution = self
            .terminate_execution(
                id,
                expected_version,
                Transition::Cancel,
                ExecutionOutcome::Cancelled,
                |execution| Ok(execution.cancel()?),
            )
            .await?;
        info!(id = %id, "Workflow execution cancelled");
        Ok(execution)
    }

    /// 手动重试，执行回到 Pending，需要再次开始
    pub async fn retry_execution(
        &self,
        id: Uuid,
        expected_version: i32,
        reason: Option<String>,
    ) -> Result<WorkflowExecution, ServiceError> {
        self.transition_execution(id, expected_version, Transition::Retry, |execution| {
            Ok(execution.retry(reason)?)
        })
        .await
    }

    /// 清空重试历史和节点历史，回到全新的 Pending
    pub async fn reset_execution(
        &self,
        id: Uuid,
        expected_version: i32,
    ) -> Result<WorkflowExecution, ServiceError> {
        self.transition_execution(id, expected_version, Transition::Reset, |execution| {
            if !execution.status.is_terminal() {
                return Err(DomainError::invalid(execution.status.as_str(), Transition::Reset).into());
            }
            execution.reset();
            Ok(())
        })
        .await
    }

    /// 重新打开已到重试时间的执行
    ///
    /// # 返回值
    ///
    /// 回到 Pending 的执行数。
    pub async fn retry_due_executions(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<usize, ServiceError> {
        let due = self.executions.find_due_retries(now, limit).await?;
        let mut reopened = 0;

        for mut execution in due {
            let version = execution.meta.version;
            if let Err(e) = execution.retry(Some("scheduled retry".to_string())) {
                debug!(id = %execution.meta.id, error = %e, "Skipping execution that is no longer retryable");
                continue;
            }
            match self.save_execution(&execution, version, Transition::Retry).await {
                Ok(_) => reopened += 1,
                Err(ServiceError::Repository(RepositoryError::ConcurrentModification { .. })) => {
                    debug!(id = %execution.meta.id, "Execution changed concurrently, skipping retry");
                }
                Err(e) => return Err(e),
            }
        }

        if reopened > 0 {
            info!(count = reopened, "Re-opened failed workflow executions");
        }
        Ok(reopened)
    }
}

#[cfg(test)]
#[path = "workflow_service_test.rs"]
mod tests;
