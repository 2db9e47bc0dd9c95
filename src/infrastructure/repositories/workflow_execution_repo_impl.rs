// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{
    from_db, from_db_opt, from_json, from_json_opt, insert_error, now, parse_column, to_db,
    to_db_opt, to_json, to_json_opt, version_mismatch,
};
use crate::domain::models::record::RecordMeta;
use crate::domain::models::workflow_execution::{ExecutionStatus, WorkflowExecution};
use crate::domain::repositories::workflow_execution_repository::{
    ExecutionQuery, WorkflowExecutionRepository,
};
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::entities::workflow_execution as execution_entity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 工作流执行仓库实现
///
/// 节点历史、进度、日志等嵌套结构以 JSON 列保存；
/// `next_retry_at` 额外冗余为独立列，供重试扫描使用。
#[derive(Clone)]
pub struct WorkflowExecutionRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl WorkflowExecutionRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<execution_entity::Model> for WorkflowExecution {
    type Error = RepositoryError;

    fn try_from(model: execution_entity::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            meta: RecordMeta {
                id: model.id,
                created_at: from_db(model.created_at),
                updated_at: from_db(model.updated_at),
                deleted_at: from_db_opt(model.deleted_at),
                created_by: model.created_by,
                updated_by: model.updated_by,
                version: model.version,
                is_active: model.is_active,
                sort_order: model.sort_order,
                remark: model.remark,
            },
            workflow_id: model.workflow_id,
            executor_id: model.executor_id,
            status: parse_column(&model.status)?,
            priority: parse_column(&model.priority)?,
            trigger: from_json(model.trigger)?,
            input_data: model.input_data,
            output_data: model.output_data,
            current_node_id: model.current_node_id,
            node_history: from_json(model.node_history)?,
            progress: from_json(model.progress)?,
            started_at: from_db_opt(model.started_at),
            completed_at: from_db_opt(model.completed_at),
            paused_at: from_db_opt(model.paused_at),
            resumed_at: from_db_opt(model.resumed_at),
            failed_at: from_db_opt(model.failed_at),
            duration_ms: model.duration_ms,
            error: from_json_opt(model.error)?,
            retry: from_json(model.retry_info)?,
            logs: from_json(model.logs)?,
            approvals: from_json(model.approvals)?,
            notifications: from_json(model.notifications)?,
        })
    }
}

fn active_model(
    execution: &WorkflowExecution,
) -> Result<execution_entity::ActiveModel, RepositoryError> {
    Ok(execution_entity::ActiveModel {
        id: Set(execution.meta.id),
        workflow_id: Set(execution.workflow_id),
        executor_id: Set(execution.executor_id.clone()),
        status: Set(execution.status.to_string()),
        priority: Set(execution.priority.to_string()),
        trigger_type: Set(execution.trigger.type_name().to_string()),
        trigger: Set(to_json(&execution.trigger)?),
        input_data: Set(execution.input_data.clone()),
        output_data: Set(execution.output_data.clone()),
        current_node_id: Set(execution.current_node_id.clone()),
        node_history: Set(to_json(&execution.node_history)?),
        progress: Set(to_json(&execution.progress)?),
        started_at: Set(to_db_opt(execution.started_at)),
        completed_at: Set(to_db_opt(execution.completed_at)),
        paused_at: Set(to_db_opt(execution.paused_at)),
        resumed_at: Set(to_db_opt(execution.resumed_at)),
        failed_at: Set(to_db_opt(execution.failed_at)),
        duration_ms: Set(execution.duration_ms),
        error: Set(to_json_opt(execution.error.as_ref())?),
        retry_info: Set(to_json(&execution.retry)?),
        next_retry_at: Set(to_db_opt(execution.retry.next_retry_at)),
        logs: Set(to_json(&execution.logs)?),
        approvals: Set(to_json(&execution.approvals)?),
        notifications: Set(to_json(&execution.notifications)?),
        created_at: Set(to_db(execution.meta.created_at)),
        updated_at: Set(to_db(execution.meta.updated_at)),
        deleted_at: Set(to_db_opt(execution.meta.deleted_at)),
        created_by: Set(execution.meta.created_by.clone()),
        updated_by: Set(execution.meta.updated_by.clone()),
        version: Set(execution.meta.version),
        is_active: Set(execution.meta.is_active),
        sort_order: Set(execution.meta.sort_order),
        remark: Set(execution.meta.remark.clone()),
    })
}

#[async_trait]
impl WorkflowExecutionRepository for WorkflowExecutionRepositoryImpl {
    async fn create(
        &self,
        execution: &WorkflowExecution,
    ) -> Result<WorkflowExecution, RepositoryError> {
        let model = active_model(execution)?;
        execution_entity::Entity::insert(model)
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| insert_error(e, || format!("execution {}", execution.meta.id)))?;
        Ok(execution.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkflowExecution>, RepositoryError> {
        execution_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(WorkflowExecution::try_from)
            .transpose()
    }

    async fn update(
        &self,
        execution: &WorkflowExecution,
        expected_version: i32,
    ) -> Result<WorkflowExecution, RepositoryError> {
        let updated_at = now();
        let mut model = active_model(execution)?;
        model.id = NotSet;
        model.created_at = NotSet;
        model.created_by = NotSet;
        model.version = Set(expected_version + 1);
        model.updated_at = Set(to_db(updated_at));

        let result = execution_entity::Entity::update_many()
            .set(model)
            .filter(execution_entity::Column::Id.eq(execution.meta.id))
            .filter(execution_entity::Column::Version.eq(expected_version))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            let actual = execution_entity::Entity::find_by_id(execution.meta.id)
                .select_only()
                .column(execution_entity::Column::Version)
                .into_tuple::<i32>()
                .one(self.db.as_ref())
                .await?;
            return Err(version_mismatch(execution.meta.id, expected_version, actual));
        }

        let mut stored = execution.clone();
        stored.meta.version = expected_version + 1;
        stored.meta.updated_at = updated_at;
        Ok(stored)
    }

    async fn query(
        &self,
        query: ExecutionQuery,
    ) -> Result<(Vec<WorkflowExecution>, u64), RepositoryError> {
        let mut select = execution_entity::Entity::find()
            .filter(execution_entity::Column::DeletedAt.is_null());

        if let Some(workflow_id) = query.workflow_id {
            select = select.filter(execution_entity::Column::WorkflowId.eq(workflow_id));
        }
        if let Some(status) = query.status {
            select = select.filter(execution_entity::Column::Status.eq(status.as_str()));
        }

        let total = select.clone().count(self.db.as_ref()).await?;
        let executions = select
            .order_by_desc(execution_entity::Column::CreatedAt)
            .limit(query.page.limit)
            .offset(query.page.offset)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(WorkflowExecution::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((executions, total))
    }

    async fn find_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError> {
        let executions = execution_entity::Entity::find()
            .filter(execution_entity::Column::Status.is_in([
                ExecutionStatus::Failed.as_str(),
                ExecutionStatus::Timeout.as_str(),
            ]))
            .filter(execution_entity::Column::NextRetryAt.is_not_null())
            .filter(execution_entity::Column::NextRetryAt.lte(to_db(now)))
            .filter(execution_entity::Column::DeletedAt.is_null())
            .order_by_asc(execution_entity::Column::NextRetryAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(WorkflowExecution::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        // 重试预算保存在 JSON 列中，读取后再过滤
        Ok(executions
            .into_iter()
            .filter(WorkflowExecution::can_retry)
            .collect())
    }
}
