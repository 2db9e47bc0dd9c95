// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{
    from_db, from_db_opt, from_json, from_json_opt, insert_error, now, parse_column, to_db,
    to_db_opt, to_json, to_json_opt, version_mismatch,
};
use crate::domain::models::record::RecordMeta;
use crate::domain::models::workflow::Workflow;
use crate::domain::repositories::workflow_repository::{WorkflowQuery, WorkflowRepository};
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::entities::workflow as workflow_entity;
use async_trait::async_trait;
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 工作流仓库实现
#[derive(Clone)]
pub struct WorkflowRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl WorkflowRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<workflow_entity::Model> for Workflow {
    type Error = RepositoryError;

    fn try_from(model: workflow_entity::Model) -> Result<Self, Self::Error> {
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
            name: model.name,
            description: model.description,
            workflow_type: parse_column(&model.workflow_type)?,
            category: model.category,
            status: parse_column(&model.status)?,
            is_template: model.is_template,
            revision: model.revision,
            creator_id: model.creator_id,
            project_id: model.project_id,
            definition: from_json_opt(model.definition)?,
            tags: from_json(model.tags)?,
            statistics: from_json(model.statistics)?,
        })
    }
}

fn active_model(workflow: &Workflow) -> Result<workflow_entity::ActiveModel, RepositoryError> {
    Ok(workflow_entity::ActiveModel {
        id: Set(workflow.meta.id),
        name: Set(workflow.name.clone()),
        description: Set(workflow.description.clone()),
        workflow_type: Set(workflow.workflow_type.to_string()),
        category: Set(workflow.category.clone()),
        status: Set(workflow.status.to_string()),
        is_template: Set(workflow.is_template),
        revision: Set(workflow.revision.clone()),
        creator_id: Set(workflow.creator_id.clone()),
        project_id: Set(workflow.project_id),
        definition: Set(to_json_opt(workflow.definition.as_ref())?),
        tags: Set(to_json(&workflow.tags)?),
        statistics: Set(to_json(&workflow.statistics)?),
        created_at: Set(to_db(workflow.meta.created_at)),
        updated_at: Set(to_db(workflow.meta.updated_at)),
        deleted_at: Set(to_db_opt(workflow.meta.deleted_at)),
        created_by: Set(workflow.meta.created_by.clone()),
        updated_by: Set(workflow.meta.updated_by.clone()),
        version: Set(workflow.meta.version),
        is_active: Set(workflow.meta.is_active),
        sort_order: Set(workflow.meta.sort_order),
        remark: Set(workflow.meta.remark.clone()),
    })
}

#[async_trait]
impl WorkflowRepository for WorkflowRepositoryImpl {
    async fn create(&self, workflow: &Workflow) -> Result<Workflow, RepositoryError> {
        let model = active_model(workflow)?;
        workflow_entity::Entity::insert(model)
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| insert_error(e, || format!("workflow {}", workflow.meta.id)))?;
        Ok(workflow.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Workflow>, RepositoryError> {
        workflow_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(Workflow::try_from)
            .transpose()
    }

    async fn update(
        &self,
        workflow: &Workflow,
        expected_version: i32,
    ) -> Result<Workflow, RepositoryError> {
        let updated_at = now();
        let mut model = active_model(workflow)?;
        model.id = NotSet;
        model.created_at = NotSet;
        model.created_by = NotSet;
        model.version = Set(expected_version + 1);
        model.updated_at = Set(to_db(updated_at));

        let result = workflow_entity::Entity::update_many()
            .set(model)
            .filter(workflow_entity::Column::Id.eq(workflow.meta.id))
            .filter(workflow_entity::Column::Version.eq(expected_version))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            let actual = workflow_entity::Entity::find_by_id(workflow.meta.id)
                .select_only()
                .column(workflow_entity::Column::Version)
                .into_tuple::<i32>()
                .one(self.db.as_ref())
                .await?;
            return Err(version_mismatch(workflow.meta.id, expected_version, actual));
        }

        let mut stored = workflow.clone();
        stored.meta.version = expected_version + 1;
        stored.meta.updated_at = updated_at;
        Ok(stored)
    }
    async fn query(&self, query: WorkflowQuery) -> Result<(Vec<Workflow>, u64), RepositoryError> {
        let mut select = workflow_entity::Entity::find()
            .filter(workflow_entity::Column::DeletedAt.is_null());

        if let Some(status) = query.status {
            select = select.filter(workflow_entity::Column::Status.eq(status.as_str()));
        }
        if let Some(workflow_type) = query.workflow_type {
            select = select.filter(workflow_entity::Column::WorkflowType.eq(workflow_type.as_str()));
        }
        if let Some(creator_id) = query.creator_id {
            select = select.filter(workflow_entity::Column::CreatorId.eq(creator_id));
        }

        let total = select.clone().count(self.db.as_ref()).await?;
        let workflows = select
            .order_by_desc(workflow_entity::Column::UpdatedAt)
            .limit(query.page.limit)
            .offset(query.page.offset)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(Workflow::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((workflows, total))
    }
}
