// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{
    from_db, from_db_opt, from_json, from_json_opt, insert_error, now, parse_column, to_db,
    to_db_opt, to_json, to_json_opt, version_mismatch,
};
use crate::domain::models::record::RecordMeta;
use crate::domain::models::upload_task::{UploadStatus, UploadTask};
use crate::domain::repositories::upload_task_repository::{UploadTaskQuery, UploadTaskRepository};
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::entities::upload_task as upload_task_entity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 上传任务仓库实现
///
/// 基于SeaORM实现的上传任务数据访问层
#[derive(Clone)]
pub struct UploadTaskRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl UploadTaskRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn current_version(&self, id: Uuid) -> Result<Option<i32>, RepositoryError> {
        Ok(upload_task_entity::Entity::find_by_id(id)
            .select_only()
            .column(upload_task_entity::Column::Version)
            .into_tuple::<i32>()
            .one(self.db.as_ref())
            .await?)
    }
}

impl TryFrom<upload_task_entity::Model> for UploadTask {
    type Error = RepositoryError;

    fn try_from(model: upload_task_entity::Model) -> Result<Self, Self::Error> {
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
            task_id: model.task_id,
            original_name: model.original_name,
            file_size: model.file_size,
            mime_type: model.mime_type,
            upload_type: parse_column(&model.upload_type)?,
            status: parse_column(&model.status)?,
            progress: model.progress,
            uploaded_size: model.uploaded_size,
            total_chunks: model.total_chunks,
            uploaded_chunks: model.uploaded_chunks,
            chunk_size: model.chunk_size,
            file_md5: model.file_md5,
            uploader_id: model.uploader_id,
            file_id: model.file_id,
            storage_path: model.storage_path,
            temp_path: model.temp_path,
            started_at: from_db_opt(model.started_at),
            completed_at: from_db_opt(model.completed_at),
            failed_at: from_db_opt(model.failed_at),
            duration_ms: model.duration_ms,
            error: from_json_opt(model.error)?,
            retry_count: model.retry_count,
            max_retries: model.max_retries,
            next_retry_at: from_db_opt(model.next_retry_at),
            upload_config: from_json_opt(model.upload_config)?,
            metadata: from_json(model.metadata)?,
        })
    }
}

fn active_model(task: &UploadTask) -> Result<upload_task_entity::ActiveModel, RepositoryError> {
    Ok(upload_task_entity::ActiveModel {
        id: Set(task.meta.id),
        task_id: Set(task.task_id.clone()),
        original_name: Set(task.original_name.clone()),
        file_size: Set(task.file_size),
        mime_type: Set(task.mime_type.clone()),
        upload_type: Set(task.upload_type.to_string()),
        status: Set(task.status.to_string()),
        progress: Set(task.progress),
        uploaded_size: Set(task.uploaded_size),
        total_chunks: Set(task.total_chunks),
        uploaded_chunks: Set(task.uploaded_chunks),
        chunk_size: Set(task.chunk_size),
        file_md5: Set(task.file_md5.clone()),
        uploader_id: Set(task.uploader_id.clone()),
        file_id: Set(task.file_id),
        storage_path: Set(task.storage_path.clone()),
        temp_path: Set(task.temp_path.clone()),
        started_at: Set(to_db_opt(task.started_at)),
        completed_at: Set(to_db_opt(task.completed_at)),
        failed_at: Set(to_db_opt(task.failed_at)),
        duration_ms: Set(task.duration_ms),
        error: Set(to_json_opt(task.error.as_ref())?),
        retry_count: Set(task.retry_count),
        max_retries: Set(task.max_retries),
        next_retry_at: Set(to_db_opt(task.next_retry_at)),
        upload_config: Set(to_json_opt(task.upload_config.as_ref())?),
        metadata: Set(to_json(&task.metadata)?),
        created_at: Set(to_db(task.meta.created_at)),
        updated_at: Set(to_db(task.meta.updated_at)),
        deleted_at: Set(to_db_opt(task.meta.deleted_at)),
        created_by: Set(task.meta.created_by.clone()),
        updated_by: Set(task.meta.updated_by.clone()),
        version: Set(task.meta.version),
        is_active: Set(task.meta.is_active),
        sort_order: Set(task.meta.sort_order),
        remark: Set(task.meta.remark.clone()),
    })
}

#[async_trait]
impl UploadTaskRepository for UploadTaskRepositoryImpl {
    async fn create(&self, task: &UploadTask) -> Result<UploadTask, RepositoryError> {
        let model = active_model(task)?;
        upload_task_entity::Entity::insert(model)
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| insert_error(e, || format!("upload task {}", task.task_id)))?;
        Ok(task.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UploadTask>, RepositoryError> {
        upload_task_entity::Entity::find_by_id(id)
            .filter(upload_task_entity::Column::DeletedAt.is_null())
            .one(self.db.as_ref())
            .await?
            .map(UploadTask::try_from)
            .transpose()
    }

    async fn find_by_task_id(&self, task_id: &str) -> Result<Option<UploadTask>, RepositoryError> {
        upload_task_entity::Entity::find()
            .filter(upload_task_entity::Column::TaskId.eq(task_id))
            .filter(upload_task_entity::Column::DeletedAt.is_null())
            .one(self.db.as_ref())
            .await?
            .map(UploadTask::try_from)
            .transpose()
    }

    async fn update(
        &self,
        task: &UploadTask,
        expected_version: i32,
    ) -> Result<UploadTask, RepositoryError> {
        let updated_at = now();
        let mut model = active_model(task)?;
        model.id = NotSet;
        model.created_at = NotSet;
        model.created_by = NotSet;
        model.version = Set(expected_version + 1);
        model.updated_at = Set(to_db(updated_at));

        let result = upload_task_entity::Entity::update_many()
            .set(model)
            .filter(upload_task_entity::Column::Id.eq(task.meta.id))
            .filter(upload_task_entity::Column::Version.eq(expected_version))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            let actual = self.current_version(task.meta.id).await?;
            return Err(version_mismatch(task.meta.id, expected_version, actual));
        }

        let mut stored = task.clone();
        stored.meta.version = expected_version + 1;
        stored.meta.updated_at = updated_at;
        Ok(stored)
    }

    async fn query(&self, query: UploadTaskQuery) -> Result<(Vec<UploadTask>, u64), RepositoryError> {
        let mut select = upload_task_entity::Entity::find()
            .filter(upload_task_entity::Column::DeletedAt.is_null());

        if let Some(status) = query.status {
            select = select.filter(upload_task_entity::Column::Status.eq(status.as_str()));
        }
        if let Some(uploader_id) = query.uploader_id {
            select = select.filter(upload_task_entity::Column::UploaderId.eq(uploader_id));
        }

        let total = select.clone().count(self.db.as_ref()).await?;
        let tasks = select
            .order_by_desc(upload_task_entity::Column::CreatedAt)
            .limit(query.page.limit)
            .offset(query.page.offset)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(UploadTask::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((tasks, total))
    }

    async fn find_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<UploadTask>, RepositoryError> {
        upload_task_entity::Entity::find()
            .filter(upload_task_entity::Column::Status.eq(UploadStatus::Failed.as_str()))
            .filter(upload_task_entity::Column::NextRetryAt.is_not_null())
            .filter(upload_task_entity::Column::NextRetryAt.lte(to_db(now)))
            .filter(
                Expr::col(upload_task_entity::Column::RetryCount)
                    .lt(Expr::col(upload_task_entity::Column::MaxRetries)),
            )
            .filter(upload_task_entity::Column::DeletedAt.is_null())
            .order_by_asc(upload_task_entity::Column::NextRetryAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(UploadTask::try_from)
            .collect()
    }
}
