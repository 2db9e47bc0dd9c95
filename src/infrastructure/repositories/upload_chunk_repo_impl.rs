// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{
    from_db, from_db_opt, from_json, from_json_opt, insert_error, now, parse_column, to_db,
    to_db_opt, to_json, to_json_opt, version_mismatch,
};
use crate::domain::models::record::RecordMeta;
use crate::domain::models::upload_chunk::UploadChunk;
use crate::domain::repositories::upload_chunk_repository::UploadChunkRepository;
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::entities::upload_chunk as upload_chunk_entity;
use async_trait::async_trait;
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 上传分片仓库实现
#[derive(Clone)]
pub struct UploadChunkRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl UploadChunkRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<upload_chunk_entity::Model> for UploadChunk {
    type Error = RepositoryError;

    fn try_from(model: upload_chunk_entity::Model) -> Result<Self, Self::Error> {
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
            chunk_index: model.chunk_index,
            chunk_size: model.chunk_size,
            chunk_md5: model.chunk_md5,
            status: parse_column(&model.status)?,
            storage_path: model.storage_path,
            temp_path: model.temp_path,
            etag: model.etag,
            started_at: from_db_opt(model.started_at),
            uploaded_at: from_db_opt(model.uploaded_at),
            failed_at: from_db_opt(model.failed_at),
            duration_ms: model.duration_ms,
            error: from_json_opt(model.error)?,
            retry_count: model.retry_count,
            max_retries: model.max_retries,
            metadata: from_json(model.metadata)?,
        })
    }
}

fn active_model(chunk: &UploadChunk) -> Result<upload_chunk_entity::ActiveModel, RepositoryError> {
    Ok(upload_chunk_entity::ActiveModel {
        id: Set(chunk.meta.id),
        task_id: Set(chunk.task_id),
        chunk_index: Set(chunk.chunk_index),
        chunk_size: Set(chunk.chunk_size),
        chunk_md5: Set(chunk.chunk_md5.clone()),
        status: Set(chunk.status.to_string()),
        storage_path: Set(chunk.storage_path.clone()),
        temp_path: Set(chunk.temp_path.clone()),
        etag: Set(chunk.etag.clone()),
        started_at: Set(to_db_opt(chunk.started_at)),
        uploaded_at: Set(to_db_opt(chunk.uploaded_at)),
        failed_at: Set(to_db_opt(chunk.failed_at)),
        duration_ms: Set(chunk.duration_ms),
        error: Set(to_json_opt(chunk.error.as_ref())?),
        retry_count: Set(chunk.retry_count),
        max_retries: Set(chunk.max_retries),
        metadata: Set(to_json(&chunk.metadata)?),
        created_at: Set(to_db(chunk.meta.created_at)),
        updated_at: Set(to_db(chunk.meta.updated_at)),
        deleted_at: Set(to_db_opt(chunk.meta.deleted_at)),
        created_by: Set(chunk.meta.created_by.clone()),
        updated_by: Set(chunk.meta.updated_by.clone()),
        version: Set(chunk.meta.version),
        is_active: Set(chunk.meta.is_active),
        sort_order: Set(chunk.meta.sort_order),
        remark: Set(chunk.meta.remark.clone()),
    })
}

#[async_trait]
impl UploadChunkRepository for UploadChunkRepositoryImpl {
    async fn create(&self, chunk: &UploadChunk) -> Result<UploadChunk, RepositoryError> {
        let model = active_model(chunk)?;
        upload_chunk_entity::Entity::insert(model)
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| {
                insert_error(e, || {
                    format!("chunk {} of task {}", chunk.chunk_index, chunk.task_id)
                })
            })?;
        Ok(chunk.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UploadChunk>, RepositoryError> {
        upload_chunk_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(UploadChunk::try_from)
            .transpose()
    }

    async fn find_by_index(
        &self,
        task_id: Uuid,
        chunk_index: i32,
    ) -> Result<Option<UploadChunk>, RepositoryError> {
        upload_chunk_entity::Entity::find()
            .filter(upload_chunk_entity::Column::TaskId.eq(task_id))
            .filter(upload_chunk_entity::Column::ChunkIndex.eq(chunk_index))
            .one(self.db.as_ref())
            .await?
            .map(UploadChunk::try_from)
            .transpose()
    }

    async fn list_by_task(&self, task_id: Uuid) -> Result<Vec<UploadChunk>, RepositoryError> {
        upload_chunk_entity::Entity::find()
            .filter(upload_chunk_entity::Column::TaskId.eq(task_id))
            .order_by_asc(upload_chunk_entity::Column::ChunkIndex)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(UploadChunk::try_from)
            .collect()
    }

    async fn update(
        &self,
        chunk: &UploadChunk,
        expected_version: i32,
    ) -> Result<UploadChunk, RepositoryError> {
        let updated_at = now();
        let mut model = active_model(chunk)?;
        model.id = NotSet;
        model.created_at = NotSet;
        model.created_by = NotSet;
        model.version = Set(expected_version + 1);
        model.updated_at = Set(to_db(updated_at));

        let result = upload_chunk_entity::Entity::update_many()
            .set(model)
            .filter(upload_chunk_entity::Column::Id.eq(chunk.meta.id))
            .filter(upload_chunk_entity::Column::Version.eq(expected_version))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            let actual = upload_chunk_entity::Entity::find_by_id(chunk.meta.id)
                .select_only()
                .column(upload_chunk_entity::Column::Version)
                .into_tuple::<i32>()
                .one(self.db.as_ref())
                .await?;
            return Err(version_mismatch(chunk.meta.id, expected_version, actual));
        }

        let mut stored = chunk.clone();
        stored.meta.version = expected_version + 1;
        stored.meta.updated_at = updated_at;
        Ok(stored)
    }
}
