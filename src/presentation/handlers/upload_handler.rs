// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::validate_payload;
use crate::application::dto::upload_request::{
    ChunkCompletedResponse, CompleteChunkRequest, CompleteUploadRequest, FailRequest,
    UploadListQuery, UploadProgressRequest,
};
use crate::application::dto::{PageResponse, VersionedRequest};
use crate::domain::models::upload_chunk::{NewUploadChunk, UploadChunk};
use crate::domain::models::upload_task::{NewUploadTask, UploadTask};
use crate::domain::services::upload_service::UploadService;
use crate::presentation::errors::AppError;

type UploadResult = Result<Json<UploadTask>, AppError>;
type ChunkResult = Result<Json<UploadChunk>, AppError>;

/// 创建上传任务
pub async fn create_upload(
    Extension(service): Extension<Arc<UploadService>>,
    Json(payload): Json<NewUploadTask>,
) -> Result<(StatusCode, Json<UploadTask>), AppError> {
    let task = service.create_task(payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// 分页查询上传任务
pub async fn list_uploads(
    Extension(service): Extension<Arc<UploadService>>,
    Query(params): Query<UploadListQuery>,
) -> Result<Json<PageResponse<UploadTask>>, AppError> {
    validate_payload(&params)?;
    let query = params.to_query();
    let page = query.page;
    let (items, total) = service.list_tasks(query).await?;
    Ok(Json(PageResponse::new(items, total, page)))
}

pub async fn get_upload(
    Extension(service): Extension<Arc<UploadService>>,
    Path(id): Path<Uuid>,
) -> UploadResult {
    Ok(Json(service.get_task(id).await?))
}

/// 按业务任务编号查询上传任务
pub async fn get_upload_by_task_id(
    Extension(service): Extension<Arc<UploadService>>,
    Path(task_id): Path<String>,
) -> UploadResult {
    Ok(Json(service.find_task_by_task_id(&task_id).await?))
}

pub async fn start_upload(
    Extension(service): Extension<Arc<UploadService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VersionedRequest>,
) -> UploadResult {
    Ok(Json(service.start_task(id, payload.expected_version).await?))
}

pub async fn update_upload_progress(
    Extension(service): Extension<Arc<UploadService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UploadProgressRequest>,
) -> UploadResult {
    validate_payload(&payload)?;
    let task = service
        .update_task_progress(
            id,
            payload.expected_version,
            payload.uploaded_size,
            payload.uploaded_chunks,
        )
        .await?;
    Ok(Json(task))
}

pub async fn mark_upload_processing(
    Extension(service): Extension<Arc<UploadService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VersionedRequest>,
) -> UploadResult {
    Ok(Json(service.mark_processing(id, payload.expected_version).await?))
}

pub async fn complete_upload(
    Extension(service): Extension<Arc<UploadService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteUploadRequest>,
) -> UploadResult {
    validate_payload(&payload)?;
    let task = service
        .complete_task(id, payload.expected_version, payload.storage_path)
        .await?;
    Ok(Json(task))
}

pub async fn fail_upload(
    Extension(service): Extension<Arc<UploadService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FailRequest>,
) -> UploadResult {
    validate_payload(&payload)?;
    let task = service
        .fail_task(id, payload.expected_version, payload.payload())
        .await?;
    Ok(Json(task))
}

pub async fn retry_upload(
    Extension(service): Extension<Arc<UploadService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VersionedRequest>,
) -> UploadResult {
    Ok(Json(service.retry_task(id, payload.expected_version).await?))
}

pub async fn cancel_upload(
    Extension(service): Extension<Arc<UploadService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VersionedRequest>,
) -> UploadResult {
    Ok(Json(service.cancel_task(id, payload.expected_version).await?))
}

pub async fn reset_upload(
    Extension(service): Extension<Arc<UploadService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VersionedRequest>,
) -> UploadResult {
    Ok(Json(service.reset_task(id, payload.expected_version).await?))
}

/// 注册分片
pub async fn register_chunk(
    Extension(service): Extension<Arc<UploadService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewUploadChunk>,
) -> Result<(StatusCode, Json<UploadChunk>), AppError> {
    let chunk = service.register_chunk(id, payload).await?;
    Ok((StatusCode::CREATED, Json(chunk)))
}

pub async fn list_chunks(
    Extension(service): Extension<Arc<UploadService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<UploadChunk>>, AppError> {
    Ok(Json(service.list_chunks(id).await?))
}

pub async fn start_chunk(
    Extension(service): Extension<Arc<UploadService>>,
    Path((id, index)): Path<(Uuid, i32)>,
    Json(payload): Json<VersionedRequest>,
) -> ChunkResult {
    Ok(Json(service.start_chunk(id, index, payload.expected_version).await?))
}

/// 完成分片，返回分片和更新后的父任务
pub async fn complete_chunk(
    Extension(service): Extension<Arc<UploadService>>,
    Path((id, index)): Path<(Uuid, i32)>,
    Json(payload): Json<CompleteChunkRequest>,
) -> Result<Json<ChunkCompletedResponse>, AppError> {
    validate_payload(&payload)?;
    let expected_version = payload.expected_version;
    let (chunk, task) = service
        .complete_chunk(id, index, expected_version, payload.into())
        .await?;
    Ok(Json(ChunkCompletedResponse { chunk, task }))
}

pub async fn fail_chunk(
    Extension(service): Extension<Arc<UploadService>>,
    Path((id, index)): Path<(Uuid, i32)>,
    Json(payload): Json<FailRequest>,
) -> ChunkResult {
    validate_payload(&payload)?;
    let chunk = service
        .fail_chunk(id, index, payload.expected_version, payload.payload())
        .await?;
    Ok(Json(chunk))
}

pub async fn retry_chunk(
    Extension(service): Extension<Arc<UploadService>>,
    Path((id, index)): Path<(Uuid, i32)>,
    Json(payload): Json<VersionedRequest>,
) -> ChunkResult {
    Ok(Json(service.retry_chunk(id, index, payload.expected_version).await?))
}
