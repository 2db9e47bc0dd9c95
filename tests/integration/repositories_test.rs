// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{chunked_upload, create_test_context, md5_of, single_upload};
use chrono::{Duration, Utc};
use runledger::domain::models::record::ErrorPayload;
use runledger::domain::models::upload_chunk::{NewUploadChunk, UploadChunk};
use runledger::domain::models::upload_task::{UploadStatus, UploadTask};
use runledger::domain::repositories::upload_chunk_repository::UploadChunkRepository;
use runledger::domain::repositories::upload_task_repository::{
    UploadTaskQuery, UploadTaskRepository,
};
use runledger::domain::repositories::{Page, RepositoryError};

/// 测试乐观锁
///
/// 同一版本只能成功保存一次，第二次写入返回并发修改错误且不改变记录。
#[tokio::test]
async fn test_versioned_update_rejects_stale_writer() {
    let ctx = create_test_context().await;
    let task = UploadTask::create(single_upload()).unwrap();
    let created = ctx.upload_tasks.create(&task).await.unwrap();
    assert_eq!(created.meta.version, 1);

    let mut first = created.clone();
    first.start().unwrap();
    let saved = ctx.upload_tasks.update(&first, 1).await.unwrap();
    assert_eq!(saved.meta.version, 2);
    assert_eq!(saved.status, UploadStatus::Uploading);

    let mut second = created.clone();
    second.cancel().unwrap();
    let err = ctx.upload_tasks.update(&second, 1).await.unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::ConcurrentModification {
            expected: 1,
            actual: 2,
            ..
        }
    ));

    let stored = ctx.upload_tasks.find_by_id(created.meta.id).await.unwrap().unwrap();
    assert_eq!(stored.status, UploadStatus::Uploading);
    assert_eq!(stored.meta.version, 2);
}

#[tokio::test]
async fn test_duplicate_task_id_and_chunk_index() {
    let ctx = create_test_context().await;
    let task = UploadTask::create(single_upload()).unwrap();
    ctx.upload_tasks.create(&task).await.unwrap();

    let again = UploadTask::create(single_upload()).unwrap();
    assert!(matches!(
        ctx.upload_tasks.create(&again).await,
        Err(RepositoryError::Duplicate(_))
    ));

    let parent = ctx
        .upload_tasks
        .create(&UploadTask::create(chunked_upload()).unwrap())
        .await
        .unwrap();
    let new_chunk = || NewUploadChunk {
        chunk_index: 0,
        chunk_size: 1000,
        chunk_md5: md5_of(0),
        temp_path: None,
    };
    let chunk = UploadChunk::create(parent.meta.id, new_chunk(), None).unwrap();
    ctx.upload_chunks.create(&chunk).await.unwrap();
    let duplicate = UploadChunk::create(parent.meta.id, new_chunk(), None).unwrap();
    assert!(matches!(
        ctx.upload_chunks.create(&duplicate).await,
        Err(RepositoryError::Duplicate(_))
    ));
}

#[tokio::test]
async fn test_find_due_retries_respects_time_and_budget() {
    let ctx = create_test_context().await;
    let now = Utc::now();

    let mut due = UploadTask::create(single_upload()).unwrap();
    due.task_id = "due".to_string();
    due.mark_as_failed(ErrorPayload::new("network")).unwrap();
    due.next_retry_at = Some(now - Duration::seconds(5));
    ctx.upload_tasks.create(&due).await.unwrap();

    let mut later = UploadTask::create(single_upload()).unwrap();
    later.task_id = "later".to_string();
    later.mark_as_failed(ErrorPayload::new("network")).unwrap();
    later.next_retry_at = Some(now + Duration::minutes(5));
    ctx.upload_tasks.create(&later).await.unwrap();

    let mut exhausted = UploadTask::create(single_upload()).unwrap();
    exhausted.task_id = "exhausted".to_string();
    exhausted.mark_as_failed(ErrorPayload::new("network")).unwrap();
    exhausted.retry_count = exhausted.max_retries;
    exhausted.next_retry_at = Some(now - Duration::seconds(5));
    ctx.upload_tasks.create(&exhausted).await.unwrap();

    let found = ctx.upload_tasks.find_due_retries(now, 10).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].task_id, "due");
}

#[tokio::test]
async fn test_query_filters_and_counts() {
    let ctx = create_test_context().await;
    for index in 0..3 {
        let mut task = UploadTask::create(chunked_upload()).unwrap();
        if index == 2 {
            task.uploader_id = "someone-else".to_string();
        }
        ctx.upload_tasks.create(&task).await.unwrap();
    }

    let (items, total) = ctx
        .upload_tasks
        .query(UploadTaskQuery {
            status: Some(UploadStatus::Pending),
            uploader_id: Some("uploader-1".to_string()),
            page: Page {
                limit: 1,
                offset: 0,
            },
        })
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].uploader_id, "uploader-1");
}
