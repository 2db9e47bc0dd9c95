// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{chunked_upload, create_test_context, md5_of, single_upload};
use chrono::{Duration, Utc};
use runledger::domain::models::record::ErrorPayload;
use runledger::domain::models::upload_chunk::{ChunkStatus, NewUploadChunk};
use runledger::domain::models::upload_task::UploadStatus;
use runledger::domain::services::upload_service::ChunkCompletion;
use runledger::domain::services::ServiceError;

fn chunk(index: u8, size: i64) -> NewUploadChunk {
    NewUploadChunk {
        chunk_index: i32::from(index),
        chunk_size: size,
        chunk_md5: md5_of(index),
        temp_path: None,
    }
}

/// 测试分片上传全流程
///
/// 每完成一个分片，父任务的分片数、字节数和进度同步更新。
#[tokio::test]
async fn test_chunked_upload_updates_parent_progress() {
    let ctx = create_test_context().await;
    let service = &ctx.upload_service;
    let task = service.create_task(chunked_upload()).await.unwrap();
    let id = task.meta.id;

    for (index, size) in [(0u8, 1000i64), (1, 1000), (2, 500)] {
        service.register_chunk(id, chunk(index, size)).await.unwrap();
    }
    let out_of_range = service.register_chunk(id, chunk(3, 10)).await.unwrap_err();
    assert!(matches!(out_of_range, ServiceError::Conflict(_)));

    // 任务未开始时不能上传分片
    let err = service.start_chunk(id, 0, 1).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let task = service.start_task(id, task.meta.version).await.unwrap();
    assert_eq!(task.status, UploadStatus::Uploading);

    let started = service.start_chunk(id, 0, 1).await.unwrap();
    assert_eq!(started.status, ChunkStatus::Uploading);
    let mismatch = service
        .complete_chunk(
            id,
            0,
            started.meta.version,
            ChunkCompletion {
                md5: Some(md5_of(9)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(mismatch, ServiceError::Conflict(_)));

    let (done, parent) = service
        .complete_chunk(
            id,
            0,
            started.meta.version,
            ChunkCompletion {
                md5: Some(md5_of(0).to_uppercase()),
                etag: Some("etag-0".to_string()),
                storage_path: Some("/chunks/0".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(done.status, ChunkStatus::Completed);
    assert_eq!(parent.uploaded_chunks, 1);
    assert_eq!(parent.uploaded_size, 1000);
    assert!((parent.progress - 40.0).abs() < 1e-9);

    for index in [1, 2] {
        let started = service.start_chunk(id, index, 1).await.unwrap();
        service
            .complete_chunk(id, index, started.meta.version, ChunkCompletion::default())
            .await
            .unwrap();
    }

    let parent = service.get_task(id).await.unwrap();
    assert_eq!(parent.uploaded_chunks, 3);
    assert_eq!(parent.uploaded_size, 2500);
    assert!((parent.progress - 100.0).abs() < 1e-9);

    let parent = service.mark_processing(id, parent.meta.version).await.unwrap();
    let parent = service
        .complete_task(id, parent.meta.version, Some("/files/video.mp4".to_string()))
        .await
        .unwrap();
    assert_eq!(parent.status, UploadStatus::Completed);
    assert!(parent.duration_ms.is_some());

    let chunks = service.list_chunks(id).await.unwrap();
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|chunk| chunk.status == ChunkStatus::Completed));
}

/// 测试失败任务的自动重试
///
/// 失败时根据重试策略写入重试时间，到期后被重新打开。
#[tokio::test]
async fn test_failed_upload_is_reopened_when_due() {
    let ctx = create_test_context().await;
    let service = &ctx.upload_service;
    let task = service.create_task(single_upload()).await.unwrap();
    let id = task.meta.id;

    let task = service.start_task(id, task.meta.version).await.unwrap();
    let before = Utc::now();
    let failed = service
        .fail_task(id, task.meta.version, ErrorPayload::new("connection reset").with_code("E_NET"))
        .await
        .unwrap();
    assert_eq!(failed.status, UploadStatus::Failed);
    let next = failed.next_retry_at.expect("retry should be scheduled");
    assert!(next >= before + Duration::seconds(9));

    assert_eq!(service.retry_due_tasks(Utc::now(), 10).await.unwrap(), 0);
    let reopened = service
        .retry_due_tasks(next + Duration::seconds(1), 10)
        .await
        .unwrap();
    assert_eq!(reopened, 1);

    let task = service.get_task(id).await.unwrap();
    assert_eq!(task.status, UploadStatus::Pending);
    assert_eq!(task.retry_count, 1);
    assert!(task.error.is_none());
    assert!(task.next_retry_at.is_none());

    // 重试次数用尽后不再安排重试
    let task = service.start_task(id, task.meta.version).await.unwrap();
    let failed = service
        .fail_task(id, task.meta.version, ErrorPayload::new("connection reset"))
        .await
        .unwrap();
    assert!(failed.next_retry_at.is_none());
    let err = service.retry_task(id, failed.meta.version).await.unwrap_err();
    assert!(matches!(err, ServiceError::Domain(_)));

    let reset = service.reset_task(id, failed.meta.version).await.unwrap();
    assert_eq!(reset.status, UploadStatus::Pending);
    assert_eq!(reset.retry_count, 0);
}

#[tokio::test]
async fn test_stale_version_is_rejected() {
    let ctx = create_test_context().await;
    let task = ctx.upload_service.create_task(single_upload()).await.unwrap();
    ctx.upload_service.start_task(task.meta.id, 1).await.unwrap();

    let err = ctx.upload_service.cancel_task(task.meta.id, 1).await.unwrap_err();
    assert!(matches!(err, ServiceError::Repository(_)));
    let stored = ctx.upload_service.get_task(task.meta.id).await.unwrap();
    assert_eq!(stored.status, UploadStatus::Uploading);
}

#[tokio::test]
async fn test_upload_retry_worker_reopens_due_tasks() {
    use runledger::domain::models::upload_task::UploadTask;
    use runledger::domain::repositories::upload_task_repository::UploadTaskRepository;
    use runledger::workers::retry_worker::UploadRetryWorker;
    use runledger::workers::Worker;

    let ctx = create_test_context().await;
    let mut task = UploadTask::create(single_upload()).unwrap();
    task.mark_as_failed(ErrorPayload::new("timeout")).unwrap();
    task.next_retry_at = Some(Utc::now() - Duration::seconds(1));
    let task = ctx.upload_tasks.create(&task).await.unwrap();

    let worker = UploadRetryWorker::new(ctx.upload_service.clone(), 10);
    assert_eq!(worker.name(), "upload_retry");
    assert_eq!(worker.run().await.unwrap(), 1);
    assert_eq!(worker.run().await.unwrap(), 0);

    let stored = ctx.upload_service.get_task(task.meta.id).await.unwrap();
    assert_eq!(stored.status, UploadStatus::Pending);
    assert_eq!(stored.meta.version, 2);
}

/// 客户端上报的进度领先于已完成分片时，完成分片不会让进度回退
#[tokio::test]
async fn test_chunk_completion_after_progress_report() {
    let ctx = create_test_context().await;
    let service = &ctx.upload_service;
    let task = service.create_task(chunked_upload()).await.unwrap();
    let id = task.meta.id;
    for index in 0..3u8 {
        service.register_chunk(id, chunk(index, 1000)).await.unwrap();
    }

    let task = service.start_task(id, task.meta.version).await.unwrap();
    let task = service
        .update_task_progress(id, task.meta.version, 1500, None)
        .await
        .unwrap();
    assert!((task.progress - 60.0).abs() < 1e-9);

    let started = service.start_chunk(id, 0, 1).await.unwrap();
    let (done, parent) = service
        .complete_chunk(id, 0, started.meta.version, ChunkCompletion::default())
        .await
        .unwrap();
    assert_eq!(done.status, ChunkStatus::Completed);
    assert_eq!(parent.uploaded_size, 1500);
    assert_eq!(parent.uploaded_chunks, 1);
    assert!((parent.progress - 60.0).abs() < 1e-9);

    let started = service.start_chunk(id, 1, 1).await.unwrap();
    let (_, parent) = service
        .complete_chunk(id, 1, started.meta.version, ChunkCompletion::default())
        .await
        .unwrap();
    assert_eq!(parent.uploaded_size, 2000);
    assert_eq!(parent.uploaded_chunks, 2);
    assert!((parent.progress - 80.0).abs() < 1e-9);
}

/// 重试保留已完成分片，重置则让所有分片重新上传
#[tokio::test]
async fn test_retry_keeps_chunks_and_reset_discards_them() {
    let ctx = create_test_context().await;
    let service = &ctx.upload_service;
    let task = service.create_task(chunked_upload()).await.unwrap();
    let id = task.meta.id;
    service.register_chunk(id, chunk(0, 1000)).await.unwrap();
    service.register_chunk(id, chunk(1, 1000)).await.unwrap();

    let task = service.start_task(id, task.meta.version).await.unwrap();
    let started = service.start_chunk(id, 0, 1).await.unwrap();
    let (_, task) = service
        .complete_chunk(id, 0, started.meta.version, ChunkCompletion::default())
        .await
        .unwrap();
    assert_eq!(task.uploaded_chunks, 1);

    let failed = service
        .fail_task(id, task.meta.version, ErrorPayload::new("disk full"))
        .await
        .unwrap();
    let retried = service.retry_task(id, failed.meta.version).await.unwrap();
    assert_eq!(retried.uploaded_chunks, 0);

    let restarted = service.start_task(id, retried.meta.version).await.unwrap();
    assert_eq!(restarted.status, UploadStatus::Uploading);
    assert_eq!(restarted.uploaded_chunks, 1);
    assert_eq!(restarted.uploaded_size, 1000);
    assert!((restarted.progress - 40.0).abs() < 1e-9);

    let failed = service
        .fail_task(id, restarted.meta.version, ErrorPayload::new("disk full"))
        .await
        .unwrap();
    let reset = service.reset_task(id, failed.meta.version).await.unwrap();
    assert_eq!(reset.status, UploadStatus::Pending);

    let chunks = service.list_chunks(id).await.unwrap();
    assert!(chunks.iter().all(|chunk| chunk.status == ChunkStatus::Pending));
    assert!(chunks.iter().all(|chunk| chunk.etag.is_none() && chunk.uploaded_at.is_none()));
    // 未动过的分片不会被重复保存
    assert_eq!(chunks[1].meta.version, 1);

    let fresh = service.start_task(id, reset.meta.version).await.unwrap();
    assert_eq!(fresh.uploaded_chunks, 0);
    assert_eq!(fresh.progress, 0.0);

    let again = service.start_chunk(id, 0, chunks[0].meta.version).await.unwrap();
    assert_eq!(again.status, ChunkStatus::Uploading);
}

#[tokio::test]
async fn test_find_task_by_business_number() {
    let ctx = create_test_context().await;
    let created = ctx.upload_service.create_task(single_upload()).await.unwrap();

    let found = ctx.upload_service.find_task_by_task_id("single-1").await.unwrap();
    assert_eq!(found.meta.id, created.meta.id);

    let err = ctx
        .upload_service
        .find_task_by_task_id("missing")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}
