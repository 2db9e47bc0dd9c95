// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_server, md5_of, workflow_payload};
use axum::http::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_health_check() {
    let (server, _ctx) = create_test_server().await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_create_upload_validation_error() {
    let (server, _ctx) = create_test_server().await;
    let response = server
        .post("/v1/uploads")
        .json(&json!({
            "original_name": "broken.bin",
            "file_size": 100,
            "mime_type": "application/octet-stream",
            "upload_type": "chunk",
            "uploader_id": "uploader-1"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].is_string());
    assert!(body["details"]["errors"].is_array());
}

#[tokio::test]
async fn test_upload_lifecycle_over_http() {
    let (server, _ctx) = create_test_server().await;
    let response = server
        .post("/v1/uploads")
        .json(&json!({
            "original_name": "archive.zip",
            "file_size": 2000,
            "mime_type": "application/zip",
            "upload_type": "chunk",
            "total_chunks": 2,
            "chunk_size": 1000,
            "uploader_id": "uploader-1"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let task: Value = response.json();
    let id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["status"], "pending");
    assert_eq!(task["version"], 1);

    server
        .post(&format!("/v1/uploads/{id}/chunks"))
        .json(&json!({ "chunk_index": 0, "chunk_size": 1000, "chunk_md5": md5_of(0) }))
        .await
        .assert_status(StatusCode::CREATED);

    let started: Value = server
        .post(&format!("/v1/uploads/{id}/start"))
        .json(&json!({ "expected_version": 1 }))
        .await
        .json();
    assert_eq!(started["status"], "uploading");

    // 过期版本号
    server
        .post(&format!("/v1/uploads/{id}/cancel"))
        .json(&json!({ "expected_version": 1 }))
        .await
        .assert_status(StatusCode::CONFLICT);

    server
        .post(&format!("/v1/uploads/{id}/chunks/0/start"))
        .json(&json!({ "expected_version": 1 }))
        .await
        .assert_status_ok();
    let completed: Value = server
        .post(&format!("/v1/uploads/{id}/chunks/0/complete"))
        .json(&json!({ "expected_version": 2, "md5": md5_of(0), "etag": "abc" }))
        .await
        .json();
    assert_eq!(completed["chunk"]["status"], "completed");
    assert_eq!(completed["task"]["uploaded_chunks"], 1);
    assert_eq!(completed["task"]["progress"], 50.0);

    let chunks: Value = server.get(&format!("/v1/uploads/{id}/chunks")).await.json();
    assert_eq!(chunks.as_array().unwrap().len(), 1);

    let version = completed["task"]["version"].as_i64().unwrap();
    let cancelled: Value = server
        .post(&format!("/v1/uploads/{id}/cancel"))
        .json(&json!({ "expected_version": version }))
        .await
        .json();
    assert_eq!(cancelled["status"], "cancelled");

    // 终态任务不能再开始
    server
        .post(&format!("/v1/uploads/{id}/start"))
        .json(&json!({ "expected_version": version + 1 }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let list: Value = server
        .get("/v1/uploads")
        .add_query_param("status", "cancelled")
        .await
        .json();
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn test_unknown_upload_returns_not_found() {
    let (server, _ctx) = create_test_server().await;
    let id = uuid::Uuid::new_v4();
    server
        .get(&format!("/v1/uploads/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_upload_by_task_id() {
    let (server, _ctx) = create_test_server().await;
    let created: Value = server
        .post("/v1/uploads")
        .json(&json!({
            "task_id": "invoice-2026-01",
            "original_name": "invoice.pdf",
            "file_size": 512,
            "mime_type": "application/pdf",
            "upload_type": "single",
            "uploader_id": "uploader-1"
        }))
        .await
        .json();

    let found: Value = server.get("/v1/uploads/by-task-id/invoice-2026-01").await.json();
    assert_eq!(found["id"], created["id"]);
    assert_eq!(found["task_id"], "invoice-2026-01");

    server
        .get("/v1/uploads/by-task-id/unknown")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

/// 测试工作流执行全流程
///
/// 激活、启动、逐个节点推进、完成，并检查统计回写。
#[tokio::test]
async fn test_workflow_execution_over_http() {
    let (server, _ctx) = create_test_server().await;
    let response = server.post("/v1/workflows").json(&workflow_payload()).await;
    response.assert_status(StatusCode::CREATED);
    let workflow: Value = response.json();
    let workflow_id = workflow["id"].as_str().unwrap().to_string();
    assert_eq!(workflow["status"], "draft");

    let execution_request = json!({
        "executor_id": "user-2",
        "trigger": { "type": "manual", "reason": "nightly" }
    });
    server
        .post(&format!("/v1/workflows/{workflow_id}/executions"))
        .json(&execution_request)
        .await
        .assert_status(StatusCode::CONFLICT);

    server
        .post(&format!("/v1/workflows/{workflow_id}/activate"))
        .json(&json!({ "expected_version": 1 }))
        .await
        .assert_status_ok();

    let response = server
        .post(&format!("/v1/workflows/{workflow_id}/executions"))
        .json(&execution_request)
        .await;
    response.assert_status(StatusCode::CREATED);
    let execution: Value = response.json();
    let id = execution["id"].as_str().unwrap().to_string();
    assert_eq!(execution["status"], "running");
    let mut version = execution["version"].as_i64().unwrap();

    server
        .post(&format!("/v1/executions/{id}/nodes/missing/enter"))
        .json(&json!({ "expected_version": version }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    for node in ["start", "build", "end"] {
        let entered: Value = server
            .post(&format!("/v1/executions/{id}/nodes/{node}/enter"))
            .json(&json!({ "expected_version": version }))
            .await
            .json();
        assert_eq!(entered["current_node_id"], node);
        let done: Value = server
            .post(&format!("/v1/executions/{id}/nodes/{node}/complete"))
            .json(&json!({ "expected_version": entered["version"], "output": { "node": node } }))
            .await
            .json();
        version = done["version"].as_i64().unwrap();
    }

    let finished: Value = server
        .post(&format!("/v1/executions/{id}/complete"))
        .json(&json!({ "expected_version": version, "output": { "artifact": "build.tar" } }))
        .await
        .json();
    assert_eq!(finished["status"], "completed");
    assert_eq!(finished["node_history"].as_array().unwrap().len(), 3);

    let summary: Value = server.get(&format!("/v1/executions/{id}/summary")).await.json();
    assert_eq!(summary["status"], "completed");

    let workflow: Value = server.get(&format!("/v1/workflows/{workflow_id}")).await.json();
    let counts = &workflow["statistics"]["executions"];
    assert_eq!(counts["total"], 1);
    assert_eq!(counts["successful"], 1);
    assert_eq!(counts["running"], 0);

    let executions: Value = server
        .get(&format!("/v1/workflows/{workflow_id}/executions"))
        .await
        .json();
    assert_eq!(executions["total"], 1);
}
