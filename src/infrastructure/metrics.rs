// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::MetricsSettings;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 初始化指标系统
///
/// 启动 Prometheus 导出器并注册指标说明。地址无效或端口被占用时只记录警告，
/// 服务本身照常启动。
pub fn init_metrics(settings: &MetricsSettings) {
    if !settings.enabled {
        info!("Metrics exporter disabled");
        return;
    }

    let addr: SocketAddr = match settings.listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(addr = %settings.listen_addr, error = %e, "Invalid metrics address");
            return;
        }
    };

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

fn describe_metrics() {
    describe_counter!("upload_tasks_created_total", "Total number of upload tasks created");
    describe_counter!(
        "upload_task_transitions_total",
        "Upload task lifecycle transitions, labelled by event"
    );
    describe_counter!("upload_chunks_completed_total", "Total number of chunks completed");
    describe_counter!("upload_chunks_failed_total", "Total number of chunk failures");
    describe_histogram!(
        "upload_task_duration_seconds",
        "Duration of completed upload tasks in seconds"
    );
    describe_counter!("workflows_created_total", "Total number of workflows created");
    describe_counter!(
        "workflow_executions_started_total",
        "Workflow executions started, labelled by trigger type"
    );
    describe_counter!(
        "workflow_execution_transitions_total",
        "Workflow execution lifecycle transitions, labelled by event"
    );
    describe_counter!(
        "workflow_executions_finished_total",
        "Workflow executions reaching a terminal state, labelled by status"
    );
    describe_histogram!(
        "workflow_execution_duration_seconds",
        "Duration of finished workflow executions in seconds"
    );
    describe_counter!("retry_worker_runs_total", "Retry worker sweeps, labelled by outcome");
}
