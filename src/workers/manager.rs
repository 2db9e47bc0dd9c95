// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::Worker;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// 工作管理器
///
/// 以固定间隔调度各个后台工作器，并在关闭时统一停止
pub struct WorkerManager {
    interval: Duration,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerManager {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            handles: Vec::new(),
        }
    }

    /// 启动工作器
    ///
    /// 每个工作器在独立任务中循环运行，单轮失败只记录日志，下一轮照常执行
    pub fn spawn(&mut self, worker: Arc<dyn Worker>) {
        let period = self.interval;
        let handle = tokio::spawn(async move {
            info!(worker = worker.name(), interval_secs = period.as_secs(), "Worker started");
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                run_once(worker.as_ref()).await;
            }
        });
        self.handles.push(handle);
    }

    /// 已启动的工作器数量
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 停止所有工作器
    pub fn shutdown(&mut self) {
        info!("Shutting down workers...");
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        info!("Workers shut down successfully");
    }

    /// 等待关闭信号并关闭工作进程
    pub async fn wait_for_shutdown(&mut self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
        self.shutdown();
    }
}

/// 执行一轮并记录结果
pub async fn run_once(worker: &dyn Worker) {
    match worker.run().await {
        Ok(count) => {
            counter!("retry_worker_runs_total", "worker" => worker.name().to_string(), "outcome" => "ok")
                .increment(1);
            if count > 0 {
                info!(worker = worker.name(), count, "Worker run finished");
            } else {
                debug!(worker = worker.name(), "Worker run found nothing to do");
            }
        }
        Err(e) => {
            counter!("retry_worker_runs_total", "worker" => worker.name().to_string(), "outcome" => "error")
                .increment(1);
            error!(worker = worker.name(), error = %e, "Worker run failed");
        }
    }
}
