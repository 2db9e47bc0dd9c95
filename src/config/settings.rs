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

use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;

use crate::utils::retry_policy::RetryStrategy;

/// 环境变量前缀，例如 `RUNLEDGER__SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "RUNLEDGER";

/// 应用程序配置设置
///
/// 包含数据库、服务器、重试策略、后台任务和指标导出等配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 服务器配置
    pub server: ServerSettings,
    /// 重试退避配置
    pub retry: RetrySettings,
    /// 后台任务配置
    pub workers: WorkerSettings,
    /// 指标导出配置
    pub metrics: MetricsSettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 重试退避配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// 退避策略 (fixed, linear, exponential)
    pub strategy: RetryStrategy,
    /// 上传任务的默认最大重试次数
    pub max_retries: u32,
    /// 初始退避时间（毫秒）
    pub base_delay_ms: u64,
    /// 最大退避时间（毫秒）
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    pub enable_jitter: bool,
}

/// 后台任务配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    /// 是否启动重试 Worker
    pub enabled: bool,
    /// 扫描间隔（秒）
    pub retry_interval_secs: u64,
    /// 每轮最多重新打开的记录数
    pub batch_size: u64,
}

/// 指标导出配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    pub enabled: bool,
    /// Prometheus 监听地址
    pub listen_addr: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加代码内默认值、`config/default.toml`、
    /// `config/{APP_ENVIRONMENT}.toml` 和 `RUNLEDGER__*` 环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("database.url", "sqlite://runledger.db?mode=rwc")?
            // Default DB pool settings
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 2)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            // Default retry settings
            .set_default("retry.strategy", "exponential")?
            .set_default("retry.max_retries", 3)?
            .set_default("retry.base_delay_ms", 1000)?
            .set_default("retry.max_delay_ms", 60_000)?
            .set_default("retry.multiplier", 2.0)?
            .set_default("retry.jitter_factor", 0.1)?
            .set_default("retry.enable_jitter", true)?
            .set_default("workers.enabled", true)?
            .set_default("workers.retry_interval_secs", 30)?
            .set_default("workers.batch_size", 50)?
            .set_default("metrics.enabled", true)?
            .set_default("metrics.listen_addr", "0.0.0.0:9000")
    }
}
