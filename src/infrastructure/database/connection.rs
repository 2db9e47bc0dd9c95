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

use crate::config::settings::DatabaseSettings;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use std::time::Duration;
use tracing::info;

/// 连接的最长存活时间
const MAX_LIFETIME: Duration = Duration::from_secs(3600);

/// 是否为 SQLite 内存库
///
/// 内存库只存在于打开它的那个连接中，连接关闭后表结构和数据一起消失。
pub fn is_in_memory_sqlite(url: &str) -> bool {
    url.starts_with("sqlite::memory:")
        || (url.starts_with("sqlite:") && url.contains("mode=memory"))
}

/// 根据配置构建连接选项
///
/// SQLite 内存库固定为单个常驻连接，忽略连接数和空闲超时配置。
pub fn connect_options(settings: &DatabaseSettings) -> ConnectOptions {
    let mut opt = ConnectOptions::new(settings.url.to_owned());

    if let Some(timeout) = settings.connect_timeout {
        opt.connect_timeout(Duration::from_secs(timeout));
        opt.acquire_timeout(Duration::from_secs(timeout));
    }

    if is_in_memory_sqlite(&settings.url) {
        opt.max_connections(1).min_connections(1);
    } else {
        if let Some(max) = settings.max_connections {
            opt.max_connections(max);
        }
        if let Some(min) = settings.min_connections {
            opt.min_connections(min);
        }
        if let Some(idle) = settings.idle_timeout {
            opt.idle_timeout(Duration::from_secs(idle));
        }
        opt.max_lifetime(MAX_LIFETIME);
    }

    opt.sqlx_logging(true);
    opt
}

/// 创建数据库连接池
///
/// # 参数
///
/// * `settings` - 数据库配置
///
/// # 返回值
///
/// * `Ok(DatabaseConnection)` - 数据库连接
/// * `Err(DbErr)` - 连接过程中出现的错误
pub async fn create_pool(settings: &DatabaseSettings) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(connect_options(settings)).await?;
    info!(backend = ?db.get_database_backend(), "Database connected");
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> DatabaseSettings {
        DatabaseSettings {
            url: url.to_string(),
            max_connections: Some(10),
            min_connections: Some(2),
            connect_timeout: Some(5),
            idle_timeout: Some(300),
        }
    }

    #[test]
    fn test_detects_in_memory_sqlite() {
        assert!(is_in_memory_sqlite("sqlite::memory:"));
        assert!(is_in_memory_sqlite("sqlite:file:ledger?mode=memory&cache=shared"));
        assert!(!is_in_memory_sqlite("sqlite://data/runledger.db?mode=rwc"));
        assert!(!is_in_memory_sqlite("postgres://localhost/runledger"));
    }

    #[test]
    fn test_in_memory_pool_is_pinned_to_one_connection() {
        let opt = connect_options(&settings("sqlite::memory:"));
        assert_eq!(opt.get_max_connections(), Some(1));
        assert_eq!(opt.get_min_connections(), Some(1));
        assert_eq!(opt.get_connect_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_server_pool_uses_settings() {
        let opt = connect_options(&settings("postgres://localhost/runledger"));
        assert_eq!(opt.get_max_connections(), Some(10));
        assert_eq!(opt.get_min_connections(), Some(2));
    }
}
