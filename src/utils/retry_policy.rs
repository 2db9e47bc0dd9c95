// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::settings::RetrySettings;
use crate::domain::models::lifecycle::string_enum;

string_enum! {
    /// 退避策略
    pub enum RetryStrategy {
        /// 固定间隔
        Fixed => "fixed",
        /// 线性增长：base × attempt
        Linear => "linear",
        /// 指数增长：base × multiplier^(attempt-1)
        Exponential => "exponential",
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::Exponential
    }
}

/// 重试策略配置
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 退避策略
    pub strategy: RetryStrategy,
    /// 最大重试次数
    pub max_retries: u32,
    /// 初始退避时间
    pub base_delay: Duration,
    /// 最大退避时间
    pub max_delay: Duration,
    /// 退避乘数
    pub multiplier: f64,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 是否启用抖动
    pub enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::Exponential,
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_factor: 0.1,
            enable_jitter: true,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            strategy: settings.strategy,
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            multiplier: settings.multiplier,
            jitter_factor: settings.jitter_factor.clamp(0.0, 1.0),
            enable_jitter: settings.enable_jitter,
        }
    }
}

impl RetryPolicy {
    /// 创建标准重试策略
    pub fn standard() -> Self {
        Self::default()
    }

    /// 以工作流自带的重试设置覆盖策略、次数和初始间隔
    pub fn with_overrides(
        &self,
        strategy: RetryStrategy,
        max_retries: u32,
        base_delay: Duration,
    ) -> Self {
        Self {
            strategy,
            max_retries,
            base_delay,
            ..self.clone()
        }
    }

    /// 计算第 `attempt` 次重试前的退避时间（从 1 开始计数）
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let base = self.base_delay.as_secs_f64();

        let raw = match self.strategy {
            RetryStrategy::Fixed => base,
            RetryStrategy::Linear => base * f64::from(attempt),
            RetryStrategy::Exponential => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                base * self.multiplier.powi(exponent)
            }
        };

        // 限制最大退避时间
        let capped = if raw.is_finite() {
            raw.min(self.max_delay.as_secs_f64())
        } else {
            self.max_delay.as_secs_f64()
        };

        let jitter_range = capped * self.jitter_factor;
        let final_backoff = if self.enable_jitter && jitter_range > 0.0 {
            let jitter = rand::random_range(-jitter_range..jitter_range);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(final_backoff)
    }

    /// 计算下次重试时间
    pub fn next_retry_time(&self, attempt: u32, base_time: DateTime<Utc>) -> DateTime<Utc> {
        let backoff = self.calculate_backoff(attempt);
        base_time + chrono::Duration::milliseconds(backoff.as_millis() as i64)
    }

    /// 是否应该重试
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(strategy: RetryStrategy) -> RetryPolicy {
        RetryPolicy {
            strategy,
            enable_jitter: false,
            ..RetryPolicy::standard()
        }
    }

    #[test]
    fn test_calculate_backoff_exponential() {
        let policy = exact(RetryStrategy::Exponential);

        assert_eq!(policy.calculate_backoff(1), Duration::from_secs(1));
        assert_eq!(policy.calculate_backoff(2), Duration::from_secs(2));
        assert_eq!(policy.calculate_backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_calculate_backoff_fixed_and_linear() {
        let fixed = exact(RetryStrategy::Fixed);
        assert_eq!(fixed.calculate_backoff(1), Duration::from_secs(1));
        assert_eq!(fixed.calculate_backoff(5), Duration::from_secs(1));

        let linear = exact(RetryStrategy::Linear);
        assert_eq!(linear.calculate_backoff(1), Duration::from_secs(1));
        assert_eq!(linear.calculate_backoff(3), Duration::from_secs(3));
    }

    #[test]
    fn test_attempt_zero_is_treated_as_first() {
        let policy = exact(RetryStrategy::Exponential);
        assert_eq!(policy.calculate_backoff(0), Duration::from_secs(1));
    }

    #[test]
    fn test_calculate_backoff_with_jitter() {
        let mut policy = RetryPolicy::standard();
        policy.enable_jitter = true;
        policy.jitter_factor = 0.1;

        for _ in 0..50 {
            let backoff = policy.calculate_backoff(2);
            // 应该接近 2 秒，但有 ±10% 的抖动
            assert!(backoff >= Duration::from_millis(1800));
            assert!(backoff <= Duration::from_millis(2200));
        }
    }

    #[test]
    fn test_zero_jitter_factor_is_exact() {
        let mut policy = RetryPolicy::standard();
        policy.jitter_factor = 0.0;
        assert_eq!(policy.calculate_backoff(2), Duration::from_secs(2));
    }

    #[test]
    fn test_calculate_backoff_max_limit() {
        let mut policy = exact(RetryStrategy::Exponential);
        policy.max_delay = Duration::from_secs(5);
        assert_eq!(policy.calculate_backoff(10), Duration::from_secs(5));
        assert_eq!(policy.calculate_backoff(u32::MAX), Duration::from_secs(5));

        let mut linear = exact(RetryStrategy::Linear);
        linear.max_delay = Duration::from_secs(5);
        assert_eq!(linear.calculate_backoff(100), Duration::from_secs(5));
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::standard();

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3)); // max_retries = 3
    }

    #[test]
    fn test_next_retry_time() {
        use chrono::TimeZone;

        let policy = exact(RetryStrategy::Exponential);
        let base_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        let next_retry = policy.next_retry_time(2, base_time);
        assert_eq!(next_retry, base_time + chrono::Duration::seconds(2));
    }

    #[test]
    fn test_overrides_keep_cap_and_jitter() {
        let base = RetryPolicy::standard();
        let policy = base.with_overrides(RetryStrategy::Fixed, 5, Duration::from_secs(30));
        assert_eq!(policy.strategy, RetryStrategy::Fixed);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.max_delay, base.max_delay);
        assert_eq!(policy.enable_jitter, base.enable_jitter);
    }
}
