//! 总线配置（BusConfig）与运行时局部更新（BusOptions）
//!
use crate::error::{BusError, BusResult};
use bon::Builder;
use std::time::Duration;
use tokio::sync::Semaphore;

/// 事件总线配置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusConfig {
    /// 全局同时执行的处理器上限
    pub max_concurrent_handlers: usize,
    /// 是否对内容相同的事件去重
    pub dedup_enabled: bool,
    /// 去重滑动窗口
    pub dedup_window: Duration,
    /// 历史缓冲区容量
    pub max_history: usize,
    /// 每接受多少条事件清理一次去重缓存
    pub prune_every: u64,
    /// 单个处理器的超时时间，`None` 表示不限
    pub handler_timeout: Option<Duration>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_concurrent_handlers: 100,
            dedup_enabled: false,
            dedup_window: Duration::from_secs(1),
            max_history: 1000,
            prune_every: 1000,
            handler_timeout: None,
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> BusResult<()> {
        if self.max_concurrent_handlers == 0 {
            return Err(BusError::invalid_config(
                "max_concurrent_handlers",
                "must be greater than zero",
            ));
        }
        if self.max_concurrent_handlers > Semaphore::MAX_PERMITS {
            return Err(BusError::invalid_config(
                "max_concurrent_handlers",
                format!("must not exceed {}", Semaphore::MAX_PERMITS),
            ));
        }
        if self.dedup_window.is_zero() {
            return Err(BusError::zero_duration("dedup_window", self.dedup_window));
        }
        if self.max_history == 0 {
            return Err(BusError::invalid_config(
                "max_history",
                "must be greater than zero",
            ));
        }
        if self.prune_every == 0 {
            return Err(BusError::invalid_config(
                "prune_every",
                "must be greater than zero",
            ));
        }
        if let Some(timeout) = self.handler_timeout {
            if timeout.is_zero() {
                return Err(BusError::zero_duration("handler_timeout", timeout));
            }
        }
        Ok(())
    }

    /// 在当前配置上叠加 `options`，未指定的字段保持原值
    pub fn merged(&self, options: &BusOptions) -> BusConfig {
        BusConfig {
            max_concurrent_handlers: options
                .max_concurrent_handlers
                .unwrap_or(self.max_concurrent_handlers),
            dedup_enabled: options.dedup_enabled.unwrap_or(self.dedup_enabled),
            dedup_window: options.dedup_window.unwrap_or(self.dedup_window),
            max_history: options.max_history.unwrap_or(self.max_history),
            prune_every: options.prune_every.unwrap_or(self.prune_every),
            handler_timeout: match options.handler_timeout {
                None => self.handler_timeout,
                Some(HandlerTimeout::Disabled) => None,
                Some(HandlerTimeout::After(d)) => Some(d),
            },
        }
    }
}

/// 处理器超时设置
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerTimeout {
    Disabled,
    After(Duration),
}

/// `EventBus::configure` 的参数，只覆盖设置过的字段
///
/// ```
/// use gathering_events::eventing::{BusConfig, BusOptions};
/// use std::time::Duration;
///
/// let options = BusOptions::builder()
///     .dedup_enabled(true)
///     .dedup_window(Duration::from_millis(500))
///     .build();
///
/// let next = BusConfig::default().merged(&options);
/// assert!(next.dedup_enabled);
/// assert_eq!(next.max_concurrent_handlers, 100);
/// ```
#[derive(Builder, Default, Debug, Clone, PartialEq, Eq)]
pub struct BusOptions {
    max_concurrent_handlers: Option<usize>,
    dedup_enabled: Option<bool>,
    dedup_window: Option<Duration>,
    max_history: Option<usize>,
    prune_every: Option<u64>,
    handler_timeout: Option<HandlerTimeout>,
}
