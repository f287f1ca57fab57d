//! 事件总线统一错误定义
//!
//! 覆盖事件校验、配置校验与失败流三类场景；处理器自身的失败不会以错误形式
//! 返回给发布方，而是记录在 `DispatchReport` 中。
//!
use std::time::Duration;
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    // --- 事件 ---
    #[error("invalid event: {reason}")]
    InvalidEvent { reason: String },
    #[error("unknown event kind: {kind}")]
    UnknownEventKind { kind: String },

    // --- 配置 ---
    #[error("invalid config: field={field}, reason={reason}")]
    InvalidConfig { field: &'static str, reason: String },

    // --- 失败流 ---
    #[error("failure stream lagged: skipped={skipped}")]
    Lagged { skipped: u64 },
}

impl BusError {
    pub(crate) fn invalid_event(reason: impl Into<String>) -> Self {
        BusError::InvalidEvent {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        BusError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn zero_duration(field: &'static str, value: Duration) -> Self {
        Self::invalid_config(field, format!("must be greater than zero, got {value:?}"))
    }
}

/// 统一 Result 类型别名
pub type BusResult<T> = Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_structured_fields() {
        let err = BusError::invalid_config("max_history", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "invalid config: field=max_history, reason=must be greater than zero"
        );

        let err = BusError::zero_duration("dedup_window", Duration::ZERO);
        assert!(err.to_string().contains("dedup_window"));
        assert!(err.to_string().contains("0ns"));
    }
}
