//! 分发调度（Dispatcher）
//!
//! 对一个已接受的事件，在发布方任务上并发驱动所有匹配处理器：
//! - 每次调用先从全局信号量取一个许可，完成后（无论成败）随 guard 释放；
//! - 处理器按注册顺序启动，信号量公平排队，完成顺序不受约束；
//! - 错误、panic 与超时都在调用点被捕获，记为该处理器的失败，不影响兄弟处理器。
//!
use super::registry::{Subscription, SubscriptionId};
use crate::event::Event;
use futures_util::FutureExt;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::warn;
use uuid::Uuid;

/// 失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 处理器返回 `Err`
    Error,
    /// 处理器 panic
    Panic,
    /// 超过 `handler_timeout`
    Timeout,
}

/// 单个处理器的一次失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerFailure {
    pub subscription_id: SubscriptionId,
    pub handler: String,
    pub event_id: Uuid,
    pub event_type: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// 一次发布的分发结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub event_id: Uuid,
    /// 实际调用的处理器数量
    pub invoked: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    pub(crate) fn empty(event_id: Uuid) -> Self {
        Self {
            event_id,
            invoked: 0,
            failures: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.invoked - self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 扇出并等待全部处理器结束
pub(crate) async fn dispatch(
    event: &Event,
    targets: &[Arc<Subscription>],
    permits: &Semaphore,
    timeout: Option<Duration>,
) -> DispatchReport {
    if targets.is_empty() {
        return DispatchReport::empty(event.id());
    }

    let results = join_all(
        targets
            .iter()
            .map(|sub| invoke(sub, event, permits, timeout)),
    )
    .await;

    DispatchReport {
        event_id: event.id(),
        invoked: targets.len(),
        failures: results.into_iter().filter_map(Result::err).collect(),
    }
}

async fn invoke(
    sub: &Subscription,
    event: &Event,
    permits: &Semaphore,
    timeout: Option<Duration>,
) -> Result<(), HandlerFailure> {
    let fail = |kind: FailureKind, reason: String| {
        warn!(
            subscription = %sub.id(),
            handler = sub.handler().handler_name(),
            event_type = event.event_type(),
            event_id = %event.id(),
            kind = ?kind,
            reason = %reason,
            "Event handler failed"
        );
        HandlerFailure {
            subscription_id: sub.id(),
            handler: sub.handler().handler_name().to_string(),
            event_id: event.id(),
            event_type: event.event_type().to_string(),
            kind,
            reason,
        }
    };

    // 信号量从不关闭，acquire 失败只在极端情况下出现，按错误记录
    let _permit = permits
        .acquire()
        .await
        .map_err(|e| fail(FailureKind::Error, e.to_string()))?;

    let call = AssertUnwindSafe(sub.handler().handle(event)).catch_unwind();
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(fail(
                    FailureKind::Timeout,
                    format!("handler timed out after {limit:?}"),
                ));
            }
        },
        None => call.await,
    };

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(fail(FailureKind::Error, format!("{err:#}"))),
        Err(payload) => Err(fail(FailureKind::Panic, panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
