//! 事件处理器（EventHandler）
//!
//! 定义消费事件的处理逻辑与元信息（名称、订阅类型），以及把异步闭包适配为处理器的
//! `handler_fn`。
//!
use crate::event::{Event, EventKind};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// 订阅的事件类型：单个、多个或全部
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandledEventType {
    One(String),
    Many(Vec<String>),
    All,
}

impl HandledEventType {
    pub fn many<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HandledEventType::Many(types.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for HandledEventType {
    fn from(value: &str) -> Self {
        HandledEventType::One(value.to_string())
    }
}

impl From<String> for HandledEventType {
    fn from(value: String) -> Self {
        HandledEventType::One(value)
    }
}

impl From<EventKind> for HandledEventType {
    fn from(value: EventKind) -> Self {
        HandledEventType::One(value.as_str().to_string())
    }
}

/// 事件处理器：处理匹配类型的事件
///
/// 返回 `Err` 或 panic 都只记为该处理器的一次失败，不影响同一事件的其他处理器，
/// 也不会传回发布方。
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（用于失败记录与日志）
    fn handler_name(&self) -> &str;
    /// 处理事件
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

/// 以异步闭包实现的处理器，见 [`handler_fn`]
pub struct FnHandler<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    fn handler_name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        (self.f)(event.clone()).await
    }
}

/// 将异步闭包包装为 `Arc<dyn EventHandler>`
///
/// ```
/// use gathering_events::eventing::handler_fn;
///
/// let handler = handler_fn("audit", |event| async move {
///     println!("{} happened", event.event_type());
///     Ok(())
/// });
/// assert_eq!(handler.handler_name(), "audit");
/// ```
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}
