//! 事件总线（EventBus）
//!
//! 进程内发布/订阅门面，组合订阅注册表、去重引擎、历史缓冲区与分发调度：
//! - `publish`：校验、去重、记录历史、并发分发，等待所有处理器结束后返回；
//! - `subscribe` / `subscribe_filtered` / `unsubscribe`：管理订阅；
//! - `configure` / `reset` / `stats`：运行时调整与观测；
//! - `failures`：处理器失败的隔离通道，以 `'static` 事件流形式消费。
//!
//! 共享状态集中在一把同步锁内，锁从不跨越 `.await`；发布顺序由异步入口闸门保证，
//! 同一总线的处理器内部再次发布时绕过闸门直接内联分发，发往其他总线的事件仍按其闸门排队。
//!
use super::config::{BusConfig, BusOptions};
use super::content_hash::DedupKey;
use super::dedup::{Admission, DedupEngine};
use super::dispatcher::{DispatchReport, HandlerFailure, dispatch};
use super::handler::{EventHandler, HandledEventType};
use super::history::{HistoryBuffer, HistoryQuery};
use super::registry::{EventPredicate, SubscriptionId, SubscriptionRegistry};
use super::stats::{BusStats, Counters};
use crate::error::{BusError, BusResult};
use crate::event::Event;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tokio::sync::{Semaphore, broadcast};
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info};
use uuid::Uuid;

const FAILURE_CHANNEL_CAPACITY: usize = 256;

static NEXT_BUS_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    // 当前任务正在分发的总线 id，嵌套发布时逐层追加
    static IN_DISPATCH: Vec<u64>;
}

/// 一次发布的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// 已分发给所有匹配的处理器
    Dispatched(DispatchReport),
    /// 去重窗口内的重复事件，未分发也未记录历史
    Suppressed { event_id: Uuid },
}

impl PublishOutcome {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, PublishOutcome::Suppressed { .. })
    }

    pub fn report(&self) -> Option<&DispatchReport> {
        match self {
            PublishOutcome::Dispatched(report) => Some(report),
            PublishOutcome::Suppressed { .. } => None,
        }
    }
}

struct BusInner {
    config: BusConfig,
    permits: Arc<Semaphore>,
    registry: SubscriptionRegistry,
    dedup: DedupEngine,
    history: HistoryBuffer,
    counters: Counters,
    // reset 时递增，旧的在途分发不再写入统计
    generation: u64,
}

impl BusInner {
    fn new(config: BusConfig) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.max_concurrent_handlers)),
            history: HistoryBuffer::new(config.max_history),
            registry: SubscriptionRegistry::default(),
            dedup: DedupEngine::default(),
            counters: Counters::default(),
            generation: 0,
            config,
        }
    }
}

/// 进程内事件总线
///
/// ```
/// use gathering_events::event::{Event, EventKind};
/// use gathering_events::eventing::{EventBus, handler_fn};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> anyhow::Result<()> {
/// let bus = EventBus::new();
/// bus.subscribe(
///     EventKind::TaskCompleted,
///     handler_fn("audit", |event| async move {
///         println!("completed: {}", event.data());
///         Ok(())
///     }),
/// );
///
/// let outcome = bus
///     .publish(Event::builder().event_type(EventKind::TaskCompleted).build())
///     .await?;
/// assert_eq!(outcome.report().map(|r| r.invoked), Some(1));
/// # Ok(())
/// # }
/// ```
pub struct EventBus {
    id: u64,
    inner: Mutex<BusInner>,
    gate: tokio::sync::Mutex<()>,
    failures_tx: broadcast::Sender<HandlerFailure>,
}

impl EventBus {
    /// 使用默认配置创建总线
    pub fn new() -> Self {
        Self::build(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> BusResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: BusConfig) -> Self {
        let (failures_tx, _rx) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            id: NEXT_BUS_ID.fetch_add(1, Ordering::Relaxed),
            inner: Mutex::new(BusInner::new(config)),
            gate: tokio::sync::Mutex::new(()),
            failures_tx,
        }
    }

    /// 进程级共享实例，首次访问时以默认配置创建
    pub fn global() -> &'static EventBus {
        static GLOBAL: OnceLock<EventBus> = OnceLock::new();
        GLOBAL.get_or_init(EventBus::new)
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        // 处理器从不在锁内执行，中毒时内部状态依然一致
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 发布事件，等待所有匹配处理器结束（或失败）后返回
    ///
    /// 处理器失败不会作为错误返回，而是记录在 `DispatchReport::failures` 中，
    /// 并同时发送到 `failures()` 流。
    pub async fn publish(&self, event: Event) -> BusResult<PublishOutcome> {
        event.validate()?;

        // 只有本总线的处理器内部再次发布才绕过闸门，转发到其他总线仍需排队
        let mut active = IN_DISPATCH.try_with(Clone::clone).unwrap_or_default();
        let reentrant = active.contains(&self.id);
        let _gate = if reentrant {
            None
        } else {
            Some(self.gate.lock().await)
        };

        let event = Arc::new(event);
        let (candidates, permits, timeout, generation) = {
            let mut inner = self.lock();

            if inner.config.dedup_enabled {
                let window = inner.config.dedup_window;
                let prune_every = inner.config.prune_every;
                let key = DedupKey::of(&event);
                if inner.dedup.admit(key, Instant::now(), window, prune_every)
                    == Admission::Duplicate
                {
                    inner.counters.events_deduplicated += 1;
                    debug!(
                        event_id = %event.id(),
                        event_type = event.event_type(),
                        ?key,
                        "Duplicate event suppressed"
                    );
                    return Ok(PublishOutcome::Suppressed {
                        event_id: event.id(),
                    });
                }
            }

            inner.history.push(event.clone());
            inner.counters.events_published += 1;
            (
                inner.registry.candidates(event.event_type()),
                inner.permits.clone(),
                inner.config.handler_timeout,
                inner.generation,
            )
        };

        let targets: Vec<_> = candidates
            .into_iter()
            .filter(|sub| sub.accepts(&event))
            .collect();

        debug!(
            event_id = %event.id(),
            event_type = event.event_type(),
            handlers = targets.len(),
            reentrant,
            "Dispatching event"
        );

        if !reentrant {
            active.push(self.id);
        }
        let report = IN_DISPATCH
            .scope(active, dispatch(&event, &targets, &permits, timeout))
            .await;

        for failure in &report.failures {
            // 无人订阅失败流时发送失败，忽略即可
            let _ = self.failures_tx.send(failure.clone());
        }

        {
            let mut inner = self.lock();
            if inner.generation == generation {
                inner.counters.record_dispatch(&report);
            }
        }

        Ok(PublishOutcome::Dispatched(report))
    }

    /// 订阅事件类型（单个、多个或全部）
    pub fn subscribe(
        &self,
        topic: impl Into<HandledEventType>,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        self.insert(topic.into(), handler, None)
    }

    /// 订阅并附加过滤器，过滤器返回 `false` 的事件不会送达该处理器
    pub fn subscribe_filtered<P>(
        &self,
        topic: impl Into<HandledEventType>,
        handler: Arc<dyn EventHandler>,
        filter: P,
    ) -> SubscriptionId
    where
        P: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        let filter: EventPredicate = Arc::new(filter);
        self.insert(topic.into(), handler, Some(filter))
    }

    fn insert(
        &self,
        topic: HandledEventType,
        handler: Arc<dyn EventHandler>,
        filter: Option<EventPredicate>,
    ) -> SubscriptionId {
        let name = handler.handler_name().to_string();
        let filtered = filter.is_some();
        let id = self.lock().registry.insert(topic.clone(), handler, filter);
        debug!(subscription = %id, handler = %name, ?topic, filtered, "Handler subscribed");
        id
    }

    /// 取消订阅；未知 id 返回 `false`，重复取消是无害的
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.lock().registry.remove(id);
        if removed {
            debug!(subscription = %id, "Handler unsubscribed");
        }
        removed
    }

    /// 运行时调整配置，只覆盖 `options` 中设置过的字段
    ///
    /// 校验失败时返回 `InvalidConfig`，原配置保持不变。并发上限变化只影响之后开始的
    /// 分发；关闭去重会清空去重缓存；缩小历史容量会立即淘汰最旧的记录。
    pub fn configure(&self, options: BusOptions) -> BusResult<()> {
        let mut inner = self.lock();
        let next = inner.config.merged(&options);
        next.validate()?;

        if next.max_concurrent_handlers != inner.config.max_concurrent_handlers {
            inner.permits = Arc::new(Semaphore::new(next.max_concurrent_handlers));
        }
        if next.max_history != inner.config.max_history {
            inner.history.set_capacity(next.max_history);
        }
        if !next.dedup_enabled {
            inner.dedup.clear();
        }

        info!(
            max_concurrent_handlers = next.max_concurrent_handlers,
            dedup_enabled = next.dedup_enabled,
            dedup_window = ?next.dedup_window,
            max_history = next.max_history,
            prune_every = next.prune_every,
            handler_timeout = ?next.handler_timeout,
            "Event bus reconfigured"
        );
        inner.config = next;
        Ok(())
    }

    /// 清空订阅、历史、去重缓存与统计，保留当前配置
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.registry.clear();
        inner.history.clear();
        inner.dedup.clear();
        inner.counters = Counters::default();
        inner.permits = Arc::new(Semaphore::new(inner.config.max_concurrent_handlers));
        info!(generation = inner.generation, "Event bus reset");
    }

    pub fn stats(&self) -> BusStats {
        let inner = self.lock();
        let c = inner.counters;
        BusStats {
            events_published: c.events_published,
            events_delivered: c.events_delivered,
            events_deduplicated: c.events_deduplicated,
            handler_invocations: c.handler_invocations,
            handler_errors: c.handler_errors,
            active_subscribers: inner.registry.len(),
            history_size: inner.history.len(),
            dedup_cache_size: inner.dedup.len(),
        }
    }

    /// 查询历史，最新在前
    pub fn history(&self, query: &HistoryQuery) -> Vec<Arc<Event>> {
        self.lock().history.query(query)
    }

    pub fn clear_history(&self) {
        self.lock().history.clear();
    }

    pub fn config(&self) -> BusConfig {
        self.lock().config.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().registry.len()
    }

    /// 处理器失败流，返回 'static 生命周期的流，便于在 tokio::spawn 中使用
    ///
    /// 只能收到订阅之后发生的失败；消费过慢时产出 `BusError::Lagged`。
    pub fn failures(&self) -> BoxStream<'static, BusResult<HandlerFailure>> {
        let rx = self.failures_tx.subscribe();
        let stream = BroadcastStream::new(rx).map(|r| {
            r.map_err(|e| match e {
                BroadcastStreamRecvError::Lagged(skipped) => BusError::Lagged { skipped },
            })
        });
        Box::pin(stream)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("EventBus")
            .field("id", &self.id)
            .field("config", &inner.config)
            .field("subscribers", &inner.registry.len())
            .field("history", &inner.history.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::eventing::handler_fn;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(hits: &Arc<AtomicUsize>) -> Arc<dyn EventHandler> {
        let hits = hits.clone();
        handler_fn("counter", move |_| {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn completed(n: u64) -> Event {
        Event::builder()
            .event_type(EventKind::TaskCompleted)
            .data(json!({ "n": n }))
            .build()
    }

    #[tokio::test]
    async fn rejects_blank_event_type_without_recording() {
        let bus = EventBus::new();
        let err = bus
            .publish(Event::builder().event_type("   ").build())
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::InvalidEvent { .. }));
        assert_eq!(bus.stats(), BusStats::default());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_recorded_but_not_delivered() {
        let bus = EventBus::new();
        let outcome = bus.publish(completed(1)).await.unwrap();

        assert_eq!(outcome.report().unwrap().invoked, 0);
        let stats = bus.stats();
        assert_eq!(stats.events_published, 1);
        assert_eq!(stats.events_delivered, 0);
        assert_eq!(stats.history_size, 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let id = bus.subscribe(EventKind::TaskCompleted, counting(&hits));

        bus.publish(completed(1)).await.unwrap();
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(completed(2)).await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn invalid_configure_keeps_previous_config() {
        let bus = EventBus::new();
        let err = bus
            .configure(BusOptions::builder().max_concurrent_handlers(0).build())
            .unwrap_err();
        assert!(matches!(
            err,
            BusError::InvalidConfig {
                field: "max_concurrent_handlers",
                ..
            }
        ));
        assert_eq!(bus.config(), BusConfig::default());
    }

    #[tokio::test]
    async fn with_config_validates() {
        let bad = BusConfig {
            max_history: 0,
            ..BusConfig::default()
        };
        assert!(EventBus::with_config(bad).is_err());
    }

    #[tokio::test]
    async fn disabling_dedup_clears_cache() {
        let bus = EventBus::new();
        bus.configure(BusOptions::builder().dedup_enabled(true).build())
            .unwrap();
        bus.publish(completed(1)).await.unwrap();
        bus.publish(completed(2)).await.unwrap();
        assert_eq!(bus.stats().dedup_cache_size, 2);

        bus.configure(BusOptions::builder().dedup_enabled(false).build())
            .unwrap();
        assert_eq!(bus.stats().dedup_cache_size, 0);
    }

    #[tokio::test]
    async fn shrinking_history_evicts_immediately() {
        let bus = EventBus::new();
        for n in 0..10 {
            bus.publish(completed(n)).await.unwrap();
        }
        bus.configure(BusOptions::builder().max_history(3).build())
            .unwrap();

        let recent = bus.history(&HistoryQuery::default());
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].data()["n"], 9);
    }

    #[tokio::test]
    async fn reset_keeps_config_and_clears_state() {
        let bus = EventBus::new();
        bus.configure(BusOptions::builder().max_history(5).build())
            .unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe(HandledEventType::All, counting(&hits));
        bus.publish(completed(1)).await.unwrap();

        bus.reset();

        assert_eq!(bus.stats(), BusStats::default());
        assert_eq!(bus.config().max_history, 5);
        bus.publish(completed(2)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn global_is_shared() {
        assert!(std::ptr::eq(EventBus::global(), EventBus::global()));
    }
}
