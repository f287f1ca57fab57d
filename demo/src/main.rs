use anyhow::Result as AnyResult;
use gathering_events::event::{Event, EventKind};
use gathering_events::eventing::{BusOptions, EventBus, HandledEventType, handler_fn};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PRODUCERS: u64 = 4;
const TICK: Duration = Duration::from_millis(5);
const RUN_FOR: Duration = Duration::from_secs(3);

/// 一个 agent 持续产出任务事件，直到收到取消信号
async fn produce(bus: Arc<EventBus>, agent_id: u64, token: CancellationToken) -> AnyResult<u64> {
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut task_id = 0u64;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                task_id += 1;
                let kind = match task_id % 10 {
                    0 => EventKind::TaskFailed,
                    n if n % 2 == 0 => EventKind::TaskCompleted,
                    _ => EventKind::TaskCreated,
                };
                let event = Event::builder()
                    .event_type(kind)
                    .source_agent_id(agent_id as i64)
                    .circle_id((agent_id % 2) as i64)
                    // 每个任务 id 取两次，第二次落在去重窗口内
                    .data(json!({ "task_id": task_id / 2 }))
                    .build();
                bus.publish(event).await?;
            }
        }
    }
    Ok(task_id)
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let bus = Arc::new(EventBus::new());
    bus.configure(
        BusOptions::builder()
            .max_concurrent_handlers(16)
            .dedup_enabled(true)
            .dedup_window(Duration::from_millis(200))
            .max_history(500)
            .build(),
    )?;

    let processed = Arc::new(AtomicU64::new(0));
    {
        let processed = processed.clone();
        bus.subscribe(
            HandledEventType::many([EventKind::TaskCreated, EventKind::TaskCompleted]),
            handler_fn("worker", move |_| {
                let processed = processed.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    processed.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
            }),
        );
    }
    bus.subscribe(
        EventKind::TaskFailed,
        handler_fn("alerting", |event| async move {
            anyhow::bail!("alert sink rejected {}", event.id())
        }),
    );

    let token = CancellationToken::new();
    let started = Instant::now();
    let producers: Vec<_> = (1..=PRODUCERS)
        .map(|agent_id| tokio::spawn(produce(bus.clone(), agent_id, token.child_token())))
        .collect();

    tokio::time::sleep(RUN_FOR).await;
    token.cancel();

    let mut attempted = 0;
    for producer in producers {
        match producer.await? {
            Ok(n) => attempted += n,
            Err(e) => warn!(error = %e, "Producer stopped with error"),
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    let stats = bus.stats();
    info!(
        attempted,
        rate = %format!("{:.0}/s", attempted as f64 / elapsed),
        processed = processed.load(Ordering::Relaxed),
        "Load run finished"
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
