/// 事件总线示例
/// 展示 agent 任务流转：订阅、按 circle 过滤、去重、失败隔离与统计
use anyhow::Result as AnyResult;
use futures_util::StreamExt;
use gathering_events::event::{Event, EventFilter, EventKind};
use gathering_events::eventing::{
    BusOptions, EventBus, EventHandler, HandledEventType, HistoryQuery, handler_fn,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// 处理器
// ============================================================================

/// 打印 agent 生命周期
struct LifecycleLogger;

#[async_trait::async_trait]
impl EventHandler for LifecycleLogger {
    fn handler_name(&self) -> &str {
        "lifecycle-logger"
    }

    async fn handle(&self, event: &Event) -> AnyResult<()> {
        println!(
            "[lifecycle] {} agent={:?}",
            event.event_type(),
            event.source_agent_id()
        );
        Ok(())
    }
}

/// 任务协调：只关心 circle 1 的任务
fn circle_coordinator() -> Arc<dyn EventHandler> {
    handler_fn("circle-1-coordinator", |event| async move {
        // 模拟一次异步调度
        tokio::time::sleep(Duration::from_millis(20)).await;
        println!(
            "[circle-1] {} task={}",
            event.event_type(),
            event.data()["task_id"]
        );
        Ok(())
    })
}

/// 通知服务暂时不可用
fn flaky_notifier() -> Arc<dyn EventHandler> {
    handler_fn("notifier", |event| async move {
        anyhow::bail!("notification backend unavailable for {}", event.id())
    })
}

fn task_event(kind: EventKind, task_id: u64, circle_id: i64) -> Event {
    Event::builder()
        .event_type(kind)
        .source_agent_id(7)
        .circle_id(circle_id)
        .data(json!({ "task_id": task_id }))
        .build()
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    let bus = EventBus::new();
    bus.configure(
        BusOptions::builder()
            .max_concurrent_handlers(8)
            .dedup_enabled(true)
            .dedup_window(Duration::from_millis(500))
            .build(),
    )?;

    // 失败流在后台消费
    let mut failures = bus.failures();
    let failure_printer = tokio::spawn(async move {
        while let Some(item) = failures.next().await {
            match item {
                Ok(f) => println!("[failure] {} on {}: {}", f.handler, f.event_type, f.reason),
                Err(e) => println!("[failure] {e}"),
            }
        }
    });

    bus.subscribe(
        HandledEventType::many([EventKind::AgentStarted, EventKind::AgentStopped]),
        Arc::new(LifecycleLogger),
    );
    let circle1 = EventFilter::builder().circle_id(1).build();
    bus.subscribe_filtered(
        HandledEventType::many([EventKind::TaskCreated, EventKind::TaskCompleted]),
        circle_coordinator(),
        move |event| event.matches(&circle1),
    );
    bus.subscribe(EventKind::TaskFailed, flaky_notifier());

    bus.publish(
        Event::builder()
            .event_type(EventKind::AgentStarted)
            .source_agent_id(7)
            .build(),
    )
    .await?;

    for task_id in 1..=3 {
        let circle_id = if task_id == 2 { 2 } else { 1 };
        bus.publish(task_event(EventKind::TaskCreated, task_id, circle_id))
            .await?;
        bus.publish(task_event(EventKind::TaskCompleted, task_id, circle_id))
            .await?;
    }

    // 重复的完成事件在窗口内被抑制
    let outcome = bus
        .publish(task_event(EventKind::TaskCompleted, 3, 1))
        .await?;
    println!("duplicate suppressed: {}", outcome.is_suppressed());

    let outcome = bus.publish(task_event(EventKind::TaskFailed, 4, 1)).await?;
    if let Some(report) = outcome.report() {
        println!(
            "task.failed: invoked={}, failed={}",
            report.invoked,
            report.failures.len()
        );
    }

    bus.publish(
        Event::builder()
            .event_type(EventKind::AgentStopped)
            .source_agent_id(7)
            .build(),
    )
    .await?;

    let recent = bus.history(
        &HistoryQuery::builder()
            .event_type(EventKind::TaskCompleted)
            .limit(5)
            .build(),
    );
    println!("recent completions: {}", recent.len());
    println!("{}", serde_json::to_string_pretty(&bus.stats())?);

    tokio::time::sleep(Duration::from_millis(50)).await;
    failure_printer.abort();
    Ok(())
}
