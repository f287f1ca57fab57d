use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;
use uuid::Uuid;

use super::event_filter::EventFilter;
use crate::error::{BusError, BusResult};

/// 总线事件：描述已发生的事实，构造后不可变
///
/// 通过 `Event::builder()` 构造，`id`、`occurred_at`、`published_at` 自动生成：
///
/// ```
/// use gathering_events::event::{Event, EventKind};
///
/// let event = Event::builder()
///     .event_type(EventKind::TaskCompleted)
///     .data(serde_json::json!({"task_id": 123}))
///     .source_agent_id(1)
///     .build();
///
/// assert_eq!(event.event_type(), "task.completed");
/// assert_eq!(event.source_agent_id(), Some(1));
/// assert_eq!(event.circle_id(), None);
/// ```
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct Event {
    /// 事件唯一标识
    #[builder(default = Uuid::new_v4())]
    id: Uuid,
    /// 事件类型（形如 `task.completed`），发布时要求非空
    #[builder(into)]
    event_type: String,
    /// 触发事件的 agent
    source_agent_id: Option<i64>,
    /// 所属 circle
    circle_id: Option<i64>,
    /// 所属项目
    project_id: Option<i64>,
    /// 事件载荷
    #[builder(default = Value::Object(Map::new()))]
    data: Value,
    /// 事件发生的墙上时间
    #[builder(default = Utc::now())]
    occurred_at: DateTime<Utc>,
    /// 单调时钟时间戳，仅进程内有效
    #[serde(skip, default = "Instant::now")]
    #[builder(default = Instant::now())]
    published_at: Instant,
}

impl Event {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn source_agent_id(&self) -> Option<i64> {
        self.source_agent_id
    }

    pub fn circle_id(&self) -> Option<i64> {
        self.circle_id
    }

    pub fn project_id(&self) -> Option<i64> {
        self.project_id
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn published_at(&self) -> Instant {
        self.published_at
    }

    /// 判断事件是否满足过滤条件（未指定的字段不参与比较）
    pub fn matches(&self, filter: &EventFilter) -> bool {
        filter.matches(self)
    }

    /// 发布前校验：事件类型不能为空或全空白
    pub(crate) fn validate(&self) -> BusResult<()> {
        if self.event_type.trim().is_empty() {
            return Err(BusError::invalid_event(format!(
                "event type must not be empty (event_id={})",
                self.id
            )));
        }
        Ok(())
    }
}
