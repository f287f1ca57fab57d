use bon::Builder;
use serde::{Deserialize, Serialize};

use super::bus_event::Event;

/// 事件过滤条件：所有已指定的字段都相等才算匹配，空过滤器匹配全部事件
#[derive(Builder, Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    source_agent_id: Option<i64>,
    circle_id: Option<i64>,
    project_id: Option<i64>,
}

impl EventFilter {
    pub fn is_empty(&self) -> bool {
        self.source_agent_id.is_none() && self.circle_id.is_none() && self.project_id.is_none()
    }

    pub fn matches(&self, event: &Event) -> bool {
        fn check(want: Option<i64>, got: Option<i64>) -> bool {
            want.is_none_or(|w| got == Some(w))
        }

        check(self.source_agent_id, event.source_agent_id())
            && check(self.circle_id, event.circle_id())
            && check(self.project_id, event.project_id())
    }
}
