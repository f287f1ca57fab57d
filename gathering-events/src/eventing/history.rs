//! 历史缓冲区（HistoryBuffer）
//!
//! 固定容量的环形缓冲区，仅用于诊断，不保证可重放。
//!
use crate::event::{Event, EventFilter};
use bon::Builder;
use std::collections::VecDeque;
use std::sync::Arc;

/// 历史查询条件，结果按时间倒序（最新在前）
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    #[builder(into)]
    event_type: Option<String>,
    #[builder(default)]
    filter: EventFilter,
    #[builder(default = 100)]
    limit: usize,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        HistoryQuery::builder().build()
    }
}

impl HistoryQuery {
    fn matches(&self, event: &Event) -> bool {
        self.event_type
            .as_deref()
            .is_none_or(|t| event.event_type() == t)
            && self.filter.matches(event)
    }
}

#[derive(Debug)]
pub(crate) struct HistoryBuffer {
    events: VecDeque<Arc<Event>>,
    capacity: usize,
}

impl HistoryBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, event: Arc<Event>) {
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// 调整容量，缩小时立即淘汰最旧的记录
    pub(crate) fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.events.len() > capacity {
            self.events.pop_front();
        }
    }

    pub(crate) fn query(&self, query: &HistoryQuery) -> Vec<Arc<Event>> {
        self.events
            .iter()
            .rev()
            .filter(|e| query.matches(e))
            .take(query.limit)
            .cloned()
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
    }
}
