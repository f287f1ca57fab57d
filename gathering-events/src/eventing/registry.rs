//! 订阅注册表（SubscriptionRegistry）
//!
//! 按事件类型索引订阅，`All` 订阅单独存放；匹配结果按注册顺序排列，保证扇出时
//! 处理器的启动顺序是确定的。
//!
use super::handler::{EventHandler, HandledEventType};
use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::warn;

pub(crate) type EventPredicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// 订阅句柄，`unsubscribe` 时使用；数值即注册顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn value(&self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(value: u64) -> Self {
        SubscriptionId(value)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

pub(crate) struct Subscription {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
    filter: Option<EventPredicate>,
}

impl Subscription {
    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn handler(&self) -> &dyn EventHandler {
        self.handler.as_ref()
    }

    /// 过滤器 panic 时视为不匹配
    pub(crate) fn accepts(&self, event: &Event) -> bool {
        let Some(filter) = &self.filter else {
            return true;
        };

        match catch_unwind(AssertUnwindSafe(|| filter(event))) {
            Ok(matched) => matched,
            Err(_) => {
                warn!(
                    subscription = %self.id,
                    handler = self.handler.handler_name(),
                    event_type = event.event_type(),
                    "Subscription filter panicked, skipping handler"
                );
                false
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    next_id: u64,
    by_type: HashMap<String, Vec<Arc<Subscription>>>,
    all: Vec<Arc<Subscription>>,
    topics: HashMap<SubscriptionId, HandledEventType>,
}

impl SubscriptionRegistry {
    pub(crate) fn insert(
        &mut self,
        topic: HandledEventType,
        handler: Arc<dyn EventHandler>,
        filter: Option<EventPredicate>,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let sub = Arc::new(Subscription {
            id,
            handler,
            filter,
        });

        match &topic {
            HandledEventType::All => self.all.push(sub),
            HandledEventType::One(t) => {
                self.by_type.entry(t.clone()).or_default().push(sub);
            }
            HandledEventType::Many(ts) => {
                // 同一订阅重复列出的类型只登记一次，避免一次事件调用两遍
                let unique: BTreeSet<&String> = ts.iter().collect();
                for t in unique {
                    self.by_type.entry(t.clone()).or_default().push(sub.clone());
                }
            }
        }

        self.topics.insert(id, topic);
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let Some(topic) = self.topics.remove(&id) else {
            return false;
        };

        match topic {
            HandledEventType::All => self.all.retain(|s| s.id != id),
            HandledEventType::One(t) => self.remove_from_type(&t, id),
            HandledEventType::Many(ts) => {
                for t in &ts {
                    self.remove_from_type(t, id);
                }
            }
        }
        true
    }

    fn remove_from_type(&mut self, event_type: &str, id: SubscriptionId) {
        if let Some(list) = self.by_type.get_mut(event_type) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                self.by_type.remove(event_type);
            }
        }
    }

    /// 按类型取候选订阅（未执行过滤器），按注册顺序排列
    pub(crate) fn candidates(&self, event_type: &str) -> Vec<Arc<Subscription>> {
        let typed = self.by_type.get(event_type).map(Vec::as_slice).unwrap_or(&[]);

        // 两个列表各自有序，归并即可
        let mut merged = Vec::with_capacity(typed.len() + self.all.len());
        let (mut i, mut j) = (0, 0);
        while i < typed.len() && j < self.all.len() {
            if typed[i].id < self.all[j].id {
                merged.push(typed[i].clone());
                i += 1;
            } else {
                merged.push(self.all[j].clone());
                j += 1;
            }
        }
        merged.extend(typed[i..].iter().cloned());
        merged.extend(self.all[j..].iter().cloned());
        merged
    }

    pub(crate) fn len(&self) -> usize {
        self.topics.len()
    }

    /// 清空订阅；句柄编号继续递增，旧句柄不会误删新订阅
    pub(crate) fn clear(&mut self) {
        self.by_type.clear();
        self.all.clear();
        self.topics.clear();
    }
}
