use super::dispatcher::DispatchReport;
use serde::{Deserialize, Serialize};

/// 总线统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    /// 被接受（未被去重）的事件数
    pub events_published: u64,
    /// 送达处理器的次数，每个匹配的处理器计一次
    pub events_delivered: u64,
    /// 被去重抑制的事件数
    pub events_deduplicated: u64,
    /// 处理器调用次数
    pub handler_invocations: u64,
    /// 处理器失败次数（错误、panic、超时）
    pub handler_errors: u64,
    pub active_subscribers: usize,
    pub history_size: usize,
    pub dedup_cache_size: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counters {
    pub(crate) events_published: u64,
    pub(crate) events_delivered: u64,
    pub(crate) events_deduplicated: u64,
    pub(crate) handler_invocations: u64,
    pub(crate) handler_errors: u64,
}

impl Counters {
    pub(crate) fn record_dispatch(&mut self, report: &DispatchReport) {
        self.events_delivered += report.invoked as u64;
        self.handler_invocations += report.invoked as u64;
        self.handler_errors += report.failures.len() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventing::dispatcher::{FailureKind, HandlerFailure};
    use crate::eventing::registry::SubscriptionId;
    use uuid::Uuid;

    fn report(invoked: usize, failed: usize) -> DispatchReport {
        let event_id = Uuid::new_v4();
        let mut report = DispatchReport::empty(event_id);
        report.invoked = invoked;
        report.failures = (0..failed)
            .map(|_| HandlerFailure {
                subscription_id: SubscriptionId::from_raw(1),
                handler: "h".into(),
                event_id,
                event_type: "task.failed".into(),
                kind: FailureKind::Error,
                reason: "boom".into(),
            })
            .collect();
        report
    }

    #[test]
    fn deliveries_count_every_invoked_handler() {
        let mut c = Counters::default();
        c.record_dispatch(&report(3, 1));
        c.record_dispatch(&report(0, 0));
        c.record_dispatch(&report(2, 0));

        assert_eq!(c.events_delivered, 5);
        assert_eq!(c.handler_invocations, 5);
        assert_eq!(c.handler_errors, 1);
    }
}
