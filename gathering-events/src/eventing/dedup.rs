//! 去重引擎（DedupEngine）
//!
//! 滑动窗口：窗口内再次出现同一键时刷新 `last_seen`，持续重复的事件会被一直抑制。
//! 每接受 `prune_every` 条事件清理一次超过 2 倍窗口未出现的键，缓存规模与近期
//! 键的基数成正比，而不是与历史事件总数成正比。
//!
use super::content_hash::DedupKey;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Fresh,
    Duplicate,
}

#[derive(Debug, Default)]
pub(crate) struct DedupEngine {
    seen: HashMap<DedupKey, Instant>,
    accepted: u64,
}

impl DedupEngine {
    /// 检查并登记一个键；调用方持锁，检查与写入在同一临界区内完成
    pub(crate) fn admit(
        &mut self,
        key: DedupKey,
        now: Instant,
        window: Duration,
        prune_every: u64,
    ) -> Admission {
        if let Some(last_seen) = self.seen.get_mut(&key) {
            if now.saturating_duration_since(*last_seen) <= window {
                *last_seen = now;
                return Admission::Duplicate;
            }
        }

        self.seen.insert(key, now);
        self.accepted += 1;
        if self.accepted % prune_every.max(1) == 0 {
            self.prune(now, window);
        }
        Admission::Fresh
    }

    /// 移除超过 2 倍窗口未出现的键，返回移除数量
    pub(crate) fn prune(&mut self, now: Instant, window: Duration) -> usize {
        let horizon = window.saturating_mul(2);
        let before = self.seen.len();
        self.seen
            .retain(|_, last_seen| now.saturating_duration_since(*last_seen) <= horizon);
        let removed = before - self.seen.len();

        debug!(removed, remaining = self.seen.len(), "Dedup cache pruned");
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.seen.len()
    }

    pub(crate) fn clear(&mut self) {
        self.seen.clear();
        self.accepted = 0;
    }
}
