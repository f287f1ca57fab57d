//! 事件子系统（eventing）
//!
//! 进程内事件发布/订阅的运行时：
//! - `EventBus`：统一发布/订阅门面，负责去重、历史、分发与统计；
//! - `EventHandler`：对事件进行消费处理，`handler_fn` 把异步闭包适配为处理器；
//! - `BusConfig` / `BusOptions`：总线配置与运行时局部更新；
//! - `DispatchReport` / `HandlerFailure`：一次发布的分发结果与处理器失败记录。
//!
//! 处理器之间相互隔离：错误、panic 与超时只记为该处理器的失败，不会传回发布方。
//!
pub mod bus;
pub mod config;
mod content_hash;
mod dedup;
pub mod dispatcher;
pub mod handler;
pub mod history;
pub mod registry;
pub mod stats;

pub use bus::{EventBus, PublishOutcome};
pub use config::{BusConfig, BusOptions, HandlerTimeout};
pub use dispatcher::{DispatchReport, FailureKind, HandlerFailure};
pub use handler::{EventHandler, FnHandler, HandledEventType, handler_fn};
pub use history::HistoryQuery;
pub use registry::SubscriptionId;
pub use stats::BusStats;
