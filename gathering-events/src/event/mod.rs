//! 总线事件（Event）与约定的事件类型
//!
//! `Event` 是发布方交给总线的不可变记录；`EventKind` 枚举系统内约定的类型名；
//! `EventFilter` 按 agent / circle / project 维度筛选事件，供订阅与历史查询复用。

mod bus_event;
mod event_filter;
mod event_kind;

pub use bus_event::{Event, EventBuilder};
pub use event_filter::{EventFilter, EventFilterBuilder};
pub use event_kind::EventKind;
