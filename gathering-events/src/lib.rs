//! 进程内事件总线（gathering-events）
//!
//! 在长期运行的服务进程内，把领域事件（agent 活动、任务完成、编排信号等）扇出给
//! 多个感兴趣的处理器：
//! - 事件（`event`）：事件结构、常用事件类型与属性过滤器；
//! - 事件系统（`eventing`）：总线、订阅、去重、历史与受并发上限约束的分发；
//! - 错误（`error`）：统一的 `BusError` 与 `BusResult`。
//!
//! 典型用法：
//! 1. 通过 `EventBus::new()` 或 `EventBus::global()` 获得总线；
//! 2. 用 `subscribe` / `subscribe_filtered` 注册处理器；
//! 3. 用 `Event::builder()` 构造事件并 `publish`，等待所有处理器结束；
//! 4. 通过 `stats()`、`history()` 与 `failures()` 观察总线运行情况。
//!
pub mod error;
pub mod event;
pub mod eventing;
