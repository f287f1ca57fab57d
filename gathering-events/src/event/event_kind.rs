use std::fmt;
use std::str::FromStr;

use crate::error::BusError;

/// 系统内已知的事件类型
///
/// 按领域分组：`agent.*`、`memory.*`、`circle.*`、`task.*`、`conversation.*`、`system.*`。
/// 总线本身只认字符串类型，任意非空字符串都可以发布；这里仅提供约定好的名字。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AgentStarted,
    AgentStopped,
    AgentTaskAssigned,
    AgentTaskCompleted,
    AgentTaskFailed,
    AgentToolExecuted,

    MemoryCreated,
    MemoryShared,
    MemoryRecalled,

    CircleCreated,
    CircleStarted,
    CircleStopped,
    CircleMemberAdded,
    CircleMemberRemoved,

    TaskCreated,
    TaskAssigned,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    TaskConflictDetected,

    ConversationMessage,
    ConversationTurnComplete,

    SystemError,
    SystemWarning,
}

impl EventKind {
    pub const ALL: [EventKind; 24] = [
        EventKind::AgentStarted,
        EventKind::AgentStopped,
        EventKind::AgentTaskAssigned,
        EventKind::AgentTaskCompleted,
        EventKind::AgentTaskFailed,
        EventKind::AgentToolExecuted,
        EventKind::MemoryCreated,
        EventKind::MemoryShared,
        EventKind::MemoryRecalled,
        EventKind::CircleCreated,
        EventKind::CircleStarted,
        EventKind::CircleStopped,
        EventKind::CircleMemberAdded,
        EventKind::CircleMemberRemoved,
        EventKind::TaskCreated,
        EventKind::TaskAssigned,
        EventKind::TaskStarted,
        EventKind::TaskCompleted,
        EventKind::TaskFailed,
        EventKind::TaskConflictDetected,
        EventKind::ConversationMessage,
        EventKind::ConversationTurnComplete,
        EventKind::SystemError,
        EventKind::SystemWarning,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::AgentStarted => "agent.started",
            EventKind::AgentStopped => "agent.stopped",
            EventKind::AgentTaskAssigned => "agent.task.assigned",
            EventKind::AgentTaskCompleted => "agent.task.completed",
            EventKind::AgentTaskFailed => "agent.task.failed",
            EventKind::AgentToolExecuted => "agent.tool.executed",
            EventKind::MemoryCreated => "memory.created",
            EventKind::MemoryShared => "memory.shared",
            EventKind::MemoryRecalled => "memory.recalled",
            EventKind::CircleCreated => "circle.created",
            EventKind::CircleStarted => "circle.started",
            EventKind::CircleStopped => "circle.stopped",
            EventKind::CircleMemberAdded => "circle.member.added",
            EventKind::CircleMemberRemoved => "circle.member.removed",
            EventKind::TaskCreated => "task.created",
            EventKind::TaskAssigned => "task.assigned",
            EventKind::TaskStarted => "task.started",
            EventKind::TaskCompleted => "task.completed",
            EventKind::TaskFailed => "task.failed",
            EventKind::TaskConflictDetected => "task.conflict.detected",
            EventKind::ConversationMessage => "conversation.message",
            EventKind::ConversationTurnComplete => "conversation.turn.complete",
            EventKind::SystemError => "system.error",
            EventKind::SystemWarning => "system.warning",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| BusError::UnknownEventKind { kind: s.to_string() })
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_parses_back_from_its_name() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = "task.exploded".parse::<EventKind>().unwrap_err();
        assert_eq!(
            err,
            BusError::UnknownEventKind {
                kind: "task.exploded".into()
            }
        );
    }

    #[test]
    fn display_matches_wire_name() {
        assert_eq!(EventKind::CircleMemberAdded.to_string(), "circle.member.added");
        assert_eq!(String::from(EventKind::SystemWarning), "system.warning");
    }
}
