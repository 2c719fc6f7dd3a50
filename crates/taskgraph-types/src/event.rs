//! Inbound events
//!
//! The backend pushes named events, each with a `type` string and a `data`
//! object whose shape depends on the name. [`CanvasEvent::from_wire`] turns a
//! name + payload into a typed event; names this crate does not know decode
//! to [`CanvasEvent::Unknown`] so new server events never break the stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::snapshot::{AgentSnapshot, TaskSnapshot, WorkspaceProgress, WorkspaceSnapshot};
use crate::NodeId;

/// Errors raised while decoding a wire event
#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("Malformed event envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    #[error("Invalid payload for '{event_type}': {source}")]
    InvalidPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// `workspace.progress` payload: counters plus optional agent stats
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(flatten)]
    pub progress: WorkspaceProgress,
    #[serde(default)]
    pub agents: Option<Vec<AgentSnapshot>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStartedData {
    pub task_id: NodeId,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletedData {
    pub task_id: NodeId,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailedData {
    pub task_id: NodeId,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingData {
    pub task_id: NodeId,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallData {
    pub task_id: NodeId,
    pub tool_name: String,
    #[serde(default)]
    pub input: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultData {
    pub task_id: NodeId,
    pub tool_name: String,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub is_error: bool,
}

/// Wire envelope `{"type": ..., "data": ...}`
#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Value,
}

// ============================================================================
// EVENT
// ============================================================================

/// Typed inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    /// Full snapshot (`initial`)
    Initial(WorkspaceSnapshot),
    /// `workspace.progress`
    Progress(ProgressUpdate),
    /// `task.created`
    TaskCreated(TaskSnapshot),
    /// `task.started`
    TaskStarted(TaskStartedData),
    /// `task.completed`
    TaskCompleted(TaskCompletedData),
    /// `task.failed`
    TaskFailed(TaskFailedData),
    /// `task.thinking`
    TaskThinking(ThinkingData),
    /// `task.tool_call`
    TaskToolCall(ToolCallData),
    /// `task.tool_result`
    TaskToolResult(ToolResultData),
    /// Any event name this crate does not know
    Unknown { event_type: String },
}

impl CanvasEvent {
    pub const INITIAL: &'static str = "initial";
    pub const PROGRESS: &'static str = "workspace.progress";
    pub const TASK_CREATED: &'static str = "task.created";
    pub const TASK_STARTED: &'static str = "task.started";
    pub const TASK_COMPLETED: &'static str = "task.completed";
    pub const TASK_FAILED: &'static str = "task.failed";
    pub const TASK_THINKING: &'static str = "task.thinking";
    pub const TASK_TOOL_CALL: &'static str = "task.tool_call";
    pub const TASK_TOOL_RESULT: &'static str = "task.tool_result";

    /// Decode a named event with its `data` payload
    pub fn from_wire(event_type: &str, data: Value) -> Result<Self, EventDecodeError> {
        fn payload<T: serde::de::DeserializeOwned>(
            event_type: &str,
            data: Value,
        ) -> Result<T, EventDecodeError> {
            serde_json::from_value(data).map_err(|source| EventDecodeError::InvalidPayload {
                event_type: event_type.to_string(),
                source,
            })
        }

        let event = match event_type {
            Self::INITIAL => CanvasEvent::Initial(payload(event_type, data)?),
            Self::PROGRESS => CanvasEvent::Progress(payload(event_type, data)?),
            Self::TASK_CREATED => CanvasEvent::TaskCreated(payload(event_type, data)?),
            Self::TASK_STARTED => CanvasEvent::TaskStarted(payload(event_type, data)?),
            Self::TASK_COMPLETED => CanvasEvent::TaskCompleted(payload(event_type, data)?),
            Self::TASK_FAILED => CanvasEvent::TaskFailed(payload(event_type, data)?),
            Self::TASK_THINKING => CanvasEvent::TaskThinking(payload(event_type, data)?),
            Self::TASK_TOOL_CALL => CanvasEvent::TaskToolCall(payload(event_type, data)?),
            Self::TASK_TOOL_RESULT => CanvasEvent::TaskToolResult(payload(event_type, data)?),
            other => CanvasEvent::Unknown {
                event_type: other.to_string(),
            },
        };
        Ok(event)
    }

    /// Decode a JSON envelope `{"type": ..., "data": ...}`
    pub fn from_envelope(json: &str) -> Result<Self, EventDecodeError> {
        let envelope: Envelope =
            serde_json::from_str(json).map_err(EventDecodeError::MalformedEnvelope)?;
        Self::from_wire(&envelope.event_type, envelope.data)
    }

    /// Wire name of this event
    pub fn event_type(&self) -> &str {
        match self {
            CanvasEvent::Initial(_) => Self::INITIAL,
            CanvasEvent::Progress(_) => Self::PROGRESS,
            CanvasEvent::TaskCreated(_) => Self::TASK_CREATED,
            CanvasEvent::TaskStarted(_) => Self::TASK_STARTED,
            CanvasEvent::TaskCompleted(_) => Self::TASK_COMPLETED,
            CanvasEvent::TaskFailed(_) => Self::TASK_FAILED,
            CanvasEvent::TaskThinking(_) => Self::TASK_THINKING,
            CanvasEvent::TaskToolCall(_) => Self::TASK_TOOL_CALL,
            CanvasEvent::TaskToolResult(_) => Self::TASK_TOOL_RESULT,
            CanvasEvent::Unknown { event_type } => event_type,
        }
    }

    /// Task id for task-scoped events
    pub fn task_id(&self) -> Option<&str> {
        match self {
            CanvasEvent::TaskCreated(task) => Some(&task.id),
            CanvasEvent::TaskStarted(data) => Some(&data.task_id),
            CanvasEvent::TaskCompleted(data) => Some(&data.task_id),
            CanvasEvent::TaskFailed(data) => Some(&data.task_id),
            CanvasEvent::TaskThinking(data) => Some(&data.task_id),
            CanvasEvent::TaskToolCall(data) => Some(&data.task_id),
            CanvasEvent::TaskToolResult(data) => Some(&data.task_id),
            CanvasEvent::Initial(_) | CanvasEvent::Progress(_) | CanvasEvent::Unknown { .. } => {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::TaskStatus;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_decode_task_created_accepts_task_id_alias() {
        let event = CanvasEvent::from_wire(
            "task.created",
            json!({"task_id": "t1", "title": "draft", "to": "writer"}),
        )
        .unwrap();
        let CanvasEvent::TaskCreated(task) = event else {
            panic!("expected TaskCreated");
        };
        assert_eq!(task.id, "t1");
        assert_eq!(task.to.as_deref(), Some("writer"));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.position(), None);
    }

    #[test]
    fn test_decode_envelope() {
        let event =
            CanvasEvent::from_envelope(r#"{"type":"task.started","data":{"task_id":"t1"}}"#)
                .unwrap();
        assert_eq!(event.event_type(), "task.started");
        assert_eq!(event.task_id(), Some("t1"));
    }

    #[test]
    fn test_unknown_event_is_not_an_error() {
        let event = CanvasEvent::from_wire("plugin.loaded", json!({})).unwrap();
        assert_eq!(
            event,
            CanvasEvent::Unknown {
                event_type: "plugin.loaded".into()
            }
        );
    }

    #[test]
    fn test_tool_call_requires_tool_name() {
        let err = CanvasEvent::from_wire("task.tool_call", json!({"task_id": "t1"})).unwrap_err();
        assert!(matches!(
            err,
            EventDecodeError::InvalidPayload { ref event_type, .. } if event_type == "task.tool_call"
        ));
    }

    #[test]
    fn test_progress_flattens_counters() {
        let event = CanvasEvent::from_wire(
            "workspace.progress",
            json!({"total": 3, "completed": 1, "agents": [{"name": "writer", "tasks_completed": 1}]}),
        )
        .unwrap();
        let CanvasEvent::Progress(update) = event else {
            panic!("expected Progress");
        };
        assert_eq!(update.progress.total, 3);
        assert_eq!(update.progress.completed, 1);
        assert_eq!(update.agents.unwrap()[0].tasks_completed, 1);
    }

    #[test]
    fn test_malformed_envelope() {
        assert!(matches!(
            CanvasEvent::from_envelope("not json"),
            Err(EventDecodeError::MalformedEnvelope(_))
        ));
    }
}
