//! Snapshot types
//!
//! The full workspace state sent by the backend on `initial` and used to
//! resynchronize after a reconnect. Agents, tasks and combiners arrive as
//! flat lists; the canvas engine turns them into scene nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::CombinerMode;
use crate::NodeId;

// ============================================================================
// STATUS ENUMS
// ============================================================================

/// Task lifecycle status as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Completed or failed - the task can be rerun
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Agent display status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Busy,
    Offline,
}

/// Combiner display status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinerStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

// ============================================================================
// PROGRESS
// ============================================================================

/// Aggregate task counters for the workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkspaceProgress {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub pending: u32,
    #[serde(default)]
    pub in_progress: u32,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub failed: u32,
}

// ============================================================================
// ENTITIES
// ============================================================================

/// Agent as reported by the backend; the agent id is its name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub name: NodeId,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub current_task_ids: Vec<NodeId>,
    #[serde(default)]
    pub queued_task_ids: Vec<NodeId>,
    #[serde(default)]
    pub tasks_completed: u32,
    #[serde(default)]
    pub tasks_failed: u32,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
}

impl AgentSnapshot {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            status: AgentStatus::Idle,
            current_task_ids: Vec::new(),
            queued_task_ids: Vec::new(),
            tasks_completed: 0,
            tasks_failed: 0,
            x: None,
            y: None,
        }
    }
}

/// Task as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    #[serde(alias = "task_id")]
    pub id: NodeId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    /// Assigned agent name
    #[serde(default)]
    pub to: Option<NodeId>,
    #[serde(default)]
    pub input_task_ids: Vec<NodeId>,
    #[serde(default)]
    pub combiner_id: Option<NodeId>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
}

impl TaskSnapshot {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: TaskStatus::Pending,
            to: None,
            input_task_ids: Vec::new(),
            combiner_id: None,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
            x: None,
            y: None,
        }
    }

    /// Position if both coordinates are present
    pub fn position(&self) -> Option<(f32, f32)> {
        self.x.zip(self.y)
    }
}

/// Combiner as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinerSnapshot {
    pub id: NodeId,
    #[serde(default)]
    pub mode: CombinerMode,
    #[serde(default)]
    pub status: CombinerStatus,
    /// Number of input ports to materialize (at least one)
    #[serde(default = "default_port_count")]
    pub input_ports: usize,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
}

fn default_port_count() -> usize {
    1
}

/// Connection as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub from_node: NodeId,
    pub from_port: String,
    pub to_node: NodeId,
    pub to_port: String,
}

/// Full workspace state (`initial` event payload)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    #[serde(default)]
    pub progress: WorkspaceProgress,
    #[serde(default)]
    pub agents: Vec<AgentSnapshot>,
    #[serde(default)]
    pub tasks: Vec<TaskSnapshot>,
    #[serde(default)]
    pub combiners: Vec<CombinerSnapshot>,
    #[serde(default)]
    pub connections: Vec<ConnectionSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_wire_names() {
        let status: TaskStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(status, TaskStatus::InProgress);
        assert_eq!(
            serde_json::to_string(&TaskStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert!(TaskStatus::Failed.is_finished());
        assert!(!TaskStatus::Pending.is_finished());
    }

    #[test]
    fn test_snapshot_defaults_missing_sections() {
        let snapshot: WorkspaceSnapshot =
            serde_json::from_str(r#"{"agents":[{"name":"writer"}]}"#).unwrap();
        assert_eq!(snapshot.agents.len(), 1);
        assert_eq!(snapshot.agents[0].status, AgentStatus::Idle);
        assert!(snapshot.tasks.is_empty());
        assert!(snapshot.combiners.is_empty());
        assert_eq!(snapshot.progress, WorkspaceProgress::default());
    }

    #[test]
    fn test_task_position_requires_both_coordinates() {
        let mut task = TaskSnapshot::new("t1", "draft");
        task.x = Some(10.0);
        assert_eq!(task.position(), None);
        task.y = Some(20.0);
        assert_eq!(task.position(), Some((10.0, 20.0)));
    }

    #[test]
    fn test_combiner_defaults_to_one_port() {
        let combiner: CombinerSnapshot = serde_json::from_str(r#"{"id":"c1"}"#).unwrap();
        assert_eq!(combiner.input_ports, 1);
        assert_eq!(combiner.mode, CombinerMode::Concatenate);
    }
}
