//! Outbound intents
//!
//! Mutation requests the canvas hands to the API client. The canvas only
//! states *what* it wants (node id + operation + parameters); transport and
//! retries belong to whoever consumes the intent.

use serde::{Deserialize, Serialize};

use crate::layout::PersistedLayout;
use crate::NodeId;

/// Aggregation mode of a combiner node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinerMode {
    /// Join input results in port order
    #[default]
    Concatenate,
    /// Ask an agent to summarize the inputs
    Summarize,
    /// Merge structured results key by key
    Merge,
}

/// Partial task update; `None` fields are left untouched
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combiner_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
}

impl TaskPatch {
    pub fn assign_to(agent: impl Into<String>) -> Self {
        Self {
            assigned_to: Some(agent.into()),
            ..Self::default()
        }
    }

    pub fn combine_into(combiner: impl Into<String>) -> Self {
        Self {
            combiner_id: Some(combiner.into()),
            ..Self::default()
        }
    }
}

/// A request from the canvas to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CanvasIntent {
    CreateTask {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        assigned_to: Option<NodeId>,
        #[serde(default)]
        execute: bool,
        #[serde(default)]
        x: Option<f32>,
        #[serde(default)]
        y: Option<f32>,
    },
    UpdateTask {
        task_id: NodeId,
        patch: TaskPatch,
    },
    DeleteTask {
        task_id: NodeId,
    },
    ExecuteTask {
        task_id: NodeId,
        #[serde(default)]
        rerun: bool,
    },
    CreateConnection {
        from_node: NodeId,
        from_port: String,
        to_node: NodeId,
        to_port: String,
    },
    DeleteConnection {
        from_node: NodeId,
        from_port: String,
        to_node: NodeId,
        to_port: String,
    },
    CreateAgent {
        name: String,
        #[serde(default)]
        role: Option<String>,
    },
    DeleteAgent {
        name: NodeId,
    },
    CreateCombiner {
        combiner_id: NodeId,
        mode: CombinerMode,
        x: f32,
        y: f32,
    },
    DeleteCombiner {
        combiner_id: NodeId,
    },
    RunCombiner {
        combiner_id: NodeId,
        mode: CombinerMode,
        /// Input task ids in port order
        input_task_ids: Vec<NodeId>,
    },
    SaveLayout(PersistedLayout),
}

impl CanvasIntent {
    /// Wire name of the operation (for logging)
    pub fn op(&self) -> &'static str {
        match self {
            CanvasIntent::CreateTask { .. } => "create_task",
            CanvasIntent::UpdateTask { .. } => "update_task",
            CanvasIntent::DeleteTask { .. } => "delete_task",
            CanvasIntent::ExecuteTask { .. } => "execute_task",
            CanvasIntent::CreateConnection { .. } => "create_connection",
            CanvasIntent::DeleteConnection { .. } => "delete_connection",
            CanvasIntent::CreateAgent { .. } => "create_agent",
            CanvasIntent::DeleteAgent { .. } => "delete_agent",
            CanvasIntent::CreateCombiner { .. } => "create_combiner",
            CanvasIntent::DeleteCombiner { .. } => "delete_combiner",
            CanvasIntent::RunCombiner { .. } => "run_combiner",
            CanvasIntent::SaveLayout(_) => "save_layout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_intent_is_tagged_by_op() {
        let intent = CanvasIntent::UpdateTask {
            task_id: "t1".into(),
            patch: TaskPatch::assign_to("writer"),
        };
        let value = serde_json::to_value(&intent).unwrap();
        assert_eq!(
            value,
            json!({"op": "update_task", "task_id": "t1", "patch": {"assigned_to": "writer"}})
        );
        assert_eq!(intent.op(), "update_task");
    }

    #[test]
    fn test_execute_defaults_to_first_run() {
        let intent: CanvasIntent =
            serde_json::from_value(json!({"op": "execute_task", "task_id": "t1"})).unwrap();
        assert_eq!(
            intent,
            CanvasIntent::ExecuteTask {
                task_id: "t1".into(),
                rerun: false
            }
        );
    }
}
