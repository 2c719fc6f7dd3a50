//! Event reconciler - folds server events into the scene
//!
//! # Rules
//!
//! 1. A snapshot (`initial`) replaces server-owned state wholesale
//! 2. A node that already has a position keeps it; the server position is
//!    used only for nodes that have none
//! 3. Lifecycle events for unknown tasks are dropped with a warning
//! 4. Every handler is idempotent, so at-least-once delivery is safe
//! 5. `task.created` for a known task never overwrites it
//!
//! Combiners that the snapshot does not mention are kept, since they can be
//! created locally before the backend knows about them.

use egui::Pos2;
use std::collections::HashSet;
use taskgraph_types::{
    AgentSnapshot, CanvasEvent, CombinerSnapshot, ProgressUpdate, TaskCompletedData,
    TaskFailedData, TaskSnapshot, TaskStartedData, TaskStatus, WorkspaceSnapshot,
};

use super::scene::{Connection, ExecutionEntry, NodeBody, NodeKind, SceneModel};
use crate::config::ReconcilerSettings;

/// What applying an event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Scene changed
    Changed,
    /// A task transitioned to completed (drives the completion burst)
    Completed(String),
    /// Nothing to do (unknown task, unknown event)
    Ignored,
}

impl Applied {
    pub fn changed(&self) -> bool {
        !matches!(self, Applied::Ignored)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventReconciler {
    settings: ReconcilerSettings,
}

impl EventReconciler {
    pub fn new(settings: ReconcilerSettings) -> Self {
        Self { settings }
    }

    pub fn apply(&self, scene: &mut SceneModel, event: &CanvasEvent) -> Applied {
        match event {
            CanvasEvent::Initial(snapshot) => {
                self.apply_snapshot(scene, snapshot);
                Applied::Changed
            }
            CanvasEvent::Progress(update) => {
                self.apply_progress(scene, update);
                Applied::Changed
            }
            CanvasEvent::TaskCreated(task) => self.task_created(scene, task),
            CanvasEvent::TaskStarted(data) => self.task_started(scene, data),
            CanvasEvent::TaskCompleted(data) => self.task_completed(scene, data),
            CanvasEvent::TaskFailed(data) => self.task_failed(scene, data),
            CanvasEvent::TaskThinking(data) => self.append_log(
                scene,
                CanvasEvent::TASK_THINKING,
                &data.task_id,
                ExecutionEntry::Thinking {
                    content: data.content.clone(),
                },
            ),
            CanvasEvent::TaskToolCall(data) => self.append_log(
                scene,
                CanvasEvent::TASK_TOOL_CALL,
                &data.task_id,
                ExecutionEntry::ToolCall {
                    tool_name: data.tool_name.clone(),
                    input: data.input.clone(),
                },
            ),
            CanvasEvent::TaskToolResult(data) => self.append_log(
                scene,
                CanvasEvent::TASK_TOOL_RESULT,
                &data.task_id,
                ExecutionEntry::ToolResult {
                    tool_name: data.tool_name.clone(),
                    output: data.output.clone(),
                    is_error: data.is_error,
                },
            ),
            CanvasEvent::Unknown { event_type } => {
                tracing::debug!(event_type = %event_type, "Ignoring unknown event");
                Applied::Ignored
            }
        }
    }

    // =========================================================================
    // SNAPSHOT
    // =========================================================================

    pub fn apply_snapshot(&self, scene: &mut SceneModel, snapshot: &WorkspaceSnapshot) {
        scene.set_progress(snapshot.progress);
        self.replace_agents(scene, &snapshot.agents);

        let keep: HashSet<&str> = snapshot.tasks.iter().map(|t| t.id.as_str()).collect();
        for stale in scene.ids_of_kind(NodeKind::Task) {
            if !keep.contains(stale.as_str()) {
                scene.remove(&stale);
            }
        }
        for task in &snapshot.tasks {
            self.upsert_task(scene, task);
        }

        for combiner in &snapshot.combiners {
            upsert_combiner(scene, combiner);
        }

        for connection in &snapshot.connections {
            let connection = Connection::from(connection);
            if scene.connections().contains(&connection) {
                continue;
            }
            if let Err(e) = scene.connect(connection) {
                tracing::warn!(error = %e, "Skipping snapshot connection");
            }
        }

        tracing::info!(
            agents = snapshot.agents.len(),
            tasks = snapshot.tasks.len(),
            combiners = snapshot.combiners.len(),
            "Applied workspace snapshot"
        );
    }

    fn apply_progress(&self, scene: &mut SceneModel, update: &ProgressUpdate) {
        scene.set_progress(update.progress);
        if let Some(agents) = &update.agents {
            self.replace_agents(scene, agents);
        }
    }

    /// Agent list is replaced wholesale; surviving agents keep their position
    fn replace_agents(&self, scene: &mut SceneModel, agents: &[AgentSnapshot]) {
        let keep: HashSet<&str> = agents.iter().map(|a| a.name.as_str()).collect();
        for stale in scene.ids_of_kind(NodeKind::Agent) {
            if !keep.contains(stale.as_str()) {
                scene.remove(&stale);
            }
        }
        for agent in agents {
            match scene.kind_of(&agent.name) {
                Some(NodeKind::Agent) => {
                    if let Some(node) = scene.node_mut(&agent.name) {
                        if let NodeBody::Agent(body) = &mut node.body {
                            body.apply_stats(agent);
                        }
                        if node.position.is_none() {
                            node.position = agent.x.zip(agent.y).map(|(x, y)| Pos2::new(x, y));
                        }
                    }
                }
                Some(other) => {
                    tracing::warn!(agent = %agent.name, kind = ?other, "Agent name taken by another node");
                }
                None => {
                    scene.insert_agent(agent);
                }
            }
        }
    }

    /// Insert a task or refresh an existing one from a snapshot
    fn upsert_task(&self, scene: &mut SceneModel, task: &TaskSnapshot) {
        match scene.kind_of(&task.id) {
            None => {
                scene.insert_task(task);
            }
            Some(NodeKind::Task) => {
                if let Some(node) = scene.node_mut(&task.id) {
                    if let NodeBody::Task(body) = &mut node.body {
                        body.apply_snapshot(task);
                    }
                    if node.position.is_none() {
                        node.position = task.position().map(|(x, y)| Pos2::new(x, y));
                    }
                }
            }
            Some(other) => {
                tracing::warn!(task_id = %task.id, kind = ?other, "Task id taken by another node");
            }
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Append a new task. A redelivered creation never rewinds a task that
    /// already exists; it can only place one that has no position yet.
    fn task_created(&self, scene: &mut SceneModel, task: &TaskSnapshot) -> Applied {
        match scene.kind_of(&task.id) {
            None => {
                if scene.insert_task(task) {
                    Applied::Changed
                } else {
                    Applied::Ignored
                }
            }
            Some(NodeKind::Task) => {
                let unplaced = scene.node(&task.id).is_some_and(|n| n.position.is_none());
                match task.position() {
                    Some((x, y)) if unplaced => {
                        scene.set_position(&task.id, Pos2::new(x, y));
                        Applied::Changed
                    }
                    _ => {
                        tracing::debug!(task_id = %task.id, "Duplicate task.created ignored");
                        Applied::Ignored
                    }
                }
            }
            Some(other) => {
                tracing::warn!(task_id = %task.id, kind = ?other, "Task id taken by another node");
                Applied::Ignored
            }
        }
    }

    fn task_started(&self, scene: &mut SceneModel, data: &TaskStartedData) -> Applied {
        let Some(task) = scene.task_mut(&data.task_id) else {
            return unknown_task(CanvasEvent::TASK_STARTED, &data.task_id);
        };
        task.status = TaskStatus::InProgress;
        if data.timestamp.is_some() {
            task.started_at = data.timestamp;
        }
        Applied::Changed
    }

    fn task_completed(&self, scene: &mut SceneModel, data: &TaskCompletedData) -> Applied {
        let Some(task) = scene.task_mut(&data.task_id) else {
            return unknown_task(CanvasEvent::TASK_COMPLETED, &data.task_id);
        };
        let first = task.status != TaskStatus::Completed;
        task.status = TaskStatus::Completed;
        if data.timestamp.is_some() {
            task.completed_at = data.timestamp;
        }
        if data.result.is_some() {
            task.result = data.result.clone();
        }
        task.error = None;
        if first {
            Applied::Completed(data.task_id.clone())
        } else {
            Applied::Changed
        }
    }

    fn task_failed(&self, scene: &mut SceneModel, data: &TaskFailedData) -> Applied {
        let Some(task) = scene.task_mut(&data.task_id) else {
            return unknown_task(CanvasEvent::TASK_FAILED, &data.task_id);
        };
        task.status = TaskStatus::Failed;
        if data.timestamp.is_some() {
            task.completed_at = data.timestamp;
        }
        if data.error.is_some() {
            task.error = data.error.clone();
        }
        Applied::Changed
    }

    fn append_log(
        &self,
        scene: &mut SceneModel,
        event_type: &str,
        task_id: &str,
        entry: ExecutionEntry,
    ) -> Applied {
        let cap = self.settings.execution_log_cap;
        let Some(task) = scene.task_mut(task_id) else {
            return unknown_task(event_type, task_id);
        };
        task.push_log(entry, cap);
        Applied::Changed
    }
}

fn unknown_task(event: &str, task_id: &str) -> Applied {
    tracing::warn!(event, task_id = %task_id, "Event for unknown task dropped");
    Applied::Ignored
}

fn upsert_combiner(scene: &mut SceneModel, combiner: &CombinerSnapshot) {
    match scene.kind_of(&combiner.id) {
        None => {
            scene.insert_combiner(combiner);
        }
        Some(NodeKind::Combiner) => {
            let missing_ports = scene
                .combiner(&combiner.id)
                .map(|c| combiner.input_ports.saturating_sub(c.input_ports.len()))
                .unwrap_or(0);
            for _ in 0..missing_ports {
                scene.add_combiner_port(&combiner.id);
            }
            if let Some(node) = scene.node_mut(&combiner.id) {
                if let NodeBody::Combiner(body) = &mut node.body {
                    body.mode = combiner.mode;
                    body.status = combiner.status;
                    body.result = combiner.result.clone();
                }
                if node.position.is_none() {
                    node.position = combiner.x.zip(combiner.y).map(|(x, y)| Pos2::new(x, y));
                }
            }
        }
        Some(other) => {
            tracing::warn!(combiner_id = %combiner.id, kind = ?other, "Combiner id taken by another node");
        }
    }
}
