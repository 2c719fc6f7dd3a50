//! Scene model - the authoritative in-memory graph
//!
//! Nodes (agents, tasks, combiners), their ports, and the connections
//! between them. The scene is an owned value; the interaction controller and
//! the event reconciler take `&mut SceneModel` on their turn and go through
//! the narrow mutation methods below.
//!
//! # Positions
//!
//! `Node::position` is the *stored* position: set by a drag, a persisted
//! layout, auto-layout, or the server. Nodes without one are drawn at
//! `Node::fallback`, a deterministic slot from insertion order. The fallback
//! never becomes a stored position on its own, so a later server position
//! still applies; a drag stores `fallback + delta`.

use chrono::{DateTime, Utc};
use egui::{Pos2, Vec2};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use taskgraph_types::{
    AgentSnapshot, AgentStatus, CombinerMode, CombinerSnapshot, CombinerStatus,
    ConnectionSnapshot, PersistedLayout, SavedPosition, TaskSnapshot, TaskStatus,
    WorkspaceProgress,
};
use thiserror::Error;

use super::layout::fallback_slot;
use crate::config::{GeometrySettings, LayoutSettings};

pub use taskgraph_types::NodeId;

/// Port id of the single input port of agents and tasks
pub const INPUT_PORT: &str = "in";
/// Port id of the single output port of every node
pub const OUTPUT_PORT: &str = "out";

// =============================================================================
// ERRORS
// =============================================================================

/// Rejected connection attempts
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConnectionError {
    #[error("Connection from '{0}' to itself")]
    SelfLoop(NodeId),

    #[error("Unknown node '{0}'")]
    UnknownNode(NodeId),

    #[error("Node '{node}' has no {direction:?} port '{port}'")]
    UnknownPort {
        node: NodeId,
        port: String,
        direction: PortDirection,
    },

    #[error("Input port '{port}' of '{node}' already has a connection")]
    PortOccupied { node: NodeId, port: String },
}

// =============================================================================
// PORTS & CONNECTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

/// Reference to one port of one node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node_id: NodeId,
    pub port_id: String,
    pub direction: PortDirection,
}

impl PortRef {
    pub fn input(node_id: impl Into<String>, port_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            port_id: port_id.into(),
            direction: PortDirection::Input,
        }
    }

    pub fn output(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            port_id: OUTPUT_PORT.to_string(),
            direction: PortDirection::Output,
        }
    }
}

/// Directed edge `(from_node, from_port) -> (to_node, to_port)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    pub from_node: NodeId,
    pub from_port: String,
    pub to_node: NodeId,
    pub to_port: String,
}

impl Connection {
    pub fn new(from: &PortRef, to: &PortRef) -> Self {
        Self {
            from_node: from.node_id.clone(),
            from_port: from.port_id.clone(),
            to_node: to.node_id.clone(),
            to_port: to.port_id.clone(),
        }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }
}

impl From<&ConnectionSnapshot> for Connection {
    fn from(snapshot: &ConnectionSnapshot) -> Self {
        Self {
            from_node: snapshot.from_node.clone(),
            from_port: snapshot.from_port.clone(),
            to_node: snapshot.to_node.clone(),
            to_port: snapshot.to_port.clone(),
        }
    }
}

// =============================================================================
// NODES
// =============================================================================

/// Node discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Agent,
    Task,
    Combiner,
}

/// One entry of a task's execution log
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEntry {
    Thinking {
        content: String,
    },
    ToolCall {
        tool_name: String,
        input: Option<Value>,
    },
    ToolResult {
        tool_name: String,
        output: Option<Value>,
        is_error: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentNode {
    pub role: Option<String>,
    pub status: AgentStatus,
    pub current_task_ids: Vec<NodeId>,
    pub queued_task_ids: Vec<NodeId>,
    pub tasks_completed: u32,
    pub tasks_failed: u32,
}

impl AgentNode {
    /// Replace every stat from a snapshot
    pub fn apply_stats(&mut self, snapshot: &AgentSnapshot) {
        self.role = snapshot.role.clone();
        self.status = snapshot.status;
        self.current_task_ids = snapshot.current_task_ids.clone();
        self.queued_task_ids = snapshot.queued_task_ids.clone();
        self.tasks_completed = snapshot.tasks_completed;
        self.tasks_failed = snapshot.tasks_failed;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    /// Assigned agent
    pub assigned_to: Option<NodeId>,
    pub input_task_ids: Vec<NodeId>,
    pub combiner_id: Option<NodeId>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Bounded execution log (oldest first)
    pub log: VecDeque<ExecutionEntry>,
}

impl TaskNode {
    /// Replace every server-owned field; the log is kept
    pub fn apply_snapshot(&mut self, snapshot: &TaskSnapshot) {
        self.title = snapshot.title.clone();
        self.description = snapshot.description.clone();
        self.status = snapshot.status;
        self.assigned_to = snapshot.to.clone();
        self.input_task_ids = snapshot.input_task_ids.clone();
        self.combiner_id = snapshot.combiner_id.clone();
        self.result = snapshot.result.clone();
        self.error = snapshot.error.clone();
        self.started_at = snapshot.started_at;
        self.completed_at = snapshot.completed_at;
    }

    /// Append to the log, dropping the oldest entries beyond `cap`
    pub fn push_log(&mut self, entry: ExecutionEntry, cap: usize) {
        self.log.push_back(entry);
        while self.log.len() > cap {
            self.log.pop_front();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombinerNode {
    pub mode: CombinerMode,
    pub status: CombinerStatus,
    /// Input port ids in order (`in-0`, `in-1`, ...); never empty
    pub input_ports: Vec<String>,
    pub result: Option<String>,
}

impl CombinerNode {
    pub fn new(mode: CombinerMode) -> Self {
        Self {
            mode,
            status: CombinerStatus::Idle,
            input_ports: vec![combiner_port_id(0)],
            result: None,
        }
    }

    fn grow_to(&mut self, count: usize) {
        while self.input_ports.len() < count.max(1) {
            let next = combiner_port_id(self.input_ports.len());
            self.input_ports.push(next);
        }
    }
}

pub fn combiner_port_id(index: usize) -> String {
    format!("in-{}", index)
}

/// Variant-specific node data
#[derive(Debug, Clone, PartialEq)]
pub enum NodeBody {
    Agent(AgentNode),
    Task(TaskNode),
    Combiner(CombinerNode),
}

/// A positioned scene node
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Stored top-left world position; `None` until placed
    pub position: Option<Pos2>,
    /// Deterministic slot drawn while `position` is `None`
    pub fallback: Pos2,
    pub size: Vec2,
    pub body: NodeBody,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self.body {
            NodeBody::Agent(_) => NodeKind::Agent,
            NodeBody::Task(_) => NodeKind::Task,
            NodeBody::Combiner(_) => NodeKind::Combiner,
        }
    }

    /// Where the node is drawn and hit-tested
    pub fn display_position(&self) -> Pos2 {
        self.position.unwrap_or(self.fallback)
    }

    pub fn rect(&self) -> egui::Rect {
        egui::Rect::from_min_size(self.display_position(), self.size)
    }

    /// Display status label for the renderer
    pub fn status_label(&self) -> &'static str {
        match &self.body {
            NodeBody::Agent(agent) => match agent.status {
                AgentStatus::Idle => "idle",
                AgentStatus::Busy => "busy",
                AgentStatus::Offline => "offline",
            },
            NodeBody::Task(task) => task.status.as_str(),
            NodeBody::Combiner(combiner) => match combiner.status {
                CombinerStatus::Idle => "idle",
                CombinerStatus::Running => "running",
                CombinerStatus::Completed => "completed",
                CombinerStatus::Failed => "failed",
            },
        }
    }

    pub fn as_task(&self) -> Option<&TaskNode> {
        match &self.body {
            NodeBody::Task(task) => Some(task),
            _ => None,
        }
    }

    pub fn as_task_mut(&mut self) -> Option<&mut TaskNode> {
        match &mut self.body {
            NodeBody::Task(task) => Some(task),
            _ => None,
        }
    }

    pub fn as_agent(&self) -> Option<&AgentNode> {
        match &self.body {
            NodeBody::Agent(agent) => Some(agent),
            _ => None,
        }
    }

    pub fn as_combiner(&self) -> Option<&CombinerNode> {
        match &self.body {
            NodeBody::Combiner(combiner) => Some(combiner),
            _ => None,
        }
    }

    /// Does this node own a port with this id and direction?
    pub fn has_port(&self, port_id: &str, direction: PortDirection) -> bool {
        match (direction, &self.body) {
            (PortDirection::Output, _) => port_id == OUTPUT_PORT,
            (PortDirection::Input, NodeBody::Combiner(combiner)) => {
                combiner.input_ports.iter().any(|p| p == port_id)
            }
            (PortDirection::Input, _) => port_id == INPUT_PORT,
        }
    }

    /// All ports of this node, inputs first
    pub fn ports(&self) -> Vec<PortRef> {
        let mut ports = match &self.body {
            NodeBody::Combiner(combiner) => combiner
                .input_ports
                .iter()
                .map(|p| PortRef::input(self.id.clone(), p.clone()))
                .collect(),
            _ => vec![PortRef::input(self.id.clone(), INPUT_PORT)],
        };
        ports.push(PortRef::output(self.id.clone()));
        ports
    }
}

// =============================================================================
// SCENE MODEL
// =============================================================================

/// In-memory graph: nodes in draw order plus connections
#[derive(Debug, Clone)]
pub struct SceneModel {
    nodes: Vec<Node>,
    /// id -> index into `nodes`
    index: HashMap<NodeId, usize>,
    connections: Vec<Connection>,
    progress: WorkspaceProgress,
    /// Persisted positions for nodes that have not materialized yet
    saved_positions: HashMap<NodeId, Pos2>,
    /// Per-kind insertion counters for fallback slots
    slots_used: HashMap<NodeKind, usize>,
    /// Bumped on every mutation; spatial index rebuilds when it changes
    revision: u64,
    geometry: GeometrySettings,
    layout: LayoutSettings,
}

impl Default for SceneModel {
    fn default() -> Self {
        Self::new(GeometrySettings::default(), LayoutSettings::default())
    }
}

impl SceneModel {
    pub fn new(geometry: GeometrySettings, layout: LayoutSettings) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            connections: Vec::new(),
            progress: WorkspaceProgress::default(),
            saved_positions: HashMap::new(),
            slots_used: HashMap::new(),
            revision: 0,
            geometry,
            layout,
        }
    }

    // =========================================================================
    // READ ACCESS
    // =========================================================================

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn geometry(&self) -> &GeometrySettings {
        &self.geometry
    }

    pub fn progress(&self) -> WorkspaceProgress {
        self.progress
    }

    /// Nodes in draw order (later nodes are on top)
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Draw order index of a node
    pub fn order_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn task(&self, id: &str) -> Option<&TaskNode> {
        self.node(id).and_then(Node::as_task)
    }

    pub fn agent(&self, id: &str) -> Option<&AgentNode> {
        self.node(id).and_then(Node::as_agent)
    }

    pub fn combiner(&self, id: &str) -> Option<&CombinerNode> {
        self.node(id).and_then(Node::as_combiner)
    }

    pub fn kind_of(&self, id: &str) -> Option<NodeKind> {
        self.node(id).map(Node::kind)
    }

    pub fn ids_of_kind(&self, kind: NodeKind) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.kind() == kind)
            .map(|n| n.id.clone())
            .collect()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// The connection feeding an input port, if any
    pub fn incoming(&self, node_id: &str, port_id: &str) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.to_node == node_id && c.to_port == port_id)
    }

    // =========================================================================
    // NODE MUTATION
    // =========================================================================

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        let i = *self.index.get(id)?;
        self.revision += 1;
        Some(&mut self.nodes[i])
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut TaskNode> {
        self.node_mut(id).and_then(Node::as_task_mut)
    }

    pub fn set_progress(&mut self, progress: WorkspaceProgress) {
        self.progress = progress;
        self.revision += 1;
    }

    /// Insert a node. Returns `false` (and leaves the scene untouched) when
    /// the id is already taken by any node.
    ///
    /// A node without a position picks up a persisted one if present, and
    /// always gets a fallback slot.
    pub fn insert(&mut self, mut node: Node) -> bool {
        if self.index.contains_key(&node.id) {
            tracing::warn!(node_id = %node.id, "Duplicate node id rejected");
            return false;
        }
        if node.position.is_none() {
            node.position = self.saved_positions.remove(&node.id);
        }
        let kind = node.kind();
        let ordinal = self.slots_used.entry(kind).or_insert(0);
        node.fallback = fallback_slot(&self.layout, kind, *ordinal);
        *ordinal += 1;

        tracing::debug!(node_id = %node.id, ?kind, "Node inserted");
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        self.revision += 1;
        true
    }

    pub fn insert_agent(&mut self, snapshot: &AgentSnapshot) -> bool {
        let mut agent = AgentNode {
            role: None,
            status: AgentStatus::Idle,
            current_task_ids: Vec::new(),
            queued_task_ids: Vec::new(),
            tasks_completed: 0,
            tasks_failed: 0,
        };
        agent.apply_stats(snapshot);
        let node = Node {
            id: snapshot.name.clone(),
            position: snapshot.x.zip(snapshot.y).map(|(x, y)| Pos2::new(x, y)),
            fallback: Pos2::ZERO,
            size: size_of(self.geometry.agent_size),
            body: NodeBody::Agent(agent),
        };
        self.insert(node)
    }

    pub fn insert_task(&mut self, snapshot: &TaskSnapshot) -> bool {
        let mut task = TaskNode {
            title: String::new(),
            description: None,
            status: TaskStatus::Pending,
            assigned_to: None,
            input_task_ids: Vec::new(),
            combiner_id: None,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
            log: VecDeque::new(),
        };
        task.apply_snapshot(snapshot);
        let node = Node {
            id: snapshot.id.clone(),
            position: snapshot.position().map(|(x, y)| Pos2::new(x, y)),
            fallback: Pos2::ZERO,
            size: size_of(self.geometry.task_size),
            body: NodeBody::Task(task),
        };
        self.insert(node)
    }

    pub fn insert_combiner(&mut self, snapshot: &CombinerSnapshot) -> bool {
        let mut combiner = CombinerNode::new(snapshot.mode);
        combiner.status = snapshot.status;
        combiner.result = snapshot.result.clone();
        combiner.grow_to(snapshot.input_ports);
        let node = Node {
            id: snapshot.id.clone(),
            position: snapshot.x.zip(snapshot.y).map(|(x, y)| Pos2::new(x, y)),
            fallback: Pos2::ZERO,
            size: combiner_size(&self.geometry, combiner.input_ports.len()),
            body: NodeBody::Combiner(combiner),
        };
        self.insert(node)
    }

    /// Remove a node and every connection touching it
    pub fn remove(&mut self, id: &str) -> Option<(Node, Vec<Connection>)> {
        let i = self.index.remove(id)?;
        let node = self.nodes.remove(i);
        for (idx, n) in self.nodes.iter().enumerate().skip(i) {
            self.index.insert(n.id.clone(), idx);
        }
        let (dropped, kept): (Vec<_>, Vec<_>) = self
            .connections
            .drain(..)
            .partition(|c| c.touches(id));
        self.connections = kept;
        self.revision += 1;
        tracing::debug!(node_id = %id, connections = dropped.len(), "Node removed");
        Some((node, dropped))
    }

    /// Store a position
    pub fn set_position(&mut self, id: &str, pos: Pos2) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.position = Some(pos);
                true
            }
            None => false,
        }
    }

    /// Move a node by a world delta, storing the result
    pub fn translate(&mut self, id: &str, delta: Vec2) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.position = Some(node.display_position() + delta);
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // PERSISTED LAYOUT
    // =========================================================================

    /// Seed stored positions from a persisted layout. Nodes present now are
    /// moved; the rest are remembered until they materialize.
    pub fn apply_saved_layout(&mut self, layout: &PersistedLayout) -> usize {
        let mut applied = 0;
        for (id, saved) in &layout.positions {
            let pos = Pos2::new(saved.x, saved.y);
            if self.set_position(id, pos) {
                applied += 1;
            } else {
                self.saved_positions.insert(id.clone(), pos);
            }
        }
        applied
    }

    /// Every stored position, for saving
    pub fn stored_positions(&self) -> BTreeMap<NodeId, SavedPosition> {
        self.nodes
            .iter()
            .filter_map(|n| {
                n.position
                    .map(|p| (n.id.clone(), SavedPosition { x: p.x, y: p.y }))
            })
            .collect()
    }

    // =========================================================================
    // CONNECTIONS
    // =========================================================================

    /// Validate and add a connection
    pub fn connect(&mut self, connection: Connection) -> Result<(), ConnectionError> {
        if connection.from_node == connection.to_node {
            return Err(ConnectionError::SelfLoop(connection.from_node));
        }
        let from = self
            .node(&connection.from_node)
            .ok_or_else(|| ConnectionError::UnknownNode(connection.from_node.clone()))?;
        if !from.has_port(&connection.from_port, PortDirection::Output) {
            return Err(ConnectionError::UnknownPort {
                node: connection.from_node.clone(),
                port: connection.from_port.clone(),
                direction: PortDirection::Output,
            });
        }
        let to = self
            .node(&connection.to_node)
            .ok_or_else(|| ConnectionError::UnknownNode(connection.to_node.clone()))?;
        if !to.has_port(&connection.to_port, PortDirection::Input) {
            return Err(ConnectionError::UnknownPort {
                node: connection.to_node.clone(),
                port: connection.to_port.clone(),
                direction: PortDirection::Input,
            });
        }
        if self
            .incoming(&connection.to_node, &connection.to_port)
            .is_some()
        {
            return Err(ConnectionError::PortOccupied {
                node: connection.to_node,
                port: connection.to_port,
            });
        }

        tracing::debug!(
            from = %connection.from_node,
            to = %connection.to_node,
            port = %connection.to_port,
            "Connection added"
        );
        self.connections.push(connection);
        self.revision += 1;
        Ok(())
    }

    pub fn disconnect(&mut self, connection: &Connection) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c != connection);
        let removed = self.connections.len() != before;
        if removed {
            self.revision += 1;
        }
        removed
    }

    /// First free input port of a combiner, growing the port list when all
    /// are taken
    pub fn claim_combiner_port(&mut self, combiner_id: &str) -> Option<String> {
        let combiner = self.combiner(combiner_id)?;
        if let Some(free) = combiner
            .input_ports
            .iter()
            .find(|p| self.incoming(combiner_id, p).is_none())
        {
            return Some(free.clone());
        }
        self.add_combiner_port(combiner_id)
    }

    /// Append one input port to a combiner
    pub fn add_combiner_port(&mut self, combiner_id: &str) -> Option<String> {
        let geometry = self.geometry.clone();
        let node = self.node_mut(combiner_id)?;
        let NodeBody::Combiner(combiner) = &mut node.body else {
            return None;
        };
        let port = combiner_port_id(combiner.input_ports.len());
        combiner.input_ports.push(port.clone());
        node.size = combiner_size(&geometry, combiner.input_ports.len());
        tracing::debug!(combiner_id = %combiner_id, port = %port, "Combiner port added");
        Some(port)
    }

    /// Task ids feeding a combiner, in port order
    pub fn combiner_inputs(&self, combiner_id: &str) -> Vec<NodeId> {
        let Some(combiner) = self.combiner(combiner_id) else {
            return Vec::new();
        };
        combiner
            .input_ports
            .iter()
            .filter_map(|p| self.incoming(combiner_id, p))
            .filter(|c| self.kind_of(&c.from_node) == Some(NodeKind::Task))
            .map(|c| c.from_node.clone())
            .collect()
    }
}

fn size_of(size: [f32; 2]) -> Vec2 {
    Vec2::new(size[0], size[1])
}

/// Combiner height grows with its port count
fn combiner_size(geometry: &GeometrySettings, ports: usize) -> Vec2 {
    let base = size_of(geometry.combiner_size);
    let needed = (ports as f32 + 1.0) * geometry.combiner_port_spacing;
    Vec2::new(base.x, base.y.max(needed))
}
