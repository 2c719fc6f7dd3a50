//! Interaction controller - pointer and keyboard state machine
//!
//! Turns raw [`CanvasInput`] into scene edits, viewport changes and
//! [`Effect`]s. Exactly one [`InteractionState`] is active at a time;
//! entering a new one cancels the previous one. Overlays (help, context
//! menu, modal form) sit above all of it and swallow presses while open.
//!
//! # Press precedence (first match wins)
//!
//! 1. Help overlay, dismissed by any press
//! 2. Context menu: item dispatches, anywhere else closes
//! 3. Modal form: close / submit / checkbox / field, outside closes
//! 4. Port hotspot
//! 5. Combiner buttons, then 6. combiner body
//! 7. Space held: pan
//! 8. Task card buttons, then card body
//! 9. Agent delete button, then agent body
//! 10. Empty canvas: pan

use egui::{CursorIcon, Pos2, Vec2};
use taskgraph_types::{
    AgentSnapshot, CanvasIntent, CombinerMode, CombinerSnapshot, CombinerStatus, TaskPatch,
    TaskStatus,
};
use uuid::Uuid;

use super::geometry::{agent_delete_at, combiner_button_at, task_button_at, CombinerButton, TaskButton};
use super::overlay::{ContextMenu, FormHit, FormSubmission, MenuAction, ModalForm};
use super::scene::{
    Connection, NodeBody, NodeId, NodeKind, PortDirection, PortRef, SceneModel, INPUT_PORT,
};
use super::spatial::SpatialIndex;
use super::viewport::Viewport;
use crate::config::{InteractionSettings, ViewportSettings};

// =============================================================================
// RAW INPUT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Backspace,
    Space,
    /// Printable character
    Char(char),
}

/// Input event in screen coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasInput {
    PointerDown { pos: Pos2, button: PointerButton },
    PointerMove { pos: Pos2 },
    PointerUp { pos: Pos2, button: PointerButton },
    /// Positive `delta_y` zooms in
    Scroll { pos: Pos2, delta_y: f32 },
    KeyDown(Key),
    KeyUp(Key),
    Resized { width: f32, height: f32 },
}

impl CanvasInput {
    pub fn press(x: f32, y: f32) -> Self {
        CanvasInput::PointerDown {
            pos: Pos2::new(x, y),
            button: PointerButton::Primary,
        }
    }

    pub fn release(x: f32, y: f32) -> Self {
        CanvasInput::PointerUp {
            pos: Pos2::new(x, y),
            button: PointerButton::Primary,
        }
    }

    pub fn move_to(x: f32, y: f32) -> Self {
        CanvasInput::PointerMove {
            pos: Pos2::new(x, y),
        }
    }

    pub fn secondary_press(x: f32, y: f32) -> Self {
        CanvasInput::PointerDown {
            pos: Pos2::new(x, y),
            button: PointerButton::Secondary,
        }
    }

    pub fn scroll(delta_y: f32, x: f32, y: f32) -> Self {
        CanvasInput::Scroll {
            pos: Pos2::new(x, y),
            delta_y,
        }
    }

    pub fn key(key: Key) -> Self {
        CanvasInput::KeyDown(key)
    }
}

// =============================================================================
// STATE & EFFECTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    PanningCanvas {
        /// Last pointer position (screen)
        last: Pos2,
    },
    DraggingNode {
        node_id: NodeId,
        last_world: Pos2,
        moved: bool,
    },
    DraggingConnection {
        origin: PortRef,
        cursor_world: Pos2,
    },
    /// Next agent or combiner click receives the task
    AssignmentMode {
        task_id: NodeId,
        cursor_world: Pos2,
    },
    /// Task clicks join the combiner until toggled off
    CombinerAssignMode { combiner_id: NodeId },
}

impl InteractionState {
    pub fn name(&self) -> &'static str {
        match self {
            InteractionState::Idle => "idle",
            InteractionState::PanningCanvas { .. } => "panning",
            InteractionState::DraggingNode { .. } => "dragging_node",
            InteractionState::DraggingConnection { .. } => "dragging_connection",
            InteractionState::AssignmentMode { .. } => "assignment",
            InteractionState::CombinerAssignMode { .. } => "combiner_assign",
        }
    }

    /// Node the state refers to, if any
    fn subject(&self) -> Option<&str> {
        match self {
            InteractionState::Idle | InteractionState::PanningCanvas { .. } => None,
            InteractionState::DraggingNode { node_id, .. } => Some(node_id.as_str()),
            InteractionState::DraggingConnection { origin, .. } => Some(origin.node_id.as_str()),
            InteractionState::AssignmentMode { task_id, .. } => Some(task_id.as_str()),
            InteractionState::CombinerAssignMode { combiner_id } => Some(combiner_id.as_str()),
        }
    }
}

/// Output of one input turn
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Mutation for the backend
    Request(CanvasIntent),
    ShowTaskDetails(NodeId),
    ShowTaskLog(NodeId),
    /// Message for the user
    Notice(String),
    /// Emit a `save_layout` request (resolved by the engine)
    PersistLayout,
    /// Run levelled auto-layout (resolved by the engine)
    AutoLayout,
}

// =============================================================================
// CONTROLLER
// =============================================================================

#[derive(Debug, Clone)]
pub struct InteractionController {
    state: InteractionState,
    help_visible: bool,
    menu: Option<ContextMenu>,
    form: Option<ModalForm>,
    space_held: bool,
    hovered: Option<NodeId>,
    screen_size: Vec2,
    settings: InteractionSettings,
    zoom_step: f32,
    index: SpatialIndex,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(InteractionSettings::default(), &ViewportSettings::default())
    }
}

impl InteractionController {
    pub fn new(settings: InteractionSettings, viewport: &ViewportSettings) -> Self {
        Self {
            state: InteractionState::Idle,
            help_visible: false,
            menu: None,
            form: None,
            space_held: false,
            hovered: None,
            screen_size: Vec2::new(1280.0, 800.0),
            settings,
            zoom_step: viewport.zoom_step,
            index: SpatialIndex::new(),
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn help_visible(&self) -> bool {
        self.help_visible
    }

    pub fn context_menu(&self) -> Option<&ContextMenu> {
        self.menu.as_ref()
    }

    pub fn form(&self) -> Option<&ModalForm> {
        self.form.as_ref()
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn screen_size(&self) -> Vec2 {
        self.screen_size
    }

    /// Cursor hint for the current mode
    pub fn cursor_for_state(&self) -> CursorIcon {
        if self.help_visible || self.menu.is_some() || self.form.is_some() {
            return CursorIcon::Default;
        }
        match &self.state {
            InteractionState::PanningCanvas { .. } | InteractionState::DraggingNode { .. } => {
                CursorIcon::Grabbing
            }
            InteractionState::DraggingConnection { .. } => CursorIcon::Crosshair,
            InteractionState::AssignmentMode { .. }
            | InteractionState::CombinerAssignMode { .. } => CursorIcon::Alias,
            InteractionState::Idle if self.space_held => CursorIcon::Grab,
            InteractionState::Idle if self.hovered.is_some() => CursorIcon::PointingHand,
            InteractionState::Idle => CursorIcon::Default,
        }
    }

    /// Process one input. Returns true if the canvas needs a repaint.
    pub fn handle_input(
        &mut self,
        input: &CanvasInput,
        scene: &mut SceneModel,
        viewport: &mut Viewport,
        effects: &mut Vec<Effect>,
    ) -> bool {
        match input {
            CanvasInput::PointerDown { pos, button } => {
                self.on_press(*pos, *button, scene, viewport, effects)
            }
            CanvasInput::PointerMove { pos } => self.on_move(*pos, scene, viewport),
            CanvasInput::PointerUp { pos, .. } => self.on_release(*pos, scene, viewport, effects),
            CanvasInput::Scroll { pos, delta_y } => {
                if self.help_visible || self.form.is_some() || *delta_y == 0.0 {
                    return false;
                }
                let factor = if *delta_y > 0.0 {
                    self.zoom_step
                } else {
                    1.0 / self.zoom_step
                };
                viewport.zoom_at(*pos, factor);
                true
            }
            CanvasInput::KeyDown(key) => self.on_key_down(*key, scene, effects),
            CanvasInput::KeyUp(Key::Space) => {
                self.space_held = false;
                false
            }
            CanvasInput::KeyUp(_) => false,
            CanvasInput::Resized { width, height } => {
                self.screen_size = Vec2::new(*width, *height);
                true
            }
        }
    }

    /// Drop any reference to a node that no longer exists
    pub fn forget(&mut self, node_id: &str) {
        if self.state.subject() == Some(node_id) {
            self.enter(InteractionState::Idle);
        }
        if self.hovered.as_deref() == Some(node_id) {
            self.hovered = None;
        }
    }

    /// Forget nodes the scene no longer has (after remote removals)
    pub fn prune(&mut self, scene: &SceneModel) {
        let stale = self
            .state
            .subject()
            .filter(|id| !scene.contains(id))
            .map(str::to_string);
        if let Some(id) = stale {
            tracing::debug!(node_id = %id, "Interaction target removed remotely");
            self.forget(&id);
        }
        if self.hovered.as_deref().is_some_and(|id| !scene.contains(id)) {
            self.hovered = None;
        }
    }

    fn enter(&mut self, state: InteractionState) {
        if self.state.name() != state.name() {
            tracing::debug!(from = self.state.name(), to = state.name(), "Interaction state");
        }
        self.state = state;
    }

    fn sync_index(&mut self, scene: &SceneModel) {
        self.index.sync(scene, self.settings.port_radius);
    }

    // =========================================================================
    // PRESS
    // =========================================================================

    fn on_press(
        &mut self,
        screen: Pos2,
        button: PointerButton,
        scene: &mut SceneModel,
        viewport: &mut Viewport,
        effects: &mut Vec<Effect>,
    ) -> bool {
        if self.help_visible {
            self.help_visible = false;
            return true;
        }
        if let Some(menu) = self.menu.take() {
            if let Some(action) = menu.action_at(screen).cloned() {
                self.run_menu_action(action, menu.world_anchor, scene, effects);
            }
            return true;
        }
        if self.form.is_some() {
            self.on_form_press(screen, scene, effects);
            return true;
        }

        let world = viewport.screen_to_world(screen);
        self.sync_index(scene);

        match button {
            PointerButton::Secondary => {
                self.open_menu(screen, world, scene);
                return true;
            }
            PointerButton::Middle => {
                self.enter(InteractionState::PanningCanvas { last: screen });
                return true;
            }
            PointerButton::Primary => {}
        }

        // A wire still held (release missed) completes here
        if let InteractionState::DraggingConnection { origin, .. } = &self.state {
            let origin = origin.clone();
            self.enter(InteractionState::Idle);
            self.finish_connection(origin, world, scene, effects);
            return true;
        }

        if let Some((port, kind)) = self.index.port_at(world) {
            self.press_port(port, kind, world, scene, effects);
            return true;
        }
        if let Some(id) = self.index.body_at(world, NodeKind::Combiner) {
            self.press_combiner(&id, world, scene, effects);
            return true;
        }
        if self.space_held {
            self.enter(InteractionState::PanningCanvas { last: screen });
            return true;
        }
        if let Some(id) = self.index.body_at(world, NodeKind::Task) {
            self.press_task(&id, world, scene, effects);
            return true;
        }
        if let Some(id) = self.index.body_at(world, NodeKind::Agent) {
            self.press_agent(&id, world, scene, effects);
            return true;
        }
        self.enter(InteractionState::PanningCanvas { last: screen });
        true
    }

    fn press_port(
        &mut self,
        port: PortRef,
        kind: NodeKind,
        world: Pos2,
        scene: &mut SceneModel,
        effects: &mut Vec<Effect>,
    ) {
        if kind == NodeKind::Combiner {
            if let InteractionState::AssignmentMode { task_id, .. } = &self.state {
                let task_id = task_id.clone();
                // Only an input port names the slot to wire into
                let slot = (port.direction == PortDirection::Input).then_some(port.port_id);
                self.assign_to_combiner(&task_id, &port.node_id, slot, scene, effects);
                self.enter(InteractionState::Idle);
                return;
            }
        }
        self.enter(InteractionState::DraggingConnection {
            origin: port,
            cursor_world: world,
        });
    }

    fn press_combiner(
        &mut self,
        id: &str,
        world: Pos2,
        scene: &mut SceneModel,
        effects: &mut Vec<Effect>,
    ) {
        let Some(body) = scene.node(id).map(|n| n.rect()) else {
            return;
        };
        match combiner_button_at(body, world) {
            Some(CombinerButton::Delete) => self.delete_node(id, scene, effects),
            Some(CombinerButton::Run) => run_combiner(id, scene, effects),
            Some(CombinerButton::Collect) => {
                let active = matches!(
                    &self.state,
                    InteractionState::CombinerAssignMode { combiner_id } if combiner_id == id
                );
                if active {
                    self.enter(InteractionState::Idle);
                } else {
                    self.enter(InteractionState::CombinerAssignMode {
                        combiner_id: id.to_string(),
                    });
                }
            }
            None => {
                if let InteractionState::AssignmentMode { task_id, .. } = &self.state {
                    let task_id = task_id.clone();
                    self.assign_to_combiner(&task_id, id, None, scene, effects);
                    self.enter(InteractionState::Idle);
                } else {
                    self.start_node_drag(id, world);
                }
            }
        }
    }

    fn press_task(
        &mut self,
        id: &str,
        world: Pos2,
        scene: &mut SceneModel,
        effects: &mut Vec<Effect>,
    ) {
        let Some(node) = scene.node(id) else {
            return;
        };
        let card = node.rect();
        let status = node.as_task().map(|t| t.status).unwrap_or_default();

        if let Some(button) = task_button_at(card, status, world) {
            match button {
                TaskButton::Delete => self.delete_node(id, scene, effects),
                TaskButton::Execute | TaskButton::Rerun => execute_task(id, scene, effects),
                TaskButton::Assign => self.enter(InteractionState::AssignmentMode {
                    task_id: id.to_string(),
                    cursor_world: world,
                }),
                TaskButton::ViewLog => effects.push(Effect::ShowTaskLog(id.to_string())),
            }
            return;
        }

        if let InteractionState::CombinerAssignMode { combiner_id } = &self.state {
            let combiner_id = combiner_id.clone();
            self.assign_to_combiner(id, &combiner_id, None, scene, effects);
            return;
        }
        self.start_node_drag(id, world);
    }

    fn press_agent(
        &mut self,
        id: &str,
        world: Pos2,
        scene: &mut SceneModel,
        effects: &mut Vec<Effect>,
    ) {
        let Some(body) = scene.node(id).map(|n| n.rect()) else {
            return;
        };
        if agent_delete_at(body, world) {
            self.delete_node(id, scene, effects);
            return;
        }
        if let InteractionState::AssignmentMode { task_id, .. } = &self.state {
            let task_id = task_id.clone();
            assign_to_agent(&task_id, id, scene, effects);
            self.enter(InteractionState::Idle);
            return;
        }
        self.start_node_drag(id, world);
    }

    fn start_node_drag(&mut self, id: &str, world: Pos2) {
        self.enter(InteractionState::DraggingNode {
            node_id: id.to_string(),
            last_world: world,
            moved: false,
        });
    }

    // =========================================================================
    // MOVE & RELEASE
    // =========================================================================

    fn on_move(&mut self, screen: Pos2, scene: &mut SceneModel, viewport: &mut Viewport) -> bool {
        let world = viewport.screen_to_world(screen);
        match &mut self.state {
            InteractionState::PanningCanvas { last } => {
                let delta = screen - *last;
                *last = screen;
                viewport.pan(delta);
                delta != Vec2::ZERO
            }
            InteractionState::DraggingNode {
                node_id,
                last_world,
                moved,
            } => {
                let delta = world - *last_world;
                if delta == Vec2::ZERO {
                    return false;
                }
                scene.translate(node_id, delta);
                *last_world = world;
                *moved = true;
                true
            }
            InteractionState::DraggingConnection { cursor_world, .. }
            | InteractionState::AssignmentMode { cursor_world, .. } => {
                *cursor_world = world;
                true
            }
            InteractionState::Idle | InteractionState::CombinerAssignMode { .. } => {
                self.index.sync(scene, self.settings.port_radius);
                let hovered = self.index.any_body_at(world).map(|(id, _)| id);
                let changed = hovered != self.hovered;
                self.hovered = hovered;
                changed
            }
        }
    }

    fn on_release(
        &mut self,
        screen: Pos2,
        scene: &mut SceneModel,
        viewport: &Viewport,
        effects: &mut Vec<Effect>,
    ) -> bool {
        let world = viewport.screen_to_world(screen);
        match std::mem::take(&mut self.state) {
            InteractionState::DraggingConnection { origin, .. } => {
                tracing::debug!(from = "dragging_connection", to = "idle", "Interaction state");
                self.finish_connection(origin, world, scene, effects);
                true
            }
            InteractionState::DraggingNode { node_id, moved, .. } => {
                if moved {
                    effects.push(Effect::PersistLayout);
                } else if scene.kind_of(&node_id) == Some(NodeKind::Task) {
                    effects.push(Effect::ShowTaskDetails(node_id));
                }
                true
            }
            InteractionState::PanningCanvas { .. } => true,
            // Click modes outlive the release that entered them
            mode @ (InteractionState::AssignmentMode { .. }
            | InteractionState::CombinerAssignMode { .. }) => {
                self.state = mode;
                false
            }
            InteractionState::Idle => false,
        }
    }

    /// Resolve the drop target of a wire and connect
    fn finish_connection(
        &mut self,
        origin: PortRef,
        world: Pos2,
        scene: &mut SceneModel,
        effects: &mut Vec<Effect>,
    ) {
        self.sync_index(scene);
        let target = if let Some((port, _)) = self.index.port_at(world) {
            Some(port)
        } else if let Some(agent) = self.index.body_at(world, NodeKind::Agent) {
            Some(PortRef::input(agent, INPUT_PORT))
        } else if let Some(combiner) = self.index.body_at(world, NodeKind::Combiner) {
            // Only grow a port for a wire that can land on it
            if combiner != origin.node_id && origin.direction == PortDirection::Output {
                scene
                    .claim_combiner_port(&combiner)
                    .map(|port| PortRef::input(combiner, port))
            } else {
                None
            }
        } else {
            self.index
                .nearest_input(world, NodeKind::Agent, self.settings.snap_radius)
        };

        match target {
            Some(target) => {
                if connect(origin, target, scene, effects) {
                    effects.push(Effect::PersistLayout);
                }
            }
            None => tracing::debug!(node_id = %origin.node_id, "Wire dropped without target"),
        }
    }

    // =========================================================================
    // KEYBOARD
    // =========================================================================

    fn on_key_down(&mut self, key: Key, scene: &mut SceneModel, effects: &mut Vec<Effect>) -> bool {
        if let Some(form) = self.form.as_mut().filter(|f| f.has_focus()) {
            match key {
                Key::Backspace => form.backspace(),
                Key::Enter | Key::Escape => form.blur(),
                Key::Space => form.type_char(' '),
                Key::Char(c) => form.type_char(c),
            }
            return true;
        }

        match key {
            Key::Escape => self.cancel_one(),
            Key::Char('h') | Key::Char('H') => {
                self.help_visible = !self.help_visible;
                true
            }
            Key::Space => {
                self.space_held = true;
                false
            }
            Key::Enter if self.form.is_some() => {
                self.submit_form(scene, effects);
                true
            }
            _ => false,
        }
    }

    /// Escape: cancel the topmost cancellable thing
    fn cancel_one(&mut self) -> bool {
        if self.help_visible {
            self.help_visible = false;
            return true;
        }
        if self.menu.take().is_some() || self.form.take().is_some() {
            return true;
        }
        match self.state {
            InteractionState::AssignmentMode { .. }
            | InteractionState::CombinerAssignMode { .. }
            | InteractionState::DraggingConnection { .. } => {
                self.enter(InteractionState::Idle);
                true
            }
            _ => false,
        }
    }

    // =========================================================================
    // OVERLAYS
    // =========================================================================

    fn open_menu(&mut self, screen: Pos2, world: Pos2, scene: &SceneModel) {
        self.enter(InteractionState::Idle);
        self.menu = match self.index.any_body_at(world) {
            Some((id, _)) => ContextMenu::for_node(scene, &id, screen, world),
            None => Some(ContextMenu::for_canvas(screen, world)),
        };
    }

    fn run_menu_action(
        &mut self,
        action: MenuAction,
        world: Pos2,
        scene: &mut SceneModel,
        effects: &mut Vec<Effect>,
    ) {
        match action {
            MenuAction::AddAgent => self.form = Some(ModalForm::add_agent(self.screen_size, world)),
            MenuAction::CreateTask => {
                self.form = Some(ModalForm::create_task(self.screen_size, world))
            }
            MenuAction::AddCombiner => add_combiner(world, scene, effects),
            MenuAction::AutoLayout => effects.push(Effect::AutoLayout),
            MenuAction::SaveLayout => effects.push(Effect::PersistLayout),
            MenuAction::ExecuteTask(id) => execute_task(&id, scene, effects),
            MenuAction::ViewLog(id) => effects.push(Effect::ShowTaskLog(id)),
            MenuAction::DeleteNode(id) => self.delete_node(&id, scene, effects),
        }
    }

    fn on_form_press(&mut self, screen: Pos2, scene: &mut SceneModel, effects: &mut Vec<Effect>) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        match form.hit(screen) {
            FormHit::Outside | FormHit::Close => self.form = None,
            FormHit::Submit => self.submit_form(scene, effects),
            FormHit::Checkbox => form.toggle_checkbox(),
            FormHit::Field(index) => form.focus(index),
            FormHit::Inside => form.blur(),
        }
    }

    fn submit_form(&mut self, scene: &mut SceneModel, effects: &mut Vec<Effect>) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        let submission = match form.validate() {
            Ok(submission) => submission,
            Err(message) => {
                form.error = Some(message.clone());
                effects.push(Effect::Notice(message));
                return;
            }
        };
        self.form = None;

        match submission {
            FormSubmission::AddAgent {
                name,
                role,
                world_pos,
            } => {
                let snapshot = AgentSnapshot {
                    role: role.clone(),
                    x: Some(world_pos.x),
                    y: Some(world_pos.y),
                    ..AgentSnapshot::named(name.clone())
                };
                if !scene.insert_agent(&snapshot) {
                    effects.push(Effect::Notice(format!("'{}' already exists", name)));
                    return;
                }
                effects.push(Effect::Request(CanvasIntent::CreateAgent { name, role }));
            }
            FormSubmission::CreateTask {
                title,
                description,
                agent,
                execute,
                world_pos,
            } => effects.push(Effect::Request(CanvasIntent::CreateTask {
                title,
                description,
                assigned_to: agent,
                execute,
                x: Some(world_pos.x),
                y: Some(world_pos.y),
            })),
        }
    }

    // =========================================================================
    // EDITS
    // =========================================================================

    /// Optimistic delete: local removal plus the matching requests
    fn delete_node(&mut self, id: &str, scene: &mut SceneModel, effects: &mut Vec<Effect>) {
        let Some((node, dropped)) = scene.remove(id) else {
            return;
        };
        for connection in dropped {
            effects.push(Effect::Request(CanvasIntent::DeleteConnection {
                from_node: connection.from_node,
                from_port: connection.from_port,
                to_node: connection.to_node,
                to_port: connection.to_port,
            }));
        }

        let intent = match node.body {
            NodeBody::Task(_) => CanvasIntent::DeleteTask {
                task_id: node.id.clone(),
            },
            NodeBody::Agent(_) => CanvasIntent::DeleteAgent {
                name: node.id.clone(),
            },
            NodeBody::Combiner(_) => {
                for task_id in scene.ids_of_kind(NodeKind::Task) {
                    let owned = scene
                        .task(&task_id)
                        .is_some_and(|t| t.combiner_id.as_deref() == Some(id));
                    if owned {
                        if let Some(task) = scene.task_mut(&task_id) {
                            task.combiner_id = None;
                        }
                    }
                }
                CanvasIntent::DeleteCombiner {
                    combiner_id: node.id.clone(),
                }
            }
        };
        effects.push(Effect::Request(intent));
        self.forget(id);
    }

    fn assign_to_combiner(
        &mut self,
        task_id: &str,
        combiner_id: &str,
        port: Option<String>,
        scene: &mut SceneModel,
        effects: &mut Vec<Effect>,
    ) {
        if scene.combiner(combiner_id).is_none() {
            return;
        }
        let Some(task) = scene.task_mut(task_id) else {
            tracing::debug!(task_id = %task_id, "Assignment source is not a task");
            return;
        };
        task.combiner_id = Some(combiner_id.to_string());
        effects.push(Effect::Request(CanvasIntent::UpdateTask {
            task_id: task_id.to_string(),
            patch: TaskPatch::combine_into(combiner_id),
        }));

        let wired = scene
            .connections()
            .iter()
            .any(|c| c.from_node == task_id && c.to_node == combiner_id);
        if wired {
            return;
        }
        let port = port
            .filter(|p| scene.incoming(combiner_id, p).is_none())
            .or_else(|| scene.claim_combiner_port(combiner_id));
        if let Some(port) = port {
            connect(
                PortRef::output(task_id),
                PortRef::input(combiner_id, port),
                scene,
                effects,
            );
        }
    }
}

fn assign_to_agent(task_id: &str, agent_id: &str, scene: &mut SceneModel, effects: &mut Vec<Effect>) {
    let Some(task) = scene.task_mut(task_id) else {
        tracing::debug!(task_id = %task_id, "Assignment source is not a task");
        return;
    };
    task.assigned_to = Some(agent_id.to_string());
    tracing::debug!(task_id = %task_id, agent = %agent_id, "Task assigned");
    effects.push(Effect::Request(CanvasIntent::UpdateTask {
        task_id: task_id.to_string(),
        patch: TaskPatch::assign_to(agent_id),
    }));
}

/// Connect two ports, orienting the edge output -> input. Returns true when
/// a connection was created.
fn connect(a: PortRef, b: PortRef, scene: &mut SceneModel, effects: &mut Vec<Effect>) -> bool {
    let (from, to) = match (a.direction, b.direction) {
        (PortDirection::Output, PortDirection::Input) => (a, b),
        (PortDirection::Input, PortDirection::Output) => (b, a),
        _ => {
            tracing::debug!(a = %a.node_id, b = %b.node_id, "Ports face the same way");
            return false;
        }
    };
    let connection = Connection::new(&from, &to);
    if let Err(e) = scene.connect(connection.clone()) {
        tracing::debug!(error = %e, "Connection rejected");
        return false;
    }

    // Task -> task wires are dependencies
    let task_to_task = scene.kind_of(&from.node_id) == Some(NodeKind::Task)
        && scene.kind_of(&to.node_id) == Some(NodeKind::Task);
    if task_to_task {
        if let Some(task) = scene.task_mut(&to.node_id) {
            if !task.input_task_ids.contains(&from.node_id) {
                task.input_task_ids.push(from.node_id.clone());
            }
        }
    }

    effects.push(Effect::Request(CanvasIntent::CreateConnection {
        from_node: connection.from_node,
        from_port: connection.from_port,
        to_node: connection.to_node,
        to_port: connection.to_port,
    }));
    true
}

fn execute_task(id: &str, scene: &SceneModel, effects: &mut Vec<Effect>) {
    let Some(task) = scene.task(id) else {
        return;
    };
    if task.status == TaskStatus::InProgress {
        tracing::debug!(task_id = %id, "Task already running");
        return;
    }
    effects.push(Effect::Request(CanvasIntent::ExecuteTask {
        task_id: id.to_string(),
        rerun: task.status.is_finished(),
    }));
}

fn run_combiner(id: &str, scene: &mut SceneModel, effects: &mut Vec<Effect>) {
    let input_task_ids = scene.combiner_inputs(id);
    let Some(node) = scene.node_mut(id) else {
        return;
    };
    let NodeBody::Combiner(combiner) = &mut node.body else {
        return;
    };
    combiner.status = CombinerStatus::Running;
    tracing::debug!(combiner_id = %id, inputs = input_task_ids.len(), "Combiner run");
    effects.push(Effect::Request(CanvasIntent::RunCombiner {
        combiner_id: id.to_string(),
        mode: combiner.mode,
        input_task_ids,
    }));
}

fn add_combiner(world: Pos2, scene: &mut SceneModel, effects: &mut Vec<Effect>) {
    let combiner_id = format!("combiner-{}", Uuid::new_v4());
    let mode = CombinerMode::default();
    scene.insert_combiner(&CombinerSnapshot {
        id: combiner_id.clone(),
        mode,
        status: CombinerStatus::Idle,
        input_ports: 1,
        result: None,
        x: Some(world.x),
        y: Some(world.y),
    });
    effects.push(Effect::Request(CanvasIntent::CreateCombiner {
        combiner_id,
        mode,
        x: world.x,
        y: world.y,
    }));
}
