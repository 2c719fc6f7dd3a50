//! Screen-space overlays - context menu and modal forms
//!
//! Overlays sit above the canvas and swallow pointer input while open. They
//! live in screen coordinates so they do not pan or zoom with the scene.

use egui::{Pos2, Rect, Vec2};

use super::scene::{NodeId, NodeKind, SceneModel};

// =============================================================================
// CONTEXT MENU
// =============================================================================

const MENU_ITEM_SIZE: Vec2 = Vec2::new(180.0, 26.0);

#[derive(Debug, Clone, PartialEq)]
pub enum MenuAction {
    AddAgent,
    CreateTask,
    AddCombiner,
    AutoLayout,
    SaveLayout,
    ExecuteTask(NodeId),
    ViewLog(NodeId),
    DeleteNode(NodeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub label: &'static str,
    pub action: MenuAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextMenu {
    /// Top-left corner in screen space
    pub anchor: Pos2,
    /// World point the menu was opened on (placement for new nodes)
    pub world_anchor: Pos2,
    pub items: Vec<MenuItem>,
}

impl ContextMenu {
    /// Menu for empty canvas
    pub fn for_canvas(anchor: Pos2, world_anchor: Pos2) -> Self {
        let items = vec![
            MenuItem {
                label: "Add agent",
                action: MenuAction::AddAgent,
            },
            MenuItem {
                label: "Create task",
                action: MenuAction::CreateTask,
            },
            MenuItem {
                label: "Add combiner",
                action: MenuAction::AddCombiner,
            },
            MenuItem {
                label: "Auto layout",
                action: MenuAction::AutoLayout,
            },
            MenuItem {
                label: "Save layout",
                action: MenuAction::SaveLayout,
            },
        ];
        Self {
            anchor,
            world_anchor,
            items,
        }
    }

    /// Menu for a node
    pub fn for_node(scene: &SceneModel, id: &str, anchor: Pos2, world_anchor: Pos2) -> Option<Self> {
        let kind = scene.kind_of(id)?;
        let mut items = Vec::new();
        if kind == NodeKind::Task {
            let finished = scene.task(id).is_some_and(|t| t.status.is_finished());
            items.push(MenuItem {
                label: if finished { "Rerun" } else { "Execute" },
                action: MenuAction::ExecuteTask(id.to_string()),
            });
            items.push(MenuItem {
                label: "View log",
                action: MenuAction::ViewLog(id.to_string()),
            });
        }
        items.push(MenuItem {
            label: "Delete",
            action: MenuAction::DeleteNode(id.to_string()),
        });
        Some(Self {
            anchor,
            world_anchor,
            items,
        })
    }

    pub fn item_rect(&self, index: usize) -> Rect {
        Rect::from_min_size(
            self.anchor + Vec2::new(0.0, index as f32 * MENU_ITEM_SIZE.y),
            MENU_ITEM_SIZE,
        )
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_min_size(
            self.anchor,
            Vec2::new(MENU_ITEM_SIZE.x, self.items.len() as f32 * MENU_ITEM_SIZE.y),
        )
    }

    /// Action of the item under `screen_pos`
    pub fn action_at(&self, screen_pos: Pos2) -> Option<&MenuAction> {
        self.items
            .iter()
            .enumerate()
            .find(|(i, _)| self.item_rect(*i).contains(screen_pos))
            .map(|(_, item)| &item.action)
    }
}

// =============================================================================
// MODAL FORMS
// =============================================================================

const FORM_WIDTH: f32 = 360.0;
const FORM_HEADER: f32 = 40.0;
const FIELD_PITCH: f32 = 56.0;
const INPUT_HEIGHT: f32 = 28.0;
const PADDING: f32 = 16.0;
const CHECKBOX_ROW: f32 = 32.0;
const SUBMIT_SIZE: Vec2 = Vec2::new(100.0, 32.0);

#[derive(Debug, Clone, PartialEq)]
pub struct TextField {
    pub label: &'static str,
    pub required: bool,
    pub value: String,
}

impl TextField {
    fn new(label: &'static str, required: bool) -> Self {
        Self {
            label,
            required,
            value: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormKind {
    AddAgent,
    CreateTask,
}

/// Validated form contents
#[derive(Debug, Clone, PartialEq)]
pub enum FormSubmission {
    AddAgent {
        name: String,
        role: Option<String>,
        world_pos: Pos2,
    },
    CreateTask {
        title: String,
        description: Option<String>,
        agent: Option<String>,
        execute: bool,
        world_pos: Pos2,
    },
}

/// Where a press landed on an open form
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormHit {
    Close,
    Submit,
    Checkbox,
    Field(usize),
    Inside,
    Outside,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModalForm {
    pub kind: FormKind,
    pub fields: Vec<TextField>,
    /// Optional checkbox (label, checked)
    pub checkbox: Option<(&'static str, bool)>,
    pub focused: Option<usize>,
    /// Shown under the title after a failed submit
    pub error: Option<String>,
    /// World point the form was opened on (placement for the new node)
    pub world_pos: Pos2,
    pub bounds: Rect,
}

impl ModalForm {
    pub fn add_agent(screen_size: Vec2, world_pos: Pos2) -> Self {
        Self::build(
            FormKind::AddAgent,
            vec![TextField::new("Name", true), TextField::new("Role", false)],
            None,
            screen_size,
            world_pos,
        )
    }

    pub fn create_task(screen_size: Vec2, world_pos: Pos2) -> Self {
        Self::build(
            FormKind::CreateTask,
            vec![
                TextField::new("Title", true),
                TextField::new("Description", false),
                TextField::new("Agent", false),
            ],
            Some(("Execute now", false)),
            screen_size,
            world_pos,
        )
    }

    fn build(
        kind: FormKind,
        fields: Vec<TextField>,
        checkbox: Option<(&'static str, bool)>,
        screen_size: Vec2,
        world_pos: Pos2,
    ) -> Self {
        let checkbox_height = if checkbox.is_some() { CHECKBOX_ROW } else { 0.0 };
        let height = FORM_HEADER
            + fields.len() as f32 * FIELD_PITCH
            + checkbox_height
            + SUBMIT_SIZE.y
            + 2.0 * PADDING;
        let bounds = Rect::from_center_size(
            (screen_size / 2.0).to_pos2(),
            Vec2::new(FORM_WIDTH, height),
        );
        Self {
            kind,
            fields,
            checkbox,
            focused: Some(0),
            error: None,
            world_pos,
            bounds,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            FormKind::AddAgent => "Add agent",
            FormKind::CreateTask => "Create task",
        }
    }

    // =========================================================================
    // GEOMETRY
    // =========================================================================

    pub fn close_rect(&self) -> Rect {
        Rect::from_min_size(
            Pos2::new(self.bounds.max.x - 32.0, self.bounds.min.y + 8.0),
            Vec2::splat(24.0),
        )
    }

    pub fn field_rect(&self, index: usize) -> Rect {
        Rect::from_min_size(
            Pos2::new(
                self.bounds.min.x + PADDING,
                // Label sits in the first 20px of each pitch
                self.bounds.min.y + FORM_HEADER + index as f32 * FIELD_PITCH + 20.0,
            ),
            Vec2::new(FORM_WIDTH - 2.0 * PADDING, INPUT_HEIGHT),
        )
    }

    pub fn checkbox_rect(&self) -> Option<Rect> {
        self.checkbox.map(|_| {
            Rect::from_min_size(
                Pos2::new(
                    self.bounds.min.x + PADDING,
                    self.bounds.min.y + FORM_HEADER + self.fields.len() as f32 * FIELD_PITCH + 6.0,
                ),
                Vec2::splat(20.0),
            )
        })
    }

    pub fn submit_rect(&self) -> Rect {
        Rect::from_min_size(
            self.bounds.max - SUBMIT_SIZE - Vec2::splat(PADDING),
            SUBMIT_SIZE,
        )
    }

    pub fn hit(&self, screen_pos: Pos2) -> FormHit {
        if !self.bounds.contains(screen_pos) {
            return FormHit::Outside;
        }
        if self.close_rect().contains(screen_pos) {
            return FormHit::Close;
        }
        if self.submit_rect().contains(screen_pos) {
            return FormHit::Submit;
        }
        if self.checkbox_rect().is_some_and(|r| r.contains(screen_pos)) {
            return FormHit::Checkbox;
        }
        (0..self.fields.len())
            .find(|i| self.field_rect(*i).contains(screen_pos))
            .map_or(FormHit::Inside, FormHit::Field)
    }

    // =========================================================================
    // EDITING
    // =========================================================================

    pub fn has_focus(&self) -> bool {
        self.focused.is_some()
    }

    pub fn focus(&mut self, index: usize) {
        if index < self.fields.len() {
            self.focused = Some(index);
        }
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    pub fn type_char(&mut self, c: char) {
        if c.is_control() {
            return;
        }
        if let Some(field) = self.focused.and_then(|i| self.fields.get_mut(i)) {
            field.value.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.focused.and_then(|i| self.fields.get_mut(i)) {
            field.value.pop();
        }
    }

    pub fn toggle_checkbox(&mut self) {
        if let Some((_, checked)) = &mut self.checkbox {
            *checked = !*checked;
        }
    }

    fn value(&self, index: usize) -> Option<String> {
        self.fields
            .get(index)
            .map(|f| f.value.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Check required fields and build the submission
    pub fn validate(&self) -> Result<FormSubmission, String> {
        if let Some(missing) = self
            .fields
            .iter()
            .find(|f| f.required && f.value.trim().is_empty())
        {
            return Err(format!("{} is required", missing.label));
        }
        let submission = match self.kind {
            FormKind::AddAgent => FormSubmission::AddAgent {
                name: self.value(0).unwrap_or_default(),
                role: self.value(1),
                world_pos: self.world_pos,
            },
            FormKind::CreateTask => FormSubmission::CreateTask {
                title: self.value(0).unwrap_or_default(),
                description: self.value(1),
                agent: self.value(2),
                execute: self.checkbox.is_some_and(|(_, checked)| checked),
                world_pos: self.world_pos,
            },
        };
        Ok(submission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use taskgraph_types::TaskSnapshot;

    const SCREEN: Vec2 = Vec2::new(1280.0, 800.0);

    #[test]
    fn test_canvas_menu_hit() {
        let menu = ContextMenu::for_canvas(Pos2::new(100.0, 100.0), Pos2::ZERO);
        assert_eq!(
            menu.action_at(Pos2::new(150.0, 110.0)),
            Some(&MenuAction::AddAgent)
        );
        assert_eq!(
            menu.action_at(Pos2::new(150.0, 100.0 + 26.0 * 4.0 + 5.0)),
            Some(&MenuAction::SaveLayout)
        );
        assert_eq!(menu.action_at(Pos2::new(50.0, 50.0)), None);
    }

    #[test]
    fn test_node_menu_depends_on_kind() {
        let mut scene = SceneModel::default();
        scene.insert_task(&TaskSnapshot::new("t", "t"));
        let menu = ContextMenu::for_node(&scene, "t", Pos2::ZERO, Pos2::ZERO).unwrap();
        assert_eq!(menu.items.len(), 3);
        assert!(ContextMenu::for_node(&scene, "ghost", Pos2::ZERO, Pos2::ZERO).is_none());
    }

    #[test]
    fn test_required_field_blocks_submit() {
        let mut form = ModalForm::create_task(SCREEN, Pos2::new(10.0, 20.0));
        assert_eq!(form.validate(), Err("Title is required".to_string()));
        for c in "  ".chars() {
            form.type_char(c);
        }
        assert!(form.validate().is_err());

        form.backspace();
        form.backspace();
        for c in "Write report".chars() {
            form.type_char(c);
        }
        form.toggle_checkbox();
        assert_eq!(
            form.validate(),
            Ok(FormSubmission::CreateTask {
                title: "Write report".into(),
                description: None,
                agent: None,
                execute: true,
                world_pos: Pos2::new(10.0, 20.0),
            })
        );
    }

    #[test]
    fn test_form_regions_are_inside_bounds() {
        let form = ModalForm::create_task(SCREEN, Pos2::ZERO);
        for i in 0..form.fields.len() {
            assert!(form.bounds.contains_rect(form.field_rect(i)));
            assert_eq!(form.hit(form.field_rect(i).center()), FormHit::Field(i));
        }
        assert_eq!(form.hit(form.submit_rect().center()), FormHit::Submit);
        assert_eq!(form.hit(form.close_rect().center()), FormHit::Close);
        assert_eq!(
            form.hit(form.checkbox_rect().unwrap().center()),
            FormHit::Checkbox
        );
        assert_eq!(form.hit(Pos2::new(2.0, 2.0)), FormHit::Outside);
    }

    #[test]
    fn test_control_chars_are_not_typed() {
        let mut form = ModalForm::add_agent(SCREEN, Pos2::ZERO);
        form.type_char('\n');
        form.type_char('a');
        assert_eq!(form.fields[0].value, "a");
        form.blur();
        form.type_char('b');
        assert_eq!(form.fields[0].value, "a");
    }
}
