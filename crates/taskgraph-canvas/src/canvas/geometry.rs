//! Card geometry - port anchors and button hotspots
//!
//! All rects are world-space and derived from a node's display rect, so the
//! renderer and the hit tester agree on where things are.

use egui::{Pos2, Rect, Vec2};
use taskgraph_types::TaskStatus;

use super::scene::{Node, NodeBody, PortDirection, PortRef, OUTPUT_PORT};

const BUTTON_HEIGHT: f32 = 20.0;
const BUTTON_WIDTH: f32 = 56.0;
const BUTTON_GAP: f32 = 6.0;
const BUTTON_INSET: f32 = 8.0;
const CLOSE_SIZE: f32 = 18.0;

/// Port anchor in world space
pub fn port_anchor(node: &Node, port_id: &str, direction: PortDirection) -> Option<Pos2> {
    let rect = node.rect();
    match direction {
        PortDirection::Output if port_id == OUTPUT_PORT => Some(rect.right_center()),
        PortDirection::Output => None,
        PortDirection::Input => match &node.body {
            NodeBody::Combiner(combiner) => {
                let index = combiner.input_ports.iter().position(|p| p == port_id)?;
                let spacing = rect.height() / (combiner.input_ports.len() as f32 + 1.0);
                Some(Pos2::new(rect.min.x, rect.min.y + spacing * (index as f32 + 1.0)))
            }
            _ if node.has_port(port_id, PortDirection::Input) => Some(rect.left_center()),
            _ => None,
        },
    }
}

/// Every port of a node with its anchor
pub fn port_anchors(node: &Node) -> Vec<(PortRef, Pos2)> {
    node.ports()
        .into_iter()
        .filter_map(|port| {
            port_anchor(node, &port.port_id, port.direction).map(|anchor| (port, anchor))
        })
        .collect()
}

fn close_rect(card: Rect) -> Rect {
    Rect::from_min_size(
        Pos2::new(card.max.x - CLOSE_SIZE - 4.0, card.min.y + 4.0),
        Vec2::splat(CLOSE_SIZE),
    )
}

/// Slot `n` of the bottom button row
fn bottom_slot(card: Rect, n: usize) -> Rect {
    Rect::from_min_size(
        Pos2::new(
            card.min.x + BUTTON_INSET + n as f32 * (BUTTON_WIDTH + BUTTON_GAP),
            card.max.y - BUTTON_HEIGHT - 6.0,
        ),
        Vec2::new(BUTTON_WIDTH, BUTTON_HEIGHT),
    )
}

// =============================================================================
// TASK CARD
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskButton {
    Delete,
    /// Shown while pending
    Execute,
    /// Shown once finished; shares the execute slot
    Rerun,
    Assign,
    ViewLog,
}

impl TaskButton {
    pub const ALL: [TaskButton; 5] = [
        TaskButton::Delete,
        TaskButton::Execute,
        TaskButton::Rerun,
        TaskButton::Assign,
        TaskButton::ViewLog,
    ];

    pub fn rect(self, card: Rect) -> Rect {
        match self {
            TaskButton::Delete => close_rect(card),
            TaskButton::Execute | TaskButton::Rerun => bottom_slot(card, 0),
            TaskButton::Assign => bottom_slot(card, 1),
            TaskButton::ViewLog => bottom_slot(card, 2),
        }
    }

    /// Is the hotspot live for a task in this status?
    pub fn is_active(self, status: TaskStatus) -> bool {
        match self {
            TaskButton::Execute => status == TaskStatus::Pending,
            TaskButton::Rerun => status.is_finished(),
            _ => true,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskButton::Delete => "×",
            TaskButton::Execute => "Run",
            TaskButton::Rerun => "Rerun",
            TaskButton::Assign => "Assign",
            TaskButton::ViewLog => "Log",
        }
    }
}

/// Active task button under `point`
pub fn task_button_at(card: Rect, status: TaskStatus, point: Pos2) -> Option<TaskButton> {
    TaskButton::ALL
        .into_iter()
        .find(|b| b.is_active(status) && b.rect(card).contains(point))
}

// =============================================================================
// COMBINER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinerButton {
    Delete,
    Run,
    /// Toggles combiner-assign mode
    Collect,
}

impl CombinerButton {
    pub const ALL: [CombinerButton; 3] = [
        CombinerButton::Delete,
        CombinerButton::Run,
        CombinerButton::Collect,
    ];

    pub fn rect(self, body: Rect) -> Rect {
        match self {
            CombinerButton::Delete => close_rect(body),
            // Inset past the port column
            CombinerButton::Run => bottom_slot(body, 0).translate(Vec2::new(BUTTON_INSET, 0.0)),
            CombinerButton::Collect => {
                bottom_slot(body, 1).translate(Vec2::new(BUTTON_INSET, 0.0))
            }
        }
    }
}

pub fn combiner_button_at(body: Rect, point: Pos2) -> Option<CombinerButton> {
    CombinerButton::ALL
        .into_iter()
        .find(|b| b.rect(body).contains(point))
}

// =============================================================================
// AGENT
// =============================================================================

pub fn agent_delete_at(body: Rect, point: Pos2) -> bool {
    close_rect(body).contains(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::scene::{SceneModel, INPUT_PORT};
    use taskgraph_types::{CombinerMode, CombinerSnapshot, CombinerStatus, TaskSnapshot};

    fn card() -> Rect {
        Rect::from_min_size(Pos2::new(100.0, 100.0), Vec2::new(200.0, 110.0))
    }

    #[test]
    fn test_buttons_fit_inside_card() {
        for button in TaskButton::ALL {
            assert!(card().contains_rect(button.rect(card())), "{:?}", button);
        }
        let body = Rect::from_min_size(Pos2::ZERO, Vec2::new(150.0, 90.0));
        for button in CombinerButton::ALL {
            assert!(body.contains_rect(button.rect(body)), "{:?}", button);
        }
    }

    #[test]
    fn test_execute_and_rerun_follow_status() {
        let point = TaskButton::Execute.rect(card()).center();
        assert_eq!(
            task_button_at(card(), TaskStatus::Pending, point),
            Some(TaskButton::Execute)
        );
        assert_eq!(
            task_button_at(card(), TaskStatus::Completed, point),
            Some(TaskButton::Rerun)
        );
        assert_eq!(task_button_at(card(), TaskStatus::InProgress, point), None);
    }

    #[test]
    fn test_task_ports_sit_on_card_edges() {
        let mut scene = SceneModel::default();
        scene.insert_task(&TaskSnapshot {
            x: Some(0.0),
            y: Some(0.0),
            ..TaskSnapshot::new("t", "t")
        });
        let node = scene.node("t").unwrap();
        assert_eq!(
            port_anchor(node, INPUT_PORT, PortDirection::Input),
            Some(Pos2::new(0.0, 55.0))
        );
        assert_eq!(
            port_anchor(node, OUTPUT_PORT, PortDirection::Output),
            Some(Pos2::new(200.0, 55.0))
        );
        assert_eq!(port_anchor(node, "in-0", PortDirection::Input), None);
    }

    #[test]
    fn test_combiner_ports_spread_down_left_edge() {
        let mut scene = SceneModel::default();
        scene.insert_combiner(&CombinerSnapshot {
            id: "c".into(),
            mode: CombinerMode::Merge,
            status: CombinerStatus::Idle,
            input_ports: 2,
            result: None,
            x: Some(0.0),
            y: Some(0.0),
        });
        let node = scene.node("c").unwrap();
        let a = port_anchor(node, "in-0", PortDirection::Input).unwrap();
        let b = port_anchor(node, "in-1", PortDirection::Input).unwrap();
        assert_eq!(a.x, 0.0);
        assert!(b.y > a.y);
        assert_eq!(port_anchors(node).len(), 3);
    }
}
