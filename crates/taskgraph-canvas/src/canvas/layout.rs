//! Layout - dependency levels and fallback slots
//!
//! A task's level is `0` without inputs, otherwise `1 + max(level(input))`.
//! Levels are computed with a three-colour depth-first walk: an input that is
//! still being visited (a cycle) counts as level 0, and input ids that are
//! not tasks in the scene are ignored.

use egui::{Pos2, Vec2};
use std::collections::HashMap;

use super::scene::{NodeId, NodeKind, SceneModel};
use super::viewport::Viewport;
use crate::config::LayoutSettings;

// =============================================================================
// FALLBACK SLOTS
// =============================================================================

/// Deterministic slot for the `ordinal`-th node of a kind.
///
/// Agents fill a row along the top, tasks a grid below it, combiners a
/// column to the right of the task grid.
pub fn fallback_slot(settings: &LayoutSettings, kind: NodeKind, ordinal: usize) -> Pos2 {
    let origin = Pos2::new(settings.fallback_origin[0], settings.fallback_origin[1]);
    let cell = Vec2::new(settings.fallback_cell[0], settings.fallback_cell[1]);
    let columns = settings.fallback_columns.max(1);
    let n = ordinal as f32;
    match kind {
        NodeKind::Agent => origin + Vec2::new(n * cell.x, 0.0),
        NodeKind::Task => {
            let col = (ordinal % columns) as f32;
            let row = (ordinal / columns) as f32;
            origin + Vec2::new(col * cell.x, (row + 1.0) * cell.y)
        }
        NodeKind::Combiner => origin + Vec2::new(columns as f32 * cell.x, (n + 1.0) * cell.y),
    }
}

// =============================================================================
// LEVELS
// =============================================================================

#[derive(Clone, Copy)]
enum Mark {
    Visiting,
    Done(usize),
}

struct Frame<'a> {
    id: &'a str,
    next: usize,
    level: usize,
}

/// Level of every task in `graph` (task id -> input task ids)
pub fn compute_levels(graph: &[(NodeId, Vec<NodeId>)]) -> HashMap<NodeId, usize> {
    let inputs: HashMap<&str, &[NodeId]> = graph
        .iter()
        .map(|(id, deps)| (id.as_str(), deps.as_slice()))
        .collect();
    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(graph.len());

    for (root, _) in graph {
        if marks.contains_key(root.as_str()) {
            continue;
        }
        marks.insert(root.as_str(), Mark::Visiting);
        let mut stack = vec![Frame {
            id: root.as_str(),
            next: 0,
            level: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let deps = inputs.get(frame.id).copied().unwrap_or(&[]);
            if let Some(dep) = deps.get(frame.next) {
                frame.next += 1;
                let Some((&dep, _)) = inputs.get_key_value(dep.as_str()) else {
                    continue;
                };
                match marks.get(dep) {
                    Some(Mark::Done(level)) => frame.level = frame.level.max(level + 1),
                    Some(Mark::Visiting) => frame.level = frame.level.max(1),
                    None => {
                        marks.insert(dep, Mark::Visiting);
                        stack.push(Frame {
                            id: dep,
                            next: 0,
                            level: 0,
                        });
                    }
                }
                continue;
            }

            let (id, level) = (frame.id, frame.level);
            marks.insert(id, Mark::Done(level));
            stack.pop();
            if let Some(parent) = stack.last_mut() {
                parent.level = parent.level.max(level + 1);
            }
        }
    }

    marks
        .into_iter()
        .filter_map(|(id, mark)| match mark {
            Mark::Done(level) => Some((id.to_string(), level)),
            Mark::Visiting => None,
        })
        .collect()
}

// =============================================================================
// LAYOUT ENGINE
// =============================================================================

/// Levelled auto-layout for tasks
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    settings: LayoutSettings,
}

impl LayoutEngine {
    pub fn new(settings: LayoutSettings) -> Self {
        Self { settings }
    }

    /// Levels of every task in the scene
    pub fn task_levels(scene: &SceneModel) -> HashMap<NodeId, usize> {
        let graph: Vec<(NodeId, Vec<NodeId>)> = scene
            .nodes()
            .iter()
            .filter_map(|n| {
                n.as_task()
                    .map(|task| (n.id.clone(), task.input_task_ids.clone()))
            })
            .collect();
        compute_levels(&graph)
    }

    /// Place every task at `y = start_y + level * level_spacing`, each level
    /// row centred on the viewport's horizontal midpoint. Returns the number
    /// of tasks placed.
    pub fn apply(&self, scene: &mut SceneModel, viewport: &Viewport, screen_size: Vec2) -> usize {
        let levels = Self::task_levels(scene);
        let mid_x = viewport
            .screen_to_world(Pos2::new(screen_size.x / 2.0, 0.0))
            .x;

        // Rows keep scene order
        let mut rows: Vec<Vec<(NodeId, f32)>> = Vec::new();
        for node in scene.nodes() {
            let Some(&level) = levels.get(&node.id) else {
                continue;
            };
            if rows.len() <= level {
                rows.resize_with(level + 1, Vec::new);
            }
            rows[level].push((node.id.clone(), node.size.x));
        }

        let mut placed = 0;
        for (level, row) in rows.iter().enumerate() {
            let span = (row.len().saturating_sub(1)) as f32 * self.settings.node_spacing;
            let y = self.settings.start_y + level as f32 * self.settings.level_spacing;
            for (i, (id, width)) in row.iter().enumerate() {
                let center_x = mid_x - span / 2.0 + i as f32 * self.settings.node_spacing;
                if scene.set_position(id, Pos2::new(center_x - width / 2.0, y)) {
                    placed += 1;
                }
            }
        }
        tracing::debug!(placed, levels = rows.len(), "Auto layout applied");
        placed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use taskgraph_types::TaskSnapshot;

    fn graph(edges: &[(&str, &[&str])]) -> Vec<(NodeId, Vec<NodeId>)> {
        edges
            .iter()
            .map(|(id, deps)| (id.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_chain_levels() {
        let levels = compute_levels(&graph(&[("c", &["b"]), ("b", &["a"]), ("a", &[])]));
        assert_eq!(levels["a"], 0);
        assert_eq!(levels["b"], 1);
        assert_eq!(levels["c"], 2);
    }

    #[test]
    fn test_diamond_takes_longest_path() {
        let levels = compute_levels(&graph(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["b"]),
            ("d", &["a", "c"]),
        ]));
        assert_eq!(levels["d"], 3);
    }

    #[test]
    fn test_two_cycle_terminates() {
        let levels = compute_levels(&graph(&[("x", &["y"]), ("y", &["x"])]));
        assert_eq!(levels.len(), 2);
        // y sees x mid-visit and counts it as level 0
        assert_eq!(levels["y"], 1);
        assert_eq!(levels["x"], 2);
    }

    #[test]
    fn test_self_dependency_and_dangling_inputs() {
        let levels = compute_levels(&graph(&[("s", &["s"]), ("d", &["ghost"])]));
        assert_eq!(levels["s"], 1);
        assert_eq!(levels["d"], 0);
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let edges: Vec<(NodeId, Vec<NodeId>)> = (0..20_000)
            .map(|i| {
                let deps = if i == 0 { vec![] } else { vec![(i - 1).to_string()] };
                (i.to_string(), deps)
            })
            .rev()
            .collect();
        let levels = compute_levels(&edges);
        assert_eq!(levels["19999"], 19_999);
    }

    #[test]
    fn test_apply_rows_centred_on_viewport() {
        let mut scene = SceneModel::default();
        scene.insert_task(&TaskSnapshot::new("a", "a"));
        scene.insert_task(&TaskSnapshot::new("b", "b"));
        scene.insert_task(&TaskSnapshot {
            input_task_ids: vec!["a".into()],
            ..TaskSnapshot::new("c", "c")
        });
        let viewport = Viewport::default();
        let placed = LayoutEngine::default().apply(&mut scene, &viewport, Vec2::new(1000.0, 800.0));
        assert_eq!(placed, 3);

        let a = scene.node("a").unwrap().position.unwrap();
        let b = scene.node("b").unwrap().position.unwrap();
        let c = scene.node("c").unwrap().position.unwrap();
        assert_eq!(a.y, 100.0);
        assert_eq!(c.y, 260.0);
        // Two cards straddle x = 500, one card is centred on it
        assert_eq!((a.x + b.x) / 2.0 + 100.0, 500.0);
        assert_eq!(c.x + 100.0, 500.0);
    }

    #[test]
    fn test_fallback_slots_are_distinct() {
        let settings = LayoutSettings::default();
        let mut seen = Vec::new();
        for kind in [NodeKind::Agent, NodeKind::Task, NodeKind::Combiner] {
            for i in 0..6 {
                let slot = fallback_slot(&settings, kind, i);
                assert!(!seen.contains(&slot), "{:?} {} collides", kind, i);
                seen.push(slot);
            }
        }
    }
}
