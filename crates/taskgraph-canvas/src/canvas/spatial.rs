//! Spatial index for world-space hit testing
//!
//! Uses an R-tree (via `rstar`) holding one entry per node body and one per
//! port hotspot. The index is a cache of the scene: it is rebuilt whenever
//! `SceneModel::revision()` moves on.

use egui::Pos2;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use super::geometry::port_anchors;
use super::scene::{NodeId, NodeKind, PortDirection, PortRef, SceneModel};

/// What an index entry stands for
#[derive(Debug, Clone, PartialEq)]
pub enum HitTarget {
    Body { node_id: NodeId, kind: NodeKind },
    Port { port: PortRef, kind: NodeKind },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
    Rect { min: [f32; 2], max: [f32; 2] },
    Circle { center: [f32; 2], radius: f32 },
}

/// Spatial index entry
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    pub target: HitTarget,
    /// Draw order of the owning node; higher is on top
    pub order: usize,
    shape: Shape,
}

impl SpatialEntry {
    fn body(node_id: NodeId, kind: NodeKind, order: usize, rect: egui::Rect) -> Self {
        Self {
            target: HitTarget::Body { node_id, kind },
            order,
            shape: Shape::Rect {
                min: [rect.min.x, rect.min.y],
                max: [rect.max.x, rect.max.y],
            },
        }
    }

    fn port(port: PortRef, kind: NodeKind, order: usize, center: Pos2, radius: f32) -> Self {
        Self {
            target: HitTarget::Port { port, kind },
            order,
            shape: Shape::Circle {
                center: [center.x, center.y],
                radius,
            },
        }
    }

    /// Distance from the shape's center (ports) or edge (bodies)
    fn center_distance(&self, point: [f32; 2]) -> f32 {
        match self.shape {
            Shape::Circle { center, .. } => {
                let dx = point[0] - center[0];
                let dy = point[1] - center[1];
                (dx * dx + dy * dy).sqrt()
            }
            Shape::Rect { .. } => self.distance_2(&point).sqrt(),
        }
    }
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        match self.shape {
            Shape::Rect { min, max } => AABB::from_corners(min, max),
            Shape::Circle { center, radius } => AABB::from_corners(
                [center[0] - radius, center[1] - radius],
                [center[0] + radius, center[1] + radius],
            ),
        }
    }
}

impl PointDistance for SpatialEntry {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        match self.shape {
            Shape::Rect { min, max } => {
                let dx = (min[0] - point[0]).max(0.0).max(point[0] - max[0]);
                let dy = (min[1] - point[1]).max(0.0).max(point[1] - max[1]);
                dx * dx + dy * dy
            }
            Shape::Circle { center, radius } => {
                let dx = point[0] - center[0];
                let dy = point[1] - center[1];
                let dist_to_edge = ((dx * dx + dy * dy).sqrt() - radius).max(0.0);
                dist_to_edge * dist_to_edge
            }
        }
    }

    fn contains_point(&self, point: &[f32; 2]) -> bool {
        match self.shape {
            Shape::Rect { min, max } => {
                point[0] >= min[0] && point[0] <= max[0] && point[1] >= min[1] && point[1] <= max[1]
            }
            Shape::Circle { center, radius } => {
                let dx = point[0] - center[0];
                let dy = point[1] - center[1];
                dx * dx + dy * dy <= radius * radius
            }
        }
    }
}

/// R-tree over bodies and port hotspots of one scene revision
#[derive(Clone)]
pub struct SpatialIndex {
    tree: RTree<SpatialEntry>,
    /// Scene revision the tree was built from
    revision: Option<u64>,
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("count", &self.tree.size())
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            tree: RTree::new(),
            revision: None,
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Rebuild from the scene if it changed since the last build
    pub fn sync(&mut self, scene: &SceneModel, port_radius: f32) {
        if self.revision == Some(scene.revision()) {
            return;
        }
        let mut entries = Vec::with_capacity(scene.len() * 3);
        for (order, node) in scene.nodes().iter().enumerate() {
            let kind = node.kind();
            entries.push(SpatialEntry::body(node.id.clone(), kind, order, node.rect()));
            for (port, anchor) in port_anchors(node) {
                entries.push(SpatialEntry::port(port, kind, order, anchor, port_radius));
            }
        }
        self.tree = RTree::bulk_load(entries);
        self.revision = Some(scene.revision());
    }

    /// Topmost port hotspot containing `point`
    pub fn port_at(&self, point: Pos2) -> Option<(PortRef, NodeKind)> {
        self.tree
            .locate_all_at_point(&[point.x, point.y])
            .filter_map(|e| match &e.target {
                HitTarget::Port { port, kind } => Some((e.order, port, *kind)),
                HitTarget::Body { .. } => None,
            })
            .max_by_key(|(order, _, _)| *order)
            .map(|(_, port, kind)| (port.clone(), kind))
    }

    /// Topmost body of the given kind containing `point`
    pub fn body_at(&self, point: Pos2, kind: NodeKind) -> Option<NodeId> {
        self.tree
            .locate_all_at_point(&[point.x, point.y])
            .filter_map(|e| match &e.target {
                HitTarget::Body { node_id, kind: k } if *k == kind => Some((e.order, node_id)),
                _ => None,
            })
            .max_by_key(|(order, _)| *order)
            .map(|(_, id)| id.clone())
    }

    /// Topmost body of any kind containing `point`
    pub fn any_body_at(&self, point: Pos2) -> Option<(NodeId, NodeKind)> {
        self.tree
            .locate_all_at_point(&[point.x, point.y])
            .filter_map(|e| match &e.target {
                HitTarget::Body { node_id, kind } => Some((e.order, node_id, *kind)),
                _ => None,
            })
            .max_by_key(|(order, _, _)| *order)
            .map(|(_, id, kind)| (id.clone(), kind))
    }

    /// Nearest input port of a node of `kind` whose anchor is within `radius`
    pub fn nearest_input(&self, point: Pos2, kind: NodeKind, radius: f32) -> Option<PortRef> {
        let query = [point.x, point.y];
        self.tree
            .nearest_neighbor_iter(&query)
            .filter_map(|e| match &e.target {
                HitTarget::Port { port, kind: k }
                    if *k == kind && port.direction == PortDirection::Input =>
                {
                    Some((e.center_distance(query), port))
                }
                _ => None,
            })
            // Iteration is ordered by edge distance, which tracks center distance
            // for equal-radius hotspots
            .take_while(|(dist, _)| *dist <= radius + f32::EPSILON)
            .next()
            .map(|(_, port)| port.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::scene::INPUT_PORT;
    use taskgraph_types::{AgentSnapshot, TaskSnapshot};

    fn placed_task(id: &str, x: f32, y: f32) -> TaskSnapshot {
        TaskSnapshot {
            x: Some(x),
            y: Some(y),
            ..TaskSnapshot::new(id, id)
        }
    }

    fn placed_agent(name: &str, x: f32, y: f32) -> AgentSnapshot {
        AgentSnapshot {
            x: Some(x),
            y: Some(y),
            ..AgentSnapshot::named(name)
        }
    }

    #[test]
    fn test_topmost_body_wins() {
        let mut scene = SceneModel::default();
        scene.insert_task(&placed_task("below", 0.0, 0.0));
        scene.insert_task(&placed_task("above", 50.0, 20.0));
        let mut index = SpatialIndex::new();
        index.sync(&scene, 8.0);
        assert_eq!(
            index.body_at(Pos2::new(100.0, 50.0), NodeKind::Task),
            Some("above".to_string())
        );
        assert_eq!(
            index.body_at(Pos2::new(10.0, 10.0), NodeKind::Task),
            Some("below".to_string())
        );
        assert_eq!(index.body_at(Pos2::new(10.0, 10.0), NodeKind::Agent), None);
    }

    #[test]
    fn test_port_hotspot_extends_past_card() {
        let mut scene = SceneModel::default();
        scene.insert_task(&placed_task("t", 0.0, 0.0));
        let mut index = SpatialIndex::new();
        index.sync(&scene, 8.0);
        let (port, kind) = index.port_at(Pos2::new(-5.0, 55.0)).unwrap();
        assert_eq!(port, PortRef::input("t", INPUT_PORT));
        assert_eq!(kind, NodeKind::Task);
        assert!(index.port_at(Pos2::new(-12.0, 55.0)).is_none());
    }

    #[test]
    fn test_nearest_agent_input_respects_radius() {
        let mut scene = SceneModel::default();
        scene.insert_agent(&placed_agent("near", 100.0, 0.0));
        scene.insert_agent(&placed_agent("far", 600.0, 0.0));
        scene.insert_task(&placed_task("t", 40.0, 0.0));
        let mut index = SpatialIndex::new();
        index.sync(&scene, 8.0);

        // "near" input anchor is at (100, 40)
        let hit = index.nearest_input(Pos2::new(60.0, 40.0), NodeKind::Agent, 80.0);
        assert_eq!(hit, Some(PortRef::input("near", INPUT_PORT)));
        let miss = index.nearest_input(Pos2::new(300.0, 300.0), NodeKind::Agent, 80.0);
        assert_eq!(miss, None);
    }

    #[test]
    fn test_sync_skips_unchanged_revision() {
        let mut scene = SceneModel::default();
        scene.insert_task(&placed_task("t", 0.0, 0.0));
        let mut index = SpatialIndex::new();
        index.sync(&scene, 8.0);
        assert_eq!(index.len(), 3);
        scene.insert_task(&placed_task("u", 400.0, 0.0));
        index.sync(&scene, 8.0);
        assert_eq!(index.len(), 6);
    }
}
