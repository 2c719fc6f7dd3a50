//! End-to-end canvas scenarios driven through `CanvasEngine`
//!
//! These tests verify that:
//! 1. Live events and local drags compose without losing placement
//! 2. Hit precedence and mode exclusivity hold across whole gestures
//! 3. Combiner collection and runs emit the expected requests

use egui::Pos2;
use pretty_assertions::assert_eq;
use taskgraph_canvas::{
    CanvasEngine, CanvasInput, CanvasSettings, Effect, InteractionState, Key,
};
use taskgraph_types::{
    AgentSnapshot, CanvasEvent, CanvasIntent, TaskCompletedData, TaskSnapshot, TaskStartedData,
    TaskStatus, WorkspaceSnapshot,
};

fn engine() -> CanvasEngine {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("taskgraph_canvas=debug")
        .with_test_writer()
        .try_init();
    CanvasEngine::with_settings("ws-1", &CanvasSettings::default())
}

fn placed(id: &str, x: f32, y: f32) -> TaskSnapshot {
    TaskSnapshot {
        x: Some(x),
        y: Some(y),
        ..TaskSnapshot::new(id, id)
    }
}

fn requests(effects: &[Effect]) -> Vec<&CanvasIntent> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Request(intent) => Some(intent),
            _ => None,
        })
        .collect()
}

fn drag(engine: &mut CanvasEngine, from: (f32, f32), to: (f32, f32)) {
    engine.handle_input(&CanvasInput::press(from.0, from.1));
    engine.handle_input(&CanvasInput::move_to(to.0, to.1));
    engine.handle_input(&CanvasInput::release(to.0, to.1));
}

// =============================================================================
// LIVE UPDATES
// =============================================================================

#[test]
fn test_live_lifecycle_keeps_dragged_position() {
    let mut engine = engine();
    engine.apply_event(&CanvasEvent::Initial(WorkspaceSnapshot {
        agents: vec![AgentSnapshot::named("writer")],
        ..WorkspaceSnapshot::default()
    }));
    engine.apply_event(&CanvasEvent::TaskCreated(TaskSnapshot {
        to: Some("writer".into()),
        ..TaskSnapshot::new("t1", "Draft")
    }));
    let task = engine.scene().task("t1").unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.assigned_to.as_deref(), Some("writer"));

    engine.apply_event(&CanvasEvent::TaskStarted(TaskStartedData {
        task_id: "t1".into(),
        timestamp: None,
    }));
    assert_eq!(
        engine.scene().task("t1").unwrap().status,
        TaskStatus::InProgress
    );
    assert!(engine.tick(0.016));

    // t1 sits in the first task slot, (80, 230)
    let slot = engine.scene().node("t1").unwrap().display_position();
    assert_eq!(slot, Pos2::new(80.0, 230.0));
    drag(&mut engine, (150.0, 270.0), (190.0, 270.0));
    let dragged = Pos2::new(120.0, 230.0);
    assert_eq!(engine.scene().node("t1").unwrap().position, Some(dragged));

    let effects = engine.drain_effects();
    match requests(&effects).as_slice() {
        [CanvasIntent::SaveLayout(layout)] => {
            assert_eq!(layout.workspace_id, "ws-1");
            assert_eq!(layout.positions["t1"].x, 120.0);
        }
        other => panic!("expected one save_layout, got {:?}", other),
    }

    engine.apply_event(&CanvasEvent::TaskCompleted(TaskCompletedData {
        task_id: "t1".into(),
        timestamp: None,
        result: Some("ok".into()),
    }));
    let node = engine.scene().node("t1").unwrap();
    assert_eq!(node.position, Some(dragged));
    assert_eq!(node.as_task().unwrap().status, TaskStatus::Completed);
}

#[test]
fn test_snapshot_keeps_local_placement() {
    let mut engine = engine();
    let snapshot = CanvasEvent::Initial(WorkspaceSnapshot {
        tasks: vec![placed("t1", 50.0, 50.0)],
        ..WorkspaceSnapshot::default()
    });
    engine.apply_event(&snapshot);
    drag(&mut engine, (100.0, 100.0), (170.0, 130.0));
    assert_eq!(
        engine.scene().node("t1").unwrap().position,
        Some(Pos2::new(120.0, 80.0))
    );

    // Same snapshot again, as after a reconnect
    engine.apply_event(&snapshot);
    assert_eq!(
        engine.scene().node("t1").unwrap().position,
        Some(Pos2::new(120.0, 80.0))
    );
}

#[test]
fn test_remote_removal_cancels_interaction() {
    let mut engine = engine();
    engine.apply_event(&CanvasEvent::TaskCreated(placed("t1", 0.0, 0.0)));
    engine.handle_input(&CanvasInput::press(60.0, 40.0));
    assert!(matches!(
        engine.controller().state(),
        InteractionState::DraggingNode { .. }
    ));
    engine.apply_event(&CanvasEvent::Initial(WorkspaceSnapshot::default()));
    assert_eq!(engine.controller().state(), &InteractionState::Idle);
}

// =============================================================================
// GESTURES
// =============================================================================

#[test]
fn test_connection_drag_cancels_node_drag() {
    let mut engine = engine();
    engine.apply_event(&CanvasEvent::TaskCreated(placed("a", 0.0, 0.0)));
    engine.apply_event(&CanvasEvent::TaskCreated(placed("b", 400.0, 0.0)));

    engine.handle_input(&CanvasInput::press(60.0, 40.0));
    assert!(matches!(
        engine.controller().state(),
        InteractionState::DraggingNode { .. }
    ));
    // Output port of a, without a release in between
    engine.handle_input(&CanvasInput::press(200.0, 55.0));
    assert!(matches!(
        engine.controller().state(),
        InteractionState::DraggingConnection { .. }
    ));
    engine.handle_input(&CanvasInput::move_to(400.0, 55.0));
    engine.handle_input(&CanvasInput::release(400.0, 55.0));

    assert_eq!(engine.controller().state(), &InteractionState::Idle);
    assert_eq!(
        engine.scene().node("a").unwrap().position,
        Some(Pos2::new(0.0, 0.0))
    );
    assert_eq!(engine.scene().connections().len(), 1);
    let effects = engine.drain_effects();
    let ops: Vec<_> = requests(&effects).iter().map(|i| i.op()).collect();
    assert_eq!(ops, vec!["create_connection", "save_layout"]);
}

#[test]
fn test_self_connection_is_ignored() {
    let mut engine = engine();
    engine.apply_event(&CanvasEvent::TaskCreated(placed("a", 0.0, 0.0)));
    // Output port to own input port
    engine.handle_input(&CanvasInput::press(200.0, 55.0));
    engine.handle_input(&CanvasInput::release(0.0, 55.0));
    assert!(engine.scene().connections().is_empty());
    assert!(engine.drain_effects().is_empty());
}

#[test]
fn test_delete_hotspot_removes_connections() {
    let mut engine = engine();
    engine.apply_event(&CanvasEvent::TaskCreated(placed("a", 0.0, 0.0)));
    engine.apply_event(&CanvasEvent::TaskCreated(placed("b", 400.0, 0.0)));
    engine.handle_input(&CanvasInput::press(200.0, 55.0));
    engine.handle_input(&CanvasInput::release(400.0, 55.0));
    engine.drain_effects();

    engine.handle_input(&CanvasInput::press(588.0, 12.0));
    engine.handle_input(&CanvasInput::release(588.0, 12.0));
    assert!(!engine.scene().contains("b"));
    assert!(engine.scene().connections().is_empty());
    let effects = engine.drain_effects();
    let ops: Vec<_> = requests(&effects).iter().map(|i| i.op()).collect();
    assert_eq!(ops, vec!["delete_connection", "delete_task"]);
    assert!(!effects
        .iter()
        .any(|e| matches!(e, Effect::ShowTaskDetails(_))));
}

// =============================================================================
// COMBINERS
// =============================================================================

#[test]
fn test_combiner_collect_and_run() {
    let mut engine = engine();
    engine.apply_event(&CanvasEvent::TaskCreated(placed("a", 0.0, 0.0)));
    engine.apply_event(&CanvasEvent::TaskCreated(placed("b", 0.0, 200.0)));

    // Canvas menu, third item: add combiner at (600, 100)
    engine.handle_input(&CanvasInput::secondary_press(600.0, 100.0));
    engine.handle_input(&CanvasInput::press(610.0, 100.0 + 26.0 * 2.0 + 10.0));
    let effects = engine.drain_effects();
    let combiner_id = match requests(&effects).as_slice() {
        [CanvasIntent::CreateCombiner { combiner_id, x, y, .. }] => {
            assert_eq!((*x, *y), (600.0, 100.0));
            combiner_id.clone()
        }
        other => panic!("expected create_combiner, got {:?}", other),
    };
    assert!(combiner_id.starts_with("combiner-"));

    // Collect button toggles combiner-assign mode, which survives release
    engine.handle_input(&CanvasInput::press(700.0, 174.0));
    engine.handle_input(&CanvasInput::release(700.0, 174.0));
    assert_eq!(
        engine.controller().state(),
        &InteractionState::CombinerAssignMode {
            combiner_id: combiner_id.clone()
        }
    );
    for y in [40.0, 240.0] {
        engine.handle_input(&CanvasInput::press(100.0, y));
        engine.handle_input(&CanvasInput::release(100.0, y));
    }
    assert_eq!(
        engine.scene().task("b").unwrap().combiner_id.as_deref(),
        Some(combiner_id.as_str())
    );
    assert_eq!(
        engine.scene().combiner(&combiner_id).unwrap().input_ports,
        vec!["in-0".to_string(), "in-1".to_string()]
    );

    engine.handle_input(&CanvasInput::key(Key::Escape));
    assert_eq!(engine.controller().state(), &InteractionState::Idle);
    engine.drain_effects();

    // Run button
    engine.handle_input(&CanvasInput::press(640.0, 174.0));
    let effects = engine.drain_effects();
    match requests(&effects).as_slice() {
        [CanvasIntent::RunCombiner {
            combiner_id: id,
            input_task_ids,
            ..
        }] => {
            assert_eq!(id, &combiner_id);
            assert_eq!(input_task_ids, &vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("expected run_combiner, got {:?}", other),
    }
}
