use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use glam::Vec3;

use graphsync::{
    Edge, FrameOutcome, GraphData, GraphStore, InstanceBridge, InstanceConfig, InstanceStore,
    Node, PositionCodec, PositionFrame, PositionRecord, RecordLayout, SharedInstances, SlotState,
    StoreConfig, UpsertOutcome, Visibility,
};

fn scenario_graph() -> GraphData {
    GraphData::new(
        vec![
            Node::new("3", Vec3::ZERO),
            Node::new("a", Vec3::new(1.0, 1.0, 1.0)),
            Node::new("7", Vec3::new(-2.0, 0.0, 4.0)),
        ],
        vec![
            Edge::new("3-a", "3", "a"),
            Edge::new("a-7", "a", "7"),
            Edge::new("7-3", "7", "3"),
        ],
    )
}

fn pipeline(capacity: usize) -> (GraphStore, SharedInstances, InstanceBridge) {
    let mut store = GraphStore::new(StoreConfig::default());
    store.set_graph_data(scenario_graph());
    let instances = Rc::new(RefCell::new(InstanceStore::new(InstanceConfig {
        initial_capacity: capacity,
        ..InstanceConfig::default()
    })));
    let bridge = InstanceBridge::attach(&mut store, instances.clone());
    (store, instances, bridge)
}

fn position_frame(data: Vec<f32>) -> PositionFrame {
    PositionFrame::new(RecordLayout::Position, data)
}

#[test]
fn scenario_a_wire_ids_from_snapshot() {
    let (store, _, _) = pipeline(16);

    assert_eq!(store.wire_id("3"), Some(3));
    assert_eq!(store.wire_id("a"), Some(2));
    assert_eq!(store.wire_id("7"), Some(7));
    assert_eq!(store.identity().to_node_id(2), Some("a"));
}

#[test]
fn scenario_b_frame_moves_node_and_instance() {
    let (mut store, instances, _bridge) = pipeline(16);

    let outcome = store.apply_position_frame(&position_frame(vec![3.0, 1.0, 2.0, 3.0]));
    assert_eq!(outcome, FrameOutcome::Applied { records: 1, skipped: 0 });
    assert_eq!(store.node("3").unwrap().position, Vec3::new(1.0, 2.0, 3.0));

    let mut instances = instances.borrow_mut();
    assert_eq!(instances.state("3"), SlotState::Active);
    assert_eq!(instances.state("a"), SlotState::Unseen);
    assert_eq!(instances.flush_pending(), 1);

    let row = instances.rows()[instances.slot_of("3").unwrap()];
    assert_eq!(&row.model[3][..3], &[1.0, 2.0, 3.0]);
    assert!(instances.take_upload().is_some());
}

#[test]
fn scenario_c_nan_component_clamped_node_stays_visible() {
    let (mut store, instances, _bridge) = pipeline(16);
    let start = Instant::now();

    store.apply_position_frame_at(&position_frame(vec![2.0, 4.0, 5.0, 6.0]), start);
    store.apply_position_frame_at(
        &position_frame(vec![2.0, 8.0, f32::NAN, 9.0]),
        start + Duration::from_millis(33),
    );

    assert_eq!(store.node("a").unwrap().position, Vec3::new(8.0, 5.0, 9.0));

    let mut instances = instances.borrow_mut();
    instances.flush_pending();
    instances.update_visibility_and_lod(Vec3::ZERO);
    let slot = instances.slot("a").unwrap();
    assert_eq!(slot.position, Vec3::new(8.0, 5.0, 9.0));
    assert_eq!(slot.visibility, Visibility::Visible);
}

#[test]
fn scenario_d_remove_node_prunes_edges_and_slot() {
    let (mut store, instances, _bridge) = pipeline(16);
    store.apply_position_frame(&position_frame(vec![
        2.0, 1.0, 1.0, 1.0, //
        7.0, 2.0, 2.0, 2.0,
    ]));

    store.remove_node("a");

    assert!(store.edges().iter().all(|e| !e.touches("a")));
    assert_eq!(store.edge_count(), 1);
    let instances = instances.borrow();
    assert_eq!(instances.state("a"), SlotState::Removed);
    assert_eq!(instances.count(), 1);
    assert_eq!(instances.node_at(0), Some("7"));
}

#[test]
fn scenario_e_second_frame_within_window_dropped() {
    let (mut store, instances, _bridge) = pipeline(16);
    let start = Instant::now();

    let first = store.apply_position_frame_at(&position_frame(vec![7.0, 1.0, 1.0, 1.0]), start);
    let second = store.apply_position_frame_at(
        &position_frame(vec![7.0, 5.0, 5.0, 5.0]),
        start + Duration::from_millis(5),
    );

    assert!(matches!(first, FrameOutcome::Applied { .. }));
    assert_eq!(second, FrameOutcome::Suppressed);
    assert_eq!(store.node("7").unwrap().position, Vec3::ONE);
    assert_eq!(instances.borrow().slot("7").unwrap().position, Vec3::ONE);
    assert_eq!(store.stats().frames_suppressed, 1);
}

#[test]
fn encoded_store_round_trips_through_bytes() {
    let mut store = GraphStore::default();
    let nodes = (0..200)
        .map(|i| {
            let id = if i % 2 == 0 { format!("{}", i + 1000) } else { format!("n{i}") };
            Node::new(id, Vec3::new(i as f32, -(i as f32) * 0.5, 0.25))
                .with_velocity(Vec3::new(0.0, 1.0, i as f32))
        })
        .collect();
    store.set_graph_data(GraphData::new(nodes, Vec::new()));

    let codec = PositionCodec::new(RecordLayout::PositionVelocity);
    let bytes = store.encode_positions(RecordLayout::PositionVelocity).to_bytes();
    let decoded = codec.decode_bytes(&bytes).unwrap();

    assert_eq!(decoded.records.len(), store.node_count());
    for (record, node) in decoded.records.iter().zip(store.nodes()) {
        assert_eq!(Some(record.wire_id), store.wire_id(&node.id));
        assert_eq!(record.position, node.position);
        assert_eq!(record.velocity, node.velocity);
    }
}

#[test]
fn capacity_rejection_leaves_existing_slots_intact() {
    let (mut store, instances, _bridge) = pipeline(2);

    store.apply_position_frame(&position_frame(vec![
        3.0, 1.0, 0.0, 0.0, //
        2.0, 0.0, 1.0, 0.0, //
        7.0, 0.0, 0.0, 1.0,
    ]));

    let mut instances = instances.borrow_mut();
    instances.flush_pending();
    assert_eq!(instances.count(), 2);
    assert_eq!(instances.state("7"), SlotState::Unseen);
    assert_eq!(instances.slot("3").unwrap().position, Vec3::X);
    assert_eq!(instances.slot("a").unwrap().position, Vec3::Y);
    assert_eq!(instances.stats().rejected_upserts, 1);
}

#[test]
fn dispose_mid_stream_turns_callbacks_into_noops() {
    let (mut store, instances, _bridge) = pipeline(16);
    let start = Instant::now();
    store.apply_position_frame_at(&position_frame(vec![3.0, 1.0, 1.0, 1.0]), start);

    instances.borrow_mut().dispose();

    let outcome = store.apply_position_frame_at(
        &position_frame(vec![3.0, 2.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0]),
        start + Duration::from_millis(20),
    );
    store.remove_node("a");

    assert_eq!(outcome, FrameOutcome::Applied { records: 2, skipped: 0 });
    assert_eq!(store.stats().listener_failures, 0);
    let mut instances = instances.borrow_mut();
    assert_eq!(instances.count(), 0);
    assert_eq!(instances.upsert("3", Vec3::ZERO, None, None), UpsertOutcome::Ignored);
    assert_eq!(instances.flush_pending(), 0);
}

#[test]
fn snapshot_json_feeds_the_pipeline() {
    let json = br#"{
        "nodes": [
            {"id": "10", "position": {"x": 1, "y": 2, "z": 3}},
            {"id": "alpha", "metadata": {"importance": "2"}}
        ],
        "edges": [
            {"source": "10", "target": "alpha"},
            {"source": "10", "target": "missing"}
        ]
    }"#;
    let mut store = GraphStore::default();
    store.set_graph_data(GraphData::from_json(json).unwrap());

    assert_eq!(store.node_count(), 2);
    assert_eq!(store.edge_count(), 1);
    assert_eq!(store.wire_id("10"), Some(10));
    assert_eq!(store.wire_id("alpha"), Some(2));
    assert_eq!(store.node("alpha").unwrap().position, Vec3::ZERO);

    let frame = PositionCodec::new(RecordLayout::Position)
        .encode(&[PositionRecord::new(2, Vec3::new(4.0, 4.0, 4.0))]);
    store.apply_position_frame(&frame);
    assert_eq!(store.node("alpha").unwrap().position, Vec3::splat(4.0));
}
