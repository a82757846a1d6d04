use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;

use graphsync::{
    FrameError, FrameOutcome, GraphData, GraphStore, InstanceBridge, InstanceStats, InstanceStore,
    PositionFrame, RecordLayout, SharedInstances, SyncConfig, SyncStats,
};

const CAMERA_RADIUS: f32 = 300.0;
const CAMERA_SPEED: f32 = 0.25;

/// Receiving side of the feed: graph store, instance store and the bridge
/// between them, driven by incoming frames and render ticks.
pub struct Viewer {
    store: GraphStore,
    instances: SharedInstances,
    bridge: Option<InstanceBridge>,
    layout: RecordLayout,
    auto_grow: bool,
    camera_angle: f32,
    rendered_frames: u64,
    uploaded_bytes: u64,
    rejected_frames: u64,
    seen_rejections: u64,
}

impl Viewer {
    pub fn new(config: SyncConfig, layout: RecordLayout, auto_grow: bool) -> Self {
        let mut store = GraphStore::new(config.store);
        let instances = Rc::new(RefCell::new(InstanceStore::new(config.instances)));
        let bridge = InstanceBridge::attach(&mut store, instances.clone());

        Self {
            store,
            instances,
            bridge: Some(bridge),
            layout,
            auto_grow,
            camera_angle: 0.0,
            rendered_frames: 0,
            uploaded_bytes: 0,
            rejected_frames: 0,
            seen_rejections: 0,
        }
    }

    pub fn load_snapshot(&mut self, data: GraphData) {
        self.store.set_graph_data(data);
    }

    pub fn handle_frame(&mut self, bytes: &[u8]) -> Result<FrameOutcome, FrameError> {
        let frame = PositionFrame::from_bytes(self.layout, bytes).inspect_err(|_| {
            self.rejected_frames += 1;
        })?;

        let outcome = self.store.apply_position_frame(&frame);
        if self.auto_grow {
            self.grow_on_rejection();
        }
        Ok(outcome)
    }

    fn grow_on_rejection(&mut self) {
        let mut instances = self.instances.borrow_mut();
        let rejected = instances.stats().rejected_upserts;
        if rejected > self.seen_rejections {
            self.seen_rejections = rejected;
            instances.grow();
        }
    }

    pub fn camera_position(&self) -> Vec3 {
        let (sin, cos) = self.camera_angle.sin_cos();
        Vec3::new(cos * CAMERA_RADIUS, CAMERA_RADIUS * 0.3, sin * CAMERA_RADIUS)
    }

    /// One render frame: integrate, flush pending rows and hand changed bytes
    /// to the (absent) GPU.
    pub fn render(&mut self, dt: f32) {
        self.camera_angle = (self.camera_angle + CAMERA_SPEED * dt) % std::f32::consts::TAU;
        let camera = self.camera_position();

        let mut instances = self.instances.borrow_mut();
        instances.advance(camera, dt);
        instances.flush_pending();
        if let Some(bytes) = instances.take_upload() {
            self.uploaded_bytes += bytes.len() as u64;
        }
        self.rendered_frames += 1;
    }

    pub fn log_progress(&self) {
        let stats = self.store.stats();
        let instances = self.instances.borrow();
        log::info!(
            "frames {} applied / {} suppressed, {} records, {} active slots ({} visible)",
            stats.frames_applied,
            stats.frames_suppressed,
            stats.records_applied,
            instances.count(),
            instances.stats().visible
        );
    }

    pub fn shutdown(&mut self) -> Summary {
        if let Some(bridge) = self.bridge.take() {
            bridge.detach(&mut self.store);
        }
        let mut instances = self.instances.borrow_mut();
        let summary = Summary {
            sync: self.store.stats().clone(),
            instances: instances.stats().clone(),
            nodes: self.store.node_count(),
            edges: self.store.edge_count(),
            active_slots: instances.count(),
            capacity: instances.capacity(),
            rendered_frames: self.rendered_frames,
            uploaded_bytes: self.uploaded_bytes,
            rejected_frames: self.rejected_frames,
        };
        instances.dispose();
        summary
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub sync: SyncStats,
    pub instances: InstanceStats,
    pub nodes: usize,
    pub edges: usize,
    pub active_slots: usize,
    pub capacity: usize,
    pub rendered_frames: u64,
    pub uploaded_bytes: u64,
    pub rejected_frames: u64,
}

impl Summary {
    pub fn log(&self) {
        log::info!(
            "Graph: {} nodes, {} edges; instances: {} active of {} capacity",
            self.nodes,
            self.edges,
            self.active_slots,
            self.capacity
        );
        log::info!(
            "Frames: {} applied, {} suppressed, {} rejected; records: {} applied, {} dropped, {} repaired values",
            self.sync.frames_applied,
            self.sync.frames_suppressed,
            self.rejected_frames,
            self.sync.records_applied,
            self.sync.records_dropped(),
            self.sync.repaired_values
        );
        log::info!(
            "Render: {} frames, {} flushes, {} rows written, {} bytes uploaded, {} rejected upserts",
            self.rendered_frames,
            self.instances.flushes,
            self.instances.rows_written,
            self.uploaded_bytes,
            self.instances.rejected_upserts
        );
        if self.sync.listener_failures > 0 {
            log::warn!("{} listener failures", self.sync.listener_failures);
        }
    }
}
