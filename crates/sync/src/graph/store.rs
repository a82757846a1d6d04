use std::collections::HashMap;
use std::time::Instant;

use glam::Vec3;

use crate::config::StoreConfig;
use crate::identity::{IdentityCodec, WireId};
use crate::net::{PositionCodec, PositionFrame, PositionRecord, RecordLayout};
use crate::validate::{Limits, repair_vec3};

use super::listeners::{ListenerResult, Listeners, SubscriptionId};
use super::stats::SyncStats;
use super::types::{Edge, GraphData, Node, PositionUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Applied { records: usize, skipped: usize },
    /// Arrived inside the duplicate window; nothing was applied.
    Suppressed,
}

/// Authoritative node/edge collection.
///
/// Structural changes notify graph listeners with the full collection.
/// Position frames are merged in place and reported only to position
/// listeners.
#[derive(Debug)]
pub struct GraphStore {
    config: StoreConfig,
    data: GraphData,
    node_index: HashMap<String, usize>,
    identity: IdentityCodec,
    graph_listeners: Listeners<GraphData>,
    position_listeners: Listeners<[PositionUpdate]>,
    next_subscription: u64,
    last_frame_at: Option<Instant>,
    stats: SyncStats,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl GraphStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            data: GraphData::default(),
            node_index: HashMap::new(),
            identity: IdentityCodec::new(),
            graph_listeners: Listeners::new("graph"),
            position_listeners: Listeners::new("position"),
            next_subscription: 1,
            last_frame_at: None,
            stats: SyncStats::default(),
        }
    }

    pub fn set_graph_data(&mut self, data: GraphData) {
        let GraphData { nodes, edges } = data;
        let limits = self.config.limits;

        let mut kept: Vec<Node> = Vec::with_capacity(nodes.len());
        let mut node_index = HashMap::with_capacity(nodes.len());
        let mut repaired = 0;
        for mut node in nodes {
            repaired += sanitize_node(&limits, &mut node, None);
            match node_index.get(&node.id) {
                Some(&i) => {
                    log::debug!("Duplicate node {} in snapshot, keeping the later record", node.id);
                    kept[i] = node;
                }
                None => {
                    node_index.insert(node.id.clone(), kept.len());
                    kept.push(node);
                }
            }
        }

        let edge_count = edges.len();
        let mut kept_edges: Vec<Edge> = Vec::with_capacity(edge_count);
        let mut edge_index: HashMap<String, usize> = HashMap::with_capacity(edge_count);
        for edge in edges {
            if !node_index.contains_key(&edge.source) || !node_index.contains_key(&edge.target) {
                continue;
            }
            match edge_index.get(&edge.id) {
                Some(&i) => kept_edges[i] = edge,
                None => {
                    edge_index.insert(edge.id.clone(), kept_edges.len());
                    kept_edges.push(edge);
                }
            }
        }
        let pruned = edge_count - kept_edges.len();
        if pruned > 0 {
            log::warn!("Dropped {} snapshot edges with missing endpoints or duplicate ids", pruned);
        }

        self.identity.build_mapping(kept.iter().map(|n| n.id.as_str()));
        self.node_index = node_index;
        self.data = GraphData::new(kept, kept_edges);
        self.stats.snapshots_applied += 1;
        self.stats.repaired_values += repaired as u64;

        log::info!(
            "Applied graph snapshot: {} nodes, {} edges",
            self.data.nodes.len(),
            self.data.edges.len()
        );
        self.notify_graph();
    }

    pub fn apply_position_frame(&mut self, frame: &PositionFrame) -> FrameOutcome {
        self.apply_position_frame_at(frame, Instant::now())
    }

    pub fn apply_position_frame_at(&mut self, frame: &PositionFrame, now: Instant) -> FrameOutcome {
        if let Some(last) = self.last_frame_at {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.config.duplicate_window {
                self.stats.frames_suppressed += 1;
                log::debug!(
                    "Skipping position frame {:?} after the previous one (window {:?})",
                    elapsed,
                    self.config.duplicate_window
                );
                return FrameOutcome::Suppressed;
            }
        }
        self.last_frame_at = Some(now);

        let decoded = PositionCodec::new(frame.layout).decode(frame);
        self.stats.malformed_records += decoded.malformed as u64;
        if decoded.truncated_floats > 0 {
            self.stats.truncated_frames += 1;
        }

        let limits = self.config.limits;
        let mut updates = Vec::with_capacity(decoded.records.len());
        let mut unknown = 0;

        for record in &decoded.records {
            let Some(index) = self
                .identity
                .to_node_id(record.wire_id)
                .and_then(|id| self.node_index.get(id).copied())
            else {
                unknown += 1;
                continue;
            };
            let node = &mut self.data.nodes[index];

            let mut position = record.position;
            let mut repaired = repair_vec3(&mut position, node.position, limits.max_position);
            let mut velocity = record.velocity;
            if let Some(v) = velocity.as_mut() {
                let fallback = node.velocity.unwrap_or(Vec3::ZERO);
                repaired += repair_vec3(v, fallback, limits.max_velocity);
            }
            if repaired > 0 {
                log::warn!(
                    "Repaired {} invalid components in position record for node {}",
                    repaired,
                    node.id
                );
                self.stats.repaired_values += repaired as u64;
            }

            node.position = position;
            if velocity.is_some() {
                node.velocity = velocity;
            }
            updates.push(PositionUpdate {
                node_id: node.id.clone(),
                wire_id: record.wire_id,
                position,
                velocity,
            });
        }

        if unknown > 0 {
            log::debug!("Skipped {} records with unknown wire ids", unknown);
        }
        self.stats.unknown_wire_ids += unknown as u64;
        self.stats.frames_applied += 1;
        self.stats.records_applied += updates.len() as u64;

        if !updates.is_empty() {
            let failures = self.position_listeners.notify(updates.as_slice());
            self.stats.listener_failures += failures as u64;
        }

        FrameOutcome::Applied {
            records: updates.len(),
            skipped: unknown + decoded.dropped(),
        }
    }

    /// Inserts or replaces a node by id. Returns true when the id was new.
    pub fn add_node(&mut self, mut node: Node) -> bool {
        let previous = self.node_index.get(&node.id).map(|&i| &self.data.nodes[i]);
        let repaired = sanitize_node(&self.config.limits, &mut node, previous);
        self.stats.repaired_values += repaired as u64;

        let inserted = match self.node_index.get(&node.id) {
            Some(&i) => {
                self.data.nodes[i] = node;
                false
            }
            None => {
                self.identity.assign(&node.id);
                self.node_index.insert(node.id.clone(), self.data.nodes.len());
                self.data.nodes.push(node);
                true
            }
        };

        self.notify_graph();
        inserted
    }

    /// Removes a node and every edge that references it.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let index = self.node_index.remove(id)?;
        let node = self.data.nodes.remove(index);
        for (i, shifted) in self.data.nodes.iter().enumerate().skip(index) {
            if let Some(slot) = self.node_index.get_mut(&shifted.id) {
                *slot = i;
            }
        }
        self.identity.release(id);

        let before = self.data.edges.len();
        self.data.edges.retain(|e| !e.touches(id));
        log::debug!(
            "Removed node {} and {} dependent edges",
            id,
            before - self.data.edges.len()
        );

        self.notify_graph();
        Some(node)
    }

    /// Inserts or replaces an edge by id. Edges whose endpoints are not both
    /// present are refused.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if !self.node_index.contains_key(&edge.source) || !self.node_index.contains_key(&edge.target)
        {
            log::warn!(
                "Refusing edge {}: endpoint {} or {} is not in the graph",
                edge.id,
                edge.source,
                edge.target
            );
            return false;
        }

        match self.data.edges.iter().position(|e| e.id == edge.id) {
            Some(i) => self.data.edges[i] = edge,
            None => self.data.edges.push(edge),
        }

        self.notify_graph();
        true
    }

    pub fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let index = self.data.edges.iter().position(|e| e.id == id)?;
        let edge = self.data.edges.remove(index);
        self.notify_graph();
        Some(edge)
    }

    /// Registers a graph-change listener and immediately calls it with the
    /// current state.
    pub fn on_graph_data_change<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&GraphData) -> ListenerResult + 'static,
    {
        let id = self.allocate_subscription();
        self.graph_listeners.insert(id, listener);
        if !self.graph_listeners.notify_one(id, &self.data) {
            self.stats.listener_failures += 1;
        }
        id
    }

    pub fn on_position_update<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&[PositionUpdate]) -> ListenerResult + 'static,
    {
        let id = self.allocate_subscription();
        self.position_listeners.insert(id, listener);
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.graph_listeners.remove(id) || self.position_listeners.remove(id)
    }

    /// Encodes every node in store order.
    pub fn encode_positions(&self, layout: RecordLayout) -> PositionFrame {
        let records: Vec<PositionRecord> = self
            .data
            .nodes
            .iter()
            .filter_map(|node| {
                self.identity.to_wire_id(&node.id).map(|wire_id| PositionRecord {
                    wire_id,
                    position: node.position,
                    velocity: node.velocity,
                })
            })
            .collect();
        PositionCodec::new(layout).encode(&records)
    }

    pub fn graph_data(&self) -> &GraphData {
        &self.data
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.data.nodes[i])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.data.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.data.edges
    }

    pub fn node_count(&self) -> usize {
        self.data.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.data.edges.len()
    }

    pub fn wire_id(&self, id: &str) -> Option<WireId> {
        self.identity.to_wire_id(id)
    }

    pub fn identity(&self) -> &IdentityCodec {
        &self.identity
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn notify_graph(&mut self) {
        let failures = self.graph_listeners.notify(&self.data);
        self.stats.listener_failures += failures as u64;
    }

    fn allocate_subscription(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        id
    }
}

fn sanitize_node(limits: &Limits, node: &mut Node, previous: Option<&Node>) -> usize {
    let position_fallback = previous.map_or(Vec3::ZERO, |p| p.position);
    let mut repaired = repair_vec3(&mut node.position, position_fallback, limits.max_position);

    if let Some(velocity) = node.velocity.as_mut() {
        let fallback = previous.and_then(|p| p.velocity).unwrap_or(Vec3::ZERO);
        repaired += repair_vec3(velocity, fallback, limits.max_velocity);
    }

    if repaired > 0 {
        log::warn!("Repaired {} invalid components on node {}", repaired, node.id);
    }
    repaired
}
