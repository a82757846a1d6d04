use std::collections::BTreeMap;

use glam::Vec3;
use serde::Serialize;

use crate::identity::WireId;

pub type Metadata = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub position: Vec3,
    pub velocity: Option<Vec3>,
    pub metadata: Metadata,
}

impl Node {
    pub fn new(id: impl Into<String>, position: Vec3) -> Self {
        Self {
            id: id.into(),
            position,
            velocity: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub metadata: Metadata,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            metadata: Metadata::new(),
        }
    }

    /// Edge id used when a snapshot record carries none.
    pub fn default_id(source: &str, target: &str) -> String {
        format!("{source}->{target}")
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Full node/edge collection; the payload of every graph-change event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphData {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphData {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// One record of an applied position frame, already resolved to its
/// stable id and repaired.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub node_id: String,
    pub wire_id: WireId,
    pub position: Vec3,
    pub velocity: Option<Vec3>,
}
