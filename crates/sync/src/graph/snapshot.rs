//! Lenient parsing of the snapshot exchange payload.
//!
//! Records are decoded one at a time so a malformed node or edge costs only
//! that record. Missing positions default to the origin, missing metadata
//! to empty, missing edge ids to `source->target`. Nodes without an id and
//! edges without both endpoints cannot be defaulted and are skipped.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::Deserialize;
use serde_json::Value;

use super::types::{Edge, GraphData, Metadata, Node};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("invalid snapshot json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct RawGraph {
    #[serde(default)]
    nodes: Vec<Value>,
    #[serde(default, alias = "links")]
    edges: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVec3 {
    Array(Vec<f32>),
    Object {
        #[serde(default)]
        x: f32,
        #[serde(default)]
        y: f32,
        #[serde(default)]
        z: f32,
    },
}

impl From<RawVec3> for Vec3 {
    fn from(raw: RawVec3) -> Self {
        match raw {
            RawVec3::Array(v) => Vec3::new(
                v.first().copied().unwrap_or(0.0),
                v.get(1).copied().unwrap_or(0.0),
                v.get(2).copied().unwrap_or(0.0),
            ),
            RawVec3::Object { x, y, z } => Vec3::new(x, y, z),
        }
    }
}

#[derive(Deserialize)]
struct RawNode {
    id: Option<RawId>,
    position: Option<RawVec3>,
    velocity: Option<RawVec3>,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct RawEdge {
    id: Option<RawId>,
    source: Option<RawId>,
    target: Option<RawId>,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
}

fn flatten_metadata(raw: BTreeMap<String, Value>) -> Metadata {
    raw.into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| match v {
            Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect()
}

fn parse_node(index: usize, value: Value) -> Option<Node> {
    let raw: RawNode = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("Skipping snapshot node #{}: {}", index, e);
            return None;
        }
    };

    let Some(id) = raw.id else {
        log::warn!("Skipping snapshot node #{}: missing id", index);
        return None;
    };

    Some(Node {
        id: id.into_string(),
        position: raw.position.map(Vec3::from).unwrap_or(Vec3::ZERO),
        velocity: raw.velocity.map(Vec3::from),
        metadata: flatten_metadata(raw.metadata),
    })
}

fn parse_edge(index: usize, value: Value) -> Option<Edge> {
    let raw: RawEdge = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("Skipping snapshot edge #{}: {}", index, e);
            return None;
        }
    };

    let (Some(source), Some(target)) = (raw.source, raw.target) else {
        log::warn!("Skipping snapshot edge #{}: missing endpoint", index);
        return None;
    };
    let (source, target) = (source.into_string(), target.into_string());
    let id = raw
        .id
        .map(RawId::into_string)
        .unwrap_or_else(|| Edge::default_id(&source, &target));

    Some(Edge {
        id,
        source,
        target,
        metadata: flatten_metadata(raw.metadata),
    })
}

impl GraphData {
    pub fn from_json(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let raw: RawGraph = serde_json::from_slice(bytes)?;

        let nodes = raw
            .nodes
            .into_iter()
            .enumerate()
            .filter_map(|(i, v)| parse_node(i, v))
            .collect();
        let edges = raw
            .edges
            .into_iter()
            .enumerate()
            .filter_map(|(i, v)| parse_edge(i, v))
            .collect();

        Ok(Self { nodes, edges })
    }

    pub fn to_json(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(serde_json::to_vec(self)?)
    }
}
