use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Instant;

use glam::Vec3;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use graphsync::{
    Edge, GraphData, IdentityCodec, Node, PositionCodec, PositionRecord, RecordLayout, WireId,
};

const WORLD_RADIUS: f32 = 500.0;
const MAX_SPEED: f32 = 40.0;

/// Deterministic hash-chained generator.
#[derive(Debug, Clone)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn clock_seed() -> u64 {
        let mut hasher = DefaultHasher::new();
        Instant::now().hash(&mut hasher);
        hasher.finish()
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.state.hash(&mut hasher);
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        hasher.finish()
    }

    /// Uniform in `[0, 1)`.
    pub fn unit(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    pub fn signed(&mut self) -> f32 {
        self.unit() * 2.0 - 1.0
    }

    pub fn below(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        (self.next_u64() % n as u64) as usize
    }

    pub fn vec3(&mut self, extent: f32) -> Vec3 {
        Vec3::new(self.signed(), self.signed(), self.signed()) * extent
    }
}

/// Random graph with a mix of numeric and textual node ids, so both wire id
/// paths get exercised.
pub fn synthetic_graph(nodes: usize, edges_per_node: usize, rng: &mut SimRng) -> GraphData {
    let nodes: Vec<Node> = (0..nodes)
        .map(|i| {
            let id = if i % 3 == 2 { format!("node-{i}") } else { format!("{}", i + 1) };
            let importance = rng.below(10);
            Node::new(id, rng.vec3(WORLD_RADIUS * 0.5))
                .with_metadata("importance", importance.to_string())
        })
        .collect();

    let mut edges = Vec::new();
    if nodes.len() > 1 {
        for (i, node) in nodes.iter().enumerate() {
            for _ in 0..edges_per_node {
                let j = rng.below(nodes.len());
                if j != i {
                    edges.push(Edge::new(
                        Edge::default_id(&node.id, &nodes[j].id),
                        node.id.clone(),
                        nodes[j].id.clone(),
                    ));
                }
            }
        }
    }

    GraphData::new(nodes, edges)
}

#[derive(Debug, Clone)]
struct Body {
    wire_id: WireId,
    position: Vec3,
    velocity: Vec3,
}

/// Remote side of the feed: owns the authoritative motion and emits binary
/// position frames keyed by the wire ids both sides derive from the same
/// snapshot.
pub struct Simulation {
    codec: PositionCodec,
    bodies: Vec<Body>,
    rng: SimRng,
    corrupt_rate: f32,
    frames_sent: u64,
    corrupted: u64,
}

impl Simulation {
    pub fn from_graph(data: &GraphData, layout: RecordLayout, corrupt_rate: f32, seed: u64) -> Self {
        let mut identity = IdentityCodec::new();
        identity.build_mapping(data.nodes.iter().map(|n| n.id.as_str()));

        let bodies = data
            .nodes
            .iter()
            .filter_map(|node| {
                Some(Body {
                    wire_id: identity.to_wire_id(&node.id)?,
                    position: node.position,
                    velocity: node.velocity.unwrap_or(Vec3::ZERO),
                })
            })
            .collect();

        Self {
            codec: PositionCodec::new(layout),
            bodies,
            rng: SimRng::new(seed),
            corrupt_rate: corrupt_rate.clamp(0.0, 1.0),
            frames_sent: 0,
            corrupted: 0,
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn corrupted(&self) -> u64 {
        self.corrupted
    }

    /// Advances every body one step and encodes the result.
    pub fn step(&mut self, dt: f32) -> Vec<u8> {
        for body in &mut self.bodies {
            body.velocity += self.rng.vec3(MAX_SPEED) * dt;
            body.velocity = body.velocity.clamp_length_max(MAX_SPEED);
            body.position += body.velocity * dt;
            if body.position.length() > WORLD_RADIUS {
                body.velocity = -body.velocity;
                body.position = body.position.clamp_length_max(WORLD_RADIUS);
            }
        }

        let records: Vec<PositionRecord> = self
            .bodies
            .iter()
            .map(|body| PositionRecord::new(body.wire_id, body.position).with_velocity(body.velocity))
            .collect();
        let mut frame = self.codec.encode(&records);

        if self.corrupt_rate > 0.0 {
            let stride = frame.layout.stride();
            for record in frame.data.chunks_exact_mut(stride) {
                if self.rng.unit() >= self.corrupt_rate {
                    continue;
                }
                let field = 1 + self.rng.below(stride - 1);
                record[field] = match self.rng.below(3) {
                    0 => f32::NAN,
                    1 => f32::INFINITY,
                    _ => 1.0e9,
                };
                self.corrupted += 1;
            }
        }

        self.frames_sent += 1;
        frame.to_bytes()
    }
}

/// Streams frames until `frames` have been sent or the receiver goes away.
pub async fn run_producer(
    mut simulation: Simulation,
    frames: u64,
    interval: std::time::Duration,
    tx: mpsc::Sender<Vec<u8>>,
) -> Simulation {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let dt = interval.as_secs_f32();

    while frames == 0 || simulation.frames_sent < frames {
        ticker.tick().await;
        let bytes = simulation.step(dt);
        if tx.send(bytes).await.is_err() {
            log::debug!("Frame receiver closed, stopping producer");
            break;
        }
    }

    log::info!(
        "Producer finished after {} frames ({} corrupted values)",
        simulation.frames_sent,
        simulation.corrupted()
    );
    simulation
}
