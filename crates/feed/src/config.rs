use std::path::PathBuf;
use std::time::Duration;

use graphsync::{RecordLayout, SyncConfig};

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Snapshot to load instead of generating a synthetic graph.
    pub snapshot: Option<PathBuf>,
    pub nodes: usize,
    pub edges_per_node: usize,
    /// Frames the producer sends before closing the stream. Zero streams
    /// until interrupted.
    pub frames: u64,
    pub producer_rate: u32,
    pub render_rate: u32,
    pub layout: RecordLayout,
    /// Chance per record that one component is replaced with garbage.
    pub corrupt_rate: f32,
    pub seed: u64,
    pub auto_grow: bool,
    pub sync: SyncConfig,
}

impl FeedConfig {
    pub fn producer_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.producer_rate.max(1) as f64)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.render_rate.max(1) as f64)
    }
}
