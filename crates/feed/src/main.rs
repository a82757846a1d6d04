mod config;
mod simulation;
mod viewer;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use config::FeedConfig;
use graphsync::{GraphData, Limits, RecordLayout, SyncConfig};
use simulation::{SimRng, Simulation, run_producer, synthetic_graph};
use viewer::Viewer;

#[derive(Parser)]
#[command(name = "graphsync-feed")]
#[command(about = "Streams simulated position frames through a graph and instance store")]
struct Args {
    #[arg(short, long, help = "JSON graph snapshot to load instead of a synthetic graph")]
    snapshot: Option<PathBuf>,

    #[arg(short, long, default_value_t = 2_000)]
    nodes: usize,

    #[arg(long, default_value_t = 2)]
    edges_per_node: usize,

    #[arg(short, long, default_value_t = 600, help = "Frames to stream (0 = until Ctrl-C)")]
    frames: u64,

    #[arg(long, default_value_t = 30, help = "Producer frames per second")]
    producer_rate: u32,

    #[arg(long, default_value_t = 60, help = "Render ticks per second")]
    render_rate: u32,

    #[arg(short, long, default_value_t = graphsync::config::DEFAULT_INSTANCE_CAPACITY)]
    capacity: usize,

    #[arg(long, default_value_t = 16, help = "Duplicate frame window in ms (0 disables)")]
    window_ms: u64,

    #[arg(long, help = "Send velocity alongside position")]
    velocity: bool,

    #[arg(long, default_value_t = 0.0, help = "Chance per record of a corrupted value (0-1)")]
    corrupt_rate: f32,

    #[arg(long, default_value_t = graphsync::validate::DEFAULT_MAX_POSITION)]
    max_position: f32,

    #[arg(long, help = "Double instance capacity when upserts are rejected")]
    auto_grow: bool,

    #[arg(long, help = "Seed for the synthetic graph and motion")]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> FeedConfig {
        let limits = Limits {
            max_position: self.max_position,
            ..Limits::default()
        };
        let mut sync = SyncConfig::default().with_limits(limits);
        sync.store.duplicate_window = Duration::from_millis(self.window_ms);
        sync.instances.initial_capacity = self.capacity;

        FeedConfig {
            snapshot: self.snapshot,
            nodes: self.nodes,
            edges_per_node: self.edges_per_node,
            frames: self.frames,
            producer_rate: self.producer_rate,
            render_rate: self.render_rate,
            layout: if self.velocity {
                RecordLayout::PositionVelocity
            } else {
                RecordLayout::Position
            },
            corrupt_rate: self.corrupt_rate,
            seed: self.seed.unwrap_or_else(SimRng::clock_seed),
            auto_grow: self.auto_grow,
            sync,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();
    let data = load_graph(&config).await?;
    log::info!(
        "Loaded graph with {} nodes and {} edges (seed {})",
        data.nodes.len(),
        data.edges.len(),
        config.seed
    );

    let simulation =
        Simulation::from_graph(&data, config.layout, config.corrupt_rate, config.seed);
    log::info!("Producer streaming {} bodies", simulation.body_count());

    let mut viewer = Viewer::new(config.sync.clone(), config.layout, config.auto_grow);
    viewer.load_snapshot(data);
    log::info!("Store holds {} wire ids", viewer.store().identity().len());

    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(8);
    let producer = tokio::spawn(run_producer(
        simulation,
        config.frames,
        config.producer_interval(),
        tx,
    ));

    let mut render = time::interval(config.render_interval());
    render.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_render = render.tick().await;
    let progress_every = u64::from(config.render_rate.max(1));
    let mut ticks = 0u64;
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(bytes) = frame else {
                    break;
                };
                if let Err(e) = viewer.handle_frame(&bytes) {
                    log::warn!("Discarding position frame: {}", e);
                }
            }
            now = render.tick() => {
                let dt = now.duration_since(last_render).as_secs_f32();
                last_render = now;
                viewer.render(dt);
                ticks += 1;
                if ticks % progress_every == 0 {
                    viewer.log_progress();
                }
            }
            _ = &mut interrupted => {
                log::info!("Interrupted");
                break;
            }
        }
    }

    drop(rx);
    viewer.render(config.render_interval().as_secs_f32());
    if let Err(e) = producer.await {
        log::error!("Producer task failed: {}", e);
    }

    viewer.shutdown().log();
    Ok(())
}

async fn load_graph(config: &FeedConfig) -> Result<GraphData> {
    match &config.snapshot {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading snapshot {}", path.display()))?;
            GraphData::from_json(&bytes)
                .with_context(|| format!("parsing snapshot {}", path.display()))
        }
        None => {
            let mut rng = SimRng::new(config.seed);
            Ok(synthetic_graph(config.nodes, config.edges_per_node, &mut rng))
        }
    }
}
