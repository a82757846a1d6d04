use std::time::Duration;

use crate::instance::LodConfig;
use crate::validate::Limits;

pub const DEFAULT_INSTANCE_CAPACITY: usize = 10_000;
pub const DEFAULT_DUPLICATE_WINDOW: Duration = Duration::from_millis(16);
pub const DEFAULT_LOD_UPDATE_INTERVAL: u32 = 10;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Position frames arriving closer together than this are dropped.
    /// Zero disables suppression.
    pub duplicate_window: Duration,
    pub limits: Limits,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            duplicate_window: DEFAULT_DUPLICATE_WINDOW,
            limits: Limits::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstanceConfig {
    pub initial_capacity: usize,
    pub limits: Limits,
    pub lod: LodConfig,
    /// Visibility and LOD are recomputed every this many frames.
    pub lod_update_interval: u32,
    pub base_scale: f32,
    pub max_importance_scale: f32,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INSTANCE_CAPACITY,
            limits: Limits::default(),
            lod: LodConfig::default(),
            lod_update_interval: DEFAULT_LOD_UPDATE_INTERVAL,
            base_scale: 1.0,
            max_importance_scale: 4.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    pub store: StoreConfig,
    pub instances: InstanceConfig,
}

impl SyncConfig {
    /// Applies one set of magnitude ceilings to both stores.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.store.limits = limits;
        self.instances.limits = limits;
        self
    }
}
