mod lod;
mod slot;
mod store;

pub use lod::{DetailTier, LodConfig, Visibility};
pub use slot::{DirtyFlags, InstanceRaw, InstanceSlot};
pub use store::{IMPORTANCE_KEY, InstanceStats, InstanceStore, SlotState, UpsertOutcome};
