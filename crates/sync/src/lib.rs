pub mod bridge;
pub mod config;
pub mod graph;
pub mod identity;
pub mod instance;
pub mod net;
pub mod validate;

pub use bridge::{InstanceBridge, SharedInstances};
pub use config::{InstanceConfig, StoreConfig, SyncConfig};
pub use graph::{
    Edge, FrameOutcome, GraphData, GraphStore, ListenerError, ListenerResult, Metadata, Node,
    PositionUpdate, SnapshotError, SubscriptionId, SyncStats,
};
pub use identity::{IdentityCodec, MAX_WIRE_ID, NO_WIRE_ID, WireId};
pub use instance::{
    DetailTier, InstanceRaw, InstanceSlot, InstanceStats, InstanceStore, LodConfig, SlotState,
    UpsertOutcome, Visibility,
};
pub use net::{
    DecodedFrame, FrameError, PositionCodec, PositionFrame, PositionRecord, RecordLayout,
};
pub use validate::{Limits, clamp_vec3, repair_vec3, validate_matrix, validate_vec3};
