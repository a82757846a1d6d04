mod listeners;
mod snapshot;
mod stats;
mod store;
mod types;

pub use listeners::{ListenerError, ListenerResult, Listeners, SubscriptionId};
pub use snapshot::SnapshotError;
pub use stats::SyncStats;
pub use store::{FrameOutcome, GraphStore};
pub use types::{Edge, GraphData, Metadata, Node, PositionUpdate};
