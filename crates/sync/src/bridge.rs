//! Feeds a graph store's notifications into a shared instance store.

use std::cell::{RefCell, RefMut};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::graph::{
    GraphData, GraphStore, ListenerError, Metadata, PositionUpdate, SubscriptionId,
};
use crate::instance::{InstanceStore, UpsertOutcome};

pub type SharedInstances = Rc<RefCell<InstanceStore>>;

/// Subscriptions held on behalf of one instance store.
#[derive(Debug)]
pub struct InstanceBridge {
    graph: SubscriptionId,
    positions: SubscriptionId,
}

impl InstanceBridge {
    /// Position updates activate and move slots; a node's first slot is
    /// scaled from the metadata of the last graph change. Graph changes drop
    /// slots for nodes that left the graph and refresh metadata on active
    /// ones; nodes without a slot are not allocated one until they move.
    pub fn attach(store: &mut GraphStore, instances: SharedInstances) -> Self {
        let metadata: Rc<RefCell<HashMap<String, Metadata>>> = Rc::default();

        let shared = instances.clone();
        let known = metadata.clone();
        let positions = store.on_position_update(move |updates: &[PositionUpdate]| {
            let mut instances = borrow(&shared)?;
            let known = known.borrow();
            for update in updates {
                let meta = match instances.slot_of(&update.node_id) {
                    Some(_) => None,
                    None => known.get(&update.node_id),
                };
                instances.upsert(&update.node_id, update.position, update.velocity, meta);
            }
            Ok(())
        });

        let graph = store.on_graph_data_change(move |data: &GraphData| {
            *metadata.borrow_mut() = data
                .nodes
                .iter()
                .map(|n| (n.id.clone(), n.metadata.clone()))
                .collect();
            let mut instances = borrow(&instances)?;
            reconcile(&mut instances, data);
            Ok(())
        });

        Self { graph, positions }
    }

    pub fn detach(self, store: &mut GraphStore) {
        store.unsubscribe(self.graph);
        store.unsubscribe(self.positions);
    }
}

fn borrow(instances: &SharedInstances) -> Result<RefMut<'_, InstanceStore>, ListenerError> {
    instances
        .try_borrow_mut()
        .map_err(|_| ListenerError::new("instance store is already borrowed"))
}

fn reconcile(instances: &mut InstanceStore, data: &GraphData) {
    if instances.is_disposed() {
        return;
    }

    let live: HashSet<&str> = data.nodes.iter().map(|n| n.id.as_str()).collect();
    let stale: Vec<String> = instances
        .slots()
        .iter()
        .filter(|slot| !live.contains(slot.node_id.as_str()))
        .map(|slot| slot.node_id.clone())
        .collect();
    for node_id in &stale {
        instances.remove(node_id);
    }

    for node in &data.nodes {
        if instances.slot_of(&node.id).is_none() {
            continue;
        }
        let outcome =
            instances.upsert(&node.id, node.position, node.velocity, Some(&node.metadata));
        debug_assert!(matches!(outcome, UpsertOutcome::Updated(_)));
    }

    if !stale.is_empty() {
        log::debug!("Released {} instance slots for removed nodes", stale.len());
    }
}
