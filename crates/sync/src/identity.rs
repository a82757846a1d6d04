use std::collections::HashMap;

/// Compact node identifier carried in position frames.
pub type WireId = u32;

/// Reserved: never assigned to a node.
pub const NO_WIRE_ID: WireId = 0;

/// Largest id an `f32` wire field represents exactly.
pub const MAX_WIRE_ID: WireId = 1 << 24;

/// Bidirectional map between stable node ids and wire ids.
///
/// Node ids that are canonical decimal integers in `1..=MAX_WIRE_ID` keep
/// their numeric value so they survive reconnects. Everything else gets
/// `index + 1` in snapshot order, or the next free id above it when that
/// value is already taken.
#[derive(Debug, Default)]
pub struct IdentityCodec {
    to_wire: HashMap<String, WireId>,
    to_node: HashMap<WireId, String>,
}

impl IdentityCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build_mapping<'a, I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.clear();
        let ids: Vec<&str> = ids.into_iter().collect();

        for id in &ids {
            if let Some(wire) = numeric_wire_id(id) {
                if !self.to_wire.contains_key(*id) && !self.to_node.contains_key(&wire) {
                    self.insert(id, wire);
                }
            }
        }

        // Ids from a node's `index + 1` up to the cursor are already taken.
        let mut cursor: WireId = 1;
        for (index, id) in ids.iter().enumerate() {
            if self.to_wire.contains_key(*id) {
                continue;
            }
            let start = u32::try_from(index + 1).unwrap_or(MAX_WIRE_ID).max(cursor);
            match self.next_free(start) {
                Some(wire) => {
                    self.insert(id, wire);
                    cursor = wire.saturating_add(1);
                }
                None => {
                    log::warn!("Wire id space exhausted, node {} left unmapped", id);
                    cursor = MAX_WIRE_ID.saturating_add(1);
                }
            }
        }
    }

    /// Maps a single node added after the snapshot. Returns the existing
    /// wire id if the node is already known.
    pub fn assign(&mut self, id: &str) -> Option<WireId> {
        if let Some(wire) = self.to_wire.get(id) {
            return Some(*wire);
        }

        let wire = match numeric_wire_id(id) {
            Some(wire) if !self.to_node.contains_key(&wire) => Some(wire),
            _ => {
                let start = u32::try_from(self.to_wire.len() + 1).unwrap_or(MAX_WIRE_ID);
                self.next_free(start)
            }
        };

        match wire {
            Some(wire) => {
                self.insert(id, wire);
                Some(wire)
            }
            None => {
                log::warn!("Wire id space exhausted, node {} left unmapped", id);
                None
            }
        }
    }

    pub fn release(&mut self, id: &str) -> Option<WireId> {
        let wire = self.to_wire.remove(id)?;
        self.to_node.remove(&wire);
        Some(wire)
    }

    pub fn to_wire_id(&self, id: &str) -> Option<WireId> {
        self.to_wire.get(id).copied()
    }

    pub fn to_node_id(&self, wire: WireId) -> Option<&str> {
        self.to_node.get(&wire).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.to_wire.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_wire.is_empty()
    }

    pub fn clear(&mut self) {
        self.to_wire.clear();
        self.to_node.clear();
    }

    fn insert(&mut self, id: &str, wire: WireId) {
        self.to_wire.insert(id.to_owned(), wire);
        self.to_node.insert(wire, id.to_owned());
    }

    fn next_free(&self, start: WireId) -> Option<WireId> {
        (start.max(1)..=MAX_WIRE_ID).find(|candidate| !self.to_node.contains_key(candidate))
    }
}

fn numeric_wire_id(id: &str) -> Option<WireId> {
    let value: WireId = id.parse().ok()?;
    // "007" and "+7" would alias "7"; only the canonical spelling is reused.
    if value == NO_WIRE_ID || value > MAX_WIRE_ID || value.to_string() != id {
        return None;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_reused_others_get_index() {
        let mut codec = IdentityCodec::new();
        codec.build_mapping(["3", "a", "7"]);

        assert_eq!(codec.to_wire_id("3"), Some(3));
        assert_eq!(codec.to_wire_id("a"), Some(2));
        assert_eq!(codec.to_wire_id("7"), Some(7));
        assert_eq!(codec.to_node_id(2), Some("a"));
        assert_eq!(codec.to_node_id(5), None);
    }

    #[test]
    fn fallback_skips_reserved_numeric_ids() {
        let mut codec = IdentityCodec::new();
        codec.build_mapping(["x", "1", "y"]);

        assert_eq!(codec.to_wire_id("1"), Some(1));
        assert_eq!(codec.to_wire_id("x"), Some(2));
        assert_eq!(codec.to_wire_id("y"), Some(3));
    }

    #[test]
    fn zero_and_non_canonical_take_fallback() {
        let mut codec = IdentityCodec::new();
        codec.build_mapping(["0", "07", "16777217"]);

        assert_eq!(codec.to_wire_id("0"), Some(1));
        assert_eq!(codec.to_wire_id("07"), Some(2));
        assert_eq!(codec.to_wire_id("16777217"), Some(3));
        assert_eq!(codec.to_node_id(NO_WIRE_ID), None);
    }

    #[test]
    fn fallback_after_numeric_block() {
        let mut codec = IdentityCodec::new();
        codec.build_mapping(["a", "b", "1", "2", "3", "c"]);

        assert_eq!(codec.to_wire_id("a"), Some(4));
        assert_eq!(codec.to_wire_id("b"), Some(5));
        assert_eq!(codec.to_wire_id("c"), Some(6));
    }

    #[test]
    fn text_ids_before_dense_numeric_ids() {
        let count = 20_000;
        let ids: Vec<String> = (0..count)
            .map(|i| format!("t{i}"))
            .chain((1..=count).map(|i| i.to_string()))
            .collect();
        let mut codec = IdentityCodec::new();
        codec.build_mapping(ids.iter().map(String::as_str));

        assert_eq!(codec.len(), ids.len());
        assert_eq!(codec.to_wire_id("7"), Some(7));
        assert_eq!(codec.to_wire_id("t0"), Some(count as WireId + 1));
        assert_eq!(codec.to_wire_id("t19999"), Some(2 * count as WireId));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let ids = ["n1", "42", "n3", "2"];
        let mut first = IdentityCodec::new();
        first.build_mapping(ids);
        let mut second = IdentityCodec::new();
        second.build_mapping(ids);
        second.build_mapping(ids);

        for id in ids {
            assert_eq!(first.to_wire_id(id), second.to_wire_id(id));
        }
        assert_eq!(second.len(), 4);
    }

    #[test]
    fn mapping_is_bijective() {
        let ids: Vec<String> = (0..500)
            .map(|i| if i % 3 == 0 { i.to_string() } else { format!("node-{i}") })
            .collect();
        let mut codec = IdentityCodec::new();
        codec.build_mapping(ids.iter().map(String::as_str));

        let mut seen = std::collections::HashSet::new();
        for id in &ids {
            let wire = codec.to_wire_id(id).unwrap();
            assert!(seen.insert(wire), "duplicate wire id {wire}");
            assert_eq!(codec.to_node_id(wire), Some(id.as_str()));
        }
    }

    #[test]
    fn assign_and_release() {
        let mut codec = IdentityCodec::new();
        codec.build_mapping(["a", "b"]);

        assert_eq!(codec.assign("9"), Some(9));
        assert_eq!(codec.assign("c"), Some(4));
        assert_eq!(codec.assign("c"), Some(4));

        assert_eq!(codec.release("a"), Some(1));
        assert_eq!(codec.to_node_id(1), None);
        assert_eq!(codec.release("a"), None);
    }
}
