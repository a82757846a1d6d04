use std::collections::{HashMap, HashSet};

use bytemuck::Zeroable;
use glam::Vec3;

use crate::config::InstanceConfig;
use crate::graph::Metadata;
use crate::validate::{repair_vec3, validate_matrix, validate_vec3};

use super::slot::{DirtyFlags, InstanceRaw, InstanceSlot};

pub const IMPORTANCE_KEY: &str = "importance";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(usize),
    Updated(usize),
    /// Capacity exhausted; call `resize` or `grow` first.
    Rejected,
    /// The store has been disposed.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Unseen,
    Active,
    Removed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceStats {
    pub upserts: u64,
    pub rejected_upserts: u64,
    pub repaired_values: u64,
    pub skipped_matrix_writes: u64,
    pub integration_fallbacks: u64,
    pub flushes: u64,
    pub rows_written: u64,
    pub visible: usize,
    pub hidden: usize,
}

/// Transform rows for a single instanced draw call.
///
/// Slots occupy the dense range `[0, count)`. Writes are queued per slot and
/// reach the row buffer only in [`flush_pending`](Self::flush_pending);
/// after [`dispose`](Self::dispose) every mutator is a no-op.
#[derive(Debug)]
pub struct InstanceStore {
    config: InstanceConfig,
    capacity: usize,
    slots: Vec<InstanceSlot>,
    index_of: HashMap<String, usize>,
    removed: HashSet<String>,
    rows: Vec<InstanceRaw>,
    pending: Vec<usize>,
    needs_upload: bool,
    frame: u64,
    disposed: bool,
    stats: InstanceStats,
}

impl Default for InstanceStore {
    fn default() -> Self {
        Self::new(InstanceConfig::default())
    }
}

impl InstanceStore {
    pub fn new(config: InstanceConfig) -> Self {
        let capacity = config.initial_capacity;
        Self {
            config,
            capacity,
            slots: Vec::with_capacity(capacity),
            index_of: HashMap::with_capacity(capacity),
            removed: HashSet::new(),
            rows: vec![InstanceRaw::zeroed(); capacity],
            pending: Vec::new(),
            needs_upload: false,
            frame: 0,
            disposed: false,
            stats: InstanceStats::default(),
        }
    }

    pub fn upsert(
        &mut self,
        node_id: &str,
        position: Vec3,
        velocity: Option<Vec3>,
        metadata: Option<&Metadata>,
    ) -> UpsertOutcome {
        if self.disposed {
            return UpsertOutcome::Ignored;
        }
        self.stats.upserts += 1;

        let limits = self.config.limits;
        let existing = self.index_of.get(node_id).copied();
        let (last_position, last_velocity) = existing
            .map(|i| (self.slots[i].position, self.slots[i].velocity))
            .unwrap_or((Vec3::ZERO, Vec3::ZERO));

        let mut position = position;
        let mut repaired = repair_vec3(&mut position, last_position, limits.max_position);
        let velocity = velocity.map(|mut v| {
            repaired += repair_vec3(&mut v, last_velocity, limits.max_velocity);
            v
        });
        if repaired > 0 {
            log::warn!(
                "Clamped {} invalid components in instance update for node {}",
                repaired,
                node_id
            );
            self.stats.repaired_values += repaired as u64;
        }

        if let Some(index) = existing {
            let mut flags = DirtyFlags::TRANSFORM;
            let importance = metadata.map(importance_of);
            let scale = importance.map(|imp| Vec3::splat(self.scale_for(imp)));
            let slot = &mut self.slots[index];
            slot.position = position;
            if let Some(v) = velocity {
                slot.velocity = v;
            }
            if let (Some(importance), Some(scale)) = (importance, scale) {
                if importance != slot.importance {
                    slot.importance = importance;
                    slot.scale = scale;
                    flags |= DirtyFlags::APPEARANCE;
                }
            }
            queue(&mut self.pending, slot, index, flags);
            return UpsertOutcome::Updated(index);
        }

        if self.slots.len() >= self.capacity {
            self.stats.rejected_upserts += 1;
            log::warn!(
                "Instance capacity {} exhausted, rejecting node {}",
                self.capacity,
                node_id
            );
            return UpsertOutcome::Rejected;
        }

        let importance = metadata.map_or(0.0, importance_of);
        let index = self.slots.len();
        let mut slot = InstanceSlot::new(
            node_id.to_owned(),
            position,
            Vec3::splat(self.scale_for(importance)),
            importance,
        );
        slot.velocity = velocity.unwrap_or(Vec3::ZERO);
        queue(&mut self.pending, &mut slot, index, DirtyFlags::all());

        self.slots.push(slot);
        self.index_of.insert(node_id.to_owned(), index);
        self.removed.remove(node_id);
        self.refresh_visibility_counts();
        UpsertOutcome::Inserted(index)
    }

    /// Overrides the scale of an active slot. Returns false for unknown
    /// nodes or after disposal.
    pub fn set_scale(&mut self, node_id: &str, scale: Vec3) -> bool {
        if self.disposed {
            return false;
        }
        let Some(&index) = self.index_of.get(node_id) else {
            return false;
        };
        let slot = &mut self.slots[index];
        slot.scale = scale;
        queue(&mut self.pending, slot, index, DirtyFlags::TRANSFORM);
        true
    }

    /// Frees a node's slot. The last slot moves into the hole so the live
    /// range stays dense.
    pub fn remove(&mut self, node_id: &str) -> bool {
        if self.disposed {
            return false;
        }
        let Some(index) = self.index_of.remove(node_id) else {
            return false;
        };

        let last = self.slots.len() - 1;
        self.slots.swap_remove(index);
        self.rows[last] = InstanceRaw::zeroed();
        if index != last {
            let moved = &mut self.slots[index];
            self.index_of.insert(moved.node_id.clone(), index);
            moved.dirty = DirtyFlags::empty();
            queue(&mut self.pending, moved, index, DirtyFlags::all());
        }

        self.removed.insert(node_id.to_owned());
        self.needs_upload = true;
        self.refresh_visibility_counts();
        true
    }

    /// Writes every queued slot into the row buffer in one pass. Returns the
    /// number of rows written.
    pub fn flush_pending(&mut self) -> usize {
        if self.disposed || self.pending.is_empty() {
            return 0;
        }

        let mut written = 0;
        for index in std::mem::take(&mut self.pending) {
            let Some(slot) = self.slots.get_mut(index) else {
                continue;
            };
            if slot.dirty.is_empty() {
                continue;
            }
            let dirty = std::mem::take(&mut slot.dirty);
            let row = &mut self.rows[index];

            if dirty.contains(DirtyFlags::TRANSFORM) {
                let transform = slot.transform();
                if validate_matrix(&transform) {
                    row.model = transform.to_cols_array_2d();
                } else {
                    log::warn!(
                        "Skipping invalid transform for node {} at slot {}",
                        slot.node_id,
                        index
                    );
                    self.stats.skipped_matrix_writes += 1;
                }
            }
            if dirty.contains(DirtyFlags::APPEARANCE) {
                row.color = slot.color();
                row.tier = slot.tier as u32;
            }
            written += 1;
        }

        if written > 0 {
            self.needs_upload = true;
            self.stats.flushes += 1;
            self.stats.rows_written += written as u64;
        }
        written
    }

    /// Integrates stored velocities over `delta_time` and, every
    /// `lod_update_interval` frames, recomputes visibility and LOD.
    pub fn advance(&mut self, camera_position: Vec3, delta_time: f32) {
        if self.disposed {
            return;
        }

        if delta_time.is_finite() && delta_time > 0.0 {
            let max_position = self.config.limits.max_position;
            for (index, slot) in self.slots.iter_mut().enumerate() {
                if !slot.is_moving() {
                    continue;
                }
                let next = slot.position + slot.velocity * delta_time;
                if !validate_vec3(next, max_position) {
                    log::debug!(
                        "Integration left node {} out of range, keeping last good position",
                        slot.node_id
                    );
                    // Stop integrating until the next upsert supplies a velocity.
                    slot.velocity = Vec3::ZERO;
                    self.stats.integration_fallbacks += 1;
                    continue;
                }
                slot.position = next;
                queue(&mut self.pending, slot, index, DirtyFlags::TRANSFORM);
            }
        }

        self.frame = self.frame.wrapping_add(1);
        let interval = u64::from(self.config.lod_update_interval.max(1));
        if self.frame % interval == 0 {
            self.update_visibility_and_lod(camera_position);
        }
    }

    /// Reassigns detail tier and visibility for every slot from its distance
    /// to the camera. Returns the number of slots that changed.
    pub fn update_visibility_and_lod(&mut self, camera_position: Vec3) -> usize {
        if self.disposed {
            return 0;
        }
        if !camera_position.is_finite() {
            log::warn!("Ignoring LOD pass for non-finite camera position");
            return 0;
        }

        let mut changed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let distance = slot.position.distance(camera_position);
            let (tier, visibility) = self.config.lod.classify(distance);
            if tier != slot.tier || visibility != slot.visibility {
                slot.tier = tier;
                slot.visibility = visibility;
                queue(&mut self.pending, slot, index, DirtyFlags::APPEARANCE);
                changed += 1;
            }
        }

        self.refresh_visibility_counts();
        changed
    }

    /// Changes capacity. Fails if `capacity` is below the live count.
    pub fn resize(&mut self, capacity: usize) -> bool {
        if self.disposed {
            return false;
        }
        if capacity < self.slots.len() {
            log::warn!(
                "Cannot shrink instance capacity to {} below {} live slots",
                capacity,
                self.slots.len()
            );
            return false;
        }

        self.rows.resize(capacity, InstanceRaw::zeroed());
        log::info!("Instance capacity {} -> {}", self.capacity, capacity);
        self.capacity = capacity;
        true
    }

    pub fn grow(&mut self) -> bool {
        self.resize((self.capacity * 2).max(1))
    }

    /// Bytes of the live rows if anything changed since the last call.
    pub fn take_upload(&mut self) -> Option<&[u8]> {
        if self.disposed || !self.needs_upload {
            return None;
        }
        self.needs_upload = false;
        Some(bytemuck::cast_slice(&self.rows[..self.slots.len()]))
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.slots = Vec::new();
        self.index_of = HashMap::new();
        self.removed.clear();
        self.rows = Vec::new();
        self.pending.clear();
        self.needs_upload = false;
        self.capacity = 0;
        log::info!("Instance store disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn needs_upload(&self) -> bool {
        self.needs_upload
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn slot_of(&self, node_id: &str) -> Option<usize> {
        self.index_of.get(node_id).copied()
    }

    pub fn node_at(&self, index: usize) -> Option<&str> {
        self.slots.get(index).map(|s| s.node_id.as_str())
    }

    pub fn slot(&self, node_id: &str) -> Option<&InstanceSlot> {
        self.slot_of(node_id).map(|i| &self.slots[i])
    }

    pub fn slots(&self) -> &[InstanceSlot] {
        &self.slots
    }

    pub fn rows(&self) -> &[InstanceRaw] {
        &self.rows[..self.slots.len()]
    }

    pub fn state(&self, node_id: &str) -> SlotState {
        if self.index_of.contains_key(node_id) {
            SlotState::Active
        } else if self.removed.contains(node_id) {
            SlotState::Removed
        } else {
            SlotState::Unseen
        }
    }

    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_pending()).count()
    }

    pub fn stats(&self) -> &InstanceStats {
        &self.stats
    }

    fn scale_for(&self, importance: f32) -> f32 {
        let factor = (1.0 + importance.max(0.0).ln_1p()).min(self.config.max_importance_scale);
        self.config.base_scale * factor
    }

    fn refresh_visibility_counts(&mut self) {
        let visible = self
            .slots
            .iter()
            .filter(|s| s.visibility.is_visible())
            .count();
        self.stats.visible = visible;
        self.stats.hidden = self.slots.len() - visible;
    }
}

fn importance_of(metadata: &Metadata) -> f32 {
    metadata
        .get(IMPORTANCE_KEY)
        .and_then(|v| v.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map_or(0.0, |v| v.max(0.0))
}

/// Marks a slot dirty, queueing its index only on the clean-to-dirty edge so
/// repeated writes before a flush collapse into one.
fn queue(pending: &mut Vec<usize>, slot: &mut InstanceSlot, index: usize, flags: DirtyFlags) {
    if slot.dirty.is_empty() {
        pending.push(index);
    }
    slot.dirty |= flags;
}
