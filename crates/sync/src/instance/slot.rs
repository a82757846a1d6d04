use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

use super::lod::{DetailTier, Visibility};

bitflags! {
    /// What a pending slot needs rewritten at the next flush.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DirtyFlags: u8 {
        const TRANSFORM = 1 << 0;
        const APPEARANCE = 1 << 1;
    }
}

/// One row of the instance buffer, laid out for direct upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub tier: u32,
    pub _padding: [u32; 3],
}

/// Render-side state for one active node. Position, rotation and scale are
/// kept apart and only composed when the row is written.
#[derive(Debug, Clone)]
pub struct InstanceSlot {
    pub node_id: String,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub velocity: Vec3,
    pub importance: f32,
    pub visibility: Visibility,
    pub tier: DetailTier,
    pub(crate) dirty: DirtyFlags,
}

impl InstanceSlot {
    pub(crate) fn new(node_id: String, position: Vec3, scale: Vec3, importance: f32) -> Self {
        Self {
            node_id,
            position,
            rotation: Quat::IDENTITY,
            scale,
            velocity: Vec3::ZERO,
            importance,
            visibility: Visibility::Visible,
            tier: DetailTier::High,
            dirty: DirtyFlags::empty(),
        }
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    pub fn is_moving(&self) -> bool {
        self.velocity != Vec3::ZERO
    }

    pub fn color(&self) -> [f32; 4] {
        [1.0, 1.0, 1.0, self.visibility.alpha()]
    }

    pub fn is_pending(&self) -> bool {
        !self.dirty.is_empty()
    }
}
