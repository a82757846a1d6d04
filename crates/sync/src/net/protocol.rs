use glam::Vec3;

use crate::identity::WireId;

pub const POSITION_STRIDE: usize = 4;
pub const POSITION_VELOCITY_STRIDE: usize = 7;
pub const FLOAT_BYTES: usize = std::mem::size_of::<f32>();

/// Fields per record: `id, x, y, z` or `id, x, y, z, vx, vy, vz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordLayout {
    #[default]
    Position,
    PositionVelocity,
}

impl RecordLayout {
    pub fn stride(self) -> usize {
        match self {
            Self::Position => POSITION_STRIDE,
            Self::PositionVelocity => POSITION_VELOCITY_STRIDE,
        }
    }

    pub fn from_stride(stride: usize) -> Option<Self> {
        match stride {
            POSITION_STRIDE => Some(Self::Position),
            POSITION_VELOCITY_STRIDE => Some(Self::PositionVelocity),
            _ => None,
        }
    }

    pub fn has_velocity(self) -> bool {
        matches!(self, Self::PositionVelocity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRecord {
    pub wire_id: WireId,
    pub position: Vec3,
    pub velocity: Option<Vec3>,
}

impl PositionRecord {
    pub fn new(wire_id: WireId, position: Vec3) -> Self {
        Self {
            wire_id,
            position,
            velocity: None,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = Some(velocity);
        self
    }
}

/// A sparse position patch as it travels on the wire: a flat `f32` array in
/// fixed strides, native byte order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionFrame {
    pub layout: RecordLayout,
    pub data: Vec<f32>,
}

impl PositionFrame {
    pub fn new(layout: RecordLayout, data: Vec<f32>) -> Self {
        Self { layout, data }
    }

    pub fn record_count(&self) -> usize {
        self.data.len() / self.layout.stride()
    }

    pub fn trailing_floats(&self) -> usize {
        self.data.len() % self.layout.stride()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.data).to_vec()
    }

    pub fn from_bytes(layout: RecordLayout, bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() % FLOAT_BYTES != 0 {
            return Err(FrameError::ByteLength(bytes.len()));
        }
        // Incoming byte buffers carry no alignment guarantee.
        let data = bytemuck::pod_collect_to_vec::<u8, f32>(bytes);
        Ok(Self { layout, data })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecodedFrame {
    pub records: Vec<PositionRecord>,
    /// Records dropped because their id field was not a usable wire id.
    pub malformed: usize,
    /// Floats left over after the last whole record.
    pub truncated_floats: usize,
}

impl DecodedFrame {
    pub fn dropped(&self) -> usize {
        self.malformed + usize::from(self.truncated_floats > 0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("byte length {0} is not a whole number of f32 fields")]
    ByteLength(usize),
    #[error("invalid wire id field: {0}")]
    InvalidWireId(f32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_lookup() {
        assert_eq!(RecordLayout::Position.stride(), 4);
        assert_eq!(RecordLayout::PositionVelocity.stride(), 7);
        assert_eq!(RecordLayout::from_stride(7), Some(RecordLayout::PositionVelocity));
        assert_eq!(RecordLayout::from_stride(5), None);
    }

    #[test]
    fn frame_bytes_roundtrip() {
        let frame = PositionFrame::new(RecordLayout::Position, vec![3.0, 1.0, 2.0, 3.0]);
        let bytes = frame.to_bytes();

        assert_eq!(bytes.len(), 16);
        let parsed = PositionFrame::from_bytes(RecordLayout::Position, &bytes).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn rejects_partial_float() {
        let err = PositionFrame::from_bytes(RecordLayout::Position, &[0u8; 10]).unwrap_err();
        assert!(matches!(err, FrameError::ByteLength(10)));
    }

    #[test]
    fn unaligned_bytes_are_accepted() {
        let frame = PositionFrame::new(RecordLayout::Position, vec![5.0, -1.5, 0.25, 8.0]);
        let mut bytes = vec![0u8];
        bytes.extend(frame.to_bytes());

        let parsed = PositionFrame::from_bytes(RecordLayout::Position, &bytes[1..]).unwrap();
        assert_eq!(parsed.data, frame.data);
    }
}
