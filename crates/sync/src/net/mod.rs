mod codec;
mod protocol;

pub use codec::PositionCodec;
pub use protocol::{
    DecodedFrame, FLOAT_BYTES, FrameError, POSITION_STRIDE, POSITION_VELOCITY_STRIDE,
    PositionFrame, PositionRecord, RecordLayout,
};
