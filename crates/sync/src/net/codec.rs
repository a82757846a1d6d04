use glam::Vec3;

use crate::identity::{MAX_WIRE_ID, NO_WIRE_ID, WireId};

use super::protocol::{DecodedFrame, FrameError, PositionFrame, PositionRecord, RecordLayout};

/// Packs and unpacks position records for one record layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionCodec {
    layout: RecordLayout,
}

impl PositionCodec {
    pub fn new(layout: RecordLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// One record per input, in input order. Records without velocity are
    /// written with zero velocity under the velocity layout.
    pub fn encode<'a, I>(&self, records: I) -> PositionFrame
    where
        I: IntoIterator<Item = &'a PositionRecord>,
        I::IntoIter: ExactSizeIterator,
    {
        let records = records.into_iter();
        let mut data = Vec::with_capacity(records.len() * self.layout.stride());

        for record in records {
            data.push(record.wire_id as f32);
            data.extend_from_slice(&record.position.to_array());
            if self.layout.has_velocity() {
                data.extend_from_slice(&record.velocity.unwrap_or(Vec3::ZERO).to_array());
            }
        }

        PositionFrame::new(self.layout, data)
    }

    /// Walks `frame` in whole strides. A trailing partial record and records
    /// with an unusable id field are dropped and counted; the rest of the
    /// batch is still returned. Numeric validation of the payload is left to
    /// the consumer.
    pub fn decode(&self, frame: &PositionFrame) -> DecodedFrame {
        let stride = frame.layout.stride();
        let chunks = frame.data.chunks_exact(stride);
        let truncated_floats = chunks.remainder().len();

        let mut decoded = DecodedFrame {
            records: Vec::with_capacity(frame.data.len() / stride),
            malformed: 0,
            truncated_floats,
        };

        if truncated_floats > 0 {
            log::warn!(
                "Position frame truncated: dropping {} trailing floats (stride {})",
                truncated_floats,
                stride
            );
        }

        for chunk in chunks {
            let wire_id = match wire_id_from_field(chunk[0]) {
                Ok(id) => id,
                Err(e) => {
                    log::debug!("Dropping record: {}", e);
                    decoded.malformed += 1;
                    continue;
                }
            };

            let position = Vec3::new(chunk[1], chunk[2], chunk[3]);
            let velocity = frame
                .layout
                .has_velocity()
                .then(|| Vec3::new(chunk[4], chunk[5], chunk[6]));

            decoded.records.push(PositionRecord {
                wire_id,
                position,
                velocity,
            });
        }

        decoded
    }

    pub fn encode_bytes<'a, I>(&self, records: I) -> Vec<u8>
    where
        I: IntoIterator<Item = &'a PositionRecord>,
        I::IntoIter: ExactSizeIterator,
    {
        self.encode(records).to_bytes()
    }

    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<DecodedFrame, FrameError> {
        let frame = PositionFrame::from_bytes(self.layout, bytes)?;
        Ok(self.decode(&frame))
    }
}

fn wire_id_from_field(field: f32) -> Result<WireId, FrameError> {
    let in_range = field.is_finite() && field.fract() == 0.0 && field >= 1.0;
    if !in_range || field > MAX_WIRE_ID as f32 {
        return Err(FrameError::InvalidWireId(field));
    }
    let id = field as WireId;
    debug_assert_ne!(id, NO_WIRE_ID);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_exactly_sized() {
        let codec = PositionCodec::new(RecordLayout::PositionVelocity);
        let records = [
            PositionRecord::new(1, Vec3::ONE),
            PositionRecord::new(2, Vec3::ZERO).with_velocity(Vec3::X),
        ];

        let frame = codec.encode(&records);

        assert_eq!(frame.data.len(), 2 * 7);
        assert_eq!(&frame.data[7..], &[2.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn decode_reproduces_records() {
        let codec = PositionCodec::new(RecordLayout::PositionVelocity);
        let records: Vec<PositionRecord> = (1..=50)
            .map(|i| {
                let f = i as f32;
                PositionRecord::new(i, Vec3::new(f * 0.5, -f, f * 1.25))
                    .with_velocity(Vec3::new(0.1 * f, 0.0, -2.0))
            })
            .collect();

        let decoded = codec.decode_bytes(&codec.encode_bytes(&records)).unwrap();

        assert_eq!(decoded.records, records);
        assert_eq!(decoded.dropped(), 0);
    }

    #[test]
    fn trailing_partial_record_dropped() {
        let codec = PositionCodec::new(RecordLayout::Position);
        let frame = PositionFrame::new(RecordLayout::Position, vec![3.0, 1.0, 2.0, 3.0, 7.0, 9.0]);

        let decoded = codec.decode(&frame);

        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0].wire_id, 3);
        assert_eq!(decoded.truncated_floats, 2);
    }

    #[test]
    fn bad_id_fields_skipped_not_fatal() {
        let codec = PositionCodec::new(RecordLayout::Position);
        let frame = PositionFrame::new(
            RecordLayout::Position,
            vec![
                f32::NAN, 0.0, 0.0, 0.0, //
                0.0, 1.0, 1.0, 1.0, //
                2.5, 1.0, 1.0, 1.0, //
                -4.0, 1.0, 1.0, 1.0, //
                9.0, 4.0, 5.0, 6.0,
            ],
        );

        let decoded = codec.decode(&frame);

        assert_eq!(decoded.malformed, 4);
        assert_eq!(decoded.records, vec![PositionRecord::new(9, Vec3::new(4.0, 5.0, 6.0))]);
    }

    #[test]
    fn payload_nan_passes_through_for_validation() {
        let codec = PositionCodec::new(RecordLayout::Position);
        let frame = PositionFrame::new(RecordLayout::Position, vec![3.0, 1.0, f32::NAN, 3.0]);

        let decoded = codec.decode(&frame);

        assert_eq!(decoded.records.len(), 1);
        assert!(decoded.records[0].position.y.is_nan());
    }
}
