#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub snapshots_applied: u64,
    pub frames_applied: u64,
    pub frames_suppressed: u64,
    pub records_applied: u64,
    pub unknown_wire_ids: u64,
    pub malformed_records: u64,
    pub truncated_frames: u64,
    pub repaired_values: u64,
    pub listener_failures: u64,
}

impl SyncStats {
    pub fn records_dropped(&self) -> u64 {
        self.unknown_wire_ids + self.malformed_records
    }
}
