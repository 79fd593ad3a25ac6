use crate::core::Snapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Sizes of the two tiers, for measurement and tests
pub struct StoreStats {
    pub documents: usize,
    pub rows: usize,
    pub items: usize,
    pub subitems: usize,
    pub pending_documents: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Outcome of a full referential integrity scan
pub struct IntegrityReport {
    pub documents_checked: usize,
    pub rows_checked: usize,
    pub items_checked: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Where a committed document lives: segment, frame and position in the frame
pub struct DocumentLocation {
    pub partition: String,
    pub frame_offset: u64,
    pub ordinal: usize,
}

#[derive(Debug)]
/// Bounded queue of snapshots awaiting one dedup + write pass.
///
/// Snapshots held here are not durable: they are lost if the process ends
/// before the buffer is flushed.
pub struct IngestBuffer {
    snapshots: Vec<Snapshot>,
    capacity: usize,
}

impl IngestBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { snapshots: Vec::with_capacity(capacity), capacity }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.snapshots.len() >= self.capacity
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn find(&self, timestamp: &str) -> Option<&Snapshot> {
        self.snapshots.iter().find(|snapshot| snapshot.timestamp == timestamp)
    }

    /// Queued snapshots, oldest first.
    pub fn as_slice(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Drop the `count` oldest snapshots once they are committed.
    pub fn discard_front(&mut self, count: usize) {
        let count = count.min(self.snapshots.len());
        self.snapshots.drain(..count);
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

/// Partition key of a timestamp: its first `prefix_len` characters.
///
/// With ISO-8601 timestamps the default of 13 groups documents by hour.
pub fn partition_key(timestamp: &str, prefix_len: usize) -> String {
    timestamp.chars().take(prefix_len).collect()
}

/// File-name-safe form of a partition key.
pub fn sanitize_partition(partition: &str) -> String {
    partition
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
