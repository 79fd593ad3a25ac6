//! Tiered deduplication store
//!
//! Static attributes of an observation are interned in two append-only
//! dictionary tiers:
//!
//! ```text
//! SnapshotRow ──item key──▶ ItemEntry ──subitem key──▶ SubItemEntry
//! (distance, coordinates)   (object id, numeric id,    (color, direction,
//!                            route point)               line)
//! ```
//!
//! Only the snapshot row is written for every observation at every tick.
//! New dictionary entries and the rows referencing them are written in the
//! same commit frame, so a reader never sees a row whose key is missing.
//!
//! Snapshots may be queued in an [`IngestBuffer`] before one dedup + write
//! pass. Queued snapshots are readable but not durable until [`VelocityStore::flush`].

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::{CoordinateStorage, VelocityConfig};
use crate::core::encoding::encode_frame;
use crate::core::hashing::{AttributeHasher, ContentKeyed, DictionaryKey};
use crate::core::pairing::CoordinateCodec;
use crate::core::{normalize_direction, Coordinates, Observation, Snapshot};
use crate::error::{Error, Result};
use crate::storage::assembler::SnapshotAssembler;
use crate::storage::dictionary::DictionaryTier;
use crate::storage::segment::SegmentLog;
use crate::storage::util::{
    partition_key, sanitize_partition, DocumentLocation, IngestBuffer, IntegrityReport, StoreStats,
};

pub const ITEM_TIER: &str = "item";
pub const SUBITEM_TIER: &str = "subitem";

/// Attributes that rarely change for a vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubItemEntry {
    pub color: String,
    /// Wire direction minus one
    pub direction: bool,
    pub line_id: String,
}

impl SubItemEntry {
    pub fn from_observation(observation: &Observation) -> Result<Self> {
        Ok(Self {
            color: observation.color.clone(),
            direction: normalize_direction(observation.direction)?,
            line_id: observation.line_id.clone(),
        })
    }
}

impl ContentKeyed for SubItemEntry {
    fn canonical_fields(&self) -> Vec<String> {
        vec![self.color.clone(), self.direction.to_string(), self.line_id.clone()]
    }
}

/// Attributes that change slowly, plus the subitem they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEntry {
    pub object_id: String,
    pub numeric_id: i64,
    pub route_point_id: u32,
    pub subitem: DictionaryKey,
}

impl ContentKeyed for ItemEntry {
    fn canonical_fields(&self) -> Vec<String> {
        vec![
            self.object_id.clone(),
            self.numeric_id.to_string(),
            self.route_point_id.to_string(),
            self.subitem.to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredCoordinates {
    Raw { x: f64, y: f64 },
    /// Little-endian pairing output, `byte_width` bytes long
    Paired(Vec<u8>),
}

/// The per-(document, object) record written at every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub item: DictionaryKey,
    pub distance: f64,
    pub distance_from_point: u32,
    pub coordinates: StoredCoordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: u64,
    pub timestamp: String,
    pub rows: Vec<SnapshotRow>,
}

/// One atomic unit on disk: the dictionary entries first introduced by
/// `documents`, followed by the documents themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub subitems: Vec<(DictionaryKey, SubItemEntry)>,
    pub items: Vec<(DictionaryKey, ItemEntry)>,
    pub documents: Vec<DocumentRecord>,
}

/// In-memory view of everything committed: both tiers and the timestamp index.
#[derive(Debug)]
struct Catalog {
    subitems: DictionaryTier<SubItemEntry>,
    items: DictionaryTier<ItemEntry>,
    index: HashMap<String, DocumentLocation>,
    next_document_id: u64,
    row_count: usize,
}

impl Catalog {
    fn new() -> Self {
        Self {
            subitems: DictionaryTier::new(SUBITEM_TIER),
            items: DictionaryTier::new(ITEM_TIER),
            index: HashMap::new(),
            next_document_id: 0,
            row_count: 0,
        }
    }

    fn apply(&mut self, segment: &str, frame_offset: u64, record: CommitRecord) -> Result<()> {
        for (key, subitem) in record.subitems {
            self.subitems.insert_once(key, subitem)?;
        }
        for (key, item) in record.items {
            self.items.insert_once(key, item)?;
        }
        for (ordinal, document) in record.documents.into_iter().enumerate() {
            self.row_count += document.rows.len();
            self.next_document_id = self.next_document_id.max(document.document_id + 1);
            self.index.insert(
                document.timestamp,
                DocumentLocation { partition: segment.to_string(), frame_offset, ordinal },
            );
        }
        Ok(())
    }

    fn clear(&mut self) {
        *self = Self::new();
    }
}

/// Dictionary entries introduced by queued snapshots, not yet committed.
#[derive(Debug, Default)]
struct PendingEntries {
    subitems: HashMap<DictionaryKey, SubItemEntry>,
    items: HashMap<DictionaryKey, ItemEntry>,
}

impl PendingEntries {
    fn merge(&mut self, other: PendingEntries) {
        self.subitems.extend(other.subitems);
        self.items.extend(other.items);
    }

    fn clear(&mut self) {
        self.subitems.clear();
        self.items.clear();
    }
}

/// Dictionary keys of one observation, computed before the existence check.
struct KeyedObservation<'a> {
    observation: &'a Observation,
    subitem_key: DictionaryKey,
    subitem: SubItemEntry,
    item_key: DictionaryKey,
    item: ItemEntry,
}

pub struct VelocityStore {
    name: String,
    config: VelocityConfig,
    segments: SegmentLog,
    catalog: Catalog,
    buffer: IngestBuffer,
    pending: PendingEntries,
    item_hasher: AttributeHasher,
    subitem_hasher: AttributeHasher,
    codec: Option<CoordinateCodec>,
}

impl VelocityStore {
    /// Open the store in `data_dir`, replaying any segments already there.
    pub fn open(data_dir: &Path, config: VelocityConfig) -> Result<Self> {
        config.validate()?;

        let codec = match &config.coordinates {
            CoordinateStorage::Raw => None,
            CoordinateStorage::Paired(codec) => Some(CoordinateCodec::new(codec.clone())?),
        };

        let mut store = Self {
            name: Self::describe(&config),
            item_hasher: AttributeHasher::new(config.item_key_width)?,
            subitem_hasher: AttributeHasher::new(config.subitem_key_width)?,
            segments: SegmentLog::open(data_dir, config.sync_writes)?,
            catalog: Catalog::new(),
            buffer: IngestBuffer::new(config.batch_size),
            pending: PendingEntries::default(),
            codec,
            config,
        };
        store.replay()?;

        info!(
            path = %data_dir.display(),
            documents = store.catalog.index.len(),
            items = store.catalog.items.len(),
            subitems = store.catalog.subitems.len(),
            "opened velocity store"
        );
        Ok(store)
    }

    fn describe(config: &VelocityConfig) -> String {
        let coordinates = match &config.coordinates {
            CoordinateStorage::Raw => "raw".to_string(),
            CoordinateStorage::Paired(codec) => format!("{:?}", codec.pairing).to_lowercase(),
        };
        format!("VelocityStore(batch={}, coordinates={})", config.batch_size, coordinates)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn replay(&mut self) -> Result<()> {
        let catalog = &mut self.catalog;
        self.segments.replay(true, |segment, offset, record: CommitRecord| {
            catalog.apply(segment, offset, record)
        })?;
        Ok(())
    }

    /// Drop every tier and start empty. Irreversible.
    pub fn reset(&mut self) -> Result<()> {
        self.buffer.clear();
        self.pending.clear();
        self.segments.clear()?;
        self.catalog.clear();
        info!(path = %self.segments.base_path().display(), "reset velocity store");
        Ok(())
    }

    /// Queue `snapshot` and commit the batch once it is full.
    ///
    /// The snapshot is validated and its dictionary keys are checked against
    /// the committed tiers and the entries of the queued snapshots. A
    /// rejected snapshot is not queued; queued ones are unaffected.
    pub fn store_document(&mut self, snapshot: Snapshot) -> Result<()> {
        if self.catalog.index.contains_key(&snapshot.timestamp)
            || self.buffer.find(&snapshot.timestamp).is_some()
        {
            return Err(Error::DuplicateTimestamp(snapshot.timestamp));
        }

        let keyed = snapshot
            .observations
            .iter()
            .map(|observation| {
                self.store_coordinates(observation.coordinates)?;
                self.key_observation(observation)
            })
            .collect::<Result<Vec<_>>>()?;
        let admitted = self.admit(keyed)?;

        self.pending.merge(admitted);
        self.buffer.push(snapshot);
        if self.buffer.is_full() {
            self.flush()?;
        }
        Ok(())
    }

    /// Collision check of one snapshot's entries. Returns the entries it adds.
    fn admit(&self, keyed: Vec<KeyedObservation<'_>>) -> Result<PendingEntries> {
        let mut admitted = PendingEntries::default();
        for entry in keyed {
            self.catalog.subitems.check_consistent(&entry.subitem_key, &entry.subitem)?;
            self.catalog.items.check_consistent(&entry.item_key, &entry.item)?;
            admit_entry(
                &self.pending.subitems,
                &mut admitted.subitems,
                SUBITEM_TIER,
                entry.subitem_key,
                entry.subitem,
            )?;
            admit_entry(
                &self.pending.items,
                &mut admitted.items,
                ITEM_TIER,
                entry.item_key,
                entry.item,
            )?;
        }
        Ok(admitted)
    }

    /// Commit every queued snapshot.
    ///
    /// Snapshots leave the queue only once their frame is written. If staging
    /// or a write fails, the uncommitted snapshots stay queued.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let documents = self.buffer.len();
        self.commit()?;
        self.pending.clear();
        debug!(documents, "flushed ingest buffer");
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let staged = self.stage(self.buffer.as_slice())?;

        for (segment, record) in staged {
            let committed = record.documents.len();
            let frame = encode_frame(&record)?;
            let offset = self.segments.append(&segment, &frame)?;
            debug!(
                segment = %segment,
                offset,
                bytes = frame.len(),
                documents = record.documents.len(),
                new_items = record.items.len(),
                new_subitems = record.subitems.len(),
                "committed frame"
            );
            self.catalog.apply(&segment, offset, record)?;
            self.buffer.discard_front(committed);
        }
        Ok(())
    }

    /// Build one commit record per partition without touching any state.
    fn stage(&self, batch: &[Snapshot]) -> Result<Vec<(String, CommitRecord)>> {
        let keyed = batch
            .iter()
            .map(|snapshot| {
                snapshot
                    .observations
                    .iter()
                    .map(|observation| self.key_observation(observation))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let missing_subitems =
            self.catalog.subitems.missing_keys(keyed.iter().flatten().map(|k| &k.subitem_key));
        let missing_items =
            self.catalog.items.missing_keys(keyed.iter().flatten().map(|k| &k.item_key));

        let mut staged_subitems: HashMap<DictionaryKey, SubItemEntry> = HashMap::new();
        let mut staged_items: HashMap<DictionaryKey, ItemEntry> = HashMap::new();
        let mut records: Vec<(String, CommitRecord)> = Vec::new();
        let mut document_id = self.catalog.next_document_id;

        for (snapshot, observations) in batch.iter().zip(keyed) {
            let segment = sanitize_partition(&partition_key(
                &snapshot.timestamp,
                self.config.partition_prefix_len,
            ));
            if records.last().map_or(true, |(current, _)| *current != segment) {
                records.push((segment, CommitRecord::default()));
            }
            let Some((_, record)) = records.last_mut() else {
                continue;
            };

            let mut rows = Vec::with_capacity(observations.len());
            for entry in observations {
                if missing_subitems.contains(&entry.subitem_key) {
                    stage_entry(
                        &mut staged_subitems,
                        &mut record.subitems,
                        SUBITEM_TIER,
                        entry.subitem_key,
                        entry.subitem,
                    )?;
                } else {
                    self.catalog.subitems.check_consistent(&entry.subitem_key, &entry.subitem)?;
                }

                if missing_items.contains(&entry.item_key) {
                    stage_entry(
                        &mut staged_items,
                        &mut record.items,
                        ITEM_TIER,
                        entry.item_key.clone(),
                        entry.item,
                    )?;
                } else {
                    self.catalog.items.check_consistent(&entry.item_key, &entry.item)?;
                }

                let observation = entry.observation;
                rows.push(SnapshotRow {
                    item: entry.item_key,
                    distance: observation.distance,
                    distance_from_point: observation.distance_from_point,
                    coordinates: self.store_coordinates(observation.coordinates)?,
                });
            }

            record.documents.push(DocumentRecord {
                document_id,
                timestamp: snapshot.timestamp.clone(),
                rows,
            });
            document_id += 1;
        }

        Ok(records)
    }

    fn key_observation<'a>(&self, observation: &'a Observation) -> Result<KeyedObservation<'a>> {
        let subitem = SubItemEntry::from_observation(observation)?;
        let subitem_key = self.subitem_hasher.key_of(&subitem);
        let item = ItemEntry {
            object_id: observation.object_id.clone(),
            numeric_id: observation.numeric_id,
            route_point_id: observation.route_point_id,
            subitem: subitem_key.clone(),
        };
        let item_key = self.item_hasher.key_of(&item);
        Ok(KeyedObservation { observation, subitem_key, subitem, item_key, item })
    }

    fn store_coordinates(&self, coordinates: Coordinates) -> Result<StoredCoordinates> {
        match &self.codec {
            Some(codec) => Ok(StoredCoordinates::Paired(codec.encode_bytes(coordinates)?)),
            None => Ok(StoredCoordinates::Raw { x: coordinates.x, y: coordinates.y }),
        }
    }

    /// Rebuild the snapshot stored under `timestamp`.
    pub fn get_document(&self, timestamp: &str) -> Result<Snapshot> {
        if let Some(snapshot) = self.buffer.find(timestamp) {
            return Ok(snapshot.clone());
        }

        let location = self
            .catalog
            .index
            .get(timestamp)
            .ok_or_else(|| Error::NotFound(timestamp.to_string()))?;
        let record: CommitRecord =
            self.segments.read_frame(&location.partition, location.frame_offset)?;
        let document = record.documents.into_iter().nth(location.ordinal).ok_or_else(|| {
            Error::CorruptSegment {
                path: self.segments.segment_path(&location.partition),
                offset: location.frame_offset,
            }
        })?;

        self.assembler().assemble(&document)
    }

    fn assembler(&self) -> SnapshotAssembler<'_> {
        SnapshotAssembler::new(&self.catalog.items, &self.catalog.subitems, self.codec.as_ref())
    }

    /// Bytes on disk, after flushing the ingest buffer.
    pub fn get_total_size(&mut self) -> Result<u64> {
        self.flush()?;
        self.segments.total_size()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            documents: self.catalog.index.len(),
            rows: self.catalog.row_count,
            items: self.catalog.items.len(),
            subitems: self.catalog.subitems.len(),
            pending_documents: self.buffer.len(),
        }
    }

    /// Re-read every committed frame and check that each row resolves to an
    /// item and each item to a subitem.
    pub fn check_integrity(&self) -> Result<IntegrityReport> {
        let mut report = IntegrityReport::default();
        let items = &self.catalog.items;

        self.segments.replay(false, |_, _, record: CommitRecord| {
            for document in &record.documents {
                items.get_many(document.rows.iter().map(|row| &row.item))?;
                report.documents_checked += 1;
                report.rows_checked += document.rows.len();
            }
            Ok(())
        })?;

        self.catalog.subitems.get_many(items.iter().map(|(_, item)| &item.subitem))?;
        report.items_checked = items.len();
        Ok(report)
    }

    /// Flush and release the store.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }
}

impl Drop for VelocityStore {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let pending = self.buffer.len();
        if let Err(err) = self.flush() {
            error!(pending, error = %err, "failed to flush ingest buffer on drop");
        }
    }
}

fn admit_entry<E: PartialEq>(
    pending: &HashMap<DictionaryKey, E>,
    admitted: &mut HashMap<DictionaryKey, E>,
    tier: &'static str,
    key: DictionaryKey,
    entry: E,
) -> Result<()> {
    match pending.get(&key).or_else(|| admitted.get(&key)) {
        Some(existing) if *existing != entry => Err(Error::HashCollision { tier, key }),
        Some(_) => Ok(()),
        None => {
            admitted.insert(key, entry);
            Ok(())
        }
    }
}

fn stage_entry<E: Clone + PartialEq>(
    staged: &mut HashMap<DictionaryKey, E>,
    introduced: &mut Vec<(DictionaryKey, E)>,
    tier: &'static str,
    key: DictionaryKey,
    entry: E,
) -> Result<()> {
    match staged.get(&key) {
        Some(existing) if *existing != entry => Err(Error::HashCollision { tier, key }),
        Some(_) => Ok(()),
        None => {
            staged.insert(key.clone(), entry.clone());
            introduced.push((key, entry));
            Ok(())
        }
    }
}
