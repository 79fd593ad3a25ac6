//! Rebuilds full snapshots by joining snapshot rows against the dictionary tiers.

use crate::core::pairing::CoordinateCodec;
use crate::core::{denormalize_direction, Coordinates, Observation, Snapshot};
use crate::error::{Error, Result};
use crate::storage::dictionary::DictionaryTier;
use crate::storage::velocity::{
    DocumentRecord, ItemEntry, StoredCoordinates, SubItemEntry, ITEM_TIER, SUBITEM_TIER,
};

pub struct SnapshotAssembler<'a> {
    items: &'a DictionaryTier<ItemEntry>,
    subitems: &'a DictionaryTier<SubItemEntry>,
    codec: Option<&'a CoordinateCodec>,
}

impl<'a> SnapshotAssembler<'a> {
    pub fn new(
        items: &'a DictionaryTier<ItemEntry>,
        subitems: &'a DictionaryTier<SubItemEntry>,
        codec: Option<&'a CoordinateCodec>,
    ) -> Self {
        Self { items, subitems, codec }
    }

    /// Join every row of `document` with its item and subitem, in row order.
    ///
    /// A row or item pointing at a missing key fails the whole document with
    /// [`Error::ReferentialIntegrityViolation`]; rows are never dropped.
    pub fn assemble(&self, document: &DocumentRecord) -> Result<Snapshot> {
        let items = self.items.get_many(document.rows.iter().map(|row| &row.item))?;
        let subitems = self.subitems.get_many(items.values().map(|item| &item.subitem))?;

        let observations = document
            .rows
            .iter()
            .map(|row| {
                let item = items.get(&row.item).ok_or_else(|| {
                    Error::ReferentialIntegrityViolation { tier: ITEM_TIER, key: row.item.clone() }
                })?;
                let subitem = subitems.get(&item.subitem).ok_or_else(|| {
                    Error::ReferentialIntegrityViolation {
                        tier: SUBITEM_TIER,
                        key: item.subitem.clone(),
                    }
                })?;

                Ok(Observation {
                    object_id: item.object_id.clone(),
                    numeric_id: item.numeric_id,
                    color: subitem.color.clone(),
                    direction: denormalize_direction(subitem.direction),
                    line_id: subitem.line_id.clone(),
                    route_point_id: item.route_point_id,
                    distance: row.distance,
                    distance_from_point: row.distance_from_point,
                    coordinates: self.decode_coordinates(&row.coordinates)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Snapshot::new(&document.timestamp, observations))
    }

    fn decode_coordinates(&self, stored: &StoredCoordinates) -> Result<Coordinates> {
        match (stored, self.codec) {
            (StoredCoordinates::Raw { x, y }, _) => Ok(Coordinates::new(*x, *y)),
            (StoredCoordinates::Paired(bytes), Some(codec)) => codec.decode_bytes(bytes),
            (StoredCoordinates::Paired(_), None) => Err(Error::Config(
                "paired coordinates found but the store has no pairing codec configured"
                    .to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hashing::DictionaryKey;
    use crate::storage::velocity::SnapshotRow;

    fn tiers() -> (DictionaryTier<ItemEntry>, DictionaryTier<SubItemEntry>) {
        let mut subitems = DictionaryTier::new(SUBITEM_TIER);
        subitems
            .insert_once(
                DictionaryKey::from("s1"),
                SubItemEntry { color: "#FF0000".to_string(), direction: true, line_id: "64".to_string() },
            )
            .unwrap();

        let mut items = DictionaryTier::new(ITEM_TIER);
        items
            .insert_once(
                DictionaryKey::from("i1"),
                ItemEntry {
                    object_id: "A".to_string(),
                    numeric_id: 3,
                    route_point_id: 8012,
                    subitem: DictionaryKey::from("s1"),
                },
            )
            .unwrap();
        items
            .insert_once(
                DictionaryKey::from("i2"),
                ItemEntry {
                    object_id: "B".to_string(),
                    numeric_id: 4,
                    route_point_id: 8013,
                    subitem: DictionaryKey::from("missing"),
                },
            )
            .unwrap();
        (items, subitems)
    }

    fn row(item: &str) -> SnapshotRow {
        SnapshotRow {
            item: DictionaryKey::from(item),
            distance: 10.0,
            distance_from_point: 2,
            coordinates: StoredCoordinates::Raw { x: 4.35, y: 50.85 },
        }
    }

    #[test]
    fn test_assemble_denormalizes_direction() {
        let (items, subitems) = tiers();
        let assembler = SnapshotAssembler::new(&items, &subitems, None);
        let document =
            DocumentRecord { document_id: 0, timestamp: "t1".to_string(), rows: vec![row("i1")] };

        let snapshot = assembler.assemble(&document).unwrap();
        assert_eq!(snapshot.timestamp, "t1");
        assert_eq!(snapshot.observations[0].direction, 2);
        assert_eq!(snapshot.observations[0].object_id, "A");
        assert_eq!(snapshot.observations[0].coordinates, Coordinates::new(4.35, 50.85));
    }

    #[test]
    fn test_missing_item_is_an_error() {
        let (items, subitems) = tiers();
        let assembler = SnapshotAssembler::new(&items, &subitems, None);
        let document = DocumentRecord {
            document_id: 0,
            timestamp: "t1".to_string(),
            rows: vec![row("i1"), row("nope")],
        };
        assert!(matches!(
            assembler.assemble(&document),
            Err(Error::ReferentialIntegrityViolation { tier: ITEM_TIER, .. })
        ));
    }

    #[test]
    fn test_missing_subitem_is_an_error() {
        let (items, subitems) = tiers();
        let assembler = SnapshotAssembler::new(&items, &subitems, None);
        let document =
            DocumentRecord { document_id: 0, timestamp: "t1".to_string(), rows: vec![row("i2")] };
        assert!(matches!(
            assembler.assemble(&document),
            Err(Error::ReferentialIntegrityViolation { tier: SUBITEM_TIER, .. })
        ));
    }

    #[test]
    fn test_paired_coordinates_need_a_codec() {
        let (items, subitems) = tiers();
        let assembler = SnapshotAssembler::new(&items, &subitems, None);
        let mut paired = row("i1");
        paired.coordinates = StoredCoordinates::Paired(vec![0; 15]);
        let document =
            DocumentRecord { document_id: 0, timestamp: "t1".to_string(), rows: vec![paired] };
        assert!(matches!(assembler.assemble(&document), Err(Error::Config(_))));
    }
}
