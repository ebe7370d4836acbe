//! # Storage Layer
//!
//! Attribute records of one object live in one of two stores:
//!
//! - [`compact::CompactStore`]: a flat list kept in creation order and embedded in the
//!   object header. Name lookup is a linear scan and name order is computed by sorting
//!   on read. Cheap while the set is small.
//! - [`dense::DenseStore`]: a record arena plus two ordered indices (by name and by
//!   creation order). Records are written out-of-line, one block each.
//!
//! [`AttrStorage`] is the tagged variant the directory holds. It exposes one interface
//! and dispatches to whichever store is active.
//!
//! ## Phase Change
//!
//! The active variant is recomputed after every mutation by [`PhaseChange::next_mode`]:
//!
//! - Compact → Dense when the count exceeds `max_compact`
//! - Dense → Compact when the count falls below `min_dense`
//!
//! With the defaults (8 / 6) a directory that just promoted at 9 records only demotes
//! again once it is down to 5, so a create/delete pair at the boundary never flips the
//! mode back and forth.
//!
//! ## Record Keys
//!
//! Creation order doubles as the stable key of a record: it is unique within the
//! directory and never reused, so handles and the dense order index can refer to a
//! record by it without holding references into the store.
//!
//! ## Byte Stores
//!
//! Persistence goes through the [`backend::ByteStore`] trait:
//!
//! - [`fs_backend::FsBackend`]: one file per block inside a container directory.
//! - [`mem_backend::MemBackend`]: for testing logic without filesystem I/O.

use crate::error::{AttrError, Result};
use crate::model::{AttributeRecord, IndexType, IterOrder};
use serde::{Deserialize, Serialize};

pub mod backend;
pub mod compact;
pub mod dense;
pub mod fs_backend;
pub mod mem_backend;

use compact::CompactStore;
use dense::DenseStore;

pub const DEFAULT_MAX_COMPACT: u16 = 8;
pub const DEFAULT_MIN_DENSE: u16 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Compact,
    Dense,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMode::Compact => write!(f, "compact"),
            StorageMode::Dense => write!(f, "dense"),
        }
    }
}

/// Thresholds for switching between compact and dense storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseChange {
    pub max_compact: u16,
    pub min_dense: u16,
}

impl Default for PhaseChange {
    fn default() -> Self {
        Self {
            max_compact: DEFAULT_MAX_COMPACT,
            min_dense: DEFAULT_MIN_DENSE,
        }
    }
}

impl PhaseChange {
    pub fn new(max_compact: u16, min_dense: u16) -> Result<Self> {
        let phase = Self {
            max_compact,
            min_dense,
        };
        phase.validate()?;
        Ok(phase)
    }

    /// `min_dense` may be at most `max_compact + 1`; anything larger would demote a
    /// directory straight after promoting it.
    pub fn validate(&self) -> Result<()> {
        if self.min_dense as u32 > self.max_compact as u32 + 1 {
            return Err(AttrError::Config(format!(
                "min_dense ({}) must not exceed max_compact + 1 ({})",
                self.min_dense,
                self.max_compact as u32 + 1
            )));
        }
        Ok(())
    }

    pub fn next_mode(&self, current: StorageMode, count: usize) -> StorageMode {
        match current {
            StorageMode::Compact if count > self.max_compact as usize => StorageMode::Dense,
            StorageMode::Dense if count < self.min_dense as usize => StorageMode::Compact,
            unchanged => unchanged,
        }
    }
}

/// The active store of one attribute directory.
#[derive(Debug, Clone)]
pub enum AttrStorage {
    Compact(CompactStore),
    Dense(DenseStore),
}

impl Default for AttrStorage {
    fn default() -> Self {
        AttrStorage::Compact(CompactStore::default())
    }
}

impl AttrStorage {
    pub fn from_records(mode: StorageMode, records: Vec<AttributeRecord>) -> Result<Self> {
        Ok(match mode {
            StorageMode::Compact => AttrStorage::Compact(CompactStore::from_records(records)?),
            StorageMode::Dense => AttrStorage::Dense(DenseStore::from_records(records)?),
        })
    }

    pub fn mode(&self) -> StorageMode {
        match self {
            AttrStorage::Compact(_) => StorageMode::Compact,
            AttrStorage::Dense(_) => StorageMode::Dense,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AttrStorage::Compact(s) => s.len(),
            AttrStorage::Dense(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, name: &str) -> Option<&AttributeRecord> {
        match self {
            AttrStorage::Compact(s) => s.get(name),
            AttrStorage::Dense(s) => s.get(name),
        }
    }

    pub fn get_by_key(&self, key: u64) -> Option<&AttributeRecord> {
        match self {
            AttrStorage::Compact(s) => s.get_by_key(key),
            AttrStorage::Dense(s) => s.get_by_key(key),
        }
    }

    pub fn value_mut(&mut self, key: u64) -> Option<&mut Vec<u8>> {
        match self {
            AttrStorage::Compact(s) => s.value_mut(key),
            AttrStorage::Dense(s) => s.value_mut(key),
        }
    }

    pub fn insert(&mut self, rec: AttributeRecord) -> Result<()> {
        match self {
            AttrStorage::Compact(s) => s.insert(rec),
            AttrStorage::Dense(s) => s.insert(rec),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeRecord> {
        match self {
            AttrStorage::Compact(s) => s.remove(name),
            AttrStorage::Dense(s) => s.remove(name),
        }
    }

    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        match self {
            AttrStorage::Compact(s) => s.rename(old_name, new_name),
            AttrStorage::Dense(s) => s.rename(old_name, new_name),
        }
    }

    /// Records in the requested order.
    ///
    /// `Native` is creation order for compact storage and name order for dense
    /// storage: the order each store produces without extra work.
    pub fn ordered(
        &self,
        index_type: IndexType,
        order: IterOrder,
    ) -> Box<dyn Iterator<Item = &AttributeRecord> + '_> {
        match self {
            AttrStorage::Compact(s) => match order {
                IterOrder::Native => Box::new(s.iter()),
                _ => s.ordered(index_type, order == IterOrder::Decreasing),
            },
            AttrStorage::Dense(s) => match order {
                IterOrder::Native => s.ordered(IndexType::Name, false),
                _ => s.ordered(index_type, order == IterOrder::Decreasing),
            },
        }
    }

    /// Records in creation order, the layout used when rewriting the store.
    pub fn by_creation(&self) -> Box<dyn Iterator<Item = &AttributeRecord> + '_> {
        self.ordered(IndexType::CreationOrder, IterOrder::Increasing)
    }

    /// Switches the active variant to `target`, carrying every record over.
    pub fn convert(&mut self, target: StorageMode) -> Result<()> {
        if self.mode() == target {
            return Ok(());
        }
        let records = match std::mem::take(self) {
            AttrStorage::Compact(s) => s.into_records(),
            AttrStorage::Dense(s) => s.into_records(),
        };
        *self = AttrStorage::from_records(target, records)?;
        Ok(())
    }

    /// Checks the store's internal invariants.
    pub fn verify(&self) -> Result<()> {
        match self {
            AttrStorage::Compact(s) => s.verify(),
            AttrStorage::Dense(s) => s.verify(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttrCreateParams, DataspaceRef, DatatypeRef};

    fn rec(name: &str, order: u64) -> AttributeRecord {
        AttributeRecord::new(
            name.to_string(),
            DatatypeRef(1),
            DataspaceRef(1),
            2,
            order,
            AttrCreateParams::default(),
            true,
        )
    }

    fn names<'a>(it: impl Iterator<Item = &'a AttributeRecord>) -> Vec<String> {
        it.map(|r| r.name.clone()).collect()
    }

    #[test]
    fn phase_change_has_hysteresis() {
        let phase = PhaseChange::default();
        assert_eq!(phase.next_mode(StorageMode::Compact, 8), StorageMode::Compact);
        assert_eq!(phase.next_mode(StorageMode::Compact, 9), StorageMode::Dense);
        assert_eq!(phase.next_mode(StorageMode::Dense, 8), StorageMode::Dense);
        assert_eq!(phase.next_mode(StorageMode::Dense, 6), StorageMode::Dense);
        assert_eq!(phase.next_mode(StorageMode::Dense, 5), StorageMode::Compact);
    }

    #[test]
    fn phase_change_rejects_inverted_thresholds() {
        assert!(PhaseChange::new(4, 5).is_ok());
        assert!(matches!(PhaseChange::new(4, 6), Err(AttrError::Config(_))));
    }

    #[test]
    fn zero_max_compact_always_promotes() {
        let phase = PhaseChange::new(0, 0).unwrap();
        assert_eq!(phase.next_mode(StorageMode::Compact, 1), StorageMode::Dense);
        assert_eq!(phase.next_mode(StorageMode::Dense, 0), StorageMode::Dense);
    }

    #[test]
    fn native_order_depends_on_mode() {
        let mut storage = AttrStorage::default();
        storage.insert(rec("zeta", 0)).unwrap();
        storage.insert(rec("alpha", 1)).unwrap();
        assert_eq!(
            names(storage.ordered(IndexType::Name, IterOrder::Native)),
            vec!["zeta", "alpha"]
        );

        storage.convert(StorageMode::Dense).unwrap();
        assert_eq!(
            names(storage.ordered(IndexType::CreationOrder, IterOrder::Native)),
            vec!["alpha", "zeta"]
        );
    }

    #[test]
    fn convert_round_trip_keeps_every_record() {
        let mut storage = AttrStorage::default();
        for (i, n) in ["c", "a", "b"].iter().enumerate() {
            storage.insert(rec(n, i as u64)).unwrap();
        }
        storage.convert(StorageMode::Dense).unwrap();
        storage.verify().unwrap();
        storage.convert(StorageMode::Compact).unwrap();
        assert_eq!(storage.mode(), StorageMode::Compact);
        assert_eq!(names(storage.by_creation()), vec!["c", "a", "b"]);
        assert_eq!(
            names(storage.ordered(IndexType::Name, IterOrder::Decreasing)),
            vec!["c", "b", "a"]
        );
    }
}
