//! # Attribute Directory
//!
//! One [`AttributeDirectory`] owns every attribute of one container object. It picks
//! the storage variant, assigns creation order, hands out handles, and keeps the byte
//! store in step with memory.
//!
//! ## Mutations Are All-or-Nothing
//!
//! Every mutating operation follows the same three steps:
//!
//! 1. **Validate and apply** the change to the in-memory store. The stores themselves
//!    check before they touch anything, so a rejected call changes nothing.
//! 2. **Rebalance**: recompute the storage mode from the new count and convert if the
//!    phase-change thresholds say so.
//! 3. **Persist** the object header (and, in dense mode, the changed record blocks).
//!
//! If step 3 fails, the change is undone in memory (including any mode conversion) and
//! the error is returned. Dense record blocks are copy-on-write: changed records go to
//! fresh blocks, the header is switched over, and only then are the old blocks freed.
//!
//! ## Handles
//!
//! [`AttrHandle`] refers to a record by its creation order, which is stable across
//! renames and never reused. Handles stay valid until [`AttributeDirectory::close`];
//! a handle whose record was deleted fails with `NotFound`.
//!
//! ## Creation Order Counter
//!
//! The counter lives in the object header and only moves forward. Deleting every
//! attribute does not reset it.

use crate::catalog::TypeCatalog;
use crate::codec::{self, HeaderBody, HeaderBodyRef, HeaderMeta};
use crate::error::{AttrError, AttrTarget, Result};
use crate::iterate::{self, IterStatus};
use crate::model::{
    validate_name, AttrCreateParams, AttrInfo, AttributeRecord, DataspaceRef, DatatypeRef,
    IndexType, IterOrder,
};
use crate::store::backend::{BlockAddr, ByteStore};
use crate::store::{AttrStorage, PhaseChange, StorageMode};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, info, warn};

/// An open attribute. Release it with [`AttributeDirectory::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrHandle {
    object: u64,
    id: u64,
    key: u64,
}

impl AttrHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Id of the object whose directory issued this handle.
    pub fn object(&self) -> u64 {
        self.object
    }
}

/// Inverse of one in-memory mutation, applied when persisting it fails.
enum Undo {
    Insert { name: String, next_order: u64 },
    Delete(AttributeRecord),
    Rename { old: String, new: String },
    Write { key: u64, old: Vec<u8> },
}

pub struct AttributeDirectory {
    object: u64,
    label: String,
    header: BlockAddr,
    storage: AttrStorage,
    phase: PhaseChange,
    track_order: bool,
    next_order: u64,
    /// Record blocks of dense storage, by creation order.
    blocks: BTreeMap<u64, BlockAddr>,
    open: HashMap<u64, u64>,
    next_handle: u64,
}

impl AttributeDirectory {
    /// Creates an empty directory and writes its header.
    pub fn create<B: ByteStore + ?Sized>(
        store: &B,
        object: u64,
        label: impl Into<String>,
        phase: PhaseChange,
        track_order: bool,
    ) -> Result<Self> {
        phase.validate()?;
        let header = store.allocate()?;
        let dir = Self {
            object,
            label: label.into(),
            header,
            storage: AttrStorage::default(),
            phase,
            track_order,
            next_order: 0,
            blocks: BTreeMap::new(),
            open: HashMap::new(),
            next_handle: 1,
        };
        dir.write_header(store)?;
        Ok(dir)
    }

    /// Rebuilds a directory from the header at `header`.
    pub fn load<B: ByteStore + ?Sized>(
        store: &B,
        object: u64,
        label: impl Into<String>,
        header: BlockAddr,
    ) -> Result<Self> {
        let label = label.into();
        let bytes = store.read_block(header)?.ok_or_else(|| {
            AttrError::StorageInconsistent(format!(
                "object header {} of {} is missing",
                header, label
            ))
        })?;
        let (meta, body) = codec::decode_header(&bytes)?;

        let mut blocks = BTreeMap::new();
        let records = match body {
            HeaderBody::Compact(records) => records,
            HeaderBody::Dense(addrs) => {
                let mut records = Vec::with_capacity(addrs.len());
                for addr in addrs {
                    let raw = store.read_block(addr)?.ok_or_else(|| {
                        AttrError::StorageInconsistent(format!(
                            "attribute block {} of {} is missing",
                            addr, label
                        ))
                    })?;
                    let rec = codec::decode_record(&raw)?;
                    blocks.insert(rec.creation_order, addr);
                    records.push(rec);
                }
                records
            }
        };

        if let Some(stale) = records.iter().find(|r| r.creation_order >= meta.next_order) {
            return Err(AttrError::StorageInconsistent(format!(
                "\"{}\" on {} has creation order {} at or past the counter {}",
                stale.name, label, stale.creation_order, meta.next_order
            )));
        }

        let storage = AttrStorage::from_records(meta.mode, records)?;
        debug!(object = %label, mode = ?meta.mode, count = storage.len(), "loaded attribute directory");
        Ok(Self {
            object,
            label,
            header,
            storage,
            phase: meta.phase,
            track_order: meta.track_order,
            next_order: meta.next_order,
            blocks,
            open: HashMap::new(),
            next_handle: 1,
        })
    }

    /// Frees the header and every record block. Used when the owning object goes away.
    pub fn destroy<B: ByteStore + ?Sized>(self, store: &B) -> Result<()> {
        for addr in self.blocks.values() {
            store.free_block(*addr)?;
        }
        store.free_block(self.header)?;
        debug!(object = %self.label, "destroyed attribute directory");
        Ok(())
    }

    pub fn object(&self) -> u64 {
        self.object
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn header_addr(&self) -> BlockAddr {
        self.header
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn mode(&self) -> StorageMode {
        self.storage.mode()
    }

    pub fn phase(&self) -> PhaseChange {
        self.phase
    }

    pub fn tracks_order(&self) -> bool {
        self.track_order
    }

    /// The creation order the next `create` will assign.
    pub fn next_creation_order(&self) -> u64 {
        self.next_order
    }

    /// Number of handles not yet closed.
    pub fn open_handles(&self) -> usize {
        self.open.len()
    }

    // --- Create / open / close ---

    pub fn create_attr<B, C>(
        &mut self,
        store: &B,
        catalog: &C,
        name: &str,
        datatype: DatatypeRef,
        dataspace: DataspaceRef,
        params: AttrCreateParams,
    ) -> Result<AttrHandle>
    where
        B: ByteStore + ?Sized,
        C: TypeCatalog + ?Sized,
    {
        validate_name(name)?;
        if self.storage.get(name).is_some() {
            return Err(AttrError::Duplicate(name.to_string()));
        }
        let data_size = catalog.data_size(datatype, dataspace)?;
        let key = self.next_order;
        let next = key.checked_add(1).ok_or_else(|| {
            AttrError::StorageInconsistent(format!("creation order exhausted on {}", self.label))
        })?;

        let rec = AttributeRecord::new(
            name.to_string(),
            datatype,
            dataspace,
            data_size,
            key,
            params,
            self.track_order,
        );
        let prev_mode = self.storage.mode();
        self.storage.insert(rec)?;
        self.next_order = next;
        self.commit(
            store,
            prev_mode,
            Some(key),
            Undo::Insert {
                name: name.to_string(),
                next_order: key,
            },
        )?;

        debug!(object = %self.label, name, creation_order = key, data_size, "created attribute");
        Ok(self.issue(key))
    }

    pub fn open(&mut self, name: &str) -> Result<AttrHandle> {
        let key = self.lookup(name)?.creation_order;
        Ok(self.issue(key))
    }

    pub fn open_by_index(
        &mut self,
        index_type: IndexType,
        order: IterOrder,
        n: u64,
    ) -> Result<AttrHandle> {
        let key = self.resolve_index(index_type, order, n)?.creation_order;
        Ok(self.issue(key))
    }

    pub fn close(&mut self, handle: AttrHandle) -> Result<()> {
        if handle.object != self.object || self.open.remove(&handle.id).is_none() {
            return Err(AttrError::InvalidHandle(handle.id));
        }
        Ok(())
    }

    // --- Data access ---

    pub fn read(&self, handle: AttrHandle) -> Result<&[u8]> {
        Ok(&self.record(handle)?.value)
    }

    /// Copies the value into `buf`, which must be exactly the record's size.
    pub fn read_into(&self, handle: AttrHandle, buf: &mut [u8]) -> Result<()> {
        let rec = self.record(handle)?;
        if buf.len() != rec.value.len() {
            return Err(AttrError::TypeMismatch {
                name: rec.name.clone(),
                expected: rec.value.len(),
                actual: buf.len(),
            });
        }
        buf.copy_from_slice(&rec.value);
        Ok(())
    }

    /// Replaces the whole value. `value` must be exactly the record's size.
    pub fn write<B: ByteStore + ?Sized>(
        &mut self,
        store: &B,
        handle: AttrHandle,
        value: &[u8],
    ) -> Result<()> {
        let rec = self.record(handle)?;
        if value.len() != rec.value.len() {
            return Err(AttrError::TypeMismatch {
                name: rec.name.clone(),
                expected: rec.value.len(),
                actual: value.len(),
            });
        }
        let key = handle.key;
        let prev_mode = self.storage.mode();
        let slot = self
            .storage
            .value_mut(key)
            .ok_or(AttrError::NotFound(AttrTarget::Handle { id: handle.id, key }))?;
        let old = std::mem::replace(slot, value.to_vec());
        self.commit(store, prev_mode, Some(key), Undo::Write { key, old })
    }

    pub fn datatype(&self, handle: AttrHandle) -> Result<DatatypeRef> {
        Ok(self.record(handle)?.datatype)
    }

    pub fn dataspace(&self, handle: AttrHandle) -> Result<DataspaceRef> {
        Ok(self.record(handle)?.dataspace)
    }

    pub fn create_params(&self, handle: AttrHandle) -> Result<AttrCreateParams> {
        Ok(AttrCreateParams {
            charset: self.record(handle)?.charset,
        })
    }

    /// Bytes of raw value storage used by the attribute.
    pub fn storage_size(&self, handle: AttrHandle) -> Result<u64> {
        Ok(self.record(handle)?.value.len() as u64)
    }

    // --- Metadata queries ---

    pub fn name(&self, handle: AttrHandle) -> Result<&str> {
        Ok(&self.record(handle)?.name)
    }

    pub fn name_by_index(&self, index_type: IndexType, order: IterOrder, n: u64) -> Result<&str> {
        Ok(&self.resolve_index(index_type, order, n)?.name)
    }

    pub fn info(&self, handle: AttrHandle) -> Result<AttrInfo> {
        Ok(self.record(handle)?.info())
    }

    pub fn info_by_name(&self, name: &str) -> Result<AttrInfo> {
        Ok(self.lookup(name)?.info())
    }

    pub fn info_by_index(&self, index_type: IndexType, order: IterOrder, n: u64) -> Result<AttrInfo> {
        Ok(self.resolve_index(index_type, order, n)?.info())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.storage.get(name).is_some()
    }

    // --- Mutation ---

    /// Renames `old_name` to `new_name`. Renaming an existing attribute to its own
    /// name succeeds and changes nothing.
    pub fn rename<B: ByteStore + ?Sized>(
        &mut self,
        store: &B,
        old_name: &str,
        new_name: &str,
    ) -> Result<()> {
        let key = self.lookup(old_name)?.creation_order;
        if old_name == new_name {
            return Ok(());
        }
        validate_name(new_name)?;
        let prev_mode = self.storage.mode();
        self.storage.rename(old_name, new_name)?;
        self.commit(
            store,
            prev_mode,
            Some(key),
            Undo::Rename {
                old: old_name.to_string(),
                new: new_name.to_string(),
            },
        )?;
        debug!(object = %self.label, from = old_name, to = new_name, "renamed attribute");
        Ok(())
    }

    pub fn delete<B: ByteStore + ?Sized>(&mut self, store: &B, name: &str) -> Result<()> {
        let prev_mode = self.storage.mode();
        let rec = self
            .storage
            .remove(name)
            .ok_or_else(|| AttrError::NotFound(name.into()))?;
        let key = rec.creation_order;
        self.commit(store, prev_mode, None, Undo::Delete(rec))?;
        debug!(object = %self.label, name, creation_order = key, "deleted attribute");
        Ok(())
    }

    pub fn delete_by_index<B: ByteStore + ?Sized>(
        &mut self,
        store: &B,
        index_type: IndexType,
        order: IterOrder,
        n: u64,
    ) -> Result<()> {
        let name = self.resolve_index(index_type, order, n)?.name.clone();
        self.delete(store, &name)
    }

    // --- Enumeration ---

    /// Runs `op` over the attributes in the requested order starting at `*cursor`.
    /// See [`crate::iterate`] for the callback and cursor contract.
    pub fn iterate<F>(
        &self,
        index_type: IndexType,
        order: IterOrder,
        cursor: &mut u64,
        op: F,
    ) -> Result<IterStatus>
    where
        F: FnMut(&str, &AttrInfo) -> i32,
    {
        self.check_index_type(index_type)?;
        let count = self.storage.len() as u64;
        if *cursor > count {
            return Err(AttrError::InvalidIndex {
                target: AttrTarget::Index {
                    index_type,
                    order,
                    n: *cursor,
                },
                count,
            });
        }
        Ok(iterate::drive(
            self.storage.ordered(index_type, order),
            cursor,
            op,
        ))
    }

    /// Lazy `(name, info)` sequence in the requested order.
    pub fn entries(
        &self,
        index_type: IndexType,
        order: IterOrder,
    ) -> Result<impl Iterator<Item = (&str, AttrInfo)> + '_> {
        self.check_index_type(index_type)?;
        Ok(self
            .storage
            .ordered(index_type, order)
            .map(|r| (r.name.as_str(), r.info())))
    }

    pub fn names(&self, index_type: IndexType, order: IterOrder) -> Result<Vec<String>> {
        Ok(self
            .entries(index_type, order)?
            .map(|(n, _)| n.to_string())
            .collect())
    }

    /// Records in internal creation order, regardless of tracking. Backs the legacy API.
    pub(crate) fn records_by_creation(&self) -> impl Iterator<Item = &AttributeRecord> + '_ {
        self.storage.by_creation()
    }

    /// Opens the `n`-th record in internal creation order, regardless of tracking.
    pub(crate) fn open_by_position(&mut self, n: u64) -> Result<AttrHandle> {
        let count = self.storage.len() as u64;
        let key = self
            .storage
            .by_creation()
            .nth(n as usize)
            .map(|r| r.creation_order)
            .ok_or(AttrError::InvalidIndex {
                target: AttrTarget::Index {
                    index_type: IndexType::CreationOrder,
                    order: IterOrder::Increasing,
                    n,
                },
                count,
            })?;
        Ok(self.issue(key))
    }

    /// Checks the invariants of the active store.
    pub fn verify(&self) -> Result<()> {
        self.storage.verify().inspect_err(|e| {
            error!(object = %self.label, error = %e, "attribute storage is inconsistent");
        })
    }

    // --- Internals ---

    fn issue(&mut self, key: u64) -> AttrHandle {
        let id = self.next_handle;
        self.next_handle += 1;
        self.open.insert(id, key);
        AttrHandle {
            object: self.object,
            id,
            key,
        }
    }

    fn record(&self, handle: AttrHandle) -> Result<&AttributeRecord> {
        if handle.object != self.object || !self.open.contains_key(&handle.id) {
            return Err(AttrError::InvalidHandle(handle.id));
        }
        self.storage
            .get_by_key(handle.key)
            .ok_or(AttrError::NotFound(AttrTarget::Handle {
                id: handle.id,
                key: handle.key,
            }))
    }

    fn lookup(&self, name: &str) -> Result<&AttributeRecord> {
        self.storage
            .get(name)
            .ok_or_else(|| AttrError::NotFound(name.into()))
    }

    fn check_index_type(&self, index_type: IndexType) -> Result<()> {
        if index_type == IndexType::CreationOrder && !self.track_order {
            return Err(AttrError::CreationOrderNotTracked(self.label.clone()));
        }
        Ok(())
    }

    fn resolve_index(&self, index_type: IndexType, order: IterOrder, n: u64) -> Result<&AttributeRecord> {
        self.check_index_type(index_type)?;
        let count = self.storage.len() as u64;
        if n >= count {
            return Err(AttrError::InvalidIndex {
                target: AttrTarget::Index {
                    index_type,
                    order,
                    n,
                },
                count,
            });
        }
        self.storage
            .ordered(index_type, order)
            .nth(n as usize)
            .ok_or_else(|| {
                AttrError::StorageInconsistent(format!(
                    "position {} missing from {} index of {}",
                    n, index_type, self.label
                ))
            })
    }

    fn header_meta(&self) -> HeaderMeta {
        HeaderMeta {
            mode: self.storage.mode(),
            track_order: self.track_order,
            phase: self.phase,
            next_order: self.next_order,
        }
    }

    fn write_header<B: ByteStore + ?Sized>(&self, store: &B) -> Result<()> {
        let bytes = match self.storage.mode() {
            StorageMode::Compact => codec::encode_header(
                &self.header_meta(),
                &HeaderBodyRef::Compact(self.storage.by_creation().collect()),
            ),
            StorageMode::Dense => codec::encode_header(
                &self.header_meta(),
                &HeaderBodyRef::Dense(self.blocks.values().copied().collect()),
            ),
        };
        store.write_block(self.header, &bytes)
    }

    /// Rebalances, persists, and rolls back on failure.
    fn commit<B: ByteStore + ?Sized>(
        &mut self,
        store: &B,
        prev_mode: StorageMode,
        changed: Option<u64>,
        undo: Undo,
    ) -> Result<()> {
        let result = self.rebalance().and_then(|_| self.persist(store, changed));
        if let Err(e) = result {
            warn!(object = %self.label, error = %e, "persisting attribute change failed, rolling back");
            self.rollback(prev_mode, undo)?;
            return Err(e);
        }
        Ok(())
    }

    fn rebalance(&mut self) -> Result<()> {
        let current = self.storage.mode();
        let target = self.phase.next_mode(current, self.storage.len());
        if target != current {
            self.storage.convert(target)?;
            info!(
                object = %self.label,
                count = self.storage.len(),
                from = ?current,
                to = ?target,
                "attribute storage changed mode"
            );
        }
        Ok(())
    }

    fn rollback(&mut self, prev_mode: StorageMode, undo: Undo) -> Result<()> {
        let restored = match undo {
            Undo::Insert { name, next_order } => {
                self.next_order = next_order;
                self.storage.remove(&name).map(|_| ()).ok_or_else(|| {
                    AttrError::StorageInconsistent(format!("\"{}\" vanished before rollback", name))
                })
            }
            Undo::Delete(rec) => self.storage.insert(rec),
            Undo::Rename { old, new } => self.storage.rename(&new, &old),
            Undo::Write { key, old } => match self.storage.value_mut(key) {
                Some(slot) => {
                    *slot = old;
                    Ok(())
                }
                None => Err(AttrError::StorageInconsistent(format!(
                    "record {} vanished before rollback",
                    key
                ))),
            },
        };
        restored
            .and_then(|_| self.storage.convert(prev_mode))
            .map_err(|e| {
                error!(object = %self.label, error = %e, "rollback failed");
                AttrError::StorageInconsistent(format!("rollback on {} failed: {}", self.label, e))
            })
    }

    fn persist<B: ByteStore + ?Sized>(&mut self, store: &B, changed: Option<u64>) -> Result<()> {
        match self.storage.mode() {
            StorageMode::Compact => {
                self.write_header(store)?;
                // Leftover record blocks from dense storage.
                let leftovers = std::mem::take(&mut self.blocks);
                release(store, leftovers.into_values(), &self.label);
                Ok(())
            }
            StorageMode::Dense => {
                let mut next_blocks = BTreeMap::new();
                let mut fresh = Vec::new();
                let mut stale = Vec::new();

                for rec in self.storage.by_creation() {
                    let key = rec.creation_order;
                    match self.blocks.get(&key) {
                        Some(addr) if changed != Some(key) => {
                            next_blocks.insert(key, *addr);
                        }
                        existing => {
                            let written = store.allocate().and_then(|addr| {
                                store
                                    .write_block(addr, &codec::encode_record(rec))
                                    .map(|_| addr)
                            });
                            match written {
                                Ok(addr) => {
                                    fresh.push(addr);
                                    stale.extend(existing.copied());
                                    next_blocks.insert(key, addr);
                                }
                                Err(e) => {
                                    release(store, fresh, &self.label);
                                    return Err(e);
                                }
                            }
                        }
                    }
                }
                for (key, addr) in &self.blocks {
                    if !next_blocks.contains_key(key) {
                        stale.push(*addr);
                    }
                }

                let bytes = codec::encode_header(
                    &self.header_meta(),
                    &HeaderBodyRef::Dense(next_blocks.values().copied().collect()),
                );
                if let Err(e) = store.write_block(self.header, &bytes) {
                    release(store, fresh, &self.label);
                    return Err(e);
                }
                release(store, stale, &self.label);
                self.blocks = next_blocks;
                Ok(())
            }
        }
    }
}

/// Frees blocks that nothing references any more. Failures only leak space.
fn release<B: ByteStore + ?Sized>(
    store: &B,
    addrs: impl IntoIterator<Item = BlockAddr>,
    label: &str,
) {
    for addr in addrs {
        if let Err(e) = store.free_block(addr) {
            warn!(object = %label, block = %addr, error = %e, "could not free attribute block");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SimpleCatalog;
    use crate::store::mem_backend::MemBackend;

    struct Fixture {
        store: MemBackend,
        catalog: SimpleCatalog,
        dt: DatatypeRef,
        sp: DataspaceRef,
        dir: AttributeDirectory,
    }

    fn fixture_with(phase: PhaseChange, track_order: bool) -> Fixture {
        let store = MemBackend::new();
        let mut catalog = SimpleCatalog::new();
        let dt = catalog.register_datatype(4).unwrap();
        let sp = catalog.scalar().unwrap();
        let dir = AttributeDirectory::create(&store, 1, "/obj", phase, track_order).unwrap();
        Fixture {
            store,
            catalog,
            dt,
            sp,
            dir,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(PhaseChange::default(), true)
    }

    impl Fixture {
        fn add(&mut self, name: &str) -> AttrHandle {
            self.dir
                .create_attr(
                    &self.store,
                    &self.catalog,
                    name,
                    self.dt,
                    self.sp,
                    AttrCreateParams::default(),
                )
                .unwrap()
        }

        fn reload(&self) -> AttributeDirectory {
            AttributeDirectory::load(&self.store, 1, "/obj", self.dir.header_addr()).unwrap()
        }
    }

    #[test]
    fn example_scenario_from_three_attributes() {
        let mut f = fixture();
        for n in ["a", "b", "c"] {
            f.add(n);
        }
        assert_eq!(f.dir.info_by_name("b").unwrap().creation_order, 1);
        assert_eq!(
            f.dir.names(IndexType::Name, IterOrder::Increasing).unwrap(),
            vec!["a", "b", "c"]
        );

        f.dir.delete(&f.store, "a").unwrap();
        assert_eq!(
            f.dir
                .names(IndexType::CreationOrder, IterOrder::Increasing)
                .unwrap(),
            vec!["b", "c"]
        );
        assert_eq!(f.dir.info_by_name("b").unwrap().creation_order, 1);
    }

    #[test]
    fn duplicate_create_leaves_directory_unchanged() {
        let mut f = fixture();
        f.add("a");
        let writes = f.store.write_count();
        let err = f
            .dir
            .create_attr(&f.store, &f.catalog, "a", f.dt, f.sp, AttrCreateParams::default())
            .unwrap_err();
        assert!(matches!(err, AttrError::Duplicate(n) if n == "a"));
        assert_eq!(f.dir.len(), 1);
        assert_eq!(f.dir.next_creation_order(), 1);
        assert_eq!(f.store.write_count(), writes);
    }

    #[test]
    fn new_value_is_zeroed_and_sized_from_catalog() {
        let mut f = fixture();
        let sp = f.catalog.register_dataspace(&[3]).unwrap();
        let h = f
            .dir
            .create_attr(&f.store, &f.catalog, "v", f.dt, sp, AttrCreateParams::utf8())
            .unwrap();
        assert_eq!(f.dir.read(h).unwrap(), &[0u8; 12][..]);
        assert_eq!(f.dir.storage_size(h).unwrap(), 12);
        assert_eq!(f.dir.dataspace(h).unwrap(), sp);
        assert_eq!(f.dir.datatype(h).unwrap(), f.dt);
        assert_eq!(f.dir.create_params(h).unwrap(), AttrCreateParams::utf8());
    }

    #[test]
    fn write_then_read_round_trips_and_mismatch_keeps_old_value() {
        let mut f = fixture();
        let h = f.add("x");
        f.dir.write(&f.store, h, &[1, 2, 3, 4]).unwrap();
        assert_eq!(f.dir.read(h).unwrap(), &[1, 2, 3, 4]);

        let err = f.dir.write(&f.store, h, &[9, 9]).unwrap_err();
        assert!(matches!(
            err,
            AttrError::TypeMismatch { expected: 4, actual: 2, .. }
        ));
        assert_eq!(f.dir.read(h).unwrap(), &[1, 2, 3, 4]);

        let mut buf = [0u8; 4];
        f.dir.read_into(h, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
        assert!(f.dir.read_into(h, &mut [0u8; 5]).is_err());
    }

    #[test]
    fn rename_identity_and_conflicts() {
        let mut f = fixture();
        f.add("a");
        f.add("b");
        let writes = f.store.write_count();
        f.dir.rename(&f.store, "a", "a").unwrap();
        assert_eq!(f.store.write_count(), writes);

        assert!(matches!(
            f.dir.rename(&f.store, "a", "b"),
            Err(AttrError::Duplicate(_))
        ));
        assert!(matches!(
            f.dir.rename(&f.store, "zz", "zz"),
            Err(AttrError::NotFound(_))
        ));

        f.dir.rename(&f.store, "a", "c").unwrap();
        assert!(!f.dir.exists("a"));
        assert_eq!(f.dir.info_by_name("c").unwrap().creation_order, 0);
    }

    #[test]
    fn handle_survives_rename_and_fails_after_delete() {
        let mut f = fixture();
        let h = f.add("old");
        f.dir.rename(&f.store, "old", "new").unwrap();
        assert_eq!(f.dir.name(h).unwrap(), "new");

        f.dir.delete(&f.store, "new").unwrap();
        assert!(matches!(f.dir.read(h), Err(AttrError::NotFound(_))));
        f.dir.close(h).unwrap();
        assert!(matches!(f.dir.close(h), Err(AttrError::InvalidHandle(_))));
        assert_eq!(f.dir.open_handles(), 0);
    }

    #[test]
    fn closed_handle_is_rejected() {
        let mut f = fixture();
        let h = f.add("a");
        f.dir.close(h).unwrap();
        assert!(matches!(f.dir.read(h), Err(AttrError::InvalidHandle(_))));
    }

    #[test]
    fn open_by_index_resolves_in_requested_order() {
        let mut f = fixture();
        for n in ["b", "c", "a"] {
            f.add(n);
        }
        let h = f
            .dir
            .open_by_index(IndexType::Name, IterOrder::Increasing, 0)
            .unwrap();
        assert_eq!(f.dir.name(h).unwrap(), "a");
        let h = f
            .dir
            .open_by_index(IndexType::CreationOrder, IterOrder::Decreasing, 0)
            .unwrap();
        assert_eq!(f.dir.name(h).unwrap(), "a");
        assert_eq!(
            f.dir
                .name_by_index(IndexType::CreationOrder, IterOrder::Increasing, 1)
                .unwrap(),
            "c"
        );

        let err = f
            .dir
            .open_by_index(IndexType::Name, IterOrder::Increasing, 3)
            .unwrap_err();
        assert!(matches!(err, AttrError::InvalidIndex { count: 3, .. }));
    }

    #[test]
    fn promotes_once_and_keeps_every_record_reachable() {
        let mut f = fixture();
        let names: Vec<String> = (0..12).map(|i| format!("attr{:02}", i)).collect();
        let mut transitions = 0;
        let mut mode = f.dir.mode();
        for n in &names {
            f.add(n);
            if f.dir.mode() != mode {
                transitions += 1;
                mode = f.dir.mode();
            }
        }
        assert_eq!(transitions, 1);
        assert_eq!(f.dir.mode(), StorageMode::Dense);
        for (i, n) in names.iter().enumerate() {
            assert_eq!(f.dir.info_by_name(n).unwrap().creation_order, i as u64);
        }
        assert_eq!(
            f.dir
                .names(IndexType::CreationOrder, IterOrder::Increasing)
                .unwrap(),
            names
        );
        f.dir.verify().unwrap();
    }

    #[test]
    fn demotes_below_min_dense_only() {
        let mut f = fixture();
        for i in 0..9 {
            f.add(&format!("a{}", i));
        }
        assert_eq!(f.dir.mode(), StorageMode::Dense);
        f.dir.delete(&f.store, "a0").unwrap();
        f.dir.delete(&f.store, "a1").unwrap();
        f.dir.delete(&f.store, "a2").unwrap();
        assert_eq!(f.dir.len(), 6);
        assert_eq!(f.dir.mode(), StorageMode::Dense);
        f.dir.delete(&f.store, "a3").unwrap();
        assert_eq!(f.dir.mode(), StorageMode::Compact);
        // Only the header block is left once the dense record blocks are released.
        assert_eq!(f.store.block_count(), 1);
    }

    #[test]
    fn counter_never_resets_after_emptying() {
        let mut f = fixture();
        f.add("a");
        f.add("b");
        f.dir.delete(&f.store, "a").unwrap();
        f.dir.delete(&f.store, "b").unwrap();
        assert!(f.dir.is_empty());
        f.add("a");
        assert_eq!(f.dir.info_by_name("a").unwrap().creation_order, 2);
    }

    #[test]
    fn failed_persist_rolls_back_create_and_promotion() {
        let mut f = fixture();
        for i in 0..8 {
            f.add(&format!("a{}", i));
        }
        assert_eq!(f.dir.mode(), StorageMode::Compact);
        f.store.set_simulate_write_error(true);
        let err = f
            .dir
            .create_attr(&f.store, &f.catalog, "ninth", f.dt, f.sp, AttrCreateParams::default())
            .unwrap_err();
        assert!(matches!(err, AttrError::Store(_)));
        assert_eq!(f.dir.mode(), StorageMode::Compact);
        assert_eq!(f.dir.len(), 8);
        assert!(!f.dir.exists("ninth"));
        assert_eq!(f.dir.next_creation_order(), 8);
        f.store.set_simulate_write_error(false);

        f.add("ninth");
        assert_eq!(f.dir.info_by_name("ninth").unwrap().creation_order, 8);
        assert_eq!(f.dir.mode(), StorageMode::Dense);
    }

    #[test]
    fn failed_persist_rolls_back_delete_rename_and_write() {
        let mut f = fixture_with(PhaseChange::new(1, 0).unwrap(), true);
        let h = f.add("a");
        f.add("b");
        assert_eq!(f.dir.mode(), StorageMode::Dense);
        f.dir.write(&f.store, h, &[7, 7, 7, 7]).unwrap();

        f.store.set_simulate_write_error(true);
        assert!(f.dir.delete(&f.store, "a").is_err());
        assert!(f.dir.rename(&f.store, "a", "z").is_err());
        assert!(f.dir.write(&f.store, h, &[1, 1, 1, 1]).is_err());
        f.store.set_simulate_write_error(false);

        assert_eq!(
            f.dir
                .names(IndexType::CreationOrder, IterOrder::Increasing)
                .unwrap(),
            vec!["a", "b"]
        );
        assert_eq!(f.dir.read(h).unwrap(), &[7, 7, 7, 7]);
        f.dir.verify().unwrap();

        let reloaded = f.reload();
        assert_eq!(
            reloaded.names(IndexType::Name, IterOrder::Increasing).unwrap(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn reload_restores_both_modes() {
        let mut f = fixture();
        let h = f.add("x");
        f.dir.write(&f.store, h, &[5, 6, 7, 8]).unwrap();
        let compact = f.reload();
        assert_eq!(compact.mode(), StorageMode::Compact);
        assert_eq!(compact.info_by_name("x").unwrap().data_size, 4);

        for i in 0..10 {
            f.add(&format!("d{}", i));
        }
        f.dir.rename(&f.store, "d3", "renamed").unwrap();
        let mut dense = f.reload();
        assert_eq!(dense.mode(), StorageMode::Dense);
        assert_eq!(dense.len(), 11);
        assert_eq!(dense.next_creation_order(), 11);
        assert_eq!(dense.info_by_name("renamed").unwrap().creation_order, 4);
        let h = dense.open("x").unwrap();
        assert_eq!(dense.read(h).unwrap(), &[5, 6, 7, 8]);
    }

    #[test]
    fn dense_write_is_copy_on_write() {
        let mut f = fixture_with(PhaseChange::new(0, 0).unwrap(), true);
        let h = f.add("a");
        assert_eq!(f.dir.mode(), StorageMode::Dense);
        let before = f.store.block_count();
        f.dir.write(&f.store, h, &[1, 2, 3, 4]).unwrap();
        assert_eq!(f.store.block_count(), before);
        let reloaded = f.reload();
        assert_eq!(reloaded.info_by_name("a").unwrap().data_size, 4);
    }

    #[test]
    fn untracked_objects_reject_creation_order_queries() {
        let mut f = fixture_with(PhaseChange::default(), false);
        f.add("b");
        f.add("a");
        let info = f.dir.info_by_name("a").unwrap();
        assert!(!info.corder_valid);
        assert_eq!(info.creation_order, 0);
        assert!(matches!(
            f.dir.names(IndexType::CreationOrder, IterOrder::Increasing),
            Err(AttrError::CreationOrderNotTracked(_))
        ));
        assert_eq!(
            f.dir.names(IndexType::Name, IterOrder::Increasing).unwrap(),
            vec!["a", "b"]
        );
        assert_eq!(
            f.dir.names(IndexType::Name, IterOrder::Native).unwrap(),
            vec!["b", "a"]
        );
    }

    #[test]
    fn iterate_rejects_cursor_past_end() {
        let mut f = fixture();
        f.add("a");
        let mut cursor = 2;
        let err = f
            .dir
            .iterate(IndexType::Name, IterOrder::Increasing, &mut cursor, |_, _| 0)
            .unwrap_err();
        assert!(matches!(err, AttrError::InvalidIndex { count: 1, .. }));
    }

    #[test]
    fn mutation_between_resumed_iterations_stays_consistent() {
        let mut f = fixture();
        for n in ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"] {
            f.add(n);
        }
        let mut cursor = 0;
        let mut seen = Vec::new();
        let status = f
            .dir
            .iterate(IndexType::Name, IterOrder::Increasing, &mut cursor, |n, _| {
                seen.push(n.to_string());
                if seen.len() == 4 {
                    1
                } else {
                    0
                }
            })
            .unwrap();
        assert_eq!(status, IterStatus::ShortCircuited(1));

        // Delete before the cursor and insert after it, crossing the demotion threshold.
        for n in ["a", "b", "c", "d", "e"] {
            f.dir.delete(&f.store, n).unwrap();
        }
        f.add("zz");
        f.dir.verify().unwrap();

        let status = f
            .dir
            .iterate(IndexType::Name, IterOrder::Increasing, &mut cursor, |n, _| {
                seen.push(n.to_string());
                0
            })
            .unwrap();
        assert!(status.is_completed());
        // Records shifted under the cursor are skipped, never invented.
        for n in &seen[4..] {
            assert!(f.dir.exists(n), "{} was visited but does not exist", n);
        }
        assert_eq!(cursor, f.dir.len() as u64);
    }
}
