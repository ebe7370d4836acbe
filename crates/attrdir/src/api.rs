//! # API Facade
//!
//! [`AttrApi`] is the single entry point for attribute operations, whatever the front
//! end. It owns a [`Container`] and forwards each call to the [`AttributeDirectory`]
//! of the object it targets.
//!
//! ## Locating the Target
//!
//! Operations come in families that differ only in how the record is found:
//!
//! - **direct**: `loc` is the object that owns the attribute, the record is named
//!   (`create`, `open`, `rename`, `delete`, `exists`, `iterate`).
//! - **by name**: the owning object is `obj_path` resolved relative to `loc`
//!   (`"."` is `loc` itself, absolute paths ignore `loc`).
//! - **by index**: as *by name*, but the record is the `n`-th one in the requested
//!   [`IndexType`] and [`IterOrder`].
//! - **by handle**: the record is the one an open [`AttrHandle`] refers to.
//!
//! ## What the API Does NOT Do
//!
//! - **Storage decisions**: mode changes and persistence live in [`crate::directory`].
//! - **Presentation**: everything returns data structures, never strings for display.
//!
//! ## Generic Over ByteStore
//!
//! `AttrApi<B: ByteStore>` runs on [`crate::store::fs_backend::FsBackend`] in
//! production and [`crate::store::mem_backend::MemBackend`] in tests.
//!
//! [`AttributeDirectory`]: crate::directory::AttributeDirectory

use crate::config::AttrConfig;
use crate::container::Container;
use crate::directory::AttrHandle;
use crate::error::Result;
use crate::index::AttrSelector;
use crate::iterate::IterStatus;
use crate::legacy::Legacy;
use crate::model::{
    AttrCreateParams, AttrInfo, DataspaceRef, DatatypeRef, IndexType, IterOrder, ObjectKind,
};
use crate::store::backend::ByteStore;
use crate::store::StorageMode;

pub struct AttrApi<B: ByteStore> {
    container: Container<B>,
}

impl<B: ByteStore> AttrApi<B> {
    pub fn new(container: Container<B>) -> Self {
        Self { container }
    }

    /// Initializes a fresh container in `backend`.
    pub fn init(backend: B, config: AttrConfig) -> Result<Self> {
        Ok(Self::new(Container::create(backend, config)?))
    }

    /// Opens the container stored in `backend`.
    pub fn open_container(backend: B, config: AttrConfig) -> Result<Self> {
        Ok(Self::new(Container::open(backend, config)?))
    }

    pub fn container(&self) -> &Container<B> {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Container<B> {
        &mut self.container
    }

    /// Reduced surface with creation order as the only ordering.
    pub fn legacy(&mut self) -> Legacy<'_, B> {
        Legacy::new(&mut self.container)
    }

    // --- Objects and types ---

    pub fn create_object(&mut self, path: &str, kind: ObjectKind) -> Result<u64> {
        self.container.create_object(path, kind)
    }

    pub fn remove_object(&mut self, path: &str) -> Result<()> {
        self.container.remove_object(path)
    }

    pub fn register_datatype(&mut self, element_size: usize) -> Result<DatatypeRef> {
        self.container.register_datatype(element_size)
    }

    pub fn register_dataspace(&mut self, dims: &[u64]) -> Result<DataspaceRef> {
        self.container.register_dataspace(dims)
    }

    // --- Create / destroy ---

    pub fn create(
        &mut self,
        loc: &str,
        name: &str,
        datatype: DatatypeRef,
        dataspace: DataspaceRef,
        params: AttrCreateParams,
    ) -> Result<AttrHandle> {
        let (dir, store, catalog) = self.container.directory_mut(loc)?;
        dir.create_attr(store, catalog, name, datatype, dataspace, params)
    }

    pub fn create_by_name(
        &mut self,
        loc: &str,
        obj_path: &str,
        name: &str,
        datatype: DatatypeRef,
        dataspace: DataspaceRef,
        params: AttrCreateParams,
    ) -> Result<AttrHandle> {
        let path = self.container.resolve(loc, obj_path)?;
        self.create(&path, name, datatype, dataspace, params)
    }

    pub fn delete(&mut self, loc: &str, name: &str) -> Result<()> {
        let (dir, store, _) = self.container.directory_mut(loc)?;
        dir.delete(store, name)
    }

    pub fn delete_by_name(&mut self, loc: &str, obj_path: &str, name: &str) -> Result<()> {
        let path = self.container.resolve(loc, obj_path)?;
        self.delete(&path, name)
    }

    pub fn delete_by_index(
        &mut self,
        loc: &str,
        obj_path: &str,
        index_type: IndexType,
        order: IterOrder,
        n: u64,
    ) -> Result<()> {
        let path = self.container.resolve(loc, obj_path)?;
        let (dir, store, _) = self.container.directory_mut(&path)?;
        dir.delete_by_index(store, index_type, order, n)
    }

    // --- Open / close ---

    pub fn open(&mut self, loc: &str, name: &str) -> Result<AttrHandle> {
        let (dir, _, _) = self.container.directory_mut(loc)?;
        dir.open(name)
    }

    pub fn open_by_name(&mut self, loc: &str, obj_path: &str, name: &str) -> Result<AttrHandle> {
        let path = self.container.resolve(loc, obj_path)?;
        self.open(&path, name)
    }

    pub fn open_by_index(
        &mut self,
        loc: &str,
        obj_path: &str,
        index_type: IndexType,
        order: IterOrder,
        n: u64,
    ) -> Result<AttrHandle> {
        let path = self.container.resolve(loc, obj_path)?;
        let (dir, _, _) = self.container.directory_mut(&path)?;
        dir.open_by_index(index_type, order, n)
    }

    /// Opens whatever a text [`AttrSelector`] points at on `loc`.
    pub fn open_selected(&mut self, loc: &str, selector: &AttrSelector) -> Result<AttrHandle> {
        match selector {
            AttrSelector::Name(name) => self.open(loc, name),
            AttrSelector::Position { index_type, n } => {
                self.open_by_index(loc, ".", *index_type, selector.order(), *n)
            }
        }
    }

    pub fn close(&mut self, handle: AttrHandle) -> Result<()> {
        let (dir, _, _) = self.container.directory_by_id_mut(handle.object())?;
        dir.close(handle)
    }

    // --- Data access ---

    pub fn read(&self, handle: AttrHandle) -> Result<Vec<u8>> {
        let dir = self.container.directory_by_id(handle.object())?;
        dir.read(handle).map(<[u8]>::to_vec)
    }

    pub fn read_into(&self, handle: AttrHandle, buf: &mut [u8]) -> Result<()> {
        self.container
            .directory_by_id(handle.object())?
            .read_into(handle, buf)
    }

    pub fn write(&mut self, handle: AttrHandle, value: &[u8]) -> Result<()> {
        let (dir, store, _) = self.container.directory_by_id_mut(handle.object())?;
        dir.write(store, handle, value)
    }

    pub fn get_type(&self, handle: AttrHandle) -> Result<DatatypeRef> {
        self.container
            .directory_by_id(handle.object())?
            .datatype(handle)
    }

    pub fn get_space(&self, handle: AttrHandle) -> Result<DataspaceRef> {
        self.container
            .directory_by_id(handle.object())?
            .dataspace(handle)
    }

    pub fn get_create_params(&self, handle: AttrHandle) -> Result<AttrCreateParams> {
        self.container
            .directory_by_id(handle.object())?
            .create_params(handle)
    }

    // --- Metadata queries ---

    pub fn get_name(&self, handle: AttrHandle) -> Result<String> {
        self.container
            .directory_by_id(handle.object())?
            .name(handle)
            .map(str::to_string)
    }

    pub fn get_name_by_index(
        &self,
        loc: &str,
        obj_path: &str,
        index_type: IndexType,
        order: IterOrder,
        n: u64,
    ) -> Result<String> {
        let path = self.container.resolve(loc, obj_path)?;
        self.container
            .directory(&path)?
            .name_by_index(index_type, order, n)
            .map(str::to_string)
    }

    pub fn get_storage_size(&self, handle: AttrHandle) -> Result<u64> {
        self.container
            .directory_by_id(handle.object())?
            .storage_size(handle)
    }

    pub fn get_info(&self, handle: AttrHandle) -> Result<AttrInfo> {
        self.container.directory_by_id(handle.object())?.info(handle)
    }

    pub fn get_info_by_name(&self, loc: &str, obj_path: &str, name: &str) -> Result<AttrInfo> {
        let path = self.container.resolve(loc, obj_path)?;
        self.container.directory(&path)?.info_by_name(name)
    }

    pub fn get_info_by_index(
        &self,
        loc: &str,
        obj_path: &str,
        index_type: IndexType,
        order: IterOrder,
        n: u64,
    ) -> Result<AttrInfo> {
        let path = self.container.resolve(loc, obj_path)?;
        self.container
            .directory(&path)?
            .info_by_index(index_type, order, n)
    }

    /// Never fails on an absent attribute, only on an unknown object.
    pub fn exists(&self, loc: &str, name: &str) -> Result<bool> {
        Ok(self.container.directory(loc)?.exists(name))
    }

    pub fn exists_by_name(&self, loc: &str, obj_path: &str, name: &str) -> Result<bool> {
        let path = self.container.resolve(loc, obj_path)?;
        self.exists(&path, name)
    }

    /// Number of attributes on `loc`.
    pub fn count(&self, loc: &str) -> Result<usize> {
        Ok(self.container.directory(loc)?.len())
    }

    pub fn storage_mode(&self, loc: &str) -> Result<StorageMode> {
        Ok(self.container.directory(loc)?.mode())
    }

    // --- Mutation ---

    pub fn rename(&mut self, loc: &str, old_name: &str, new_name: &str) -> Result<()> {
        let (dir, store, _) = self.container.directory_mut(loc)?;
        dir.rename(store, old_name, new_name)
    }

    pub fn rename_by_name(
        &mut self,
        loc: &str,
        obj_path: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<()> {
        let path = self.container.resolve(loc, obj_path)?;
        self.rename(&path, old_name, new_name)
    }

    // --- Enumeration ---

    /// See [`crate::iterate`] for the callback and cursor contract.
    pub fn iterate<F>(
        &self,
        loc: &str,
        index_type: IndexType,
        order: IterOrder,
        cursor: &mut u64,
        op: F,
    ) -> Result<IterStatus>
    where
        F: FnMut(&str, &AttrInfo) -> i32,
    {
        self.container
            .directory(loc)?
            .iterate(index_type, order, cursor, op)
    }

    pub fn iterate_by_name<F>(
        &self,
        loc: &str,
        obj_path: &str,
        index_type: IndexType,
        order: IterOrder,
        cursor: &mut u64,
        op: F,
    ) -> Result<IterStatus>
    where
        F: FnMut(&str, &AttrInfo) -> i32,
    {
        let path = self.container.resolve(loc, obj_path)?;
        self.iterate(&path, index_type, order, cursor, op)
    }

    /// Collected `(name, info)` pairs in the requested order.
    pub fn list(
        &self,
        loc: &str,
        index_type: IndexType,
        order: IterOrder,
    ) -> Result<Vec<(String, AttrInfo)>> {
        Ok(self
            .container
            .directory(loc)?
            .entries(index_type, order)?
            .map(|(name, info)| (name.to_string(), info))
            .collect())
    }
}
