//! # Container
//!
//! A [`Container`] is the owner of every attribute directory. It keeps a table of
//! objects (groups, datasets and named types) addressed by absolute slash-separated
//! paths, plus the [`SimpleCatalog`] that gives meaning to datatype and dataspace
//! references. The root group `/` always exists.
//!
//! ## Superblock
//!
//! Block `0` of the byte store holds the superblock as JSON:
//!
//! ```json
//! {
//!   "version": 1,
//!   "next_object_id": 4,
//!   "catalog": { ... },
//!   "objects": [ { "path": "/", "id": 1, "kind": "group", "header": 1 }, ... ]
//! }
//! ```
//!
//! Each entry points at the object header that [`AttributeDirectory`] owns. The
//! superblock changes only when objects are added or removed or the catalog grows;
//! attribute mutations touch the object header alone.
//!
//! ## Paths
//!
//! Paths are absolute, `/`-separated, without empty segments or trailing slashes.
//! `.` and `..` are understood when resolving a path relative to a location (the
//! `*_by_name` operations of the API), but never stored.

use crate::catalog::SimpleCatalog;
use crate::config::AttrConfig;
use crate::directory::AttributeDirectory;
use crate::error::{AttrError, Result};
use crate::model::{DataspaceRef, DatatypeRef, ObjectKind};
use crate::store::backend::{BlockAddr, ByteStore};
use crate::store::PhaseChange;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

pub const ROOT: &str = "/";
pub const SUPERBLOCK: BlockAddr = BlockAddr(0);
const SUPERBLOCK_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Superblock {
    version: u32,
    next_object_id: u64,
    catalog: SimpleCatalog,
    objects: Vec<ObjectEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectEntry {
    path: String,
    id: u64,
    kind: ObjectKind,
    header: u64,
}

/// Summary of one object, as listed by [`Container::objects`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub path: String,
    pub id: u64,
    pub kind: ObjectKind,
    pub attributes: usize,
}

struct Object {
    id: u64,
    kind: ObjectKind,
    dir: AttributeDirectory,
}

pub struct Container<B: ByteStore> {
    backend: B,
    config: AttrConfig,
    catalog: SimpleCatalog,
    objects: BTreeMap<String, Object>,
    paths: HashMap<u64, String>,
    next_object_id: u64,
}

impl<B: ByteStore> Container<B> {
    /// Initializes an empty container holding only the root group.
    pub fn create(backend: B, config: AttrConfig) -> Result<Self> {
        if backend.read_block(SUPERBLOCK)?.is_some() {
            return Err(AttrError::ObjectExists(
                "a container already exists in this store".to_string(),
            ));
        }
        let phase = config.phase()?;
        let dir = AttributeDirectory::create(&backend, 1, ROOT, phase, config.track_order)?;
        let mut container = Self {
            backend,
            config,
            catalog: SimpleCatalog::new(),
            objects: BTreeMap::new(),
            paths: HashMap::new(),
            next_object_id: 2,
        };
        container.insert_object(ROOT.to_string(), 1, ObjectKind::Group, dir);
        container.flush()?;
        info!("initialized container");
        Ok(container)
    }

    /// Reloads the superblock and every object header.
    pub fn open(backend: B, config: AttrConfig) -> Result<Self> {
        let bytes = backend.read_block(SUPERBLOCK)?.ok_or_else(|| {
            AttrError::ObjectNotFound("no container found (run init first)".to_string())
        })?;
        let sb: Superblock = serde_json::from_slice(&bytes)?;
        if sb.version != SUPERBLOCK_VERSION {
            return Err(AttrError::StorageInconsistent(format!(
                "unsupported superblock version {}",
                sb.version
            )));
        }

        let mut container = Self {
            backend,
            config,
            catalog: sb.catalog,
            objects: BTreeMap::new(),
            paths: HashMap::new(),
            next_object_id: sb.next_object_id,
        };
        for entry in sb.objects {
            let dir = AttributeDirectory::load(
                &container.backend,
                entry.id,
                entry.path.clone(),
                BlockAddr(entry.header),
            )?;
            container.insert_object(entry.path, entry.id, entry.kind, dir);
        }
        if !container.objects.contains_key(ROOT) {
            return Err(AttrError::StorageInconsistent(
                "superblock has no root group".to_string(),
            ));
        }
        debug!(objects = container.objects.len(), "opened container");
        Ok(container)
    }

    /// Writes the superblock.
    pub fn flush(&self) -> Result<()> {
        let sb = Superblock {
            version: SUPERBLOCK_VERSION,
            next_object_id: self.next_object_id,
            catalog: self.catalog.clone(),
            objects: self
                .objects
                .iter()
                .map(|(path, obj)| ObjectEntry {
                    path: path.clone(),
                    id: obj.id,
                    kind: obj.kind,
                    header: obj.dir.header_addr().0,
                })
                .collect(),
        };
        let bytes = serde_json::to_vec_pretty(&sb)?;
        self.backend.write_block(SUPERBLOCK, &bytes)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &AttrConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SimpleCatalog {
        &self.catalog
    }

    pub fn register_datatype(&mut self, element_size: usize) -> Result<DatatypeRef> {
        self.update_catalog(|catalog| catalog.register_datatype(element_size))
    }

    pub fn register_dataspace(&mut self, dims: &[u64]) -> Result<DataspaceRef> {
        self.update_catalog(|catalog| catalog.register_dataspace(dims))
    }

    /// Applies `f` to the catalog and flushes; the catalog is restored if either fails.
    fn update_catalog<T>(
        &mut self,
        f: impl FnOnce(&mut SimpleCatalog) -> Result<T>,
    ) -> Result<T> {
        let saved = self.catalog.clone();
        let result = f(&mut self.catalog).and_then(|value| self.flush().map(|_| value));
        if result.is_err() {
            self.catalog = saved;
        }
        result
    }

    /// Creates an object. The parent must be an existing group.
    pub fn create_object(&mut self, path: &str, kind: ObjectKind) -> Result<u64> {
        let path = normalize(path)?;
        if self.objects.contains_key(&path) {
            return Err(AttrError::ObjectExists(path));
        }
        let parent = parent_of(&path);
        match self.objects.get(parent) {
            Some(obj) if obj.kind == ObjectKind::Group => {}
            Some(_) => {
                return Err(AttrError::InvalidPath(format!(
                    "{} is not a group",
                    parent
                )))
            }
            None => return Err(AttrError::ObjectNotFound(parent.to_string())),
        }

        let id = self.next_object_id;
        let phase: PhaseChange = self.config.phase()?;
        let dir = AttributeDirectory::create(
            &self.backend,
            id,
            path.clone(),
            phase,
            self.config.track_order,
        )?;
        self.next_object_id += 1;
        let header = dir.header_addr();
        self.insert_object(path.clone(), id, kind, dir);

        if let Err(e) = self.flush() {
            if let Some(obj) = self.take_object(&path) {
                if let Err(cleanup) = obj.dir.destroy(&self.backend) {
                    warn!(path = %path, error = %cleanup, "could not free blocks of unregistered object");
                }
            }
            self.next_object_id = id;
            return Err(e);
        }
        debug!(path = %path, %kind, id, header = %header, "created object");
        Ok(id)
    }

    /// Removes an object and frees its attribute storage. Groups must be empty.
    pub fn remove_object(&mut self, path: &str) -> Result<()> {
        let path = normalize(path)?;
        if path == ROOT {
            return Err(AttrError::InvalidPath("the root group cannot be removed".to_string()));
        }
        if !self.objects.contains_key(&path) {
            return Err(AttrError::ObjectNotFound(path));
        }
        let prefix = format!("{}/", path);
        if self.objects.keys().any(|p| p.starts_with(&prefix)) {
            return Err(AttrError::InvalidPath(format!("group {} is not empty", path)));
        }

        let obj = self
            .take_object(&path)
            .ok_or_else(|| AttrError::ObjectNotFound(path.clone()))?;
        if let Err(e) = self.flush() {
            self.insert_object(path, obj.id, obj.kind, obj.dir);
            return Err(e);
        }
        obj.dir.destroy(&self.backend)?;
        debug!(path = %path, "removed object");
        Ok(())
    }

    pub fn exists_object(&self, path: &str) -> bool {
        normalize(path)
            .map(|p| self.objects.contains_key(&p))
            .unwrap_or(false)
    }

    pub fn kind(&self, path: &str) -> Result<ObjectKind> {
        let path = normalize(path)?;
        self.objects
            .get(&path)
            .map(|o| o.kind)
            .ok_or(AttrError::ObjectNotFound(path))
    }

    /// Objects in path order.
    pub fn objects(&self) -> Vec<ObjectInfo> {
        self.objects
            .iter()
            .map(|(path, obj)| ObjectInfo {
                path: path.clone(),
                id: obj.id,
                kind: obj.kind,
                attributes: obj.dir.len(),
            })
            .collect()
    }

    /// Resolves `obj_path` against the location `loc`. Absolute paths ignore `loc`.
    pub fn resolve(&self, loc: &str, obj_path: &str) -> Result<String> {
        let base = normalize(loc)?;
        let joined = if obj_path.starts_with('/') {
            obj_path.to_string()
        } else if base == ROOT {
            format!("/{}", obj_path)
        } else {
            format!("{}/{}", base, obj_path)
        };
        let path = normalize(&joined)?;
        if !self.objects.contains_key(&path) {
            return Err(AttrError::ObjectNotFound(path));
        }
        Ok(path)
    }

    pub fn directory(&self, path: &str) -> Result<&AttributeDirectory> {
        let path = normalize(path)?;
        self.objects
            .get(&path)
            .map(|o| &o.dir)
            .ok_or(AttrError::ObjectNotFound(path))
    }

    /// The directory of `path` together with the collaborators its mutations need.
    pub fn directory_mut(
        &mut self,
        path: &str,
    ) -> Result<(&mut AttributeDirectory, &B, &SimpleCatalog)> {
        let path = normalize(path)?;
        let obj = self
            .objects
            .get_mut(&path)
            .ok_or(AttrError::ObjectNotFound(path))?;
        Ok((&mut obj.dir, &self.backend, &self.catalog))
    }

    /// The directory that owns the object with id `object`.
    pub fn directory_by_id(&self, object: u64) -> Result<&AttributeDirectory> {
        let path = self.path_of(object)?;
        self.directory(&path)
    }

    pub fn directory_by_id_mut(
        &mut self,
        object: u64,
    ) -> Result<(&mut AttributeDirectory, &B, &SimpleCatalog)> {
        let path = self.path_of(object)?;
        self.directory_mut(&path)
    }

    fn path_of(&self, object: u64) -> Result<String> {
        self.paths
            .get(&object)
            .cloned()
            .ok_or_else(|| AttrError::ObjectNotFound(format!("object #{}", object)))
    }

    fn insert_object(&mut self, path: String, id: u64, kind: ObjectKind, dir: AttributeDirectory) {
        self.paths.insert(id, path.clone());
        self.objects.insert(path, Object { id, kind, dir });
    }

    fn take_object(&mut self, path: &str) -> Option<Object> {
        let obj = self.objects.remove(path)?;
        self.paths.remove(&obj.id);
        Some(obj)
    }
}

/// Canonical absolute form of `path`: resolves `.` and `..`, drops repeated slashes.
pub fn normalize(path: &str) -> Result<String> {
    if !path.starts_with('/') {
        return Err(AttrError::InvalidPath(format!(
            "\"{}\" is not absolute",
            path
        )));
    }
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(AttrError::InvalidPath(format!(
                        "\"{}\" climbs above the root",
                        path
                    )));
                }
            }
            s if s.contains('\0') => {
                return Err(AttrError::InvalidPath(format!(
                    "\"{}\" contains a NUL byte",
                    path.escape_default()
                )))
            }
            s => parts.push(s),
        }
    }
    Ok(format!("/{}", parts.join("/")))
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => ROOT,
        Some(i) => &path[..i],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeCatalog;
    use crate::model::AttrCreateParams;
    use crate::store::mem_backend::MemBackend;

    fn container() -> Container<MemBackend> {
        Container::create(MemBackend::new(), AttrConfig::default()).unwrap()
    }

    #[test]
    fn normalize_paths() {
        assert_eq!(normalize("/").unwrap(), "/");
        assert_eq!(normalize("//a//b/").unwrap(), "/a/b");
        assert_eq!(normalize("/a/./b/../c").unwrap(), "/a/c");
        assert!(normalize("a/b").is_err());
        assert!(normalize("/..").is_err());
    }

    #[test]
    fn parent_of_paths() {
        assert_eq!(parent_of("/a"), "/");
        assert_eq!(parent_of("/a/b"), "/a");
    }

    #[test]
    fn root_exists_after_create() {
        let c = container();
        assert!(c.exists_object("/"));
        assert_eq!(c.kind("/").unwrap(), ObjectKind::Group);
        assert_eq!(c.objects().len(), 1);
    }

    #[test]
    fn create_requires_existing_parent_group() {
        let mut c = container();
        assert!(matches!(
            c.create_object("/g/d", ObjectKind::Dataset),
            Err(AttrError::ObjectNotFound(_))
        ));
        c.create_object("/g", ObjectKind::Group).unwrap();
        c.create_object("/g/d", ObjectKind::Dataset).unwrap();
        assert!(matches!(
            c.create_object("/g/d/x", ObjectKind::Dataset),
            Err(AttrError::InvalidPath(_))
        ));
        assert!(matches!(
            c.create_object("/g", ObjectKind::Group),
            Err(AttrError::ObjectExists(_))
        ));
    }

    #[test]
    fn resolve_relative_to_location() {
        let mut c = container();
        c.create_object("/g", ObjectKind::Group).unwrap();
        c.create_object("/g/d", ObjectKind::Dataset).unwrap();
        assert_eq!(c.resolve("/g", "d").unwrap(), "/g/d");
        assert_eq!(c.resolve("/g", ".").unwrap(), "/g");
        assert_eq!(c.resolve("/g/d", "..").unwrap(), "/g");
        assert_eq!(c.resolve("/", "g/d").unwrap(), "/g/d");
        assert_eq!(c.resolve("/g/d", "/g").unwrap(), "/g");
        assert!(matches!(
            c.resolve("/g", "missing"),
            Err(AttrError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn remove_object_frees_directory_blocks() {
        let mut c = container();
        c.create_object("/d", ObjectKind::Dataset).unwrap();
        let dt = c.register_datatype(8).unwrap();
        let sp = c.register_dataspace(&[]).unwrap();
        {
            let (dir, store, catalog) = c.directory_mut("/d").unwrap();
            for i in 0..10 {
                dir.create_attr(store, catalog, &format!("a{}", i), dt, sp, AttrCreateParams::default())
                    .unwrap();
            }
        }
        // superblock, root header, /d header, ten dense record blocks
        assert_eq!(c.backend().block_count(), 13);
        c.remove_object("/d").unwrap();
        assert_eq!(c.backend().block_count(), 2);
        assert!(!c.exists_object("/d"));
    }

    #[test]
    fn remove_rejects_root_and_non_empty_groups() {
        let mut c = container();
        c.create_object("/g", ObjectKind::Group).unwrap();
        c.create_object("/g/t", ObjectKind::NamedType).unwrap();
        assert!(c.remove_object("/").is_err());
        assert!(c.remove_object("/g").is_err());
        c.remove_object("/g/t").unwrap();
        c.remove_object("/g").unwrap();
    }

    #[test]
    fn reopen_restores_objects_catalog_and_attributes() {
        let mut c = container();
        c.create_object("/d", ObjectKind::Dataset).unwrap();
        let dt = c.register_datatype(2).unwrap();
        let sp = c.register_dataspace(&[2]).unwrap();
        {
            let (dir, store, catalog) = c.directory_mut("/d").unwrap();
            let h = dir
                .create_attr(store, catalog, "units", dt, sp, AttrCreateParams::default())
                .unwrap();
            dir.write(store, h, &[1, 2, 3, 4]).unwrap();
        }
        let Container { backend, config, .. } = c;
        let reopened = Container::open(backend, config).unwrap();
        assert_eq!(reopened.kind("/d").unwrap(), ObjectKind::Dataset);
        assert_eq!(reopened.catalog().dims(sp).unwrap(), &[2]);
        let dir = reopened.directory("/d").unwrap();
        assert_eq!(dir.info_by_name("units").unwrap().data_size, 4);
    }

    #[test]
    fn create_twice_on_same_store_fails() {
        let c = container();
        let Container { backend, .. } = c;
        assert!(matches!(
            Container::create(backend, AttrConfig::default()),
            Err(AttrError::ObjectExists(_))
        ));
    }

    #[test]
    fn open_empty_store_fails() {
        assert!(matches!(
            Container::open(MemBackend::new(), AttrConfig::default()),
            Err(AttrError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn failed_flush_leaves_object_table_unchanged() {
        let mut c = container();
        c.backend().set_simulate_write_error(true);
        assert!(c.create_object("/d", ObjectKind::Dataset).is_err());
        c.backend().set_simulate_write_error(false);
        assert!(!c.exists_object("/d"));
        c.create_object("/d", ObjectKind::Dataset).unwrap();
    }

    #[test]
    fn failed_flush_leaves_catalog_unchanged() {
        let mut c = container();
        let before = c.catalog().clone();

        c.backend().set_simulate_write_error(true);
        assert!(matches!(c.register_datatype(4), Err(AttrError::Store(_))));
        assert!(matches!(c.register_dataspace(&[2, 2]), Err(AttrError::Store(_))));
        c.backend().set_simulate_write_error(false);
        assert_eq!(c.catalog(), &before);

        let dt = c.register_datatype(4).unwrap();
        let sp = c.register_dataspace(&[2, 2]).unwrap();
        let catalog = c.catalog().clone();
        let Container { backend, config, .. } = c;
        let reopened = Container::open(backend, config).unwrap();
        assert_eq!(reopened.catalog(), &catalog);
        assert_eq!(reopened.catalog().data_size(dt, sp).unwrap(), 16);
    }
}
