use super::backend::{BlockAddr, ByteStore};
use crate::error::{AttrError, Result};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const BLOCK_PREFIX: &str = "blk-";
const BLOCK_EXT: &str = ".bin";

/// Filesystem byte store: one file per block inside a container directory.
///
/// ```text
/// <root>/
/// ├── attrdir.toml              # Optional container configuration
/// ├── blk-0000000000000000.bin  # Superblock (object table + type catalog)
/// └── blk-{addr:016x}.bin       # Object headers and dense attribute records
/// ```
pub struct FsBackend {
    root: PathBuf,
    next_addr: Cell<u64>,
}

impl FsBackend {
    /// Opens (or prepares) a container directory. The directory is created lazily
    /// on the first write.
    pub fn new(root: PathBuf) -> Result<Self> {
        let next = Self::scan_next_addr(&root)?;
        Ok(Self {
            root,
            next_addr: Cell::new(next),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn block_path(&self, addr: BlockAddr) -> PathBuf {
        self.root
            .join(format!("{}{:016x}{}", BLOCK_PREFIX, addr.0, BLOCK_EXT))
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(AttrError::Io)?;
        }
        Ok(())
    }

    fn scan_next_addr(root: &Path) -> Result<u64> {
        if !root.exists() {
            return Ok(1);
        }
        let mut max_seen = 0u64;
        for entry in fs::read_dir(root).map_err(AttrError::Io)? {
            let entry = entry.map_err(AttrError::Io)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(hex) = name
                .strip_prefix(BLOCK_PREFIX)
                .and_then(|rest| rest.strip_suffix(BLOCK_EXT))
            {
                if let Ok(addr) = u64::from_str_radix(hex, 16) {
                    max_seen = max_seen.max(addr);
                }
            }
        }
        Ok(max_seen + 1)
    }
}

impl ByteStore for FsBackend {
    fn read_block(&self, addr: BlockAddr) -> Result<Option<Vec<u8>>> {
        let path = self.block_path(addr);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(path).map_err(AttrError::Io)?;
        Ok(Some(data))
    }

    fn write_block(&self, addr: BlockAddr, data: &[u8]) -> Result<()> {
        self.ensure_dir()?;
        let target = self.block_path(addr);

        // Atomic Write
        let tmp = self.root.join(format!(".blk-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, data).map_err(AttrError::Io)?;
        fs::rename(&tmp, target).map_err(AttrError::Io)?;
        Ok(())
    }

    fn allocate(&self) -> Result<BlockAddr> {
        let addr = self.next_addr.get();
        self.next_addr.set(addr + 1);
        Ok(BlockAddr(addr))
    }

    fn free_block(&self, addr: BlockAddr) -> Result<()> {
        let path = self.block_path(addr);
        if path.exists() {
            fs::remove_file(path).map_err(AttrError::Io)?;
        }
        Ok(())
    }
}
