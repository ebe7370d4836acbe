use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of one block in a [`ByteStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockAddr(pub u64);

impl fmt::Display for BlockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Abstract interface for raw block I/O.
///
/// This trait handles the "how" of persistence (filesystem vs memory), while the
/// attribute directory handles the "what" (record layout, indices, mode changes).
/// All calls are synchronous and blocking from the directory's point of view.
pub trait ByteStore {
    /// Read a block. Returns Ok(None) if nothing was ever written at `addr`.
    fn read_block(&self, addr: BlockAddr) -> Result<Option<Vec<u8>>>;

    /// Replace the contents of a block.
    /// MUST be atomic (e.g. write to tmp then rename) to avoid partial writes.
    fn write_block(&self, addr: BlockAddr, data: &[u8]) -> Result<()>;

    /// Reserve a fresh, never-used address.
    fn allocate(&self) -> Result<BlockAddr>;

    /// Release a block. Freeing an absent block is not an error.
    fn free_block(&self, addr: BlockAddr) -> Result<()>;
}

impl<B: ByteStore + ?Sized> ByteStore for &B {
    fn read_block(&self, addr: BlockAddr) -> Result<Option<Vec<u8>>> {
        (**self).read_block(addr)
    }

    fn write_block(&self, addr: BlockAddr, data: &[u8]) -> Result<()> {
        (**self).write_block(addr, data)
    }

    fn allocate(&self) -> Result<BlockAddr> {
        (**self).allocate()
    }

    fn free_block(&self, addr: BlockAddr) -> Result<()> {
        (**self).free_block(addr)
    }
}
