use super::backend::{BlockAddr, ByteStore};
use crate::error::{AttrError, Result};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// In-memory byte store for testing.
///
/// Uses `RefCell` for interior mutability since a directory has a single logical
/// writer. This avoids the overhead of `RwLock` while still allowing the
/// `ByteStore` trait to use `&self` for all methods.
pub struct MemBackend {
    blocks: RefCell<HashMap<BlockAddr, Vec<u8>>>,
    next_addr: Cell<u64>,
    simulate_write_error: Cell<bool>,
    writes: Cell<usize>,
}

impl Default for MemBackend {
    fn default() -> Self {
        Self {
            blocks: RefCell::new(HashMap::new()),
            // Address 0 is the container superblock.
            next_addr: Cell::new(1),
            simulate_write_error: Cell::new(false),
            writes: Cell::new(0),
        }
    }
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing rollback paths.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.set(simulate);
    }

    /// Number of live blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.borrow().len()
    }

    /// Number of successful `write_block` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }
}

impl ByteStore for MemBackend {
    fn read_block(&self, addr: BlockAddr) -> Result<Option<Vec<u8>>> {
        Ok(self.blocks.borrow().get(&addr).cloned())
    }

    fn write_block(&self, addr: BlockAddr, data: &[u8]) -> Result<()> {
        if self.simulate_write_error.get() {
            return Err(AttrError::Store("Simulated write error".to_string()));
        }
        self.blocks.borrow_mut().insert(addr, data.to_vec());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn allocate(&self) -> Result<BlockAddr> {
        let addr = self.next_addr.get();
        self.next_addr.set(addr + 1);
        Ok(BlockAddr(addr))
    }

    fn free_block(&self, addr: BlockAddr) -> Result<()> {
        self.blocks.borrow_mut().remove(&addr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_never_hands_out_the_superblock() {
        let mem = MemBackend::new();
        let a = mem.allocate().unwrap();
        let b = mem.allocate().unwrap();
        assert_ne!(a, BlockAddr(0));
        assert_ne!(a, b);
    }

    #[test]
    fn write_read_free_cycle() {
        let mem = MemBackend::new();
        let addr = mem.allocate().unwrap();
        mem.write_block(addr, b"hello").unwrap();
        assert_eq!(mem.read_block(addr).unwrap(), Some(b"hello".to_vec()));
        mem.free_block(addr).unwrap();
        assert_eq!(mem.read_block(addr).unwrap(), None);
    }

    #[test]
    fn simulated_write_error_leaves_block_untouched() {
        let mem = MemBackend::new();
        let addr = mem.allocate().unwrap();
        mem.write_block(addr, b"old").unwrap();
        mem.set_simulate_write_error(true);
        assert!(matches!(
            mem.write_block(addr, b"new"),
            Err(AttrError::Store(_))
        ));
        assert_eq!(mem.read_block(addr).unwrap(), Some(b"old".to_vec()));
        assert_eq!(mem.write_count(), 1);
    }
}
