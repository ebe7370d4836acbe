//! # Type Catalog
//!
//! Datatype and dataspace descriptors belong to the caller's type subsystem. The
//! attribute layer only needs two answers from it: how many bytes one element takes,
//! and how many elements a dataspace holds. [`TypeCatalog`] is that narrow seam.
//!
//! [`SimpleCatalog`] is a minimal serializable implementation used by the container
//! and the tests. It hands out opaque [`DatatypeRef`] / [`DataspaceRef`] values and
//! never exposes its internal tables.

use crate::error::{AttrError, Result};
use crate::model::{DataspaceRef, DatatypeRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resolves opaque type handles to sizes.
pub trait TypeCatalog {
    /// Size in bytes of one element of `datatype`.
    fn element_size(&self, datatype: DatatypeRef) -> Result<usize>;

    /// Number of elements in `dataspace`.
    fn element_count(&self, dataspace: DataspaceRef) -> Result<u64>;

    /// Byte size of a value with the given type and extent.
    fn data_size(&self, datatype: DatatypeRef, dataspace: DataspaceRef) -> Result<usize> {
        let size = self.element_size(datatype)? as u64;
        let count = self.element_count(dataspace)?;
        let total = size
            .checked_mul(count)
            .filter(|t| *t <= u32::MAX as u64)
            .ok_or_else(|| {
                AttrError::Catalog(format!(
                    "value of {} x {} bytes exceeds the attribute size limit",
                    count, size
                ))
            })?;
        Ok(total as usize)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleCatalog {
    next_id: u64,
    datatypes: BTreeMap<u64, usize>,
    dataspaces: BTreeMap<u64, Vec<u64>>,
}

impl SimpleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fixed-size element type. Zero-sized types are rejected.
    pub fn register_datatype(&mut self, element_size: usize) -> Result<DatatypeRef> {
        if element_size == 0 {
            return Err(AttrError::Catalog(
                "datatype element size must be positive".to_string(),
            ));
        }
        let id = self.bump();
        self.datatypes.insert(id, element_size);
        Ok(DatatypeRef(id))
    }

    /// Registers a simple dataspace. Empty `dims` means scalar (one element).
    pub fn register_dataspace(&mut self, dims: &[u64]) -> Result<DataspaceRef> {
        if dims.iter().any(|d| *d == 0) {
            return Err(AttrError::Catalog(format!(
                "dataspace dimensions must be positive: {:?}",
                dims
            )));
        }
        let id = self.bump();
        self.dataspaces.insert(id, dims.to_vec());
        Ok(DataspaceRef(id))
    }

    pub fn scalar(&mut self) -> Result<DataspaceRef> {
        self.register_dataspace(&[])
    }

    pub fn dims(&self, dataspace: DataspaceRef) -> Option<&[u64]> {
        self.dataspaces.get(&dataspace.0).map(|d| d.as_slice())
    }

    fn bump(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl TypeCatalog for SimpleCatalog {
    fn element_size(&self, datatype: DatatypeRef) -> Result<usize> {
        self.datatypes
            .get(&datatype.0)
            .copied()
            .ok_or_else(|| AttrError::Catalog(format!("unknown datatype {}", datatype.0)))
    }

    fn element_count(&self, dataspace: DataspaceRef) -> Result<u64> {
        let dims = self
            .dataspaces
            .get(&dataspace.0)
            .ok_or_else(|| AttrError::Catalog(format!("unknown dataspace {}", dataspace.0)))?;
        dims.iter().try_fold(1u64, |acc, d| {
            acc.checked_mul(*d).ok_or_else(|| {
                AttrError::Catalog(format!("dataspace {:?} overflows", dims))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_dataspace_has_one_element() {
        let mut cat = SimpleCatalog::new();
        let space = cat.scalar().unwrap();
        assert_eq!(cat.element_count(space).unwrap(), 1);
    }

    #[test]
    fn data_size_multiplies_element_size_by_count() {
        let mut cat = SimpleCatalog::new();
        let dt = cat.register_datatype(4).unwrap();
        let sp = cat.register_dataspace(&[2, 3]).unwrap();
        assert_eq!(cat.data_size(dt, sp).unwrap(), 24);
    }

    #[test]
    fn unknown_handles_fail() {
        let cat = SimpleCatalog::new();
        assert!(matches!(
            cat.element_size(DatatypeRef(42)),
            Err(AttrError::Catalog(_))
        ));
        assert!(matches!(
            cat.element_count(DataspaceRef(42)),
            Err(AttrError::Catalog(_))
        ));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let mut cat = SimpleCatalog::new();
        assert!(cat.register_datatype(0).is_err());
        assert!(cat.register_dataspace(&[3, 0]).is_err());
    }

    #[test]
    fn oversized_values_are_rejected() {
        let mut cat = SimpleCatalog::new();
        let dt = cat.register_datatype(8).unwrap();
        let sp = cat.register_dataspace(&[1 << 20, 1 << 20]).unwrap();
        assert!(matches!(cat.data_size(dt, sp), Err(AttrError::Catalog(_))));
    }

    #[test]
    fn handles_are_distinct_across_kinds() {
        let mut cat = SimpleCatalog::new();
        let dt = cat.register_datatype(1).unwrap();
        let sp = cat.scalar().unwrap();
        assert_ne!(dt.0, sp.0);
    }
}
