//! # Domain Model: Attribute Records
//!
//! This module defines the core data structures for attrdir: [`AttributeRecord`],
//! [`AttrInfo`], and the small tag types that travel with them.
//!
//! ## What an Attribute Is
//!
//! An attribute is a small, named, fixed-size value bound to one container object
//! (a group, a dataset or a named type). Its shape is described by two handles owned
//! by the caller's type subsystem:
//!
//! - [`DatatypeRef`]: the element type (resolved to an element size)
//! - [`DataspaceRef`]: the extent (resolved to an element count)
//!
//! The record never copies or frees these descriptors; it only remembers the handles
//! and the byte size they resolved to when the attribute was created.
//!
//! ## Creation Order
//!
//! Every record gets a `creation_order` value from its directory's counter. Values are
//! strictly increasing in assignment order and never reused, even after the record is
//! deleted. When an object does not track creation order, the value is still kept
//! internally (it drives the legacy positional API) but is reported as invalid in
//! [`AttrInfo`].
//!
//! ## Orderings
//!
//! Positional access and iteration take an [`IndexType`] (what to sort by) and an
//! [`IterOrder`] (which direction). `Native` means "whatever the active store can
//! produce without sorting".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Character set used to encode an attribute name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharSet {
    #[default]
    Ascii,
    Utf8,
}

impl CharSet {
    pub fn tag(self) -> u8 {
        match self {
            CharSet::Ascii => 0,
            CharSet::Utf8 => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CharSet::Ascii),
            1 => Some(CharSet::Utf8),
            _ => None,
        }
    }
}

impl fmt::Display for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharSet::Ascii => write!(f, "ascii"),
            CharSet::Utf8 => write!(f, "utf-8"),
        }
    }
}

/// Opaque handle to a datatype owned by a [`crate::catalog::TypeCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatatypeRef(pub u64);

/// Opaque handle to a dataspace owned by a [`crate::catalog::TypeCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataspaceRef(pub u64);

/// Which key positional lookups and iteration sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    Name,
    CreationOrder,
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexType::Name => write!(f, "name"),
            IndexType::CreationOrder => write!(f, "creation order"),
        }
    }
}

/// Direction of traversal over an [`IndexType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterOrder {
    Increasing,
    Decreasing,
    Native,
}

impl fmt::Display for IterOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterOrder::Increasing => write!(f, "increasing"),
            IterOrder::Decreasing => write!(f, "decreasing"),
            IterOrder::Native => write!(f, "native"),
        }
    }
}

/// Creation parameters of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttrCreateParams {
    pub charset: CharSet,
}

impl AttrCreateParams {
    pub fn utf8() -> Self {
        Self {
            charset: CharSet::Utf8,
        }
    }
}

/// Summary returned by the `info` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttrInfo {
    pub corder_valid: bool,
    pub creation_order: u64,
    pub charset: CharSet,
    pub data_size: u64,
}

/// One attribute as held by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRecord {
    pub name: String,
    pub charset: CharSet,
    pub datatype: DatatypeRef,
    pub dataspace: DataspaceRef,
    pub value: Vec<u8>,
    pub creation_order: u64,
    /// Whether the owning object tracks creation order.
    pub corder_valid: bool,
}

impl AttributeRecord {
    /// Builds a record with a zero-filled value buffer of `data_size` bytes.
    pub fn new(
        name: String,
        datatype: DatatypeRef,
        dataspace: DataspaceRef,
        data_size: usize,
        creation_order: u64,
        params: AttrCreateParams,
        corder_valid: bool,
    ) -> Self {
        Self {
            name,
            charset: params.charset,
            datatype,
            dataspace,
            value: vec![0; data_size],
            creation_order,
            corder_valid,
        }
    }

    pub fn data_size(&self) -> usize {
        self.value.len()
    }

    pub fn info(&self) -> AttrInfo {
        AttrInfo {
            corder_valid: self.corder_valid,
            creation_order: if self.corder_valid {
                self.creation_order
            } else {
                0
            },
            charset: self.charset,
            data_size: self.value.len() as u64,
        }
    }
}

/// Kind of container object that owns an attribute directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Group,
    Dataset,
    NamedType,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Group => write!(f, "group"),
            ObjectKind::Dataset => write!(f, "dataset"),
            ObjectKind::NamedType => write!(f, "named type"),
        }
    }
}

/// Rejects names that cannot be stored.
///
/// Names must be non-empty, must not contain NUL and must fit the codec's
/// 16-bit length field.
pub fn validate_name(name: &str) -> crate::error::Result<()> {
    if name.is_empty() {
        return Err(crate::error::AttrError::InvalidName(
            "name must not be empty".to_string(),
        ));
    }
    if name.contains('\0') {
        return Err(crate::error::AttrError::InvalidName(format!(
            "\"{}\" contains a NUL byte",
            name.escape_default()
        )));
    }
    if name.len() > u16::MAX as usize {
        return Err(crate::error::AttrError::InvalidName(format!(
            "name is {} bytes, limit is {}",
            name.len(),
            u16::MAX
        )));
    }
    Ok(())
}
