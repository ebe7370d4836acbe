//! # attrdir Architecture
//!
//! attrdir manages the **attributes** of objects in a hierarchical binary container:
//! small named values (units, calibration constants, provenance strings) attached to
//! groups, datasets and named types. It is a library first; the `attrdir` binary is a
//! thin client on top.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs, legacy.rs)                              │
//! │  - Locates the target object and record                     │
//! │  - Returns structured Result types, never prints            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Container (container.rs)                                   │
//! │  - Object table by path, type catalog, superblock           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Attribute Directory (directory.rs, iterate.rs)             │
//! │  - One per object: handles, creation order, rollback        │
//! │  - Compact/dense phase change                               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/, codec.rs)                           │
//! │  - CompactStore / DenseStore behind AttrStorage             │
//! │  - ByteStore trait: FsBackend (production), MemBackend      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Single Writer
//!
//! Nothing in this crate locks. A container is owned by one caller at a time, and each
//! object's directory is only reached through `&mut` borrows of that container.
//!
//! ## Module Overview
//!
//! - [`api`]: The API facade, entry point for all operations
//! - [`legacy`]: Reduced creation-order-only surface
//! - [`container`]: Objects, paths and the superblock
//! - [`directory`]: Per-object attribute directory
//! - [`iterate`]: Cursor-driven iteration protocol
//! - [`store`]: Compact and dense stores, byte stores
//! - [`codec`]: Binary record and object header format
//! - [`catalog`]: Datatype/dataspace sizing
//! - [`model`]: Core data types
//! - [`index`]: Text selectors (`name`, `#N`, `~N`)
//! - [`config`]: Configuration management
//! - [`error`]: Error types

pub mod api;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod container;
pub mod directory;
pub mod error;
pub mod index;
pub mod iterate;
pub mod legacy;
pub mod model;
pub mod store;

#[cfg(test)]
pub mod test_utils;
