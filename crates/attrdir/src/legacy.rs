//! # Legacy Surface
//!
//! A reduced attribute API kept for callers written against the older interface:
//! create, open by name, open by position, count, and iterate. Creation order is the
//! only ordering, with no choice of index or direction.
//!
//! Positions are offsets into the current creation order, not identifiers: deleting
//! an attribute shifts every later position down by one. The internal creation order
//! is used even on objects that do not track it, so the surface works on every
//! object.

use crate::container::Container;
use crate::directory::AttrHandle;
use crate::error::{AttrError, AttrTarget, Result};
use crate::iterate;
use crate::model::{AttrCreateParams, DataspaceRef, DatatypeRef, IndexType, IterOrder};
use crate::store::backend::ByteStore;

pub struct Legacy<'a, B: ByteStore> {
    container: &'a mut Container<B>,
}

impl<'a, B: ByteStore> Legacy<'a, B> {
    pub fn new(container: &'a mut Container<B>) -> Self {
        Self { container }
    }

    /// Creates `name` on `loc` with default creation parameters.
    pub fn create1(
        &mut self,
        loc: &str,
        name: &str,
        datatype: DatatypeRef,
        dataspace: DataspaceRef,
    ) -> Result<AttrHandle> {
        let (dir, store, catalog) = self.container.directory_mut(loc)?;
        dir.create_attr(
            store,
            catalog,
            name,
            datatype,
            dataspace,
            AttrCreateParams::default(),
        )
    }

    pub fn open_name(&mut self, loc: &str, name: &str) -> Result<AttrHandle> {
        let (dir, _, _) = self.container.directory_mut(loc)?;
        dir.open(name)
    }

    pub fn open_idx(&mut self, loc: &str, idx: u32) -> Result<AttrHandle> {
        let (dir, _, _) = self.container.directory_mut(loc)?;
        dir.open_by_position(idx as u64)
    }

    pub fn num_attrs(&self, loc: &str) -> Result<usize> {
        Ok(self.container.directory(loc)?.len())
    }

    /// Calls `op` with each name from position `*idx` on and returns the callback's
    /// raw value: `0` after visiting everything, otherwise the first non-zero return.
    /// `*idx` ends one past the last visited position. A start past the attribute
    /// count is `InvalidIndex`.
    pub fn iterate1<F>(&self, loc: &str, idx: &mut u32, mut op: F) -> Result<i32>
    where
        F: FnMut(&str) -> i32,
    {
        let dir = self.container.directory(loc)?;
        let count = dir.len() as u64;
        let mut cursor = u64::from(*idx);
        if cursor > count {
            return Err(AttrError::InvalidIndex {
                target: AttrTarget::Index {
                    index_type: IndexType::CreationOrder,
                    order: IterOrder::Increasing,
                    n: cursor,
                },
                count,
            });
        }
        let status = iterate::drive(dir.records_by_creation(), &mut cursor, |name, _| op(name));
        *idx = u32::try_from(cursor).unwrap_or(u32::MAX);
        Ok(status.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttrConfig;
    use crate::model::ObjectKind;
    use crate::store::mem_backend::MemBackend;

    fn container(track_order: bool) -> (Container<MemBackend>, DatatypeRef, DataspaceRef) {
        let config = AttrConfig {
            track_order,
            ..AttrConfig::default()
        };
        let mut c = Container::create(MemBackend::new(), config).unwrap();
        c.create_object("/d", ObjectKind::Dataset).unwrap();
        let dt = c.register_datatype(1).unwrap();
        let sp = c.register_dataspace(&[]).unwrap();
        (c, dt, sp)
    }

    #[test]
    fn positions_follow_creation_order_and_shift_on_delete() {
        let (mut c, dt, sp) = container(true);
        {
            let mut legacy = Legacy::new(&mut c);
            for n in ["z", "y", "x"] {
                legacy.create1("/d", n, dt, sp).unwrap();
            }
            assert_eq!(legacy.num_attrs("/d").unwrap(), 3);
        }
        let name_at = |c: &mut Container<MemBackend>, i: u32| {
            let mut legacy = Legacy::new(&mut *c);
            let h = legacy.open_idx("/d", i).unwrap();
            c.directory("/d").unwrap().name(h).unwrap().to_string()
        };
        assert_eq!(name_at(&mut c, 1), "y");

        {
            let (dir, store, _) = c.directory_mut("/d").unwrap();
            dir.delete(store, "z").unwrap();
        }
        assert_eq!(name_at(&mut c, 1), "x");

        let mut legacy = Legacy::new(&mut c);
        assert!(matches!(
            legacy.open_idx("/d", 2),
            Err(AttrError::InvalidIndex { count: 2, .. })
        ));
    }

    #[test]
    fn iterate1_works_without_order_tracking() {
        let (mut c, dt, sp) = container(false);
        let mut legacy = Legacy::new(&mut c);
        for n in ["b", "c", "a"] {
            legacy.create1("/d", n, dt, sp).unwrap();
        }
        let mut idx = 0;
        let mut seen = Vec::new();
        let code = legacy
            .iterate1("/d", &mut idx, |n| {
                seen.push(n.to_string());
                0
            })
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(idx, 3);
        assert_eq!(seen, vec!["b", "c", "a"]);
    }

    #[test]
    fn iterate1_returns_first_nonzero_value() {
        let (mut c, dt, sp) = container(true);
        let mut legacy = Legacy::new(&mut c);
        for n in ["a", "b", "c"] {
            legacy.create1("/d", n, dt, sp).unwrap();
        }
        let mut idx = 0;
        let code = legacy
            .iterate1("/d", &mut idx, |n| if n == "b" { -5 } else { 0 })
            .unwrap();
        assert_eq!(code, -5);
        assert_eq!(idx, 2);

        let h = legacy.open_name("/d", "c").unwrap();
        assert_eq!(h.object(), 2);
    }

    #[test]
    fn iterate1_rejects_start_past_count() {
        let (mut c, dt, sp) = container(true);
        let mut legacy = Legacy::new(&mut c);
        for n in ["a", "b", "c"] {
            legacy.create1("/d", n, dt, sp).unwrap();
        }
        let mut calls = 0;
        let mut idx = 7;
        let err = legacy
            .iterate1("/d", &mut idx, |_| {
                calls += 1;
                0
            })
            .unwrap_err();
        assert!(matches!(err, AttrError::InvalidIndex { count: 3, .. }));
        assert_eq!(idx, 7);
        assert_eq!(calls, 0);

        // Starting exactly at the end completes without calling back.
        let mut idx = 3;
        assert_eq!(legacy.iterate1("/d", &mut idx, |_| 1).unwrap(), 0);
        assert_eq!(idx, 3);
    }
}
