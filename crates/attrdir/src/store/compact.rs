use crate::error::{AttrError, Result};
use crate::model::{AttributeRecord, IndexType};

/// Inline attribute list, kept sorted by creation order.
///
/// New records always carry the highest creation order, so inserts are appends. The
/// only out-of-order insert is a rollback re-inserting a deleted record, which goes
/// back to its original slot.
#[derive(Debug, Clone, Default)]
pub struct CompactStore {
    records: Vec<AttributeRecord>,
}

impl CompactStore {
    pub fn from_records(mut records: Vec<AttributeRecord>) -> Result<Self> {
        records.sort_by_key(|r| r.creation_order);
        let store = Self { records };
        store.verify()?;
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|r| r.name == name)
    }

    fn position_by_key(&self, key: u64) -> Option<usize> {
        self.records
            .binary_search_by_key(&key, |r| r.creation_order)
            .ok()
    }

    pub fn get(&self, name: &str) -> Option<&AttributeRecord> {
        self.position(name).map(|i| &self.records[i])
    }

    pub fn get_by_key(&self, key: u64) -> Option<&AttributeRecord> {
        self.position_by_key(key).map(|i| &self.records[i])
    }

    pub fn value_mut(&mut self, key: u64) -> Option<&mut Vec<u8>> {
        let i = self.position_by_key(key)?;
        Some(&mut self.records[i].value)
    }

    pub fn insert(&mut self, rec: AttributeRecord) -> Result<()> {
        if self.position(&rec.name).is_some() {
            return Err(AttrError::Duplicate(rec.name));
        }
        match self
            .records
            .binary_search_by_key(&rec.creation_order, |r| r.creation_order)
        {
            Ok(_) => Err(AttrError::StorageInconsistent(format!(
                "creation order {} already in use",
                rec.creation_order
            ))),
            Err(at) => {
                self.records.insert(at, rec);
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeRecord> {
        let i = self.position(name)?;
        Some(self.records.remove(i))
    }

    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        let i = self
            .position(old_name)
            .ok_or_else(|| AttrError::NotFound(old_name.into()))?;
        if old_name == new_name {
            return Ok(());
        }
        if self.position(new_name).is_some() {
            return Err(AttrError::Duplicate(new_name.to_string()));
        }
        self.records[i].name = new_name.to_string();
        Ok(())
    }

    /// Records in creation order.
    pub fn iter(&self) -> std::slice::Iter<'_, AttributeRecord> {
        self.records.iter()
    }

    /// Name order is not maintained; it is computed by sorting on each call.
    pub fn ordered(
        &self,
        index_type: IndexType,
        descending: bool,
    ) -> Box<dyn Iterator<Item = &AttributeRecord> + '_> {
        match (index_type, descending) {
            (IndexType::CreationOrder, false) => Box::new(self.records.iter()),
            (IndexType::CreationOrder, true) => Box::new(self.records.iter().rev()),
            (IndexType::Name, _) => {
                let mut sorted: Vec<&AttributeRecord> = self.records.iter().collect();
                sorted.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
                if descending {
                    sorted.reverse();
                }
                Box::new(sorted.into_iter())
            }
        }
    }

    pub fn into_records(self) -> Vec<AttributeRecord> {
        self.records
    }

    pub fn verify(&self) -> Result<()> {
        for pair in self.records.windows(2) {
            if pair[0].creation_order >= pair[1].creation_order {
                return Err(AttrError::StorageInconsistent(format!(
                    "compact records out of creation order at \"{}\"",
                    pair[1].name
                )));
            }
        }
        let mut names: Vec<&str> = self.records.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(AttrError::StorageInconsistent(format!(
                "duplicate compact record \"{}\"",
                dup[0]
            )));
        }
        Ok(())
    }
}
