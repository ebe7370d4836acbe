use crate::error::{AttrError, Result};
use crate::model::{AttributeRecord, IndexType};
use std::collections::BTreeMap;

/// Arena slot holding one record.
type Slot = usize;

/// Out-of-line attribute store with a name index and a creation-order index.
///
/// Records live in an arena addressed by slot number; both indices map their key to
/// a slot, never to the record itself. Every mutating method validates first and then
/// updates the arena and both indices in one step, so a failed call leaves all three
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct DenseStore {
    arena: Vec<Option<AttributeRecord>>,
    free: Vec<Slot>,
    by_name: BTreeMap<String, Slot>,
    by_order: BTreeMap<u64, Slot>,
}

impl DenseStore {
    pub fn from_records(records: Vec<AttributeRecord>) -> Result<Self> {
        let mut store = Self::default();
        for rec in records {
            store.insert(rec).map_err(|e| match e {
                AttrError::Duplicate(name) => {
                    AttrError::StorageInconsistent(format!("duplicate dense record \"{}\"", name))
                }
                other => other,
            })?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn slot(&self, slot: Slot) -> Option<&AttributeRecord> {
        self.arena.get(slot).and_then(|s| s.as_ref())
    }

    pub fn get(&self, name: &str) -> Option<&AttributeRecord> {
        self.by_name.get(name).and_then(|s| self.slot(*s))
    }

    pub fn get_by_key(&self, key: u64) -> Option<&AttributeRecord> {
        self.by_order.get(&key).and_then(|s| self.slot(*s))
    }

    pub fn value_mut(&mut self, key: u64) -> Option<&mut Vec<u8>> {
        let slot = *self.by_order.get(&key)?;
        self.arena
            .get_mut(slot)
            .and_then(|s| s.as_mut())
            .map(|r| &mut r.value)
    }

    pub fn insert(&mut self, rec: AttributeRecord) -> Result<()> {
        if self.by_name.contains_key(&rec.name) {
            return Err(AttrError::Duplicate(rec.name));
        }
        if self.by_order.contains_key(&rec.creation_order) {
            return Err(AttrError::StorageInconsistent(format!(
                "creation order {} already in use",
                rec.creation_order
            )));
        }

        let name = rec.name.clone();
        let order = rec.creation_order;
        let slot = match self.free.pop() {
            Some(slot) => {
                self.arena[slot] = Some(rec);
                slot
            }
            None => {
                self.arena.push(Some(rec));
                self.arena.len() - 1
            }
        };
        self.by_name.insert(name, slot);
        self.by_order.insert(order, slot);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeRecord> {
        let slot = *self.by_name.get(name)?;
        let rec = self.arena.get_mut(slot)?.take()?;
        self.by_name.remove(name);
        self.by_order.remove(&rec.creation_order);
        self.free.push(slot);
        Some(rec)
    }

    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        let slot = *self
            .by_name
            .get(old_name)
            .ok_or_else(|| AttrError::NotFound(old_name.into()))?;
        if old_name == new_name {
            return Ok(());
        }
        if self.by_name.contains_key(new_name) {
            return Err(AttrError::Duplicate(new_name.to_string()));
        }
        let rec = self
            .arena
            .get_mut(slot)
            .and_then(|s| s.as_mut())
            .ok_or_else(|| {
                AttrError::StorageInconsistent(format!(
                    "name index points \"{}\" at empty slot {}",
                    old_name, slot
                ))
            })?;
        rec.name = new_name.to_string();
        self.by_name.remove(old_name);
        self.by_name.insert(new_name.to_string(), slot);
        Ok(())
    }

    pub fn ordered(
        &self,
        index_type: IndexType,
        descending: bool,
    ) -> Box<dyn Iterator<Item = &AttributeRecord> + '_> {
        let slots: Box<dyn Iterator<Item = &Slot> + '_> = match (index_type, descending) {
            (IndexType::Name, false) => Box::new(self.by_name.values()),
            (IndexType::Name, true) => Box::new(self.by_name.values().rev()),
            (IndexType::CreationOrder, false) => Box::new(self.by_order.values()),
            (IndexType::CreationOrder, true) => Box::new(self.by_order.values().rev()),
        };
        Box::new(slots.filter_map(move |s| self.slot(*s)))
    }

    /// Records in creation order.
    pub fn into_records(mut self) -> Vec<AttributeRecord> {
        let order: Vec<Slot> = self.by_order.values().copied().collect();
        order
            .into_iter()
            .filter_map(|s| self.arena.get_mut(s).and_then(|r| r.take()))
            .collect()
    }

    /// Confirms that both indices reference exactly the live records of the arena.
    pub fn verify(&self) -> Result<()> {
        let live = self.arena.iter().filter(|s| s.is_some()).count();
        if self.by_name.len() != live || self.by_order.len() != live {
            return Err(AttrError::StorageInconsistent(format!(
                "index sizes disagree: {} by name, {} by order, {} records",
                self.by_name.len(),
                self.by_order.len(),
                live
            )));
        }
        for (name, slot) in &self.by_name {
            match self.slot(*slot) {
                Some(rec) if &rec.name == name => {
                    if self.by_order.get(&rec.creation_order) != Some(slot) {
                        return Err(AttrError::StorageInconsistent(format!(
                            "\"{}\" missing from creation-order index",
                            name
                        )));
                    }
                }
                _ => {
                    return Err(AttrError::StorageInconsistent(format!(
                        "name index entry \"{}\" is dangling",
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}
