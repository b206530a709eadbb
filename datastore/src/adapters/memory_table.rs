use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::entity::{Entity, EntityId};
use crate::error::{StoreError, StoreResult};
use crate::store::{CrudAdapter, Filter};

/// In-memory table of one entity type, kept in insertion order.
///
/// Clones share the same rows, so a table handed to a schema can still be
/// inspected or seeded from outside. Navigation is resolved by the schema
/// with a brute-force join over the rows.
pub struct MemoryTable<T> {
    rows: Arc<Mutex<Vec<T>>>,
}

impl<T: Entity> MemoryTable<T> {
    pub fn new() -> Self {
        Self::seeded(Vec::new())
    }

    /// Table holding `rows` as already stored records.
    pub fn seeded(rows: Vec<T>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows.iter().map(Entity::to_record).collect())),
        }
    }

    /// Copy of the stored records.
    pub fn snapshot(&self) -> Vec<T> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Vec<T>>> {
        self.rows.lock().map_err(|_| StoreError::Poisoned)
    }

    fn next_id(rows: &[T]) -> EntityId {
        rows.iter().map(Entity::id).max().unwrap_or(0) + 1
    }
}

impl<T: Entity> Default for MemoryTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MemoryTable<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<T: Entity> CrudAdapter<T> for MemoryTable<T> {
    fn insert(&self, entity: &mut T) -> StoreResult<()> {
        let mut rows = self.lock()?;
        entity.set_id(Self::next_id(&rows));
        rows.push(entity.to_record());
        Ok(())
    }

    fn update(&self, entity: &T) -> StoreResult<bool> {
        let mut rows = self.lock()?;
        match rows.iter_mut().find(|row| row.id() == entity.id()) {
            Some(row) => {
                row.merge_from(entity);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, entity: &T) -> StoreResult<bool> {
        let mut rows = self.lock()?;
        match rows.iter().position(|row| row.id() == entity.id()) {
            Some(index) => {
                rows.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn fetch(&self, filter: Filter) -> StoreResult<Vec<T>> {
        let rows = self.lock()?;
        Ok(match filter {
            Filter::Id(id) => rows.iter().filter(|row| row.id() == id).cloned().collect(),
            // owner keys are not known here; the caller's join narrows the rows
            Filter::All | Filter::Owner(_) => rows.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{item, items, owner, Item, Owner};
    use crate::schema::Schema;
    use crate::specification::Specification;
    use crate::store::DataStore;

    #[test]
    fn create_in_empty_store_assigns_one() {
        let table = MemoryTable::<Owner>::new();
        let store = DataStore::new(table.clone());
        let mut entity = owner(0, "a@b.com");
        store.create(&mut entity).unwrap();
        assert_eq!(entity.id, 1);
        assert_eq!(table.snapshot(), vec![owner(1, "a@b.com")]);
    }

    #[test]
    fn create_assigns_previous_max_plus_one() {
        let table = MemoryTable::seeded(vec![owner(3, "c"), owner(7, "g"), owner(5, "e")]);
        let store = DataStore::new(table.clone());
        let mut entity = owner(0, "new");
        store.create(&mut entity).unwrap();
        assert_eq!(entity.id, 8);

        let schema = Schema::builder().data_store(store).build().unwrap();
        let found = schema.read(&Specification::<Owner>::by_id(8)).unwrap();
        assert_eq!(found, vec![owner(8, "new")]);
    }

    #[test]
    fn create_stores_a_value_copy() {
        let table = MemoryTable::<Owner>::new();
        let store = DataStore::new(table.clone());
        let mut entity = owner(0, "before");
        entity.items.push(item(0, 0, "home"));
        store.create(&mut entity).unwrap();
        entity.label = "after".into();
        assert_eq!(table.snapshot(), vec![owner(1, "before")]);
    }

    #[test]
    fn update_overwrites_existing_record() {
        let table = MemoryTable::seeded(vec![owner(1, "a@b.com")]);
        let store = DataStore::new(table.clone());
        assert!(store.update(&owner(1, "x")).unwrap());
        assert_eq!(table.snapshot(), vec![owner(1, "x")]);
    }

    #[test]
    fn update_of_missing_identity_changes_nothing() {
        let table = MemoryTable::seeded(vec![owner(1, "a@b.com")]);
        let store = DataStore::new(table.clone());
        assert!(!store.update(&owner(99, "y")).unwrap());
        assert_eq!(table.snapshot(), vec![owner(1, "a@b.com")]);
    }

    #[test]
    fn delete_of_missing_identity_changes_nothing() {
        let table = MemoryTable::seeded(vec![owner(1, "a"), owner(2, "b")]);
        let store = DataStore::new(table.clone());
        assert!(!store.delete(&owner(42, "z")).unwrap());
        assert_eq!(table.len(), 2);
        assert!(store.delete(&owner(1, "a")).unwrap());
        assert_eq!(table.snapshot(), vec![owner(2, "b")]);
    }

    #[test]
    fn reads_keep_insertion_order() {
        let table = MemoryTable::seeded(vec![owner(2, "b"), owner(1, "a")]);
        let schema = Schema::builder()
            .store(table)
            .store(MemoryTable::<Item>::new())
            .navigation(items())
            .build()
            .unwrap();
        let labels: Vec<_> = schema
            .read(&Specification::<Owner>::all())
            .unwrap()
            .into_iter()
            .map(|o| o.label)
            .collect();
        assert_eq!(labels, vec!["b", "a"]);
    }

    #[test]
    fn id_filter_narrows_fetch() {
        let table = MemoryTable::seeded(vec![owner(1, "a"), owner(2, "b")]);
        assert_eq!(table.fetch(Filter::Id(2)).unwrap(), vec![owner(2, "b")]);
        assert_eq!(table.fetch(Filter::Owner(2)).unwrap().len(), 2);
        assert!(MemoryTable::<Owner>::new().is_empty());
    }
}
