//! Per-entity-type data store over a pluggable [`CrudAdapter`].

use tracing::{debug, warn};

use crate::entity::{Entity, EntityId};
use crate::error::StoreResult;
use crate::schema::Schema;
use crate::specification::Specification;

/// Narrowing hint passed to [`CrudAdapter::fetch`].
///
/// Adapters may ignore any hint and return more records; callers always
/// re-apply their predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    All,
    /// The record with this identity.
    Id(EntityId),
    /// Records whose foreign key references this owner identity.
    Owner(EntityId),
}

/// Storage driver port for one entity type.
///
/// Implementations must treat updates and deletes of unknown identities as
/// no-ops and report them by returning `Ok(false)`.
pub trait CrudAdapter<T: Entity>: Send + Sync {
    /// Persist a copy of `entity` and write the assigned identity back into it.
    fn insert(&self, entity: &mut T) -> StoreResult<()>;

    /// Returns `false` when no record has the entity's identity.
    fn update(&self, entity: &T) -> StoreResult<bool>;

    /// Returns `false` when no record has the entity's identity.
    fn delete(&self, entity: &T) -> StoreResult<bool>;

    /// Stored records in insertion order, navigation slots empty.
    fn fetch(&self, filter: Filter) -> StoreResult<Vec<T>>;
}

/// Uniform create/update/delete/read contract for one entity type.
pub struct DataStore<T: Entity> {
    adapter: Box<dyn CrudAdapter<T>>,
}

impl<T: Entity> DataStore<T> {
    pub fn new<A: CrudAdapter<T> + 'static>(adapter: A) -> Self {
        Self {
            adapter: Box::new(adapter),
        }
    }

    /// Assign the next identity to `entity` and persist it.
    pub fn create(&self, entity: &mut T) -> StoreResult<()> {
        self.adapter.insert(entity)?;
        debug!(entity = T::TYPE_NAME, id = entity.id(), "created");
        Ok(())
    }

    /// Overwrite the stored record with the same identity.
    ///
    /// Returns `false`, without failing, when no such record exists.
    pub fn update(&self, entity: &T) -> StoreResult<bool> {
        let found = self.adapter.update(entity)?;
        if found {
            debug!(entity = T::TYPE_NAME, id = entity.id(), "updated");
        } else {
            warn!(
                entity = T::TYPE_NAME,
                id = entity.id(),
                "update skipped: no stored record"
            );
        }
        Ok(found)
    }

    /// Remove the stored record with the same identity; `false` if absent.
    pub fn delete(&self, entity: &T) -> StoreResult<bool> {
        let found = self.adapter.delete(entity)?;
        if found {
            debug!(entity = T::TYPE_NAME, id = entity.id(), "deleted");
        } else {
            warn!(
                entity = T::TYPE_NAME,
                id = entity.id(),
                "delete skipped: no stored record"
            );
        }
        Ok(found)
    }

    /// Raw records, navigation unresolved.
    pub fn fetch(&self, filter: Filter) -> StoreResult<Vec<T>> {
        self.adapter.fetch(filter)
    }

    /// Records satisfying `spec`, with navigation resolved through `schema`
    /// before the predicate runs.
    pub fn read(&self, spec: &Specification<T>, schema: &Schema) -> StoreResult<Vec<T>> {
        let mut records = self.adapter.fetch(spec.filter())?;
        for record in records.iter_mut() {
            schema.resolve(record)?;
        }
        records.retain(|record| spec.test(record));
        debug!(entity = T::TYPE_NAME, matched = records.len(), "read");
        Ok(records)
    }
}
