//! Scoped façade over one [`UnitOfWork`].
//!
//! A [`DataContext`] lives for exactly one logical operation. Dropping it
//! commits whatever is still pending and releases the backend session on
//! every exit path; call [`DataContext::close`] to observe the outcome
//! instead of having it logged.

use tracing::{error, warn};

use crate::entity::{Entity, EntityId};
use crate::error::PersistResult;
use crate::event::EntityObserver;
use crate::specification::Specification;
use crate::unit_of_work::{CommitReport, EntityState, EntryHandle, UnitOfWork};

/// Creates one [`DataContext`] per logical operation.
///
/// Implementations pick the storage backend; callers only see the context.
pub trait DataContextFactory: Send + Sync {
    fn create_data_context(&self) -> PersistResult<DataContext>;
}

pub struct DataContext {
    uow: UnitOfWork,
    closed: bool,
}

impl DataContext {
    pub fn new(uow: UnitOfWork) -> Self {
        Self { uow, closed: false }
    }

    pub fn observe<O: EntityObserver + 'static>(&mut self, observer: O) {
        self.uow.observe(observer);
    }

    /// Queue `entity` for creation. Its identity is assigned on commit.
    pub fn add<T: Entity>(&mut self, entity: T) -> EntryHandle<T> {
        self.uow.mark_new(entity)
    }

    /// Queue `entity`, with its attached relationships, for update.
    pub fn update<T: Entity>(&mut self, entity: T) -> EntryHandle<T> {
        self.uow.mark_modified(entity)
    }

    /// Load the single entity matching `spec`, apply `change` and queue it
    /// for update. `None` when nothing matches.
    pub fn update_where<T, F>(
        &mut self,
        spec: &Specification<T>,
        change: F,
    ) -> PersistResult<Option<T>>
    where
        T: Entity,
        F: FnOnce(&mut T),
    {
        let Some(mut entity) = self.find_single(spec)? else {
            return Ok(None);
        };
        change(&mut entity);
        self.uow.mark_modified(entity.clone());
        Ok(Some(entity))
    }

    pub fn delete<T: Entity>(&mut self, entity: T) {
        self.uow.mark_deleted(entity);
    }

    /// Delete what `handle` tracks; an addition not yet saved is dropped.
    pub fn delete_tracked<T: Entity>(&mut self, handle: &EntryHandle<T>) {
        self.uow.delete_tracked(handle);
    }

    pub fn find<T: Entity>(&mut self, spec: &Specification<T>) -> PersistResult<Vec<T>> {
        self.uow.read(spec)
    }

    /// First entity matching `spec`, if any.
    pub fn find_single<T: Entity>(&mut self, spec: &Specification<T>) -> PersistResult<Option<T>> {
        Ok(self.uow.read(spec)?.into_iter().next())
    }

    pub fn save_changes(&mut self) -> PersistResult<CommitReport> {
        self.uow.commit()
    }

    /// Current value of a tracked entity; after commit it carries the
    /// identities assigned to it and its related records.
    pub fn entity<T: Entity>(&self, handle: &EntryHandle<T>) -> Option<&T> {
        self.uow.entity(handle)
    }

    pub fn state_of<T: Entity>(&self, id: EntityId) -> EntityState {
        self.uow.state_of::<T>(id)
    }

    pub fn has_changes(&self) -> bool {
        self.uow.has_changes()
    }

    /// Commit pending changes and release the session.
    ///
    /// The session is released even when the commit fails.
    pub fn close(mut self) -> PersistResult<CommitReport> {
        self.closed = true;
        let report = self.uow.commit();
        let released = self.uow.release();
        let report = report?;
        released?;
        Ok(report)
    }
}

impl Drop for DataContext {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if self.uow.has_changes() {
            warn!("data context dropped with pending changes, committing");
            if let Err(err) = self.uow.commit() {
                error!(error = %err, "commit on drop failed");
            }
        }
        if let Err(err) = self.uow.release() {
            error!(error = %err, "releasing data context failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::adapters::MemoryTable;
    use crate::error::StoreResult;
    use crate::fixtures::{item, items, owner, Item, Owner};
    use crate::schema::Schema;
    use crate::unit_of_work::Session;

    struct Tables {
        owners: MemoryTable<Owner>,
        items: MemoryTable<Item>,
        closed: Arc<Mutex<usize>>,
    }

    struct CountingSession(Arc<Mutex<usize>>);

    impl Session for CountingSession {
        fn close(&mut self) -> StoreResult<()> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    impl DataContextFactory for Tables {
        fn create_data_context(&self) -> PersistResult<DataContext> {
            let schema = Schema::builder()
                .store(self.owners.clone())
                .store(self.items.clone())
                .navigation(items())
                .build()?;
            let session = CountingSession(Arc::clone(&self.closed));
            Ok(DataContext::new(UnitOfWork::new(schema, Box::new(session))))
        }
    }

    fn tables() -> Tables {
        Tables {
            owners: MemoryTable::seeded(vec![owner(1, "a")]),
            items: MemoryTable::seeded(vec![item(1, 1, "home")]),
            closed: Arc::new(Mutex::new(0)),
        }
    }

    #[test]
    fn drop_commits_pending_changes_and_releases() {
        let tables = tables();
        {
            let mut ctx = tables.create_data_context().unwrap();
            ctx.add(owner(0, "b"));
        }
        assert_eq!(tables.owners.len(), 2);
        assert_eq!(*tables.closed.lock().unwrap(), 1);
    }

    #[test]
    fn drop_releases_after_early_return() {
        fn failing_body(factory: &Tables) -> PersistResult<()> {
            let mut ctx = factory.create_data_context()?;
            ctx.find_single(&Specification::<Owner>::by_id(1))?;
            ctx.add(owner(0, "late"));
            Err(crate::error::StoreError::Backend("caller gave up".into()).into())
        }
        let tables = tables();
        assert!(failing_body(&tables).is_err());
        assert_eq!(tables.owners.len(), 2);
        assert_eq!(*tables.closed.lock().unwrap(), 1);
    }

    #[test]
    fn close_reports_the_commit() {
        let tables = tables();
        let mut ctx = tables.create_data_context().unwrap();
        let handle = ctx.add(owner(0, "b"));
        ctx.save_changes().unwrap();
        assert_eq!(ctx.entity(&handle).map(|o| o.id), Some(2));

        ctx.delete(owner(2, "b"));
        let report = ctx.close().unwrap();
        assert_eq!(report.changes.len(), 1);
        assert_eq!(tables.owners.snapshot(), vec![owner(1, "a")]);
        assert_eq!(*tables.closed.lock().unwrap(), 1);
    }

    #[test]
    fn find_single_returns_none_when_nothing_matches() {
        let tables = tables();
        let mut ctx = tables.create_data_context().unwrap();
        assert_eq!(ctx.find_single(&Specification::<Owner>::by_id(99)).unwrap(), None);
        let updated = ctx
            .update_where(&Specification::<Owner>::by_id(99), |o| o.label = "x".into())
            .unwrap();
        assert!(updated.is_none());
        assert!(!ctx.has_changes());
    }

    #[test]
    fn update_where_queues_the_changed_entity() {
        let tables = tables();
        let mut ctx = tables.create_data_context().unwrap();
        let updated = ctx
            .update_where(&Specification::<Owner>::by_id(1), |o| {
                o.label = "renamed".into();
                o.items.push(item(0, 0, "work"));
            })
            .unwrap()
            .unwrap();
        assert_eq!(updated.items.len(), 2);
        assert_eq!(ctx.state_of::<Owner>(1), EntityState::Modified);
        ctx.save_changes().unwrap();

        let mut fresh = tables.create_data_context().unwrap();
        let stored = fresh
            .find_single(&Specification::<Owner>::by_id(1))
            .unwrap()
            .unwrap();
        assert_eq!(stored.label, "renamed");
        assert_eq!(stored.items, vec![item(1, 1, "home"), item(2, 1, "work")]);
    }
}
