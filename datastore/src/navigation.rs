//! Declared relationships between entity types.
//!
//! A [`Navigation`] says how to find the related records belonging to one
//! owner (`join`), where to put them on the owner (`one`/`many` slot) and how
//! to stamp the owner's identity onto a related record before it is written
//! (`link`). Resolution is a brute-force join over the related store, O(N·M)
//! per relationship; an optional `keyed_by` hint lets relational backends
//! narrow the scan to the owner's foreign key.
//!
//! On commit the same bindings carry the owner's graph into storage:
//! - created owner: attached records are linked and created;
//! - updated owner: new records are created, known ones updated, stored
//!   records no longer attached are deleted;
//! - deleted owner: stored related records are deleted first.

use std::any::TypeId;

use crate::entity::{Entity, EntityId};
use crate::error::StoreResult;
use crate::schema::Schema;
use crate::store::Filter;
use crate::unit_of_work::{CommitLog, UnitOfWork};

type JoinFn<O, R> = Box<dyn Fn(&O, &R) -> bool + Send + Sync>;
type LinkFn<O, R> = Box<dyn Fn(&O, &mut R) + Send + Sync>;
type KeyFn<O> = Box<dyn Fn(&O) -> EntityId + Send + Sync>;

enum Slot<O, R> {
    One {
        get: Box<dyn Fn(&O) -> Option<&R> + Send + Sync>,
        set: Box<dyn Fn(&mut O, Option<R>) + Send + Sync>,
    },
    Many {
        get: Box<dyn Fn(&O) -> &[R] + Send + Sync>,
        set: Box<dyn Fn(&mut O, Vec<R>) + Send + Sync>,
    },
}

impl<O, R: Clone> Slot<O, R> {
    fn attached(&self, owner: &O) -> Vec<R> {
        match self {
            Slot::One { get, .. } => get(owner).cloned().into_iter().collect(),
            Slot::Many { get, .. } => get(owner).to_vec(),
        }
    }

    fn assign(&self, owner: &mut O, related: Vec<R>) {
        match self {
            Slot::One { set, .. } => set(owner, related.into_iter().next()),
            Slot::Many { set, .. } => set(owner, related),
        }
    }
}

/// Relationship from owner type `O` to related type `R`.
pub struct Navigation<O, R> {
    name: &'static str,
    slot: Slot<O, R>,
    join: JoinFn<O, R>,
    link: LinkFn<O, R>,
    owner_key: Option<KeyFn<O>>,
}

impl<O: Entity, R: Entity> Navigation<O, R> {
    /// Single-valued relationship: the first matching record, or none.
    pub fn one<G, S, J>(name: &'static str, get: G, set: S, join: J) -> Self
    where
        G: Fn(&O) -> Option<&R> + Send + Sync + 'static,
        S: Fn(&mut O, Option<R>) + Send + Sync + 'static,
        J: Fn(&O, &R) -> bool + Send + Sync + 'static,
    {
        Self::with_slot(
            name,
            Slot::One {
                get: Box::new(get),
                set: Box::new(set),
            },
            Box::new(join),
        )
    }

    /// Multi-valued relationship: every matching record.
    pub fn many<G, S, J>(name: &'static str, get: G, set: S, join: J) -> Self
    where
        G: Fn(&O) -> &[R] + Send + Sync + 'static,
        S: Fn(&mut O, Vec<R>) + Send + Sync + 'static,
        J: Fn(&O, &R) -> bool + Send + Sync + 'static,
    {
        Self::with_slot(
            name,
            Slot::Many {
                get: Box::new(get),
                set: Box::new(set),
            },
            Box::new(join),
        )
    }

    fn with_slot(name: &'static str, slot: Slot<O, R>, join: JoinFn<O, R>) -> Self {
        Self {
            name,
            slot,
            join,
            link: Box::new(|_: &O, _: &mut R| {}),
            owner_key: None,
        }
    }

    /// Write the owner's key into a related record before it is persisted.
    pub fn link<L>(mut self, link: L) -> Self
    where
        L: Fn(&O, &mut R) + Send + Sync + 'static,
    {
        self.link = Box::new(link);
        self
    }

    /// Owner value the related records' foreign key points at.
    pub fn keyed_by<K>(mut self, key: K) -> Self
    where
        K: Fn(&O) -> EntityId + Send + Sync + 'static,
    {
        self.owner_key = Some(Box::new(key));
        self
    }

    fn filter_for(&self, owner: &O) -> Filter {
        match &self.owner_key {
            Some(key) => Filter::Owner(key(owner)),
            None => Filter::All,
        }
    }

    fn stored_related(&self, owner: &O, schema: &Schema) -> StoreResult<Vec<R>> {
        let mut related = schema.store::<R>()?.fetch(self.filter_for(owner))?;
        related.retain(|r| (self.join)(owner, r));
        Ok(related)
    }
}

/// Type-erased view of a [`Navigation`] from the owner's side.
pub(crate) trait Binding<O>: Send + Sync {
    fn name(&self) -> &'static str;
    fn related_type(&self) -> (TypeId, &'static str);
    fn resolve(&self, owner: &mut O, schema: &Schema) -> StoreResult<()>;
    /// Pass the resolved related records through the unit of work's identity map.
    fn materialize(&self, owner: &mut O, uow: &mut UnitOfWork);
    fn copy_related(&self, from: &O, to: &mut O);
    fn cascade_create(&self, owner: &mut O, schema: &Schema, log: &mut CommitLog)
        -> StoreResult<()>;
    fn cascade_update(&self, owner: &mut O, schema: &Schema, log: &mut CommitLog)
        -> StoreResult<()>;
    fn cascade_delete(&self, owner: &O, schema: &Schema, log: &mut CommitLog)
        -> StoreResult<()>;
}

impl<O: Entity, R: Entity> Binding<O> for Navigation<O, R> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn related_type(&self) -> (TypeId, &'static str) {
        (TypeId::of::<R>(), R::TYPE_NAME)
    }

    fn resolve(&self, owner: &mut O, schema: &Schema) -> StoreResult<()> {
        let mut related = self.stored_related(owner, schema)?;
        for record in related.iter_mut() {
            schema.resolve(record)?;
        }
        self.slot.assign(owner, related);
        Ok(())
    }

    fn materialize(&self, owner: &mut O, uow: &mut UnitOfWork) {
        let related = self
            .slot
            .attached(owner)
            .into_iter()
            .map(|record| uow.materialize(record))
            .collect();
        self.slot.assign(owner, related);
    }

    fn copy_related(&self, from: &O, to: &mut O) {
        self.slot.assign(to, self.slot.attached(from));
    }

    fn cascade_create(
        &self,
        owner: &mut O,
        schema: &Schema,
        log: &mut CommitLog,
    ) -> StoreResult<()> {
        let mut attached = self.slot.attached(owner);
        if attached.is_empty() {
            return Ok(());
        }
        for record in attached.iter_mut() {
            (self.link)(&*owner, record);
            schema.create_graph(record, log)?;
        }
        self.slot.assign(owner, attached);
        Ok(())
    }

    fn cascade_update(
        &self,
        owner: &mut O,
        schema: &Schema,
        log: &mut CommitLog,
    ) -> StoreResult<()> {
        let stored = self.stored_related(owner, schema)?;
        let mut attached = self.slot.attached(owner);
        for record in attached.iter_mut() {
            (self.link)(&*owner, record);
            if record.is_new() {
                schema.create_graph(record, log)?;
            } else {
                schema.update_graph(record, log)?;
            }
        }
        for orphan in stored
            .iter()
            .filter(|s| !attached.iter().any(|a| a.id() == s.id()))
        {
            schema.delete_graph(orphan, log)?;
        }
        self.slot.assign(owner, attached);
        Ok(())
    }

    fn cascade_delete(&self, owner: &O, schema: &Schema, log: &mut CommitLog) -> StoreResult<()> {
        for record in self.stored_related(owner, schema)? {
            schema.delete_graph(&record, log)?;
        }
        Ok(())
    }
}
