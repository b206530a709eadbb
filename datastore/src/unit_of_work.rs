//! Change tracking and commit.
//!
//! A [`UnitOfWork`] owns one immutable [`Schema`] and tracks at most one
//! pending intent per entity identity. `commit` walks the tracked entries in
//! the order they were first tracked and carries each one, with its attached
//! navigation graph, into storage. The first backend failure stops the walk;
//! the caller learns which changes took effect and which were never attempted.
//! Observers hear about writes only once the commit is final.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::entity::{Entity, EntityId};
use crate::error::{ChangeRef, CommitFailure, PersistError, PersistResult, StoreError, StoreResult};
use crate::event::{notify_all, EntityEvent, EntityObserver, Lifecycle};
use crate::schema::Schema;
use crate::specification::Specification;

/// Tracking state of one entity instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityState {
    Unmodified,
    Added,
    Modified,
    Deleted,
    /// Not tracked by this unit of work.
    Detached,
}

impl EntityState {
    fn pending_op(self) -> Option<ChangeOp> {
        match self {
            EntityState::Added => Some(ChangeOp::Create),
            EntityState::Modified => Some(ChangeOp::Update),
            EntityState::Deleted => Some(ChangeOp::Delete),
            EntityState::Unmodified | EntityState::Detached => None,
        }
    }
}

/// Store operation applied for a pending change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Create => "create",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        }
    }

    fn lifecycle(self) -> Lifecycle {
        match self {
            ChangeOp::Create => Lifecycle::Created,
            ChangeOp::Update => Lifecycle::Updated,
            ChangeOp::Delete => Lifecycle::Deleted,
        }
    }
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One store operation that took effect during a commit.
pub type AppliedChange = ChangeRef;

/// Outcome of a successful commit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Every applied store operation, cascades included, in execution order.
    pub changes: Vec<AppliedChange>,
}

impl CommitReport {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn count(&self, op: ChangeOp) -> usize {
        self.changes.iter().filter(|c| c.op == op).count()
    }
}

/// Transaction boundary of a storage backend.
///
/// The default methods describe a backend without transactions: every store
/// operation is durable as soon as it returns.
pub trait Session: Send {
    fn begin(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        Ok(())
    }

    /// Whether `rollback` undoes every operation since `begin`.
    fn is_atomic(&self) -> bool {
        false
    }

    /// Release native resources. Called once when the owning context ends.
    fn close(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

/// Session of a backend without transactions.
#[derive(Debug, Default)]
pub struct NoopSession;

impl Session for NoopSession {}

/// Typed reference to an entity tracked by a unit of work.
///
/// Stays valid across commits, so the identities assigned to a newly added
/// graph can be read back afterwards.
pub struct EntryHandle<T> {
    seq: u64,
    _entity: PhantomData<fn() -> T>,
}

impl<T> EntryHandle<T> {
    fn new(seq: u64) -> Self {
        Self {
            seq,
            _entity: PhantomData,
        }
    }
}

impl<T> Clone for EntryHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EntryHandle<T> {}

impl<T> fmt::Debug for EntryHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntryHandle").field(&self.seq).finish()
    }
}

struct PendingEvent {
    kind: Lifecycle,
    type_id: TypeId,
    entity_type: &'static str,
    id: EntityId,
    entity: Box<dyn Any + Send>,
}

/// Store operations applied so far in one commit, with the events they owe
/// observers.
#[derive(Default)]
pub(crate) struct CommitLog {
    changes: Vec<ChangeRef>,
    events: Vec<PendingEvent>,
}

impl CommitLog {
    /// Note an applied operation. The written value is kept for the event.
    pub(crate) fn record<T: Entity>(&mut self, op: ChangeOp, entity: &T) {
        let id = entity.id();
        self.changes.push(ChangeRef {
            entity_type: T::TYPE_NAME,
            id,
            op,
        });
        self.events.push(PendingEvent {
            kind: op.lifecycle(),
            type_id: TypeId::of::<T>(),
            entity_type: T::TYPE_NAME,
            id,
            entity: Box::new(entity.clone()),
        });
    }

    fn touched(&self) -> Vec<(TypeId, EntityId)> {
        self.events.iter().map(|e| (e.type_id, e.id)).collect()
    }

    /// Notify observers in execution order and hand back the applied changes.
    fn publish(self, observers: &[Box<dyn EntityObserver>]) -> Vec<ChangeRef> {
        for mut pending in self.events {
            let mut event = EntityEvent::new(
                pending.kind,
                pending.entity_type,
                pending.id,
                pending.entity.as_mut(),
            );
            notify_all(observers, &mut event);
        }
        self.changes
    }
}

/// Tracked entity with its concrete type erased.
trait Tracked: Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn tracked_id(&self) -> EntityId;
    fn tracked_type(&self) -> &'static str;
    fn persist(&mut self, op: ChangeOp, schema: &Schema, log: &mut CommitLog) -> StoreResult<()>;
}

impl<T: Entity> Tracked for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn tracked_id(&self) -> EntityId {
        self.id()
    }

    fn tracked_type(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn persist(
        &mut self,
        op: ChangeOp,
        schema: &Schema,
        log: &mut CommitLog,
    ) -> StoreResult<()> {
        match op {
            ChangeOp::Create => schema.create_graph(self, log),
            ChangeOp::Update => schema.update_graph(self, log),
            ChangeOp::Delete => schema.delete_graph(self, log),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum EntryKey {
    Identity(EntityId),
    /// Added entity still waiting for its identity.
    Pending(u64),
}

struct Entry {
    type_id: TypeId,
    key: EntryKey,
    state: EntityState,
    entity: Box<dyn Tracked>,
}

impl Entry {
    fn change_ref(&self) -> Option<ChangeRef> {
        self.state.pending_op().map(|op| ChangeRef {
            entity_type: self.entity.tracked_type(),
            id: self.entity.tracked_id(),
            op,
        })
    }
}

pub struct UnitOfWork {
    schema: Arc<Schema>,
    session: Box<dyn Session>,
    observers: Vec<Box<dyn EntityObserver>>,
    entries: BTreeMap<u64, Entry>,
    index: HashMap<(TypeId, EntryKey), u64>,
    next_seq: u64,
}

impl UnitOfWork {
    pub fn new(schema: Schema, session: Box<dyn Session>) -> Self {
        Self {
            schema: Arc::new(schema),
            session,
            observers: Vec::new(),
            entries: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 1,
        }
    }

    /// Unit of work over a backend without transactions.
    pub fn without_session(schema: Schema) -> Self {
        Self::new(schema, Box::new(NoopSession))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn observe<O: EntityObserver + 'static>(&mut self, observer: O) {
        self.observers.push(Box::new(observer));
    }

    /// Track `entity` for creation.
    pub fn mark_new<T: Entity>(&mut self, entity: T) -> EntryHandle<T> {
        let seq = self.allocate_seq();
        let key = if entity.is_new() {
            EntryKey::Pending(seq)
        } else {
            EntryKey::Identity(entity.id())
        };
        self.track(seq, key, EntityState::Added, entity)
    }

    /// Track `entity` for update.
    ///
    /// Added and Deleted entries keep their state and only take the new value.
    /// An entity without identity has never been stored and is tracked as new.
    pub fn mark_modified<T: Entity>(&mut self, entity: T) -> EntryHandle<T> {
        if entity.is_new() {
            return self.mark_new(entity);
        }
        let key = (TypeId::of::<T>(), EntryKey::Identity(entity.id()));
        let Some(seq) = self.index.get(&key).copied() else {
            let seq = self.allocate_seq();
            return self.track(seq, key.1, EntityState::Modified, entity);
        };
        if let Some(entry) = self.entries.get_mut(&seq) {
            match entry.state {
                EntityState::Added | EntityState::Modified => {}
                EntityState::Deleted => return EntryHandle::new(seq),
                EntityState::Unmodified | EntityState::Detached => {
                    entry.state = EntityState::Modified;
                }
            }
            entry.entity = Box::new(entity);
        }
        EntryHandle::new(seq)
    }

    /// Track `entity` for deletion, attaching it first if it is not tracked.
    ///
    /// An entity without identity was never stored; nothing is tracked. Use
    /// [`UnitOfWork::delete_tracked`] to withdraw an unsaved addition.
    pub fn mark_deleted<T: Entity>(&mut self, entity: T) {
        if entity.is_new() {
            debug!(entity = T::TYPE_NAME, "delete ignored: entity has no identity");
            return;
        }
        let key = (TypeId::of::<T>(), EntryKey::Identity(entity.id()));
        match self.index.get(&key).copied() {
            Some(seq) => {
                if let Some(entry) = self.entries.get_mut(&seq) {
                    entry.state = EntityState::Deleted;
                    entry.entity = Box::new(entity);
                }
            }
            None => {
                let seq = self.allocate_seq();
                self.track(seq, key.1, EntityState::Deleted, entity);
            }
        }
    }

    /// Withdraw the entity behind `handle`.
    ///
    /// A pending addition is dropped without touching storage; anything else
    /// still tracked is marked Deleted.
    pub fn delete_tracked<T: Entity>(&mut self, handle: &EntryHandle<T>) {
        let Some(entry) = self.entries.get_mut(&handle.seq) else {
            return;
        };
        if entry.state != EntityState::Added {
            entry.state = EntityState::Deleted;
            return;
        }
        let key = (entry.type_id, entry.key);
        self.entries.remove(&handle.seq);
        self.index.remove(&key);
        debug!(entity = T::TYPE_NAME, "pending addition withdrawn");
    }

    /// Records matching `spec`, relationships resolved.
    ///
    /// Every loaded identity, related records included, is tracked as
    /// Unmodified and observers see one [`Lifecycle::Materialized`] event for
    /// it. Identities already tracked come back as their tracked value; an
    /// Unmodified one takes the related records just read.
    pub fn read<T: Entity>(&mut self, spec: &Specification<T>) -> PersistResult<Vec<T>> {
        let records = self.schema.read(spec)?;
        Ok(records
            .into_iter()
            .map(|record| self.materialize(record))
            .collect())
    }

    /// The current value behind `handle`, if it is still tracked.
    pub fn entity<T: Entity>(&self, handle: &EntryHandle<T>) -> Option<&T> {
        self.entries
            .get(&handle.seq)
            .and_then(|entry| entry.entity.as_any().downcast_ref())
    }

    pub fn state_of<T: Entity>(&self, id: EntityId) -> EntityState {
        self.index
            .get(&(TypeId::of::<T>(), EntryKey::Identity(id)))
            .and_then(|seq| self.entries.get(seq))
            .map_or(EntityState::Detached, |entry| entry.state)
    }

    pub fn has_changes(&self) -> bool {
        self.entries
            .values()
            .any(|entry| entry.state.pending_op().is_some())
    }

    /// Persist every pending change.
    ///
    /// With nothing pending no store is touched and no event is emitted. On
    /// failure all pending changes are discarded and the error says which
    /// changes took effect.
    pub fn commit(&mut self) -> PersistResult<CommitReport> {
        let pending: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.state.pending_op().is_some())
            .map(|(seq, _)| *seq)
            .collect();
        if pending.is_empty() {
            debug!("commit skipped: no pending changes");
            return Ok(CommitReport::default());
        }

        if let Err(err) = self.session.begin() {
            self.discard();
            return Err(err.into());
        }
        let mut log = CommitLog::default();
        for (position, seq) in pending.iter().enumerate() {
            let Some(entry) = self.entries.get_mut(seq) else {
                continue;
            };
            let Some(op) = entry.state.pending_op() else {
                continue;
            };
            let Err(source) = entry.entity.persist(op, &self.schema, &mut log) else {
                continue;
            };
            let failed = ChangeRef {
                entity_type: entry.entity.tracked_type(),
                id: entry.entity.tracked_id(),
                op,
            };
            let not_applied: Vec<ChangeRef> = pending[position + 1..]
                .iter()
                .filter_map(|seq| self.entries.get(seq))
                .filter_map(Entry::change_ref)
                .collect();
            let failure = self.abort(log, failed, not_applied, source);
            return Err(failure.into());
        }

        if let Err(source) = self.session.commit() {
            error!(error = %source, "commit failed while finishing the transaction");
            self.discard();
            return Err(PersistError::Store(source));
        }
        self.settle(&pending);
        self.evict_stale(&log.touched(), &pending);
        let changes = log.publish(&self.observers);
        info!(changes = changes.len(), tracked = pending.len(), "commit applied");
        Ok(CommitReport { changes })
    }

    /// Drop all tracked entries and close the session.
    pub fn release(&mut self) -> PersistResult<()> {
        self.entries.clear();
        self.index.clear();
        self.session.close()?;
        Ok(())
    }

    fn abort(
        &mut self,
        log: CommitLog,
        failed: ChangeRef,
        not_applied: Vec<ChangeRef>,
        source: StoreError,
    ) -> CommitFailure {
        let rolled_back = self.session.is_atomic()
            && match self.session.rollback() {
                Ok(()) => true,
                Err(err) => {
                    error!(error = %err, "rollback failed");
                    false
                }
            };
        self.discard();
        let applied = if rolled_back {
            Vec::new()
        } else {
            self.evict_stale(&log.touched(), &[]);
            log.publish(&self.observers)
        };
        let failure = CommitFailure {
            applied,
            failed,
            not_applied,
            rolled_back,
            source,
        };
        error!(
            failed = %failure.failed,
            applied = failure.applied.len(),
            not_applied = failure.not_applied.len(),
            rolled_back,
            error = %failure.source,
            "commit failed"
        );
        failure
    }

    /// Hand a freshly read record, and the records attached to it, through
    /// the identity map.
    pub(crate) fn materialize<T: Entity>(&mut self, mut record: T) -> T {
        let schema = Arc::clone(&self.schema);
        let key = (TypeId::of::<T>(), EntryKey::Identity(record.id()));
        let tracked = self
            .index
            .get(&key)
            .copied()
            .filter(|seq| self.entries.contains_key(seq));
        if tracked.is_none() {
            let id = record.id();
            let mut event = EntityEvent::new(Lifecycle::Materialized, T::TYPE_NAME, id, &mut record);
            notify_all(&self.observers, &mut event);
        }
        schema.materialize_related(&mut record, self);

        if let Some(entry) = tracked.and_then(|seq| self.entries.get_mut(&seq)) {
            let unmodified = entry.state == EntityState::Unmodified;
            if let Some(current) = entry.entity.as_any_mut().downcast_mut::<T>() {
                if unmodified {
                    schema.refresh_related(current, &record);
                }
                return current.clone();
            }
        }
        let seq = self.allocate_seq();
        self.track(seq, key.1, EntityState::Unmodified, record.clone());
        record
    }

    fn track<T: Entity>(
        &mut self,
        seq: u64,
        key: EntryKey,
        state: EntityState,
        entity: T,
    ) -> EntryHandle<T> {
        let type_id = TypeId::of::<T>();
        self.entries.insert(
            seq,
            Entry {
                type_id,
                key,
                state,
                entity: Box::new(entity),
            },
        );
        if let Some(previous) = self.index.insert((type_id, key), seq) {
            self.entries.remove(&previous);
        }
        EntryHandle::new(seq)
    }

    /// Pending entries become Unmodified under their stored identity; deleted
    /// ones stop being tracked.
    fn settle(&mut self, pending: &[u64]) {
        for seq in pending {
            let Some(entry) = self.entries.get_mut(seq) else {
                continue;
            };
            self.index.remove(&(entry.type_id, entry.key));
            if entry.state == EntityState::Deleted {
                self.entries.remove(seq);
                continue;
            }
            entry.state = EntityState::Unmodified;
            entry.key = EntryKey::Identity(entry.entity.tracked_id());
            self.index.insert((entry.type_id, entry.key), *seq);
        }
    }

    /// Drop Unmodified entries whose stored record a commit rewrote, so the
    /// next read loads them again. `settled` entries already hold the
    /// written value.
    fn evict_stale(&mut self, touched: &[(TypeId, EntityId)], settled: &[u64]) {
        for (type_id, id) in touched {
            let key = (*type_id, EntryKey::Identity(*id));
            let Some(seq) = self.index.get(&key).copied() else {
                continue;
            };
            if settled.contains(&seq) {
                continue;
            }
            let unmodified = self
                .entries
                .get(&seq)
                .is_some_and(|entry| entry.state == EntityState::Unmodified);
            if unmodified {
                self.entries.remove(&seq);
                self.index.remove(&key);
            }
        }
    }

    fn discard(&mut self) {
        let index = &mut self.index;
        self.entries.retain(|_, entry| {
            let keep = entry.state == EntityState::Unmodified;
            if !keep {
                index.remove(&(entry.type_id, entry.key));
            }
            keep
        });
    }

    fn allocate_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}
