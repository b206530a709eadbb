//! Lifecycle notifications emitted by the unit of work.

use std::any::Any;

use crate::entity::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Loaded from storage and about to be handed to the caller.
    Materialized,
    Created,
    Updated,
    Deleted,
}

/// One lifecycle notification.
///
/// The entity is lent mutably so observers can fill derived fields; use
/// [`EntityEvent::downcast_mut`] to reach the concrete type. Changes made
/// during [`Lifecycle::Materialized`] reach the caller. Write events are
/// delivered after the commit is final and lend a copy of the written value.
pub struct EntityEvent<'a> {
    pub kind: Lifecycle,
    pub entity_type: &'static str,
    pub id: EntityId,
    entity: &'a mut dyn Any,
}

impl<'a> EntityEvent<'a> {
    pub(crate) fn new(
        kind: Lifecycle,
        entity_type: &'static str,
        id: EntityId,
        entity: &'a mut dyn Any,
    ) -> Self {
        Self {
            kind,
            entity_type,
            id,
            entity,
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.entity.downcast_ref()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.entity.downcast_mut()
    }
}

/// Receives lifecycle notifications from a unit of work.
pub trait EntityObserver: Send {
    fn on_event(&self, event: &mut EntityEvent<'_>);
}

impl<F> EntityObserver for F
where
    F: Fn(&mut EntityEvent<'_>) + Send,
{
    fn on_event(&self, event: &mut EntityEvent<'_>) {
        self(event)
    }
}

pub(crate) fn notify_all(observers: &[Box<dyn EntityObserver>], event: &mut EntityEvent<'_>) {
    for observer in observers {
        observer.on_event(event);
    }
}
