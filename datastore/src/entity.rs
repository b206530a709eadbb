use std::fmt::Debug;

/// Store-assigned identity of a persisted record.
pub type EntityId = i64;

/// Identity value of an entity that has not been created yet.
pub const UNASSIGNED_ID: EntityId = 0;

/// A plain record with a store-assigned identity.
///
/// Identity is assigned by [`DataStore::create`](crate::DataStore::create)
/// and never changes afterwards; callers leave it at [`UNASSIGNED_ID`].
pub trait Entity: Clone + Debug + Send + Sync + 'static {
    /// Name used in logs, errors and lifecycle events.
    const TYPE_NAME: &'static str;

    fn id(&self) -> EntityId;

    fn set_id(&mut self, id: EntityId);

    /// Overwrite the mutable fields of a stored record from `source`.
    ///
    /// Identity and foreign keys stay as stored.
    fn merge_from(&mut self, source: &Self);

    /// Value copy of the persisted fields, with navigation slots cleared.
    fn to_record(&self) -> Self {
        self.clone()
    }

    fn is_new(&self) -> bool {
        self.id() == UNASSIGNED_ID
    }
}
