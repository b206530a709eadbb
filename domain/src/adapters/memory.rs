use datastore::{DataContext, DataContextFactory, MemoryTable, PersistResult, UnitOfWork};
use tracing::debug;

use crate::entities::{Address, Contact, Name, Phone};
use crate::schema::contact_schema;

/// Backing tables of the in-memory backend.
///
/// Clones share the same rows, so a test can keep a copy and inspect what a
/// data context wrote.
#[derive(Clone, Default)]
pub struct InMemoryDataList {
    pub contacts: MemoryTable<Contact>,
    pub names: MemoryTable<Name>,
    pub addresses: MemoryTable<Address>,
    pub phones: MemoryTable<Phone>,
}

/// Data contexts over [`InMemoryDataList`]. Commits are not atomic.
pub struct InMemoryDataContextFactory {
    data: InMemoryDataList,
}

impl InMemoryDataContextFactory {
    pub fn new(data: InMemoryDataList) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &InMemoryDataList {
        &self.data
    }
}

impl DataContextFactory for InMemoryDataContextFactory {
    fn create_data_context(&self) -> PersistResult<DataContext> {
        let schema = contact_schema(
            self.data.contacts.clone(),
            self.data.names.clone(),
            self.data.addresses.clone(),
            self.data.phones.clone(),
        )?;
        debug!(backend = "memory", "data context created");
        Ok(DataContext::new(UnitOfWork::without_session(schema)))
    }
}
