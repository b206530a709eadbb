//! sqlite-adapter — SQLite backend for the contact data context.
//!
//! Purpose
//! - Run the contact model against a real relational engine with the same
//!   observable behavior as the in-memory backend.
//! - Each data context opens its own connection; commits run inside one
//!   transaction, so a failed commit leaves the database untouched.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Tables use `INTEGER PRIMARY KEY`, so SQLite assigns identities as the
//!   current maximum plus one.
//! - Relationship resolution narrows related reads with the owner's foreign
//!   key; the join predicate still runs on every row.

mod record;

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use datastore::{
    CrudAdapter, DataContext, DataContextFactory, Filter, PersistResult, Session, StoreError,
    StoreResult, UnitOfWork,
};
use domain::contact_schema;
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

pub use record::SqlRecord;

type SharedConnection = Arc<Mutex<Connection>>;

/// Creates data contexts over one SQLite database file.
pub struct SqliteDataContextFactory {
    path: PathBuf,
}

impl SqliteDataContextFactory {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open(&path)?;
        init_schema(&conn)?;
        Ok(Self { path })
    }

    /// Construct from env var `DB_PATH` (defaults to `./data/contacts.db`).
    pub fn from_env() -> StoreResult<Self> {
        let path = std::env::var("DB_PATH").unwrap_or_else(|_| "./data/contacts.db".to_string());
        if let Some(dir) = Path::new(&path).parent() {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataContextFactory for SqliteDataContextFactory {
    fn create_data_context(&self) -> PersistResult<DataContext> {
        let conn: SharedConnection = Arc::new(Mutex::new(open(&self.path)?));
        let schema = contact_schema(
            SqliteTable::new(Arc::clone(&conn)),
            SqliteTable::new(Arc::clone(&conn)),
            SqliteTable::new(Arc::clone(&conn)),
            SqliteTable::new(Arc::clone(&conn)),
        )?;
        debug!(backend = "sqlite", path = %self.path.display(), "data context created");
        Ok(DataContext::new(UnitOfWork::new(
            schema,
            Box::new(SqliteSession { conn }),
        )))
    }
}

fn open(path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open(path).map_err(map_sqerr)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(map_sqerr)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS Contacts (
            contact_id INTEGER PRIMARY KEY,
            email TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS Names (
            name_id INTEGER PRIMARY KEY,
            contact_id INTEGER NOT NULL REFERENCES Contacts(contact_id) ON DELETE CASCADE,
            first TEXT,
            middle TEXT,
            last TEXT
        );
        CREATE TABLE IF NOT EXISTS Addresses (
            address_id INTEGER PRIMARY KEY,
            contact_id INTEGER NOT NULL REFERENCES Contacts(contact_id) ON DELETE CASCADE,
            street TEXT,
            city TEXT,
            state TEXT,
            zip TEXT
        );
        CREATE TABLE IF NOT EXISTS Phones (
            phone_id INTEGER PRIMARY KEY,
            contact_id INTEGER NOT NULL REFERENCES Contacts(contact_id) ON DELETE CASCADE,
            number TEXT NOT NULL,
            type TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_names_contact ON Names(contact_id);
        CREATE INDEX IF NOT EXISTS idx_addresses_contact ON Addresses(contact_id);
        CREATE INDEX IF NOT EXISTS idx_phones_contact ON Phones(contact_id);
        "#,
    )
    .map_err(map_sqerr)
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> StoreError { StoreError::Backend(format!("sqlite error: {e}")) }

fn lock(conn: &SharedConnection) -> StoreResult<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| StoreError::Poisoned)
}

/// Table adapter for one entity type over a shared connection.
pub struct SqliteTable<T> {
    conn: SharedConnection,
    _record: PhantomData<fn() -> T>,
}

impl<T: SqlRecord> SqliteTable<T> {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            _record: PhantomData,
        }
    }
}

impl<T: SqlRecord> CrudAdapter<T> for SqliteTable<T> {
    fn insert(&self, entity: &mut T) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(&record::insert_sql::<T>(), params_from_iter(entity.values()))
            .map_err(map_sqerr)?;
        entity.set_id(conn.last_insert_rowid());
        Ok(())
    }

    fn update(&self, entity: &T) -> StoreResult<bool> {
        let conn = lock(&self.conn)?;
        let mut values = entity.mutable_values();
        values.push(record::key_value(entity.id()));
        let changed = conn
            .execute(&record::update_sql::<T>(), params_from_iter(values))
            .map_err(map_sqerr)?;
        Ok(changed > 0)
    }

    fn delete(&self, entity: &T) -> StoreResult<bool> {
        let conn = lock(&self.conn)?;
        let changed = conn
            .execute(&record::delete_sql::<T>(), [record::key_value(entity.id())])
            .map_err(map_sqerr)?;
        Ok(changed > 0)
    }

    fn fetch(&self, filter: Filter) -> StoreResult<Vec<T>> {
        let (column, key) = match filter {
            Filter::All => (None, None),
            Filter::Id(id) => (Some(T::KEY), Some(id)),
            Filter::Owner(id) => match T::OWNER_KEY {
                Some(column) => (Some(column), Some(id)),
                None => (None, None),
            },
        };
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&record::select_sql::<T>(column)).map_err(map_sqerr)?;
        let rows = stmt
            .query_map(params_from_iter(key.map(record::key_value)), |row| T::from_row(row))
            .map_err(map_sqerr)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqerr)
    }
}

/// Transaction boundary of one data context.
pub struct SqliteSession {
    conn: SharedConnection,
}

impl Session for SqliteSession {
    fn begin(&mut self) -> StoreResult<()> {
        lock(&self.conn)?.execute_batch("BEGIN").map_err(map_sqerr)
    }

    fn commit(&mut self) -> StoreResult<()> {
        lock(&self.conn)?.execute_batch("COMMIT").map_err(map_sqerr)
    }

    fn rollback(&mut self) -> StoreResult<()> {
        lock(&self.conn)?.execute_batch("ROLLBACK").map_err(map_sqerr)
    }

    fn is_atomic(&self) -> bool {
        true
    }

    fn close(&mut self) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK").map_err(map_sqerr)?;
        }
        debug!(backend = "sqlite", "session closed");
        Ok(())
    }
}
