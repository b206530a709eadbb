//! Row mappings between the contact entities and their tables.

use datastore::{Entity, EntityId};
use domain::{Address, Contact, Name, Phone};
use rusqlite::types::Value;
use rusqlite::Row;

/// An entity stored in one table keyed by an `INTEGER PRIMARY KEY`.
///
/// SQLite assigns such keys as the current maximum plus one, which is the
/// identity rule every backend follows.
pub trait SqlRecord: Entity {
    const TABLE: &'static str;
    const KEY: &'static str;
    /// Column referencing the owning record, if the type has an owner.
    const OWNER_KEY: Option<&'static str>;
    /// Columns written on insert, in `values` order.
    const COLUMNS: &'static [&'static str];
    /// Columns overwritten by an update, in `mutable_values` order.
    const MUTABLE: &'static [&'static str];

    /// Build a record from a row selected as `KEY, COLUMNS...`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
    fn values(&self) -> Vec<Value>;
    fn mutable_values(&self) -> Vec<Value>;
}

impl SqlRecord for Contact {
    const TABLE: &'static str = "Contacts";
    const KEY: &'static str = "contact_id";
    const OWNER_KEY: Option<&'static str> = None;
    const COLUMNS: &'static [&'static str] = &["email"];
    const MUTABLE: &'static [&'static str] = &["email"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Contact {
            contact_id: row.get(0)?,
            email: row.get(1)?,
            ..Contact::default()
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![self.email.clone().into()]
    }

    fn mutable_values(&self) -> Vec<Value> {
        self.values()
    }
}

impl SqlRecord for Name {
    const TABLE: &'static str = "Names";
    const KEY: &'static str = "name_id";
    const OWNER_KEY: Option<&'static str> = Some("contact_id");
    const COLUMNS: &'static [&'static str] = &["contact_id", "first", "middle", "last"];
    const MUTABLE: &'static [&'static str] = &["first", "middle", "last"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Name {
            name_id: row.get(0)?,
            contact_id: row.get(1)?,
            first: row.get(2)?,
            middle: row.get(3)?,
            last: row.get(4)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        let mut values = vec![Value::Integer(self.contact_id)];
        values.extend(self.mutable_values());
        values
    }

    fn mutable_values(&self) -> Vec<Value> {
        vec![
            self.first.clone().into(),
            self.middle.clone().into(),
            self.last.clone().into(),
        ]
    }
}

impl SqlRecord for Address {
    const TABLE: &'static str = "Addresses";
    const KEY: &'static str = "address_id";
    const OWNER_KEY: Option<&'static str> = Some("contact_id");
    const COLUMNS: &'static [&'static str] = &["contact_id", "street", "city", "state", "zip"];
    const MUTABLE: &'static [&'static str] = &["street", "city", "state", "zip"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Address {
            address_id: row.get(0)?,
            contact_id: row.get(1)?,
            street: row.get(2)?,
            city: row.get(3)?,
            state: row.get(4)?,
            zip: row.get(5)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        let mut values = vec![Value::Integer(self.contact_id)];
        values.extend(self.mutable_values());
        values
    }

    fn mutable_values(&self) -> Vec<Value> {
        vec![
            self.street.clone().into(),
            self.city.clone().into(),
            self.state.clone().into(),
            self.zip.clone().into(),
        ]
    }
}

impl SqlRecord for Phone {
    const TABLE: &'static str = "Phones";
    const KEY: &'static str = "phone_id";
    const OWNER_KEY: Option<&'static str> = Some("contact_id");
    const COLUMNS: &'static [&'static str] = &["contact_id", "number", "type"];
    const MUTABLE: &'static [&'static str] = &["number", "type"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Phone {
            phone_id: row.get(0)?,
            contact_id: row.get(1)?,
            number: row.get(2)?,
            phone_type: row.get(3)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        let mut values = vec![Value::Integer(self.contact_id)];
        values.extend(self.mutable_values());
        values
    }

    fn mutable_values(&self) -> Vec<Value> {
        vec![
            self.number.clone().into(),
            self.phone_type.clone().into(),
        ]
    }
}

pub(crate) fn select_sql<T: SqlRecord>(filter_column: Option<&str>) -> String {
    let mut sql = format!("SELECT {}, {} FROM {}", T::KEY, T::COLUMNS.join(", "), T::TABLE);
    if let Some(column) = filter_column {
        sql.push_str(&format!(" WHERE {column} = ?1"));
    }
    sql.push_str(&format!(" ORDER BY {}", T::KEY));
    sql
}

pub(crate) fn insert_sql<T: SqlRecord>() -> String {
    let placeholders: Vec<String> = (1..=T::COLUMNS.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        T::TABLE,
        T::COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

pub(crate) fn update_sql<T: SqlRecord>() -> String {
    let assignments: Vec<String> = T::MUTABLE
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ?{}", i + 1))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        T::TABLE,
        assignments.join(", "),
        T::KEY,
        T::MUTABLE.len() + 1
    )
}

pub(crate) fn delete_sql<T: SqlRecord>() -> String {
    format!("DELETE FROM {} WHERE {} = ?1", T::TABLE, T::KEY)
}

/// Identity of a row as a bind value.
pub(crate) fn key_value(id: EntityId) -> Value {
    Value::Integer(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_follow_column_lists() {
        assert_eq!(
            select_sql::<Phone>(Some("contact_id")),
            "SELECT phone_id, contact_id, number, type FROM Phones WHERE contact_id = ?1 ORDER BY phone_id"
        );
        assert_eq!(
            insert_sql::<Name>(),
            "INSERT INTO Names (contact_id, first, middle, last) VALUES (?1, ?2, ?3, ?4)"
        );
        assert_eq!(
            update_sql::<Address>(),
            "UPDATE Addresses SET street = ?1, city = ?2, state = ?3, zip = ?4 WHERE address_id = ?5"
        );
        assert_eq!(delete_sql::<Contact>(), "DELETE FROM Contacts WHERE contact_id = ?1");
    }

    #[test]
    fn value_lists_match_columns() {
        let phone = Phone::new("555", "home");
        assert_eq!(phone.values().len(), Phone::COLUMNS.len());
        assert_eq!(phone.mutable_values().len(), Phone::MUTABLE.len());
        let name = Name::new("Ann", "Bell");
        assert_eq!(name.values()[2], Value::Null);
    }
}
