//! Persisted contact records.
//!
//! One table per type; `Name`, `Address` and `Phone` carry the owning
//! contact's identity in `contact_id`.

use datastore::{Entity, EntityId, UNASSIGNED_ID};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub contact_id: EntityId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Name>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default)]
    pub phones: Vec<Phone>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub name_id: EntityId,
    pub contact_id: EntityId,
    pub first: Option<String>,
    pub middle: Option<String>,
    pub last: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub address_id: EntityId,
    pub contact_id: EntityId,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub phone_id: EntityId,
    pub contact_id: EntityId,
    pub number: String,
    #[serde(rename = "type")]
    pub phone_type: String,
}

impl Contact {
    /// New, not yet stored contact.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            contact_id: UNASSIGNED_ID,
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: Name) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_phone(mut self, phone: Phone) -> Self {
        self.phones.push(phone);
        self
    }

    pub fn has_phone_type(&self, phone_type: &str) -> bool {
        self.phones.iter().any(|p| p.phone_type == phone_type)
    }
}

impl Name {
    pub fn new(first: &str, last: &str) -> Self {
        Self {
            first: Some(first.to_string()),
            last: Some(last.to_string()),
            ..Self::default()
        }
    }
}

impl Address {
    pub fn new(street: &str, city: &str, state: &str, zip: &str) -> Self {
        Self {
            street: Some(street.to_string()),
            city: Some(city.to_string()),
            state: Some(state.to_string()),
            zip: Some(zip.to_string()),
            ..Self::default()
        }
    }
}

impl Phone {
    pub fn new(number: &str, phone_type: &str) -> Self {
        Self {
            number: number.to_string(),
            phone_type: phone_type.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for Contact {
    const TYPE_NAME: &'static str = "Contact";

    fn id(&self) -> EntityId {
        self.contact_id
    }

    fn set_id(&mut self, id: EntityId) {
        self.contact_id = id;
    }

    fn merge_from(&mut self, source: &Self) {
        self.email = source.email.clone();
    }

    fn to_record(&self) -> Self {
        Self {
            contact_id: self.contact_id,
            email: self.email.clone(),
            name: None,
            address: None,
            phones: Vec::new(),
        }
    }
}

impl Entity for Name {
    const TYPE_NAME: &'static str = "Name";

    fn id(&self) -> EntityId {
        self.name_id
    }

    fn set_id(&mut self, id: EntityId) {
        self.name_id = id;
    }

    fn merge_from(&mut self, source: &Self) {
        self.first = source.first.clone();
        self.middle = source.middle.clone();
        self.last = source.last.clone();
    }
}

impl Entity for Address {
    const TYPE_NAME: &'static str = "Address";

    fn id(&self) -> EntityId {
        self.address_id
    }

    fn set_id(&mut self, id: EntityId) {
        self.address_id = id;
    }

    fn merge_from(&mut self, source: &Self) {
        self.street = source.street.clone();
        self.city = source.city.clone();
        self.state = source.state.clone();
        self.zip = source.zip.clone();
    }
}

impl Entity for Phone {
    const TYPE_NAME: &'static str = "Phone";

    fn id(&self) -> EntityId {
        self.phone_id
    }

    fn set_id(&mut self, id: EntityId) {
        self.phone_id = id;
    }

    fn merge_from(&mut self, source: &Self) {
        self.number = source.number.clone();
        self.phone_type = source.phone_type.clone();
    }
}
