//! JSON shapes accepted and printed by the CLI.
//!
//! Entries never carry identities; views add the contact's identity back.

use datastore::EntityId;
use domain::{Address, Contact, Name, Phone, PHONE_TYPES};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameEntry {
    #[serde(default)]
    pub first: Option<String>,
    #[serde(default)]
    pub middle: Option<String>,
    #[serde(default)]
    pub last: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneEntry {
    pub number: String,
    #[serde(rename = "type")]
    pub phone_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEntry {
    #[serde(default)]
    pub name: Option<NameEntry>,
    #[serde(default)]
    pub address: Option<AddressEntry>,
    #[serde(default)]
    pub phone: Vec<PhoneEntry>,
    pub email: String,
}

impl ContactEntry {
    /// Every phone uses one of [`PHONE_TYPES`].
    pub fn is_valid(&self) -> bool {
        self.phone
            .iter()
            .all(|p| PHONE_TYPES.contains(&p.phone_type.as_str()))
    }

    /// New contact graph; identities are assigned when it is saved.
    pub fn to_entity(&self) -> Contact {
        let mut contact = Contact::new(self.email.clone());
        contact.name = self.name.as_ref().map(|n| {
            let mut name = Name::default();
            n.apply(&mut name);
            name
        });
        contact.address = self.address.as_ref().map(|a| {
            let mut address = Address::default();
            a.apply(&mut address);
            address
        });
        contact.phones = self.phones();
        contact
    }

    /// Overwrite `contact` with this entry.
    ///
    /// Absent name or address fields are cleared rather than kept, and the
    /// phone list is replaced wholesale.
    pub fn update_entity(&self, contact: &mut Contact) {
        contact.email = self.email.clone();

        let name = self.name.clone().unwrap_or_default();
        match contact.name.as_mut() {
            Some(existing) => name.apply(existing),
            None if self.name.is_some() => {
                let mut created = Name::default();
                name.apply(&mut created);
                contact.name = Some(created);
            }
            None => {}
        }

        let address = self.address.clone().unwrap_or_default();
        match contact.address.as_mut() {
            Some(existing) => address.apply(existing),
            None if self.address.is_some() => {
                let mut created = Address::default();
                address.apply(&mut created);
                contact.address = Some(created);
            }
            None => {}
        }

        contact.phones = self.phones();
    }

    fn phones(&self) -> Vec<Phone> {
        self.phone
            .iter()
            .map(|p| Phone::new(&p.number, &p.phone_type))
            .collect()
    }
}

impl NameEntry {
    fn apply(&self, name: &mut Name) {
        name.first = self.first.clone();
        name.middle = self.middle.clone();
        name.last = self.last.clone();
    }

    fn from_entity(name: Option<&Name>) -> Self {
        name.map(|n| Self {
            first: n.first.clone(),
            middle: n.middle.clone(),
            last: n.last.clone(),
        })
        .unwrap_or_default()
    }
}

impl AddressEntry {
    fn apply(&self, address: &mut Address) {
        address.street = self.street.clone();
        address.city = self.city.clone();
        address.state = self.state.clone();
        address.zip = self.zip.clone();
    }

    fn from_entity(address: Option<&Address>) -> Self {
        address
            .map(|a| Self {
                street: a.street.clone(),
                city: a.city.clone(),
                state: a.state.clone(),
                zip: a.zip.clone(),
            })
            .unwrap_or_default()
    }
}

/// A stored contact as printed by `get` and `list`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContactView {
    pub id: EntityId,
    pub name: NameEntry,
    pub address: AddressEntry,
    pub phone: Vec<PhoneEntry>,
    pub email: String,
}

impl ContactView {
    pub fn from_entity(contact: &Contact) -> Self {
        Self {
            id: contact.contact_id,
            name: NameEntry::from_entity(contact.name.as_ref()),
            address: AddressEntry::from_entity(contact.address.as_ref()),
            phone: contact
                .phones
                .iter()
                .map(|p| PhoneEntry {
                    number: p.number.clone(),
                    phone_type: p.phone_type.clone(),
                })
                .collect(),
            email: contact.email.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CallContact {
    pub name: NameEntry,
    pub phone: Option<String>,
}

/// Home numbers of `contacts`, ordered by last name then first name.
pub fn call_list(contacts: &[Contact]) -> Vec<CallContact> {
    let mut calls: Vec<CallContact> = contacts
        .iter()
        .map(|c| CallContact {
            name: NameEntry::from_entity(c.name.as_ref()),
            phone: c
                .phones
                .iter()
                .find(|p| p.phone_type == "home")
                .map(|p| p.number.clone()),
        })
        .collect();
    calls.sort_by(|a, b| {
        a.name
            .last
            .cmp(&b.name.last)
            .then_with(|| a.name.first.cmp(&b.name.first))
    });
    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(json: &str) -> ContactEntry {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn rejects_unknown_phone_types() {
        let ok = entry(r#"{"email":"a@b.com","phone":[{"number":"1","type":"home"}]}"#);
        assert!(ok.is_valid());
        let bad = entry(r#"{"email":"a@b.com","phone":[{"number":"1","type":"fax"}]}"#);
        assert!(!bad.is_valid());
        assert!(entry(r#"{"email":"a@b.com"}"#).is_valid());
    }

    #[test]
    fn to_entity_builds_an_unsaved_graph() {
        let contact = entry(
            r#"{"email":"a@b.com","name":{"first":"Ann","last":"Bell"},
                "phone":[{"number":"1","type":"home"},{"number":"2","type":"work"}]}"#,
        )
        .to_entity();
        assert_eq!(contact.contact_id, 0);
        assert_eq!(contact.name.as_ref().and_then(|n| n.last.as_deref()), Some("Bell"));
        assert!(contact.address.is_none());
        assert_eq!(contact.phones.len(), 2);
        assert!(contact.phones.iter().all(|p| p.phone_id == 0));
    }

    #[test]
    fn update_entity_clears_absent_fields_and_replaces_phones() {
        let mut contact = Contact {
            contact_id: 4,
            ..Contact::new("old@b.com")
                .with_name(Name {
                    name_id: 7,
                    contact_id: 4,
                    ..Name::new("Ann", "Bell")
                })
                .with_phone(Phone {
                    phone_id: 3,
                    contact_id: 4,
                    ..Phone::new("1", "home")
                })
        };
        entry(r#"{"email":"new@b.com","address":{"city":"Oslo"},"phone":[{"number":"9","type":"mobile"}]}"#)
            .update_entity(&mut contact);

        assert_eq!(contact.email, "new@b.com");
        let name = contact.name.as_ref().unwrap();
        assert_eq!(name.name_id, 7);
        assert_eq!((name.first.as_deref(), name.last.as_deref()), (None, None));
        let address = contact.address.as_ref().unwrap();
        assert_eq!(address.address_id, 0);
        assert_eq!(address.city.as_deref(), Some("Oslo"));
        assert_eq!(contact.phones, vec![Phone::new("9", "mobile")]);
    }

    #[test]
    fn view_fills_missing_parts_with_empty_values() {
        let contact = Contact {
            contact_id: 2,
            ..Contact::new("a@b.com")
        };
        let json = serde_json::to_value(ContactView::from_entity(&contact)).unwrap();
        assert_eq!(json["id"], 2);
        assert!(json["name"]["first"].is_null());
        assert_eq!(json["phone"], serde_json::json!([]));
    }

    #[test]
    fn call_list_is_sorted_by_last_then_first_name() {
        let contacts = vec![
            Contact::new("a")
                .with_name(Name::new("Troy", "Roson"))
                .with_phone(Phone::new("1", "home")),
            Contact::new("b")
                .with_name(Name::new("Beth", "Bell"))
                .with_phone(Phone::new("2", "work"))
                .with_phone(Phone::new("3", "home")),
            Contact::new("c")
                .with_name(Name::new("Ann", "Bell"))
                .with_phone(Phone::new("4", "home")),
        ];
        let calls = call_list(&contacts);
        let order: Vec<_> = calls
            .iter()
            .map(|c| c.name.first.as_deref().unwrap_or(""))
            .collect();
        assert_eq!(order, vec!["Ann", "Beth", "Troy"]);
        assert_eq!(calls[1].phone.as_deref(), Some("3"));
    }
}
