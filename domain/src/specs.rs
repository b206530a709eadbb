use datastore::{EntityId, Specification};

use crate::entities::{Contact, Phone};

/// Queries over [`Contact`] used by the application.
pub struct ContactSpecs;

impl ContactSpecs {
    pub fn get(id: EntityId) -> Specification<Contact> {
        Specification::by_id(id)
    }

    pub fn get_all() -> Specification<Contact> {
        Specification::all()
    }

    /// Contacts with at least one home phone.
    pub fn get_call_list() -> Specification<Contact> {
        Specification::any_related(
            |c: &Contact| c.phones.as_slice(),
            |p: &Phone| p.phone_type == "home",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_list_needs_a_home_phone() {
        let spec = ContactSpecs::get_call_list();
        assert!(spec.test(&Contact::new("a").with_phone(Phone::new("1", "home"))));
        assert!(!spec.test(&Contact::new("b").with_phone(Phone::new("2", "work"))));
        assert!(!spec.test(&Contact::new("c")));
    }

    #[test]
    fn get_matches_identity() {
        let mut contact = Contact::new("a");
        contact.contact_id = 3;
        assert!(ContactSpecs::get(3).test(&contact));
        assert!(!ContactSpecs::get(4).test(&contact));
        assert!(ContactSpecs::get_all().test(&contact));
    }
}
