use datastore::{ConfigError, CrudAdapter, Navigation, Schema};

use crate::entities::{Address, Contact, Name, Phone};

/// Contact's `name`: the Name whose `contact_id` is the contact's identity.
pub fn name_navigation() -> Navigation<Contact, Name> {
    Navigation::one(
        "name",
        |c: &Contact| c.name.as_ref(),
        |c: &mut Contact, name| c.name = name,
        |c: &Contact, n: &Name| c.contact_id == n.contact_id,
    )
    .link(|c: &Contact, n: &mut Name| n.contact_id = c.contact_id)
    .keyed_by(|c: &Contact| c.contact_id)
}

pub fn address_navigation() -> Navigation<Contact, Address> {
    Navigation::one(
        "address",
        |c: &Contact| c.address.as_ref(),
        |c: &mut Contact, address| c.address = address,
        |c: &Contact, a: &Address| c.contact_id == a.contact_id,
    )
    .link(|c: &Contact, a: &mut Address| a.contact_id = c.contact_id)
    .keyed_by(|c: &Contact| c.contact_id)
}

pub fn phones_navigation() -> Navigation<Contact, Phone> {
    Navigation::many(
        "phones",
        |c: &Contact| c.phones.as_slice(),
        |c: &mut Contact, phones| c.phones = phones,
        |c: &Contact, p: &Phone| c.contact_id == p.contact_id,
    )
    .link(|c: &Contact, p: &mut Phone| p.contact_id = c.contact_id)
    .keyed_by(|c: &Contact| c.contact_id)
}

/// Schema of the contact model over one adapter per table.
pub fn contact_schema<C, N, A, P>(
    contacts: C,
    names: N,
    addresses: A,
    phones: P,
) -> Result<Schema, ConfigError>
where
    C: CrudAdapter<Contact> + 'static,
    N: CrudAdapter<Name> + 'static,
    A: CrudAdapter<Address> + 'static,
    P: CrudAdapter<Phone> + 'static,
{
    Schema::builder()
        .store::<Contact, _>(contacts)
        .store::<Name, _>(names)
        .store::<Address, _>(addresses)
        .store::<Phone, _>(phones)
        .navigation(name_navigation())
        .navigation(address_navigation())
        .navigation(phones_navigation())
        .build()
}
