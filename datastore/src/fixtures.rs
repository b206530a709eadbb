//! Small owner/item model shared by unit tests.

use crate::entity::{Entity, EntityId};
use crate::navigation::Navigation;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Owner {
    pub id: EntityId,
    pub label: String,
    pub items: Vec<Item>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Item {
    pub id: EntityId,
    pub owner_id: EntityId,
    pub kind: String,
}

impl Entity for Owner {
    const TYPE_NAME: &'static str = "Owner";
    fn id(&self) -> EntityId {
        self.id
    }
    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
    fn merge_from(&mut self, source: &Self) {
        self.label = source.label.clone();
    }
    fn to_record(&self) -> Self {
        Self {
            items: Vec::new(),
            ..self.clone()
        }
    }
}

impl Entity for Item {
    const TYPE_NAME: &'static str = "Item";
    fn id(&self) -> EntityId {
        self.id
    }
    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
    fn merge_from(&mut self, source: &Self) {
        self.kind = source.kind.clone();
    }
}

pub fn owner(id: EntityId, label: &str) -> Owner {
    Owner {
        id,
        label: label.into(),
        items: Vec::new(),
    }
}

pub fn item(id: EntityId, owner_id: EntityId, kind: &str) -> Item {
    Item {
        id,
        owner_id,
        kind: kind.into(),
    }
}

pub fn items() -> Navigation<Owner, Item> {
    Navigation::many(
        "items",
        |o: &Owner| o.items.as_slice(),
        |o: &mut Owner, items| o.items = items,
        |o: &Owner, i: &Item| o.id == i.owner_id,
    )
    .link(|o: &Owner, i: &mut Item| i.owner_id = o.id)
    .keyed_by(|o: &Owner| o.id)
}
