//! Fixed mapping from entity type to data store, plus navigation bindings.
//!
//! A [`Schema`] is assembled once per unit of work through [`SchemaBuilder`]
//! and never changes afterwards. `build` rejects bindings that reference
//! unregistered types, duplicate registrations and cyclic binding graphs, so a
//! schema that exists can always be resolved without further checks.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::entity::Entity;
use crate::error::{ConfigError, StoreError, StoreResult};
use crate::navigation::{Binding, Navigation};
use crate::specification::Specification;
use crate::store::{CrudAdapter, DataStore};
use crate::unit_of_work::{ChangeOp, CommitLog, UnitOfWork};

type AnyMap = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

struct Bindings<O>(Vec<Box<dyn Binding<O>>>);

#[derive(Clone, Copy)]
struct Node {
    id: TypeId,
    name: &'static str,
}

struct Edge {
    owner: Node,
    related: Node,
    binding: &'static str,
}

pub struct Schema {
    stores: AnyMap,
    bindings: AnyMap,
    type_names: Vec<&'static str>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn store<T: Entity>(&self) -> StoreResult<&DataStore<T>> {
        self.stores
            .get(&TypeId::of::<T>())
            .and_then(|store| store.downcast_ref::<DataStore<T>>())
            .ok_or(StoreError::MissingStore(T::TYPE_NAME))
    }

    pub fn contains<T: Entity>(&self) -> bool {
        self.stores.contains_key(&TypeId::of::<T>())
    }

    /// Registered entity types, in registration order.
    pub fn type_names(&self) -> &[&'static str] {
        &self.type_names
    }

    /// Records of `T` matching `spec`, relationships resolved.
    pub fn read<T: Entity>(&self, spec: &Specification<T>) -> StoreResult<Vec<T>> {
        self.store::<T>()?.read(spec, self)
    }

    /// Populate every navigation slot of `record` from current storage.
    pub fn resolve<T: Entity>(&self, record: &mut T) -> StoreResult<()> {
        for binding in self.bindings::<T>() {
            binding.resolve(record, self)?;
        }
        Ok(())
    }

    pub(crate) fn materialize_related<T: Entity>(&self, record: &mut T, uow: &mut UnitOfWork) {
        for binding in self.bindings::<T>() {
            binding.materialize(record, uow);
        }
    }

    /// Replace every navigation slot of `target` with the one in `source`.
    pub(crate) fn refresh_related<T: Entity>(&self, target: &mut T, source: &T) {
        for binding in self.bindings::<T>() {
            binding.copy_related(source, target);
        }
    }

    fn bindings<T: Entity>(&self) -> &[Box<dyn Binding<T>>] {
        self.bindings
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref::<Bindings<T>>())
            .map(|b| b.0.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn create_graph<T: Entity>(
        &self,
        entity: &mut T,
        log: &mut CommitLog,
    ) -> StoreResult<()> {
        self.store::<T>()?.create(entity)?;
        log.record(ChangeOp::Create, entity);
        for binding in self.bindings::<T>() {
            binding.cascade_create(entity, self, log)?;
        }
        Ok(())
    }

    pub(crate) fn update_graph<T: Entity>(
        &self,
        entity: &mut T,
        log: &mut CommitLog,
    ) -> StoreResult<()> {
        if !self.store::<T>()?.update(entity)? {
            return Ok(());
        }
        log.record(ChangeOp::Update, entity);
        for binding in self.bindings::<T>() {
            binding.cascade_update(entity, self, log)?;
        }
        Ok(())
    }

    pub(crate) fn delete_graph<T: Entity>(
        &self,
        entity: &T,
        log: &mut CommitLog,
    ) -> StoreResult<()> {
        for binding in self.bindings::<T>() {
            binding.cascade_delete(entity, self, log)?;
        }
        if self.store::<T>()?.delete(entity)? {
            log.record(ChangeOp::Delete, entity);
        }
        Ok(())
    }
}

/// Collects stores and navigation bindings for a [`Schema`].
#[derive(Default)]
pub struct SchemaBuilder {
    stores: AnyMap,
    type_names: Vec<&'static str>,
    bindings: AnyMap,
    edges: Vec<Edge>,
    error: Option<ConfigError>,
}

impl SchemaBuilder {
    pub fn store<T, A>(self, adapter: A) -> Self
    where
        T: Entity,
        A: CrudAdapter<T> + 'static,
    {
        self.data_store(DataStore::new(adapter))
    }

    pub fn data_store<T: Entity>(mut self, store: DataStore<T>) -> Self {
        if self.stores.contains_key(&TypeId::of::<T>()) {
            self.fail(ConfigError::DuplicateStore(T::TYPE_NAME));
            return self;
        }
        self.stores.insert(TypeId::of::<T>(), Box::new(store));
        self.type_names.push(T::TYPE_NAME);
        self
    }

    pub fn navigation<O: Entity, R: Entity>(mut self, navigation: Navigation<O, R>) -> Self {
        let owner = Node {
            id: TypeId::of::<O>(),
            name: O::TYPE_NAME,
        };
        let name = Binding::<O>::name(&navigation);
        if self
            .edges
            .iter()
            .any(|e| e.owner.id == owner.id && e.binding == name)
        {
            self.fail(ConfigError::DuplicateBinding {
                owner: O::TYPE_NAME,
                binding: name,
            });
            return self;
        }
        let (related_id, related_name) = Binding::<O>::related_type(&navigation);
        self.edges.push(Edge {
            owner,
            related: Node {
                id: related_id,
                name: related_name,
            },
            binding: name,
        });

        let slot = self
            .bindings
            .entry(owner.id)
            .or_insert_with(|| Box::new(Bindings::<O>(Vec::new())));
        if let Some(bindings) = slot.downcast_mut::<Bindings<O>>() {
            bindings.0.push(Box::new(navigation));
        }
        self
    }

    pub fn build(self) -> Result<Schema, ConfigError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        for edge in &self.edges {
            for node in [edge.owner, edge.related] {
                if !self.stores.contains_key(&node.id) {
                    return Err(ConfigError::UnregisteredType {
                        binding: edge.binding,
                        type_name: node.name,
                    });
                }
            }
        }
        if let Some(cycle) = find_cycle(&self.edges) {
            return Err(ConfigError::NavigationCycle(cycle));
        }
        Ok(Schema {
            stores: self.stores,
            bindings: self.bindings,
            type_names: self.type_names,
        })
    }

    fn fail(&mut self, err: ConfigError) {
        self.error.get_or_insert(err);
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Active,
    Done,
}

fn find_cycle(edges: &[Edge]) -> Option<Vec<&'static str>> {
    let mut adjacency: HashMap<TypeId, Vec<Node>> = HashMap::new();
    for edge in edges {
        adjacency.entry(edge.owner.id).or_default().push(edge.related);
    }
    let mut state = HashMap::new();
    let mut path = Vec::new();
    edges
        .iter()
        .find_map(|edge| visit(edge.owner, &adjacency, &mut state, &mut path))
}

fn visit(
    node: Node,
    adjacency: &HashMap<TypeId, Vec<Node>>,
    state: &mut HashMap<TypeId, Visit>,
    path: &mut Vec<Node>,
) -> Option<Vec<&'static str>> {
    match state.get(&node.id) {
        Some(Visit::Done) => return None,
        Some(Visit::Active) => {
            let start = path.iter().position(|n| n.id == node.id).unwrap_or(0);
            let mut cycle: Vec<_> = path[start..].iter().map(|n| n.name).collect();
            cycle.push(node.name);
            return Some(cycle);
        }
        None => {}
    }
    state.insert(node.id, Visit::Active);
    path.push(node);
    for next in adjacency.get(&node.id).into_iter().flatten() {
        if let Some(cycle) = visit(*next, adjacency, state, path) {
            return Some(cycle);
        }
    }
    path.pop();
    state.insert(node.id, Visit::Done);
    None
}
