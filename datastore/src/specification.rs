//! Composable predicates over one entity type.
//!
//! A specification is a pure value: building one never touches storage, and
//! every backend evaluates the same predicate so result sets match across
//! backends. The attached [`Filter`] is only a narrowing hint a backend may use
//! for its native query; the predicate is always applied afterwards.

use std::fmt;
use std::sync::Arc;

use crate::entity::{Entity, EntityId};
use crate::store::Filter;

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Predicate selecting entities of type `T`.
pub struct Specification<T> {
    predicate: Predicate<T>,
    filter: Filter,
}

impl<T: 'static> Specification<T> {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            filter: Filter::All,
        }
    }

    /// Every stored entity.
    pub fn all() -> Self {
        Self::new(|_| true)
    }

    /// True when at least one related record reachable through `related`
    /// satisfies `predicate`. Entities whose relationship is empty never match.
    pub fn any_related<R, A, P>(related: A, predicate: P) -> Self
    where
        R: 'static,
        A: Fn(&T) -> &[R] + Send + Sync + 'static,
        P: Fn(&R) -> bool + Send + Sync + 'static,
    {
        Self::new(move |entity| related(entity).iter().any(&predicate))
    }

    pub fn test(&self, entity: &T) -> bool {
        (self.predicate)(entity)
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn and(self, other: Specification<T>) -> Self {
        let (left, right) = (self.predicate, other.predicate);
        let filter = match (self.filter, other.filter) {
            (Filter::All, f) | (f, Filter::All) => f,
            (f, _) => f,
        };
        Self {
            predicate: Arc::new(move |e| left(e) && right(e)),
            filter,
        }
    }

    pub fn or(self, other: Specification<T>) -> Self {
        let (left, right) = (self.predicate, other.predicate);
        Self::new(move |e| left(e) || right(e))
    }

    pub fn not(self) -> Self {
        let inner = self.predicate;
        Self::new(move |e| !inner(e))
    }
}

impl<T: Entity> Specification<T> {
    /// The entity whose identity equals `id`.
    pub fn by_id(id: EntityId) -> Self {
        Self {
            predicate: Arc::new(move |e: &T| e.id() == id),
            filter: Filter::Id(id),
        }
    }
}

impl<T> Clone for Specification<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
            filter: self.filter,
        }
    }
}

impl<T> fmt::Debug for Specification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specification")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default)]
    struct Item {
        id: EntityId,
        tags: Vec<String>,
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
            self.tags = source.tags.clone();
        }
    }

    fn item(id: EntityId, tags: &[&str]) -> Item {
        Item {
            id,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn by_id_matches_identity_and_carries_hint() {
        let spec = Specification::<Item>::by_id(2);
        assert!(spec.test(&item(2, &[])));
        assert!(!spec.test(&item(3, &[])));
        assert_eq!(spec.filter(), Filter::Id(2));
    }

    #[test]
    fn all_matches_everything() {
        let spec = Specification::<Item>::all();
        assert!(spec.test(&item(0, &[])));
        assert_eq!(spec.filter(), Filter::All);
    }

    #[test]
    fn any_related_requires_a_matching_record() {
        let spec = Specification::any_related(
            |i: &Item| i.tags.as_slice(),
            |t: &String| t == "home",
        );
        assert!(spec.test(&item(1, &["work", "home"])));
        assert!(!spec.test(&item(1, &["work"])));
        assert!(!spec.test(&item(1, &[])));
    }

    #[test]
    fn combinators_compose_boolean_logic() {
        let tagged = || Specification::<Item>::new(|i| !i.tags.is_empty());
        let both = Specification::by_id(1).and(tagged());
        assert!(both.test(&item(1, &["x"])));
        assert!(!both.test(&item(1, &[])));
        assert_eq!(both.filter(), Filter::Id(1));

        let either = Specification::by_id(1).or(tagged());
        assert!(either.test(&item(7, &["x"])));
        assert_eq!(either.filter(), Filter::All);

        assert!(tagged().not().test(&item(4, &[])));
    }
}
