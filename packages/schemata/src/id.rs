//! Strongly-typed identifiers.
//!
//! Entities and component types are both addressed by small unsigned
//! integers. Wrapping them in distinct types stops an entity ID from being
//! passed where a component type ID is expected (and vice versa), and lets
//! each kind carry its own exclusive upper bound.

use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Describes one family of identifiers.
pub trait IdKind: 'static {
    /// The exclusive upper bound of the raw value.
    const MAX: usize;

    /// A short name used when formatting identifiers of this kind.
    const NAME: &'static str;
}

/// A range-checked identifier of kind `K`.
pub struct Id<K: IdKind> {
    raw: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K: IdKind> Id<K> {
    /// Construct a new identifier from its raw value.
    ///
    /// # Panics
    /// If `raw` is not below `K::MAX`.
    pub fn new(raw: usize) -> Id<K> {
        match Id::try_new(raw) {
            Some(id) => id,
            None => panic!("{} {} is out of range (max {})", K::NAME, raw, K::MAX),
        }
    }

    /// Construct a new identifier, returning `None` if `raw` is out of range.
    pub fn try_new(raw: usize) -> Option<Id<K>> {
        if raw < K::MAX && raw <= u32::MAX as usize {
            Some(Id {
                raw: raw as u32,
                _kind: PhantomData,
            })
        } else {
            None
        }
    }

    /// Return the inner value as an index.
    pub fn index(self) -> usize {
        self.raw as usize
    }
}

impl<K: IdKind> Clone for Id<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: IdKind> Copy for Id<K> {}

impl<K: IdKind> PartialEq for Id<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K: IdKind> Eq for Id<K> {}

impl<K: IdKind> PartialOrd for Id<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: IdKind> Ord for Id<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<K: IdKind> Hash for Id<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state)
    }
}

impl<K: IdKind> Debug for Id<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", K::NAME, self.raw)
    }
}

impl<K: IdKind> Display for Id<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// The maximum number of component types a `World` can register.
pub const MAX_COMPONENTS: usize = 64;

/// Marker for entity identifiers.
#[derive(Debug)]
pub enum EntityKind {}

impl IdKind for EntityKind {
    const MAX: usize = u32::MAX as usize;
    const NAME: &'static str = "Entity";
}

/// Marker for component type identifiers.
#[derive(Debug)]
pub enum ComponentKind {}

impl IdKind for ComponentKind {
    const MAX: usize = MAX_COMPONENTS;
    const NAME: &'static str = "Component";
}

/// The ID of a single entity.
///
/// Entity IDs are unique per `World` among live entities. Destroyed IDs are
/// handed out again, smallest first.
pub type EntityID = Id<EntityKind>;

/// A component type ID, assigned in registration order.
pub type ComponentTypeID = Id<ComponentKind>;
