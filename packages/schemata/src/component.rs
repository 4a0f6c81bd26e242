//! Component registrations and component masks.
//!
//! A component is a named `StructLayout` that has been registered with a
//! `World`. Each registration is assigned a `ComponentTypeID`, which is also
//! its bit in a `ComponentMask`.

use std::fmt::{self, Debug, Formatter};
use std::iter::FromIterator;
use std::sync::Arc;

use crate::id::{ComponentTypeID, MAX_COMPONENTS};
use crate::struct_layout::StructLayout;

/// A registered component type.
#[derive(Clone, Debug)]
pub struct Component {
    id: ComponentTypeID,
    name: String,
    layout: Arc<StructLayout>,
}

impl Component {
    pub(crate) fn new(id: ComponentTypeID, name: String, layout: Arc<StructLayout>) -> Component {
        Component { id, name, layout }
    }

    /// The ID assigned at registration.
    pub fn id(&self) -> ComponentTypeID {
        self.id
    }

    /// The unique component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The memory layout of one instance.
    pub fn layout(&self) -> &Arc<StructLayout> {
        &self.layout
    }
}

/// A fixed-width set of component type IDs.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// The empty mask.
    pub const EMPTY: ComponentMask = ComponentMask(0);

    /// Create an empty mask.
    pub const fn new() -> ComponentMask {
        ComponentMask(0)
    }

    /// Create a mask containing a single component.
    pub fn of(id: ComponentTypeID) -> ComponentMask {
        ComponentMask(1u64 << id.index())
    }

    /// The raw bits of this mask.
    pub fn bits(self) -> u64 {
        self.0
    }

    /// Add a component to the mask.
    pub fn include(&mut self, id: ComponentTypeID) {
        self.0 |= 1u64 << id.index();
    }

    /// Remove a component from the mask.
    pub fn exclude(&mut self, id: ComponentTypeID) {
        self.0 &= !(1u64 << id.index());
    }

    /// Set or clear a component's bit.
    pub fn set(&mut self, id: ComponentTypeID, value: bool) {
        if value {
            self.include(id);
        } else {
            self.exclude(id);
        }
    }

    /// Add a component, consuming and returning the mask.
    pub fn with(mut self, id: ComponentTypeID) -> ComponentMask {
        self.include(id);
        self
    }

    /// Returns true if the component's bit is set.
    pub fn includes(self, id: ComponentTypeID) -> bool {
        self.0 & (1u64 << id.index()) != 0
    }

    /// Returns true if every bit of `other` is set in this mask.
    pub fn includes_all(self, other: ComponentMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no bit of `other` is set in this mask.
    pub fn includes_none(self, other: ComponentMask) -> bool {
        self.0 & other.0 == 0
    }

    /// The set of components in either mask.
    pub fn union(self, other: ComponentMask) -> ComponentMask {
        ComponentMask(self.0 | other.0)
    }

    /// Clear every bit.
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Returns true if no bit is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The number of components in the mask.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate over the component IDs in the mask, in ascending order.
    pub fn iter(self) -> impl Iterator<Item=ComponentTypeID> {
        (0..MAX_COMPONENTS)
            .filter(move |idx| self.0 & (1u64 << idx) != 0)
            .map(ComponentTypeID::new)
    }
}

impl FromIterator<ComponentTypeID> for ComponentMask {
    fn from_iter<T: IntoIterator<Item=ComponentTypeID>>(iter: T) -> Self {
        let mut mask = ComponentMask::new();
        for id in iter {
            mask.include(id);
        }
        mask
    }
}

impl Debug for ComponentMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|id| id.index())).finish()
    }
}

/// An entity filter: every `required` component enabled and no `excluded`
/// component enabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub required: ComponentMask,
    pub excluded: ComponentMask,
}

impl Query {
    /// Create a query requiring the given components.
    pub fn new(required: ComponentMask) -> Query {
        Query {
            required,
            excluded: ComponentMask::EMPTY,
        }
    }

    /// Exclude entities with any of the given components.
    pub fn without(mut self, excluded: ComponentMask) -> Query {
        self.excluded = self.excluded.union(excluded);
        self
    }

    /// Returns true if an entity with the given mask matches.
    pub fn matches(&self, mask: ComponentMask) -> bool {
        mask.includes_all(self.required) && mask.includes_none(self.excluded)
    }
}
