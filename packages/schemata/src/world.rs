//! The `World`: component registry, entities and systems.
//!
//! A `World` owns one `ComponentPool` per registered component. Each entity
//! carries a `ComponentMask` of its *enabled* components. A component may
//! stay allocated in its pool while disabled, which lets callers hide it from
//! queries without destroying and reconstructing its fields.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt::{self, Debug, Formatter};
use std::mem;
use std::ptr::NonNull;
use std::sync::Arc;

use bytemuck::Pod;
use tracing::{debug, trace};

use crate::component::{Component, ComponentMask, Query};
use crate::config::WorldConfig;
use crate::field_type::{FieldType, Primitive};
use crate::field_vec::FieldVec;
use crate::id::{ComponentTypeID, EntityID, MAX_COMPONENTS};
use crate::pool::ComponentPool;
use crate::struct_layout::{Field, StructLayout};
use crate::system::{Clock, MonotonicClock, SystemInfo, SystemRegistry};
use crate::text::Text;

type RegistrationListener = Box<dyn FnMut(&Component) + 'static>;

#[derive(Clone, Copy, Debug, Default)]
struct EntityEntry {
    exists: bool,
    mask: ComponentMask,
}

/// A collection of entities, their components and the systems that update
/// them.
pub struct World {
    config: WorldConfig,
    components: Vec<Component>,
    component_ids: HashMap<String, ComponentTypeID>,
    pools: Vec<ComponentPool>,
    entities: Vec<EntityEntry>,
    free_entities: BinaryHeap<Reverse<EntityID>>,
    listeners: Vec<RegistrationListener>,
    systems: SystemRegistry,
    clock: Box<dyn Clock>,
}

impl World {
    /// Create an empty world with the default configuration.
    pub fn new() -> World {
        World::with_config(WorldConfig::default())
    }

    /// Create an empty world.
    pub fn with_config(config: WorldConfig) -> World {
        World::with_clock(config, MonotonicClock::new())
    }

    /// Create an empty world which times its systems with `clock`.
    pub fn with_clock(config: WorldConfig, clock: impl Clock + 'static) -> World {
        World {
            config,
            components: Vec::new(),
            component_ids: HashMap::new(),
            pools: Vec::new(),
            entities: Vec::new(),
            free_entities: BinaryHeap::new(),
            listeners: Vec::new(),
            systems: SystemRegistry::new(),
            clock: Box::new(clock),
        }
    }

    /// The configuration this world was created with.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Register a new component type.
    ///
    /// Every registration listener is called before this returns.
    ///
    /// # Panics
    /// If the name is taken or `MAX_COMPONENTS` are already registered.
    pub fn register_component(&mut self, name: impl Into<String>, layout: impl Into<Arc<StructLayout>>) -> ComponentTypeID {
        let name = name.into();
        let layout = layout.into();

        assert!(!self.component_ids.contains_key(&name), "component {:?} is already registered", name);
        assert!(self.components.len() < MAX_COMPONENTS,
                "cannot register more than {} components", MAX_COMPONENTS);

        let id = ComponentTypeID::new(self.components.len());
        let page_size = self.config.page_size_for(layout.size());
        debug!(component = %name, id = id.index(), size = layout.size(), page_size, "registering component");

        self.pools.push(ComponentPool::new(layout.size(), layout.alignment(), page_size));
        self.component_ids.insert(name.clone(), id);
        self.components.push(Component::new(id, name, layout));

        let component = &self.components[id.index()];
        for listener in self.listeners.iter_mut() {
            listener(component);
        }

        id
    }

    /// Look up a component ID by name.
    pub fn component_id(&self, name: &str) -> Option<ComponentTypeID> {
        self.component_ids.get(name).copied()
    }

    /// Get a registered component.
    ///
    /// # Panics
    /// If the component is not registered.
    pub fn component(&self, id: ComponentTypeID) -> &Component {
        match self.components.get(id.index()) {
            Some(component) => component,
            None => panic!("{:?} is not registered", id),
        }
    }

    /// Every registered component, in ID order.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Get the storage of a component type.
    ///
    /// # Panics
    /// If the component is not registered.
    pub fn component_pool(&self, id: ComponentTypeID) -> &ComponentPool {
        self.component(id);
        &self.pools[id.index()]
    }

    /// Build a mask from component names.
    ///
    /// # Panics
    /// If any name is not registered.
    pub fn mask_of(&self, names: &[&str]) -> ComponentMask {
        names.iter()
            .map(|name| match self.component_id(name) {
                Some(id) => id,
                None => panic!("no component named {:?}", name),
            })
            .collect()
    }

    /// Subscribe to component registrations.
    pub fn on_component_registered(&mut self, listener: impl FnMut(&Component) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Create a new entity with no components.
    ///
    /// The smallest previously destroyed ID is reused first.
    pub fn new_entity(&mut self) -> EntityID {
        let id = match self.free_entities.pop() {
            Some(Reverse(id)) => {
                self.entities[id.index()] = EntityEntry {
                    exists: true,
                    mask: ComponentMask::EMPTY,
                };
                id
            }
            None => {
                let id = EntityID::new(self.entities.len());
                self.entities.push(EntityEntry {
                    exists: true,
                    mask: ComponentMask::EMPTY,
                });
                id
            }
        };

        trace!(entity = id.index(), "created entity");
        id
    }

    /// Destroy an entity and every component allocated for it, enabled or
    /// not.
    ///
    /// # Panics
    /// If the entity does not exist.
    pub fn destroy_entity(&mut self, entity: EntityID) {
        self.check_entity(entity);

        for idx in 0..self.components.len() {
            if self.pools[idx].has(entity) {
                self.release(entity, ComponentTypeID::new(idx));
            }
        }

        self.entities[entity.index()] = EntityEntry::default();
        self.free_entities.push(Reverse(entity));
        trace!(entity = entity.index(), "destroyed entity");
    }

    /// Returns true if the entity exists.
    pub fn entity_exists(&self, entity: EntityID) -> bool {
        self.entities.get(entity.index()).map_or(false, |e| e.exists)
    }

    /// The number of live entities.
    pub fn num_entities(&self) -> usize {
        self.entities.len() - self.free_entities.len()
    }

    /// The mask of components currently enabled on an entity.
    ///
    /// # Panics
    /// If the entity does not exist.
    pub fn entity_mask(&self, entity: EntityID) -> ComponentMask {
        self.check_entity(entity);
        self.entities[entity.index()].mask
    }

    /// Add a component to an entity and construct its fields.
    ///
    /// The component starts enabled, with every plain field zeroed.
    ///
    /// # Panics
    /// If the entity does not exist, the component is not registered or the
    /// entity already has the component (even disabled).
    pub fn add_component(&mut self, entity: EntityID, component: ComponentTypeID) -> NonNull<u8> {
        self.check_entity(entity);
        self.component(component);
        assert!(!self.pools[component.index()].has(entity),
                "{:?} already has component {:?}", entity, self.components[component.index()].name());

        let ptr = self.pools[component.index()].add(entity);
        unsafe { self.components[component.index()].layout().init(ptr.as_ptr()) };
        self.entities[entity.index()].mask.include(component);
        ptr
    }

    /// Get a pointer to an entity's component.
    ///
    /// The component must be allocated but need not be enabled.
    ///
    /// # Panics
    /// If the entity does not exist or the component is not allocated.
    pub fn get_component(&mut self, entity: EntityID, component: ComponentTypeID) -> NonNull<u8> {
        self.check_entity(entity);
        self.component(component);
        self.pools[component.index()].get(entity)
    }

    /// Returns true if the entity has the component enabled.
    pub fn has_component(&self, entity: EntityID, component: ComponentTypeID) -> bool {
        self.entity_exists(entity) && self.entities[entity.index()].mask.includes(component)
    }

    /// Returns true if the component is allocated for the entity, whether or
    /// not it is enabled.
    pub fn is_component_allocated(&self, entity: EntityID, component: ComponentTypeID) -> bool {
        self.entity_exists(entity)
            && self.pools.get(component.index()).map_or(false, |p| p.has(entity))
    }

    /// Destroy and release an entity's component.
    ///
    /// Disabled components can be removed too.
    ///
    /// # Panics
    /// If the entity does not exist or the component is not allocated.
    pub fn remove_component(&mut self, entity: EntityID, component: ComponentTypeID) {
        self.check_entity(entity);
        self.component(component);
        assert!(self.pools[component.index()].has(entity),
                "{:?} does not have component {:?}", entity, self.components[component.index()].name());

        self.release(entity, component);
        self.entities[entity.index()].mask.exclude(component);
    }

    /// Enable or disable an allocated component without touching its data.
    ///
    /// # Panics
    /// If the entity does not exist, or when enabling a component that is not
    /// allocated.
    pub fn set_component_enabled(&mut self, entity: EntityID, component: ComponentTypeID, enabled: bool) {
        self.check_entity(entity);
        self.component(component);
        if enabled {
            assert!(self.pools[component.index()].has(entity),
                    "cannot enable component {:?} on {:?}: not allocated",
                    self.components[component.index()].name(), entity);
        }

        self.entities[entity.index()].mask.set(component, enabled);
    }

    /// Get a plain field of an entity's component.
    ///
    /// # Panics
    /// If the component is not allocated, the field does not exist, or `T`
    /// does not match the field's size and alignment.
    pub fn field<T: Pod>(&self, entity: EntityID, component: ComponentTypeID, field: &str) -> &T {
        let ptr = self.plain_field::<T>(entity, component, field, false);
        unsafe { &*(ptr as *const T) }
    }

    /// Get a mutable plain field of an entity's component.
    ///
    /// # Panics
    /// As for `field`, and if the field is or contains a `bool`; use
    /// `set_flag` for those.
    pub fn field_mut<T: Pod>(&mut self, entity: EntityID, component: ComponentTypeID, field: &str) -> &mut T {
        let ptr = self.plain_field::<T>(entity, component, field, true);
        unsafe { &mut *(ptr as *mut T) }
    }

    /// Read a `bool` field of an entity's component.
    ///
    /// # Panics
    /// If the component is not allocated or the field is not a `bool`.
    pub fn flag(&self, entity: EntityID, component: ComponentTypeID, field: &str) -> bool {
        let ptr = self.typed_field(entity, component, field, "bool",
                                   |ty| matches!(ty, FieldType::Primitive(Primitive::Bool)));
        unsafe { *ptr != 0 }
    }

    /// Write a `bool` field of an entity's component.
    ///
    /// # Panics
    /// As for `flag`.
    pub fn set_flag(&mut self, entity: EntityID, component: ComponentTypeID, field: &str, value: bool) {
        let ptr = self.typed_field(entity, component, field, "bool",
                                   |ty| matches!(ty, FieldType::Primitive(Primitive::Bool)));
        unsafe { *ptr = value as u8 };
    }

    /// Get a string field of an entity's component.
    ///
    /// # Panics
    /// If the component is not allocated or the field is not a string.
    pub fn text(&self, entity: EntityID, component: ComponentTypeID, field: &str) -> &Text {
        let ptr = self.typed_field(entity, component, field, "string",
                                   |ty| matches!(ty, FieldType::String));
        unsafe { &*(ptr as *const Text) }
    }

    /// Get a mutable string field of an entity's component.
    ///
    /// # Panics
    /// As for `text`.
    pub fn text_mut(&mut self, entity: EntityID, component: ComponentTypeID, field: &str) -> &mut Text {
        let ptr = self.typed_field(entity, component, field, "string",
                                   |ty| matches!(ty, FieldType::String));
        unsafe { &mut *(ptr as *mut Text) }
    }

    /// Get a vector field of an entity's component.
    ///
    /// # Panics
    /// If the component is not allocated or the field is not a vector.
    pub fn vector(&self, entity: EntityID, component: ComponentTypeID, field: &str) -> &FieldVec {
        let ptr = self.typed_field(entity, component, field, "vector",
                                   |ty| matches!(ty, FieldType::Vector { .. }));
        unsafe { &*(ptr as *const FieldVec) }
    }

    /// Get a mutable vector field of an entity's component.
    ///
    /// # Panics
    /// As for `vector`.
    pub fn vector_mut(&mut self, entity: EntityID, component: ComponentTypeID, field: &str) -> &mut FieldVec {
        let ptr = self.typed_field(entity, component, field, "vector",
                                   |ty| matches!(ty, FieldType::Vector { .. }));
        unsafe { &mut *(ptr as *mut FieldVec) }
    }

    /// Every existing entity with all of `mask`'s components enabled, in
    /// ascending order.
    ///
    /// The result is a snapshot: later changes to the world are not
    /// reflected in it.
    pub fn get_entities(&self, mask: ComponentMask) -> Vec<EntityID> {
        self.query(&Query::new(mask))
    }

    /// Every existing entity matching `query`, in ascending order.
    pub fn query(&self, query: &Query) -> Vec<EntityID> {
        self.entities.iter()
            .enumerate()
            .filter(|(_, entry)| entry.exists && query.matches(entry.mask))
            .map(|(idx, _)| EntityID::new(idx))
            .collect()
    }

    /// Register a new, enabled system.
    ///
    /// # Panics
    /// If a system with the same name already exists.
    pub fn register_system(&mut self, name: impl Into<String>, callback: impl FnMut(&mut World, f32) + 'static) {
        let name = name.into();
        debug!(system = %name, "registering system");
        self.systems.register(name, Box::new(callback));
    }

    /// Run a system, unless it is disabled, and record how long it took.
    ///
    /// # Panics
    /// If no system has the given name, or the system is already running.
    pub fn invoke_system(&mut self, name: &str, dt: f32) {
        let mut callback = match self.systems.begin(name) {
            Some(callback) => callback,
            None => return,
        };

        let start = self.clock.now();
        callback(self, dt);
        let duration = self.clock.now().checked_sub(start).unwrap_or_default();
        self.systems.finish(name, callback, duration);
    }

    /// Enable or disable a system.
    ///
    /// # Panics
    /// If no system has the given name.
    pub fn set_system_enabled(&mut self, name: &str, enabled: bool) {
        self.systems.set_enabled(name, enabled);
    }

    /// Returns true if a system with the given name exists.
    pub fn has_system(&self, name: &str) -> bool {
        self.systems.contains(name)
    }

    /// Every registered system, in name order.
    pub fn systems<'a>(&'a self) -> impl Iterator<Item=SystemInfo<'a>> + 'a {
        self.systems.iter()
    }

    fn check_entity(&self, entity: EntityID) {
        assert!(self.entity_exists(entity), "{:?} does not exist", entity);
    }

    fn release(&mut self, entity: EntityID, component: ComponentTypeID) {
        let layout = self.components[component.index()].layout();
        let pool = &mut self.pools[component.index()];
        let ptr = pool.get(entity);
        unsafe { layout.free(ptr.as_ptr()) };
        pool.remove(entity);
    }

    fn locate_field(&self, entity: EntityID, component: ComponentTypeID, name: &str) -> (&Field, *mut u8) {
        self.check_entity(entity);
        let registration = self.component(component);
        let field = match registration.layout().field(name) {
            Some(field) => field,
            None => panic!("component {:?} has no field {:?}", registration.name(), name),
        };

        let base = match self.pools[component.index()].try_get(entity) {
            Some(ptr) => ptr,
            None => panic!("{:?} does not have component {:?}", entity, registration.name()),
        };

        (field, unsafe { field.locate(base.as_ptr()) })
    }

    fn plain_field<T: Pod>(&self, entity: EntityID, component: ComponentTypeID, name: &str, write: bool) -> *mut u8 {
        let (field, ptr) = self.locate_field(entity, component, name);
        assert!(field.ty().is_plain(), "field {:?} of type {} cannot be accessed by value", name, field.ty());
        assert!(!write || field.ty().accepts_any_bits(),
                "field {:?} of type {} holds a bool and cannot be written by value", name, field.ty());
        assert_eq!(mem::size_of::<T>(), field.size(), "size mismatch for field {:?}", name);
        assert!(mem::align_of::<T>() <= field.alignment(), "alignment mismatch for field {:?}", name);
        ptr
    }

    fn typed_field(
        &self,
        entity: EntityID,
        component: ComponentTypeID,
        name: &str,
        expected: &str,
        check: impl Fn(&FieldType) -> bool,
    ) -> *mut u8 {
        let (field, ptr) = self.locate_field(entity, component, name);
        assert!(check(field.ty()), "field {:?} is {}, not a {}", name, field.ty(), expected);
        ptr
    }
}

impl Default for World {
    fn default() -> Self {
        World::new()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        for (component, pool) in self.components.iter().zip(self.pools.iter()) {
            for entity in pool.entities() {
                if let Some(ptr) = pool.try_get(entity) {
                    unsafe { component.layout().free(ptr.as_ptr()) };
                }
            }
        }
    }
}

impl Debug for World {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.num_entities())
            .field("components", &self.components.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("systems", &self.systems)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::struct_layout::StructBuilder;

    fn position_layout() -> StructLayout {
        StructBuilder::new()
            .add_field("x", FieldType::primitive(Primitive::F32))
            .add_field("y", FieldType::primitive(Primitive::F32))
            .build()
    }

    fn name_layout() -> StructLayout {
        StructBuilder::new()
            .add_field("value", FieldType::string())
            .build()
    }

    fn ids(raw: &[usize]) -> Vec<EntityID> {
        raw.iter().map(|id| EntityID::new(*id)).collect()
    }

    struct StepClock(Cell<u64>);

    impl Clock for StepClock {
        fn now(&self) -> Duration {
            let now = self.0.get();
            self.0.set(now + 5);
            Duration::from_millis(now)
        }
    }

    #[test]
    fn test_position_and_name_query() {
        let mut world = World::new();
        let position = world.register_component("Position", position_layout());
        let name = world.register_component("Name", name_layout());
        assert_eq!(world.component(position).layout().size(), 8);
        assert_eq!(world.component(position).layout().alignment(), 4);

        let entity = world.new_entity();
        assert_eq!(entity.index(), 0);
        world.add_component(entity, position);
        *world.field_mut::<f32>(entity, position, "x") = 1.0;
        *world.field_mut::<f32>(entity, position, "y") = 2.0;

        assert_eq!(*world.field::<f32>(entity, position, "x"), 1.0);
        assert_eq!(*world.field::<f32>(entity, position, "y"), 2.0);
        assert_eq!(world.get_entities(ComponentMask::of(position)), ids(&[0]));
        assert_eq!(world.get_entities(ComponentMask::of(position).with(name)), ids(&[]));
        assert_eq!(world.get_entities(world.mask_of(&["Position"])), ids(&[0]));
    }

    #[test]
    fn test_entity_reuse() {
        let mut world = World::new();
        for expected in 0..3 {
            assert_eq!(world.new_entity().index(), expected);
        }

        world.destroy_entity(EntityID::new(1));
        assert!(!world.entity_exists(EntityID::new(1)));
        assert_eq!(world.new_entity().index(), 1);
        assert_eq!(world.new_entity().index(), 3);
    }

    #[test]
    fn test_smallest_id_reused_first() {
        let mut world = World::new();
        for _ in 0..6 {
            world.new_entity();
        }

        world.destroy_entity(EntityID::new(4));
        world.destroy_entity(EntityID::new(2));
        world.destroy_entity(EntityID::new(3));
        assert_eq!(world.num_entities(), 3);

        let reused: Vec<usize> = (0..4).map(|_| world.new_entity().index()).collect();
        assert_eq!(reused, vec![2, 3, 4, 6]);
    }

    #[test]
    fn test_reused_entity_has_empty_mask() {
        let mut world = World::new();
        let position = world.register_component("Position", position_layout());
        let entity = world.new_entity();
        world.add_component(entity, position);
        world.destroy_entity(entity);

        let entity = world.new_entity();
        assert!(world.entity_mask(entity).is_empty());
        assert!(!world.is_component_allocated(entity, position));
    }

    #[test]
    fn test_query_with_exclusion() {
        let mut world = World::new();
        let position = world.register_component("Position", position_layout());
        let name = world.register_component("Name", name_layout());

        let entities: Vec<EntityID> = (0..5).map(|_| world.new_entity()).collect();
        for entity in &entities {
            world.add_component(*entity, position);
        }
        world.add_component(entities[1], name);
        world.add_component(entities[3], name);
        world.destroy_entity(entities[4]);

        let moving = Query::new(ComponentMask::of(position)).without(ComponentMask::of(name));
        assert_eq!(world.query(&moving), ids(&[0, 2]));
        assert_eq!(world.get_entities(ComponentMask::of(name)), ids(&[1, 3]));
        assert_eq!(world.get_entities(ComponentMask::EMPTY), ids(&[0, 1, 2, 3]));
    }

    #[test]
    fn test_disable_preserves_values() {
        let mut world = World::new();
        let element = FieldType::primitive(Primitive::U32);
        let layout = StructBuilder::new()
            .add_field("hp", FieldType::primitive(Primitive::I32))
            .add_field("tags", FieldType::vector(element.clone()))
            .build();
        let stats = world.register_component("Stats", layout);

        let entity = world.new_entity();
        world.add_component(entity, stats);
        *world.field_mut::<i32>(entity, stats, "hp") = 42;
        world.vector_mut(entity, stats, "tags").push_value(7u32);
        let constructed = Arc::strong_count(&element);

        world.set_component_enabled(entity, stats, false);
        assert!(!world.has_component(entity, stats));
        assert!(world.is_component_allocated(entity, stats));
        assert!(world.get_entities(ComponentMask::of(stats)).is_empty());

        world.set_component_enabled(entity, stats, true);
        assert!(world.has_component(entity, stats));
        assert_eq!(Arc::strong_count(&element), constructed);
        assert_eq!(*world.field::<i32>(entity, stats, "hp"), 42);
        assert_eq!(*world.vector(entity, stats, "tags").get::<u32>(0), 7);
    }

    #[test]
    fn test_remove_disabled_component() {
        let mut world = World::new();
        let element = FieldType::primitive(Primitive::U8);
        let layout = StructBuilder::new()
            .add_field("items", FieldType::vector(element.clone()))
            .build();
        let inventory = world.register_component("Inventory", layout);
        let baseline = Arc::strong_count(&element);

        let entity = world.new_entity();
        world.add_component(entity, inventory);
        assert_eq!(Arc::strong_count(&element), baseline + 1);

        world.set_component_enabled(entity, inventory, false);
        world.remove_component(entity, inventory);
        assert_eq!(Arc::strong_count(&element), baseline);
        assert!(!world.is_component_allocated(entity, inventory));

        world.add_component(entity, inventory);
        assert!(world.has_component(entity, inventory));
    }

    #[test]
    fn test_destroy_frees_disabled_components() {
        let mut world = World::new();
        let element = FieldType::string();
        let layout = StructBuilder::new()
            .add_field("lines", FieldType::vector(element.clone()))
            .build();
        let log = world.register_component("Log", layout);
        let baseline = Arc::strong_count(&element);

        let a = world.new_entity();
        let b = world.new_entity();
        world.add_component(a, log);
        world.add_component(b, log);
        world.vector_mut(a, log, "lines").push_back();
        world.vector_mut(a, log, "lines").text_mut(0).set("hello");
        world.set_component_enabled(a, log, false);

        world.destroy_entity(a);
        assert_eq!(Arc::strong_count(&element), baseline + 1);

        drop(world);
        assert_eq!(Arc::strong_count(&element), 1);
    }

    #[test]
    fn test_raw_component_pointers() {
        let mut world = World::new();
        let position = world.register_component("Position", position_layout());
        let entity = world.new_entity();

        let added = world.add_component(entity, position);
        unsafe {
            let xy = added.as_ptr() as *mut f32;
            *xy = 3.5;
            *xy.add(1) = -1.0;
        }

        let fetched = world.get_component(entity, position);
        assert_eq!(fetched, added);
        unsafe {
            let xy = fetched.as_ptr() as *const f32;
            assert_eq!(*xy, 3.5);
            assert_eq!(*xy.add(1), -1.0);
        }
        assert_eq!(*world.field::<f32>(entity, position, "y"), -1.0);

        world.set_component_enabled(entity, position, false);
        assert!(!world.has_component(entity, position));
        let disabled = world.get_component(entity, position);
        assert_eq!(disabled, added);
        assert_eq!(unsafe { *(disabled.as_ptr() as *const f32) }, 3.5);
    }

    #[test]
    #[should_panic(expected = "has no slot")]
    fn test_get_missing_component() {
        let mut world = World::new();
        let position = world.register_component("Position", position_layout());
        let entity = world.new_entity();
        world.get_component(entity, position);
    }

    #[test]
    fn test_flag_fields() {
        let mut world = World::new();
        let layout = StructBuilder::new()
            .add_field("alive", FieldType::primitive(Primitive::Bool))
            .add_field("lives", FieldType::primitive(Primitive::U8))
            .build();
        let status = world.register_component("Status", layout);
        let entity = world.new_entity();
        world.add_component(entity, status);

        assert!(!world.flag(entity, status, "alive"));
        world.set_flag(entity, status, "alive", true);
        assert!(world.flag(entity, status, "alive"));
        assert_eq!(*world.field::<u8>(entity, status, "alive"), 1);

        *world.field_mut::<u8>(entity, status, "lives") = 3;
        assert_eq!(*world.field::<u8>(entity, status, "lives"), 3);
    }

    #[test]
    #[should_panic(expected = "holds a bool")]
    fn test_bool_not_writable_by_value() {
        let mut world = World::new();
        let layout = StructBuilder::new()
            .add_field("alive", FieldType::primitive(Primitive::Bool))
            .build();
        let status = world.register_component("Status", layout);
        let entity = world.new_entity();
        world.add_component(entity, status);
        *world.field_mut::<u8>(entity, status, "alive") = 2;
    }

    #[test]
    fn test_text_fields() {
        let mut world = World::new();
        let name = world.register_component("Name", name_layout());
        let entity = world.new_entity();
        world.add_component(entity, name);

        assert_eq!(world.text(entity, name, "value").as_str(), "");
        world.text_mut(entity, name, "value").set("player");
        assert_eq!(world.text(entity, name, "value"), &"player");

        let other = world.new_entity();
        world.add_component(other, name);
        assert!(world.text(other, name, "value").is_empty());
    }

    #[test]
    fn test_pages_released_through_world() {
        let config = WorldConfig { page_size: Some(2), ..WorldConfig::default() };
        let mut world = World::with_config(config);
        let position = world.register_component("Position", position_layout());

        let entities: Vec<EntityID> = (0..4).map(|_| world.new_entity()).collect();
        world.add_component(entities[2], position);
        world.add_component(entities[3], position);
        assert_eq!(world.component_pool(position).num_allocated_pages(), 1);

        world.remove_component(entities[2], position);
        world.destroy_entity(entities[3]);
        assert_eq!(world.component_pool(position).num_allocated_pages(), 0);
    }

    #[test]
    fn test_registration_listeners() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut world = World::new();
        let sink = seen.clone();
        world.on_component_registered(move |component| {
            sink.borrow_mut().push((component.id().index(), component.name().to_string()));
        });

        world.register_component("Position", position_layout());
        world.register_component("Name", name_layout());
        assert_eq!(*seen.borrow(), vec![(0, "Position".to_string()), (1, "Name".to_string())]);
        assert_eq!(world.component_id("Name"), Some(ComponentTypeID::new(1)));
        assert_eq!(world.component_id("Velocity"), None);
    }

    #[test]
    fn test_systems() {
        let mut world = World::with_clock(WorldConfig::default(), StepClock(Cell::new(0)));
        let position = world.register_component("Position", position_layout());
        let entity = world.new_entity();
        world.add_component(entity, position);

        world.register_system("spawn", |world: &mut World, _dt: f32| {
            world.new_entity();
        });
        world.register_system("move", move |world: &mut World, dt: f32| {
            for entity in world.get_entities(ComponentMask::of(position)) {
                *world.field_mut::<f32>(entity, position, "x") += dt;
            }
        });

        let names: Vec<&str> = world.systems().map(|s| s.name).collect();
        assert_eq!(names, vec!["move", "spawn"]);

        world.invoke_system("move", 0.5);
        world.invoke_system("move", 0.25);
        assert_eq!(*world.field::<f32>(entity, position, "x"), 0.75);
        assert_eq!(world.systems().next().unwrap().last_duration, Duration::from_millis(5));

        world.set_system_enabled("spawn", false);
        world.invoke_system("spawn", 0.0);
        assert_eq!(world.num_entities(), 1);

        world.set_system_enabled("spawn", true);
        world.invoke_system("spawn", 0.0);
        assert_eq!(world.num_entities(), 2);
        assert!(world.has_system("spawn"));
        assert!(!world.has_system("render"));
    }

    #[test]
    #[should_panic(expected = "already running")]
    fn test_reentrant_system() {
        let mut world = World::new();
        world.register_system("recurse", |world: &mut World, dt: f32| {
            world.invoke_system("recurse", dt);
        });
        world.invoke_system("recurse", 0.0);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_component() {
        let mut world = World::new();
        world.register_component("Position", position_layout());
        world.register_component("Position", name_layout());
    }

    #[test]
    #[should_panic(expected = "cannot register more than 64 components")]
    fn test_component_limit() {
        let mut world = World::new();
        for idx in 0..=MAX_COMPONENTS {
            world.register_component(format!("C{}", idx), StructBuilder::new().build());
        }
    }

    #[test]
    #[should_panic(expected = "already has component")]
    fn test_double_add() {
        let mut world = World::new();
        let position = world.register_component("Position", position_layout());
        let entity = world.new_entity();
        world.add_component(entity, position);
        world.add_component(entity, position);
    }

    #[test]
    #[should_panic(expected = "size mismatch")]
    fn test_field_size_mismatch() {
        let mut world = World::new();
        let position = world.register_component("Position", position_layout());
        let entity = world.new_entity();
        world.add_component(entity, position);
        world.field::<u64>(entity, position, "x");
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_destroy_twice() {
        let mut world = World::new();
        let entity = world.new_entity();
        world.destroy_entity(entity);
        world.destroy_entity(entity);
    }
}
