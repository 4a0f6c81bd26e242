//! A schema-driven entity component system.
//!
//! Components are not Rust types: they are `StructLayout`s built at runtime
//! (usually from a TOML `Schema`) and stored as raw, C-compatible bytes in
//! paged pools keyed by entity ID.

pub use component::{
    Component,
    ComponentMask,
    Query,
};
pub use config::WorldConfig;
pub use error::SchemaError;
pub use field_type::{EnumType, FieldType, Primitive};
pub use field_vec::FieldVec;
pub use id::{
    ComponentTypeID,
    EntityID,
    MAX_COMPONENTS,
};
pub use pool::ComponentPool;
pub use schema::{Diagnostic, Schema, StructDef};
pub use struct_layout::{Field, StructBuilder, StructLayout};
pub use system::{Clock, MonotonicClock, SystemInfo};
pub use text::Text;
pub use world::World;

mod raw;
pub mod id;
pub mod field_type;
pub mod text;
pub mod field_vec;
pub mod struct_layout;

pub mod pool;
pub mod component;
pub mod world;
pub mod system;

pub mod config;
pub mod error;
pub mod schema;
pub mod ffi;
