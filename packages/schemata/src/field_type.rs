//! Runtime descriptions of field shapes.
//!
//! A `FieldType` describes one field of a component: how large it is, how it
//! must be aligned, and what (if anything) has to happen to construct or
//! destroy a value of that shape in raw memory. The set of shapes is closed,
//! so everything here is a `match` over the variants.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::mem;
use std::ptr;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::field_vec::FieldVec;
use crate::raw;
use crate::struct_layout::StructLayout;
use crate::text::Text;

/// The largest size of any value; allocations cannot exceed it.
pub const MAX_SIZE: usize = isize::MAX as usize;

/// Primitive scalar and small vector kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    Vec2,
    Vec3,
    Vec4,
    Color,
}

static PRIMITIVE_NAMES: Lazy<HashMap<&'static str, Primitive>> = Lazy::new(|| {
    Primitive::ALL.iter()
        .map(|p| (p.name(), *p))
        .collect()
});

impl Primitive {
    /// Every primitive kind, in declaration order.
    pub const ALL: [Primitive; 14] = [
        Primitive::Bool,
        Primitive::U8,
        Primitive::I8,
        Primitive::U16,
        Primitive::I16,
        Primitive::U32,
        Primitive::I32,
        Primitive::U64,
        Primitive::I64,
        Primitive::F32,
        Primitive::Vec2,
        Primitive::Vec3,
        Primitive::Vec4,
        Primitive::Color,
    ];

    /// Look up a primitive by its schema name (e.g. `"f32"`).
    pub fn from_name(name: &str) -> Option<Primitive> {
        PRIMITIVE_NAMES.get(name).copied()
    }

    /// The schema name of this primitive.
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::U8 => "u8",
            Primitive::I8 => "i8",
            Primitive::U16 => "u16",
            Primitive::I16 => "i16",
            Primitive::U32 => "u32",
            Primitive::I32 => "i32",
            Primitive::U64 => "u64",
            Primitive::I64 => "i64",
            Primitive::F32 => "f32",
            Primitive::Vec2 => "vec2",
            Primitive::Vec3 => "vec3",
            Primitive::Vec4 => "vec4",
            Primitive::Color => "color",
        }
    }

    /// Size in bytes.
    pub fn size(self) -> usize {
        match self {
            Primitive::Bool => mem::size_of::<bool>(),
            Primitive::U8 => mem::size_of::<u8>(),
            Primitive::I8 => mem::size_of::<i8>(),
            Primitive::U16 => mem::size_of::<u16>(),
            Primitive::I16 => mem::size_of::<i16>(),
            Primitive::U32 => mem::size_of::<u32>(),
            Primitive::I32 => mem::size_of::<i32>(),
            Primitive::U64 => mem::size_of::<u64>(),
            Primitive::I64 => mem::size_of::<i64>(),
            Primitive::F32 => mem::size_of::<f32>(),
            Primitive::Vec2 => mem::size_of::<[f32; 2]>(),
            Primitive::Vec3 => mem::size_of::<[f32; 3]>(),
            Primitive::Vec4 | Primitive::Color => mem::size_of::<[f32; 4]>(),
        }
    }

    /// Alignment in bytes.
    pub fn alignment(self) -> usize {
        match self {
            Primitive::Bool => mem::align_of::<bool>(),
            Primitive::U8 => mem::align_of::<u8>(),
            Primitive::I8 => mem::align_of::<i8>(),
            Primitive::U16 => mem::align_of::<u16>(),
            Primitive::I16 => mem::align_of::<i16>(),
            Primitive::U32 => mem::align_of::<u32>(),
            Primitive::I32 => mem::align_of::<i32>(),
            Primitive::U64 => mem::align_of::<u64>(),
            Primitive::I64 => mem::align_of::<i64>(),
            Primitive::F32
            | Primitive::Vec2
            | Primitive::Vec3
            | Primitive::Vec4
            | Primitive::Color => mem::align_of::<f32>(),
        }
    }
}

/// A named enumeration stored as an `i32`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumType {
    name: String,
    values: Vec<(String, i64)>,
}

impl EnumType {
    /// Create an enum whose values are numbered from zero in order.
    pub fn new(name: impl Into<String>, value_names: impl IntoIterator<Item=impl Into<String>>) -> EnumType {
        let values = value_names.into_iter()
            .enumerate()
            .map(|(idx, value)| (value.into(), idx as i64))
            .collect();

        EnumType {
            name: name.into(),
            values,
        }
    }

    /// The enum's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `(name, value)` pairs, in declaration order.
    pub fn values(&self) -> &[(String, i64)] {
        &self.values
    }

    /// Look up the numeric value of a name.
    pub fn value(&self, name: &str) -> Option<i64> {
        self.values.iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

impl Display for EnumType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (name, value)) in self.values.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }

            write!(f, "{}", name)?;
            if *value != idx as i64 {
                write!(f, "({})", value)?;
            }
        }
        write!(f, "}}")
    }
}

/// The shape of a single field.
#[derive(Debug)]
pub enum FieldType {
    /// A default-constructed, meaningless type.
    Invalid,
    /// A type string that could not be resolved while compiling a schema.
    Error(String),
    /// A reference to a struct that has not been resolved yet.
    Placeholder(String),
    Primitive(Primitive),
    String,
    Enum(Arc<EnumType>),
    /// A struct embedded by value.
    Struct {
        name: String,
        layout: Arc<StructLayout>,
    },
    /// A fixed-size array.
    Array {
        element: Arc<FieldType>,
        count: usize,
    },
    /// A growable vector, stored in place as a `FieldVec`.
    Vector {
        element: Arc<FieldType>,
    },
    /// An associative map. Maps have no in-memory representation.
    Map {
        key: Arc<FieldType>,
        value: Arc<FieldType>,
    },
}

impl FieldType {
    /// Create a shared primitive type.
    pub fn primitive(primitive: Primitive) -> Arc<FieldType> {
        Arc::new(FieldType::Primitive(primitive))
    }

    /// Create a shared string type.
    pub fn string() -> Arc<FieldType> {
        Arc::new(FieldType::String)
    }

    /// Create a shared enum type.
    pub fn enumeration(enum_type: Arc<EnumType>) -> Arc<FieldType> {
        Arc::new(FieldType::Enum(enum_type))
    }

    /// Create a shared by-value struct type.
    pub fn structure(name: impl Into<String>, layout: Arc<StructLayout>) -> Arc<FieldType> {
        Arc::new(FieldType::Struct {
            name: name.into(),
            layout,
        })
    }

    /// Create a shared array type.
    pub fn array(element: Arc<FieldType>, count: usize) -> Arc<FieldType> {
        Arc::new(FieldType::Array { element, count })
    }

    /// Create a shared vector type.
    pub fn vector(element: Arc<FieldType>) -> Arc<FieldType> {
        Arc::new(FieldType::Vector { element })
    }

    /// Create a shared map type.
    pub fn map(key: Arc<FieldType>, value: Arc<FieldType>) -> Arc<FieldType> {
        Arc::new(FieldType::Map { key, value })
    }

    /// Size in bytes of a value of this type.
    ///
    /// # Panics
    /// For `Map`, for the unresolved variants, and if the size of an array
    /// overflows.
    pub fn size(&self) -> usize {
        match self.checked_size() {
            Some(size) => size,
            None => panic!("size of {} overflows", self),
        }
    }

    /// Size in bytes of a value of this type, or `None` if it does not fit
    /// in an allocation (more than `isize::MAX` bytes).
    ///
    /// # Panics
    /// For `Map` and for the unresolved variants.
    pub fn checked_size(&self) -> Option<usize> {
        match self {
            FieldType::Primitive(p) => Some(p.size()),
            FieldType::String => Some(mem::size_of::<Text>()),
            FieldType::Enum(_) => Some(mem::size_of::<i32>()),
            FieldType::Struct { layout, .. } => Some(layout.size()),
            FieldType::Array { element, count } => element.checked_size()?
                .checked_mul(*count)
                .filter(|&size| size <= MAX_SIZE),
            FieldType::Vector { .. } => Some(mem::size_of::<FieldVec>()),
            FieldType::Map { .. } => panic!("unimplemented: map size"),
            other => panic!("unimplemented: size of {}", other),
        }
    }

    /// Alignment in bytes of a value of this type.
    ///
    /// # Panics
    /// For `Map` and for the unresolved variants.
    pub fn alignment(&self) -> usize {
        match self {
            FieldType::Primitive(p) => p.alignment(),
            FieldType::String => mem::align_of::<Text>(),
            FieldType::Enum(_) => mem::align_of::<i32>(),
            FieldType::Struct { layout, .. } => layout.alignment(),
            FieldType::Array { element, .. } => element.alignment(),
            FieldType::Vector { .. } => mem::align_of::<FieldVec>(),
            FieldType::Map { .. } => panic!("unimplemented: map alignment"),
            other => panic!("unimplemented: alignment of {}", other),
        }
    }

    /// Returns true if values of this type need no construction or
    /// destruction beyond zeroing, so they may be copied bytewise.
    pub fn is_plain(&self) -> bool {
        match self {
            FieldType::Primitive(_) | FieldType::Enum(_) => true,
            FieldType::Array { element, .. } => element.is_plain(),
            FieldType::Struct { layout, .. } => layout.fields().iter().all(|f| f.ty().is_plain()),
            _ => false,
        }
    }

    /// Returns true if every bit pattern is a valid value of this type, so
    /// it may be written through a plain integer or float view.
    ///
    /// This is `is_plain` minus `bool`, which C readers require to be 0 or 1.
    pub fn accepts_any_bits(&self) -> bool {
        match self {
            FieldType::Primitive(Primitive::Bool) => false,
            FieldType::Primitive(_) | FieldType::Enum(_) => true,
            FieldType::Array { element, .. } => element.accepts_any_bits(),
            FieldType::Struct { layout, .. } => layout.fields().iter().all(|f| f.ty().accepts_any_bits()),
            _ => false,
        }
    }

    /// Returns true if this type, or any type nested within it, is an
    /// `Error`, `Placeholder` or `Invalid` type.
    pub fn is_unresolved(&self) -> bool {
        let mut unresolved = false;
        self.traverse(&mut |ty| {
            unresolved = unresolved || matches!(ty,
                FieldType::Invalid | FieldType::Error(_) | FieldType::Placeholder(_));
        });
        unresolved
    }

    /// Returns true if this type, or any type nested within it, is a `Map`.
    pub fn contains_map(&self) -> bool {
        let mut found = false;
        self.traverse(&mut |ty| found = found || matches!(ty, FieldType::Map { .. }));
        found
    }

    /// Construct a value of this type in place.
    ///
    /// The memory must already be zero-filled; primitives, enums and strings
    /// are valid in that state and are left untouched.
    ///
    /// # Safety
    /// `ptr` must be valid for writes of `self.size()` bytes and aligned to
    /// `self.alignment()`.
    ///
    /// # Panics
    /// For `Map` and for the unresolved variants.
    pub unsafe fn init(&self, ptr: *mut u8) {
        match self {
            FieldType::Primitive(_) | FieldType::Enum(_) | FieldType::String => {}
            FieldType::Struct { layout, .. } => layout.init(ptr),
            FieldType::Array { element, count } => {
                let size = element.size();
                for idx in 0..*count {
                    element.init(raw::offset(ptr, idx * size));
                }
            }
            FieldType::Vector { element } => {
                ptr::write(ptr as *mut FieldVec, FieldVec::new(element.clone()));
            }
            FieldType::Map { .. } => panic!("unimplemented: map init"),
            other => panic!("cannot initialise a field of {}", other),
        }
    }

    /// Destroy a value of this type in place.
    ///
    /// # Safety
    /// `ptr` must point to a value previously constructed with `init` for this
    /// type, which must not be used again.
    ///
    /// # Panics
    /// For `Map` and for the unresolved variants.
    pub unsafe fn free(&self, ptr: *mut u8) {
        match self {
            FieldType::Primitive(_) | FieldType::Enum(_) => {}
            FieldType::String => ptr::drop_in_place(ptr as *mut Text),
            FieldType::Struct { layout, .. } => layout.free(ptr),
            FieldType::Array { element, count } => {
                let size = element.size();
                for idx in 0..*count {
                    element.free(raw::offset(ptr, idx * size));
                }
            }
            FieldType::Vector { .. } => ptr::drop_in_place(ptr as *mut FieldVec),
            FieldType::Map { .. } => panic!("unimplemented: map free"),
            other => panic!("cannot free a field of {}", other),
        }
    }

    /// Visit this type and every element, key and value type nested in it.
    ///
    /// Struct types are visited but not entered.
    pub fn traverse(&self, f: &mut dyn FnMut(&FieldType)) {
        f(self);
        match self {
            FieldType::Array { element, .. } | FieldType::Vector { element } => element.traverse(f),
            FieldType::Map { key, value } => {
                key.traverse(f);
                value.traverse(f);
            }
            _ => {}
        }
    }

    /// Rebuild a type tree, replacing any node for which `f` returns a value.
    ///
    /// Nodes are offered to `f` before their children. Subtrees with no
    /// replacements are shared with the input tree rather than copied.
    pub fn transform(self: &Arc<Self>, f: &mut dyn FnMut(&FieldType) -> Option<Arc<FieldType>>) -> Arc<FieldType> {
        if let Some(replacement) = f(&**self) {
            return replacement;
        }

        match &**self {
            FieldType::Array { element, count } => {
                let new_element = element.transform(f);
                if Arc::ptr_eq(element, &new_element) {
                    self.clone()
                } else {
                    FieldType::array(new_element, *count)
                }
            }
            FieldType::Vector { element } => {
                let new_element = element.transform(f);
                if Arc::ptr_eq(element, &new_element) {
                    self.clone()
                } else {
                    FieldType::vector(new_element)
                }
            }
            FieldType::Map { key, value } => {
                let new_key = key.transform(f);
                let new_value = value.transform(f);
                if Arc::ptr_eq(key, &new_key) && Arc::ptr_eq(value, &new_value) {
                    self.clone()
                } else {
                    FieldType::map(new_key, new_value)
                }
            }
            _ => self.clone(),
        }
    }
}

impl Default for FieldType {
    fn default() -> Self {
        FieldType::Invalid
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Invalid => write!(f, "invalid"),
            FieldType::Error(name) => write!(f, "error type ({})", name),
            FieldType::Placeholder(name) => write!(f, "placeholder ({})", name),
            FieldType::Primitive(p) => write!(f, "{}", p.name()),
            FieldType::String => write!(f, "string"),
            FieldType::Enum(e) => write!(f, "enum {}", e.name()),
            FieldType::Struct { name, .. } => write!(f, "struct {}", name),
            FieldType::Array { element, count } => write!(f, "array<{}, {}>", element, count),
            FieldType::Vector { element } => write!(f, "vector<{}>", element),
            FieldType::Map { key, value } => write!(f, "map<{}, {}>", key, value),
        }
    }
}
