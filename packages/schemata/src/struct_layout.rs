//! C-compatible struct layouts computed at runtime.
//!
//! Fields are laid out in insertion order, each at the next offset that
//! satisfies its alignment, exactly as a C compiler would. No reordering is
//! done, so the result can be declared verbatim on the other side of an FFI
//! boundary.

use std::alloc::Layout;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::error::SchemaError;
use crate::field_type::{FieldType, MAX_SIZE};
use crate::raw;

/// Round `offset` up to the next multiple of `alignment`.
pub const fn align(offset: usize, alignment: usize) -> usize {
    offset + (alignment - offset % alignment) % alignment
}

/// As `align`, but `None` if the result exceeds `MAX_SIZE`.
pub fn checked_align(offset: usize, alignment: usize) -> Option<usize> {
    offset.checked_add((alignment - offset % alignment) % alignment)
        .filter(|&aligned| aligned <= MAX_SIZE)
}

/// A single field of a `StructLayout`.
#[derive(Clone, Debug)]
pub struct Field {
    name: String,
    ty: Arc<FieldType>,
    offset: usize,
    size: usize,
    alignment: usize,
}

impl Field {
    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field type.
    pub fn ty(&self) -> &Arc<FieldType> {
        &self.ty
    }

    /// Byte offset from the start of the struct.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment in bytes.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Return a pointer to this field within a struct instance.
    ///
    /// # Safety
    /// `base` must point to an instance of the struct this field belongs to.
    pub unsafe fn locate(&self, base: *mut u8) -> *mut u8 {
        raw::offset(base, self.offset)
    }
}

/// The immutable byte layout of an ordered set of named fields.
#[derive(Clone, Debug)]
pub struct StructLayout {
    fields: Vec<Field>,
    size: usize,
    alignment: usize,
}

impl StructLayout {
    /// The fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns true if the layout has a field with the given name.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Total size in bytes, including trailing padding.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment in bytes (the largest field alignment, or 1).
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// The equivalent `std::alloc::Layout`.
    pub fn layout(&self) -> Layout {
        Layout::from_size_align(self.size, self.alignment).expect("invalid struct layout")
    }

    /// Construct every field of a struct instance in place.
    ///
    /// # Safety
    /// `ptr` must point to `self.size()` zero-filled bytes aligned to
    /// `self.alignment()`.
    pub unsafe fn init(&self, ptr: *mut u8) {
        for field in &self.fields {
            field.ty.init(field.locate(ptr));
        }
    }

    /// Destroy every field of a struct instance in place.
    ///
    /// # Safety
    /// `ptr` must point to a struct instance constructed with `init`, which
    /// must not be used again.
    pub unsafe fn free(&self, ptr: *mut u8) {
        for field in &self.fields {
            field.ty.free(field.locate(ptr));
        }
    }
}

impl Display for StructLayout {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        for (idx, field) in self.fields.iter().enumerate() {
            write!(f, "  {} : {}", field.name, field.ty)?;
            if idx + 1 < self.fields.len() {
                writeln!(f, ",")?;
            } else {
                writeln!(f)?;
            }
        }
        write!(f, "}}")
    }
}

/// Accumulates fields and computes their offsets.
#[derive(Clone, Debug, Default)]
pub struct StructBuilder {
    fields: Vec<Field>,
    offset: usize,
}

impl StructBuilder {
    /// Create a new, empty builder.
    pub fn new() -> StructBuilder {
        StructBuilder::default()
    }

    /// Append a field, consuming and returning the builder.
    pub fn add_field(mut self, name: impl Into<String>, ty: Arc<FieldType>) -> Self {
        self.push_field(name, ty);
        self
    }

    /// Append a field.
    ///
    /// # Panics
    /// If `ty` has no in-memory representation (e.g. a map) or the struct
    /// would no longer fit in memory.
    pub fn push_field(&mut self, name: impl Into<String>, ty: Arc<FieldType>) {
        if let Err(err) = self.try_push_field(name, ty) {
            panic!("{}", err);
        }
    }

    /// Append a field, failing with `SchemaError::TooLarge` if the struct
    /// would no longer fit in memory. The builder is unchanged on failure.
    ///
    /// # Panics
    /// If `ty` has no in-memory representation (e.g. a map).
    pub fn try_push_field(&mut self, name: impl Into<String>, ty: Arc<FieldType>) -> Result<(), SchemaError> {
        let name = name.into();
        let too_large = || SchemaError::TooLarge { field: name.clone() };

        let size = ty.checked_size().ok_or_else(too_large)?;
        let alignment = ty.alignment();
        let offset = checked_align(self.offset, alignment).ok_or_else(too_large)?;
        let end = offset.checked_add(size).ok_or_else(too_large)?;

        // Trailing padding must fit as well.
        let struct_alignment = self.fields.iter()
            .map(|f| f.alignment)
            .fold(alignment, usize::max);
        checked_align(end, struct_alignment).ok_or_else(too_large)?;

        self.fields.push(Field {
            name,
            ty,
            offset,
            size,
            alignment,
        });
        self.offset = end;
        Ok(())
    }

    /// Finish the layout.
    pub fn build(&self) -> StructLayout {
        let alignment = self.fields.iter()
            .map(|f| f.alignment)
            .max()
            .unwrap_or(1);

        StructLayout {
            fields: self.fields.clone(),
            size: align(self.offset, alignment),
            alignment,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field_type::Primitive;

    fn scalar(p: Primitive) -> Arc<FieldType> {
        FieldType::primitive(p)
    }

    #[test]
    fn test_align() {
        assert_eq!(align(0, 4), 0);
        assert_eq!(align(1, 4), 4);
        assert_eq!(align(4, 4), 4);
        assert_eq!(align(5, 8), 8);
        assert_eq!(align(7, 1), 7);
    }

    #[test]
    fn test_padding_after_small_field() {
        let layout = StructBuilder::new()
            .add_field("a", scalar(Primitive::U8))
            .add_field("b", scalar(Primitive::F32))
            .build();

        assert_eq!(layout.field("a").unwrap().offset(), 0);
        assert_eq!(layout.field("b").unwrap().offset(), 4);
        assert_eq!(layout.size(), 8);
        assert_eq!(layout.alignment(), 4);
    }

    #[test]
    fn test_trailing_padding() {
        let layout = StructBuilder::new()
            .add_field("a", scalar(Primitive::U64))
            .add_field("b", scalar(Primitive::U8))
            .build();

        assert_eq!(layout.field("b").unwrap().offset(), 8);
        assert_eq!(layout.size(), 16);
        assert_eq!(layout.alignment(), 8);
    }

    #[test]
    fn test_empty_struct() {
        let layout = StructBuilder::new().build();
        assert_eq!(layout.size(), 0);
        assert_eq!(layout.alignment(), 1);
        assert!(layout.fields().is_empty());
    }

    #[test]
    fn test_alignment_invariants() {
        let kinds = [
            Primitive::U8, Primitive::U64, Primitive::I16, Primitive::Vec3,
            Primitive::Bool, Primitive::U32, Primitive::Color, Primitive::I8,
        ];

        let mut builder = StructBuilder::new();
        for (idx, kind) in kinds.iter().enumerate() {
            builder.push_field(format!("f{}", idx), scalar(*kind));
        }
        builder.push_field("s", FieldType::string());

        let first = builder.build();
        let second = builder.build();

        let mut last_end = 0;
        for (a, b) in first.fields().iter().zip(second.fields()) {
            assert_eq!(a.offset(), b.offset());
            assert_eq!(a.offset() % a.alignment(), 0);
            assert!(a.offset() >= last_end);
            last_end = a.offset() + a.size();
        }

        let max_align = first.fields().iter().map(|f| f.alignment()).max().unwrap();
        assert_eq!(first.alignment(), max_align);
        assert_eq!(first.size() % first.alignment(), 0);
        assert_eq!(first.size(), second.size());
    }

    #[test]
    fn test_nested_struct_lifecycle() {
        let inner = Arc::new(StructBuilder::new()
            .add_field("label", FieldType::string())
            .add_field("weight", scalar(Primitive::F32))
            .build());
        let outer = StructBuilder::new()
            .add_field("flag", scalar(Primitive::Bool))
            .add_field("inner", FieldType::structure("Inner", inner.clone()))
            .build();

        assert_eq!(outer.alignment(), inner.alignment());
        assert_eq!(outer.field("inner").unwrap().offset(), inner.alignment());

        let layout = outer.layout();
        let ptr = raw::alloc_zeroed(layout);
        unsafe {
            outer.init(ptr.as_ptr());
            let inner_ptr = outer.field("inner").unwrap().locate(ptr.as_ptr());
            let label = inner.field("label").unwrap().locate(inner_ptr) as *mut crate::text::Text;
            (*label).set("nested");
            assert_eq!((*label).as_str(), "nested");
            outer.free(ptr.as_ptr());
            raw::dealloc(ptr, layout);
        }
    }

    #[test]
    fn test_oversized_field_rejected() {
        let mut builder = StructBuilder::new();
        builder.push_field("head", scalar(Primitive::U8));

        let huge = FieldType::array(scalar(Primitive::U64), usize::MAX / 8);
        match builder.try_push_field("huge", huge) {
            Err(SchemaError::TooLarge { field }) => assert_eq!(field, "huge"),
            other => panic!("unexpected {:?}", other),
        }

        // Fits on its own, but not after `head` and its padding.
        let almost = FieldType::array(scalar(Primitive::U8), MAX_SIZE);
        assert!(builder.try_push_field("almost", almost).is_err());

        let layout = builder.add_field("tail", scalar(Primitive::U32)).build();
        assert_eq!(layout.fields().len(), 2);
        assert_eq!(layout.field("tail").unwrap().offset(), 4);
        assert_eq!(layout.size(), 8);
    }

    #[test]
    #[should_panic(expected = "does not fit in memory")]
    fn test_push_field_panics_on_overflow() {
        StructBuilder::new()
            .add_field("a", scalar(Primitive::U64))
            .add_field("b", FieldType::array(scalar(Primitive::U8), MAX_SIZE));
    }

    #[test]
    fn test_display() {
        let layout = StructBuilder::new()
            .add_field("x", scalar(Primitive::F32))
            .add_field("name", FieldType::string())
            .build();
        assert_eq!(layout.to_string(), "{\n  x : f32,\n  name : string\n}");
    }
}
