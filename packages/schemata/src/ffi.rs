//! C declarations for component layouts.
//!
//! Component memory is laid out exactly as a C compiler would lay out the
//! equivalent struct, so other runtimes can address it directly given these
//! declarations.

use std::collections::HashSet;

use crate::component::Component;
use crate::error::SchemaError;
use crate::field_type::{EnumType, FieldType, Primitive};
use crate::struct_layout::StructLayout;

/// Declarations of the builtin types every header depends on.
pub const C_PRELUDE: &str = "\
#include <stdbool.h>
#include <stddef.h>
#include <stdint.h>

typedef struct { float x, y; } vec2;
typedef struct { float x, y, z; } vec3;
typedef struct { float x, y, z, w; } vec4;
typedef struct { float r, g, b, a; } color;
typedef struct { char *data; size_t len; size_t capacity; } text;
";

fn unrepresentable(ty: &FieldType) -> SchemaError {
    SchemaError::Unrepresentable { ty: ty.to_string() }
}

fn primitive_name(primitive: Primitive) -> &'static str {
    match primitive {
        Primitive::Bool => "bool",
        Primitive::U8 => "uint8_t",
        Primitive::I8 => "int8_t",
        Primitive::U16 => "uint16_t",
        Primitive::I16 => "int16_t",
        Primitive::U32 => "uint32_t",
        Primitive::I32 => "int32_t",
        Primitive::U64 => "uint64_t",
        Primitive::I64 => "int64_t",
        Primitive::F32 => "float",
        Primitive::Vec2 => "vec2",
        Primitive::Vec3 => "vec3",
        Primitive::Vec4 => "vec4",
        Primitive::Color => "color",
    }
}

/// Split a type into its innermost non-array type and its array dimensions,
/// outermost first.
fn split_dimensions(ty: &FieldType) -> Result<(&str, String), SchemaError> {
    let mut dims = String::new();
    let mut current = ty;
    while let FieldType::Array { element, count } = current {
        dims.push_str(&format!("[{}]", count));
        current = &**element;
    }

    match current {
        FieldType::Primitive(p) => Ok((primitive_name(*p), dims)),
        FieldType::String => Ok(("text", dims)),
        FieldType::Enum(e) => Ok((e.name(), dims)),
        FieldType::Struct { name, .. } => Ok((name.as_str(), dims)),
        other => Err(unrepresentable(other)),
    }
}

/// The C spelling of a field type, e.g. `uint8_t` or `float[4]`.
pub fn c_type_name(ty: &FieldType) -> Result<String, SchemaError> {
    let (base, dims) = split_dimensions(ty)?;
    Ok(format!("{}{}", base, dims))
}

/// A C field declaration, e.g. `float weights[4]`.
pub fn c_field(name: &str, ty: &FieldType) -> Result<String, SchemaError> {
    let (base, dims) = split_dimensions(ty)?;
    Ok(format!("{} {}{}", base, name, dims))
}

/// A `typedef struct` for a layout, annotated with field offsets.
pub fn c_declaration(name: &str, layout: &StructLayout) -> Result<String, SchemaError> {
    let mut out = String::from("typedef struct {\n");
    for field in layout.fields() {
        let decl = c_field(field.name(), field.ty())?;
        out.push_str(&format!("    {}; // offset {}\n", decl, field.offset()));
    }
    out.push_str(&format!("}} {}; // size {}, alignment {}\n", name, layout.size(), layout.alignment()));
    Ok(out)
}

/// A `typedef enum` for an enum type. Values are prefixed with the enum
/// name.
pub fn c_enum_declaration(enum_type: &EnumType) -> String {
    let mut out = String::from("typedef enum {\n");
    for (value, number) in enum_type.values() {
        out.push_str(&format!("    {}_{} = {},\n", enum_type.name(), value, number));
    }
    out.push_str(&format!("}} {};\n", enum_type.name()));
    out
}

/// A complete header declaring every component, preceded by the prelude and
/// every enum and struct they use (dependencies first).
pub fn c_header(components: &[Component]) -> Result<String, SchemaError> {
    let mut header = HeaderWriter {
        out: String::from(C_PRELUDE),
        declared: HashSet::new(),
    };

    for component in components {
        header.declare_struct(component.name(), component.layout())?;
    }

    Ok(header.out)
}

struct HeaderWriter {
    out: String,
    declared: HashSet<String>,
}

impl HeaderWriter {
    fn declare_struct(&mut self, name: &str, layout: &StructLayout) -> Result<(), SchemaError> {
        if !self.declared.insert(name.to_string()) {
            return Ok(());
        }

        for field in layout.fields() {
            self.declare_dependencies(field.ty())?;
        }

        self.out.push('\n');
        self.out.push_str(&c_declaration(name, layout)?);
        Ok(())
    }

    fn declare_dependencies(&mut self, ty: &FieldType) -> Result<(), SchemaError> {
        match ty {
            FieldType::Array { element, .. } => self.declare_dependencies(element),
            FieldType::Struct { name, layout } => self.declare_struct(name, layout),
            FieldType::Enum(enum_type) => {
                if self.declared.insert(enum_type.name().to_string()) {
                    self.out.push('\n');
                    self.out.push_str(&c_enum_declaration(enum_type));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
