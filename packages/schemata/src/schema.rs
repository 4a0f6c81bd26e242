//! Compiling TOML schema files into component layouts.
//!
//! A schema declares enums and structs:
//!
//! ```toml
//! [[enums]]
//! name = "Shape"
//! values = ["Circle", "Rect"]
//!
//! [[structs]]
//! name = "Transform"
//! component = true
//! fields = [
//!     { name = "position", type = "vec2" },
//!     { name = "tags", type = "string[]" },
//! ]
//! ```
//!
//! Field types are a base name followed by any number of bracket suffixes,
//! applied from the right: `T[]` is a vector, `T[N]` an array of `N` and
//! `V[K]` a map from `K` to `V`. Structs may refer to each other in any order.
//! A type string may contain at most `MAX_TYPE_DEPTH` bracket groups.
//!
//! Bad input never aborts compilation of the rest of the file: a struct or
//! enum that cannot be compiled is skipped and a `Diagnostic` is recorded.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::mem;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::SchemaError;
use crate::field_type::{EnumType, FieldType, Primitive};
use crate::id::ComponentTypeID;
use crate::struct_layout::{StructBuilder, StructLayout};
use crate::world::World;

#[derive(Debug, Default, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    enums: Vec<EnumDecl>,
    #[serde(default)]
    structs: Vec<StructDecl>,
}

#[derive(Debug, Deserialize)]
struct EnumDecl {
    name: String,
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StructDecl {
    name: String,
    #[serde(default)]
    component: bool,
    #[serde(default)]
    fields: Vec<FieldDecl>,
}

#[derive(Debug, Deserialize)]
struct FieldDecl {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

/// A problem that caused an item of the schema to be skipped.
#[derive(Debug)]
pub struct Diagnostic {
    /// The name of the skipped enum or struct.
    pub item: String,
    pub error: SchemaError,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "skipped `{}`: {}", self.item, self.error)
    }
}

/// A compiled struct declaration.
#[derive(Clone, Debug)]
pub struct StructDef {
    name: String,
    layout: Arc<StructLayout>,
    is_component: bool,
}

impl StructDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &Arc<StructLayout> {
        &self.layout
    }

    /// Returns true if this struct should be registered as a component.
    pub fn is_component(&self) -> bool {
        self.is_component
    }
}

/// The compiled contents of a schema file.
#[derive(Debug, Default)]
pub struct Schema {
    enums: Vec<Arc<EnumType>>,
    structs: Vec<StructDef>,
    diagnostics: Vec<Diagnostic>,
}

impl Schema {
    /// Compile a schema from TOML source.
    ///
    /// Only a syntactically invalid document is an error. Items that cannot
    /// be compiled are reported through `diagnostics`.
    pub fn from_toml_str(source: &str) -> Result<Schema, SchemaError> {
        let file: SchemaFile = toml::from_str(source)?;
        Ok(Compiler::new(file).compile())
    }

    /// Read and compile a schema file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Schema, SchemaError> {
        let source = fs::read_to_string(path)?;
        Schema::from_toml_str(&source)
    }

    /// Every compiled enum, in declaration order.
    pub fn enums(&self) -> &[Arc<EnumType>] {
        &self.enums
    }

    /// Look up an enum by name.
    pub fn enum_type(&self, name: &str) -> Option<&Arc<EnumType>> {
        self.enums.iter().find(|e| e.name() == name)
    }

    /// Every compiled struct, in declaration order.
    pub fn structs(&self) -> &[StructDef] {
        &self.structs
    }

    /// Look up a struct by name.
    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.structs.iter().find(|s| s.name == name)
    }

    /// Every struct marked as a component, in declaration order.
    pub fn components<'a>(&'a self) -> impl Iterator<Item=&'a StructDef> + 'a {
        self.structs.iter().filter(|s| s.is_component)
    }

    /// The problems found while compiling.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Register every component struct with `world`, in declaration order.
    ///
    /// # Panics
    /// If a component name is already registered with `world`.
    pub fn register_components(&self, world: &mut World) -> Vec<ComponentTypeID> {
        self.components()
            .map(|def| world.register_component(def.name.clone(), def.layout.clone()))
            .collect()
    }
}

/// The most bracket groups a field's type string may contain.
pub const MAX_TYPE_DEPTH: usize = 32;

/// The names a type string may refer to.
struct Scope {
    enums: HashMap<String, Arc<EnumType>>,
    structs: HashSet<String>,
}

impl Scope {
    fn is_declared(&self, name: &str) -> bool {
        name == "string"
            || Primitive::from_name(name).is_some()
            || self.enums.contains_key(name)
            || self.structs.contains(name)
    }
}

/// Split `base[suffix]` into `(base, suffix)` at the last `[`.
fn split_bracket(source: &str) -> Option<(&str, &str)> {
    if !source.ends_with(']') {
        return None;
    }

    let open = source.rfind('[')?;
    Some((&source[..open], &source[open + 1..source.len() - 1]))
}

/// Parse a type string. Struct names become placeholders and unknown names
/// become error types.
fn parse_type(source: &str, scope: &Scope) -> Result<Arc<FieldType>, SchemaError> {
    if let Some((base, suffix)) = split_bracket(source) {
        let element = parse_type(base, scope)?;

        if suffix.is_empty() {
            return Ok(FieldType::vector(element));
        }

        if suffix.bytes().all(|b| b.is_ascii_digit()) {
            return match suffix.parse::<usize>() {
                Ok(count) if count > 0 => Ok(FieldType::array(element, count)),
                _ => Err(SchemaError::BadArrayLength { ty: source.to_string() }),
            };
        }

        let key = parse_type(suffix, scope)?;
        return Ok(FieldType::map(key, element));
    }

    if source == "string" {
        return Ok(FieldType::string());
    }

    if let Some(primitive) = Primitive::from_name(source) {
        return Ok(FieldType::primitive(primitive));
    }

    if let Some(enum_type) = scope.enums.get(source) {
        return Ok(FieldType::enumeration(enum_type.clone()));
    }

    if scope.structs.contains(source) {
        return Ok(Arc::new(FieldType::Placeholder(source.to_string())));
    }

    Ok(Arc::new(FieldType::Error(source.to_string())))
}

/// The name of the first error type nested in `ty`.
fn first_error(ty: &FieldType) -> Option<String> {
    let mut found = None;
    ty.traverse(&mut |node| {
        if let FieldType::Error(name) = node {
            if found.is_none() {
                found = Some(name.clone());
            }
        }
    });
    found
}

enum Resolution {
    Pending,
    InProgress,
    Resolved(Arc<StructLayout>),
    Failed { recursive: bool },
}

struct PendingStruct {
    decl: StructDecl,
    fields: Result<Vec<(String, Arc<FieldType>)>, SchemaError>,
    resolution: Resolution,
}

struct Compiler {
    enum_decls: Vec<EnumDecl>,
    struct_decls: Vec<StructDecl>,
    pending: Vec<PendingStruct>,
    by_name: HashMap<String, usize>,
    diagnostics: Vec<Diagnostic>,
}

impl Compiler {
    fn new(file: SchemaFile) -> Compiler {
        Compiler {
            enum_decls: file.enums,
            struct_decls: file.structs,
            pending: Vec::new(),
            by_name: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    fn report(&mut self, item: &str, error: SchemaError) {
        warn!(item, %error, "skipping schema item");
        self.diagnostics.push(Diagnostic {
            item: item.to_string(),
            error,
        });
    }

    fn compile(mut self) -> Schema {
        let mut scope = Scope {
            enums: HashMap::new(),
            structs: HashSet::new(),
        };

        let mut enums = Vec::new();
        for decl in mem::take(&mut self.enum_decls) {
            if decl.values.is_empty() {
                self.report(&decl.name, SchemaError::EmptyEnum { name: decl.name.clone() });
                continue;
            }
            if scope.is_declared(&decl.name) {
                self.report(&decl.name, SchemaError::DuplicateName { name: decl.name.clone() });
                continue;
            }

            debug!(name = %decl.name, values = decl.values.len(), "compiled enum");
            let enum_type = Arc::new(EnumType::new(decl.name.clone(), decl.values));
            scope.enums.insert(decl.name, enum_type.clone());
            enums.push(enum_type);
        }

        let mut accepted = Vec::new();
        for decl in mem::take(&mut self.struct_decls) {
            if scope.is_declared(&decl.name) {
                self.report(&decl.name, SchemaError::DuplicateName { name: decl.name.clone() });
                continue;
            }

            scope.structs.insert(decl.name.clone());
            accepted.push(decl);
        }

        // First pass: parse every field, leaving struct references as
        // placeholders.
        for decl in accepted {
            let fields = Compiler::parse_fields(&decl, &scope);
            self.by_name.insert(decl.name.clone(), self.pending.len());
            self.pending.push(PendingStruct {
                decl,
                fields,
                resolution: Resolution::Pending,
            });
        }

        // Second pass: resolve placeholders in dependency order.
        let mut structs = Vec::new();
        for idx in 0..self.pending.len() {
            if let Some(layout) = self.resolve(idx) {
                let decl = &self.pending[idx].decl;
                structs.push(StructDef {
                    name: decl.name.clone(),
                    layout,
                    is_component: decl.component,
                });
            }
        }

        Schema {
            enums,
            structs,
            diagnostics: self.diagnostics,
        }
    }

    fn parse_fields(decl: &StructDecl, scope: &Scope) -> Result<Vec<(String, Arc<FieldType>)>, SchemaError> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(decl.fields.len());

        for field in &decl.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateName { name: field.name.clone() });
            }

            if field.ty.matches('[').count() > MAX_TYPE_DEPTH {
                return Err(SchemaError::TooDeep { field: field.name.clone(), limit: MAX_TYPE_DEPTH });
            }

            let ty = parse_type(&field.ty, scope)?;
            if let Some(name) = first_error(&ty) {
                return Err(SchemaError::UnknownType { field: field.name.clone(), name });
            }
            if ty.contains_map() {
                return Err(SchemaError::UnsupportedMap { field: field.name.clone() });
            }

            fields.push((field.name.clone(), ty));
        }

        Ok(fields)
    }

    /// Resolve a struct and everything it depends on, reporting it if it
    /// has to be skipped.
    fn resolve(&mut self, idx: usize) -> Option<Arc<StructLayout>> {
        match &self.pending[idx].resolution {
            Resolution::Resolved(layout) => return Some(layout.clone()),
            Resolution::InProgress | Resolution::Failed { .. } => return None,
            Resolution::Pending => {}
        }

        self.pending[idx].resolution = Resolution::InProgress;
        let name = self.pending[idx].decl.name.clone();

        match self.build(idx) {
            Ok(layout) => {
                debug!(name = %name, size = layout.size(), alignment = layout.alignment(), "compiled struct");
                self.pending[idx].resolution = Resolution::Resolved(layout.clone());
                Some(layout)
            }
            Err(error) => {
                let recursive = matches!(error, SchemaError::RecursiveStruct { .. });
                self.pending[idx].resolution = Resolution::Failed { recursive };
                self.report(&name, error);
                None
            }
        }
    }

    fn build(&mut self, idx: usize) -> Result<Arc<StructLayout>, SchemaError> {
        let fields = mem::replace(&mut self.pending[idx].fields, Ok(Vec::new()))?;

        let mut builder = StructBuilder::new();
        for (field_name, ty) in fields {
            let mut failure = None;
            let resolved = ty.transform(&mut |node| {
                let dependency = match node {
                    FieldType::Placeholder(dependency) => dependency,
                    _ => return None,
                };

                let dep_idx = self.by_name[dependency.as_str()];
                let in_progress = matches!(self.pending[dep_idx].resolution, Resolution::InProgress);
                if !in_progress {
                    if let Some(layout) = self.resolve(dep_idx) {
                        return Some(FieldType::structure(dependency.clone(), layout));
                    }
                }

                let recursive = in_progress || matches!(
                    self.pending[dep_idx].resolution, Resolution::Failed { recursive: true });
                if failure.is_none() {
                    failure = Some(if recursive {
                        SchemaError::RecursiveStruct { name: dependency.clone() }
                    } else {
                        SchemaError::UnknownType { field: field_name.clone(), name: dependency.clone() }
                    });
                }
                Some(Arc::new(FieldType::Invalid))
            });

            if let Some(error) = failure {
                return Err(error);
            }

            builder.try_push_field(field_name, resolved)?;
        }

        Ok(Arc::new(builder.build()))
    }
}
