//! Errors reported while loading schemas and generating declarations.

use thiserror::Error;

/// A recoverable failure caused by bad input data.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("malformed schema: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to read schema: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown type `{name}` in field `{field}`")]
    UnknownType { field: String, name: String },

    #[error("field `{field}` uses a map type, which cannot be stored")]
    UnsupportedMap { field: String },

    #[error("struct `{name}` contains itself")]
    RecursiveStruct { name: String },

    #[error("`{name}` is declared more than once")]
    DuplicateName { name: String },

    #[error("invalid array length in type `{ty}`")]
    BadArrayLength { ty: String },

    #[error("field `{field}` does not fit in memory")]
    TooLarge { field: String },

    #[error("type of field `{field}` is nested more than {limit} levels deep")]
    TooDeep { field: String, limit: usize },

    #[error("type `{ty}` has no C representation")]
    Unrepresentable { ty: String },

    #[error("enum `{name}` has no values")]
    EmptyEnum { name: String },
}
