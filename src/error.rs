//! Error types for schema compilation, version resolution, and transformation.

use serde_json::Value;
use thiserror::Error;

/// Errors during property-tree assembly and version compilation.
///
/// These are configuration errors: they are detected at `add`/`prepare`
/// time and never recovered at runtime.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("property not found: {name}")]
    PropertyNotFound { name: String },

    #[error("duplicate mapping target \"{target}\": produced by both \"{first}\" and \"{second}\"")]
    DuplicateTarget {
        target: String,
        first: String,
        second: String,
    },

    #[error("property \"{name}\" cannot be mapped to the document root")]
    RootMapping { name: String },

    #[error("enum \"{name}\" needs at least two distinct values")]
    EnumValues { name: String },

    #[error("unknown type \"{ty}\" on property \"{name}\"")]
    UnknownType { name: String, ty: String },

    #[error("unknown schema class: {name}")]
    UnknownSchemaClass { name: String },

    #[error("property \"{name}\": {message}")]
    UnsupportedNode { name: String, message: String },

    #[error("invalid schema for variant \"{variant}\": {message}")]
    VariantSchema { variant: String, message: String },

    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("version \"{version}\" is already prepared")]
    AlreadyPrepared { version: String },

    #[error("version \"{version}\" has not been prepared")]
    NotPrepared { version: String },

    #[error("builder scope \"{name}\" was never closed")]
    UnclosedScope { name: String },

    #[error("no open builder scope to leave")]
    NoOpenScope,
}

/// Errors during version resolution.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("version not found: {requested}")]
    NotFound { requested: String },
}

/// Errors raised while executing a compiled mapping against a document.
///
/// Ambiguity is a correctness signal: neither `NoVariantMatch` nor
/// `AmbiguousVariant` is ever resolved by precedence.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("version \"{version}\" has not been prepared")]
    NotPrepared { version: String },

    #[error("discriminator \"{path}\" is missing from the document")]
    MissingDiscriminator { path: String },

    #[error("discriminator \"{path}\" selects unknown variant \"{value}\"")]
    UnknownVariant { path: String, value: String },

    #[error("no matching schema among variants: {}", candidates.join(", "))]
    NoVariantMatch { candidates: Vec<String> },

    #[error("ambiguous match: document satisfies variants {}", matches.join(", "))]
    AmbiguousVariant { matches: Vec<String> },
}

/// Errors returned by the `process` boundary.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<ValidationError> },
}

/// Single structured validation error with pointer context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ValidationError {
    /// JSON Pointer (RFC 6901) to the offending value.
    pub pointer: String,
    /// Short machine-readable kind (e.g. "Required", "Type").
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Extra context (schema path, variant names, ...).
    pub details: Value,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.pointer, self.message)
    }
}

impl From<TransformError> for ValidationError {
    fn from(err: TransformError) -> Self {
        let (kind, details) = match &err {
            TransformError::NoVariantMatch { candidates } => (
                "NoVariantMatch",
                serde_json::json!({ "candidates": candidates }),
            ),
            TransformError::AmbiguousVariant { matches } => (
                "AmbiguousVariant",
                serde_json::json!({ "matches": matches }),
            ),
            TransformError::MissingDiscriminator { path } => {
                ("MissingDiscriminator", serde_json::json!({ "path": path }))
            }
            TransformError::UnknownVariant { path, value } => (
                "UnknownVariant",
                serde_json::json!({ "path": path, "value": value }),
            ),
            TransformError::NotPrepared { version } => {
                ("NotPrepared", serde_json::json!({ "version": version }))
            }
        };
        ValidationError {
            pointer: String::new(),
            kind: kind.to_string(),
            message: err.to_string(),
            details,
        }
    }
}

impl SchemaError {
    /// Returns the CLI exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl ProcessError {
    /// Returns the CLI exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProcessError::Invalid { .. } => 1,
            _ => 2,
        }
    }
}
