//! apimorph
//!
//! Versioned compilation of API request shapes.
//!
//! A request shape is declared once as a tree of property nodes. Preparing
//! a [`Version`] compiles that tree into three artifacts: a publishable
//! JSON Schema, a self-contained validation schema with every class
//! reference inlined, and a bidirectional path mapping that a
//! [`Transformer`] executes to rename and restructure documents between
//! the external and internal shapes. A [`VersionRegistry`] holds prepared
//! versions and resolves requests to the nearest earlier version.
//!
//! # Example
//!
//! ```
//! use apimorph::{CompileConfig, PropertyNode, SchemaCatalog, Version};
//! use serde_json::json;
//!
//! let mut version = Version::new("2025-06");
//! version.add(PropertyNode::field("name", "string").required(true)).unwrap();
//! version
//!     .add(PropertyNode::field("email", "string").map_to("contact/email"))
//!     .unwrap();
//! version.prepare(&CompileConfig::new(), &SchemaCatalog::new()).unwrap();
//!
//! // The published schema keeps the external shape.
//! let schema = version.schema().unwrap();
//! assert!(schema["properties"].get("email").is_some());
//!
//! // Transformation applies the mapping.
//! let out = version.transform(&json!({ "name": "Ada", "email": "a@b.c" })).unwrap();
//! assert_eq!(out, json!({ "name": "Ada", "contact": { "email": "a@b.c" } }));
//! ```
//!
//! # Absent vs null
//!
//! The transformer distinguishes three states for every source path:
//!
//! | Source state | Effect on target |
//! |--------------|------------------|
//! | absent | target omitted |
//! | `null` | target written as `null` at the matching depth |
//! | value | target written with the value |

mod catalog;
mod config;
mod error;
mod mapping;
mod node;
mod registry;
mod transform;
mod validator;
mod version;

pub use catalog::{ref_string, SchemaCatalog, SchemaClass, REF_PREFIX};
pub use config::{CompileConfig, CustomType, PRIMITIVE_TYPES};
pub use error::{ProcessError, SchemaError, TransformError, ValidationError, VersionError};
pub use mapping::{Mapping, NullableUnion, Rows, Selector, UnionMapping};
pub use node::{
    ArrayNode, CollectionItems, CollectionNode, ConstNode, EnumNode, FieldNode, NodeMeta,
    ObjectNode, OneOfNode, PropertyNode, ReferenceNode, Requirement, Variant,
};
pub use registry::VersionRegistry;
pub use transform::Transformer;
pub use validator::check;
pub use version::{BuilderDefaults, SchemaBuilder, Version, VersionDef, VersionSetDef};
