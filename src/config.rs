//! Compilation configuration.
//!
//! An explicit, immutable value passed into tree construction and
//! `prepare()` instead of process-wide state: the default for
//! `additionalProperties`, an inherited default description, and the
//! registry of custom leaf types.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::SchemaError;

/// JSON-Schema primitive types available to leaf properties.
pub const PRIMITIVE_TYPES: &[&str] = &["string", "number", "integer", "boolean"];

/// A registered custom leaf type: a name that expands to a primitive
/// plus fixed schema options (e.g. `money` -> string + `{"pattern": ...}`).
#[derive(Debug, Clone)]
pub struct CustomType {
    /// Underlying primitive ("string", "number", "integer", "boolean").
    pub base: String,
    /// Extra schema keywords merged into the emitted fragment.
    pub options: Map<String, Value>,
}

/// Options for property-tree compilation.
#[derive(Debug, Clone)]
pub struct CompileConfig {
    /// Default for `additionalProperties` on object schemas.
    /// Defaults to true to respect schema extensibility; individual
    /// objects may override it.
    pub additional_properties: bool,
    /// Description applied to the root schema when the version does not
    /// set one itself.
    pub default_description: Option<String>,
    custom_types: IndexMap<String, CustomType>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            additional_properties: true,
            default_description: None,
            custom_types: IndexMap::new(),
        }
    }
}

impl CompileConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default for `additionalProperties`.
    pub fn additional_properties(mut self, allow: bool) -> Self {
        self.additional_properties = allow;
        self
    }

    /// Set the description inherited by versions that set none.
    pub fn default_description(mut self, description: impl Into<String>) -> Self {
        self.default_description = Some(description.into());
        self
    }

    /// Register a custom leaf type.
    pub fn register_type(
        mut self,
        name: impl Into<String>,
        base: impl Into<String>,
        options: Map<String, Value>,
    ) -> Self {
        self.custom_types
            .insert(name.into(), CustomType { base: base.into(), options });
        self
    }

    /// Look up a custom type by name.
    pub fn custom_type(&self, name: &str) -> Option<&CustomType> {
        self.custom_types.get(name)
    }

    /// Emit the schema fragment for a leaf type: a primitive name or a
    /// registered custom type.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnknownType` for anything else.
    pub fn leaf_schema(&self, property: &str, ty: &str) -> Result<Map<String, Value>, SchemaError> {
        let mut schema = Map::new();
        if PRIMITIVE_TYPES.contains(&ty) {
            schema.insert("type".to_string(), Value::String(ty.to_string()));
            return Ok(schema);
        }
        let custom = self
            .custom_type(ty)
            .ok_or_else(|| SchemaError::UnknownType {
                name: property.to_string(),
                ty: ty.to_string(),
            })?;
        schema.insert("type".to_string(), Value::String(custom.base.clone()));
        for (key, value) in &custom.options {
            schema.insert(key.clone(), value.clone());
        }
        Ok(schema)
    }
}
