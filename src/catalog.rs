//! Named compiled schema classes.
//!
//! `$ref` strings of the form `#/components/schemas/<Name>[/properties/<prop>]`
//! resolve against a [`SchemaCatalog`]: a read-only set of compiled classes,
//! each carrying its published schema, its fully-inlined validation schema,
//! and its flat mapping table (borrowed by `Reference` and `Collection`
//! nodes during mapping compilation).

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::SchemaError;
use crate::mapping::Rows;

/// Prefix for schema-class references.
pub const REF_PREFIX: &str = "#/components/schemas/";

/// Build the `$ref` string for a class, optionally narrowed to one property.
pub fn ref_string(class: &str, property: Option<&str>) -> String {
    match property {
        Some(prop) => format!("{}{}/properties/{}", REF_PREFIX, class, prop),
        None => format!("{}{}", REF_PREFIX, class),
    }
}

/// One compiled schema class.
#[derive(Debug, Clone)]
pub struct SchemaClass {
    pub name: String,
    /// Published schema; may itself contain `$ref`s.
    pub schema: Value,
    /// Self-contained schema with every `$ref` inlined.
    pub validation_schema: Value,
    /// Flat source -> target rows, relative to the class root.
    pub mapping: Rows,
}

/// Read-only lookup of compiled schema classes, in registration order.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    classes: IndexMap<String, SchemaClass>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class under its own name. Re-registering replaces.
    pub fn register(&mut self, class: SchemaClass) {
        self.classes.insert(class.name.clone(), class);
    }

    /// Look up a class by name.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnknownSchemaClass` if absent.
    pub fn get(&self, name: &str) -> Result<&SchemaClass, SchemaError> {
        self.classes
            .get(name)
            .ok_or_else(|| SchemaError::UnknownSchemaClass {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Inlined validation schema for a class, or one property of it.
    pub fn resolve_validation(
        &self,
        class: &str,
        property: Option<&str>,
    ) -> Result<Value, SchemaError> {
        let class = self.get(class)?;
        match property {
            None => Ok(class.validation_schema.clone()),
            Some(prop) => class
                .validation_schema
                .get("properties")
                .and_then(|props| props.get(prop))
                .cloned()
                .ok_or_else(|| SchemaError::PropertyNotFound {
                    name: format!("{}/{}", class.name, prop),
                }),
        }
    }
}
