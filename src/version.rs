//! Versions: one property tree, compiled once.
//!
//! A [`Version`] is assembled through two primitive mutations (`add`,
//! `remove`) plus [`copy_from`](Version::copy_from) for version-to-version
//! evolution, then frozen permanently by [`prepare`](Version::prepare),
//! which derives the schema, the inlined validation schema, the mapping
//! table and its inverse, and binds a transformer for each direction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{SchemaCatalog, SchemaClass};
use crate::config::CompileConfig;
use crate::error::SchemaError;
use crate::error::TransformError;
use crate::mapping::{self, Mapping, Rows};
use crate::node::{object_schema, union_schema, PropertyNode, Requirement};
use crate::transform::Transformer;

struct Prepared {
    schema: Value,
    validation_schema: Value,
    mapping: Mapping,
    inverse_mapping: Mapping,
    transformer: Transformer,
    reverse_transformer: Transformer,
}

/// One named version of a request shape.
///
/// Mutable while being assembled; immutable (and safe to share across
/// threads) once prepared.
pub struct Version {
    name: String,
    description: Option<String>,
    properties: Vec<PropertyNode>,
    prepared: Option<Prepared>,
}

impl Version {
    pub fn new(name: impl Into<String>) -> Self {
        Version {
            name: name.into(),
            description: None,
            properties: Vec::new(),
            prepared: None,
        }
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    /// Add a property. A node with the same name replaces the existing
    /// one, which is how evolved versions override inherited properties.
    ///
    /// # Errors
    ///
    /// Fails once the version is prepared.
    pub fn add(&mut self, node: PropertyNode) -> Result<(), SchemaError> {
        self.assert_mutable()?;
        if let Some(existing) = self
            .properties
            .iter_mut()
            .find(|p| p.name() == node.name())
        {
            *existing = node;
        } else {
            self.properties.push(node);
        }
        Ok(())
    }

    /// Remove a property by name.
    pub fn remove(&mut self, name: &str) -> Result<PropertyNode, SchemaError> {
        self.assert_mutable()?;
        let index = self
            .properties
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| SchemaError::PropertyNotFound {
                name: name.to_string(),
            })?;
        Ok(self.properties.remove(index))
    }

    /// Shallow-copy the node set of another version, skipping `exclude`.
    /// This is the inheritance primitive: an evolved version starts from
    /// its predecessor's nodes and applies `add`/`remove` deltas.
    pub fn copy_from(&mut self, source: &Version, exclude: &[&str]) -> Result<(), SchemaError> {
        self.assert_mutable()?;
        for node in &source.properties {
            if exclude.contains(&node.name()) {
                continue;
            }
            self.add(node.clone())?;
        }
        Ok(())
    }

    pub fn property(&self, name: &str) -> Option<&PropertyNode> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Compile the version. Idempotent; afterwards the version is frozen.
    pub fn prepare(
        &mut self,
        config: &CompileConfig,
        catalog: &SchemaCatalog,
    ) -> Result<(), SchemaError> {
        if self.prepared.is_some() {
            return Ok(());
        }

        for node in &self.properties {
            node.validate(config)?;
            if node.name().is_empty() && !self.is_combination() {
                return Err(SchemaError::UnsupportedNode {
                    name: String::new(),
                    message: "unnamed properties are only allowed as a lone root-level union"
                        .to_string(),
                });
            }
        }

        let description = self
            .description
            .as_deref()
            .or(config.default_description.as_deref());

        // The combination case: the version is one unnamed union, so
        // schema and mapping delegate to it instead of wrapping an object.
        let (schema, validation_schema) = if let Some(union) = self.combination() {
            (
                union_schema(union, config, catalog, false)?,
                union_schema(union, config, catalog, true)?,
            )
        } else {
            (
                object_schema(&self.properties, description, None, config, catalog, false)?,
                object_schema(&self.properties, description, None, config, catalog, true)?,
            )
        };

        let compiled = mapping::compile(&self.properties, config, catalog)?;
        compiled.check_duplicate_targets()?;
        let inverse = compiled.invert();

        let transformer = Transformer::new(&compiled)?;
        let reverse_transformer = Transformer::new(&inverse)?;

        self.prepared = Some(Prepared {
            schema,
            validation_schema,
            mapping: compiled,
            inverse_mapping: inverse,
            transformer,
            reverse_transformer,
        });
        Ok(())
    }

    pub fn schema(&self) -> Result<&Value, SchemaError> {
        Ok(&self.prepared()?.schema)
    }

    pub fn validation_schema(&self) -> Result<&Value, SchemaError> {
        Ok(&self.prepared()?.validation_schema)
    }

    pub fn mapping(&self) -> Result<&Mapping, SchemaError> {
        Ok(&self.prepared()?.mapping)
    }

    pub fn inverse_mapping(&self) -> Result<&Mapping, SchemaError> {
        Ok(&self.prepared()?.inverse_mapping)
    }

    /// Rows of the compiled mapping that belong to one property.
    ///
    /// # Errors
    ///
    /// `PropertyNotFound` when no such property exists.
    pub fn mapping_for(&self, name: &str) -> Result<Rows, SchemaError> {
        if self.property(name).is_none() {
            return Err(SchemaError::PropertyNotFound {
                name: name.to_string(),
            });
        }
        let owns = |source: &str| {
            let head = source.split('/').next().unwrap_or(source);
            head == name || head.strip_suffix("[]") == Some(name)
        };
        let collect = |rows: &Rows| -> Rows {
            rows.iter()
                .filter(|(source, _)| owns(source))
                .map(|(s, t)| (s.clone(), t.clone()))
                .collect()
        };
        Ok(match self.mapping()? {
            Mapping::Flat(rows) => collect(rows),
            Mapping::Union(union) => union.variants.values().flat_map(|rows| collect(rows)).collect(),
            Mapping::MultiUnion { shared, unions } => {
                let mut out = collect(shared);
                for union in unions {
                    for rows in union.variants.values() {
                        out.extend(collect(rows));
                    }
                }
                out
            }
        })
    }

    /// Transform an external-shape document to the internal shape.
    pub fn transform(&self, doc: &Value) -> Result<Value, TransformError> {
        self.transformer()?.transform(doc)
    }

    /// Transform an internal-shape document back to the external shape.
    pub fn transform_back(&self, doc: &Value) -> Result<Value, TransformError> {
        let prepared = self.prepared.as_ref().ok_or_else(|| TransformError::NotPrepared {
            version: self.name.clone(),
        })?;
        prepared.reverse_transformer.transform(doc)
    }

    /// Expose this prepared version as a schema class other versions can
    /// reference. Only flat-mapped versions qualify.
    pub fn as_class(&self, class_name: impl Into<String>) -> Result<SchemaClass, SchemaError> {
        let prepared = self.prepared()?;
        let rows = prepared
            .mapping
            .flat_rows()
            .ok_or_else(|| SchemaError::UnsupportedNode {
                name: self.name.clone(),
                message: "only flat-mapped versions can be registered as schema classes"
                    .to_string(),
            })?;
        Ok(SchemaClass {
            name: class_name.into(),
            schema: prepared.schema.clone(),
            validation_schema: prepared.validation_schema.clone(),
            mapping: rows.clone(),
        })
    }

    fn prepared(&self) -> Result<&Prepared, SchemaError> {
        self.prepared.as_ref().ok_or_else(|| SchemaError::NotPrepared {
            version: self.name.clone(),
        })
    }

    fn transformer(&self) -> Result<&Transformer, TransformError> {
        self.prepared
            .as_ref()
            .map(|p| &p.transformer)
            .ok_or_else(|| TransformError::NotPrepared {
                version: self.name.clone(),
            })
    }

    fn assert_mutable(&self) -> Result<(), SchemaError> {
        if self.prepared.is_some() {
            return Err(SchemaError::AlreadyPrepared {
                version: self.name.clone(),
            });
        }
        Ok(())
    }

    fn is_combination(&self) -> bool {
        self.combination().is_some()
    }

    fn combination(&self) -> Option<&crate::node::OneOfNode> {
        match self.properties.as_slice() {
            [PropertyNode::OneOf(union)] if union.meta.name.is_empty() => Some(union),
            _ => None,
        }
    }
}

/// Declarative form of a version, loadable from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of an earlier version to inherit properties from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Inherited properties to drop before applying `properties`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyNode>,
}

/// A whole version-set definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSetDef {
    pub versions: Vec<VersionDef>,
}

/// Defaults applied by the builder to nodes that did not set the
/// attribute themselves.
#[derive(Debug, Clone, Default)]
pub struct BuilderDefaults {
    pub required: Option<bool>,
    pub nullable: Option<bool>,
}

/// Explicit scope-based builder over a version's property tree.
///
/// No ambient state: scopes are entered and left on this handle, and the
/// result is applied to a version in one step.
pub struct SchemaBuilder {
    defaults: BuilderDefaults,
    root: Vec<PropertyNode>,
    scopes: Vec<(String, Vec<PropertyNode>)>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    pub fn new() -> Self {
        SchemaBuilder {
            defaults: BuilderDefaults::default(),
            root: Vec::new(),
            scopes: Vec::new(),
        }
    }

    pub fn with_defaults(mut self, defaults: BuilderDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Add a node to the current scope.
    pub fn add(&mut self, mut node: PropertyNode) -> &mut Self {
        let meta = node.meta_mut();
        if meta.required == Requirement::default() {
            if let Some(required) = self.defaults.required {
                meta.required = Requirement::Flag(required);
            }
        }
        if !meta.nullable {
            if let Some(nullable) = self.defaults.nullable {
                meta.nullable = nullable;
            }
        }
        match self.scopes.last_mut() {
            Some((_, children)) => children.push(node),
            None => self.root.push(node),
        }
        self
    }

    /// Open a nested object scope; nodes added until the matching
    /// `leave_scope` become its children.
    pub fn enter_scope(&mut self, name: impl Into<String>) -> &mut Self {
        self.scopes.push((name.into(), Vec::new()));
        self
    }

    /// Close the innermost scope, wrapping its nodes into an object.
    pub fn leave_scope(&mut self) -> Result<&mut Self, SchemaError> {
        let (name, children) = self.scopes.pop().ok_or(SchemaError::NoOpenScope)?;
        self.add(PropertyNode::object(name, children));
        Ok(self)
    }

    /// Apply the collected nodes to a version.
    pub fn apply(self, version: &mut Version) -> Result<(), SchemaError> {
        if let Some((name, _)) = self.scopes.last() {
            return Err(SchemaError::UnclosedScope { name: name.clone() });
        }
        for node in self.root {
            version.add(node)?;
        }
        Ok(())
    }
}
