//! The property node tree.
//!
//! A request shape is described by a tree of typed nodes. The set is closed:
//! every operation (`schema`, `validation_schema`, mapping compilation in
//! [`crate::mapping`]) matches exhaustively, so a new node kind cannot be
//! half-supported.
//!
//! Nodes derive serde so whole version definitions can be loaded from JSON
//! (internally tagged on `kind`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::{ref_string, SchemaCatalog};
use crate::config::CompileConfig;
use crate::error::SchemaError;

/// Whether a property is required: a plain flag, or a list of sibling
/// names it is dependent-required on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Requirement {
    Flag(bool),
    DependsOn(Vec<String>),
}

impl Default for Requirement {
    fn default() -> Self {
        Requirement::Flag(false)
    }
}

impl Requirement {
    pub fn is_required(&self) -> bool {
        matches!(self, Requirement::Flag(true))
    }

    pub fn depends_on(&self) -> Option<&[String]> {
        match self {
            Requirement::DependsOn(names) => Some(names),
            Requirement::Flag(_) => None,
        }
    }
}

/// Attributes shared by every node kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeMeta {
    /// Unique within the parent scope. Empty only for the unnamed
    /// root-level union of a combination schema.
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "is_default_requirement")]
    pub required: Requirement,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
    /// Mapping override: absolute `/a/b`, relative `a/b`, absent mirrors
    /// the node's own name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn is_default_requirement(r: &Requirement) -> bool {
    *r == Requirement::default()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldNode {
    #[serde(flatten)]
    pub meta: NodeMeta,
    /// Primitive name or a custom type registered in the config.
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstNode {
    #[serde(flatten)]
    pub meta: NodeMeta,
    pub value: Value,
}

fn default_string_type() -> String {
    "string".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumNode {
    #[serde(flatten)]
    pub meta: NodeMeta,
    #[serde(rename = "type", default = "default_string_type")]
    pub ty: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectNode {
    #[serde(flatten)]
    pub meta: NodeMeta,
    pub properties: Vec<PropertyNode>,
    /// Overrides the config default when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayNode {
    #[serde(flatten)]
    pub meta: NodeMeta,
    /// Element type: primitive or custom.
    pub items: String,
}

/// Item shape of a [`CollectionNode`]: exactly one of the three.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionItems {
    /// Items governed by a referenced schema class.
    Class { class: String },
    /// Heterogeneous items governed by a nested union.
    Union { one_of: OneOfNode },
    /// Items are an inline object.
    Inline {
        properties: Vec<PropertyNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        additional_properties: Option<bool>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionNode {
    #[serde(flatten)]
    pub meta: NodeMeta,
    pub items: CollectionItems,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceNode {
    #[serde(flatten)]
    pub meta: NodeMeta,
    /// Referenced schema class name.
    pub class: String,
    /// Narrow the reference to one property of the class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

/// One candidate shape of a union: a class reference or an inline object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Variant {
    Reference { class: String },
    Inline {
        properties: Vec<PropertyNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        additional_properties: Option<bool>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneOfNode {
    #[serde(flatten)]
    pub meta: NodeMeta,
    /// Insertion order is observable: inference iterates variants in this
    /// order and ambiguity errors name them in this order.
    pub variants: IndexMap<String, Variant>,
    /// Field whose value selects the variant. Absent means inference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
}

/// A typed node of the property tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyNode {
    Field(FieldNode),
    Const(ConstNode),
    Enum(EnumNode),
    Object(ObjectNode),
    Array(ArrayNode),
    Collection(CollectionNode),
    Reference(ReferenceNode),
    OneOf(OneOfNode),
}

impl PropertyNode {
    pub fn meta(&self) -> &NodeMeta {
        match self {
            PropertyNode::Field(n) => &n.meta,
            PropertyNode::Const(n) => &n.meta,
            PropertyNode::Enum(n) => &n.meta,
            PropertyNode::Object(n) => &n.meta,
            PropertyNode::Array(n) => &n.meta,
            PropertyNode::Collection(n) => &n.meta,
            PropertyNode::Reference(n) => &n.meta,
            PropertyNode::OneOf(n) => &n.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut NodeMeta {
        match self {
            PropertyNode::Field(n) => &mut n.meta,
            PropertyNode::Const(n) => &mut n.meta,
            PropertyNode::Enum(n) => &mut n.meta,
            PropertyNode::Object(n) => &mut n.meta,
            PropertyNode::Array(n) => &mut n.meta,
            PropertyNode::Collection(n) => &mut n.meta,
            PropertyNode::Reference(n) => &mut n.meta,
            PropertyNode::OneOf(n) => &mut n.meta,
        }
    }

    pub fn name(&self) -> &str {
        &self.meta().name
    }

    // --- constructors ---

    pub fn field(name: impl Into<String>, ty: impl Into<String>) -> Self {
        PropertyNode::Field(FieldNode {
            meta: named(name),
            ty: ty.into(),
        })
    }

    pub fn constant(name: impl Into<String>, value: Value) -> Self {
        PropertyNode::Const(ConstNode {
            meta: named(name),
            value,
        })
    }

    pub fn enumeration(name: impl Into<String>, values: Vec<Value>) -> Self {
        PropertyNode::Enum(EnumNode {
            meta: named(name),
            ty: default_string_type(),
            values,
        })
    }

    pub fn object(name: impl Into<String>, properties: Vec<PropertyNode>) -> Self {
        PropertyNode::Object(ObjectNode {
            meta: named(name),
            properties,
            additional_properties: None,
        })
    }

    pub fn array(name: impl Into<String>, items: impl Into<String>) -> Self {
        PropertyNode::Array(ArrayNode {
            meta: named(name),
            items: items.into(),
        })
    }

    pub fn collection(name: impl Into<String>, items: CollectionItems) -> Self {
        PropertyNode::Collection(CollectionNode {
            meta: named(name),
            items,
        })
    }

    pub fn reference(name: impl Into<String>, class: impl Into<String>) -> Self {
        PropertyNode::Reference(ReferenceNode {
            meta: named(name),
            class: class.into(),
            property: None,
        })
    }

    pub fn one_of(name: impl Into<String>, variants: IndexMap<String, Variant>) -> Self {
        PropertyNode::OneOf(OneOfNode {
            meta: named(name),
            variants,
            discriminator: None,
        })
    }

    // --- fluent meta setters ---

    pub fn required(mut self, required: bool) -> Self {
        self.meta_mut().required = Requirement::Flag(required);
        self
    }

    pub fn depends_on(mut self, siblings: Vec<String>) -> Self {
        self.meta_mut().required = Requirement::DependsOn(siblings);
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.meta_mut().nullable = nullable;
        self
    }

    pub fn map_to(mut self, target: impl Into<String>) -> Self {
        self.meta_mut().map = Some(target.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.meta_mut().description = Some(text.into());
        self
    }

    // --- structural checks, run once at prepare() ---

    /// Check node invariants: root-mapping misuse, enum arity, leaf types.
    pub fn validate(&self, config: &CompileConfig) -> Result<(), SchemaError> {
        if self.meta().map.as_deref() == Some("/") && !self.name().is_empty() {
            return Err(SchemaError::RootMapping {
                name: self.name().to_string(),
            });
        }
        match self {
            PropertyNode::Field(n) => {
                config.leaf_schema(&n.meta.name, &n.ty)?;
            }
            PropertyNode::Const(_) => {}
            PropertyNode::Enum(n) => {
                let mut seen = Vec::new();
                for value in &n.values {
                    if seen.contains(&value) {
                        return Err(SchemaError::EnumValues {
                            name: n.meta.name.clone(),
                        });
                    }
                    seen.push(value);
                }
                if n.values.len() < 2 {
                    return Err(SchemaError::EnumValues {
                        name: n.meta.name.clone(),
                    });
                }
            }
            PropertyNode::Object(n) => {
                for child in &n.properties {
                    child.validate(config)?;
                }
            }
            PropertyNode::Array(n) => {
                // Arrays never map to the document root, even unnamed.
                if n.meta.map.as_deref() == Some("/") {
                    return Err(SchemaError::RootMapping {
                        name: n.meta.name.clone(),
                    });
                }
                config.leaf_schema(&n.meta.name, &n.items)?;
            }
            PropertyNode::Collection(n) => match &n.items {
                CollectionItems::Class { .. } => {}
                CollectionItems::Union { one_of } => validate_union(one_of, config)?,
                CollectionItems::Inline { properties, .. } => {
                    for child in properties {
                        child.validate(config)?;
                    }
                }
            },
            PropertyNode::Reference(_) => {}
            PropertyNode::OneOf(n) => validate_union(n, config)?,
        }
        Ok(())
    }

    /// JSON-Schema fragment for this node, `$ref`s left unresolved.
    pub fn schema(
        &self,
        config: &CompileConfig,
        catalog: &SchemaCatalog,
    ) -> Result<Value, SchemaError> {
        self.emit(config, catalog, false)
    }

    /// Like [`schema`](Self::schema) but self-contained: every `$ref` is
    /// inlined and OpenAPI-only extensions (`discriminator`) are omitted.
    pub fn validation_schema(
        &self,
        config: &CompileConfig,
        catalog: &SchemaCatalog,
    ) -> Result<Value, SchemaError> {
        self.emit(config, catalog, true)
    }

    fn emit(
        &self,
        config: &CompileConfig,
        catalog: &SchemaCatalog,
        inline: bool,
    ) -> Result<Value, SchemaError> {
        match self {
            PropertyNode::Field(n) => {
                let mut schema = config.leaf_schema(&n.meta.name, &n.ty)?;
                if n.meta.nullable {
                    widen_type_null(&mut schema);
                }
                attach_description(&mut schema, &n.meta);
                Ok(Value::Object(schema))
            }
            PropertyNode::Const(n) => {
                let mut schema = Map::new();
                schema.insert("const".to_string(), n.value.clone());
                attach_description(&mut schema, &n.meta);
                Ok(Value::Object(schema))
            }
            PropertyNode::Enum(n) => {
                let mut schema = Map::new();
                schema.insert("type".to_string(), Value::String(n.ty.clone()));
                let mut values = n.values.clone();
                if n.meta.nullable {
                    widen_type_null(&mut schema);
                    if !values.contains(&Value::Null) {
                        values.push(Value::Null);
                    }
                }
                schema.insert("enum".to_string(), Value::Array(values));
                attach_description(&mut schema, &n.meta);
                Ok(Value::Object(schema))
            }
            PropertyNode::Object(n) => object_schema(
                &n.properties,
                n.meta.description.as_deref(),
                n.additional_properties,
                config,
                catalog,
                inline,
            ),
            PropertyNode::Array(n) => {
                let items = config.leaf_schema(&n.meta.name, &n.items)?;
                let mut schema = Map::new();
                schema.insert("type".to_string(), Value::String("array".to_string()));
                schema.insert("items".to_string(), Value::Object(items));
                if n.meta.nullable {
                    widen_type_null(&mut schema);
                }
                attach_description(&mut schema, &n.meta);
                Ok(Value::Object(schema))
            }
            PropertyNode::Collection(n) => {
                let items = match &n.items {
                    CollectionItems::Class { class } => {
                        if inline {
                            catalog.resolve_validation(class, None)?
                        } else {
                            let mut item = Map::new();
                            item.insert(
                                "$ref".to_string(),
                                Value::String(ref_string(class, None)),
                            );
                            Value::Object(item)
                        }
                    }
                    CollectionItems::Union { one_of } => {
                        union_schema(one_of, config, catalog, inline)?
                    }
                    CollectionItems::Inline {
                        properties,
                        additional_properties,
                    } => object_schema(
                        properties,
                        None,
                        *additional_properties,
                        config,
                        catalog,
                        inline,
                    )?,
                };
                let mut schema = Map::new();
                schema.insert("type".to_string(), Value::String("array".to_string()));
                schema.insert("items".to_string(), items);
                if n.meta.nullable {
                    widen_type_null(&mut schema);
                }
                attach_description(&mut schema, &n.meta);
                Ok(Value::Object(schema))
            }
            PropertyNode::Reference(n) => {
                let target = if inline {
                    catalog.resolve_validation(&n.class, n.property.as_deref())?
                } else {
                    let mut reference = Map::new();
                    reference.insert(
                        "$ref".to_string(),
                        Value::String(ref_string(&n.class, n.property.as_deref())),
                    );
                    attach_description(&mut reference, &n.meta);
                    Value::Object(reference)
                };
                if n.meta.nullable {
                    let mut schema = Map::new();
                    schema.insert(
                        "oneOf".to_string(),
                        Value::Array(vec![target, null_schema()]),
                    );
                    Ok(Value::Object(schema))
                } else {
                    Ok(target)
                }
            }
            PropertyNode::OneOf(n) => union_schema(n, config, catalog, inline),
        }
    }
}

fn named(name: impl Into<String>) -> NodeMeta {
    NodeMeta {
        name: name.into(),
        ..NodeMeta::default()
    }
}

fn attach_description(schema: &mut Map<String, Value>, meta: &NodeMeta) {
    if let Some(text) = &meta.description {
        schema.insert("description".to_string(), Value::String(text.clone()));
    }
}

fn null_schema() -> Value {
    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("null".to_string()));
    Value::Object(schema)
}

/// Widen `"type": "t"` to `"type": ["t", "null"]`.
fn widen_type_null(schema: &mut Map<String, Value>) {
    if let Some(Value::String(ty)) = schema.get("type").cloned() {
        schema.insert(
            "type".to_string(),
            Value::Array(vec![Value::String(ty), Value::String("null".to_string())]),
        );
    }
}

fn validate_union(union: &OneOfNode, config: &CompileConfig) -> Result<(), SchemaError> {
    for (variant_name, variant) in &union.variants {
        if let Variant::Inline { properties, .. } = variant {
            for child in properties {
                if matches!(child, PropertyNode::OneOf(_)) {
                    return Err(SchemaError::UnsupportedNode {
                        name: union.meta.name.clone(),
                        message: format!(
                            "variant \"{}\" nests another union, which is not supported",
                            variant_name
                        ),
                    });
                }
                child.validate(config)?;
            }
        }
    }
    Ok(())
}

/// Schema for an object scope: `properties` in child order, `required` from
/// flag-required children, `dependentRequired` from list-required children.
pub(crate) fn object_schema(
    properties: &[PropertyNode],
    description: Option<&str>,
    additional_properties: Option<bool>,
    config: &CompileConfig,
    catalog: &SchemaCatalog,
    inline: bool,
) -> Result<Value, SchemaError> {
    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    if let Some(text) = description {
        schema.insert("description".to_string(), Value::String(text.to_string()));
    }

    let mut props = Map::new();
    let mut required = Vec::new();
    let mut dependent = Map::new();
    for child in properties {
        props.insert(child.name().to_string(), child.emit(config, catalog, inline)?);
        match &child.meta().required {
            Requirement::Flag(true) => required.push(Value::String(child.name().to_string())),
            Requirement::Flag(false) => {}
            Requirement::DependsOn(siblings) => {
                dependent.insert(
                    child.name().to_string(),
                    Value::Array(siblings.iter().cloned().map(Value::String).collect()),
                );
            }
        }
    }
    schema.insert("properties".to_string(), Value::Object(props));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    if !dependent.is_empty() {
        schema.insert("dependentRequired".to_string(), Value::Object(dependent));
    }
    schema.insert(
        "additionalProperties".to_string(),
        Value::Bool(additional_properties.unwrap_or(config.additional_properties)),
    );
    Ok(Value::Object(schema))
}

/// Schema for a union: `oneOf` over the variants (+ null when nullable),
/// plus a `discriminator` block unless emitting for validation.
///
/// The discriminator `mapping` lists reference variants only: inline
/// objects have no `$ref` to point at, though they stay in `oneOf`.
pub(crate) fn union_schema(
    union: &OneOfNode,
    config: &CompileConfig,
    catalog: &SchemaCatalog,
    inline: bool,
) -> Result<Value, SchemaError> {
    let mut branches = Vec::new();
    for variant in union.variants.values() {
        branches.push(variant_schema(variant, config, catalog, inline)?);
    }
    if union.meta.nullable {
        branches.push(null_schema());
    }

    let mut schema = Map::new();
    schema.insert("oneOf".to_string(), Value::Array(branches));
    attach_description(&mut schema, &union.meta);

    if let Some(field) = &union.discriminator {
        if !inline {
            let mut mapping = Map::new();
            for (name, variant) in &union.variants {
                if let Variant::Reference { class } = variant {
                    mapping.insert(name.clone(), Value::String(ref_string(class, None)));
                }
            }
            let mut block = Map::new();
            block.insert("propertyName".to_string(), Value::String(field.clone()));
            block.insert("mapping".to_string(), Value::Object(mapping));
            schema.insert("discriminator".to_string(), Value::Object(block));
        }
    }
    Ok(Value::Object(schema))
}

/// Schema of one union variant.
pub(crate) fn variant_schema(
    variant: &Variant,
    config: &CompileConfig,
    catalog: &SchemaCatalog,
    inline: bool,
) -> Result<Value, SchemaError> {
    match variant {
        Variant::Reference { class } => {
            if inline {
                catalog.resolve_validation(class, None)
            } else {
                let mut reference = Map::new();
                reference.insert("$ref".to_string(), Value::String(ref_string(class, None)));
                Ok(Value::Object(reference))
            }
        }
        Variant::Inline {
            properties,
            additional_properties,
        } => object_schema(
            properties,
            None,
            *additional_properties,
            config,
            catalog,
            inline,
        ),
    }
}
