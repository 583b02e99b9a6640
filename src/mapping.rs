//! Compiled path mappings.
//!
//! A prepared version owns a [`Mapping`]: the table that drives the runtime
//! [`Transformer`](crate::transform::Transformer). Paths are slash-delimited;
//! a segment suffixed `[]` marks per-element array iteration. The compiled
//! form is a tagged union (flat, single union, multiple unions) rather than
//! a string-keyed table with `_`-prefixed metadata; [`Mapping::to_document`]
//! still emits the legacy keyed form for interop.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::catalog::SchemaCatalog;
use crate::config::CompileConfig;
use crate::error::SchemaError;
use crate::node::{variant_schema, CollectionItems, NodeMeta, OneOfNode, PropertyNode, Variant};

/// Flat mapping rows: source path -> target path, in compilation order.
pub type Rows = IndexMap<String, String>;

/// How a union picks its variant at runtime.
#[derive(Debug, Clone)]
pub enum Selector {
    /// Read the value at `path` and select the sub-table keyed by it.
    Discriminator { path: String },
    /// Validate the candidate sub-document against every variant schema;
    /// exactly one must match. Insertion order is the reporting order.
    Inference { schemas: IndexMap<String, Value> },
}

/// Null handling for a nullable union.
#[derive(Debug, Clone)]
pub struct NullableUnion {
    /// Source path governed by the null check; `None` means the whole
    /// document (root-level union).
    pub path: Option<String>,
    /// Where the null lands when the union's `map` redirects it; defaults
    /// to `path`.
    pub target_path: Option<String>,
}

/// One compiled union: per-variant rows plus selection metadata.
#[derive(Debug, Clone)]
pub struct UnionMapping {
    /// Source path of the union value; `None` for a root-level union. A
    /// `[]` marker inside means the variant is resolved per array element.
    pub path: Option<String>,
    /// Resolved target prefix; `None` when it mirrors `path`.
    pub target_path: Option<String>,
    pub required: bool,
    pub selector: Selector,
    pub nullable: Option<NullableUnion>,
    /// Variant name -> full-path rows, in declaration order.
    pub variants: IndexMap<String, Rows>,
}

/// A compiled mapping table.
#[derive(Debug, Clone)]
pub enum Mapping {
    Flat(Rows),
    /// The combination case: the whole version is one unnamed union.
    Union(UnionMapping),
    /// Independent unions among shared non-polymorphic rows.
    MultiUnion { shared: Rows, unions: Vec<UnionMapping> },
}

/// Join two path fragments, tolerating empty prefixes.
pub(crate) fn join(prefix: &str, rest: &str) -> String {
    if prefix.is_empty() {
        rest.to_string()
    } else if rest.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, rest)
    }
}

/// Resolve a node's target prefix from its `map` override: absolute paths
/// replace the prefix, relative paths extend it, absent mirrors the name.
pub(crate) fn resolve_target(value_prefix: &str, meta: &NodeMeta) -> String {
    match meta.map.as_deref() {
        None => join(value_prefix, &meta.name),
        Some("/") => String::new(),
        Some(abs) if abs.starts_with('/') => abs[1..].to_string(),
        Some(rel) => join(value_prefix, rel),
    }
}

/// Compile the mapping for a version's property set.
///
/// A single unnamed union is the combination case and compiles to
/// [`Mapping::Union`]; named unions compile to [`Mapping::MultiUnion`]
/// alongside the shared rows; anything else is flat.
pub(crate) fn compile(
    properties: &[PropertyNode],
    config: &CompileConfig,
    catalog: &SchemaCatalog,
) -> Result<Mapping, SchemaError> {
    if let [PropertyNode::OneOf(union)] = properties {
        if union.meta.name.is_empty() {
            let target = resolve_target("", &union.meta);
            return Ok(Mapping::Union(compile_union(
                union, "", &target, config, catalog,
            )?));
        }
    }

    let mut rows = Rows::new();
    let mut unions = Vec::new();
    for node in properties {
        compile_node(node, "", "", &mut rows, &mut unions, config, catalog)?;
    }
    if unions.is_empty() {
        Ok(Mapping::Flat(rows))
    } else {
        Ok(Mapping::MultiUnion { shared: rows, unions })
    }
}

fn compile_node(
    node: &PropertyNode,
    key_prefix: &str,
    value_prefix: &str,
    rows: &mut Rows,
    unions: &mut Vec<UnionMapping>,
    config: &CompileConfig,
    catalog: &SchemaCatalog,
) -> Result<(), SchemaError> {
    let meta = node.meta();
    let source = join(key_prefix, &meta.name);
    let target = resolve_target(value_prefix, meta);

    match node {
        PropertyNode::Field(_)
        | PropertyNode::Const(_)
        | PropertyNode::Enum(_)
        | PropertyNode::Array(_) => {
            rows.insert(source, target);
        }
        PropertyNode::Object(n) => {
            for child in &n.properties {
                compile_node(child, &source, &target, rows, unions, config, catalog)?;
            }
        }
        PropertyNode::Reference(n) => match &n.property {
            // One scalar property, no further nesting: a single direct row.
            // A property with nested rows of its own cannot collapse this
            // way without losing the class's inner remapping.
            Some(prop) => {
                let class = catalog.get(&n.class)?;
                let nested = format!("{}/", prop);
                if class.mapping.keys().any(|src| src.starts_with(&nested)) {
                    return Err(SchemaError::UnsupportedNode {
                        name: n.meta.name.clone(),
                        message: format!(
                            "reference narrows to \"{}\" of class \"{}\", which is not a scalar property",
                            prop, n.class
                        ),
                    });
                }
                if !class.mapping.contains_key(prop.as_str()) {
                    return Err(SchemaError::PropertyNotFound {
                        name: format!("{}/{}", n.class, prop),
                    });
                }
                rows.insert(source, target);
            }
            None => {
                let class = catalog.get(&n.class)?;
                for (src, tgt) in &class.mapping {
                    rows.insert(join(&source, src), join(&target, tgt));
                }
            }
        },
        PropertyNode::Collection(n) => {
            let each_source = format!("{}[]", source);
            let each_target = format!("{}[]", target);
            match &n.items {
                CollectionItems::Class { class } => {
                    let class = catalog.get(class)?;
                    for (src, tgt) in &class.mapping {
                        rows.insert(join(&each_source, src), join(&each_target, tgt));
                    }
                }
                CollectionItems::Inline { properties, .. } => {
                    for child in properties {
                        compile_node(
                            child,
                            &each_source,
                            &each_target,
                            rows,
                            unions,
                            config,
                            catalog,
                        )?;
                    }
                }
                CollectionItems::Union { one_of } => {
                    unions.push(compile_union(
                        one_of,
                        &each_source,
                        &each_target,
                        config,
                        catalog,
                    )?);
                }
            }
        }
        PropertyNode::OneOf(union) => {
            unions.push(compile_union(union, &source, &target, config, catalog)?);
        }
    }
    Ok(())
}

/// Compile a union into per-variant row tables plus selection metadata.
fn compile_union(
    union: &OneOfNode,
    source: &str,
    target: &str,
    config: &CompileConfig,
    catalog: &SchemaCatalog,
) -> Result<UnionMapping, SchemaError> {
    let mut variants = IndexMap::new();
    for (variant_name, variant) in &union.variants {
        let mut rows = Rows::new();
        match variant {
            Variant::Reference { class } => {
                let class = catalog.get(class)?;
                for (src, tgt) in &class.mapping {
                    rows.insert(join(source, src), join(target, tgt));
                }
            }
            Variant::Inline { properties, .. } => {
                let mut nested = Vec::new();
                for child in properties {
                    compile_node(child, source, target, &mut rows, &mut nested, config, catalog)?;
                }
            }
        }
        variants.insert(variant_name.clone(), rows);
    }

    let selector = match &union.discriminator {
        Some(field) => Selector::Discriminator {
            path: join(source, field),
        },
        None => {
            let mut schemas = IndexMap::new();
            for (variant_name, variant) in &union.variants {
                schemas.insert(
                    variant_name.clone(),
                    variant_schema(variant, config, catalog, true)?,
                );
            }
            Selector::Inference { schemas }
        }
    };

    let nullable = union.meta.nullable.then(|| NullableUnion {
        path: (!source.is_empty()).then(|| source.to_string()),
        target_path: (target != source).then(|| target.to_string()),
    });

    Ok(UnionMapping {
        path: (!source.is_empty()).then(|| source.to_string()),
        target_path: (target != source).then(|| target.to_string()),
        required: union.meta.required.is_required(),
        selector,
        nullable,
        variants,
    })
}

fn swap(rows: &Rows) -> Rows {
    rows.iter().map(|(s, t)| (t.clone(), s.clone())).collect()
}

/// Remap a selector path through forward rows when a row covers it.
fn remap(path: &str, unions_rows: &IndexMap<String, Rows>) -> String {
    for rows in unions_rows.values() {
        if let Some(target) = rows.get(path) {
            return target.clone();
        }
    }
    path.to_string()
}

impl UnionMapping {
    fn invert(&self) -> UnionMapping {
        let selector = match &self.selector {
            Selector::Discriminator { path } => Selector::Discriminator {
                path: remap(path, &self.variants),
            },
            Selector::Inference { schemas } => Selector::Inference {
                schemas: schemas.clone(),
            },
        };
        UnionMapping {
            path: self.target_path.clone().or_else(|| self.path.clone()),
            target_path: self.path.clone().filter(|_| self.target_path.is_some()),
            required: self.required,
            selector,
            nullable: self.nullable.as_ref().map(|n| NullableUnion {
                path: n.target_path.clone().or_else(|| n.path.clone()),
                target_path: n.path.clone().filter(|_| n.target_path.is_some()),
            }),
            variants: self
                .variants
                .iter()
                .map(|(name, rows)| (name.clone(), swap(rows)))
                .collect(),
        }
    }
}

impl Mapping {
    /// Structural inverse: every source/target pair swapped, selector and
    /// nullable paths remapped through the swapped rows where covered.
    pub fn invert(&self) -> Mapping {
        match self {
            Mapping::Flat(rows) => Mapping::Flat(swap(rows)),
            Mapping::Union(union) => Mapping::Union(union.invert()),
            Mapping::MultiUnion { shared, unions } => Mapping::MultiUnion {
                shared: swap(shared),
                unions: unions.iter().map(UnionMapping::invert).collect(),
            },
        }
    }

    /// Flat rows, if this mapping has no polymorphic parts.
    pub fn flat_rows(&self) -> Option<&Rows> {
        match self {
            Mapping::Flat(rows) => Some(rows),
            _ => None,
        }
    }

    /// Fail fast if two distinct source paths compile to the same target.
    ///
    /// Variants of one union are alternatives, so each variant is checked
    /// jointly with the shared rows but independently of its siblings.
    /// Distinct unions are all resolved and merged at runtime, so every
    /// cross-union variant pair is checked against each other.
    pub fn check_duplicate_targets(&self) -> Result<(), SchemaError> {
        fn check(tables: &[&Rows]) -> Result<(), SchemaError> {
            let mut seen: HashMap<&str, &str> = HashMap::new();
            for rows in tables {
                for (source, target) in rows.iter() {
                    if let Some(first) = seen.get(target.as_str()) {
                        if *first != source.as_str() {
                            return Err(SchemaError::DuplicateTarget {
                                target: target.clone(),
                                first: first.to_string(),
                                second: source.clone(),
                            });
                        }
                    } else {
                        seen.insert(target, source);
                    }
                }
            }
            Ok(())
        }

        match self {
            Mapping::Flat(rows) => check(&[rows]),
            Mapping::Union(union) => {
                for rows in union.variants.values() {
                    check(&[rows])?;
                }
                Ok(())
            }
            Mapping::MultiUnion { shared, unions } => {
                check(&[shared])?;
                for union in unions {
                    for rows in union.variants.values() {
                        check(&[shared, rows])?;
                    }
                }
                for (index, first) in unions.iter().enumerate() {
                    for second in &unions[index + 1..] {
                        for a in first.variants.values() {
                            for b in second.variants.values() {
                                check(&[a, b])?;
                            }
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Legacy string-keyed document form: plain rows, or per-variant
    /// sub-tables with `_discriminator` / `_variant_schemas` /
    /// `_variant_path` / `_nullable` metadata keys, or an `_oneOfs` list.
    ///
    /// A root-level discriminated union with no prefix omits
    /// `_discriminator`: the caller already knows the context.
    pub fn to_document(&self) -> Value {
        match self {
            Mapping::Flat(rows) => rows_document(rows),
            Mapping::Union(union) => union_document(union),
            Mapping::MultiUnion { shared, unions } => {
                if unions.len() == 1 && shared.is_empty() {
                    return union_document(&unions[0]);
                }
                let mut doc = Map::new();
                for (source, target) in shared {
                    doc.insert(source.clone(), Value::String(target.clone()));
                }
                doc.insert(
                    "_oneOfs".to_string(),
                    Value::Array(unions.iter().map(union_document).collect()),
                );
                Value::Object(doc)
            }
        }
    }
}

fn rows_document(rows: &Rows) -> Value {
    let mut doc = Map::new();
    for (source, target) in rows {
        doc.insert(source.clone(), Value::String(target.clone()));
    }
    Value::Object(doc)
}

fn union_document(union: &UnionMapping) -> Value {
    let mut doc = Map::new();
    for (name, rows) in &union.variants {
        doc.insert(name.clone(), rows_document(rows));
    }
    match &union.selector {
        Selector::Discriminator { path } => {
            if union.path.is_some() {
                doc.insert("_discriminator".to_string(), Value::String(path.clone()));
            }
        }
        Selector::Inference { schemas } => {
            let mut by_name = Map::new();
            for (name, schema) in schemas {
                by_name.insert(name.clone(), schema.clone());
            }
            doc.insert("_variant_schemas".to_string(), Value::Object(by_name));
            if let Some(path) = &union.path {
                doc.insert("_variant_path".to_string(), Value::String(path.clone()));
            }
        }
    }
    if let Some(nullable) = &union.nullable {
        doc.insert("_nullable".to_string(), Value::Bool(true));
        if let Some(path) = &nullable.path {
            doc.insert("_nullable_path".to_string(), Value::String(path.clone()));
        }
        if let Some(target) = &nullable.target_path {
            doc.insert(
                "_nullable_target_path".to_string(),
                Value::String(target.clone()),
            );
        }
    }
    Value::Object(doc)
}
