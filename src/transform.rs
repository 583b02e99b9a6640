//! The runtime mapping engine.
//!
//! A [`Transformer`] is built once from a compiled [`Mapping`] and reused
//! for every call. Construction pre-parses every path into segments
//! (cached by raw string) and pre-builds every `jsonschema` validator
//! needed for inference, so the per-call path does no parsing and no
//! validator construction. A built transformer is immutable and safe to
//! share across threads.
//!
//! Extraction is three-valued: found-with-value, found-but-null, and
//! not-found. Not-found leaves are pruned from the output; an explicitly
//! null ancestor collapses the whole corresponding target subtree to null
//! instead of expanding it field by field.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{SchemaError, TransformError};
use crate::mapping::{Mapping, Rows, Selector, UnionMapping};

/// One parsed path segment; `each` marks the `[]` array suffix.
#[derive(Debug, Clone, PartialEq)]
struct Segment {
    key: String,
    each: bool,
}

type Path = Vec<Segment>;

fn parse_path(raw: &str) -> Path {
    raw.split('/')
        .filter(|part| !part.is_empty())
        .map(|part| match part.strip_suffix("[]") {
            Some(key) => Segment {
                key: key.to_string(),
                each: true,
            },
            None => Segment {
                key: part.to_string(),
                each: false,
            },
        })
        .collect()
}

/// Construction-time cache: each raw path string is parsed once.
#[derive(Default)]
struct PathCache(HashMap<String, Path>);

impl PathCache {
    fn get(&mut self, raw: &str) -> Path {
        if let Some(path) = self.0.get(raw) {
            return path.clone();
        }
        let path = parse_path(raw);
        self.0.insert(raw.to_string(), path.clone());
        path
    }
}

struct ResolvedRows(Vec<(Path, Path)>);

enum ResolvedSelector {
    Discriminator { raw: String, path: Path },
    Inference { variants: Vec<(String, jsonschema::Validator)> },
}

struct ResolvedNullable {
    path: Path,
    target: Path,
}

struct ResolvedUnion {
    /// Source path of the union value; empty means the whole document.
    path: Path,
    /// Target path of the union value (defaults to `path`).
    target: Path,
    required: bool,
    selector: ResolvedSelector,
    nullable: Option<ResolvedNullable>,
    variants: IndexMap<String, ResolvedRows>,
    /// Set when `path` contains an array marker: the variant is resolved
    /// per element rather than once for the whole document.
    per_element: bool,
}

enum Plan {
    Flat(ResolvedRows),
    Unions {
        shared: ResolvedRows,
        unions: Vec<ResolvedUnion>,
    },
}

/// Executes a compiled mapping against documents.
pub struct Transformer {
    plan: Plan,
}

impl Transformer {
    /// Build a transformer over a compiled mapping.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::VariantSchema` if an inference variant's
    /// schema cannot be compiled into a validator.
    pub fn new(mapping: &Mapping) -> Result<Self, SchemaError> {
        let mut cache = PathCache::default();
        let plan = match mapping {
            Mapping::Flat(rows) => Plan::Flat(resolve_rows(rows, &mut cache)),
            Mapping::Union(union) => Plan::Unions {
                shared: ResolvedRows(Vec::new()),
                unions: vec![resolve_union(union, &mut cache)?],
            },
            Mapping::MultiUnion { shared, unions } => Plan::Unions {
                shared: resolve_rows(shared, &mut cache),
                unions: unions
                    .iter()
                    .map(|u| resolve_union(u, &mut cache))
                    .collect::<Result<_, _>>()?,
            },
        };
        Ok(Transformer { plan })
    }

    /// Transform a document through the compiled mapping.
    pub fn transform(&self, doc: &Value) -> Result<Value, TransformError> {
        let mut out = OutNode::Absent;
        match &self.plan {
            Plan::Flat(rows) => apply_rows(doc, rows, &mut out),
            Plan::Unions { shared, unions } => {
                apply_rows(doc, shared, &mut out);
                for union in unions {
                    apply_union(doc, union, &mut out)?;
                }
            }
        }
        Ok(collapse(out).unwrap_or_else(|| Value::Object(Map::new())))
    }
}

fn resolve_rows(rows: &Rows, cache: &mut PathCache) -> ResolvedRows {
    ResolvedRows(
        rows.iter()
            .map(|(src, tgt)| (cache.get(src), cache.get(tgt)))
            .collect(),
    )
}

fn resolve_union(union: &UnionMapping, cache: &mut PathCache) -> Result<ResolvedUnion, SchemaError> {
    let path = union.path.as_deref().map(|p| cache.get(p)).unwrap_or_default();
    let target = union
        .target_path
        .as_deref()
        .map(|p| cache.get(p))
        .unwrap_or_else(|| path.clone());

    let selector = match &union.selector {
        Selector::Discriminator { path } => ResolvedSelector::Discriminator {
            raw: path.clone(),
            path: cache.get(path),
        },
        Selector::Inference { schemas } => {
            let mut variants = Vec::with_capacity(schemas.len());
            for (name, schema) in schemas {
                let validator =
                    jsonschema::validator_for(schema).map_err(|e| SchemaError::VariantSchema {
                        variant: name.clone(),
                        message: e.to_string(),
                    })?;
                variants.push((name.clone(), validator));
            }
            ResolvedSelector::Inference { variants }
        }
    };

    let nullable = union.nullable.as_ref().map(|n| {
        let null_path = n.path.as_deref().map(|p| cache.get(p)).unwrap_or_default();
        let null_target = n
            .target_path
            .as_deref()
            .map(|p| cache.get(p))
            .unwrap_or_else(|| null_path.clone());
        ResolvedNullable {
            path: null_path,
            target: null_target,
        }
    });

    let per_element = path.iter().any(|seg| seg.each);
    Ok(ResolvedUnion {
        per_element,
        target,
        required: union.required,
        selector,
        nullable,
        variants: union
            .variants
            .iter()
            .map(|(name, rows)| (name.clone(), resolve_rows(rows, cache)))
            .collect(),
        path,
    })
}

// --- extraction ---

/// Result of extracting a path from a document.
enum Extracted {
    /// The path is not present; the target is simply omitted.
    Absent,
    /// A null was met with this many segments still unconsumed. Zero
    /// means the leaf itself is null; more means a null ancestor, which
    /// collapses the target subtree truncated by the same count.
    NullAt(usize),
    Value(Value),
    /// Per-element results of an array-marker segment.
    Each(Vec<Extracted>),
}

fn fetch(doc: &Value, segs: &[Segment]) -> Extracted {
    if doc.is_null() {
        return Extracted::NullAt(segs.len());
    }
    let Some((seg, rest)) = segs.split_first() else {
        return Extracted::Value(doc.clone());
    };
    let Some(map) = doc.as_object() else {
        return Extracted::Absent;
    };
    let Some(value) = map.get(&seg.key) else {
        return Extracted::Absent;
    };
    if seg.each {
        match value {
            Value::Array(items) => {
                Extracted::Each(items.iter().map(|item| fetch(item, rest)).collect())
            }
            Value::Null => Extracted::NullAt(rest.len()),
            _ => Extracted::Absent,
        }
    } else {
        fetch(value, rest)
    }
}

// --- output construction ---

/// Intermediate output tree. `Absent` marks not-found placeholders that
/// are pruned during collapse.
enum OutNode {
    Absent,
    Null,
    Leaf(Value),
    Map(IndexMap<String, OutNode>),
    Seq(Vec<OutNode>),
}

impl OutNode {
    /// Descend one map key, creating the map on demand. Returns `None`
    /// when the write must be skipped (a null or leaf already won).
    fn entry(&mut self, key: &str) -> Option<&mut OutNode> {
        if matches!(self, OutNode::Absent) {
            *self = OutNode::Map(IndexMap::new());
        }
        match self {
            OutNode::Map(map) => Some(map.entry(key.to_string()).or_insert(OutNode::Absent)),
            _ => None,
        }
    }

    /// Descend into the index-aligned sequence under `key`, growing it to
    /// at least `len` slots.
    fn seq_entry(&mut self, key: &str, len: usize) -> Option<&mut Vec<OutNode>> {
        let slot = self.entry(key)?;
        if matches!(slot, OutNode::Absent) {
            *slot = OutNode::Seq(Vec::new());
        }
        match slot {
            OutNode::Seq(items) => {
                while items.len() < len {
                    items.push(OutNode::Absent);
                }
                Some(items)
            }
            _ => None,
        }
    }
}

fn inject(node: &mut OutNode, segs: &[Segment], extracted: Extracted) {
    match extracted {
        Extracted::Absent => {}
        Extracted::NullAt(skip) => {
            let keep = segs.len().saturating_sub(skip);
            set_null(node, &segs[..keep]);
        }
        Extracted::Value(value) => set_value(node, segs, value),
        Extracted::Each(items) => match segs.split_first() {
            Some((seg, rest)) if !seg.each => {
                if let Some(child) = node.entry(&seg.key) {
                    inject(child, rest, Extracted::Each(items));
                }
            }
            Some((seg, rest)) => {
                if let Some(slots) = node.seq_entry(&seg.key, items.len()) {
                    for (slot, item) in slots.iter_mut().zip(items) {
                        inject(slot, rest, item);
                    }
                }
            }
            // Marker mismatch between source and target: drop the row.
            None => {}
        },
    }
}

fn set_value(node: &mut OutNode, segs: &[Segment], value: Value) {
    let Some((seg, rest)) = segs.split_first() else {
        if matches!(node, OutNode::Absent) {
            *node = OutNode::Leaf(value);
        }
        return;
    };
    if let Some(child) = node.entry(&seg.key) {
        set_value(child, rest, value);
    }
}

/// Write an explicit null. A marker segment ends the walk: a null array
/// cannot be expanded per element, so the null lands on the key itself.
fn set_null(node: &mut OutNode, segs: &[Segment]) {
    let Some((seg, rest)) = segs.split_first() else {
        if matches!(node, OutNode::Absent) {
            *node = OutNode::Null;
        }
        return;
    };
    if let Some(child) = node.entry(&seg.key) {
        if seg.each || rest.is_empty() {
            if matches!(child, OutNode::Absent) {
                *child = OutNode::Null;
            }
        } else {
            set_null(child, rest);
        }
    }
}

/// Collapse the intermediate tree, pruning every not-found marker and
/// every constructed container left with nothing but not-found markers.
fn collapse(node: OutNode) -> Option<Value> {
    match node {
        OutNode::Absent => None,
        OutNode::Null => Some(Value::Null),
        OutNode::Leaf(value) => Some(value),
        OutNode::Map(map) => {
            let out: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, child)| collapse(child).map(|v| (key, v)))
                .collect();
            if out.is_empty() {
                None
            } else {
                Some(Value::Object(out))
            }
        }
        OutNode::Seq(items) => {
            let out: Vec<Value> = items.into_iter().filter_map(collapse).collect();
            if out.is_empty() {
                None
            } else {
                Some(Value::Array(out))
            }
        }
    }
}

// --- mode execution ---

fn apply_rows(doc: &Value, rows: &ResolvedRows, out: &mut OutNode) {
    for (source, target) in &rows.0 {
        inject(out, target, fetch(doc, source));
    }
}

fn apply_union(doc: &Value, union: &ResolvedUnion, out: &mut OutNode) -> Result<(), TransformError> {
    // Explicit null short-circuits variant resolution entirely.
    if let Some(nullable) = &union.nullable {
        if matches!(fetch(doc, &nullable.path), Extracted::NullAt(0)) {
            set_null(out, &nullable.target);
            return Ok(());
        }
    }
    if union.per_element {
        apply_union_per_element(doc, union, out)
    } else {
        match select_variant(doc, union)? {
            Some(rows) => {
                apply_rows(doc, rows, out);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Pick the variant rows for a whole-document union, or `None` when the
/// optional union is simply absent from the input.
fn select_variant<'a>(
    doc: &Value,
    union: &'a ResolvedUnion,
) -> Result<Option<&'a ResolvedRows>, TransformError> {
    match &union.selector {
        ResolvedSelector::Discriminator { raw, path } => match fetch(doc, path) {
            Extracted::Value(value) => {
                let key = discriminator_key(&value);
                union
                    .variants
                    .get(&key)
                    .map(Some)
                    .ok_or_else(|| TransformError::UnknownVariant {
                        path: raw.clone(),
                        value: key,
                    })
            }
            _ if union.required => Err(TransformError::MissingDiscriminator { path: raw.clone() }),
            _ => Ok(None),
        },
        ResolvedSelector::Inference { variants } => {
            let candidate = if union.path.is_empty() {
                Extracted::Value(doc.clone())
            } else {
                fetch(doc, &union.path)
            };
            match candidate {
                Extracted::Value(value) => {
                    infer_variant(&value, variants).map(|name| union.variants.get(name))
                }
                _ if union.required => Err(TransformError::NoVariantMatch {
                    candidates: variants.iter().map(|(name, _)| name.clone()).collect(),
                }),
                _ => Ok(None),
            }
        }
    }
}

/// Validate a candidate against every variant schema; exactly one match
/// wins. Zero or several matches is a hard error, never resolved by
/// precedence.
fn infer_variant<'a>(
    value: &Value,
    variants: &'a [(String, jsonschema::Validator)],
) -> Result<&'a str, TransformError> {
    let matches: Vec<&str> = variants
        .iter()
        .filter(|(_, validator)| validator.is_valid(value))
        .map(|(name, _)| name.as_str())
        .collect();
    match matches.as_slice() {
        [single] => Ok(single),
        [] => Err(TransformError::NoVariantMatch {
            candidates: variants.iter().map(|(name, _)| name.clone()).collect(),
        }),
        several => Err(TransformError::AmbiguousVariant {
            matches: several.iter().map(|name| name.to_string()).collect(),
        }),
    }
}

/// Resolve the variant independently for every element of the governed
/// array, so heterogeneous collections transform without cross-element
/// interference.
fn apply_union_per_element(
    doc: &Value,
    union: &ResolvedUnion,
    out: &mut OutNode,
) -> Result<(), TransformError> {
    let Some(marker) = union.path.iter().position(|seg| seg.each) else {
        return Ok(());
    };
    let elements = match fetch(doc, &union.path) {
        Extracted::Each(items) => items,
        Extracted::Absent | Extracted::NullAt(_) => return Ok(()),
        Extracted::Value(_) => return Ok(()),
    };

    let total = elements.len();
    for (index, element) in elements.into_iter().enumerate() {
        let element = match element {
            Extracted::Value(value) => value,
            Extracted::NullAt(_) if union.nullable.is_some() => {
                inject_element(out, &union.target, index, total, Extracted::NullAt(0));
                continue;
            }
            _ => continue,
        };

        let rows = match &union.selector {
            ResolvedSelector::Discriminator { raw, path } => {
                match fetch(&element, &path[marker + 1..]) {
                    Extracted::Value(value) => {
                        let key = discriminator_key(&value);
                        union.variants.get(&key).ok_or_else(|| {
                            TransformError::UnknownVariant {
                                path: raw.clone(),
                                value: key,
                            }
                        })?
                    }
                    _ if union.required => {
                        return Err(TransformError::MissingDiscriminator { path: raw.clone() })
                    }
                    _ => continue,
                }
            }
            ResolvedSelector::Inference { variants } => {
                let name = infer_variant(&element, variants)?;
                match union.variants.get(name) {
                    Some(rows) => rows,
                    None => continue,
                }
            }
        };

        for (source, target) in &rows.0 {
            let extracted = fetch(&element, &source[marker + 1..]);
            inject_element(out, target, index, total, extracted);
        }
    }
    Ok(())
}

/// Inject into one index-aligned slot of the array at the target's first
/// marker segment.
fn inject_element(
    out: &mut OutNode,
    target: &[Segment],
    index: usize,
    total: usize,
    extracted: Extracted,
) {
    let Some((seg, rest)) = target.split_first() else {
        return;
    };
    if seg.each {
        if let Some(slots) = out.seq_entry(&seg.key, total) {
            inject(&mut slots[index], rest, extracted);
        }
    } else if let Some(child) = out.entry(&seg.key) {
        inject_element(child, rest, index, total, extracted);
    }
}

/// Discriminator values are matched as strings; non-string scalars match
/// on their raw JSON text.
fn discriminator_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{NullableUnion, Selector};
    use serde_json::json;

    fn rows(pairs: &[(&str, &str)]) -> Rows {
        pairs
            .iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn parse_path_segments() {
        let segs = parse_path("pets[]/name");
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].key, "pets");
        assert!(segs[0].each);
        assert_eq!(segs[1].key, "name");
        assert!(!segs[1].each);

        assert!(parse_path("").is_empty());
    }

    #[test]
    fn flat_transform_extracts_and_injects() {
        let mapping = Mapping::Flat(rows(&[
            ("name", "name"),
            ("address/street", "home/street"),
            ("address/city", "home/city"),
        ]));
        let t = Transformer::new(&mapping).unwrap();

        let out = t
            .transform(&json!({
                "name": "Ada",
                "address": { "street": "Main St", "city": "Springfield" }
            }))
            .unwrap();
        assert_eq!(
            out,
            json!({
                "name": "Ada",
                "home": { "street": "Main St", "city": "Springfield" }
            })
        );
    }

    #[test]
    fn absent_fields_are_pruned_not_nulled() {
        let mapping = Mapping::Flat(rows(&[
            ("name", "name"),
            ("address/street", "home/street"),
        ]));
        let t = Transformer::new(&mapping).unwrap();

        let out = t.transform(&json!({ "name": "Ada" })).unwrap();
        assert_eq!(out, json!({ "name": "Ada" }));
        assert!(out.get("home").is_none());
    }

    #[test]
    fn null_ancestor_collapses_target_subtree() {
        let mapping = Mapping::Flat(rows(&[
            ("address/street", "home/street"),
            ("address/city", "home/city"),
        ]));
        let t = Transformer::new(&mapping).unwrap();

        let out = t.transform(&json!({ "address": null })).unwrap();
        assert_eq!(out, json!({ "home": null }));
    }

    #[test]
    fn null_leaf_stays_null_at_full_target() {
        let mapping = Mapping::Flat(rows(&[("address/street", "home/street")]));
        let t = Transformer::new(&mapping).unwrap();

        let out = t
            .transform(&json!({ "address": { "street": null } }))
            .unwrap();
        assert_eq!(out, json!({ "home": { "street": null } }));
    }

    #[test]
    fn array_rows_keep_index_alignment() {
        let mapping = Mapping::Flat(rows(&[
            ("items[]/sku", "lines[]/code"),
            ("items[]/qty", "lines[]/count"),
        ]));
        let t = Transformer::new(&mapping).unwrap();

        let out = t
            .transform(&json!({
                "items": [
                    { "sku": "a", "qty": 1 },
                    { "sku": "b" },
                    { "qty": 3 }
                ]
            }))
            .unwrap();
        assert_eq!(
            out,
            json!({
                "lines": [
                    { "code": "a", "count": 1 },
                    { "code": "b" },
                    { "count": 3 }
                ]
            })
        );
    }

    fn pet_union(discriminator: bool) -> UnionMapping {
        let mut variants = IndexMap::new();
        variants.insert(
            "dog".to_string(),
            rows(&[("type", "type"), ("name", "name"), ("bark", "bark")]),
        );
        variants.insert(
            "cat".to_string(),
            rows(&[("type", "type"), ("name", "name"), ("meow", "meow")]),
        );
        let selector = if discriminator {
            Selector::Discriminator {
                path: "type".to_string(),
            }
        } else {
            Selector::Inference {
                schemas: [
                    (
                        "dog".to_string(),
                        json!({
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "bark": { "type": "boolean" }
                            },
                            "required": ["bark"]
                        }),
                    ),
                    (
                        "cat".to_string(),
                        json!({
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "meow": { "type": "boolean" }
                            },
                            "required": ["meow"]
                        }),
                    ),
                ]
                .into_iter()
                .collect(),
            }
        };
        UnionMapping {
            path: None,
            target_path: None,
            required: true,
            selector,
            nullable: None,
            variants,
        }
    }

    #[test]
    fn discriminator_selects_variant() {
        let t = Transformer::new(&Mapping::Union(pet_union(true))).unwrap();
        let doc = json!({ "type": "dog", "name": "Rex", "bark": true });
        assert_eq!(t.transform(&doc).unwrap(), doc);
    }

    #[test]
    fn unknown_discriminator_value_errors() {
        let t = Transformer::new(&Mapping::Union(pet_union(true))).unwrap();
        let result = t.transform(&json!({ "type": "fish" }));
        assert!(matches!(
            result,
            Err(TransformError::UnknownVariant { value, .. }) if value == "fish"
        ));
    }

    #[test]
    fn missing_discriminator_on_required_union_errors() {
        let t = Transformer::new(&Mapping::Union(pet_union(true))).unwrap();
        let result = t.transform(&json!({ "name": "Rex" }));
        assert!(matches!(
            result,
            Err(TransformError::MissingDiscriminator { .. })
        ));
    }

    #[test]
    fn inference_selects_single_match() {
        let t = Transformer::new(&Mapping::Union(pet_union(false))).unwrap();
        let out = t
            .transform(&json!({ "name": "Rex", "bark": true }))
            .unwrap();
        assert_eq!(out, json!({ "name": "Rex", "bark": true }));
    }

    #[test]
    fn inference_ambiguity_names_competitors_in_order() {
        let t = Transformer::new(&Mapping::Union(pet_union(false))).unwrap();
        // Satisfies both: has bark and meow.
        let result = t.transform(&json!({ "bark": true, "meow": true }));
        match result {
            Err(TransformError::AmbiguousVariant { matches }) => {
                assert_eq!(matches, vec!["dog", "cat"]);
            }
            other => panic!("expected ambiguity error, got {:?}", other),
        }
    }

    #[test]
    fn inference_no_match_errors() {
        let t = Transformer::new(&Mapping::Union(pet_union(false))).unwrap();
        let result = t.transform(&json!({ "name": 42 }));
        assert!(matches!(result, Err(TransformError::NoVariantMatch { .. })));
    }

    #[test]
    fn nullable_union_short_circuits() {
        let mut union = pet_union(true);
        union.path = Some("pet".to_string());
        union.nullable = Some(NullableUnion {
            path: Some("pet".to_string()),
            target_path: None,
        });
        for rows in union.variants.values_mut() {
            *rows = rows
                .iter()
                .map(|(s, t)| (format!("pet/{}", s), format!("pet/{}", t)))
                .collect();
        }
        union.selector = Selector::Discriminator {
            path: "pet/type".to_string(),
        };
        let t = Transformer::new(&Mapping::Union(union)).unwrap();

        let out = t.transform(&json!({ "pet": null })).unwrap();
        assert_eq!(out, json!({ "pet": null }));
    }

    #[test]
    fn nullable_union_null_follows_the_remapped_target() {
        let mut union = pet_union(true);
        union.path = Some("pet".to_string());
        union.target_path = Some("animal".to_string());
        union.nullable = Some(NullableUnion {
            path: Some("pet".to_string()),
            target_path: Some("animal".to_string()),
        });
        for rows in union.variants.values_mut() {
            *rows = rows
                .iter()
                .map(|(s, t)| (format!("pet/{}", s), format!("animal/{}", t)))
                .collect();
        }
        union.selector = Selector::Discriminator {
            path: "pet/type".to_string(),
        };
        let t = Transformer::new(&Mapping::Union(union)).unwrap();

        let out = t.transform(&json!({ "pet": null })).unwrap();
        assert_eq!(out, json!({ "animal": null }));

        let out = t
            .transform(&json!({ "pet": { "type": "dog", "name": "Rex" } }))
            .unwrap();
        assert_eq!(out, json!({ "animal": { "type": "dog", "name": "Rex" } }));
    }

    #[test]
    fn per_element_union_resolves_each_item() {
        let mut variants = IndexMap::new();
        variants.insert(
            "small".to_string(),
            rows(&[("items[]/id", "items[]/id"), ("items[]/name", "items[]/name")]),
        );
        variants.insert(
            "large".to_string(),
            rows(&[
                ("items[]/name", "items[]/name"),
                ("items[]/description", "items[]/description"),
            ]),
        );
        let union = UnionMapping {
            path: Some("items[]".to_string()),
            target_path: None,
            required: true,
            selector: Selector::Inference {
                schemas: [
                    (
                        "small".to_string(),
                        json!({
                            "type": "object",
                            "properties": {
                                "id": { "type": "string" },
                                "name": { "type": "string" }
                            },
                            "required": ["id"],
                            "additionalProperties": false
                        }),
                    ),
                    (
                        "large".to_string(),
                        json!({
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "description": { "type": "string" }
                            },
                            "required": ["description"],
                            "additionalProperties": false
                        }),
                    ),
                ]
                .into_iter()
                .collect(),
            },
            nullable: None,
            variants,
        };
        let t = Transformer::new(&Mapping::Union(union)).unwrap();

        let out = t
            .transform(&json!({
                "items": [
                    { "id": "1", "name": "a" },
                    { "name": "b", "description": "d" }
                ]
            }))
            .unwrap();
        assert_eq!(
            out,
            json!({
                "items": [
                    { "id": "1", "name": "a" },
                    { "name": "b", "description": "d" }
                ]
            })
        );
    }

    #[test]
    fn per_element_discriminator() {
        let mut variants = IndexMap::new();
        variants.insert(
            "dog".to_string(),
            rows(&[
                ("pets[]/type", "pets[]/type"),
                ("pets[]/bark", "pets[]/bark"),
            ]),
        );
        variants.insert(
            "cat".to_string(),
            rows(&[
                ("pets[]/type", "pets[]/type"),
                ("pets[]/meow", "pets[]/meow"),
            ]),
        );
        let union = UnionMapping {
            path: Some("pets[]".to_string()),
            target_path: None,
            required: true,
            selector: Selector::Discriminator {
                path: "pets[]/type".to_string(),
            },
            nullable: None,
            variants,
        };
        let t = Transformer::new(&Mapping::Union(union)).unwrap();

        let out = t
            .transform(&json!({
                "pets": [
                    { "type": "cat", "meow": true },
                    { "type": "dog", "bark": false }
                ]
            }))
            .unwrap();
        assert_eq!(
            out,
            json!({
                "pets": [
                    { "type": "cat", "meow": true },
                    { "type": "dog", "bark": false }
                ]
            })
        );
    }

    #[test]
    fn optional_union_with_absent_value_is_skipped() {
        let mut union = pet_union(true);
        union.path = Some("pet".to_string());
        union.required = false;
        union.selector = Selector::Discriminator {
            path: "pet/type".to_string(),
        };
        let mapping = Mapping::MultiUnion {
            shared: rows(&[("order_id", "order_id")]),
            unions: vec![union],
        };
        let t = Transformer::new(&mapping).unwrap();

        // Discriminator absent: only the shared rows survive.
        let out = t.transform(&json!({ "order_id": "o-1" })).unwrap();
        assert_eq!(out, json!({ "order_id": "o-1" }));
    }

    #[test]
    fn non_string_discriminator_matches_raw_text() {
        let mut variants = IndexMap::new();
        variants.insert("1".to_string(), rows(&[("v", "first")]));
        variants.insert("2".to_string(), rows(&[("v", "second")]));
        let union = UnionMapping {
            path: None,
            target_path: None,
            required: true,
            selector: Selector::Discriminator {
                path: "kind".to_string(),
            },
            nullable: None,
            variants,
        };
        let t = Transformer::new(&Mapping::Union(union)).unwrap();

        let out = t.transform(&json!({ "kind": 2, "v": "x" })).unwrap();
        assert_eq!(out, json!({ "second": "x" }));
    }
}
