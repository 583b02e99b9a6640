//! Document validation against compiled validation schemas.

use serde_json::{json, Value};

use crate::error::{SchemaError, ValidationError};

/// Validate a document against a compiled validation schema.
///
/// Returns the full error list rather than stopping at the first
/// violation, so callers can report everything at once. An empty list
/// means the document is valid.
///
/// # Errors
///
/// Returns `SchemaError::InvalidSchema` if the schema itself cannot be
/// compiled by the validator.
pub fn check(schema: &Value, document: &Value) -> Result<Vec<ValidationError>, SchemaError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| SchemaError::InvalidSchema {
        message: e.to_string(),
    })?;

    let errors = validator
        .iter_errors(document)
        .map(|e| ValidationError {
            pointer: e.instance_path.to_string(),
            kind: error_kind(&e.kind),
            message: e.to_string(),
            details: json!({ "schema_path": e.schema_path.to_string() }),
        })
        .collect();

    Ok(errors)
}

// The jsonschema error kinds are struct-like variants; keep only the
// variant name so the kind stays machine-comparable.
fn error_kind(kind: &jsonschema::error::ValidationErrorKind) -> String {
    let debug = format!("{kind:?}");
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric())
        .collect();
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "age": { "type": "number" }
            },
            "required": ["name"],
            "additionalProperties": false
        })
    }

    #[test]
    fn valid_document_yields_no_errors() {
        let errors = check(&schema(), &json!({ "name": "Ada", "age": 36 })).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn missing_required_field_reported_at_root() {
        let errors = check(&schema(), &json!({ "age": 36 })).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].pointer, "");
        assert_eq!(errors[0].kind, "Required");
    }

    #[test]
    fn wrong_type_reported_with_pointer() {
        let errors = check(&schema(), &json!({ "name": 7 })).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].pointer, "/name");
        assert_eq!(errors[0].kind, "Type");
    }

    #[test]
    fn collects_multiple_errors() {
        let errors = check(&schema(), &json!({ "age": "old", "extra": true })).unwrap();
        assert!(errors.len() >= 2);
    }

    #[test]
    fn nested_pointer_is_full_path() {
        let schema = json!({
            "type": "object",
            "properties": {
                "buyer": {
                    "type": "object",
                    "properties": { "email": { "type": "string" } }
                }
            }
        });
        let errors = check(&schema, &json!({ "buyer": { "email": 5 } })).unwrap();
        assert_eq!(errors[0].pointer, "/buyer/email");
    }

    #[test]
    fn unbuildable_schema_is_a_schema_error() {
        let schema = json!({ "type": "definitely-not-a-type" });
        let result = check(&schema, &json!({}));
        assert!(matches!(result, Err(SchemaError::InvalidSchema { .. })));
    }

    #[test]
    fn errors_serialize_to_json() {
        let errors = check(&schema(), &json!({ "name": 7 })).unwrap();
        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(value[0]["pointer"], "/name");
        assert!(value[0]["details"]["schema_path"].is_string());
    }
}
