use commonroom_core::error::{Error, Result};
use commonroom_core::ids::{IdentifierKind, generate_identifier};
use serde_json::{Map, Value};

use crate::catalog::{ArgumentSchema, FieldKind, FieldSpec};

/// Validate `raw` against `schema`, fill defaults and mint server-generated
/// identifiers.
///
/// Generated fields (activity id, user id) are always overwritten, even when
/// the caller supplied a value.
pub fn normalize(schema: &ArgumentSchema, raw: &Map<String, Value>) -> Result<Map<String, Value>> {
    normalize_with(schema, raw, &mut generate_identifier)
}

pub fn normalize_with(
    schema: &ArgumentSchema,
    raw: &Map<String, Value>,
    generate: &mut dyn FnMut(IdentifierKind) -> String,
) -> Result<Map<String, Value>> {
    normalize_object(schema, raw, None, generate)
}

fn normalize_object(
    schema: &ArgumentSchema,
    raw: &Map<String, Value>,
    parent: Option<&str>,
    generate: &mut dyn FnMut(IdentifierKind) -> String,
) -> Result<Map<String, Value>> {
    if !schema.open {
        if let Some(unknown) = raw.keys().find(|key| schema.field(key).is_none()) {
            let path = field_path(parent, unknown);
            return Err(Error::validation(
                path.clone(),
                format!("Unknown field '{path}'"),
            ));
        }
    }

    for field in schema.fields.iter().filter(|field| field.caller_required()) {
        if is_absent(raw.get(field.name)) {
            let path = field_path(parent, field.name);
            return Err(Error::validation(
                path.clone(),
                format!("Missing required field '{path}'"),
            ));
        }
    }

    let mut normalized = raw.clone();
    for field in &schema.fields {
        if field.generated.is_some() {
            continue;
        }
        match raw.get(field.name) {
            None | Some(Value::Null) => {
                if let Some(default) = &field.default {
                    normalized.insert(field.name.to_string(), default.clone());
                } else {
                    normalized.remove(field.name);
                }
            }
            Some(value) => {
                let checked = check_field(field, value, parent, generate)?;
                normalized.insert(field.name.to_string(), checked);
            }
        }
    }

    // TODO: confirm with product whether caller-supplied ids should be
    // honoured instead of silently replaced.
    for field in &schema.fields {
        if let Some(kind) = field.generated {
            normalized.insert(field.name.to_string(), Value::String(generate(kind)));
        }
    }

    Ok(normalized)
}

fn check_field(
    field: &FieldSpec,
    value: &Value,
    parent: Option<&str>,
    generate: &mut dyn FnMut(IdentifierKind) -> String,
) -> Result<Value> {
    let path = field_path(parent, field.name);
    if !field.kind.matches(value) {
        return Err(Error::validation(
            path.clone(),
            format!("'{path}' must be a {}", field.kind.as_str()),
        ));
    }
    match (field.kind, value) {
        (FieldKind::String, Value::String(text)) if field.required && text.trim().is_empty() => {
            Err(Error::validation(
                path.clone(),
                format!("'{path}' must not be empty"),
            ))
        }
        (FieldKind::Object, Value::Object(map)) => match &field.nested {
            Some(schema) => Ok(Value::Object(normalize_object(
                schema,
                map,
                Some(&path),
                generate,
            )?)),
            None => Ok(value.clone()),
        },
        _ => Ok(value.clone()),
    }
}

fn is_absent(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn field_path(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}.{name}"),
        None => name.to_string(),
    }
}
