use std::rc::Rc;

use thiserror::Error;

use crate::engine::FlatValues;
use crate::instance::{AccessError, RecordInstance};
use crate::model::Value;
use crate::schema::Schema;

/// What to do with flat keys that match no schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownKeys {
    /// Tolerate foreign keys, e.g. when the flat mapping was produced by a
    /// parser registered for a wider schema.
    Ignore,
    Reject,
}

#[derive(Debug, Error, PartialEq)]
pub enum ReconstructError {
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error(transparent)]
    Access(#[from] AccessError),
}

/// Rebuild a typed record instance from a flat `key -> value` mapping.
///
/// Non-prefixed keys are assigned through the instance setter first; keys
/// sharing a top-level `prefix:` are stripped and recursively reconstructed
/// into the group field's sub-instance.  A group field may also be assigned
/// whole through a plain key carrying a record value.  Group sub-instances
/// are built even when no key carries their prefix, so group fields always
/// read back as records.  The schema's freeze policy is applied to the
/// finished instance.
pub fn reconstruct(
    schema: &Rc<Schema>,
    values: &FlatValues,
    policy: UnknownKeys,
) -> Result<RecordInstance, ReconstructError> {
    for (key, _) in values.iter() {
        if !key_known(schema, key) {
            match policy {
                UnknownKeys::Ignore => {}
                UnknownKeys::Reject => return Err(ReconstructError::UnknownKey(key.to_string())),
            }
        }
    }

    let mut instance = RecordInstance::new(schema);
    for (key, value) in values.iter() {
        if !key.contains(':') && schema.field(key).is_some() {
            instance.set(key, value.clone())?;
        }
    }
    for field in schema.fields() {
        let Some(sub_schema) = group_schema(schema, field.name()) else {
            continue;
        };
        // A group assigned whole through a plain key stands as-is.
        if matches!(instance.is_set(field.name()), Ok(true)) {
            continue;
        }
        let prefix = format!("{}:", field.name());
        let sub_values: FlatValues = values
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix)
                    .map(|stripped| (stripped.to_string(), value.clone()))
            })
            .collect();
        let sub_instance = reconstruct(&sub_schema, &sub_values, policy)?;
        instance.set(field.name(), Value::Record(sub_instance))?;
    }
    if schema.freeze_after_parse() {
        instance.freeze();
    }
    Ok(instance)
}

fn key_known(schema: &Schema, key: &str) -> bool {
    match key.split_once(':') {
        Some((top, _)) => group_schema(schema, top).is_some(),
        None => schema.field(key).is_some(),
    }
}

fn group_schema(schema: &Schema, name: &str) -> Option<Rc<Schema>> {
    match schema.field(name)?.type_expr() {
        crate::model::TypeExpr::Group(sub) => Some(Rc::clone(sub)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeExpr;
    use crate::schema::{FieldSpec, SchemaBuilder};
    use assert_matches::assert_matches;

    fn flat(pairs: Vec<(&str, Value)>) -> FlatValues {
        pairs
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }

    #[test]
    fn reconstruct_plain() {
        // Setup
        let schema = SchemaBuilder::new("Config")
            .field(FieldSpec::new("x", TypeExpr::int()))
            .field(FieldSpec::new("y", TypeExpr::str()).default("abc"))
            .build()
            .unwrap();

        // Execute
        let instance = reconstruct(
            &schema,
            &flat(vec![("x", Value::Int(1))]),
            UnknownKeys::Reject,
        )
        .unwrap();

        // Verify
        assert_eq!(instance.get("x").unwrap(), Value::Int(1));
        assert_eq!(instance.get("y").unwrap(), Value::Str("abc".to_string()));
        assert!(!instance.is_frozen());
    }

    #[test]
    fn reconstruct_groups() {
        // Setup
        let server = SchemaBuilder::new("Server")
            .field(FieldSpec::new("port", TypeExpr::int()).default(Value::Int(80)))
            .build()
            .unwrap();
        let schema = SchemaBuilder::new("Config")
            .field(FieldSpec::new("x", TypeExpr::int()))
            .field(FieldSpec::new("server", TypeExpr::group(server)))
            .build()
            .unwrap();

        // Execute
        let instance = reconstruct(
            &schema,
            &flat(vec![("x", Value::Int(1)), ("server:port", Value::Int(8080))]),
            UnknownKeys::Reject,
        )
        .unwrap();

        // Verify
        assert_eq!(instance.get("x").unwrap(), Value::Int(1));
        let Value::Record(server) = instance.get("server").unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(server.get("port").unwrap(), Value::Int(8080));
    }

    #[test]
    fn reconstruct_group_without_keys() {
        // A group sub-instance is built even when no key carries its prefix.
        let server = SchemaBuilder::new("Server")
            .field(FieldSpec::new("port", TypeExpr::int()).default(Value::Int(80)))
            .build()
            .unwrap();
        let schema = SchemaBuilder::new("Config")
            .field(FieldSpec::new("server", TypeExpr::group(server)))
            .build()
            .unwrap();

        let instance = reconstruct(&schema, &FlatValues::default(), UnknownKeys::Reject).unwrap();
        let Value::Record(server) = instance.get("server").unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(server.get("port").unwrap(), Value::Int(80));
    }

    #[test]
    fn reconstruct_group_assigned_whole() {
        // Setup
        let server = SchemaBuilder::new("Server")
            .field(FieldSpec::new("port", TypeExpr::int()))
            .build()
            .unwrap();
        let schema = SchemaBuilder::new("Config")
            .field(FieldSpec::new("server", TypeExpr::group(Rc::clone(&server))))
            .build()
            .unwrap();
        let mut prebuilt = RecordInstance::new(&server);
        prebuilt.set("port", Value::Int(443)).unwrap();

        // Execute
        let instance = reconstruct(
            &schema,
            &flat(vec![("server", Value::Record(prebuilt))]),
            UnknownKeys::Reject,
        )
        .unwrap();

        // Verify: the assigned record is not rebuilt from prefixed keys.
        let Value::Record(server) = instance.get("server").unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(server.get("port").unwrap(), Value::Int(443));
    }

    #[test]
    fn reconstruct_nested_groups() {
        // Setup
        let inner = SchemaBuilder::new("Inner")
            .field(FieldSpec::new("z", TypeExpr::int()))
            .build()
            .unwrap();
        let middle = SchemaBuilder::new("Middle")
            .field(FieldSpec::new("inner", TypeExpr::group(inner)))
            .build()
            .unwrap();
        let schema = SchemaBuilder::new("Config")
            .field(FieldSpec::new("middle", TypeExpr::group(middle)))
            .build()
            .unwrap();

        // Execute
        let instance = reconstruct(
            &schema,
            &flat(vec![("middle:inner:z", Value::Int(7))]),
            UnknownKeys::Reject,
        )
        .unwrap();

        // Verify
        let Value::Record(middle) = instance.get("middle").unwrap() else {
            panic!("expected a record");
        };
        let Value::Record(inner) = middle.get("inner").unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(inner.get("z").unwrap(), Value::Int(7));
    }

    #[test]
    fn reconstruct_unknown_key_policy() {
        // Setup
        let schema = SchemaBuilder::new("Config")
            .field(FieldSpec::new("x", TypeExpr::int()))
            .build()
            .unwrap();
        let values = flat(vec![("x", Value::Int(1)), ("bogus", Value::Int(2))]);

        // Execute & verify
        assert_eq!(
            reconstruct(&schema, &values, UnknownKeys::Reject),
            Err(ReconstructError::UnknownKey("bogus".to_string()))
        );
        let instance = reconstruct(&schema, &values, UnknownKeys::Ignore).unwrap();
        assert_eq!(instance.get("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn reconstruct_unknown_nested_key() {
        let inner = SchemaBuilder::new("Inner")
            .field(FieldSpec::new("z", TypeExpr::int()).default(Value::Int(0)))
            .build()
            .unwrap();
        let schema = SchemaBuilder::new("Config")
            .field(FieldSpec::new("inner", TypeExpr::group(inner)))
            .build()
            .unwrap();
        let values = flat(vec![("inner:bogus", Value::Int(2))]);
        assert_eq!(
            reconstruct(&schema, &values, UnknownKeys::Reject),
            Err(ReconstructError::UnknownKey("bogus".to_string()))
        );
        assert!(reconstruct(&schema, &values, UnknownKeys::Ignore).is_ok());
    }

    #[test]
    fn reconstruct_type_mismatch() {
        let schema = SchemaBuilder::new("Config")
            .field(FieldSpec::new("x", TypeExpr::int()))
            .build()
            .unwrap();
        let result = reconstruct(
            &schema,
            &flat(vec![("x", Value::Str("abc".to_string()))]),
            UnknownKeys::Reject,
        );
        assert_matches!(
            result,
            Err(ReconstructError::Access(AccessError::TypeMismatch { .. }))
        );
    }

    #[test]
    fn reconstruct_freeze_policy() {
        let schema = SchemaBuilder::new("Config")
            .field(FieldSpec::new("x", TypeExpr::int()).default(Value::Int(0)))
            .freeze_after_parse()
            .build()
            .unwrap();
        let instance = reconstruct(&schema, &FlatValues::default(), UnknownKeys::Reject).unwrap();
        assert!(instance.is_frozen());
        assert_matches!(
            instance.clone().set("x", Value::Int(1)),
            Err(AccessError::Frozen(_))
        );
    }
}
