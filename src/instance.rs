use std::rc::Rc;

use thiserror::Error;

use crate::model::{ScalarKind, TypeExpr, Value};
use crate::schema::Schema;
use crate::shape::classify;

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Unset,
    Set(Value),
}

/// A typed record instance: one storage cell per schema field plus an
/// irreversible frozen bit.
///
/// Reads of an unset cell fall back to the schema default without mutating
/// the cell, so a later `unset` restores default-fallback behavior rather
/// than erasing a copied default.
///
/// ### Example
/// ```
/// use declarg::{FieldSpec, RecordInstance, SchemaBuilder, TypeExpr, Value};
///
/// let schema = SchemaBuilder::new("Config")
///     .field(FieldSpec::new("x", TypeExpr::int()).default(Value::Int(3)))
///     .build()
///     .unwrap();
/// let mut instance = RecordInstance::new(&schema);
/// assert_eq!(instance.get("x").unwrap(), Value::Int(3));
/// instance.set("x", Value::Int(5)).unwrap();
/// assert_eq!(instance.get("x").unwrap(), Value::Int(5));
/// ```
#[derive(Debug, Clone)]
pub struct RecordInstance {
    schema: Rc<Schema>,
    cells: Vec<Cell>,
    frozen: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum AccessError {
    #[error("'{0}' has no field '{1}'")]
    UnknownField(String, String),
    #[error("field '{0}' is not set")]
    Unset(String),
    #[error("cannot modify frozen instance of '{0}'")]
    Frozen(String),
    #[error("invalid value for field '{field}': {reason}")]
    TypeMismatch { field: String, reason: String },
    #[error("check failed for field '{field}': {reason}")]
    CheckFailed { field: String, reason: String },
    #[error("cannot unset required field '{0}'")]
    RequiredUnset(String),
}

impl RecordInstance {
    pub fn new(schema: &Rc<Schema>) -> Self {
        Self {
            schema: Rc::clone(schema),
            cells: vec![Cell::Unset; schema.fields().len()],
            frozen: false,
        }
    }

    pub fn schema(&self) -> &Rc<Schema> {
        &self.schema
    }

    /// The stored value, or the schema default, or an error if neither.
    pub fn get(&self, name: &str) -> Result<Value, AccessError> {
        let index = self.index_of(name)?;
        match &self.cells[index] {
            Cell::Set(value) => Ok(value.clone()),
            Cell::Unset => match self.schema.fields()[index].default() {
                Some(default) => Ok(default.clone()),
                None => Err(AccessError::Unset(name.to_string())),
            },
        }
    }

    /// Type-check the value against the declared type expression, run the
    /// custom checker, then store.  A failing set leaves the prior state
    /// observable.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), AccessError> {
        if self.frozen {
            return Err(AccessError::Frozen(self.schema.name().to_string()));
        }
        let index = self.index_of(name)?;
        let field = &self.schema.fields()[index];
        check_value(field.type_expr(), &value).map_err(|reason| AccessError::TypeMismatch {
            field: name.to_string(),
            reason,
        })?;
        if let Some(checker) = field.checker() {
            checker(&value).map_err(|reason| AccessError::CheckFailed {
                field: name.to_string(),
                reason,
            })?;
        }
        self.cells[index] = Cell::Set(value);
        Ok(())
    }

    /// Return the cell to the unset state.
    /// Fails for required fields and for frozen instances.
    pub fn unset(&mut self, name: &str) -> Result<(), AccessError> {
        if self.frozen {
            return Err(AccessError::Frozen(self.schema.name().to_string()));
        }
        let index = self.index_of(name)?;
        let field = &self.schema.fields()[index];
        if let Ok(shape) = classify(field.type_expr()) {
            if field.resolve_required(&shape) {
                return Err(AccessError::RequiredUnset(name.to_string()));
            }
        }
        self.cells[index] = Cell::Unset;
        Ok(())
    }

    pub fn is_set(&self, name: &str) -> Result<bool, AccessError> {
        let index = self.index_of(name)?;
        Ok(matches!(self.cells[index], Cell::Set(_)))
    }

    /// Freeze the instance.  Irreversible.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// The set-or-defaulted fields, in declaration order.
    pub fn as_map(&self) -> Vec<(String, Value)> {
        self.schema
            .fields()
            .iter()
            .filter_map(|field| {
                self.get(field.name())
                    .ok()
                    .map(|value| (field.name().to_string(), value))
            })
            .collect()
    }

    fn index_of(&self, name: &str) -> Result<usize, AccessError> {
        self.schema
            .fields()
            .iter()
            .position(|field| field.name() == name)
            .ok_or_else(|| {
                AccessError::UnknownField(self.schema.name().to_string(), name.to_string())
            })
    }
}

impl PartialEq for RecordInstance {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name()
            && self.cells == other.cells
            && self.frozen == other.frozen
    }
}

impl std::fmt::Display for RecordInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.schema.name())?;
        for (i, field) in self.schema.fields().iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            match self.get(field.name()) {
                Ok(Value::Str(s)) => write!(f, "{}={s:?}", field.name())?,
                Ok(value) => write!(f, "{}={value}", field.name())?,
                Err(_) => write!(f, "{}=<unset>", field.name())?,
            }
        }
        write!(f, ")")
    }
}

/// Recursively check a value against a declared type expression.
pub fn check_value(expr: &TypeExpr, value: &Value) -> Result<(), String> {
    match expr {
        TypeExpr::Scalar(kind) => match (kind, value) {
            (ScalarKind::Bool, Value::Bool(_))
            | (ScalarKind::Int, Value::Int(_))
            | (ScalarKind::Float, Value::Float(_))
            | (ScalarKind::Str, Value::Str(_)) => Ok(()),
            // Custom converters may produce any value shape.
            (ScalarKind::Custom(_), _) => Ok(()),
            (kind, value) => Err(format!("expected {}, found '{value}'", kind.display_name())),
        },
        TypeExpr::Optional(inner) => match value {
            Value::None => Ok(()),
            _ => check_value(inner, value),
        },
        TypeExpr::Sequence(element) => match value {
            Value::List(items) => check_elements(element, items),
            _ => Err(format!("expected a sequence, found '{value}'")),
        },
        TypeExpr::NonEmptySequence(element) => match value {
            Value::List(items) if !items.is_empty() => check_elements(element, items),
            Value::List(_) => Err("expected a non-empty sequence".to_string()),
            _ => Err(format!("expected a sequence, found '{value}'")),
        },
        TypeExpr::Tuple(elements) => match value {
            Value::List(items) if items.len() == elements.len() => elements
                .iter()
                .zip(items.iter())
                .try_for_each(|(element, item)| check_value(element, item)),
            Value::List(items) => Err(format!(
                "expected {} elements, found {}",
                elements.len(),
                items.len()
            )),
            _ => Err(format!("expected a sequence, found '{value}'")),
        },
        TypeExpr::Choice(choices) => {
            if choices.contains(value) {
                Ok(())
            } else {
                Err(format!(
                    "expected one of {}, found '{value}'",
                    Value::List(choices.clone())
                ))
            }
        }
        TypeExpr::Group(schema) => match value {
            Value::Record(instance) if instance.schema().name() == schema.name() => Ok(()),
            _ => Err(format!("expected a '{}' record, found '{value}'", schema.name())),
        },
    }
}

fn check_elements(element: &TypeExpr, items: &[Value]) -> Result<(), String> {
    items.iter().try_for_each(|item| check_value(element, item))
}
