use thiserror::Error;

use crate::model::{Arity, ScalarKind, TypeExpr, Value};

/// The normalized decomposition of a declared type expression.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeShape {
    /// The innermost scalar kind.
    pub base: ScalarKind,
    /// Whether the expression was optional-wrapped.
    pub optional: bool,
    /// How many command line tokens one occurrence of the field consumes.
    pub arity: Arity,
    /// The allowed values, in declaration order, if the expression is a
    /// choice (or its base kind carries an enumerable choice marker).
    pub choices: Option<Vec<Value>>,
}

impl TypeShape {
    /// Whether the shape is a single boolean, registered downstream as a
    /// `--x`/`--no-x` toggle pair and never marked required.
    pub fn is_toggle(&self) -> bool {
        self.base == ScalarKind::Bool && self.arity == Arity::Single && self.choices.is_none()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ClassifyError {
    #[error("cannot classify optional of optional type")]
    NestedOptional,
    #[error("cannot classify empty fixed length sequence")]
    EmptyTuple,
    #[error("cannot classify fixed length sequence with differing element types")]
    MixedTuple,
    #[error("cannot classify empty choice set")]
    EmptyChoices,
    #[error("cannot classify choice set with values of differing kinds")]
    MixedChoices,
    #[error("cannot classify choice set over non-scalar values")]
    NonScalarChoice,
    #[error("cannot classify nested record type '{0}' as a scalar")]
    GroupNotScalar(String),
    #[error("cannot classify sequence element: expected a scalar or choice type")]
    UnsupportedElement,
}

/// Classify a declared type expression into a [`TypeShape`].
///
/// Fails when the expression is unsupported: optional-of-optional, an empty or
/// heterogeneous fixed length sequence, a heterogeneous or non-scalar choice
/// set, a sequence whose element is itself optional/sequence/group, or a
/// group (groups are expanded by the registration engine, not classified).
pub fn classify(expr: &TypeExpr) -> Result<TypeShape, ClassifyError> {
    match expr {
        TypeExpr::Optional(inner) => {
            if matches!(**inner, TypeExpr::Optional(_)) {
                return Err(ClassifyError::NestedOptional);
            }
            let mut shape = classify(inner)?;
            shape.optional = true;
            Ok(shape)
        }
        TypeExpr::Sequence(element) => {
            let (base, choices) = element_shape(element)?;
            Ok(TypeShape {
                base,
                optional: false,
                arity: Arity::ZeroOrMore,
                choices,
            })
        }
        TypeExpr::NonEmptySequence(element) => {
            let (base, choices) = element_shape(element)?;
            Ok(TypeShape {
                base,
                optional: false,
                arity: Arity::AtLeastOne,
                choices,
            })
        }
        TypeExpr::Tuple(elements) => {
            let first = elements.first().ok_or(ClassifyError::EmptyTuple)?;
            if elements.iter().skip(1).any(|e| !e.same_as(first)) {
                return Err(ClassifyError::MixedTuple);
            }
            let (base, choices) = element_shape(first)?;
            Ok(TypeShape {
                base,
                optional: false,
                arity: Arity::Fixed(elements.len()),
                choices,
            })
        }
        TypeExpr::Choice(values) => {
            let (base, choices) = choice_shape(values)?;
            Ok(TypeShape {
                base,
                optional: false,
                arity: Arity::Single,
                choices: Some(choices),
            })
        }
        TypeExpr::Scalar(kind) => Ok(TypeShape {
            base: kind.clone(),
            optional: false,
            arity: Arity::Single,
            choices: marker_choices(kind),
        }),
        TypeExpr::Group(schema) => Err(ClassifyError::GroupNotScalar(schema.name().to_string())),
    }
}

/// Classify the element of a sequence wrapper.
/// Elements must be plain scalars or choice sets.
fn element_shape(element: &TypeExpr) -> Result<(ScalarKind, Option<Vec<Value>>), ClassifyError> {
    match element {
        TypeExpr::Scalar(kind) => Ok((kind.clone(), marker_choices(kind))),
        TypeExpr::Choice(values) => {
            let (base, choices) = choice_shape(values)?;
            Ok((base, Some(choices)))
        }
        _ => Err(ClassifyError::UnsupportedElement),
    }
}

/// Infer the scalar kind of a literal choice set from its first value, and
/// validate that every other value is of the same kind.
fn choice_shape(values: &[Value]) -> Result<(ScalarKind, Vec<Value>), ClassifyError> {
    let first = values.first().ok_or(ClassifyError::EmptyChoices)?;
    let kind = first.kind().ok_or(ClassifyError::NonScalarChoice)?;
    for value in values.iter().skip(1) {
        match value.kind() {
            Some(k) if k == kind => {}
            Some(_) => return Err(ClassifyError::MixedChoices),
            None => return Err(ClassifyError::NonScalarChoice),
        }
    }
    Ok((kind, values.to_vec()))
}

/// The enumerable choice marker of a custom kind, surfaced without further
/// validation.
fn marker_choices(kind: &ScalarKind) -> Option<Vec<Value>> {
    match kind {
        ScalarKind::Custom(custom) => custom
            .choices()
            .map(|choices| choices.iter().map(|c| Value::Str(c.clone())).collect()),
        _ => None,
    }
}
