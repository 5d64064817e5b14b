use std::rc::Rc;

use crate::instance::RecordInstance;
use crate::schema::Schema;

/// The cardinality of command line tokens consumed by a single field.
///
/// Inspired by argparse: <https://docs.python.org/3/library/argparse.html#nargs>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Precisely one token.
    Single,
    /// Precisely `N` tokens.
    Fixed(usize),
    /// `+`: at least one token must be specified.
    AtLeastOne,
    /// `*`: any number of tokens, including zero.
    ZeroOrMore,
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Single => write!(f, "1"),
            Arity::Fixed(n) => write!(f, "{n}"),
            Arity::AtLeastOne => write!(f, "+"),
            Arity::ZeroOrMore => write!(f, "*"),
        }
    }
}

/// A user defined scalar kind: a display name, an optional metavar override,
/// an optional enumerable choice marker, and a conversion function.
///
/// Custom types allow a schema to parse values the built-in kinds cannot,
/// while still participating in metavar inference and choice validation.
///
/// ### Example
/// ```
/// use declarg::{CustomType, Value};
///
/// let hex = CustomType::new("hex", |token| {
///     i64::from_str_radix(token, 16)
///         .map(Value::Int)
///         .map_err(|e| e.to_string())
/// });
/// assert_eq!((hex.convert())("ff"), Ok(Value::Int(255)));
/// ```
pub struct CustomType {
    name: String,
    metavar: Option<String>,
    choices: Option<Vec<String>>,
    convert: Box<dyn Fn(&str) -> Result<Value, String>>,
}

impl CustomType {
    /// Create a custom scalar kind with the given display name and converter.
    pub fn new(
        name: impl Into<String>,
        convert: impl Fn(&str) -> Result<Value, String> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            metavar: None,
            choices: None,
            convert: Box::new(convert),
        })
    }

    pub(crate) fn with_details(
        name: impl Into<String>,
        metavar: Option<String>,
        choices: Option<Vec<String>>,
        convert: impl Fn(&str) -> Result<Value, String> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            metavar,
            choices,
            convert: Box::new(convert),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The metavar override, if any.
    pub fn metavar(&self) -> Option<&str> {
        self.metavar.as_deref()
    }

    /// The enumerable choice marker, if any.
    /// Values listed here are surfaced as choices without further validation
    /// of their kind.
    pub fn choices(&self) -> Option<&[String]> {
        self.choices.as_deref()
    }

    pub fn convert(&self) -> &dyn Fn(&str) -> Result<Value, String> {
        &*self.convert
    }
}

impl std::fmt::Debug for CustomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomType")
            .field("name", &self.name)
            .field("metavar", &self.metavar)
            .field("choices", &self.choices)
            .finish()
    }
}

/// The innermost scalar type of a field.
#[derive(Debug, Clone)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    Str,
    Custom(Rc<CustomType>),
}

impl ScalarKind {
    /// The display name, used as the default metavar.
    pub fn display_name(&self) -> &str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::Str => "str",
            ScalarKind::Custom(custom) => custom.name(),
        }
    }

    /// Convert a single token to a value of this kind.
    pub fn convert_token(&self, token: &str) -> Result<Value, String> {
        match self {
            ScalarKind::Bool => token
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|_| format!("cannot parse '{token}' as bool")),
            ScalarKind::Int => token
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("cannot parse '{token}' as int")),
            ScalarKind::Float => token
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("cannot parse '{token}' as float")),
            ScalarKind::Str => Ok(Value::Str(token.to_string())),
            ScalarKind::Custom(custom) => (custom.convert())(token),
        }
    }
}

impl PartialEq for ScalarKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ScalarKind::Bool, ScalarKind::Bool)
            | (ScalarKind::Int, ScalarKind::Int)
            | (ScalarKind::Float, ScalarKind::Float)
            | (ScalarKind::Str, ScalarKind::Str) => true,
            (ScalarKind::Custom(a), ScalarKind::Custom(b)) => {
                Rc::ptr_eq(a, b) || a.name() == b.name()
            }
            _ => false,
        }
    }
}

impl Eq for ScalarKind {}

/// A dynamically typed value: the domain flowing between the parsing engine,
/// the reconstructor, and record instances.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// An ordered key to value mapping, e.g. parsed from `k=v,k2=v2`.
    Map(Vec<(Value, Value)>),
    Record(RecordInstance),
}

impl Value {
    /// The scalar kind of this value, if it is a scalar.
    pub fn kind(&self) -> Option<ScalarKind> {
        match self {
            Value::Bool(_) => Some(ScalarKind::Bool),
            Value::Int(_) => Some(ScalarKind::Int),
            Value::Float(_) => Some(ScalarKind::Float),
            Value::Str(_) => Some(ScalarKind::Str),
            Value::None | Value::List(_) | Value::Map(_) | Value::Record(_) => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Record(instance) => write!(f, "{instance}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

/// The declared type expression of a field.
///
/// This is the declaration-time equivalent of a type annotation: it states
/// the scalar kind, optionality, collection arity, literal choice set, or
/// nested record structure of a field, and is classified into a
/// [`TypeShape`](crate::shape::TypeShape) when the field is registered.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    /// A plain scalar, e.g. `x: int`.
    Scalar(ScalarKind),
    /// An optional wrapper, e.g. `x: Optional[int]`.
    Optional(Box<TypeExpr>),
    /// A possibly empty sequence, e.g. `x: Sequence[int]`.
    Sequence(Box<TypeExpr>),
    /// A non-empty sequence, e.g. `x: Sequence[int, ...]`.
    NonEmptySequence(Box<TypeExpr>),
    /// A fixed length sequence, e.g. `x: Sequence[int, int, int]`.
    /// All elements must be the same type.
    Tuple(Vec<TypeExpr>),
    /// A literal choice set, e.g. `x: Literal[0, 1, 2]`.
    /// All values must be of the same scalar kind.
    Choice(Vec<Value>),
    /// A nested record type, registered as a group of prefixed options.
    Group(Rc<Schema>),
}

impl TypeExpr {
    pub fn bool() -> Self {
        TypeExpr::Scalar(ScalarKind::Bool)
    }

    pub fn int() -> Self {
        TypeExpr::Scalar(ScalarKind::Int)
    }

    pub fn float() -> Self {
        TypeExpr::Scalar(ScalarKind::Float)
    }

    pub fn str() -> Self {
        TypeExpr::Scalar(ScalarKind::Str)
    }

    pub fn custom(custom: Rc<CustomType>) -> Self {
        TypeExpr::Scalar(ScalarKind::Custom(custom))
    }

    pub fn optional(inner: TypeExpr) -> Self {
        TypeExpr::Optional(Box::new(inner))
    }

    pub fn sequence(element: TypeExpr) -> Self {
        TypeExpr::Sequence(Box::new(element))
    }

    pub fn non_empty(element: TypeExpr) -> Self {
        TypeExpr::NonEmptySequence(Box::new(element))
    }

    pub fn tuple(elements: Vec<TypeExpr>) -> Self {
        TypeExpr::Tuple(elements)
    }

    pub fn choice(values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        TypeExpr::Choice(values.into_iter().map(Into::into).collect())
    }

    pub fn group(schema: Rc<Schema>) -> Self {
        TypeExpr::Group(schema)
    }

    /// Whether this expression declares a nested record group.
    pub fn is_group(&self) -> bool {
        matches!(self, TypeExpr::Group(_))
    }

    /// Structural equality, used to validate fixed length sequences.
    pub(crate) fn same_as(&self, other: &TypeExpr) -> bool {
        match (self, other) {
            (TypeExpr::Scalar(a), TypeExpr::Scalar(b)) => a == b,
            (TypeExpr::Optional(a), TypeExpr::Optional(b))
            | (TypeExpr::Sequence(a), TypeExpr::Sequence(b))
            | (TypeExpr::NonEmptySequence(a), TypeExpr::NonEmptySequence(b)) => a.same_as(b),
            (TypeExpr::Tuple(a), TypeExpr::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same_as(y))
            }
            (TypeExpr::Choice(a), TypeExpr::Choice(b)) => a == b,
            (TypeExpr::Group(a), TypeExpr::Group(b)) => Rc::ptr_eq(a, b) || a.name() == b.name(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_display() {
        assert_eq!(Arity::Single.to_string(), "1");
        assert_eq!(Arity::Fixed(3).to_string(), "3");
        assert_eq!(Arity::AtLeastOne.to_string(), "+");
        assert_eq!(Arity::ZeroOrMore.to_string(), "*");
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::None.to_string(), "None");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Int(-2).to_string(), "-2");
        assert_eq!(Value::Str("abc".to_string()).to_string(), "abc");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "[1, 2]"
        );
        assert_eq!(
            Value::Map(vec![
                (Value::Str("a".to_string()), Value::Int(1)),
                (Value::Str("b".to_string()), Value::Int(2))
            ])
            .to_string(),
            "{a: 1, b: 2}"
        );
    }

    #[test]
    fn custom_type_convert() {
        // Setup
        let hex = CustomType::new("hex", |token| {
            i64::from_str_radix(token, 16)
                .map(Value::Int)
                .map_err(|e| e.to_string())
        });

        // Execute & verify
        assert_eq!((hex.convert())("ff"), Ok(Value::Int(255)));
        assert!((hex.convert())("xyz").is_err());
        assert_eq!(hex.name(), "hex");
        assert_eq!(hex.metavar(), None);
    }

    #[test]
    fn scalar_kind_eq() {
        let a = CustomType::new("hex", |_| Ok(Value::None));
        let b = CustomType::new("hex", |_| Ok(Value::None));
        let c = CustomType::new("oct", |_| Ok(Value::None));
        assert_eq!(ScalarKind::Custom(a.clone()), ScalarKind::Custom(b));
        assert_ne!(ScalarKind::Custom(a), ScalarKind::Custom(c));
        assert_eq!(ScalarKind::Int, ScalarKind::Int);
        assert_ne!(ScalarKind::Int, ScalarKind::Str);
    }

    #[test]
    fn type_expr_same_as() {
        assert!(TypeExpr::int().same_as(&TypeExpr::int()));
        assert!(!TypeExpr::int().same_as(&TypeExpr::str()));
        assert!(TypeExpr::sequence(TypeExpr::int()).same_as(&TypeExpr::sequence(TypeExpr::int())));
        assert!(
            !TypeExpr::sequence(TypeExpr::int()).same_as(&TypeExpr::non_empty(TypeExpr::int()))
        );
        assert!(TypeExpr::choice([0_i64, 1]).same_as(&TypeExpr::choice([0_i64, 1])));
        assert!(!TypeExpr::choice([0_i64, 1]).same_as(&TypeExpr::choice([1_i64, 0])));
    }
}
