use std::collections::HashSet;
use std::rc::Rc;

use thiserror::Error;

use crate::model::{Arity, TypeExpr, Value};
use crate::shape::TypeShape;

/// A custom field parser: consumes the raw tokens of one field occurrence and
/// produces a value, bypassing the declared type's conversion entirely.
///
/// The parser declares its own token arity, which takes precedence over the
/// arity inferred from the field's type expression.
#[derive(Clone)]
pub struct FieldParser {
    arity: Arity,
    metavar: Option<String>,
    parse: Rc<dyn Fn(&[String]) -> Result<Value, String>>,
}

impl FieldParser {
    /// Create a single-token parser.
    pub fn new(parse: impl Fn(&[String]) -> Result<Value, String> + 'static) -> Self {
        Self {
            arity: Arity::Single,
            metavar: None,
            parse: Rc::new(parse),
        }
    }

    /// Override the token arity.
    pub fn arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    /// Override the metavar shown in help text.
    pub fn metavar(mut self, metavar: impl Into<String>) -> Self {
        self.metavar = Some(metavar.into());
        self
    }

    pub fn declared_arity(&self) -> Arity {
        self.arity
    }

    pub fn declared_metavar(&self) -> Option<&str> {
        self.metavar.as_deref()
    }

    pub fn run(&self, tokens: &[String]) -> Result<Value, String> {
        (self.parse)(tokens)
    }
}

impl std::fmt::Debug for FieldParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldParser")
            .field("arity", &self.arity)
            .field("metavar", &self.metavar)
            .finish()
    }
}

/// A custom field checker: validates a converted value before it is stored on
/// an instance.
pub type FieldChecker = Rc<dyn Fn(&Value) -> Result<(), String>>;

/// Whether a field must be provided on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requiredness {
    /// Derive from the declaration: required iff the field has no default and
    /// its type is not optional-wrapped.
    Auto,
    Required,
    NotRequired,
}

/// The declaration of a single field, fed to a [`SchemaBuilder`].
///
/// ### Example
/// ```
/// use declarg::{FieldSpec, TypeExpr, Value};
///
/// let field = FieldSpec::new("verbosity", TypeExpr::int())
///     .help("how chatty to be")
///     .default(Value::Int(0));
/// ```
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    type_expr: TypeExpr,
    help: Option<String>,
    flags: Option<Vec<String>>,
    default: Option<Value>,
    required: Requiredness,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, type_expr: TypeExpr) -> Self {
        Self {
            name: name.into(),
            type_expr,
            help: None,
            flags: None,
            default: None,
            required: Requiredness::Auto,
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Replace the derived `--dashed-name` flag with custom flags.
    /// The list must be non-empty, and custom flags are forbidden on group
    /// fields.
    pub fn flags(mut self, flags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.flags = Some(flags.into_iter().map(Into::into).collect());
        self
    }

    /// Declare a default value.
    /// Defaults are not type-checked against the declared type, and bypass any
    /// custom checker.
    pub fn default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = Requiredness::Required;
        self
    }

    pub fn not_required(mut self) -> Self {
        self.required = Requiredness::NotRequired;
        self
    }
}

/// A compiled field: the [`FieldSpec`] declaration plus any parser/checker
/// attachments.
#[derive(Clone)]
pub struct Field {
    name: String,
    type_expr: TypeExpr,
    help: Option<String>,
    flags: Option<Vec<String>>,
    default: Option<Value>,
    required: Requiredness,
    parser: Option<Rc<FieldParser>>,
    checker: Option<FieldChecker>,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_expr(&self) -> &TypeExpr {
        &self.type_expr
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn flags(&self) -> Option<&[String]> {
        self.flags.as_deref()
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn requiredness(&self) -> Requiredness {
        self.required
    }

    pub fn parser(&self) -> Option<&Rc<FieldParser>> {
        self.parser.as_ref()
    }

    pub fn checker(&self) -> Option<&FieldChecker> {
        self.checker.as_ref()
    }

    pub fn is_group(&self) -> bool {
        self.type_expr.is_group()
    }

    /// Resolve the tri-state requiredness against the classified shape.
    /// Toggles are never required.
    pub(crate) fn resolve_required(&self, shape: &TypeShape) -> bool {
        if shape.is_toggle() {
            return false;
        }
        match self.required {
            Requiredness::Required => true,
            Requiredness::NotRequired => false,
            Requiredness::Auto => self.default.is_none() && !shape.optional,
        }
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("type_expr", &self.type_expr)
            .field("default", &self.default)
            .field("required", &self.required)
            .finish()
    }
}

/// A compiled record type: a name plus an ordered field table.
///
/// Schemas are immutable once built and shared as `Rc<Schema>` (nested record
/// fields hold their sub-schema the same way).
#[derive(Debug)]
pub struct Schema {
    name: String,
    fields: Vec<Field>,
    freeze_after_parse: bool,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fields in declaration order.
    /// Inherited fields precede locally declared ones; a local redeclaration
    /// keeps the inherited position.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn freeze_after_parse(&self) -> bool {
        self.freeze_after_parse
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("invalid field name '{0}': must be an ascii identifier without a leading underscore")]
    InvalidName(String),
    #[error("field name '{0}' is reserved")]
    ReservedName(String),
    #[error("duplicate field '{0}'")]
    DuplicateField(String),
    #[error("empty flag list for field '{0}'")]
    EmptyFlags(String),
    #[error("custom flags are not supported on group field '{0}'")]
    FlagsOnGroup(String),
    #[error("cannot attach parser to unknown field '{0}'")]
    UnknownParserTarget(String),
    #[error("cannot attach parser to group field '{0}'")]
    ParserOnGroup(String),
    #[error("field '{0}' already has a custom parser")]
    DuplicateParser(String),
    #[error("cannot attach checker to unknown field '{0}'")]
    UnknownCheckerTarget(String),
    #[error("field '{0}' already has a custom checker")]
    DuplicateChecker(String),
}

/// Compiles [`FieldSpec`]s and parser/checker attachments into a [`Schema`].
///
/// ### Example
/// ```
/// use declarg::{FieldSpec, SchemaBuilder, TypeExpr, Value};
///
/// let schema = SchemaBuilder::new("Config")
///     .field(FieldSpec::new("x", TypeExpr::int()))
///     .field(FieldSpec::new("y", TypeExpr::sequence(TypeExpr::int())).default(Value::List(vec![])))
///     .build()
///     .unwrap();
/// assert_eq!(schema.fields().len(), 2);
/// ```
pub struct SchemaBuilder {
    name: String,
    base: Option<Rc<Schema>>,
    specs: Vec<FieldSpec>,
    parsers: Vec<(Vec<String>, FieldParser)>,
    checkers: Vec<(String, FieldChecker)>,
    freeze_after_parse: bool,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            specs: Vec::default(),
            parsers: Vec::default(),
            checkers: Vec::default(),
            freeze_after_parse: false,
        }
    }

    /// Inherit the fields of a base schema, attachments included.
    /// A local field of the same name overrides the inherited one in place.
    pub fn extends(mut self, base: &Rc<Schema>) -> Self {
        self.base = Some(Rc::clone(base));
        self
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Attach one custom parser to one or more fields.
    pub fn attach_parser(
        mut self,
        fields: impl IntoIterator<Item = impl Into<String>>,
        parser: FieldParser,
    ) -> Self {
        self.parsers
            .push((fields.into_iter().map(Into::into).collect(), parser));
        self
    }

    /// Attach a custom checker to a field.
    /// Checkers run on every value stored through the instance setter;
    /// defaults bypass them.
    pub fn attach_checker(
        mut self,
        field: impl Into<String>,
        checker: impl Fn(&Value) -> Result<(), String> + 'static,
    ) -> Self {
        self.checkers.push((field.into(), Rc::new(checker)));
        self
    }

    /// Freeze instances reconstructed from parse results.
    pub fn freeze_after_parse(mut self) -> Self {
        self.freeze_after_parse = true;
        self
    }

    pub fn build(self) -> Result<Rc<Schema>, CompileError> {
        let mut fields: Vec<Field> = match &self.base {
            Some(base) => base.fields.clone(),
            None => Vec::default(),
        };
        let mut local: HashSet<String> = HashSet::default();

        for spec in self.specs {
            validate_name(&spec.name)?;
            if !local.insert(spec.name.clone()) {
                return Err(CompileError::DuplicateField(spec.name));
            }
            if let Some(flags) = &spec.flags {
                if flags.is_empty() {
                    return Err(CompileError::EmptyFlags(spec.name));
                }
                if spec.type_expr.is_group() {
                    return Err(CompileError::FlagsOnGroup(spec.name));
                }
            }
            let field = Field {
                name: spec.name,
                type_expr: spec.type_expr,
                help: spec.help,
                flags: spec.flags,
                default: spec.default,
                required: spec.required,
                parser: None,
                checker: None,
            };
            match fields.iter_mut().find(|f| f.name == field.name) {
                // Redeclaration drops the inherited attachments too.
                Some(inherited) => *inherited = field,
                None => fields.push(field),
            }
        }

        for (targets, parser) in self.parsers {
            let parser = Rc::new(parser);
            for target in targets {
                let field = fields
                    .iter_mut()
                    .find(|f| f.name == target)
                    .ok_or(CompileError::UnknownParserTarget(target.clone()))?;
                if field.is_group() {
                    return Err(CompileError::ParserOnGroup(target));
                }
                if field.parser.is_some() {
                    return Err(CompileError::DuplicateParser(target));
                }
                field.parser = Some(Rc::clone(&parser));
            }
        }

        for (target, checker) in self.checkers {
            let field = fields
                .iter_mut()
                .find(|f| f.name == target)
                .ok_or(CompileError::UnknownCheckerTarget(target.clone()))?;
            if field.checker.is_some() {
                return Err(CompileError::DuplicateChecker(target));
            }
            field.checker = Some(checker);
        }

        Ok(Rc::new(Schema {
            name: self.name,
            fields,
            freeze_after_parse: self.freeze_after_parse,
        }))
    }
}

/// Field names must be ascii identifiers.
/// A leading underscore is reserved for internals, `:` is the group key
/// separator, and `help` is claimed by the parsing engine.
fn validate_name(name: &str) -> Result<(), CompileError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphabetic() && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if !valid {
        return Err(CompileError::InvalidName(name.to_string()));
    }
    if name == "help" {
        return Err(CompileError::ReservedName(name.to_string()));
    }
    Ok(())
}
