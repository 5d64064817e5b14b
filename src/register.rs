use std::rc::Rc;

use thiserror::Error;

use crate::engine::{ArgParser, GroupHandle, OptionSpec, RegisterError};
use crate::model::{Arity, ScalarKind, TypeExpr, Value};
use crate::schema::{Field, Schema};
use crate::shape::{classify, ClassifyError, TypeShape};

#[derive(Debug, Error, PartialEq)]
pub enum RegistrationError {
    #[error("cannot register field '{field}': {source}")]
    UnsupportedType {
        field: String,
        #[source]
        source: ClassifyError,
    },
    #[error(transparent)]
    Table(#[from] RegisterError),
}

/// Register every field of the schema onto the parser, recursing through
/// group fields with `prefix:name` destinations and labeled sections.
pub fn register(schema: &Schema, parser: &mut ArgParser) -> Result<(), RegistrationError> {
    register_level(schema, parser, None, "")
}

fn register_level(
    schema: &Schema,
    parser: &mut ArgParser,
    section: Option<GroupHandle>,
    prefix: &str,
) -> Result<(), RegistrationError> {
    for field in schema.fields() {
        if let TypeExpr::Group(sub) = field.type_expr() {
            let sub_prefix = format!("{prefix}{}:", field.name());
            let handle =
                parser.register_group(format!("{prefix}{}", field.name()), field.help().map(String::from));
            register_level(sub, parser, Some(handle), &sub_prefix)?;
            continue;
        }

        let shape = classify(field.type_expr()).map_err(|source| {
            RegistrationError::UnsupportedType {
                field: format!("{prefix}{}", field.name()),
                source,
            }
        })?;
        let spec = lower_field(field, &shape, prefix);
        match section {
            Some(handle) => parser.register_option_in(handle, spec)?,
            None => parser.register_option(spec)?,
        }
    }
    Ok(())
}

/// Lower one non-group field into an [`OptionSpec`].
fn lower_field(field: &Field, shape: &TypeShape, prefix: &str) -> OptionSpec {
    let dest = format!("{prefix}{}", field.name());
    let flags: Vec<String> = match field.flags() {
        Some(flags) => flags.to_vec(),
        // The whole prefixed spelling is dashed, the destination keeps the
        // underscores.
        None => vec![format!(
            "--{}",
            format!("{prefix}{}", field.name()).replace('_', "-")
        )],
    };
    let positional = flags.first().is_some_and(|flag| !flag.starts_with('-'));

    let mut spec = if shape.is_toggle() && field.parser().is_none() {
        OptionSpec::toggle(dest, flags)
    } else {
        let (arity, convert): (Arity, Box<dyn Fn(&[String]) -> Result<Value, String>>) =
            match field.parser() {
                // The attached parser's declared arity wins over the type's.
                Some(attached) => {
                    let attached = Rc::clone(attached);
                    (
                        attached.declared_arity(),
                        Box::new(move |tokens: &[String]| attached.run(tokens)),
                    )
                }
                None => {
                    let kind = shape.base.clone();
                    match shape.arity {
                        Arity::Single => (
                            Arity::Single,
                            Box::new(move |tokens: &[String]| kind.convert_token(&tokens[0])),
                        ),
                        arity => (
                            arity,
                            Box::new(move |tokens: &[String]| {
                                tokens
                                    .iter()
                                    .map(|token| kind.convert_token(token))
                                    .collect::<Result<Vec<_>, _>>()
                                    .map(Value::List)
                            }),
                        ),
                    }
                }
            };
        OptionSpec::new(dest, flags, move |tokens| convert(tokens)).arity(arity)
    };

    if let Some(choices) = &shape.choices {
        spec = spec.choices(choices.clone());
    }
    if shape.optional && !spec.is_toggle() {
        spec = spec.optional();
    }
    spec = spec.metavar(metavar_for(field, shape));
    if let Some(help) = field.help() {
        spec = spec.help(help);
    }
    if positional {
        return spec;
    }
    match field.default() {
        Some(default) => spec = spec.default(default.clone()),
        // An absent optional reads back as an explicit None.
        None if shape.optional => spec = spec.default(Value::None),
        None => {}
    }
    if field.resolve_required(shape) {
        spec = spec.required();
    }
    spec
}

/// The metavar shown in help: the parser or custom type override when
/// present, else the scalar kind's display name.
fn metavar_for(field: &Field, shape: &TypeShape) -> String {
    if let Some(metavar) = field.parser().and_then(|p| p.declared_metavar()) {
        return metavar.to_string();
    }
    if let ScalarKind::Custom(custom) = &shape.base {
        if let Some(metavar) = custom.metavar() {
            return metavar.to_string();
        }
    }
    shape.base.display_name().to_string()
}
