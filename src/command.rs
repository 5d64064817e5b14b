use std::rc::Rc;

use crate::engine::{ArgParser, ParseError};
use crate::help::{render, HelpConfig};
use crate::instance::{AccessError, RecordInstance};
use crate::reconstruct::{reconstruct, ReconstructError, UnknownKeys};
use crate::register::{register, RegistrationError};
use crate::schema::Schema;
use crate::ui::{ConsoleInterface, UserInterface};

/// The command line boundary: program name, help configuration, and the
/// output interface.
///
/// Binding a schema performs registration up front, so schema mistakes
/// surface before any tokens are parsed.
///
/// ### Example
/// ```no_run
/// use declarg::{CommandLine, FieldSpec, SchemaBuilder, TypeExpr};
///
/// let schema = SchemaBuilder::new("Config")
///     .field(FieldSpec::new("x", TypeExpr::int()))
///     .build()
///     .unwrap();
/// let command = CommandLine::new("prog").bind(schema).unwrap();
/// let instance = command.parse().unwrap_or_else(|code| std::process::exit(code));
/// ```
pub struct CommandLine {
    program: String,
    config: HelpConfig,
    interface: Box<dyn UserInterface>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            config: HelpConfig::default(),
            interface: Box::new(ConsoleInterface::default()),
        }
    }

    pub fn config(mut self, config: HelpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn interface(mut self, interface: Box<dyn UserInterface>) -> Self {
        self.interface = interface;
        self
    }

    /// Register the schema's fields and produce the bound command.
    /// Registration errors are programming errors and are never converted to
    /// exit codes.
    pub fn bind(self, schema: Rc<Schema>) -> Result<BoundCommand, RegistrationError> {
        let mut parser = ArgParser::new();
        register(&schema, &mut parser)?;
        Ok(BoundCommand {
            program: self.program,
            config: self.config,
            interface: self.interface,
            schema,
            parser,
        })
    }
}

pub struct BoundCommand {
    program: String,
    config: HelpConfig,
    interface: Box<dyn UserInterface>,
    schema: Rc<Schema>,
    parser: ArgParser,
}

impl BoundCommand {
    /// Parse the process arguments.
    pub fn parse(&self) -> Result<RecordInstance, i32> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let tokens: Vec<&str> = args.iter().map(String::as_str).collect();
        self.parse_tokens(&tokens)
    }

    /// Parse a token list into a typed instance.
    ///
    /// Help requests print the help text and return exit code 0; parse and
    /// validation failures print a diagnostic and return exit code 1.
    pub fn parse_tokens(&self, tokens: &[&str]) -> Result<RecordInstance, i32> {
        let values = match self.parser.parse(tokens) {
            Ok(values) => values,
            Err(ParseError::HelpRequested) => {
                self.interface
                    .print(render(&self.parser, &self.program, &self.config));
                return Err(0);
            }
            Err(error) => {
                self.interface.print_error(error);
                return Err(1);
            }
        };
        match reconstruct(&self.schema, &values, UnknownKeys::Ignore) {
            Ok(instance) => Ok(instance),
            Err(error) => {
                self.interface.print_error(diagnostic(error));
                Err(1)
            }
        }
    }
}

/// Surface reconstruction failures as uniform invalid-value diagnostics.
fn diagnostic(error: ReconstructError) -> ParseError {
    match error {
        ReconstructError::Access(AccessError::CheckFailed { field, reason })
        | ReconstructError::Access(AccessError::TypeMismatch { field, reason }) => {
            ParseError::InvalidValue {
                what: field,
                reason,
            }
        }
        other => ParseError::InvalidValue {
            what: "arguments".to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TypeExpr, Value};
    use crate::schema::{FieldSpec, SchemaBuilder};
    use crate::test::assert_contains;
    use crate::ui::util::{channel_interface, InMemoryInterface};

    fn schema() -> Rc<Schema> {
        SchemaBuilder::new("Config")
            .field(FieldSpec::new("x", TypeExpr::int()).help("the x value"))
            .field(
                FieldSpec::new("y", TypeExpr::sequence(TypeExpr::int()))
                    .default(Value::List(Vec::default())),
            )
            .build()
            .unwrap()
    }

    fn plain_config() -> HelpConfig {
        HelpConfig {
            use_colors: Some(false),
            output_width: Some(80),
            ..HelpConfig::default()
        }
    }

    #[test]
    fn parse_tokens() {
        // Setup
        let command = CommandLine::new("prog")
            .interface(Box::new(InMemoryInterface::default()))
            .bind(schema())
            .unwrap();

        // Execute
        let instance = command.parse_tokens(&["--x", "1", "--y", "2", "3"]).unwrap();

        // Verify
        assert_eq!(instance.get("x").unwrap(), Value::Int(1));
        assert_eq!(
            instance.get("y").unwrap(),
            Value::List(vec![Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn parse_tokens_defaults() {
        let command = CommandLine::new("prog")
            .interface(Box::new(InMemoryInterface::default()))
            .bind(schema())
            .unwrap();
        let instance = command.parse_tokens(&["--x", "1"]).unwrap();
        assert_eq!(instance.get("y").unwrap(), Value::List(Vec::default()));
    }

    #[test]
    fn parse_tokens_help() {
        // Setup
        let (sender, receiver) = channel_interface();
        let command = CommandLine::new("prog")
            .config(plain_config())
            .interface(Box::new(sender))
            .bind(schema())
            .unwrap();

        // Execute
        let result = command.parse_tokens(&["--help"]);
        drop(command);

        // Verify
        assert_eq!(result.unwrap_err(), 0);
        let (message, error) = receiver.consume();
        assert_eq!(error, None);
        let message = message.unwrap();
        assert_contains!(message, "usage: prog [-h] --x int [--y [int ...]]");
        assert_contains!(message, "the x value (required)");
    }

    #[test]
    fn parse_tokens_missing_required() {
        // Setup
        let (sender, receiver) = channel_interface();
        let command = CommandLine::new("prog")
            .interface(Box::new(sender))
            .bind(schema())
            .unwrap();

        // Execute
        let result = command.parse_tokens(&[]);
        drop(command);

        // Verify
        assert_eq!(result.unwrap_err(), 1);
        let (message, error) = receiver.consume();
        assert_eq!(message, None);
        assert_contains!(error.unwrap(), "missing required argument '--x'");
    }

    #[test]
    fn parse_tokens_invalid_value() {
        let (sender, receiver) = channel_interface();
        let command = CommandLine::new("prog")
            .interface(Box::new(sender))
            .bind(schema())
            .unwrap();
        let result = command.parse_tokens(&["--x", "abc"]);
        drop(command);
        assert_eq!(result.unwrap_err(), 1);
        let (_, error) = receiver.consume();
        assert_contains!(error.unwrap(), "invalid value for '--x'");
    }

    #[test]
    fn parse_tokens_checker_rejection() {
        // Setup
        let schema = SchemaBuilder::new("Config")
            .field(FieldSpec::new("x", TypeExpr::int()))
            .attach_checker("x", |value| match value {
                Value::Int(i) if *i >= 0 => Ok(()),
                _ => Err("must be non-negative".to_string()),
            })
            .build()
            .unwrap();
        let (sender, receiver) = channel_interface();
        let command = CommandLine::new("prog")
            .interface(Box::new(sender))
            .bind(schema)
            .unwrap();

        // Execute
        let result = command.parse_tokens(&["--x", "-3"]);
        drop(command);

        // Verify
        assert_eq!(result.unwrap_err(), 1);
        let (_, error) = receiver.consume();
        assert_contains!(error.unwrap(), "must be non-negative");
    }

    #[test]
    fn parse_tokens_groups_end_to_end() {
        // Setup
        let server = SchemaBuilder::new("Server")
            .field(FieldSpec::new("port", TypeExpr::int()).default(Value::Int(80)))
            .build()
            .unwrap();
        let schema = SchemaBuilder::new("Config")
            .field(FieldSpec::new("verbose", TypeExpr::bool()).default(Value::Bool(false)))
            .field(FieldSpec::new("server", TypeExpr::group(server)))
            .build()
            .unwrap();
        let command = CommandLine::new("prog")
            .interface(Box::new(InMemoryInterface::default()))
            .bind(schema)
            .unwrap();

        // Execute
        let instance = command
            .parse_tokens(&["--verbose", "--server:port", "8080"])
            .unwrap();

        // Verify
        assert_eq!(instance.get("verbose").unwrap(), Value::Bool(true));
        let Value::Record(server) = instance.get("server").unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(server.get("port").unwrap(), Value::Int(8080));
    }

    #[test]
    fn parse_tokens_freeze_policy() {
        let schema = SchemaBuilder::new("Config")
            .field(FieldSpec::new("x", TypeExpr::int()).default(Value::Int(0)))
            .freeze_after_parse()
            .build()
            .unwrap();
        let command = CommandLine::new("prog")
            .interface(Box::new(InMemoryInterface::default()))
            .bind(schema)
            .unwrap();
        let mut instance = command.parse_tokens(&[]).unwrap();
        assert!(instance.is_frozen());
        assert!(instance.set("x", Value::Int(1)).is_err());
    }

    #[test]
    fn bind_registration_error() {
        let schema = SchemaBuilder::new("Config")
            .field(FieldSpec::new(
                "x",
                TypeExpr::optional(TypeExpr::optional(TypeExpr::int())),
            ))
            .build()
            .unwrap();
        let result = CommandLine::new("prog").bind(schema);
        assert!(result.is_err());
    }
}
