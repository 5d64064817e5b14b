//! `declarg` is a declarative command line argument framework for Rust.
//!
//! User code declares record *schemas*: ordered collections of typed fields,
//! each described by an explicit type expression (scalar, optional, sequence,
//! literal choice set, or nested record).  From a compiled schema, `declarg`:
//! * registers one parser option per field, recursing through nested records
//!   as `prefix:name` option groups,
//! * parses a token list into a flat `key -> value` mapping,
//! * reconstructs a typed record instance graph from that mapping, and
//! * renders aligned, word-wrapped, optionally colorized help text from the
//!   same registered metadata.
//!
//! # Usage
//! ```no_run
//! use declarg::{CommandLine, FieldSpec, SchemaBuilder, TypeExpr, Value};
//!
//! let schema = SchemaBuilder::new("Config")
//!     .field(FieldSpec::new("x", TypeExpr::int()).help("the x value"))
//!     .field(
//!         FieldSpec::new("y", TypeExpr::sequence(TypeExpr::int()))
//!             .default(Value::List(Vec::default())),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let command = CommandLine::new("prog").bind(schema).unwrap();
//! let instance = command
//!     .parse()
//!     .unwrap_or_else(|code| std::process::exit(code));
//! println!("x = {}", instance.get("x").unwrap());
//! ```
//! ```console
//! $ prog -h
//! usage: prog [-h] --x int [--y [int ...]]
//!
//! options:
//!   -h/--help      show this help message and exit
//!   --x int        the x value (required)
//!   --y [int ...]  (default: [])
//!
//! $ prog --x 1 --y 2 3
//! x = 1
//!
//! $ prog
//! missing required argument '--x'
//! ```
//!
//! # Schemas
//! A [`SchemaBuilder`] compiles [`FieldSpec`]s into an immutable [`Schema`].
//! Field types are [`TypeExpr`]s; beyond the built-in scalars, a
//! [`CustomType`] supplies its own token conversion, and
//! [`TypeExpr::group`] nests another schema as a prefixed option group.
//! Custom parsers ([`FieldParser`]) and checkers attach through the builder.
//!
//! # Instances
//! Parsing produces a [`RecordInstance`]: per-field storage cells that fall
//! back to schema defaults on read, type-checked mutation, and an optional
//! freeze-after-parse policy.

mod command;
mod engine;
mod help;
mod instance;
mod model;
mod reconstruct;
mod register;
mod schema;
mod shape;
mod types;
mod ui;

pub use command::{BoundCommand, CommandLine};
pub use engine::{
    ArgParser, FlatValues, GroupHandle, OptionSpec, ParseError, RegisterError, Section,
};
pub use help::{render, ColorSpec, HelpConfig, HelpConfigError};
pub use instance::{check_value, AccessError, RecordInstance};
pub use model::{Arity, CustomType, ScalarKind, TypeExpr, Value};
pub use reconstruct::{reconstruct, ReconstructError, UnknownKeys};
pub use register::{register, RegistrationError};
pub use schema::{
    CompileError, Field, FieldChecker, FieldParser, FieldSpec, Requiredness, Schema, SchemaBuilder,
};
pub use shape::{classify, ClassifyError, TypeShape};
pub use types::{enumerated, key_value_pairs};
pub use ui::{ConsoleInterface, UserInterface};
