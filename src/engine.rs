use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use thiserror::Error;

use crate::model::{Arity, Value};

pub(crate) type Converter = Rc<dyn Fn(&[String]) -> Result<Value, String>>;

/// One registered argument: destination key, flag spellings, token arity,
/// conversion, and the surrounding metadata used for matching and help.
#[derive(Clone)]
pub struct OptionSpec {
    dest: String,
    flags: Vec<String>,
    arity: Arity,
    convert: Converter,
    choices: Option<Vec<Value>>,
    default: Option<Value>,
    required: bool,
    optional: bool,
    help: Option<String>,
    metavar: String,
    toggle: bool,
}

impl OptionSpec {
    /// A flagged or positional option.  A positional is a single flag
    /// spelling without a leading `-`.
    pub fn new(
        dest: impl Into<String>,
        flags: impl IntoIterator<Item = impl Into<String>>,
        convert: impl Fn(&[String]) -> Result<Value, String> + 'static,
    ) -> Self {
        Self {
            dest: dest.into(),
            flags: flags.into_iter().map(Into::into).collect(),
            arity: Arity::Single,
            convert: Rc::new(convert),
            choices: None,
            default: None,
            required: false,
            optional: false,
            help: None,
            metavar: String::default(),
            toggle: false,
        }
    }

    /// A boolean toggle pair.  Each `--x` spelling also matches as `--no-x`,
    /// neither consumes a value token.
    pub fn toggle(
        dest: impl Into<String>,
        flags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut spec = Self::new(dest, flags, |_| Ok(Value::None));
        spec.toggle = true;
        spec
    }

    pub fn arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    pub fn choices(mut self, choices: Vec<Value>) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the value as nullable, decorating the help metavar as `[mv]`.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn metavar(mut self, metavar: impl Into<String>) -> Self {
        self.metavar = metavar.into();
        self
    }

    pub fn dest(&self) -> &str {
        &self.dest
    }

    pub fn flag_spellings(&self) -> &[String] {
        &self.flags
    }

    pub fn declared_arity(&self) -> Arity {
        self.arity
    }

    pub fn choice_values(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn metavar_text(&self) -> &str {
        &self.metavar
    }

    pub fn is_toggle(&self) -> bool {
        self.toggle
    }

    pub fn is_positional(&self) -> bool {
        self.flags.first().is_some_and(|flag| !flag.starts_with('-'))
    }

    /// The spelling used in diagnostics.
    fn display_name(&self) -> &str {
        self.flags.first().map(String::as_str).unwrap_or(&self.dest)
    }
}

impl std::fmt::Debug for OptionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionSpec")
            .field("dest", &self.dest)
            .field("flags", &self.flags)
            .field("arity", &self.arity)
            .field("required", &self.required)
            .field("toggle", &self.toggle)
            .finish()
    }
}

/// A labeled section of the option table.  Grouping affects help rendering
/// only, matching works off the one flat flag table.
#[derive(Debug)]
pub struct Section {
    title: Option<String>,
    help: Option<String>,
    options: Vec<OptionSpec>,
}

impl Section {
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }
}

/// Addresses a section for subsequent `register_option_in` calls.
#[derive(Debug, Clone, Copy)]
pub struct GroupHandle(usize);

#[derive(Debug, Error, PartialEq)]
pub enum RegisterError {
    #[error("empty flag list for '{0}'")]
    EmptyFlags(String),
    #[error("duplicate destination '{0}'")]
    DuplicateDest(String),
    #[error("duplicate flag '{0}'")]
    DuplicateFlag(String),
    #[error("flag '{0}' is reserved")]
    ReservedFlag(String),
    #[error("cannot mix positional and flagged spellings for '{0}'")]
    MixedPositional(String),
    #[error("positional '{0}' cannot take a default or be optional")]
    PositionalDefault(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("help requested")]
    HelpRequested,
    #[error("unrecognized argument '{0}'")]
    UnknownFlag(String),
    #[error("unexpected argument '{0}'")]
    UnexpectedToken(String),
    #[error("option '{0}' takes no value")]
    UnexpectedValue(String),
    #[error("not enough values for '{0}' (expected {1})")]
    NotEnoughTokens(String, Arity),
    #[error("missing required argument '{0}'")]
    MissingRequired(String),
    #[error("invalid value for '{what}': {reason}")]
    InvalidValue { what: String, reason: String },
    #[error("invalid choice for '{what}': '{value}' (choose from {choices})")]
    InvalidChoice {
        what: String,
        value: Value,
        choices: Value,
    },
}

/// The flat `dest -> value` mapping produced by a parse, in declaration
/// order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatValues {
    values: Vec<(String, Value)>,
}

impl FlatValues {
    pub fn insert(&mut self, dest: impl Into<String>, value: Value) {
        self.values.push((dest.into(), value));
    }

    pub fn get(&self, dest: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(key, _)| key == dest)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Value)> for FlatValues {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

struct FlagTarget {
    section: usize,
    index: usize,
    // The toggle polarity this spelling sets, if the option is a toggle.
    polarity: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
enum MatchState {
    Unmatched,
    Tokens(Vec<String>),
    Toggled(bool),
}

/// The command line parsing primitive: an option table, token matching per
/// arity, conversion, choice validation, defaults, and required checks.
///
/// ### Example
/// ```
/// use declarg::{ArgParser, OptionSpec, Value};
///
/// let mut parser = ArgParser::new();
/// parser
///     .register_option(OptionSpec::new("x", ["--x"], |tokens| {
///         tokens[0].parse::<i64>().map(Value::Int).map_err(|e| e.to_string())
///     }).required())
///     .unwrap();
/// let values = parser.parse(&["--x", "5"]).unwrap();
/// assert_eq!(values.get("x"), Some(&Value::Int(5)));
/// ```
pub struct ArgParser {
    sections: Vec<Section>,
    flags: HashMap<String, FlagTarget>,
    dests: HashSet<String>,
}

impl Default for ArgParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ArgParser {
    pub fn new() -> Self {
        Self {
            sections: vec![Section {
                title: None,
                help: None,
                options: Vec::default(),
            }],
            flags: HashMap::default(),
            dests: HashSet::default(),
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Open a labeled section.  Options registered through the handle land in
    /// the same flat table, the label affects help rendering only.
    pub fn register_group(
        &mut self,
        title: impl Into<String>,
        help: Option<String>,
    ) -> GroupHandle {
        self.sections.push(Section {
            title: Some(title.into()),
            help,
            options: Vec::default(),
        });
        GroupHandle(self.sections.len() - 1)
    }

    pub fn register_option(&mut self, spec: OptionSpec) -> Result<(), RegisterError> {
        self.register_into(0, spec)
    }

    pub fn register_option_in(
        &mut self,
        group: GroupHandle,
        spec: OptionSpec,
    ) -> Result<(), RegisterError> {
        self.register_into(group.0, spec)
    }

    fn register_into(&mut self, section: usize, spec: OptionSpec) -> Result<(), RegisterError> {
        if spec.flags.is_empty() {
            return Err(RegisterError::EmptyFlags(spec.dest));
        }
        if !self.dests.insert(spec.dest.clone()) {
            return Err(RegisterError::DuplicateDest(spec.dest));
        }
        let positional = spec.is_positional();
        if positional {
            if spec.flags.len() > 1 || spec.flags.iter().any(|flag| flag.starts_with('-')) {
                return Err(RegisterError::MixedPositional(spec.dest));
            }
            if spec.default.is_some() || spec.toggle {
                return Err(RegisterError::PositionalDefault(spec.dest));
            }
        } else if spec.flags.iter().any(|flag| !flag.starts_with('-')) {
            return Err(RegisterError::MixedPositional(spec.dest));
        }

        let index = self.sections[section].options.len();
        if !positional {
            for flag in &spec.flags {
                if flag == "-h" || flag == "--help" {
                    return Err(RegisterError::ReservedFlag(flag.clone()));
                }
                self.claim_flag(flag.clone(), section, index, spec.toggle.then_some(true))?;
                if spec.toggle {
                    if let Some(name) = flag.strip_prefix("--") {
                        self.claim_flag(format!("--no-{name}"), section, index, Some(false))?;
                    }
                }
            }
        }
        self.sections[section].options.push(spec);
        Ok(())
    }

    fn claim_flag(
        &mut self,
        flag: String,
        section: usize,
        index: usize,
        polarity: Option<bool>,
    ) -> Result<(), RegisterError> {
        if self.flags.contains_key(&flag) {
            return Err(RegisterError::DuplicateFlag(flag));
        }
        self.flags.insert(
            flag,
            FlagTarget {
                section,
                index,
                polarity,
            },
        );
        Ok(())
    }

    /// Parse a token list into the flat value mapping.
    ///
    /// `-h`/`--help` anywhere short-circuits with
    /// [`ParseError::HelpRequested`] so the boundary layer can render help.
    pub fn parse(&self, tokens: &[&str]) -> Result<FlatValues, ParseError> {
        let mut states: Vec<Vec<MatchState>> = self
            .sections
            .iter()
            .map(|section| vec![MatchState::Unmatched; section.options.len()])
            .collect();
        let positionals: Vec<(usize, usize)> = self
            .sections
            .iter()
            .enumerate()
            .flat_map(|(s, section)| {
                section
                    .options
                    .iter()
                    .enumerate()
                    .filter(|(_, option)| option.is_positional())
                    .map(move |(i, _)| (s, i))
            })
            .collect();
        let mut positional_cursor = 0;

        let mut remaining = tokens.iter().map(|t| t.to_string()).collect::<Vec<_>>();
        remaining.reverse();
        while let Some(token) = remaining.pop() {
            if token == "-h" || token == "--help" {
                return Err(ParseError::HelpRequested);
            }
            if looks_like_flag(&token) {
                let (flag, inline) = match token.split_once('=') {
                    Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
                    None => (token.clone(), None),
                };
                let target = self
                    .flags
                    .get(&flag)
                    .ok_or_else(|| ParseError::UnknownFlag(flag.clone()))?;
                let option = &self.sections[target.section].options[target.index];
                let state = if let Some(polarity) = target.polarity {
                    if inline.is_some() {
                        return Err(ParseError::UnexpectedValue(flag));
                    }
                    MatchState::Toggled(polarity)
                } else {
                    let consumed = match inline {
                        Some(value) => vec![value],
                        None => consume(&mut remaining, option.arity)
                            .ok_or_else(|| ParseError::NotEnoughTokens(flag, option.arity))?,
                    };
                    MatchState::Tokens(consumed)
                };
                // A repeated flag overwrites the earlier occurrence.
                states[target.section][target.index] = state;
            } else {
                let (s, i) = *positionals
                    .get(positional_cursor)
                    .ok_or_else(|| ParseError::UnexpectedToken(token.clone()))?;
                positional_cursor += 1;
                let option = &self.sections[s].options[i];
                remaining.push(token);
                let consumed = consume(&mut remaining, option.arity).ok_or_else(|| {
                    ParseError::NotEnoughTokens(option.display_name().to_string(), option.arity)
                })?;
                states[s][i] = MatchState::Tokens(consumed);
            }
        }

        let mut values = FlatValues::default();
        for (s, section) in self.sections.iter().enumerate() {
            for (i, option) in section.options.iter().enumerate() {
                match &states[s][i] {
                    MatchState::Toggled(polarity) => {
                        values.insert(option.dest.clone(), Value::Bool(*polarity));
                    }
                    MatchState::Tokens(tokens) => {
                        let value =
                            (option.convert)(tokens).map_err(|reason| ParseError::InvalidValue {
                                what: option.display_name().to_string(),
                                reason,
                            })?;
                        validate_choices(option, &value)?;
                        values.insert(option.dest.clone(), value);
                    }
                    MatchState::Unmatched => match &option.default {
                        Some(default) => values.insert(option.dest.clone(), default.clone()),
                        None if option.required => {
                            return Err(ParseError::MissingRequired(
                                option.display_name().to_string(),
                            ));
                        }
                        None => {}
                    },
                }
            }
        }
        Ok(values)
    }
}

/// Pop tokens off the (reversed) remaining list per the arity.
/// Variadic arities consume greedily up to the next flag-looking token.
fn consume(remaining: &mut Vec<String>, arity: Arity) -> Option<Vec<String>> {
    let wanted = match arity {
        Arity::Single => 1,
        Arity::Fixed(n) => n,
        Arity::AtLeastOne | Arity::ZeroOrMore => {
            let mut consumed = Vec::default();
            while remaining
                .last()
                .is_some_and(|token| !looks_like_flag(token))
            {
                if let Some(token) = remaining.pop() {
                    consumed.push(token);
                }
            }
            if consumed.is_empty() && arity == Arity::AtLeastOne {
                return None;
            }
            return Some(consumed);
        }
    };
    let mut consumed = Vec::with_capacity(wanted);
    for _ in 0..wanted {
        if !remaining
            .last()
            .is_some_and(|token| !looks_like_flag(token))
        {
            return None;
        }
        if let Some(token) = remaining.pop() {
            consumed.push(token);
        }
    }
    Some(consumed)
}

/// Whether a token should be treated as a flag rather than a value.
/// Negative numbers (`-5`, `-0.5`) are values.
fn looks_like_flag(token: &str) -> bool {
    match token.strip_prefix('-') {
        Some(rest) => !rest.is_empty() && rest.parse::<f64>().is_err(),
        None => false,
    }
}

fn validate_choices(option: &OptionSpec, value: &Value) -> Result<(), ParseError> {
    let Some(choices) = &option.choices else {
        return Ok(());
    };
    let violation = match value {
        Value::List(items) => items.iter().find(|item| !choices.contains(item)),
        scalar => (!choices.contains(scalar)).then_some(scalar),
    };
    match violation {
        Some(value) => Err(ParseError::InvalidChoice {
            what: option.display_name().to_string(),
            value: value.clone(),
            choices: Value::List(choices.clone()),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn int_converter(tokens: &[String]) -> Result<Value, String> {
        tokens[0]
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| e.to_string())
    }

    fn int_list_converter(tokens: &[String]) -> Result<Value, String> {
        tokens
            .iter()
            .map(|token| token.parse::<i64>().map(Value::Int).map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List)
    }

    #[test]
    fn parse_flagged_single() {
        // Setup
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("x", ["--x"], int_converter).required())
            .unwrap();

        // Execute
        let values = parser.parse(&["--x", "5"]).unwrap();

        // Verify
        assert_eq!(values.get("x"), Some(&Value::Int(5)));
    }

    #[test]
    fn parse_inline_value() {
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("x", ["--x"], int_converter))
            .unwrap();
        let values = parser.parse(&["--x=7"]).unwrap();
        assert_eq!(values.get("x"), Some(&Value::Int(7)));
    }

    #[test]
    fn parse_short_flag() {
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("x", ["-x", "--longer-x"], int_converter))
            .unwrap();
        assert_eq!(
            parser.parse(&["-x", "1"]).unwrap().get("x"),
            Some(&Value::Int(1))
        );
        assert_eq!(
            parser.parse(&["--longer-x", "2"]).unwrap().get("x"),
            Some(&Value::Int(2))
        );
    }

    #[test]
    fn parse_repeated_flag_last_wins() {
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("x", ["--x"], int_converter))
            .unwrap();
        let values = parser.parse(&["--x", "1", "--x", "2"]).unwrap();
        assert_eq!(values.get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn parse_negative_number() {
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("x", ["--x"], int_converter))
            .unwrap();
        let values = parser.parse(&["--x", "-5"]).unwrap();
        assert_eq!(values.get("x"), Some(&Value::Int(-5)));
    }

    #[rstest]
    #[case(&["--y"], vec![])]
    #[case(&["--y", "1"], vec![Value::Int(1)])]
    #[case(&["--y", "1", "2", "3"], vec![Value::Int(1), Value::Int(2), Value::Int(3)])]
    fn parse_zero_or_more(#[case] tokens: &[&str], #[case] expected: Vec<Value>) {
        // Setup
        let mut parser = ArgParser::new();
        parser
            .register_option(
                OptionSpec::new("y", ["--y"], int_list_converter).arity(Arity::ZeroOrMore),
            )
            .unwrap();

        // Execute & verify
        let values = parser.parse(tokens).unwrap();
        assert_eq!(values.get("y"), Some(&Value::List(expected)));
    }

    #[test]
    fn parse_variadic_stops_at_flag() {
        // Setup
        let mut parser = ArgParser::new();
        parser
            .register_option(
                OptionSpec::new("y", ["--y"], int_list_converter).arity(Arity::ZeroOrMore),
            )
            .unwrap();
        parser
            .register_option(OptionSpec::new("x", ["--x"], int_converter))
            .unwrap();

        // Execute
        let values = parser.parse(&["--y", "1", "2", "--x", "3"]).unwrap();

        // Verify
        assert_eq!(
            values.get("y"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
        assert_eq!(values.get("x"), Some(&Value::Int(3)));
    }

    #[test]
    fn parse_at_least_one() {
        let mut parser = ArgParser::new();
        parser
            .register_option(
                OptionSpec::new("y", ["--y"], int_list_converter).arity(Arity::AtLeastOne),
            )
            .unwrap();
        assert_eq!(
            parser.parse(&["--y"]),
            Err(ParseError::NotEnoughTokens("--y".to_string(), Arity::AtLeastOne))
        );
        assert!(parser.parse(&["--y", "1"]).is_ok());
    }

    #[test]
    fn parse_fixed_arity() {
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("y", ["--y"], int_list_converter).arity(Arity::Fixed(2)))
            .unwrap();
        assert_eq!(
            parser.parse(&["--y", "1", "2"]).unwrap().get("y"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
        assert_eq!(
            parser.parse(&["--y", "1"]),
            Err(ParseError::NotEnoughTokens("--y".to_string(), Arity::Fixed(2)))
        );
    }

    #[test]
    fn parse_toggle() {
        // Setup
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::toggle("flip", ["--flip"]).default(Value::Bool(false)))
            .unwrap();

        // Execute & verify
        assert_eq!(
            parser.parse(&["--flip"]).unwrap().get("flip"),
            Some(&Value::Bool(true))
        );
        assert_eq!(
            parser.parse(&["--no-flip"]).unwrap().get("flip"),
            Some(&Value::Bool(false))
        );
        assert_eq!(
            parser.parse(&[]).unwrap().get("flip"),
            Some(&Value::Bool(false))
        );
        assert_eq!(
            parser.parse(&["--flip=1"]),
            Err(ParseError::UnexpectedValue("--flip".to_string()))
        );
    }

    #[test]
    fn parse_positional() {
        // Setup
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("src", ["src"], |tokens| {
                Ok(Value::Str(tokens[0].clone()))
            }))
            .unwrap();
        parser
            .register_option(OptionSpec::new("x", ["--x"], int_converter))
            .unwrap();

        // Execute
        let values = parser.parse(&["--x", "1", "input.txt"]).unwrap();

        // Verify
        assert_eq!(values.get("src"), Some(&Value::Str("input.txt".to_string())));
        assert_eq!(values.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn parse_unexpected_positional() {
        let parser = ArgParser::new();
        assert_eq!(
            parser.parse(&["stray"]),
            Err(ParseError::UnexpectedToken("stray".to_string()))
        );
    }

    #[test]
    fn parse_unknown_flag() {
        let parser = ArgParser::new();
        assert_eq!(
            parser.parse(&["--nope"]),
            Err(ParseError::UnknownFlag("--nope".to_string()))
        );
    }

    #[test]
    fn parse_missing_required() {
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("x", ["--x"], int_converter).required())
            .unwrap();
        assert_eq!(
            parser.parse(&[]),
            Err(ParseError::MissingRequired("--x".to_string()))
        );
    }

    #[test]
    fn parse_default_applied() {
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("x", ["--x"], int_converter).default(Value::Int(9)))
            .unwrap();
        assert_eq!(parser.parse(&[]).unwrap().get("x"), Some(&Value::Int(9)));
    }

    #[test]
    fn parse_absent_optional_omitted() {
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("x", ["--x"], int_converter))
            .unwrap();
        assert!(parser.parse(&[]).unwrap().is_empty());
    }

    #[test]
    fn parse_invalid_value() {
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("x", ["--x"], int_converter))
            .unwrap();
        assert_matches::assert_matches!(
            parser.parse(&["--x", "abc"]),
            Err(ParseError::InvalidValue { what, .. }) if what == "--x"
        );
    }

    #[test]
    fn parse_choice_validation() {
        // Setup
        let mut parser = ArgParser::new();
        parser
            .register_option(
                OptionSpec::new("x", ["--x"], int_converter)
                    .choices(vec![Value::Int(0), Value::Int(1)]),
            )
            .unwrap();

        // Execute & verify: validation applies to the converted value.
        assert!(parser.parse(&["--x", "1"]).is_ok());
        assert_matches::assert_matches!(
            parser.parse(&["--x", "2"]),
            Err(ParseError::InvalidChoice { value, .. }) if value == Value::Int(2)
        );
    }

    #[test]
    fn parse_choice_validation_elementwise() {
        let mut parser = ArgParser::new();
        parser
            .register_option(
                OptionSpec::new("y", ["--y"], int_list_converter)
                    .arity(Arity::ZeroOrMore)
                    .choices(vec![Value::Int(0), Value::Int(1)]),
            )
            .unwrap();
        assert!(parser.parse(&["--y", "0", "1", "0"]).is_ok());
        assert_matches::assert_matches!(
            parser.parse(&["--y", "0", "2"]),
            Err(ParseError::InvalidChoice { value, .. }) if value == Value::Int(2)
        );
    }

    #[rstest]
    #[case(&["-h"])]
    #[case(&["--help"])]
    #[case(&["--x", "1", "--help"])]
    fn parse_help_requested(#[case] tokens: &[&str]) {
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("x", ["--x"], int_converter))
            .unwrap();
        assert_eq!(parser.parse(tokens), Err(ParseError::HelpRequested));
    }

    #[test]
    fn register_group_sections() {
        // Setup
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("x", ["--x"], int_converter))
            .unwrap();
        let group = parser.register_group("server", Some("server options".to_string()));
        parser
            .register_option_in(group, OptionSpec::new("server:port", ["--server:port"], int_converter))
            .unwrap();

        // Execute
        let values = parser.parse(&["--x", "1", "--server:port", "80"]).unwrap();

        // Verify
        assert_eq!(values.get("server:port"), Some(&Value::Int(80)));
        assert_eq!(parser.sections().len(), 2);
        assert_eq!(parser.sections()[1].title(), Some("server"));
    }

    #[test]
    fn register_duplicate_dest() {
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("x", ["--x"], int_converter))
            .unwrap();
        assert_eq!(
            parser.register_option(OptionSpec::new("x", ["--other"], int_converter)),
            Err(RegisterError::DuplicateDest("x".to_string()))
        );
    }

    #[test]
    fn register_duplicate_flag() {
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("x", ["--x"], int_converter))
            .unwrap();
        assert_eq!(
            parser.register_option(OptionSpec::new("y", ["--x"], int_converter)),
            Err(RegisterError::DuplicateFlag("--x".to_string()))
        );
    }

    #[test]
    fn register_toggle_flag_collision() {
        let mut parser = ArgParser::new();
        parser
            .register_option(OptionSpec::new("no_x", ["--no-x"], int_converter))
            .unwrap();
        assert_eq!(
            parser.register_option(OptionSpec::toggle("x", ["--x"])),
            Err(RegisterError::DuplicateFlag("--no-x".to_string()))
        );
    }

    #[rstest]
    #[case("-h")]
    #[case("--help")]
    fn register_reserved_flag(#[case] flag: &str) {
        let mut parser = ArgParser::new();
        assert_eq!(
            parser.register_option(OptionSpec::new("x", [flag], int_converter)),
            Err(RegisterError::ReservedFlag(flag.to_string()))
        );
    }

    #[test]
    fn register_mixed_positional() {
        let mut parser = ArgParser::new();
        assert_eq!(
            parser.register_option(OptionSpec::new("x", ["x", "--x"], int_converter)),
            Err(RegisterError::MixedPositional("x".to_string()))
        );
    }

    #[test]
    fn register_positional_default() {
        let mut parser = ArgParser::new();
        assert_eq!(
            parser.register_option(
                OptionSpec::new("x", ["x"], int_converter).default(Value::Int(0))
            ),
            Err(RegisterError::PositionalDefault("x".to_string()))
        );
    }
}
