use std::io::IsTerminal;

use colored::{Color, Colorize};
use terminal_size::{terminal_size, Width};
use thiserror::Error;

use crate::engine::{ArgParser, OptionSpec};
use crate::model::{Arity, Value};

// Unicode noncharacters, one per semantic category.  Rendering lays the text
// out plainly with these as run delimiters, then substitutes escape codes
// after wrapping so the column math never sees escape lengths.
const MARK_CHOICES: char = '\u{fdd0}';
const MARK_DEFAULTS: char = '\u{fdd1}';
const MARK_KEYWORDS: char = '\u{fdd2}';
const MARK_METAVARS: char = '\u{fdd3}';
const MARK_OPTIONS: char = '\u{fdd4}';

const FALLBACK_WIDTH: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Choices,
    Defaults,
    Keywords,
    Metavars,
    Options,
}

impl Category {
    fn placeholder(&self) -> char {
        match self {
            Category::Choices => MARK_CHOICES,
            Category::Defaults => MARK_DEFAULTS,
            Category::Keywords => MARK_KEYWORDS,
            Category::Metavars => MARK_METAVARS,
            Category::Options => MARK_OPTIONS,
        }
    }
}

fn is_placeholder(c: char) -> bool {
    ('\u{fdd0}'..='\u{fdd4}').contains(&c)
}

#[derive(Debug, Error, PartialEq)]
pub enum HelpConfigError {
    #[error("unknown color name '{0}'")]
    UnknownColor(String),
}

/// A validated color: an ANSI color name, optionally bold.
///
/// Upper-case names mean bold (`"RED"` is bold red), and the pseudo-color
/// `"BOLD"` applies bold without a color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorSpec {
    color: Option<Color>,
    bold: bool,
}

impl ColorSpec {
    pub fn named(name: &str) -> Result<Self, HelpConfigError> {
        if name == "BOLD" {
            return Ok(Self {
                color: None,
                bold: true,
            });
        }
        let bold = name.chars().all(|c| c.is_ascii_uppercase());
        let color = match name.to_ascii_lowercase().as_str() {
            "black" => Color::Black,
            "red" => Color::Red,
            "green" => Color::Green,
            "yellow" => Color::Yellow,
            "blue" => Color::Blue,
            "magenta" => Color::Magenta,
            "cyan" => Color::Cyan,
            "white" => Color::White,
            _ => return Err(HelpConfigError::UnknownColor(name.to_string())),
        };
        Ok(Self {
            color: Some(color),
            bold,
        })
    }

    fn apply(&self, text: &str) -> String {
        let mut styled = match self.color {
            Some(color) => text.color(color),
            None => text.normal(),
        };
        if self.bold {
            styled = styled.bold();
        }
        styled.to_string()
    }
}

/// Help rendering configuration.
///
/// ### Example
/// ```
/// use declarg::HelpConfig;
///
/// let config = HelpConfig {
///     use_colors: Some(false),
///     output_width: Some(100),
///     ..HelpConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HelpConfig {
    /// `None` auto-detects from whether stdout is a terminal.
    pub use_colors: Option<bool>,
    pub color_choices: ColorSpec,
    pub color_defaults: ColorSpec,
    pub color_keywords: ColorSpec,
    pub color_metavars: ColorSpec,
    pub color_options: ColorSpec,
    /// `None` uses the terminal width.
    pub output_width: Option<usize>,
    /// The furthest column at which aligned help text may start.
    pub max_help_position: usize,
    pub marker_extras: (String, String),
    pub marker_choices: (String, String),
    /// Separates individual choices, and flag spellings in invocations.
    pub marker_choices_sep: String,
    /// When unset, the per-option extras (requiredness, defaults) are
    /// omitted.
    pub show_full_help: bool,
}

impl Default for HelpConfig {
    fn default() -> Self {
        Self {
            use_colors: None,
            color_choices: ColorSpec {
                color: Some(Color::Blue),
                bold: false,
            },
            color_defaults: ColorSpec {
                color: Some(Color::Yellow),
                bold: true,
            },
            color_keywords: ColorSpec {
                color: Some(Color::Green),
                bold: false,
            },
            color_metavars: ColorSpec {
                color: Some(Color::Red),
                bold: true,
            },
            color_options: ColorSpec {
                color: Some(Color::Cyan),
                bold: false,
            },
            output_width: None,
            max_help_position: 24,
            marker_extras: ("(".to_string(), ")".to_string()),
            marker_choices: ("{".to_string(), "}".to_string()),
            marker_choices_sep: "/".to_string(),
            show_full_help: true,
        }
    }
}

impl HelpConfig {
    fn resolved_width(&self) -> usize {
        match self.output_width {
            Some(width) => width,
            None => terminal_size()
                .map(|(Width(w), _)| w as usize)
                .unwrap_or(FALLBACK_WIDTH),
        }
    }

    fn colors_enabled(&self) -> bool {
        match self.use_colors {
            Some(enabled) => enabled,
            None => std::io::stdout().is_terminal(),
        }
    }

    fn spec_for(&self, category: Category) -> &ColorSpec {
        match category {
            Category::Choices => &self.color_choices,
            Category::Defaults => &self.color_defaults,
            Category::Keywords => &self.color_keywords,
            Category::Metavars => &self.color_metavars,
            Category::Options => &self.color_options,
        }
    }
}

/// Render the full help text for a registered parser.
pub fn render(parser: &ArgParser, program: &str, config: &HelpConfig) -> String {
    let width = config.resolved_width();
    let mut lines: Vec<String> = Vec::default();

    render_usage(parser, program, config, width, &mut lines);

    let positionals: Vec<&OptionSpec> = parser
        .sections()
        .iter()
        .flat_map(|section| section.options().iter())
        .filter(|option| option.is_positional())
        .collect();
    if !positionals.is_empty() {
        lines.push(String::default());
        lines.push("positional arguments:".to_string());
        let entries: Vec<(String, String)> = positionals
            .iter()
            .map(|option| entry_for(option, config))
            .collect();
        render_entries(&entries, config, width, &mut lines);
    }

    for (index, section) in parser.sections().iter().enumerate() {
        let mut entries: Vec<(String, String)> = Vec::default();
        if index == 0 {
            entries.push((
                format!(
                    "{}{}{}",
                    mark(Category::Options, "-h"),
                    config.marker_choices_sep,
                    mark(Category::Options, "--help")
                ),
                "show this help message and exit".to_string(),
            ));
        }
        entries.extend(
            section
                .options()
                .iter()
                .filter(|option| !option.is_positional())
                .map(|option| entry_for(option, config)),
        );
        if entries.is_empty() {
            continue;
        }
        lines.push(String::default());
        match section.title() {
            Some(title) => lines.push(format!("{title}:")),
            None => lines.push("options:".to_string()),
        }
        if let Some(help) = section.help_text() {
            lines.push(format!("  {help}"));
        }
        render_entries(&entries, config, width, &mut lines);
    }

    finish(lines.join("\n"), config)
}

fn render_usage(
    parser: &ArgParser,
    program: &str,
    config: &HelpConfig,
    width: usize,
    lines: &mut Vec<String>,
) {
    let mut items: Vec<String> = vec![format!("[{}]", mark(Category::Options, "-h"))];
    for section in parser.sections() {
        for option in section.options() {
            if option.is_positional() {
                continue;
            }
            items.push(usage_item(option));
        }
    }
    for section in parser.sections() {
        for option in section.options() {
            if option.is_positional() {
                items.push(invocation(option, config));
            }
        }
    }

    let prefix = format!("usage: {program} ");
    let indent = visible_len(&prefix);
    let mut wrapped = fill(&items, width, prefix, indent);
    lines.append(&mut wrapped);
}

fn usage_item(option: &OptionSpec) -> String {
    let first = option
        .flag_spellings()
        .first()
        .map(String::as_str)
        .unwrap_or(option.dest());
    let body = if option.is_toggle() {
        match first.strip_prefix("--") {
            Some(name) => format!(
                "{} | {}",
                mark(Category::Options, first),
                mark(Category::Options, &format!("--no-{name}"))
            ),
            None => mark(Category::Options, first),
        }
    } else {
        format!("{} {}", mark(Category::Options, first), metavar_cell(option))
    };
    if option.is_required() {
        body
    } else {
        format!("[{body}]")
    }
}

/// The invocation cell: the flag spellings (or the positional name) plus the
/// arity-decorated metavar.  Spellings join on the choice separator, so
/// `-s/--long ARGS` rather than `-s ARGS, --long ARGS`.
fn invocation(option: &OptionSpec, config: &HelpConfig) -> String {
    if option.is_positional() {
        return mark(Category::Metavars, &metavar_cell_plain(option));
    }
    let flags = option
        .flag_spellings()
        .iter()
        .map(|flag| mark(Category::Options, flag))
        .collect::<Vec<_>>()
        .join(&config.marker_choices_sep);
    if option.is_toggle() {
        let pairs = option
            .flag_spellings()
            .iter()
            .flat_map(|flag| match flag.strip_prefix("--") {
                Some(name) => vec![flag.clone(), format!("--no-{name}")],
                None => vec![flag.clone()],
            })
            .map(|flag| mark(Category::Options, &flag))
            .collect::<Vec<_>>();
        return pairs.join(&config.marker_choices_sep);
    }
    format!("{flags} {}", metavar_cell(option))
}

fn metavar_cell(option: &OptionSpec) -> String {
    mark(Category::Metavars, &metavar_cell_plain(option))
}

fn metavar_cell_plain(option: &OptionSpec) -> String {
    let base = if option.is_positional() && option.metavar_text().is_empty() {
        option.dest().to_string()
    } else {
        option.metavar_text().to_string()
    };
    match option.declared_arity() {
        // A nullable value is decorated as `[mv]`.
        Arity::Single if option.is_optional() => format!("[{base}]"),
        Arity::Single => base,
        Arity::ZeroOrMore => format!("[{base} ...]"),
        Arity::AtLeastOne => format!("{base} [{base} ...]"),
        Arity::Fixed(n) => vec![base; n].join(" "),
    }
}

/// The help cell: the declared help text, then the extras block holding the
/// choice list and the requiredness or default qualifier, e.g.
/// `({a/b} default: a)`.
fn entry_for(option: &OptionSpec, config: &HelpConfig) -> (String, String) {
    let mut cell = option.help_text().unwrap_or_default().to_string();
    if config.show_full_help {
        let choices = option.choice_values().map(|choices| {
            let joined = choices
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(&config.marker_choices_sep);
            mark(
                Category::Choices,
                &format!(
                    "{}{joined}{}",
                    config.marker_choices.0, config.marker_choices.1
                ),
            )
        });
        // Positionals can't be optional and carry no default.
        let qualifier = if option.is_positional() {
            None
        } else if option.is_required() {
            Some(mark(Category::Keywords, "required"))
        } else if let Some(default) = option.default_value() {
            Some(format!(
                "{} {}",
                mark(Category::Keywords, "default:"),
                mark(Category::Defaults, &default.to_string())
            ))
        } else {
            Some(mark(Category::Keywords, "optional"))
        };
        let extra = match (choices, qualifier) {
            (Some(choices), Some(qualifier)) => Some(format!("{choices} {qualifier}")),
            (Some(choices), None) => Some(choices),
            (None, Some(qualifier)) => Some(qualifier),
            (None, None) => None,
        };
        if let Some(extra) = extra {
            let block = format!("{}{extra}{}", config.marker_extras.0, config.marker_extras.1);
            cell = if cell.is_empty() {
                block
            } else {
                format!("{cell} {block}")
            };
        }
    }
    (invocation(option, config), cell)
}

/// Lay a section's entries out in two aligned columns, with a hanging indent
/// when the invocation overshoots the help column.
fn render_entries(
    entries: &[(String, String)],
    config: &HelpConfig,
    width: usize,
    lines: &mut Vec<String>,
) {
    let widest = entries
        .iter()
        .map(|(invocation, _)| visible_len(invocation))
        .filter(|len| *len <= config.max_help_position)
        .max()
        .unwrap_or(0);
    let help_col = 2 + widest + 2;

    for (invocation, help) in entries {
        let inv_len = visible_len(invocation);
        if help.is_empty() {
            lines.push(format!("  {invocation}"));
            continue;
        }
        let words: Vec<String> = help.split_whitespace().map(String::from).collect();
        if inv_len > config.max_help_position {
            lines.push(format!("  {invocation}"));
            let mut wrapped = fill(&words, width, " ".repeat(help_col), help_col);
            lines.append(&mut wrapped);
        } else {
            let first = format!("  {invocation}{}", " ".repeat(help_col - 2 - inv_len));
            let mut wrapped = fill(&words, width, first, help_col);
            lines.append(&mut wrapped);
        }
    }
}

/// Greedy word fill.  Items are atomic: an item longer than the width gets a
/// line of its own rather than being split.  The first item lands directly
/// after `first`, which the caller pads to the intended column.
fn fill(items: &[String], width: usize, first: String, indent: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::default();
    let mut current = first;
    let mut fresh = true;
    for item in items {
        if fresh {
            current.push_str(item);
            fresh = false;
        } else if visible_len(&current) + 1 + visible_len(item) <= width {
            current.push(' ');
            current.push_str(item);
        } else {
            lines.push(std::mem::replace(
                &mut current,
                format!("{}{item}", " ".repeat(indent)),
            ));
        }
    }
    lines.push(current);
    lines
}

fn mark(category: Category, text: &str) -> String {
    let c = category.placeholder();
    format!("{c}{text}{c}")
}

fn visible_len(text: &str) -> usize {
    text.chars().filter(|c| !is_placeholder(*c)).count()
}

/// Substitute (or strip) the placeholder-delimited runs.
fn finish(text: String, config: &HelpConfig) -> String {
    let enabled = config.colors_enabled();
    let mut output = String::with_capacity(text.len());
    let mut open: Option<(Category, String)> = None;
    for c in text.chars() {
        if !is_placeholder(c) {
            match open.as_mut() {
                Some((_, run)) => run.push(c),
                None => output.push(c),
            }
            continue;
        }
        match open.take() {
            Some((category, run)) if category.placeholder() == c => {
                if enabled {
                    output.push_str(&config.spec_for(category).apply(&run));
                } else {
                    output.push_str(&run);
                }
            }
            Some((_, run)) => {
                // Unbalanced run, emit it plainly and open the new one.
                output.push_str(&run);
                open = Some((category_of(c), String::default()));
                continue;
            }
            None => {
                open = Some((category_of(c), String::default()));
            }
        }
    }
    if let Some((_, run)) = open {
        output.push_str(&run);
    }
    output
}

fn category_of(c: char) -> Category {
    match c {
        MARK_CHOICES => Category::Choices,
        MARK_DEFAULTS => Category::Defaults,
        MARK_KEYWORDS => Category::Keywords,
        MARK_METAVARS => Category::Metavars,
        _ => Category::Options,
    }
}
