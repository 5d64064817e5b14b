use crate::engine::ParseError;

/// Output boundary for help text and parse diagnostics.
pub trait UserInterface {
    fn print(&self, message: String);
    fn print_error(&self, error: ParseError);
}

/// Writes help to stdout and diagnostics to stderr.
#[derive(Default)]
pub struct ConsoleInterface {}

impl UserInterface for ConsoleInterface {
    fn print(&self, message: String) {
        println!("{message}");
    }

    fn print_error(&self, error: ParseError) {
        eprintln!("{error}");
    }
}
