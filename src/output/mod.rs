//! Output
//!
//! Live console progress and formatting of finished result trees.

mod console;
mod formatter;

pub use console::ConsoleListener;
pub use formatter::{write_results_to_file, OutputFormat, ResultFormatter};
