//! Detection of a C/C++ compiler's built-in include paths and macros.
//!
//! The compiler is run with flags that make it dump its search lists and
//! predefined macros. Its raw output is pushed through an [`OutputSniffer`],
//! which cuts it into lines for a [`GccOutputProcessor`], which in turn
//! records [`SettingsEntry`] values into a [`ProcessingContext`].

pub mod args;
pub mod command;
pub mod context;
pub mod detect;
pub mod entry;
pub mod processor;
pub mod sniffer;
mod utils;

pub use context::{ProcessingContext, ProcessingResult};
pub use detect::Detector;
pub use entry::{EntryFlags, EntryKind, SettingsEntry};
pub use processor::{GccOutputProcessor, OutputProcessor, ParserState};
pub use sniffer::OutputSniffer;
