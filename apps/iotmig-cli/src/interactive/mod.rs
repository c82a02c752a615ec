//! Interactive prompting for missing settings.

pub mod prompts;

pub use prompts::{Prompter, TerminalPrompter};
