//! Shared prompt helpers for filling in missing settings.
//!
//! This module provides TTY detection and the dialoguer prompts used when
//! a required value was given neither as a flag nor in the environment.

use std::io::IsTerminal;

use dialoguer::{Input, Password};

use crate::error::{CliError, CliResult};

/// Checks if both stdin and stdout are connected to a terminal.
///
/// Returns `true` if running in an interactive TTY environment,
/// `false` if running in a pipe or CI environment.
pub fn is_interactive_terminal() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

/// Prompts for text input with validation.
///
/// Loops until valid input is provided or the user cancels.
pub fn prompt_text<F>(prompt: &str, validator: F) -> CliResult<String>
where
    F: Fn(&str) -> Result<(), String>,
{
    loop {
        let input: String = Input::new()
            .with_prompt(prompt)
            .interact_text()
            .map_err(|e| CliError::Io(e.to_string()))?;

        match validator(&input) {
            Ok(()) => return Ok(input.trim().to_string()),
            Err(msg) => eprintln!("Error: {}", msg),
        }
    }
}

/// Prompts for hidden input, such as a password.
pub fn prompt_password(prompt: &str) -> CliResult<String> {
    Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| CliError::Io(e.to_string()))
}

/// Prompts for optional text input.
///
/// Returns `None` if the user provides empty input.
pub fn prompt_text_optional(prompt: &str) -> CliResult<Option<String>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .map_err(|e| CliError::Io(e.to_string()))?;

    if input.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(input.trim().to_string()))
    }
}

/// Rejects empty input.
pub fn non_empty(input: &str) -> Result<(), String> {
    if input.trim().is_empty() {
        Err("A value is required".to_string())
    } else {
        Ok(())
    }
}

/// Source of answers for missing settings.
pub trait Prompter {
    /// Whether prompting is possible at all.
    fn is_interactive(&self) -> bool;

    /// Ask for a required value.
    fn required(&self, prompt: &str) -> CliResult<String>;

    /// Ask for a required value without echoing it.
    fn secret(&self, prompt: &str) -> CliResult<String>;

    /// Ask for a value the user may skip.
    fn optional(&self, prompt: &str) -> CliResult<Option<String>>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn is_interactive(&self) -> bool {
        is_interactive_terminal()
    }

    fn required(&self, prompt: &str) -> CliResult<String> {
        prompt_text(prompt, non_empty)
    }

    fn secret(&self, prompt: &str) -> CliResult<String> {
        prompt_password(prompt)
    }

    fn optional(&self, prompt: &str) -> CliResult<Option<String>> {
        prompt_text_optional(prompt)
    }
}
