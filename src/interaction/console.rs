//! Terminal implementation of the interaction capability.

use anyhow::Result;
use std::io::{self, BufRead, Write};

use super::UserInteraction;

/// Testable core of [`ConsoleInteraction::confirm`], reading from any
/// `BufRead` and writing to any `Write`.
pub(crate) fn confirm_with_io<R: BufRead, W: Write>(
    prompt: &str,
    default: bool,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    write!(output, "{} {} ", prompt, hint)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    let response = line.trim().to_lowercase();
    Ok(match response.as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    })
}

/// Testable core of [`ConsoleInteraction::ask`].
pub(crate) fn ask_with_io<R: BufRead, W: Write>(
    prompt: &str,
    default: &str,
    input: &mut R,
    output: &mut W,
) -> Result<String> {
    write!(output, "{} [{}] ", prompt, default)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    let response = line.trim();
    Ok(if response.is_empty() {
        default.to_string()
    } else {
        response.to_string()
    })
}

/// Interaction over stdin/stdout. With `assume_yes`, confirmations are
/// answered "yes" without prompting.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleInteraction {
    assume_yes: bool,
}

impl ConsoleInteraction {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl UserInteraction for ConsoleInteraction {
    fn info(&self, message: &str) -> Result<()> {
        println!("{}", message);
        Ok(())
    }

    fn error(&self, message: &str) -> Result<()> {
        eprintln!("error: {}", message);
        Ok(())
    }

    fn log(&self, message: &str) -> Result<()> {
        log::info!("{}", message);
        Ok(())
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut stdin_lock = stdin.lock();
        confirm_with_io(prompt, default, &mut stdin_lock, &mut stdout)
    }

    fn ask(&self, prompt: &str, default: &str) -> Result<String> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut stdin_lock = stdin.lock();
        ask_with_io(prompt, default, &mut stdin_lock, &mut stdout)
    }
}
