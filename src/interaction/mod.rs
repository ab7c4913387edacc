//! User interaction capability consumed by repository operations.
//!
//! Repository operations never talk to a terminal directly. They receive a
//! [`UserInteraction`] from the caller, which decides how messages are shown
//! and how questions are answered.

mod console;

use anyhow::Result;

pub use console::ConsoleInteraction;

/// Messages and questions raised while operating on a repository.
///
/// Every method may fail; a failure aborts the running operation.
#[cfg_attr(test, mockall::automock)]
pub trait UserInteraction {
    /// Informational message meant for the user.
    fn info(&self, message: &str) -> Result<()>;

    /// Error message meant for the user. Does not abort anything by itself.
    fn error(&self, message: &str) -> Result<()>;

    /// Diagnostic message, usually only recorded.
    fn log(&self, message: &str) -> Result<()>;

    /// Yes/no question. `default` is the answer when the user gives none.
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;

    /// Free-form question. `default` is the answer when the user gives none.
    fn ask(&self, prompt: &str, default: &str) -> Result<String>;
}

/// Non-interactive strategy: every question gets its default answer and
/// messages go to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchInteraction;

impl UserInteraction for BatchInteraction {
    fn info(&self, message: &str) -> Result<()> {
        log::info!("{}", message);
        Ok(())
    }

    fn error(&self, message: &str) -> Result<()> {
        log::error!("{}", message);
        Ok(())
    }

    fn log(&self, message: &str) -> Result<()> {
        log::debug!("{}", message);
        Ok(())
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        log::debug!("{} -> {}", prompt, default);
        Ok(default)
    }

    fn ask(&self, prompt: &str, default: &str) -> Result<String> {
        log::debug!("{} -> {}", prompt, default);
        Ok(default.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_answers_defaults() {
        let batch = BatchInteraction;
        assert!(batch.confirm("Replace?", true).unwrap());
        assert!(!batch.confirm("Replace?", false).unwrap());
        assert_eq!(batch.ask("Name?", "hello").unwrap(), "hello");
    }

    #[test]
    fn test_batch_messages_never_fail() {
        let batch = BatchInteraction;
        assert!(batch.info("installed").is_ok());
        assert!(batch.error("broken").is_ok());
        assert!(batch.log("detail").is_ok());
    }
}
