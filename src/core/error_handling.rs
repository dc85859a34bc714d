//! Generic error handling utilities
//!
//! Fatal process-level errors (bad configuration, unavailable listen port,
//! scanner initialization failure) are logged through a single path before
//! the process exits with a non-zero status.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)` with a message the operator can act on directly. System
/// errors return `None` and are reported with the operation context instead.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error carries a message that should be shown as-is
    ///
    /// Examples: invalid listen address, unknown scanner name, unreadable
    /// configuration file. Counter-examples: bind failures, I/O errors.
    fn is_user_actionable(&self) -> bool;

    /// Returns the specific user message if this is a user-actionable error
    fn user_message(&self) -> Option<&str>;
}

/// Build the primary fatal line for an error
pub fn fatal_message<E: ContextualError + std::fmt::Display>(
    error: &E,
    operation_context: &str,
) -> String {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => format!("FATAL: {}", user_msg),
        _ => format!("FATAL: {}: {}", operation_context, error),
    }
}

/// Log errors with appropriate detail level based on error specificity
///
/// User-actionable errors log their own message; system errors log the
/// operation context followed by the error. Debug output always carries the
/// full `Debug` representation.
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    log::error!("{}", fatal_message(error, operation_context));
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
