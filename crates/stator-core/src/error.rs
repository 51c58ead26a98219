// ── Core error types ──
//
// Errors surfaced by the store. Mutator and reader failures never reach the
// caller of `set`/`get` directly; they are handed to the store's error sink
// while the worker keeps running on the last good snapshot.

use std::any::Any;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Store is closed")]
    Closed,

    #[error("Concurrent mode requires a running tokio runtime")]
    NoRuntime,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Job failures (reported to the error sink) ────────────────────
    #[error("Mutator panicked: {message}")]
    MutatorPanicked { message: String },

    #[error("Mutator failed: {message}")]
    MutatorFailed { message: String },

    #[error("Reader panicked: {message}")]
    ReaderPanicked { message: String },
}

impl StoreError {
    /// True for errors produced by a user-supplied mutator or reader.
    pub fn is_job_failure(&self) -> bool {
        matches!(
            self,
            Self::MutatorPanicked { .. } | Self::MutatorFailed { .. } | Self::ReaderPanicked { .. }
        )
    }
}

/// Extract a readable message from a `catch_unwind` payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_handles_str_and_string() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "<non-string panic payload>");
    }

    #[test]
    fn job_failures_are_classified() {
        assert!(StoreError::ReaderPanicked { message: "x".into() }.is_job_failure());
        assert!(StoreError::MutatorFailed { message: "x".into() }.is_job_failure());
        assert!(!StoreError::Closed.is_job_failure());
        assert!(!StoreError::NoRuntime.is_job_failure());
    }
}
