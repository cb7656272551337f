use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Raised by matchers when an expectation is not satisfied.
///
/// Carried as a panic payload so it unwinds out of arbitrarily nested user
/// code; the executor downcasts it back into a [`Failed`] outcome.
///
/// [`Failed`]: crate::types::TestOutcome::Failed
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ExpectationError {
    pub message: String,
}

/// Errors produced by the spy subsystem.
#[derive(Debug, Clone, Error)]
pub enum SpyError {
    /// The spy was invoked while its behaviour queue was empty.
    #[error("unexpected call to `{method}`: the behaviour queue is empty")]
    UnexpectedCall { method: String },

    /// An instance method was dispatched without a receiver argument.
    #[error("instance method `{method}` was dispatched without a receiver")]
    NullReceiver { method: String },

    /// Configuration-time coercion check: the configured return value is not
    /// assignable to the method's declared result type.
    #[error("cannot configure `{method}` to return a `{provided}`: its declared result type is `{declared}`")]
    ReturnTypeMismatch {
        method: String,
        declared: &'static str,
        provided: &'static str,
    },

    /// A configured `throws` behaviour fired. Displays as the inner error so
    /// the innermost message is the primary text of the failure.
    #[error("{0}")]
    Thrown(Arc<dyn StdError + Send + Sync>),

    /// The dispatcher could not recover the original implementation or
    /// another spy invariant was violated.
    #[error("spy internals: {0}")]
    Internal(String),
}

impl SpyError {
    /// The full cause chain, outermost first. A single-element chain for
    /// every variant except [`SpyError::Thrown`] with nested sources.
    pub fn chain(&self) -> Vec<String> {
        let mut chain = vec![self.to_string()];
        if let SpyError::Thrown(error) = self {
            let mut source = error.source();
            while let Some(cause) = source {
                chain.push(cause.to_string());
                source = cause.source();
            }
        }
        chain
    }

    /// Unwinds with `self` as the panic payload, failing the current test.
    pub(crate) fn raise(self) -> ! {
        std::panic::panic_any(self)
    }
}

/// Errors surfaced by [`TestRun::execute`](crate::runner::TestRun::execute)
/// itself. Errors raised inside hook or test bodies never appear here; they
/// become part of a test's result.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("execute() called while a previous execution of this run is still in progress")]
    AlreadyRunning,
}
