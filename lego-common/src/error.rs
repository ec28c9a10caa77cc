//! Error severity classification
//!
//! Component errors are domain specific, but callers often only need to know
//! how loudly to report them. Every error enum in the workspace implements
//! [`Severity`] so that question has one answer.

use std::fmt;

/// How serious an error is for the component that produced it.
///
/// - **Warning**: the operation degraded (fell back, skipped) but state is intact.
/// - **Error**: the operation failed; the component keeps working.
/// - **Critical**: a caller broke a precondition; this is a programming error.
///
/// ```rust
/// use lego_common::ErrorSeverity;
///
/// assert!(ErrorSeverity::Critical > ErrorSeverity::Warning);
/// assert_eq!(ErrorSeverity::Error.to_string(), "error");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Operation degraded but the component state is intact
    Warning,
    /// Operation failed, component continues
    Error,
    /// Precondition violation that should be fixed in the calling code
    Critical,
}

impl ErrorSeverity {
    /// Lowercase name, suitable for log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for error types that can report an [`ErrorSeverity`].
///
/// ```rust
/// use lego_common::{ErrorSeverity, Severity};
///
/// #[derive(Debug)]
/// enum FetchError {
///     Offline,
///     BadInput,
/// }
///
/// impl Severity for FetchError {
///     fn severity(&self) -> ErrorSeverity {
///         match self {
///             FetchError::Offline => ErrorSeverity::Warning,
///             FetchError::BadInput => ErrorSeverity::Critical,
///         }
///     }
/// }
///
/// assert_eq!(FetchError::Offline.severity(), ErrorSeverity::Warning);
/// assert!(FetchError::BadInput.is_critical());
/// ```
pub trait Severity {
    /// Severity level of this error
    fn severity(&self) -> ErrorSeverity;

    /// True when the error signals a programming mistake
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }
}
