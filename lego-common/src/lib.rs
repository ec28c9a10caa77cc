//! Shared building blocks for the lego components
//!
//! The component crates (`lego-kanban`, `lego-telemetry`) stay independent of
//! each other. The only things they share live here: a severity vocabulary for
//! their error types and a log formatting helper.

mod error;
mod logging;

pub use error::{ErrorSeverity, Severity};
pub use logging::Pretty;
