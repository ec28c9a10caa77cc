//! Log formatting helpers

use serde::Serialize;
use std::fmt::{self, Debug, Display};

/// Renders a serializable value as an indented YAML block for a log line.
///
/// Used for request bodies and span attributes, which are easier to scan
/// as YAML than as one long JSON string:
///
/// ```ignore
/// debug!("reorder request: {}", Pretty(&body));
/// ```
///
/// Each YAML line is indented by two spaces and the block starts on its own
/// line. Values that fail to serialize fall back to `{:#?}`.
pub struct Pretty<T>(pub T);

impl<T: Serialize + Debug> Display for Pretty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match serde_yaml_ng::to_string(&self.0) {
            Ok(yaml) => yaml,
            Err(_) => format!("{:#?}", self.0),
        };
        for line in text.lines() {
            write!(f, "\n  {line}")?;
        }
        Ok(())
    }
}

// tracing's `?field` shorthand goes through Debug
impl<T: Serialize + Debug> Debug for Pretty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}
