use crate::error::{Result, TelemetryError};
use std::collections::BTreeMap;

const RESERVED_PREFIX: &str = "__";

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`, not starting with `__`
pub(crate) fn validate_metric_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(is_metric_start) && chars.all(is_metric_char);
    if !valid {
        return Err(TelemetryError::InvalidMetricName {
            name: name.to_string(),
        });
    }
    if name.starts_with(RESERVED_PREFIX) {
        return Err(TelemetryError::ReservedMetricName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, not starting with `__`
pub(crate) fn validate_label_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(is_label_start)
        && chars.all(is_label_char)
        && !name.starts_with(RESERVED_PREFIX);
    if valid {
        Ok(())
    } else {
        Err(TelemetryError::InvalidLabelName {
            name: name.to_string(),
        })
    }
}

/// Validate label names and sort them into the canonical series key
pub(crate) fn normalize_labels(labels: &[(&str, &str)]) -> Result<BTreeMap<String, String>> {
    labels
        .iter()
        .map(|(name, value)| {
            validate_label_name(name)?;
            Ok::<_, TelemetryError>((name.to_string(), value.to_string()))
        })
        .collect()
}

fn is_metric_start(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '_' | ':')
}

fn is_metric_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ':')
}

fn is_label_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        for name in ["reqs_total", "http:requests", "_private", "a1"] {
            assert!(validate_metric_name(name).is_ok(), "{name}");
        }
        for name in ["", "1abc", "has-dash", "has.dot", "sp ace", "ümlaut"] {
            assert!(
                matches!(
                    validate_metric_name(name),
                    Err(TelemetryError::InvalidMetricName { .. })
                ),
                "{name}"
            );
        }
        assert!(matches!(
            validate_metric_name("__internal"),
            Err(TelemetryError::ReservedMetricName { .. })
        ));
    }

    #[test]
    fn test_label_names() {
        assert!(validate_label_name("method").is_ok());
        assert!(validate_label_name("_x").is_ok());
        for name in ["", "with:colon", "9lives", "__reserved"] {
            assert!(validate_label_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn test_normalize_sorts_labels() {
        let a = normalize_labels(&[("method", "GET"), ("code", "200")]).unwrap();
        let b = normalize_labels(&[("code", "200"), ("method", "GET")]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.keys().collect::<Vec<_>>(), vec!["code", "method"]);
    }
}
