//! Alert severity tables shared by the normalizer and the router.
//!
//! OME encodes severities as a doubling numeric scheme; both directions of
//! the mapping are needed: value→name when normalizing raw alerts, and
//! name→value when the router computes a numeric severity for threshold
//! comparison.

/// Maps a numeric severity to its canonical name.
pub fn severity_name(value: i64) -> Option<&'static str> {
    match value {
        1 => Some("unknown"),
        2 => Some("info"),
        4 => Some("normal"),
        8 => Some("warning"),
        16 => Some("critical"),
        _ => None,
    }
}

/// Maps a severity name (any casing, surrounding whitespace ignored) to its
/// numeric value.
pub fn severity_value(name: &str) -> Option<i64> {
    match name.trim().to_lowercase().as_str() {
        "unknown" => Some(1),
        "info" => Some(2),
        "normal" => Some(4),
        "warning" => Some(8),
        "critical" => Some(16),
        _ => None,
    }
}

/// Canonical rendering of a numeric severity: the mapped name, or the literal
/// digits when the value is unmapped.
pub fn canonical_severity(value: i64) -> String {
    severity_name(value)
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_to_name_roundtrip() {
        for (name, value) in [
            ("unknown", 1),
            ("info", 2),
            ("normal", 4),
            ("warning", 8),
            ("critical", 16),
        ] {
            assert_eq!(severity_name(value), Some(name));
            assert_eq!(severity_value(name), Some(value));
        }
    }

    #[test]
    fn critical_is_sixteen() {
        assert_eq!(canonical_severity(16), "critical");
    }

    #[test]
    fn unmapped_value_renders_as_digits() {
        assert_eq!(canonical_severity(99), "99");
    }

    #[test]
    fn name_lookup_is_case_insensitive() {
        assert_eq!(severity_value("WARNING"), Some(8));
        assert_eq!(severity_value("  Critical "), Some(16));
        assert_eq!(severity_value("nonsense"), None);
    }
}
