use std::fmt;

/// Message domain a subject maps to. Produced once at startup; the poll loop
/// never re-matches strings per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicDomain {
    Telemetry,
    Alert,
    Health,
    Inventory,
    Audit,
    Unrecognized,
}

impl fmt::Display for TopicDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TopicDomain::Telemetry => "telemetry",
            TopicDomain::Alert => "alert",
            TopicDomain::Health => "health",
            TopicDomain::Inventory => "inventory",
            TopicDomain::Audit => "audit",
            TopicDomain::Unrecognized => "unrecognized",
        };
        f.write_str(name)
    }
}

/// Classifies a subject by case-insensitive substring against a fixed
/// ordered keyword list; first match wins. The order matters for subjects
/// containing several keywords and matches the platform's conventions.
pub fn classify(subject: &str) -> TopicDomain {
    let s = subject.to_lowercase();
    if s.contains("inventory") {
        TopicDomain::Inventory
    } else if s.contains("health") {
        TopicDomain::Health
    } else if s.contains("alert") {
        TopicDomain::Alert
    } else if s.contains("telemetry") {
        TopicDomain::Telemetry
    } else if s.contains("audit") {
        TopicDomain::Audit
    } else {
        TopicDomain::Unrecognized
    }
}
