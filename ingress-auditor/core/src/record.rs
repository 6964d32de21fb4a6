use crate::{IngressId, Violation};
use chrono::{offset::Utc, DateTime, Timelike};
use rand::Rng;
use std::fmt;

/// Upper bound on the length of an audit record message, in characters.
pub const MAX_MESSAGE_LEN: usize = 120;

const NAME_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// An immutable record of a single detected violation.
///
/// Records are built here and handed to a [`Create`](crate::Create)
/// implementation; the core never reads them back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditRecord {
    pub name: String,
    pub level: Level,
    pub namespace: String,
    pub ingress_name: String,
    pub message: String,
    pub generation_timestamp: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Level {
    #[default]
    Error,
    Warn,
    Info,
}

// === impl AuditRecord ===

impl AuditRecord {
    pub fn build(id: &IngressId, violation: &Violation, at: DateTime<Utc>) -> Self {
        let suffix = rand::thread_rng().gen_range(0..10_000);
        Self::build_with_suffix(id, violation, at, suffix)
    }

    fn build_with_suffix(
        id: &IngressId,
        violation: &Violation,
        at: DateTime<Utc>,
        suffix: u16,
    ) -> Self {
        // Second precision is all the persisted schema retains.
        let at = at.with_nanosecond(0).unwrap_or(at);
        Self {
            name: format!(
                "{}-{}-{}-{:04}",
                id.namespace,
                id.name,
                at.format(NAME_TIMESTAMP_FORMAT),
                suffix
            ),
            level: Level::Error,
            namespace: id.namespace.clone(),
            ingress_name: id.name.clone(),
            message: truncate(violation.to_string(), MAX_MESSAGE_LEN),
            generation_timestamp: at,
        }
    }
}

fn truncate(mut message: String, max_chars: usize) -> String {
    if let Some((idx, _)) = message.char_indices().nth(max_chars) {
        message.truncate(idx);
    }
    message
}

// === impl Level ===

impl Level {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
