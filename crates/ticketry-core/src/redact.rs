//! Redaction of sensitive values in keyed state.
//!
//! Two independent rules decide what gets redacted:
//!
//! 1. **Key name.** A key whose normalized name contains one of
//!    [`SENSITIVE_FIELDS`] is sensitive. A string under such a key is
//!    replaced with [`REDACTION_MARKER`]; any other value (object, array,
//!    number, boolean, null) is dropped, since a marker standing in for a
//!    structured value would misrepresent its shape.
//! 2. **Content.** A string under a non-sensitive key is still replaced when
//!    it looks like a credential: it mentions a password, token or secret, or
//!    it is a long base64-like blob.
//!
//! Nested objects under non-sensitive keys are walked recursively. Arrays are
//! copied as-is.
//!
//! Key names are normalized by lowercasing and removing `_`, `-`, `.` and
//! spaces before matching, so `api_key`, `API-Key` and `apiKey` are all
//! sensitive.

use serde_json::{Map, Value};
use tracing::debug;

/// Replacement for redacted string values.
pub const REDACTION_MARKER: &str = "***REDACTED***";

/// Normalized key fragments that mark a field as sensitive.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "apikey",
    "secret",
    "credential",
    "ssn",
    "creditcard",
];

/// Words that mark a string value as credential-like regardless of its key.
const SENSITIVE_CONTENT: &[&str] = &["password", "token", "secret"];

/// Minimum length for a string to be treated as an opaque base64-like token.
const MIN_OPAQUE_TOKEN_LEN: usize = 40;

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | '.' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Returns true if `key` names a sensitive field.
///
/// ```
/// use ticketry_core::redact::is_sensitive_key;
///
/// assert!(is_sensitive_key("password"));
/// assert!(is_sensitive_key("userPassword"));
/// assert!(is_sensitive_key("API_KEY"));
/// assert!(!is_sensitive_key("title"));
/// ```
#[must_use]
pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = normalize_key(key);
    SENSITIVE_FIELDS
        .iter()
        .any(|fragment| normalized.contains(fragment))
}

/// Returns true if a string value looks like a credential by content alone.
#[must_use]
pub fn looks_like_credential(value: &str) -> bool {
    if value == REDACTION_MARKER {
        return false;
    }

    let lower = value.to_lowercase();
    if SENSITIVE_CONTENT.iter().any(|word| lower.contains(word)) {
        return true;
    }

    is_opaque_token(value)
}

fn is_opaque_token(value: &str) -> bool {
    if value.len() < MIN_OPAQUE_TOKEN_LEN {
        return false;
    }

    let charset_ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '-' | '_'));

    charset_ok
        && value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_digit())
}

/// Counts of what a [`Redactor`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedactionStats {
    /// String values replaced with the redaction marker.
    pub redacted: usize,
    /// Non-string values removed from their parent object.
    pub dropped: usize,
}

impl RedactionStats {
    /// Returns true if nothing was redacted or dropped.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.redacted == 0 && self.dropped == 0
    }
}

/// Applies the redaction rules and keeps count of what it changed.
///
/// A single redactor can be reused across several values (for example every
/// snapshot and field change of one audit event) so the stats describe the
/// whole record.
#[derive(Debug, Default)]
pub struct Redactor {
    stats: RedactionStats,
}

impl Redactor {
    /// Creates a redactor with zeroed stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns what has been redacted so far.
    #[must_use]
    pub const fn stats(&self) -> RedactionStats {
        self.stats
    }

    /// Redacts a value that does not sit under a key.
    ///
    /// Objects are redacted field by field, strings are checked by content,
    /// everything else is returned unchanged.
    pub fn redact_value(&mut self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.redact_object(map)),
            Value::String(s) => self.redact_string(s),
            other => other.clone(),
        }
    }

    /// Redacts every entry of an object, recursing into nested objects.
    pub fn redact_object(&mut self, map: &Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::new();
        for (key, value) in map {
            if let Some(clean) = self.redact_entry(key, value) {
                out.insert(key.clone(), clean);
            }
        }
        out
    }

    /// Redacts a single keyed value.
    ///
    /// Returns `None` when the entry must be dropped from its parent.
    pub fn redact_entry(&mut self, key: &str, value: &Value) -> Option<Value> {
        if is_sensitive_key(key) {
            return match value {
                Value::String(s) => {
                    if s != REDACTION_MARKER {
                        self.stats.redacted += 1;
                    }
                    Some(Value::String(REDACTION_MARKER.to_string()))
                }
                _ => {
                    self.stats.dropped += 1;
                    None
                }
            };
        }

        match value {
            Value::Object(map) => Some(Value::Object(self.redact_object(map))),
            Value::String(s) => Some(self.redact_string(s)),
            other => Some(other.clone()),
        }
    }

    fn redact_string(&mut self, s: &str) -> Value {
        if looks_like_credential(s) {
            self.stats.redacted += 1;
            Value::String(REDACTION_MARKER.to_string())
        } else {
            Value::String(s.to_string())
        }
    }

    /// Logs the accumulated stats at debug level when anything changed.
    pub fn report(&self, record: &str) {
        if !self.stats.is_clean() {
            debug!(
                record,
                redacted = self.stats.redacted,
                dropped = self.stats.dropped,
                "Redacted sensitive values"
            );
        }
    }
}

/// Redacts an object with a throwaway [`Redactor`].
#[must_use]
pub fn redact_object(map: &Map<String, Value>) -> Map<String, Value> {
    Redactor::new().redact_object(map)
}
