//! Generator configuration.
//!
//! These are the process-level settings a [`Dialect`](crate::dialect::Dialect)
//! is built with. They deserialize from a camelCase JSON document so the same
//! file can be shared with other tooling.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How a NULL bound to a JSON column is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullJsonStringification {
    /// NULL becomes the JSON document `null`.
    #[default]
    Json,
    /// NULL stays SQL NULL.
    Sql,
    /// NULL is refused; callers must pick one explicitly.
    Explicit,
}

/// Options shared by every statement a dialect generates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratorOptions {
    /// Skip data type validation before escaping.
    pub no_type_validation: bool,
    /// When false, identifiers made only of lowercase letters, digits and
    /// underscores are emitted without delimiters.
    pub quote_identifiers: bool,
    /// UTC offset applied when rendering timestamps, such as `+02:00`.
    pub timezone: String,
    pub null_json_stringification: NullJsonStringification,
    /// Replaces the dialect's default schema.
    pub default_schema: Option<String>,
    /// Version of the connected server, compared against the dialect minimum.
    pub database_version: Option<String>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            no_type_validation: false,
            quote_identifiers: true,
            timezone: String::from("+00:00"),
            null_json_stringification: NullJsonStringification::default(),
            default_schema: None,
            database_version: None,
        }
    }
}

impl GeneratorOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables data type validation.
    #[must_use]
    pub const fn no_type_validation(mut self) -> Self {
        self.no_type_validation = true;
        self
    }

    /// Sets the timezone offset.
    #[must_use]
    pub fn timezone(mut self, offset: impl Into<String>) -> Self {
        self.timezone = offset.into();
        self
    }

    /// Sets how NULL is bound to JSON columns.
    #[must_use]
    pub const fn null_json(mut self, mode: NullJsonStringification) -> Self {
        self.null_json_stringification = mode;
        self
    }

    /// Controls identifier quoting.
    #[must_use]
    pub const fn quote_identifiers(mut self, quote: bool) -> Self {
        self.quote_identifiers = quote;
        self
    }

    /// Overrides the default schema.
    #[must_use]
    pub fn default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = Some(schema.into());
        self
    }

    /// Records the server version.
    #[must_use]
    pub fn database_version(mut self, version: impl Into<String>) -> Self {
        self.database_version = Some(version.into());
        self
    }

    /// Parses [`timezone`](Self::timezone) into an offset.
    ///
    /// Accepts `Z`, `UTC`, `+HH:MM`, `-HH:MM` and `+HHMM`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for anything else.
    pub fn timezone_offset(&self) -> Result<FixedOffset> {
        parse_offset(&self.timezone)
            .ok_or_else(|| Error::invalid(format!("invalid timezone offset {:?}", self.timezone)))
    }
}

fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_quote_and_validate() {
        let options = GeneratorOptions::default();
        assert!(options.quote_identifiers);
        assert!(!options.no_type_validation);
        assert_eq!(options.timezone_offset().unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn test_deserialize_partial_document() {
        let options: GeneratorOptions =
            serde_json::from_str(r#"{"timezone": "-05:30", "nullJsonStringification": "sql"}"#)
                .unwrap();
        assert_eq!(options.null_json_stringification, NullJsonStringification::Sql);
        assert_eq!(
            options.timezone_offset().unwrap().local_minus_utc(),
            -(5 * 3600 + 30 * 60)
        );
        assert!(options.quote_identifiers);
    }

    #[test]
    fn test_rejects_bad_offsets() {
        for bad in ["", "05:00", "+5", "+25:00", "Europe/Paris"] {
            assert!(GeneratorOptions::new().timezone(bad).timezone_offset().is_err());
        }
    }
}
