//! Error types for statement generation.

/// Errors that can occur while generating SQL.
///
/// None of these leave shared state behind: a failed call can be retried
/// with corrected input against the same [`Dialect`](crate::dialect::Dialect).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// An option was passed that the operation understands but the dialect
    /// does not implement.
    #[error(
        "The following options are not supported by {method} in {dialect}: {}",
        .options.join(", ")
    )]
    UnsupportedOption {
        /// The generator method that received the options.
        method: String,
        /// The dialect name.
        dialect: String,
        /// Every offending option, in the order they were received.
        options: Vec<String>,
    },

    /// A value failed data type validation.
    #[error("{value} is not a valid {expected}")]
    Validation {
        /// Debug rendering of the rejected value.
        value: String,
        /// The expected type, lowercased.
        expected: String,
    },

    /// A WHERE leaf could not be parsed into exactly one comparison.
    #[error(
        "Invalid WHERE shape under \"{key}\": {shape}. Wrap the comparand in an explicit operator such as {{\"eq\": ...}}"
    )]
    AmbiguousWhere {
        /// The attribute or key where parsing stopped.
        key: String,
        /// What was found there.
        shape: String,
    },

    /// Neither conflict fields, a unique index, nor a primary key could serve as
    /// the conflict target of an upsert.
    #[error("Cannot determine a conflict target for upsert on {table}")]
    NoUpsertKey {
        /// The table being upserted into.
        table: String,
    },

    /// Caller-supplied bind parameters use names reserved for generated ones.
    #[error(
        "Bind parameters cannot start with \"sequelize_\", these bind parameters use this prefix: {}",
        .names.join(", ")
    )]
    ReservedBindName {
        /// The colliding names.
        names: Vec<String>,
    },

    /// The dialect does not implement a feature at all.
    #[error("{feature} is not supported by the {dialect} dialect")]
    UnsupportedByDialect {
        /// The dialect name.
        dialect: String,
        /// The missing feature.
        feature: String,
    },

    /// Two data type overrides claimed the same type identity.
    #[error("Dialect {dialect} declares more than one implementation for DataType ID {id}")]
    DuplicateDataType {
        /// The dialect name.
        dialect: String,
        /// The duplicated identity.
        id: String,
    },

    /// A positional replacement (`?`) was found inside a literal.
    #[error(
        "The literal contains a positional replacement (?). Positional replacements are not supported in literals because their evaluation order cannot be guaranteed, use named replacements instead"
    )]
    PositionalReplacement,

    /// A named replacement was referenced but not provided.
    #[error("Named replacement \":{name}\" has no entry in the replacement map")]
    MissingReplacement {
        /// The replacement name.
        name: String,
    },

    /// The input descriptor is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub(crate) fn unsupported(dialect: &str, feature: impl Into<String>) -> Self {
        Self::UnsupportedByDialect {
            dialect: dialect.to_string(),
            feature: feature.into(),
        }
    }

    pub(crate) fn validation(value: impl std::fmt::Debug, expected: impl Into<String>) -> Self {
        Self::Validation {
            value: format!("{value:?}"),
            expected: expected.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_option_lists_every_key() {
        let err = Error::UnsupportedOption {
            method: "removeIndexQuery".into(),
            dialect: "sqlite".into(),
            options: vec!["cascade".into(), "concurrently".into()],
        };
        assert_eq!(
            err.to_string(),
            "The following options are not supported by removeIndexQuery in sqlite: cascade, concurrently"
        );
    }

    #[test]
    fn test_ambiguous_where_mentions_operator_wrapper() {
        let err = Error::AmbiguousWhere {
            key: "age".into(),
            shape: "object without operator keys".into(),
        };
        assert!(err.to_string().contains("explicit operator"));
    }
}
