//! Inferred or declared SQL data types

use serde::{Deserialize, Serialize};
use std::fmt;

const UNKNOWN: &str = "<UNKNOWN>";

/// A data type as written in the source, or the "not yet inferred" sentinel
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SqlType {
    /// Not inferred yet
    #[default]
    Unknown,
    /// Concrete type text such as `DECIMAL(18,2)`
    Named(String),
}

impl SqlType {
    /// Wrap type text; empty text and the sentinel spelling map to [`SqlType::Unknown`]
    #[must_use]
    pub fn named(text: impl Into<String>) -> Self {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == UNKNOWN {
            Self::Unknown
        } else if trimmed.len() == text.len() {
            Self::Named(text)
        } else {
            Self::Named(trimmed.to_string())
        }
    }

    /// Plain `INT`
    #[must_use]
    pub fn int() -> Self {
        Self::Named("INT".to_string())
    }

    /// The generic decimal used for arithmetic and money-like columns
    #[must_use]
    pub fn decimal() -> Self {
        Self::Named("DECIMAL(18,2)".to_string())
    }

    /// Whether the type is still the sentinel
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// `INT` is what most heuristics guess first, so it may be replaced later
    #[must_use]
    pub fn is_generic_guess(&self) -> bool {
        matches!(self, Self::Named(name) if name.eq_ignore_ascii_case("INT"))
    }

    /// Type text, `<UNKNOWN>` for the sentinel
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unknown => UNKNOWN,
            Self::Named(name) => name,
        }
    }
}

impl From<String> for SqlType {
    fn from(text: String) -> Self {
        Self::named(text)
    }
}

impl From<&str> for SqlType {
    fn from(text: &str) -> Self {
        Self::named(text)
    }
}

impl From<SqlType> for String {
    fn from(ty: SqlType) -> Self {
        match ty {
            SqlType::Unknown => UNKNOWN.to_string(),
            SqlType::Named(name) => name,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
