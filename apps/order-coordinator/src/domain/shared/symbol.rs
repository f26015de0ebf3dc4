//! Symbol value object for instrument identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A trading symbol (ticker).
///
/// Normalized to uppercase on construction, so `Symbol::new("spy")` and
/// `Symbol::new("SPY")` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a new Symbol.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().to_uppercase())
    }

    /// Get the symbol string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_normalizes_to_uppercase() {
        assert_eq!(Symbol::new("spy"), Symbol::new("SPY"));
        assert_eq!(Symbol::new("aapl").as_str(), "AAPL");
    }

    #[test]
    fn symbol_display() {
        assert_eq!(format!("{}", Symbol::new("msft")), "MSFT");
    }
}
