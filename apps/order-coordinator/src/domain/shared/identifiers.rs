//! Strongly-typed identifiers for domain entities.
//!
//! These prevent mixing up IDs from different contexts: a managed order id is
//! never interchangeable with an OCA group id or a router-assigned order id.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generate a new unique identifier using UUID v4.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Get the inner string value.
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

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(
    ManagedOrderId,
    "Unique identifier for a managed order (coordinator internal)."
);
define_id!(
    OcaGroupId,
    "Identifier for a one-cancels-all group of managed orders."
);
define_id!(RouterId, "Identifier for an execution routing endpoint.");

/// Order identifier assigned by the routing endpoint on submission.
///
/// Zero or negative values mean "not assigned" / "submission rejected"; a
/// managed order only records a router order id when it is positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouterOrderId(i64);

impl RouterOrderId {
    /// Create a router order id from its raw value.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Whether this id marks a successful submission.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for RouterOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RouterOrderId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}
