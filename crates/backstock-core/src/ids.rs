//! Strongly Typed Identifiers
//!
//! Newtype wrappers around UUIDs for every entity the back-office tracks.
//! The types prevent accidental misuse of different ID kinds at compile time.
//!
//! # Example
//!
//! ```
//! use backstock_core::{AuditId, OutletId};
//!
//! let audit = AuditId::new();
//! let outlet = OutletId::new();
//!
//! fn requires_audit(id: AuditId) -> String {
//!     id.to_string()
//! }
//!
//! let result = requires_audit(audit);
//! // requires_audit(outlet); // This would not compile!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// The underlying UUID parse error message
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a strongly-typed ID type
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns a reference to the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Consumes the wrapper and returns the underlying UUID.
            #[must_use]
            pub fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        message: e.to_string(),
                    })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier of a stocktake audit.
    AuditId
}

define_id! {
    /// Identifier of a retail outlet.
    OutletId
}

define_id! {
    /// Identifier of an (audit, outlet) link row.
    AuditOutletId
}

define_id! {
    /// Identifier of an (audit, outlet, user) scan assignment.
    AssignmentId
}

define_id! {
    /// Identifier of an expected-stock upload log entry.
    UploadId
}

define_id! {
    /// Identifier of one product catalog version row.
    ProductId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct() {
        let a = AuditId::new();
        let b = AuditId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_roundtrip_through_string() {
        let id = OutletId::new();
        let parsed: OutletId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_failure_names_type() {
        let err = "not-a-uuid".parse::<AuditId>().unwrap_err();
        assert_eq!(err.id_type, "AuditId");
    }

    #[test]
    fn test_uuid_conversions() {
        let raw = Uuid::new_v4();
        let id = AssignmentId::from_uuid(raw);
        assert_eq!(id.into_uuid(), raw);
    }
}
