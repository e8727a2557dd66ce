//! Opaque string identifiers assigned by the server.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True for the placeholder produced by `Default` (missing on the wire).
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a board.
    BoardId
);
string_id!(
    /// Identifier of a column within a board.
    ColumnId
);
string_id!(
    /// Identifier of a task (card).
    TaskId
);
string_id!(
    /// Identifier of a user account.
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ColumnId::new("c1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"c1\"");
        let back: ColumnId = serde_json::from_str("\"c1\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn default_id_is_empty() {
        assert!(TaskId::default().is_empty());
        assert!(!TaskId::from("t1").is_empty());
    }

    #[test]
    fn display_matches_inner_value() {
        assert_eq!(BoardId::from("b-42").to_string(), "b-42");
    }
}
