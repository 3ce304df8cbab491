//! Branded ID newtypes for type safety.
//!
//! Every persisted entity has a distinct ID type implemented as a newtype
//! around `String`. Generated IDs are UUID v7 (time-ordered) with an
//! entity-specific prefix, e.g. `task-0190c5...`.
//!
//! The types bind directly as `rusqlite` parameters and read back from
//! `TEXT` columns, so repositories never juggle raw strings.

use std::fmt;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix used for generated IDs of this type.
            pub const PREFIX: &'static str = $prefix;

            /// Generate a fresh prefixed UUID v7 ID.
            #[must_use]
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, Uuid::now_v7()))
            }

            /// Wrap an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::Borrowed(ValueRef::Text(self.0.as_bytes())))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                String::column_result(value).map(Self)
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a task.
    TaskId, "task"
}

branded_id! {
    /// Unique identifier for a shared tag.
    TagId, "tag"
}

branded_id! {
    /// Unique identifier for a checklist owned by a task.
    ChecklistId, "chk"
}

branded_id! {
    /// Unique identifier for an item owned by a checklist.
    ChecklistItemId, "item"
}

branded_id! {
    /// Unique identifier for a task category.
    CategoryId, "cat"
}

branded_id! {
    /// Identifier of an authenticated user. Issued by the outer auth layer.
    UserId, "user"
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
