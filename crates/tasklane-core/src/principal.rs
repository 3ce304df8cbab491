//! Authorization context for domain operations.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// The authenticated caller of a domain operation.
///
/// Produced by the outer authentication layer. Facade operations take an
/// `Option<&Principal>`; `None` means nobody is logged in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// The caller's user ID.
    pub user_id: UserId,
    /// Whether the caller holds administrative privilege.
    #[serde(default)]
    pub admin: bool,
}

impl Principal {
    /// A regular (non-admin) user.
    pub fn user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            admin: false,
        }
    }

    /// An administrator.
    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            admin: true,
        }
    }

    /// Whether this principal may modify a resource owned by `owner`.
    pub fn can_modify(&self, owner: &UserId) -> bool {
        self.admin || &self.user_id == owner
    }
}
