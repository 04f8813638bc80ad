//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use nimbus_core::{UserId, Username};

/// A registered account.
///
/// The password hash never leaves the repository layer as part of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Unique login name.
    pub username: Username,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}
