//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, login and bearer token verification
//! - `favorites` - Per-user favorite locations

pub mod auth;
pub mod favorites;

pub use auth::{AuthError, AuthService};
pub use favorites::{FavoritesError, FavoritesService};
