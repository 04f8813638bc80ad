//! Domain models for the weather server.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod location;
pub mod user;

pub use location::Location;
pub use user::User;
