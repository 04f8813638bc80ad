//! Nimbus Core - Shared domain types.
//!
//! This crate provides the types shared by the Nimbus components:
//! - `server` - REST and GraphQL API plus the background refresh job
//! - `cli` - Command-line tools for migrations and one-off refresh runs
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Validation happens at construction so the rest of the
//! workspace can pass these values around without re-checking them.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, usernames, city names, weather payloads and cache keys

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
