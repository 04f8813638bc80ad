//! Core types for Nimbus.
//!
//! This module provides type-safe wrappers for the domain concepts.

pub mod city;
pub mod id;
pub mod username;
pub mod weather;

pub use city::{CityError, CityName};
pub use id::*;
pub use username::{Username, UsernameError};
pub use weather::{CacheKey, WeatherKind, WeatherPayload};
