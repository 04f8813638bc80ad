//! Weather lookups: upstream client plus the cache-aside service on top.

pub mod client;
pub mod service;

pub use client::{OpenWeatherClient, UpstreamError, WeatherProvider};
pub use service::{WeatherError, WeatherService};
