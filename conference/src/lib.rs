//! Conference enrollment application.
//!
//! Wires the enrollment runtime to an in-memory store, loads configuration
//! from the environment and seeds rooms, participants and events from JSON.

pub mod app;
pub mod config;
pub mod seed;

pub use app::{AppError, ConferenceApp};
pub use config::{Config, ConfigError, DEFAULT_LOG_FILTER, RetryConfig};
pub use seed::{Seed, SeedError, SeededIds};
