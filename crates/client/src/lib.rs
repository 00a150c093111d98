//! HTTP client for the donation platform's admin API.
//!
//! Implements [`peduli_core::remote::EntityApi`] over [`reqwest`] so list
//! views and batch actions can talk to a running platform.

pub mod api;
pub mod config;

pub use api::{ClientError, HttpEntityApi};
pub use config::{ClientConfig, ConfigError};
