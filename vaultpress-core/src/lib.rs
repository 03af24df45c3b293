//! vaultpress core library: domain types, configuration persistence, errors.
//!
//! - [`types`]: newtypes and configuration structs
//! - [`error`]: [`ConfigError`]
//! - [`config`]: load / save / init

pub mod config;
pub mod error;
pub mod types;

pub use error::ConfigError;
pub use types::{PublishConfig, RemoteConfig, Slug};
