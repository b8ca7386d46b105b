//! Run parameters: the TOML schema, its defaults, `key=value` assignment with
//! abbreviated keys, and resolution into an immutable [`FitConfiguration`].

pub mod assign;
pub mod builder;
pub mod defaults;
pub mod file;
pub mod models;

pub use crate::engine::config::ConfigError;
pub use builder::{FitConfigurationBuilder, resolve_configuration};
pub use models::FitConfiguration;
