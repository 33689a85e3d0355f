//! Shared foundation for the framefusion service: the unified error type and
//! the application configuration.

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{Error, Result};
