//! Common error types for ExoSeer

use thiserror::Error;

/// Common result type for ExoSeer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across ExoSeer crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
