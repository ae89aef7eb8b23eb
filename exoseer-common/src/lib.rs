//! # ExoSeer Common Library
//!
//! Shared code for the ExoSeer services:
//! - Error type used by configuration loading
//! - TOML configuration, threshold sections and layered resolution
//! - Pipeline progress events

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
