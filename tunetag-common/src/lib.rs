//! # TuneTag Common Library
//!
//! Shared code for the TuneTag services:
//! - Error and result types
//! - TOML configuration model and resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
