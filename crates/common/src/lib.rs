//! Common types for the Taskboard workspace
//!
//! Shared by the libraries and the CLI: a redacting wrapper for credentials
//! and the configuration error type.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::{Secret, read_secret_file};
