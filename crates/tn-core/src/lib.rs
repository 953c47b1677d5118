//! # tn-core
//!
//! Shared building blocks for the Turnout crates: the error type and the
//! log-density model trait that the sampler is written against.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;

pub use error::{Error, Result};

/// Crate version, shared by the `turnout` binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
