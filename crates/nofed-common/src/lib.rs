//! # nofed-common
//!
//! Configuration and HTTP-facing error types shared by every nofed crate.
//! No bridge logic lives here.

pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::{NofedError, NofedResult};
