//! # Domain Layer
//!
//! Core models, errors, and the pure services that turn model output into
//! musical events. Independent of runtimes, codecs and transport.

mod error;
pub mod models;
pub mod services;

pub use error::*;
pub use models::*;
pub use services::*;
