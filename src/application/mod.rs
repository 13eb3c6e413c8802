//! # Application Layer
//!
//! Service interfaces and the use cases that chain them into a transcription
//! job.

pub mod interfaces;
pub mod use_cases;

pub use interfaces::*;
pub use use_cases::*;
