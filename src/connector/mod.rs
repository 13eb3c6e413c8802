//! # Connector Layer
//!
//! External integrations implementing application interfaces:
//! - Audio decoding (symphonia + rubato)
//! - Transcription (ONNX Runtime, or a deterministic mock)
//! - MIDI and MusicXML writers, score HTML
//! - Web server and CLI wiring

pub mod adapter;
pub mod api;

pub use adapter::*;
pub use api::*;
