mod midly_codec;
mod mock_transcriber;
mod musicxml_converter;
mod ort_transcriber;
mod score_renderer;
mod symphonia_decoder;
pub mod web;

pub use midly_codec::*;
pub use mock_transcriber::*;
pub use musicxml_converter::*;
pub use ort_transcriber::*;
pub use score_renderer::*;
pub use symphonia_decoder::*;
