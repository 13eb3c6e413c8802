mod audio_decoder;
mod midi_codec;
mod notation_converter;
mod transcription_service;

pub use audio_decoder::*;
pub use midi_codec::*;
pub use notation_converter::*;
pub use transcription_service::*;
