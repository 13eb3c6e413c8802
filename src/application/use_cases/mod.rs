mod convert_midi;
mod transcribe_audio;

pub use convert_midi::*;
pub use transcribe_audio::*;
