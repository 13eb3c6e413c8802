use crate::domain::{DomainError, MidiScore, Transcription};

/// Standard MIDI file encoding of transcriptions.
pub trait MidiCodec: Send + Sync {
    fn encode(&self, transcription: &Transcription) -> Result<Vec<u8>, DomainError>;

    fn decode(&self, bytes: &[u8]) -> Result<MidiScore, DomainError>;
}
