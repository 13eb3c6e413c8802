use crate::domain::DomainError;

/// Converts MIDI bytes into a notation document.
pub trait NotationConverter: Send + Sync {
    /// File extension of the produced document, without the dot.
    fn extension(&self) -> &'static str;

    fn convert(&self, midi: &[u8], title: &str) -> Result<String, DomainError>;
}
