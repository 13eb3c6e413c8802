use async_trait::async_trait;

use crate::domain::{AudioClip, DomainError, PlacementReport, Transcription};

/// Converts audio into note events with a pretrained model.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Audio passed to `transcribe` must already be at this rate.
    fn sample_rate(&self) -> u32;

    fn model_name(&self) -> &str;

    fn placement(&self) -> &PlacementReport;

    async fn transcribe(&self, audio: &AudioClip) -> Result<Transcription, DomainError>;
}
