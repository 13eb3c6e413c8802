use std::path::Path;

use async_trait::async_trait;

use crate::domain::{AudioClip, DomainError};

/// Decodes an audio file into mono samples at a target rate.
#[async_trait]
pub trait AudioDecoder: Send + Sync {
    async fn decode(&self, path: &Path, target_sample_rate: u32) -> Result<AudioClip, DomainError>;
}
