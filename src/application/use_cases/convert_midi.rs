use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::application::NotationConverter;
use crate::domain::{base_name_of, DomainError};

/// A notation document written next to its source.
#[derive(Debug, Clone)]
pub struct NotationArtifact {
    pub path: PathBuf,
    pub document: String,
}

/// Converts an existing MIDI file into notation.
pub struct ConvertMidiUseCase {
    notation: Arc<dyn NotationConverter>,
    output_dir: PathBuf,
}

impl ConvertMidiUseCase {
    pub fn new(notation: Arc<dyn NotationConverter>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            notation,
            output_dir: output_dir.into(),
        }
    }

    pub async fn execute(&self, midi_path: &Path) -> Result<NotationArtifact, DomainError> {
        let midi = match tokio::fs::read(midi_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DomainError::not_found(format!(
                    "MIDI file not found: {}",
                    midi_path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let base_name = base_name_of(midi_path);
        let document = self.notation.convert(&midi, &base_name)?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self
            .output_dir
            .join(format!("{}.{}", base_name, self.notation.extension()));
        tokio::fs::write(&path, &document).await?;
        info!("Converted {} -> {}", midi_path.display(), path.display());

        Ok(NotationArtifact { path, document })
    }
}
