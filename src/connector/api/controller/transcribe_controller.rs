use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::connector::adapter::web::page;
use crate::domain::{TranscribeRequest, TranscriptionArtifacts};

use super::super::Container;

pub struct TranscribeController<'a> {
    container: &'a Container,
}

impl<'a> TranscribeController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn transcribe(&self, audio: PathBuf, musicxml: bool, html: bool) -> Result<String> {
        let request = TranscribeRequest::new(audio).with_musicxml(musicxml || html);

        let use_case = self.container.transcribe_use_case().await?;
        let artifacts = use_case.execute(&request).await?;

        let html_path = match (html, artifacts.musicxml()) {
            (true, Some(document)) => {
                let score = self.container.renderer().render(document);
                let path = self
                    .container
                    .output_dir()
                    .join(format!("{}.html", artifacts.base_name()));
                tokio::fs::write(&path, page::score_page(artifacts.base_name(), &score)).await?;
                info!("Wrote {}", path.display());
                Some(path)
            }
            _ => None,
        };

        Ok(self.format_artifacts(&artifacts, html_path))
    }

    fn format_artifacts(&self, artifacts: &TranscriptionArtifacts, html: Option<PathBuf>) -> String {
        let mut output = format!(
            "Transcribed {}: {} notes, {} pedal events ({:.1}s of audio in {:.1}s on {})",
            artifacts.base_name(),
            artifacts.note_count(),
            artifacts.pedal_count(),
            artifacts.audio_secs(),
            artifacts.elapsed_secs(),
            artifacts.device()
        );

        output.push_str(&format!("\nMIDI:     {}", artifacts.midi_path().display()));
        if let Some(path) = artifacts.musicxml_path() {
            output.push_str(&format!("\nMusicXML: {}", path.display()));
        }
        if let Some(path) = html {
            output.push_str(&format!("\nHTML:     {}", path.display()));
        }
        if let Some(error) = artifacts.notation_error() {
            output.push_str(&format!("\nWarning: MusicXML conversion failed: {}", error));
        }

        output
    }
}
