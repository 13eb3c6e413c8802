use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ComputeDevice;

/// A single transcription job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeRequest {
    audio_path: Option<PathBuf>,
    with_musicxml: bool,
}

impl TranscribeRequest {
    pub fn new(audio_path: impl Into<PathBuf>) -> Self {
        Self {
            audio_path: Some(audio_path.into()),
            with_musicxml: false,
        }
    }

    /// A request whose upload never arrived.
    pub fn empty() -> Self {
        Self {
            audio_path: None,
            with_musicxml: false,
        }
    }

    pub fn with_musicxml(mut self, enabled: bool) -> Self {
        self.with_musicxml = enabled;
        self
    }

    pub fn audio_path(&self) -> Option<&Path> {
        self.audio_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    pub fn wants_musicxml(&self) -> bool {
        self.with_musicxml
    }
}

/// Files and metadata produced by a transcription job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionArtifacts {
    base_name: String,
    midi_path: PathBuf,
    musicxml_path: Option<PathBuf>,
    #[serde(skip)]
    musicxml: Option<String>,
    notation_error: Option<String>,
    note_count: usize,
    pedal_count: usize,
    audio_secs: f64,
    elapsed_secs: f64,
    device: ComputeDevice,
    model: String,
}

impl TranscriptionArtifacts {
    pub fn new(base_name: impl Into<String>, midi_path: PathBuf) -> Self {
        Self {
            base_name: base_name.into(),
            midi_path,
            musicxml_path: None,
            musicxml: None,
            notation_error: None,
            note_count: 0,
            pedal_count: 0,
            audio_secs: 0.0,
            elapsed_secs: 0.0,
            device: ComputeDevice::Cpu,
            model: String::new(),
        }
    }

    pub fn with_counts(mut self, notes: usize, pedals: usize) -> Self {
        self.note_count = notes;
        self.pedal_count = pedals;
        self
    }

    pub fn with_timing(mut self, audio_secs: f64, elapsed_secs: f64) -> Self {
        self.audio_secs = audio_secs;
        self.elapsed_secs = elapsed_secs;
        self
    }

    pub fn with_device(mut self, device: ComputeDevice) -> Self {
        self.device = device;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_musicxml(mut self, path: PathBuf, document: String) -> Self {
        self.musicxml_path = Some(path);
        self.musicxml = Some(document);
        self
    }

    pub fn with_notation_error(mut self, error: impl Into<String>) -> Self {
        self.notation_error = Some(error.into());
        self
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn midi_path(&self) -> &Path {
        &self.midi_path
    }

    pub fn musicxml_path(&self) -> Option<&Path> {
        self.musicxml_path.as_deref()
    }

    pub fn musicxml(&self) -> Option<&str> {
        self.musicxml.as_deref()
    }

    pub fn notation_error(&self) -> Option<&str> {
        self.notation_error.as_deref()
    }

    pub fn note_count(&self) -> usize {
        self.note_count
    }

    pub fn pedal_count(&self) -> usize {
        self.pedal_count
    }

    pub fn audio_secs(&self) -> f64 {
        self.audio_secs
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    pub fn device(&self) -> ComputeDevice {
        self.device
    }

    /// Name of the transcription model that produced the notes.
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Derives the artifact base name from an input path (`take 1.mp3` -> `take 1`).
pub fn base_name_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("transcription")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path_is_missing() {
        assert!(TranscribeRequest::empty().audio_path().is_none());
        assert!(TranscribeRequest::new("").audio_path().is_none());
        assert!(TranscribeRequest::new("a.wav").audio_path().is_some());
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name_of(Path::new("/tmp/up/Nocturne Op 9.mp3")), "Nocturne Op 9");
        assert_eq!(base_name_of(Path::new("clip.tar.wav")), "clip.tar");
        assert_eq!(base_name_of(Path::new("/")), "transcription");
    }
}
