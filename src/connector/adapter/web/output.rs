use serde::Serialize;

use crate::domain::TranscriptionArtifacts;

use super::page::file_name;

/// Body of a successful `POST /api/transcribe`.
#[derive(Debug, Serialize)]
pub struct TranscribeOutput {
    /// Download URL of the generated MIDI file
    pub midi_url: String,

    /// Download URL of the MusicXML file, when one was produced
    pub musicxml_url: Option<String>,

    pub note_count: usize,
    pub pedal_count: usize,

    /// Length of the decoded audio in seconds
    pub audio_seconds: f64,

    /// Wall-clock processing time in seconds
    pub elapsed_seconds: f64,

    /// Device the model ran on (cpu, coreml, cuda)
    pub device: String,

    /// Transcription model name
    pub model: String,

    /// Why MusicXML was requested but not produced
    pub notation_error: Option<String>,

    /// Embeddable score fragment, when MusicXML was produced
    pub score_html: Option<String>,
}

impl TranscribeOutput {
    pub fn new(artifacts: &TranscriptionArtifacts, score_html: Option<String>) -> Self {
        Self {
            midi_url: file_url(artifacts.midi_path()),
            musicxml_url: artifacts.musicxml_path().map(file_url),
            note_count: artifacts.note_count(),
            pedal_count: artifacts.pedal_count(),
            audio_seconds: artifacts.audio_secs(),
            elapsed_seconds: artifacts.elapsed_secs(),
            device: artifacts.device().to_string(),
            model: artifacts.model().to_string(),
            notation_error: artifacts.notation_error().map(String::from),
            score_html,
        }
    }
}

pub fn file_url(path: &std::path::Path) -> String {
    format!("/files/{}", file_name(path).unwrap_or_default())
}
