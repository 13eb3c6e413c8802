use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use rand::Rng;
use rand::SeedableRng;
use tracing::debug;

use crate::application::TranscriptionService;
use crate::domain::{
    AudioClip, DomainError, NoteEvent, PedalEvent, PlacementReport, Transcription,
    PIANO_LOWEST_NOTE,
};

const MODEL_NAME: &str = "mock-transcriber";
const DEFAULT_SAMPLE_RATE: u32 = 16_000;
const NOTE_SPACING_SECS: f64 = 0.5;

/// Deterministic stand-in for the ONNX model: one note every half second.
pub struct MockTranscriber {
    sample_rate: u32,
    placement: PlacementReport,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self::with_sample_rate(DEFAULT_SAMPLE_RATE)
    }

    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            placement: PlacementReport::cpu(),
        }
    }

    fn seed(audio: &AudioClip) -> u64 {
        let mut hasher = DefaultHasher::new();
        audio.sample_rate().hash(&mut hasher);
        for sample in audio.samples() {
            sample.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }

    fn generate(&self, audio: &AudioClip) -> Transcription {
        let mut rng = rand::rngs::StdRng::seed_from_u64(Self::seed(audio));
        let duration = audio.duration_secs();

        let mut notes = Vec::new();
        let mut onset = 0.0;
        while onset + NOTE_SPACING_SECS <= duration + 1e-9 {
            // Stay in the middle of the keyboard so both staves get used.
            let pitch = rng.gen_range(PIANO_LOWEST_NOTE + 27..PIANO_LOWEST_NOTE + 60);
            let velocity = rng.gen_range(40..110);
            notes.push(NoteEvent::new(pitch, onset, onset + NOTE_SPACING_SECS, velocity));
            onset += NOTE_SPACING_SECS;
        }

        let pedals = if duration >= 2.0 {
            vec![PedalEvent::new(0.0, duration / 2.0)]
        } else {
            Vec::new()
        };

        Transcription::new(notes, MODEL_NAME)
            .with_pedals(pedals)
            .with_device(self.placement.effective())
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptionService for MockTranscriber {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn placement(&self) -> &PlacementReport {
        &self.placement
    }

    async fn transcribe(&self, audio: &AudioClip) -> Result<Transcription, DomainError> {
        if audio.sample_rate() != self.sample_rate {
            return Err(DomainError::invalid_input(format!(
                "Expected audio at {} Hz, got {} Hz",
                self.sample_rate,
                audio.sample_rate()
            )));
        }

        let transcription = self.generate(audio);
        debug!(
            "Generated {} mock notes for {:.2}s of audio",
            transcription.notes().len(),
            audio.duration_secs()
        );
        Ok(transcription)
    }
}
