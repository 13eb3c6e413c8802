use serde::{Deserialize, Serialize};

use super::ComputeDevice;

/// Lowest key of an 88-key piano (A0).
pub const PIANO_LOWEST_NOTE: u8 = 21;

/// A transcribed note with absolute times in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub pitch: u8,
    pub onset_secs: f64,
    pub offset_secs: f64,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn new(pitch: u8, onset_secs: f64, offset_secs: f64, velocity: u8) -> Self {
        Self {
            pitch,
            onset_secs,
            offset_secs,
            velocity,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        (self.offset_secs - self.onset_secs).max(0.0)
    }
}

/// Sustain pedal press.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PedalEvent {
    pub onset_secs: f64,
    pub offset_secs: f64,
}

impl PedalEvent {
    pub fn new(onset_secs: f64, offset_secs: f64) -> Self {
        Self {
            onset_secs,
            offset_secs,
        }
    }
}

/// Output of a transcription model run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    notes: Vec<NoteEvent>,
    pedals: Vec<PedalEvent>,
    model: String,
    device: ComputeDevice,
}

impl Transcription {
    pub fn new(mut notes: Vec<NoteEvent>, model: impl Into<String>) -> Self {
        notes.sort_by(|a, b| {
            a.onset_secs
                .total_cmp(&b.onset_secs)
                .then(a.pitch.cmp(&b.pitch))
        });
        Self {
            notes,
            pedals: Vec::new(),
            model: model.into(),
            device: ComputeDevice::Cpu,
        }
    }

    pub fn with_pedals(mut self, mut pedals: Vec<PedalEvent>) -> Self {
        pedals.sort_by(|a, b| a.onset_secs.total_cmp(&b.onset_secs));
        self.pedals = pedals;
        self
    }

    pub fn with_device(mut self, device: ComputeDevice) -> Self {
        self.device = device;
        self
    }

    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    pub fn pedals(&self) -> &[PedalEvent] {
        &self.pedals
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn device(&self) -> ComputeDevice {
        self.device
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcription_sorts_notes() {
        let transcription = Transcription::new(
            vec![
                NoteEvent::new(64, 1.0, 1.5, 80),
                NoteEvent::new(60, 0.5, 1.0, 80),
                NoteEvent::new(55, 1.0, 2.0, 80),
            ],
            "test",
        );

        let pitches: Vec<u8> = transcription.notes().iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 55, 64]);
        assert_eq!(transcription.model(), "test");
    }

    #[test]
    fn test_pedals_are_sorted() {
        let transcription = Transcription::new(vec![NoteEvent::new(60, 0.0, 1.0, 64)], "test")
            .with_pedals(vec![PedalEvent::new(2.0, 3.0), PedalEvent::new(0.0, 1.0)]);
        assert_eq!(transcription.pedals()[0].onset_secs, 0.0);
    }
}
