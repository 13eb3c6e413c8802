use serde::{Deserialize, Serialize};

/// A note read back from a MIDI file, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreNote {
    pub start_tick: u32,
    pub duration_ticks: u32,
    pub pitch: u8,
    pub velocity: u8,
}

impl ScoreNote {
    pub fn end_tick(&self) -> u32 {
        self.start_tick.saturating_add(self.duration_ticks)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats: u8,
    pub beat_type: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

/// Tick-based view of a MIDI file used for notation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiScore {
    ticks_per_beat: u16,
    time_signature: TimeSignature,
    notes: Vec<ScoreNote>,
}

impl MidiScore {
    pub fn new(ticks_per_beat: u16, mut notes: Vec<ScoreNote>) -> Self {
        notes.sort_by_key(|n| (n.start_tick, n.pitch));
        Self {
            ticks_per_beat,
            time_signature: TimeSignature::default(),
            notes,
        }
    }

    pub fn with_time_signature(mut self, time_signature: TimeSignature) -> Self {
        self.time_signature = time_signature;
        self
    }

    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn notes(&self) -> &[ScoreNote] {
        &self.notes
    }
}
