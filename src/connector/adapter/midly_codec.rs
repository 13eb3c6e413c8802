use std::collections::{HashMap, VecDeque};

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use tracing::debug;

use crate::application::MidiCodec;
use crate::domain::{DomainError, MidiScore, ScoreNote, TimeSignature, Transcription};

pub const TICKS_PER_BEAT: u16 = 384;
const MICROSECONDS_PER_BEAT: u32 = 500_000;
const PIANO_CHANNEL: u8 = 0;
const PERCUSSION_CHANNEL: u8 = 9;
const SUSTAIN_PEDAL: u8 = 64;

/// Event ordering within a tick: releases before presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    NoteOff,
    PedalUp,
    PedalDown,
    NoteOn,
}

/// Standard MIDI file writer/reader built on midly.
#[derive(Debug, Clone, Default)]
pub struct MidlyCodec;

impl MidlyCodec {
    pub fn new() -> Self {
        Self
    }

    fn ticks_per_second() -> f64 {
        TICKS_PER_BEAT as f64 * 1_000_000.0 / MICROSECONDS_PER_BEAT as f64
    }

    fn to_ticks(secs: f64) -> u32 {
        (secs.max(0.0) * Self::ticks_per_second()).round() as u32
    }

    fn conductor_track() -> Vec<TrackEvent<'static>> {
        vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::TrackName(b"pianoscribe")),
            },
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(MICROSECONDS_PER_BEAT))),
            },
            TrackEvent {
                delta: u28::new(0),
                // 4/4, denominator as a power of two, 24 clocks per click, 8 32nds per quarter
                kind: TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8)),
            },
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            },
        ]
    }

    fn piano_track(transcription: &Transcription) -> Vec<TrackEvent<'static>> {
        let channel = u4::new(PIANO_CHANNEL);
        let mut timeline: Vec<(u32, Slot, MidiMessage)> =
            Vec::with_capacity(transcription.notes().len() * 2 + transcription.pedals().len() * 2);

        for note in transcription.notes() {
            let on = Self::to_ticks(note.onset_secs);
            let off = Self::to_ticks(note.offset_secs).max(on + 1);
            let key = u7::new(note.pitch.min(127));
            timeline.push((
                on,
                Slot::NoteOn,
                MidiMessage::NoteOn {
                    key,
                    vel: u7::new(note.velocity.clamp(1, 127)),
                },
            ));
            timeline.push((
                off,
                Slot::NoteOff,
                MidiMessage::NoteOff {
                    key,
                    vel: u7::new(0),
                },
            ));
        }

        for pedal in transcription.pedals() {
            let down = Self::to_ticks(pedal.onset_secs);
            let up = Self::to_ticks(pedal.offset_secs).max(down + 1);
            timeline.push((
                down,
                Slot::PedalDown,
                MidiMessage::Controller {
                    controller: u7::new(SUSTAIN_PEDAL),
                    value: u7::new(127),
                },
            ));
            timeline.push((
                up,
                Slot::PedalUp,
                MidiMessage::Controller {
                    controller: u7::new(SUSTAIN_PEDAL),
                    value: u7::new(0),
                },
            ));
        }

        timeline.sort_by_key(|(tick, slot, _)| (*tick, *slot));

        let mut track = Vec::with_capacity(timeline.len() + 3);
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Piano")),
        });
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(0),
                },
            },
        });

        let mut current_tick = 0u32;
        for (tick, _, message) in timeline {
            track.push(TrackEvent {
                delta: u28::new(tick - current_tick),
                kind: TrackEventKind::Midi { channel, message },
            });
            current_tick = tick;
        }

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        track
    }
}

impl MidiCodec for MidlyCodec {
    fn encode(&self, transcription: &Transcription) -> Result<Vec<u8>, DomainError> {
        let header = Header::new(Format::Parallel, Timing::Metrical(u15::new(TICKS_PER_BEAT)));
        let smf = Smf {
            header,
            tracks: vec![Self::conductor_track(), Self::piano_track(transcription)],
        };

        let mut bytes = Vec::new();
        smf.write(&mut bytes)
            .map_err(|e| DomainError::midi(format!("Failed to write MIDI data: {:?}", e)))?;

        debug!(
            "Encoded {} notes and {} pedal events into {} bytes",
            transcription.notes().len(),
            transcription.pedals().len(),
            bytes.len()
        );
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<MidiScore, DomainError> {
        let smf = Smf::parse(bytes)
            .map_err(|e| DomainError::midi(format!("Failed to parse MIDI data: {}", e)))?;

        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(ticks) => ticks.as_int(),
            Timing::Timecode(..) => {
                return Err(DomainError::midi("SMPTE timecode MIDI files are not supported"))
            }
        };

        let mut time_signature: Option<TimeSignature> = None;
        let mut notes = Vec::new();

        for track in &smf.tracks {
            let mut tick = 0u32;
            let mut sounding: HashMap<(u8, u8), VecDeque<(u32, u8)>> = HashMap::new();

            for event in track {
                tick = tick.saturating_add(event.delta.as_int());

                match event.kind {
                    TrackEventKind::Meta(MetaMessage::TimeSignature(beats, denominator, _, _))
                        if time_signature.is_none() =>
                    {
                        time_signature = Some(TimeSignature {
                            beats: beats.max(1),
                            beat_type: 1u8.checked_shl(denominator as u32).unwrap_or(4),
                        });
                    }
                    TrackEventKind::Midi { channel, message } => {
                        let channel = channel.as_int();
                        if channel == PERCUSSION_CHANNEL {
                            continue;
                        }

                        match message {
                            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                                sounding
                                    .entry((channel, key.as_int()))
                                    .or_default()
                                    .push_back((tick, vel.as_int()));
                            }
                            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                                let started = sounding
                                    .get_mut(&(channel, key.as_int()))
                                    .and_then(|queue| queue.pop_front());
                                if let Some((start, velocity)) = started {
                                    notes.push(ScoreNote {
                                        start_tick: start,
                                        duration_ticks: tick - start,
                                        pitch: key.as_int(),
                                        velocity,
                                    });
                                }
                            }
                            _ => {}
                        }
                    }
                    _ => {}
                }
            }

            // Notes never released end with their track.
            for ((_, pitch), queue) in sounding {
                for (start, velocity) in queue {
                    notes.push(ScoreNote {
                        start_tick: start,
                        duration_ticks: tick - start,
                        pitch,
                        velocity,
                    });
                }
            }
        }

        debug!(
            "Decoded {} notes from {} tracks at {} ticks per beat",
            notes.len(),
            smf.tracks.len(),
            ticks_per_beat
        );

        Ok(MidiScore::new(ticks_per_beat, notes)
            .with_time_signature(time_signature.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NoteEvent, PedalEvent};

    fn sample_transcription() -> Transcription {
        Transcription::new(
            vec![
                NoteEvent::new(60, 0.0, 0.5, 90),
                NoteEvent::new(64, 0.5, 1.0, 70),
                NoteEvent::new(67, 0.5, 1.5, 50),
            ],
            "test",
        )
        .with_pedals(vec![PedalEvent::new(0.0, 1.5)])
    }

    #[test]
    fn test_encode_produces_two_track_smf() {
        let bytes = MidlyCodec::new().encode(&sample_transcription()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        assert_eq!(smf.header.format, Format::Parallel);
        assert_eq!(smf.header.timing, Timing::Metrical(u15::new(TICKS_PER_BEAT)));
        assert_eq!(smf.tracks.len(), 2);

        let pedal_events = smf.tracks[1]
            .iter()
            .filter(|e| {
                matches!(
                    e.kind,
                    TrackEventKind::Midi {
                        message: MidiMessage::Controller { .. },
                        ..
                    }
                )
            })
            .count();
        assert_eq!(pedal_events, 2);
    }

    #[test]
    fn test_decode_recovers_notes_in_ticks() {
        let codec = MidlyCodec::new();
        let bytes = codec.encode(&sample_transcription()).unwrap();
        let score = codec.decode(&bytes).unwrap();

        assert_eq!(score.ticks_per_beat(), TICKS_PER_BEAT);
        assert_eq!(score.time_signature(), TimeSignature::default());

        let notes: Vec<(u8, u32, u32, u8)> = score
            .notes()
            .iter()
            .map(|n| (n.pitch, n.start_tick, n.duration_ticks, n.velocity))
            .collect();
        // 120 BPM at 384 ticks per beat = 768 ticks per second
        assert_eq!(
            notes,
            vec![(60, 0, 384, 90), (64, 384, 384, 70), (67, 384, 768, 50)]
        );
    }

    #[test]
    fn test_decode_handles_velocity_zero_note_off_and_drums() {
        let channel = u4::new(0);
        let drums = u4::new(PERCUSSION_CHANNEL);
        let track = vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn {
                        key: u7::new(72),
                        vel: u7::new(100),
                    },
                },
            },
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel: drums,
                    message: MidiMessage::NoteOn {
                        key: u7::new(36),
                        vel: u7::new(100),
                    },
                },
            },
            TrackEvent {
                delta: u28::new(96),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn {
                        key: u7::new(72),
                        vel: u7::new(0),
                    },
                },
            },
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn {
                        key: u7::new(48),
                        vel: u7::new(60),
                    },
                },
            },
            TrackEvent {
                delta: u28::new(48),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            },
        ];
        let smf = Smf {
            header: Header::new(Format::SingleTrack, Timing::Metrical(u15::new(96))),
            tracks: vec![track],
        };
        let mut bytes = Vec::new();
        smf.write(&mut bytes).unwrap();

        let score = MidlyCodec::new().decode(&bytes).unwrap();
        let notes: Vec<(u8, u32, u32)> = score
            .notes()
            .iter()
            .map(|n| (n.pitch, n.start_tick, n.duration_ticks))
            .collect();

        assert_eq!(notes, vec![(72, 0, 96), (48, 96, 48)]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = MidlyCodec::new().decode(b"definitely not midi").unwrap_err();
        assert!(matches!(err, DomainError::MidiError(_)));
    }
}
