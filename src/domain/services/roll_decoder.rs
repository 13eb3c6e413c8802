//! Turns the model's frame-wise regression rolls into note and pedal events.

use ndarray::{Array1, Array2, ArrayView1};

use crate::domain::{DomainError, NoteEvent, PedalEvent, PIANO_LOWEST_NOTE};

/// Stitched model output, one row per frame.
#[derive(Debug, Clone)]
pub struct ModelRolls {
    pub reg_onset: Array2<f32>,
    pub reg_offset: Array2<f32>,
    pub frame: Array2<f32>,
    pub velocity: Array2<f32>,
    pub reg_pedal_offset: Option<Array1<f32>>,
    pub pedal_frame: Option<Array1<f32>>,
}

impl ModelRolls {
    pub fn frames(&self) -> usize {
        self.frame.nrows()
    }

    pub fn keys(&self) -> usize {
        self.frame.ncols()
    }

    fn validate(&self) -> Result<(), DomainError> {
        let dim = self.frame.dim();
        for (name, roll) in [
            ("reg_onset", &self.reg_onset),
            ("reg_offset", &self.reg_offset),
            ("velocity", &self.velocity),
        ] {
            if roll.dim() != dim {
                return Err(DomainError::inference(format!(
                    "{} roll has shape {:?}, expected {:?}",
                    name,
                    roll.dim(),
                    dim
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RollDecoderConfig {
    pub frames_per_second: f64,
    pub onset_threshold: f32,
    pub offset_threshold: f32,
    pub frame_threshold: f32,
    pub pedal_offset_threshold: f32,
    pub pedal_frame_threshold: f32,
    pub velocity_scale: f32,
    pub onset_neighbour: usize,
    pub offset_neighbour: usize,
    /// Notes longer than this are cut.
    pub max_note_frames: usize,
    /// Frames to wait after the pedal frame vanishes before closing it.
    pub pedal_release_frames: usize,
    pub begin_note: u8,
}

impl Default for RollDecoderConfig {
    fn default() -> Self {
        Self {
            frames_per_second: 100.0,
            onset_threshold: 0.3,
            offset_threshold: 0.3,
            frame_threshold: 0.1,
            pedal_offset_threshold: 0.2,
            pedal_frame_threshold: 0.5,
            velocity_scale: 128.0,
            onset_neighbour: 2,
            offset_neighbour: 4,
            max_note_frames: 600,
            pedal_release_frames: 10,
            begin_note: PIANO_LOWEST_NOTE,
        }
    }
}

/// Frame span of one detected event, before conversion to seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Span {
    begin: usize,
    end: usize,
    onset_shift: f32,
    offset_shift: f32,
    velocity: f32,
}

#[derive(Debug, Clone, Default)]
pub struct RollDecoder {
    config: RollDecoderConfig,
}

impl RollDecoder {
    pub fn decode_notes(&self, rolls: &ModelRolls) -> Result<Vec<NoteEvent>, DomainError> {
        rolls.validate()?;

        let mut notes = Vec::new();
        for key in 0..rolls.keys() {
            let (onsets, onset_shift) = binarize_regression(
                rolls.reg_onset.column(key),
                self.config.onset_threshold,
                self.config.onset_neighbour,
            );
            let (offsets, offset_shift) = binarize_regression(
                rolls.reg_offset.column(key),
                self.config.offset_threshold,
                self.config.offset_neighbour,
            );

            let spans = self.detect_key_spans(
                rolls.frame.column(key),
                &onsets,
                &onset_shift,
                &offsets,
                &offset_shift,
                rolls.velocity.column(key),
            );

            let pitch = self.config.begin_note.saturating_add(key as u8);
            for span in spans {
                let (onset, offset) = self.span_times(&span);
                let velocity = (span.velocity * self.config.velocity_scale) as i32;
                notes.push(NoteEvent::new(
                    pitch,
                    onset,
                    offset,
                    velocity.clamp(1, 127) as u8,
                ));
            }
        }

        notes.sort_by(|a, b| {
            a.onset_secs
                .total_cmp(&b.onset_secs)
                .then(a.pitch.cmp(&b.pitch))
        });
        Ok(notes)
    }

    pub fn decode_pedals(&self, rolls: &ModelRolls) -> Vec<PedalEvent> {
        let (Some(frame), Some(reg_offset)) = (&rolls.pedal_frame, &rolls.reg_pedal_offset) else {
            return Vec::new();
        };

        let (offsets, offset_shift) = binarize_regression(
            reg_offset.view(),
            self.config.pedal_offset_threshold,
            self.config.offset_neighbour,
        );

        self.detect_pedal_spans(frame.view(), &offsets, &offset_shift)
            .iter()
            .map(|span| {
                let (onset, offset) = self.span_times(span);
                PedalEvent::new(onset, offset)
            })
            .collect()
    }

    fn span_times(&self, span: &Span) -> (f64, f64) {
        let fps = self.config.frames_per_second;
        let onset = ((span.begin as f64 + span.onset_shift as f64) / fps).max(0.0);
        let offset = (span.end as f64 + span.offset_shift as f64) / fps;
        (onset, offset.max(onset + 1.0 / fps))
    }

    fn detect_key_spans(
        &self,
        frame: ArrayView1<f32>,
        onsets: &[bool],
        onset_shift: &[f32],
        offsets: &[bool],
        offset_shift: &[f32],
        velocity: ArrayView1<f32>,
    ) -> Vec<Span> {
        let len = onsets.len();
        let mut spans = Vec::new();
        let mut begin: Option<usize> = None;
        let mut frame_disappear: Option<usize> = None;
        let mut offset_occur: Option<usize> = None;

        for i in 0..len {
            if onsets[i] {
                // A new onset closes a still-sounding note on the same key.
                if let Some(b) = begin {
                    spans.push(Span {
                        begin: b,
                        end: i.saturating_sub(1).max(b),
                        onset_shift: onset_shift[b],
                        offset_shift: 0.0,
                        velocity: velocity[b],
                    });
                    frame_disappear = None;
                    offset_occur = None;
                }
                begin = Some(i);
            }

            let Some(b) = begin else { continue };
            if i <= b {
                continue;
            }

            if frame[i] <= self.config.frame_threshold && frame_disappear.is_none() {
                frame_disappear = Some(i);
            }
            if offsets[i] && offset_occur.is_none() {
                offset_occur = Some(i);
            }

            if let Some(disappear) = frame_disappear {
                let end = match offset_occur {
                    Some(occur)
                        if occur as isize - b as isize > disappear as isize - occur as isize =>
                    {
                        occur
                    }
                    _ => disappear,
                };
                spans.push(Span {
                    begin: b,
                    end,
                    onset_shift: onset_shift[b],
                    offset_shift: offset_shift[end],
                    velocity: velocity[b],
                });
                begin = None;
                frame_disappear = None;
                offset_occur = None;
                continue;
            }

            if i - b >= self.config.max_note_frames || i == len - 1 {
                spans.push(Span {
                    begin: b,
                    end: i,
                    onset_shift: onset_shift[b],
                    offset_shift: offset_shift[i],
                    velocity: velocity[b],
                });
                begin = None;
                frame_disappear = None;
                offset_occur = None;
            }
        }

        spans
    }

    fn detect_pedal_spans(
        &self,
        frame: ArrayView1<f32>,
        offsets: &[bool],
        offset_shift: &[f32],
    ) -> Vec<Span> {
        let threshold = self.config.pedal_frame_threshold;
        let mut spans = Vec::new();
        let mut begin: Option<usize> = None;
        let mut frame_disappear: Option<usize> = None;
        let mut offset_occur: Option<usize> = None;

        for i in 1..frame.len() {
            if frame[i] >= threshold && frame[i] > frame[i - 1] && begin.is_none() {
                begin = Some(i);
            }

            let Some(b) = begin else { continue };
            if i <= b {
                continue;
            }

            if frame[i] <= threshold && frame_disappear.is_none() {
                frame_disappear = Some(i);
            }
            if offsets[i] && offset_occur.is_none() {
                offset_occur = Some(i);
            }

            let end = match (offset_occur, frame_disappear) {
                (Some(occur), _) => Some(occur),
                (None, Some(disappear)) if i - disappear >= self.config.pedal_release_frames => {
                    Some(disappear)
                }
                _ => None,
            };

            if let Some(end) = end {
                spans.push(Span {
                    begin: b,
                    end,
                    onset_shift: 0.0,
                    offset_shift: offset_shift[end],
                    velocity: 0.0,
                });
                begin = None;
                frame_disappear = None;
                offset_occur = None;
            }
        }

        spans
    }
}

/// Marks local peaks of a regression curve above `threshold` and estimates
/// their sub-frame shift from the neighbouring values.
pub fn binarize_regression(
    curve: ArrayView1<f32>,
    threshold: f32,
    neighbour: usize,
) -> (Vec<bool>, Vec<f32>) {
    let len = curve.len();
    let mut binary = vec![false; len];
    let mut shift = vec![0.0f32; len];

    if len <= 2 * neighbour || neighbour == 0 {
        return (binary, shift);
    }

    for n in neighbour..len - neighbour {
        if curve[n] > threshold && is_monotonic_neighbour(curve, n, neighbour) {
            binary[n] = true;

            let (prev, here, next) = (curve[n - 1], curve[n], curve[n + 1]);
            let denominator = if prev > next { here - next } else { here - prev };
            if denominator.abs() > f32::EPSILON {
                shift[n] = (next - prev) / denominator / 2.0;
            }
        }
    }

    (binary, shift)
}

fn is_monotonic_neighbour(curve: ArrayView1<f32>, n: usize, neighbour: usize) -> bool {
    (0..neighbour).all(|i| curve[n - i] >= curve[n - i - 1] && curve[n + i] >= curve[n + i + 1])
}
