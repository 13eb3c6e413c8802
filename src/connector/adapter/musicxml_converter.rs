//! MIDI to MusicXML conversion for a two-staff piano part.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::application::{MidiCodec, NotationConverter};
use crate::domain::{DomainError, MidiScore, TimeSignature};

use super::MidlyCodec;

/// Divisions per quarter note; the quantization grid is a sixteenth.
pub const DIVISIONS: u32 = 4;

/// Lowest pitch written on the treble staff (middle C).
const TREBLE_SPLIT: u8 = 60;

/// Notated values in divisions, largest first: (divisions, type, dotted).
const NOTE_VALUES: [(u32, &str, bool); 8] = [
    (16, "whole", false),
    (12, "half", true),
    (8, "half", false),
    (6, "quarter", true),
    (4, "quarter", false),
    (3, "eighth", true),
    (2, "eighth", false),
    (1, "16th", false),
];

const STEPS: [(&str, i8); 12] = [
    ("C", 0),
    ("C", 1),
    ("D", 0),
    ("D", 1),
    ("E", 0),
    ("F", 0),
    ("F", 1),
    ("G", 0),
    ("G", 1),
    ("A", 0),
    ("A", 1),
    ("B", 0),
];

/// A chord (or rest when `pitches` is empty) on the quantized timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StaffEvent {
    start: u32,
    duration: u32,
    pitches: Vec<u8>,
}

/// One notated element inside a single measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Piece {
    pub start: u32,
    pub duration: u32,
    pub pitches: Vec<u8>,
    /// `None` for a whole-measure rest.
    pub value: Option<(&'static str, bool)>,
    pub tie_start: bool,
    pub tie_stop: bool,
}

/// Bar length in divisions, or `None` when the meter is not a whole number
/// of sixteenths.
fn bar_length(time_signature: TimeSignature) -> Option<u32> {
    let whole = time_signature.beats as u32 * DIVISIONS * 4;
    let beat_type = time_signature.beat_type as u32;
    if whole == 0 || beat_type == 0 || whole % beat_type != 0 {
        return None;
    }
    Some(whole / beat_type)
}

/// Quantized grand-staff layout, split into measures.
#[derive(Debug, Clone)]
pub(crate) struct GrandStaff {
    pub measure_len: u32,
    pub time_signature: TimeSignature,
    /// `measures[m][staff]` with staff 0 = treble, 1 = bass.
    pub measures: Vec<[Vec<Piece>; 2]>,
}

impl GrandStaff {
    pub fn from_score(score: &MidiScore) -> Self {
        let (time_signature, measure_len) = match bar_length(score.time_signature()) {
            Some(len) => (score.time_signature(), len),
            None => {
                let fallback = TimeSignature::default();
                warn!(
                    "Time signature {}/{} does not fit the sixteenth grid, using {}/{}",
                    score.time_signature().beats,
                    score.time_signature().beat_type,
                    fallback.beats,
                    fallback.beat_type
                );
                (fallback, bar_length(fallback).unwrap_or(DIVISIONS * 4))
            }
        };
        let ticks_per_beat = score.ticks_per_beat().max(1) as u64;

        let quantize = |tick: u32| -> u32 {
            ((tick as u64 * DIVISIONS as u64 + ticks_per_beat / 2) / ticks_per_beat) as u32
        };

        let mut chords: [BTreeMap<u32, Vec<(u8, u32)>>; 2] = [BTreeMap::new(), BTreeMap::new()];
        for note in score.notes() {
            let start = quantize(note.start_tick);
            let end = quantize(note.end_tick());
            let staff = if note.pitch >= TREBLE_SPLIT { 0 } else { 1 };
            chords[staff]
                .entry(start)
                .or_default()
                .push((note.pitch, end.saturating_sub(start).max(1)));
        }

        let mut staves = [staff_events(&chords[0]), staff_events(&chords[1])];

        let content_end = staves
            .iter()
            .filter_map(|events| events.last().map(|e| e.start + e.duration))
            .max()
            .unwrap_or(0);
        let measure_count = content_end.div_ceil(measure_len).max(1);
        let total = measure_count * measure_len;

        for events in &mut staves {
            let cursor = events.last().map(|e| e.start + e.duration).unwrap_or(0);
            if cursor < total {
                events.push(StaffEvent {
                    start: cursor,
                    duration: total - cursor,
                    pitches: Vec::new(),
                });
            }
        }

        let mut measures: Vec<[Vec<Piece>; 2]> = (0..measure_count)
            .map(|_| [Vec::new(), Vec::new()])
            .collect();
        for (staff, events) in staves.iter().enumerate() {
            for event in events {
                for piece in fragment(event, measure_len) {
                    let index = (piece.start / measure_len) as usize;
                    measures[index][staff].push(piece);
                }
            }
        }

        Self {
            measure_len,
            time_signature,
            measures,
        }
    }
}

fn staff_events(chords: &BTreeMap<u32, Vec<(u8, u32)>>) -> Vec<StaffEvent> {
    let starts: Vec<u32> = chords.keys().copied().collect();
    let mut events = Vec::with_capacity(chords.len() * 2);
    let mut cursor = 0u32;

    for (i, (&start, notes)) in chords.iter().enumerate() {
        if start > cursor {
            events.push(StaffEvent {
                start: cursor,
                duration: start - cursor,
                pitches: Vec::new(),
            });
        }

        // Overlapping notes are cut at the next onset on this staff.
        let longest = notes.iter().map(|(_, d)| *d).max().unwrap_or(1);
        let limit = starts.get(i + 1).map(|next| next - start).unwrap_or(u32::MAX);
        let duration = longest.min(limit).max(1);

        let mut pitches: Vec<u8> = notes.iter().map(|(p, _)| *p).collect();
        pitches.sort_unstable();
        pitches.dedup();

        events.push(StaffEvent {
            start,
            duration,
            pitches,
        });
        cursor = start + duration;
    }

    events
}

/// Splits an event at bar lines and into notatable values.
fn fragment(event: &StaffEvent, measure_len: u32) -> Vec<Piece> {
    let is_rest = event.pitches.is_empty();
    let end = event.start + event.duration;
    let mut pieces = Vec::new();
    let mut pos = event.start;

    while pos < end {
        let bar_end = (pos / measure_len + 1) * measure_len;
        let segment_end = end.min(bar_end);

        if is_rest && pos % measure_len == 0 && segment_end == bar_end {
            pieces.push(Piece {
                start: pos,
                duration: measure_len,
                pitches: Vec::new(),
                value: None,
                tie_start: false,
                tie_stop: false,
            });
            pos = segment_end;
            continue;
        }

        while pos < segment_end {
            let remaining = segment_end - pos;
            let (divisions, name, dotted) = NOTE_VALUES
                .iter()
                .copied()
                .find(|(d, _, _)| *d <= remaining)
                .unwrap_or(NOTE_VALUES[NOTE_VALUES.len() - 1]);
            pieces.push(Piece {
                start: pos,
                duration: divisions,
                pitches: event.pitches.clone(),
                value: Some((name, dotted)),
                tie_start: false,
                tie_stop: false,
            });
            pos += divisions;
        }
    }

    if !is_rest {
        let last = pieces.len().saturating_sub(1);
        for (i, piece) in pieces.iter_mut().enumerate() {
            piece.tie_stop = i > 0;
            piece.tie_start = i < last;
        }
    }

    pieces
}

pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Writes decoded MIDI as a MusicXML 4.0 partwise score.
#[derive(Debug, Clone, Default)]
pub struct MusicXmlConverter {
    codec: MidlyCodec,
}

impl MusicXmlConverter {
    pub fn new() -> Self {
        Self {
            codec: MidlyCodec::new(),
        }
    }

    pub fn render(&self, score: &MidiScore, title: &str) -> String {
        let layout = GrandStaff::from_score(score);
        let mut xml = String::with_capacity(4096 + layout.measures.len() * 1024);

        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n");
        xml.push_str("<!DOCTYPE score-partwise PUBLIC \"-//Recordare//DTD MusicXML 4.0 Partwise//EN\" \"http://www.musicxml.org/dtds/partwise.dtd\">\n");
        xml.push_str("<score-partwise version=\"4.0\">\n");
        xml.push_str(&format!(
            "  <work>\n    <work-title>{}</work-title>\n  </work>\n",
            escape_xml(title)
        ));
        xml.push_str(&format!(
            "  <identification>\n    <encoding>\n      <software>{} {}</software>\n    </encoding>\n  </identification>\n",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ));
        xml.push_str("  <part-list>\n    <score-part id=\"P1\">\n      <part-name>Piano</part-name>\n    </score-part>\n  </part-list>\n");
        xml.push_str("  <part id=\"P1\">\n");

        let last_measure = layout.measures.len().saturating_sub(1);
        for (index, staves) in layout.measures.iter().enumerate() {
            xml.push_str(&format!("    <measure number=\"{}\">\n", index + 1));

            if index == 0 {
                write_attributes(&mut xml, &layout);
            }

            for (staff, pieces) in staves.iter().enumerate() {
                if staff > 0 {
                    xml.push_str(&format!(
                        "      <backup>\n        <duration>{}</duration>\n      </backup>\n",
                        layout.measure_len
                    ));
                }
                for piece in pieces {
                    write_piece(&mut xml, piece, staff as u8 + 1);
                }
            }

            if index == last_measure {
                xml.push_str("      <barline location=\"right\">\n        <bar-style>light-heavy</bar-style>\n      </barline>\n");
            }
            xml.push_str("    </measure>\n");
        }

        xml.push_str("  </part>\n</score-partwise>\n");

        debug!(
            "Rendered {} measures of MusicXML ({} bytes)",
            layout.measures.len(),
            xml.len()
        );
        xml
    }
}

fn write_attributes(xml: &mut String, layout: &GrandStaff) {
    xml.push_str("      <attributes>\n");
    xml.push_str(&format!("        <divisions>{}</divisions>\n", DIVISIONS));
    xml.push_str("        <key>\n          <fifths>0</fifths>\n        </key>\n");
    xml.push_str(&format!(
        "        <time>\n          <beats>{}</beats>\n          <beat-type>{}</beat-type>\n        </time>\n",
        layout.time_signature.beats, layout.time_signature.beat_type
    ));
    xml.push_str("        <staves>2</staves>\n");
    xml.push_str("        <clef number=\"1\">\n          <sign>G</sign>\n          <line>2</line>\n        </clef>\n");
    xml.push_str("        <clef number=\"2\">\n          <sign>F</sign>\n          <line>4</line>\n        </clef>\n");
    xml.push_str("      </attributes>\n");
}

fn write_piece(xml: &mut String, piece: &Piece, staff: u8) {
    if piece.pitches.is_empty() {
        xml.push_str("      <note>\n");
        match piece.value {
            None => xml.push_str("        <rest measure=\"yes\"/>\n"),
            Some(_) => xml.push_str("        <rest/>\n"),
        }
        xml.push_str(&format!("        <duration>{}</duration>\n", piece.duration));
        xml.push_str(&format!("        <voice>{}</voice>\n", staff));
        write_value(xml, piece);
        xml.push_str(&format!("        <staff>{}</staff>\n", staff));
        xml.push_str("      </note>\n");
        return;
    }

    for (i, &pitch) in piece.pitches.iter().enumerate() {
        let (step, alter) = STEPS[(pitch % 12) as usize];
        let octave = (pitch / 12) as i32 - 1;

        xml.push_str("      <note>\n");
        if i > 0 {
            xml.push_str("        <chord/>\n");
        }
        xml.push_str("        <pitch>\n");
        xml.push_str(&format!("          <step>{}</step>\n", step));
        if alter != 0 {
            xml.push_str(&format!("          <alter>{}</alter>\n", alter));
        }
        xml.push_str(&format!("          <octave>{}</octave>\n", octave));
        xml.push_str("        </pitch>\n");
        xml.push_str(&format!("        <duration>{}</duration>\n", piece.duration));
        if piece.tie_stop {
            xml.push_str("        <tie type=\"stop\"/>\n");
        }
        if piece.tie_start {
            xml.push_str("        <tie type=\"start\"/>\n");
        }
        xml.push_str(&format!("        <voice>{}</voice>\n", staff));
        write_value(xml, piece);
        xml.push_str(&format!("        <staff>{}</staff>\n", staff));
        if piece.tie_stop || piece.tie_start {
            xml.push_str("        <notations>\n");
            if piece.tie_stop {
                xml.push_str("          <tied type=\"stop\"/>\n");
            }
            if piece.tie_start {
                xml.push_str("          <tied type=\"start\"/>\n");
            }
            xml.push_str("        </notations>\n");
        }
        xml.push_str("      </note>\n");
    }
}

fn write_value(xml: &mut String, piece: &Piece) {
    if let Some((name, dotted)) = piece.value {
        xml.push_str(&format!("        <type>{}</type>\n", name));
        if dotted {
            xml.push_str("        <dot/>\n");
        }
    }
}

impl NotationConverter for MusicXmlConverter {
    fn extension(&self) -> &'static str {
        "musicxml"
    }

    fn convert(&self, midi: &[u8], title: &str) -> Result<String, DomainError> {
        let score = self.codec.decode(midi)?;
        Ok(self.render(&score, title))
    }
}
