//! Server-rendered HTML for the upload form and the result page.

use crate::domain::{AudioFormat, TranscriptionArtifacts};

const TITLE: &str = "Piano → MIDI";

const DESCRIPTION: &str = "Upload a piano recording (mp3, wav, m4a, flac, ogg). \
The model transcribes it to a downloadable <strong>MIDI (.mid)</strong> file, \
and optionally to MusicXML with an in-browser score. \
Tip: shorter clips (1–3 minutes) are much faster. \
The first run may download model weights.";

const STYLE: &str = r#"body { font-family: system-ui, -apple-system, "Segoe UI", Roboto, "Helvetica Neue", Arial; max-width: 960px; margin: 2rem auto; padding: 0 1rem; }
form { display: flex; flex-wrap: wrap; gap: 1rem; align-items: center; margin: 1.5rem 0; }
button { padding: 0.5rem 1.25rem; border: 0; border-radius: 6px; background: #ff7c00; color: #fff; font-size: 1rem; cursor: pointer; }
.downloads a { margin-right: 1rem; }
.warning { color: #a15c00; }
.score { margin-top: 1.5rem; }"#;

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
{style}
</style>
</head>
<body>
<h1>🎹 Piano → MIDI Transcription</h1>
{body}
</body>
</html>
"#,
        title = TITLE,
        style = STYLE,
        body = body
    )
}

fn upload_form() -> String {
    format!(
        r#"<form action="/transcribe" method="post" enctype="multipart/form-data">
<label>Upload audio ({formats}) <input type="file" name="audio" accept="{accept}"></label>
<label><input type="checkbox" name="musicxml" value="on"> Also produce MusicXML</label>
<button type="submit">Transcribe</button>
</form>"#,
        formats = AudioFormat::ALL
            .iter()
            .map(|f| f.extension())
            .collect::<Vec<_>>()
            .join("/"),
        accept = AudioFormat::accept_list()
    )
}

pub fn index() -> String {
    layout(&format!("<p>{}</p>\n{}", DESCRIPTION, upload_form()))
}

pub fn result(artifacts: &TranscriptionArtifacts, score_html: Option<&str>) -> String {
    let mut body = String::new();

    body.push_str(&format!(
        "<p>Transcribed <strong>{}</strong>: {} notes, {} pedal events from {:.1}s of audio in {:.1}s on {} ({}).</p>\n",
        escape_html(artifacts.base_name()),
        artifacts.note_count(),
        artifacts.pedal_count(),
        artifacts.audio_secs(),
        artifacts.elapsed_secs(),
        artifacts.device(),
        escape_html(artifacts.model())
    ));

    body.push_str("<p class=\"downloads\">\n");
    if let Some(name) = file_name(artifacts.midi_path()) {
        body.push_str(&format!(
            "<a href=\"/files/{0}\" download>Download MIDI ({0})</a>\n",
            escape_html(&name)
        ));
    }
    if let Some(name) = artifacts.musicxml_path().and_then(file_name) {
        body.push_str(&format!(
            "<a href=\"/files/{0}\" download>Download MusicXML ({0})</a>\n",
            escape_html(&name)
        ));
    }
    body.push_str("</p>\n");

    if let Some(error) = artifacts.notation_error() {
        body.push_str(&format!(
            "<p class=\"warning\">MusicXML conversion failed: {}</p>\n",
            escape_html(error)
        ));
    }

    if let Some(score) = score_html {
        body.push_str(score);
    }

    body.push_str("<p><a href=\"/\">Transcribe another recording</a></p>\n");
    body.push_str(&upload_form());

    layout(&body)
}

/// Standalone page around a rendered score, written next to the MusicXML.
pub fn score_page(title: &str, score_html: &str) -> String {
    layout(&format!("<h2>{}</h2>\n{}", escape_html(title), score_html))
}

pub(crate) fn file_name(path: &std::path::Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().to_string())
}
