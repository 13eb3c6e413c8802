use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::application::{AudioDecoder, MidiCodec, NotationConverter, TranscriptionService};
use crate::domain::{
    base_name_of, AudioFormat, DomainError, TranscribeRequest, TranscriptionArtifacts,
};

/// Upload -> MIDI (-> MusicXML) pipeline.
pub struct TranscribeAudioUseCase {
    decoder: Arc<dyn AudioDecoder>,
    transcriber: Arc<dyn TranscriptionService>,
    midi_codec: Arc<dyn MidiCodec>,
    notation: Arc<dyn NotationConverter>,
    output_dir: PathBuf,
}

impl TranscribeAudioUseCase {
    pub fn new(
        decoder: Arc<dyn AudioDecoder>,
        transcriber: Arc<dyn TranscriptionService>,
        midi_codec: Arc<dyn MidiCodec>,
        notation: Arc<dyn NotationConverter>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            decoder,
            transcriber,
            midi_codec,
            notation,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn execute(
        &self,
        request: &TranscribeRequest,
    ) -> Result<TranscriptionArtifacts, DomainError> {
        let audio_path = request
            .audio_path()
            .ok_or_else(|| DomainError::invalid_input("No file provided"))?;

        if !audio_path.is_file() {
            return Err(DomainError::not_found(format!(
                "Audio file not found: {}",
                audio_path.display()
            )));
        }

        let format = AudioFormat::from_path(audio_path).ok_or_else(|| {
            DomainError::unsupported_format(format!(
                "{} (expected one of {})",
                audio_path.display(),
                AudioFormat::accept_list()
            ))
        })?;

        let start_time = Instant::now();
        let base_name = base_name_of(audio_path);
        info!(
            "Transcribing {} ({}) with {}",
            audio_path.display(),
            format,
            self.transcriber.model_name()
        );

        let audio = self
            .decoder
            .decode(audio_path, self.transcriber.sample_rate())
            .await?;
        if audio.is_empty() {
            return Err(DomainError::invalid_input(format!(
                "{} contains no audio samples",
                audio_path.display()
            )));
        }
        debug!(
            "Decoded {:.2}s of audio at {} Hz",
            audio.duration_secs(),
            audio.sample_rate()
        );

        let transcription = self.transcriber.transcribe(&audio).await?;
        if transcription.is_empty() {
            warn!("No notes detected in {}", audio_path.display());
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let midi = self.midi_codec.encode(&transcription)?;
        let midi_path = self.output_dir.join(format!("{}.mid", base_name));
        tokio::fs::write(&midi_path, &midi).await?;
        info!("Wrote {}", midi_path.display());

        let mut artifacts = TranscriptionArtifacts::new(&base_name, midi_path)
            .with_counts(transcription.notes().len(), transcription.pedals().len())
            .with_device(transcription.device())
            .with_model(transcription.model());

        if request.wants_musicxml() {
            artifacts = self.attach_notation(artifacts, &midi, &base_name).await;
        }

        let elapsed = start_time.elapsed().as_secs_f64();
        info!(
            "Transcribed {} notes from {:.2}s of audio in {:.2}s",
            artifacts.note_count(),
            audio.duration_secs(),
            elapsed
        );

        Ok(artifacts.with_timing(audio.duration_secs(), elapsed))
    }

    /// Notation is optional: failures are reported on the artifacts, not raised.
    async fn attach_notation(
        &self,
        artifacts: TranscriptionArtifacts,
        midi: &[u8],
        base_name: &str,
    ) -> TranscriptionArtifacts {
        let document = match self.notation.convert(midi, base_name) {
            Ok(document) => document,
            Err(e) => {
                warn!("Notation conversion failed, returning MIDI only: {}", e);
                return artifacts.with_notation_error(e.to_string());
            }
        };

        let path = self
            .output_dir
            .join(format!("{}.{}", base_name, self.notation.extension()));
        match tokio::fs::write(&path, &document).await {
            Ok(()) => {
                info!("Wrote {}", path.display());
                artifacts.with_musicxml(path, document)
            }
            Err(e) => {
                warn!("Failed to write {}: {}", path.display(), e);
                artifacts.with_notation_error(format!("Failed to write {}: {}", path.display(), e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::tempdir;

    use crate::connector::{MidlyCodec, MockTranscriber, MusicXmlConverter};
    use crate::domain::AudioClip;

    struct SilentDecoder {
        seconds: f64,
    }

    #[async_trait]
    impl AudioDecoder for SilentDecoder {
        async fn decode(&self, _path: &Path, rate: u32) -> Result<AudioClip, DomainError> {
            let len = (self.seconds * rate as f64) as usize;
            let samples = (0..len).map(|i| ((i % 100) as f32 / 100.0) - 0.5).collect();
            Ok(AudioClip::new(samples, rate))
        }
    }

    struct BrokenNotation;

    impl NotationConverter for BrokenNotation {
        fn extension(&self) -> &'static str {
            "musicxml"
        }

        fn convert(&self, _midi: &[u8], _title: &str) -> Result<String, DomainError> {
            Err(DomainError::notation("unsupported tuplet"))
        }
    }

    fn use_case(output_dir: &Path, notation: Arc<dyn NotationConverter>) -> TranscribeAudioUseCase {
        TranscribeAudioUseCase::new(
            Arc::new(SilentDecoder { seconds: 4.0 }),
            Arc::new(MockTranscriber::new()),
            Arc::new(MidlyCodec::new()),
            notation,
            output_dir,
        )
    }

    #[tokio::test]
    async fn test_missing_input_is_rejected() {
        let dir = tempdir().unwrap();
        let use_case = use_case(dir.path(), Arc::new(MusicXmlConverter::new()));

        let err = use_case
            .execute(&TranscribeRequest::empty())
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(err.to_string(), "Invalid input: No file provided");
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_rejected() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("notes.txt");
        std::fs::write(&input, b"not audio").unwrap();

        let use_case = use_case(&dir.path().join("out"), Arc::new(MusicXmlConverter::new()));
        let err = use_case
            .execute(&TranscribeRequest::new(&input))
            .await
            .unwrap_err();
        assert!(err.is_unsupported_format());
    }

    #[tokio::test]
    async fn test_writes_midi_named_after_input() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("etude.wav");
        std::fs::write(&input, b"").unwrap();
        let out = dir.path().join("outputs");

        let use_case = use_case(&out, Arc::new(MusicXmlConverter::new()));
        let artifacts = use_case
            .execute(&TranscribeRequest::new(&input))
            .await
            .unwrap();

        assert_eq!(artifacts.base_name(), "etude");
        assert_eq!(artifacts.midi_path(), out.join("etude.mid"));
        assert!(artifacts.midi_path().is_file());
        assert!(artifacts.note_count() > 0);
        assert!(artifacts.musicxml_path().is_none());
        assert!((artifacts.audio_secs() - 4.0).abs() < 1e-6);

        let bytes = std::fs::read(artifacts.midi_path()).unwrap();
        assert_eq!(&bytes[..4], b"MThd");
    }

    #[tokio::test]
    async fn test_musicxml_written_when_requested() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("prelude.mp3");
        std::fs::write(&input, b"").unwrap();

        let use_case = use_case(dir.path(), Arc::new(MusicXmlConverter::new()));
        let artifacts = use_case
            .execute(&TranscribeRequest::new(&input).with_musicxml(true))
            .await
            .unwrap();

        let path = artifacts.musicxml_path().expect("musicxml path");
        assert_eq!(path, dir.path().join("prelude.musicxml"));
        let on_disk = std::fs::read_to_string(path).unwrap();
        assert_eq!(Some(on_disk.as_str()), artifacts.musicxml());
        assert!(on_disk.contains("<score-partwise"));
        assert!(artifacts.notation_error().is_none());
    }

    #[tokio::test]
    async fn test_notation_failure_keeps_midi() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("sonata.flac");
        std::fs::write(&input, b"").unwrap();

        let use_case = use_case(dir.path(), Arc::new(BrokenNotation));
        let artifacts = use_case
            .execute(&TranscribeRequest::new(&input).with_musicxml(true))
            .await
            .unwrap();

        assert!(artifacts.midi_path().is_file());
        assert!(artifacts.musicxml_path().is_none());
        assert_eq!(
            artifacts.notation_error(),
            Some("Notation error: unsupported tuplet")
        );
    }
}
