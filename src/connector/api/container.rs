use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::application::{
    AudioDecoder, ConvertMidiUseCase, MidiCodec, NotationConverter, TranscribeAudioUseCase,
    TranscriptionService,
};
use crate::domain::{DevicePreference, DomainError};
use crate::{
    MidlyCodec, MockTranscriber, ModelSource, MusicXmlConverter, OrtTranscriber, ScoreRenderer,
    SymphoniaDecoder,
};

pub struct ContainerConfig {
    pub output_dir: PathBuf,
    /// Local ONNX model; takes precedence over `model_repo`.
    pub model_path: Option<PathBuf>,
    /// Hugging Face Hub repository holding `model_file`.
    pub model_repo: Option<String>,
    pub model_file: String,
    pub device: DevicePreference,
    /// Use the deterministic mock instead of a real model.
    pub mock_model: bool,
}

impl ContainerConfig {
    pub fn model_source(&self) -> Option<ModelSource> {
        if let Some(path) = &self.model_path {
            return Some(ModelSource::Local(path.clone()));
        }
        self.model_repo.as_ref().map(|repo| ModelSource::HfHub {
            repo: repo.clone(),
            file: self.model_file.clone(),
        })
    }
}

pub struct Container {
    decoder: Arc<dyn AudioDecoder>,
    midi_codec: Arc<dyn MidiCodec>,
    notation: Arc<dyn NotationConverter>,
    renderer: ScoreRenderer,
    /// Loaded on first use and shared by every request afterwards.
    transcriber: OnceCell<Arc<dyn TranscriptionService>>,
    config: ContainerConfig,
}

impl Container {
    pub async fn new(config: ContainerConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.output_dir).await?;
        debug!("Output directory: {}", config.output_dir.display());

        Ok(Self {
            decoder: Arc::new(SymphoniaDecoder::new()),
            midi_codec: Arc::new(MidlyCodec::new()),
            notation: Arc::new(MusicXmlConverter::new()),
            renderer: ScoreRenderer::new(),
            transcriber: OnceCell::new(),
            config,
        })
    }

    pub async fn transcriber(&self) -> Result<Arc<dyn TranscriptionService>, DomainError> {
        self.transcriber
            .get_or_try_init(|| self.load_transcriber())
            .await
            .cloned()
    }

    async fn load_transcriber(&self) -> Result<Arc<dyn TranscriptionService>, DomainError> {
        if self.config.mock_model {
            debug!("Using mock transcription model");
            return Ok(Arc::new(MockTranscriber::new()));
        }

        let source = self.config.model_source().ok_or_else(|| {
            DomainError::model(
                "No transcription model configured; pass --model-path, --model-repo or --mock-model",
            )
        })?;
        let preference = self.config.device;

        debug!("Initializing ONNX transcription model...");
        let transcriber =
            tokio::task::spawn_blocking(move || OrtTranscriber::new(&source, preference))
                .await
                .map_err(|e| DomainError::internal(format!("Model loading task failed: {}", e)))??;

        info!(
            "Transcription model {} {}",
            transcriber.model_name(),
            transcriber.placement().summary()
        );
        Ok(Arc::new(transcriber))
    }

    pub async fn transcribe_use_case(&self) -> Result<TranscribeAudioUseCase, DomainError> {
        Ok(TranscribeAudioUseCase::new(
            self.decoder.clone(),
            self.transcriber().await?,
            self.midi_codec.clone(),
            self.notation.clone(),
            self.config.output_dir.clone(),
        ))
    }

    pub fn convert_use_case(&self) -> ConvertMidiUseCase {
        ConvertMidiUseCase::new(self.notation.clone(), self.config.output_dir.clone())
    }

    pub fn renderer(&self) -> &ScoreRenderer {
        &self.renderer
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    pub fn device_preference(&self) -> DevicePreference {
        self.config.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(output_dir: &Path) -> ContainerConfig {
        ContainerConfig {
            output_dir: output_dir.to_path_buf(),
            model_path: None,
            model_repo: None,
            model_file: "model.onnx".to_string(),
            device: DevicePreference::Auto,
            mock_model: false,
        }
    }

    #[test]
    fn test_model_source_precedence() {
        let mut config = config(Path::new("out"));
        assert_eq!(config.model_source(), None);

        config.model_repo = Some("acme/piano".to_string());
        assert_eq!(
            config.model_source(),
            Some(ModelSource::HfHub {
                repo: "acme/piano".to_string(),
                file: "model.onnx".to_string()
            })
        );

        config.model_path = Some(PathBuf::from("local.onnx"));
        assert_eq!(
            config.model_source(),
            Some(ModelSource::Local(PathBuf::from("local.onnx")))
        );
    }

    #[tokio::test]
    async fn test_creates_output_dir_and_reuses_transcriber() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("nested").join("outputs");
        let mut config = config(&output_dir);
        config.mock_model = true;

        let container = Container::new(config).await.unwrap();
        assert!(output_dir.is_dir());

        let first = container.transcriber().await.unwrap();
        let second = container.transcriber().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.model_name(), "mock-transcriber");
    }

    #[tokio::test]
    async fn test_unconfigured_model_is_an_error() {
        let dir = tempdir().unwrap();
        let container = Container::new(config(dir.path())).await.unwrap();

        let err = container.transcriber().await.err().unwrap();
        assert!(matches!(err, DomainError::ModelError(_)));
    }
}
