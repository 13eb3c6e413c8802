use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use ndarray::{Array3, Axis};
use ort::{
    execution_providers::{
        CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider,
        ExecutionProviderDispatch,
    },
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use tracing::{debug, info};

use crate::application::TranscriptionService;
use crate::domain::{
    place_on_device, AudioClip, ComputeDevice, DevicePreference, DomainError, ModelRolls,
    PlacementReport, RollDecoder, SegmentFramer, Transcription,
};

pub const MODEL_SAMPLE_RATE: u32 = 16_000;
pub const SEGMENT_SAMPLES: usize = MODEL_SAMPLE_RATE as usize * 10;

const REG_ONSET: &str = "reg_onset_output";
const REG_OFFSET: &str = "reg_offset_output";
const FRAME: &str = "frame_output";
const VELOCITY: &str = "velocity_output";
const REG_PEDAL_OFFSET: &str = "reg_pedal_offset_output";
const PEDAL_FRAME: &str = "pedal_frame_output";

/// Where the ONNX transcription network comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Local(PathBuf),
    HfHub { repo: String, file: String },
}

impl ModelSource {
    pub fn name(&self) -> String {
        match self {
            ModelSource::Local(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            ModelSource::HfHub { repo, file } => format!("{}/{}", repo, file),
        }
    }

    /// Local path of the model, downloading it into the hf-hub cache if needed.
    pub fn resolve(&self) -> Result<PathBuf, DomainError> {
        match self {
            ModelSource::Local(path) => {
                if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(DomainError::not_found(format!(
                        "Model file not found: {}",
                        path.display()
                    )))
                }
            }
            ModelSource::HfHub { repo, file } => {
                info!("Fetching {} from {} on the Hugging Face Hub", file, repo);
                let api = hf_hub::api::sync::ApiBuilder::new()
                    .with_progress(true)
                    .build()
                    .map_err(|e| DomainError::model(format!("Failed to create HF API: {}", e)))?;

                api.model(repo.to_string()).get(file).map_err(|e| {
                    DomainError::model(format!("Failed to download {} from {}: {}", file, repo, e))
                })
            }
        }
    }
}

fn execution_provider(device: ComputeDevice) -> Option<ExecutionProviderDispatch> {
    match device {
        ComputeDevice::Cpu => None,
        ComputeDevice::CoreMl => Some(CoreMLExecutionProvider::default().build().error_on_failure()),
        ComputeDevice::Cuda => Some(CUDAExecutionProvider::default().build().error_on_failure()),
    }
}

/// Whether ONNX Runtime can use `device` on this host.
pub fn probe_device(device: ComputeDevice) -> Result<(), String> {
    let available = match device {
        ComputeDevice::Cpu => Ok(true),
        ComputeDevice::CoreMl => CoreMLExecutionProvider::default().is_available(),
        ComputeDevice::Cuda => CUDAExecutionProvider::default().is_available(),
    }
    .map_err(|e| e.to_string())?;

    if available {
        Ok(())
    } else {
        Err("execution provider not available".to_string())
    }
}

fn build_session(model_path: &Path, device: ComputeDevice) -> Result<Session, String> {
    probe_device(device)?;

    let mut builder = Session::builder()
        .map_err(|e| format!("Failed to create session builder: {}", e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| format!("Failed to set optimization level: {}", e))?;

    if let Some(provider) = execution_provider(device) {
        builder = builder
            .with_execution_providers([provider])
            .map_err(|e| format!("Failed to register execution provider: {}", e))?;
    }

    builder
        .commit_from_file(model_path)
        .map_err(|e| format!("Failed to load ONNX model: {}", e))
}

/// Per-output rows gathered across segments.
#[derive(Debug, Default)]
struct OutputAccumulator {
    data: Vec<f32>,
    frames: usize,
    classes: usize,
    segments: usize,
}

impl OutputAccumulator {
    fn push(&mut self, name: &str, shape: &[usize], values: &[f32]) -> Result<(), DomainError> {
        if shape.len() < 2 {
            return Err(DomainError::inference(format!(
                "Output {} has unexpected shape {:?}",
                name, shape
            )));
        }
        let frames = shape[1];
        let classes: usize = shape[2..].iter().product::<usize>().max(1);

        if self.segments > 0 && (frames, classes) != (self.frames, self.classes) {
            return Err(DomainError::inference(format!(
                "Output {} changed shape between segments: {:?}",
                name, shape
            )));
        }

        self.frames = frames;
        self.classes = classes;
        self.segments += 1;
        self.data.extend_from_slice(&values[..frames * classes]);
        Ok(())
    }

    fn into_segments(self, name: &str) -> Result<Array3<f32>, DomainError> {
        Array3::from_shape_vec((self.segments, self.frames, self.classes), self.data).map_err(
            |e| DomainError::inference(format!("Output {} has inconsistent size: {}", name, e)),
        )
    }
}

/// Cloneable handle to everything a blocking inference job needs.
#[derive(Clone)]
struct Engine {
    session: Arc<Mutex<Session>>,
    input_name: Arc<str>,
    framer: SegmentFramer,
}

impl Engine {
    fn run(&self, samples: &[f32]) -> Result<ModelRolls, DomainError> {
        let segments = self.framer.enframe(samples);
        let mut outputs: HashMap<String, OutputAccumulator> = HashMap::new();

        let mut session = self
            .session
            .lock()
            .map_err(|e| DomainError::internal(format!("Failed to lock session: {}", e)))?;

        for (index, segment) in segments.into_iter().enumerate() {
            let shape = [1usize, self.framer.segment_samples()];
            let input = Tensor::from_array((shape, segment)).map_err(|e| {
                DomainError::inference(format!("Failed to create input tensor: {}", e))
            })?;

            let results = session
                .run(ort::inputs![self.input_name.as_ref() => input])
                .map_err(|e| {
                    DomainError::inference(format!("Inference failed on segment {}: {}", index, e))
                })?;

            for (name, value) in results.iter() {
                let (shape, data) = value.try_extract_tensor::<f32>().map_err(|e| {
                    DomainError::inference(format!("Failed to extract {}: {}", name, e))
                })?;
                let shape: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
                if index == 0 {
                    debug!("Output {} shape: {:?}", name, shape);
                }
                outputs
                    .entry(name.to_string())
                    .or_default()
                    .push(name, &shape, data)?;
            }
        }
        drop(session);

        let mut stitch = |name: &str| -> Result<Option<ndarray::Array2<f32>>, DomainError> {
            match outputs.remove(name) {
                Some(acc) => {
                    let segments = acc.into_segments(name)?;
                    Ok(Some(self.framer.deframe(segments.view())?))
                }
                None => Ok(None),
            }
        };

        let mut required = |name: &str| -> Result<ndarray::Array2<f32>, DomainError> {
            stitch(name)?.ok_or_else(|| {
                DomainError::inference(format!("Model did not produce {}", name))
            })
        };
        let reg_onset = required(REG_ONSET)?;
        let reg_offset = required(REG_OFFSET)?;
        let frame = required(FRAME)?;
        let velocity = required(VELOCITY)?;

        let reg_pedal_offset = stitch(REG_PEDAL_OFFSET)?.map(|roll| roll.index_axis_move(Axis(1), 0));
        let pedal_frame = stitch(PEDAL_FRAME)?.map(|roll| roll.index_axis_move(Axis(1), 0));

        Ok(ModelRolls {
            reg_onset,
            reg_offset,
            frame,
            velocity,
            reg_pedal_offset,
            pedal_frame,
        })
    }
}

/// Piano transcription with an ONNX regression model.
pub struct OrtTranscriber {
    engine: Engine,
    decoder: RollDecoder,
    model_name: String,
    placement: PlacementReport,
}

impl OrtTranscriber {
    pub fn new(source: &ModelSource, preference: DevicePreference) -> Result<Self, DomainError> {
        info!("Initializing ORT transcription model: {}", source.name());
        let model_path = source.resolve()?;
        Self::from_file(model_path, &source.name(), preference)
    }

    pub fn from_file(
        model_path: PathBuf,
        model_name: &str,
        preference: DevicePreference,
    ) -> Result<Self, DomainError> {
        info!("Loading ONNX model from: {:?}", model_path);

        let (session, placement) =
            place_on_device(preference, |device| build_session(&model_path, device))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| DomainError::model("ONNX model declares no inputs"))?;
        debug!("Model input: {}", input_name);

        Ok(Self {
            engine: Engine {
                session: Arc::new(Mutex::new(session)),
                input_name: Arc::from(input_name),
                framer: SegmentFramer::new(SEGMENT_SAMPLES)?,
            },
            decoder: RollDecoder::default(),
            model_name: model_name.to_string(),
            placement,
        })
    }

    /// Availability of every device ONNX Runtime knows about.
    pub fn available_devices() -> Vec<(ComputeDevice, Result<(), String>)> {
        [ComputeDevice::CoreMl, ComputeDevice::Cuda, ComputeDevice::Cpu]
            .into_iter()
            .map(|device| (device, probe_device(device)))
            .collect()
    }
}

#[async_trait]
impl TranscriptionService for OrtTranscriber {
    fn sample_rate(&self) -> u32 {
        MODEL_SAMPLE_RATE
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn placement(&self) -> &PlacementReport {
        &self.placement
    }

    async fn transcribe(&self, audio: &AudioClip) -> Result<Transcription, DomainError> {
        if audio.sample_rate() != MODEL_SAMPLE_RATE {
            return Err(DomainError::invalid_input(format!(
                "Expected audio at {} Hz, got {} Hz",
                MODEL_SAMPLE_RATE,
                audio.sample_rate()
            )));
        }

        let start = Instant::now();
        let engine = self.engine.clone();
        let samples = audio.samples().to_vec();
        let rolls = tokio::task::spawn_blocking(move || engine.run(&samples))
            .await
            .map_err(|e| DomainError::internal(format!("Inference task failed: {}", e)))??;
        debug!(
            "Model produced {} frames x {} keys in {:.2}s",
            rolls.frames(),
            rolls.keys(),
            start.elapsed().as_secs_f64()
        );

        let notes = self.decoder.decode_notes(&rolls)?;
        let pedals = self.decoder.decode_pedals(&rolls);
        info!(
            "Detected {} notes and {} pedal events on {}",
            notes.len(),
            pedals.len(),
            self.placement.effective()
        );

        Ok(Transcription::new(notes, self.model_name.clone())
            .with_pedals(pedals)
            .with_device(self.placement.effective()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_source_names() {
        let local = ModelSource::Local(PathBuf::from("/models/piano.onnx"));
        assert_eq!(local.name(), "piano");

        let hub = ModelSource::HfHub {
            repo: "acme/piano".to_string(),
            file: "model.onnx".to_string(),
        };
        assert_eq!(hub.name(), "acme/piano/model.onnx");
    }

    #[test]
    fn test_missing_local_model_is_not_found() {
        let err = ModelSource::Local(PathBuf::from("/definitely/missing.onnx"))
            .resolve()
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_cpu_always_available() {
        assert!(probe_device(ComputeDevice::Cpu).is_ok());
        let devices = OrtTranscriber::available_devices();
        assert_eq!(devices.len(), 3);
        assert!(devices
            .iter()
            .any(|(device, status)| *device == ComputeDevice::Cpu && status.is_ok()));
    }

    #[test]
    fn test_accumulator_rejects_shape_changes() {
        let mut acc = OutputAccumulator::default();
        acc.push("frame_output", &[1, 3, 2], &[0.0; 6]).unwrap();
        assert!(acc.push("frame_output", &[1, 4, 2], &[0.0; 8]).is_err());

        let segments = acc.into_segments("frame_output").unwrap();
        assert_eq!(segments.dim(), (1, 3, 2));
    }

    #[tokio::test]
    #[ignore = "Requires model download"]
    async fn test_ort_transcriber_on_silence() {
        let path = std::env::var("PIANOSCRIBE_MODEL").expect("PIANOSCRIBE_MODEL not set");
        let service = OrtTranscriber::new(
            &ModelSource::Local(PathBuf::from(path)),
            DevicePreference::Only(ComputeDevice::Cpu),
        )
        .expect("Failed to create service");

        let silence = AudioClip::new(vec![0.0; MODEL_SAMPLE_RATE as usize * 3], MODEL_SAMPLE_RATE);
        let transcription = service.transcribe(&silence).await.unwrap();

        assert!(transcription.is_empty());
        assert_eq!(transcription.device(), ComputeDevice::Cpu);
    }
}
