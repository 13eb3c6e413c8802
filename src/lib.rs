pub mod application;
pub mod cli;
pub mod connector;
pub mod domain;

pub use application::{
    AudioDecoder, ConvertMidiUseCase, MidiCodec, NotationConverter, TranscribeAudioUseCase,
    TranscriptionService,
};

pub use cli::Commands;

pub use connector::{
    Container, ContainerConfig, MidlyCodec, MockTranscriber, ModelSource, MusicXmlConverter,
    OrtTranscriber, Router, ScoreRenderer, SymphoniaDecoder,
};

pub use connector::adapter::web::PianoscribeWebServer;

pub use domain::{
    AudioClip, AudioFormat, ComputeDevice, DevicePreference, DomainError, NoteEvent, PedalEvent,
    PlacementReport, TranscribeRequest, Transcription, TranscriptionArtifacts,
};
