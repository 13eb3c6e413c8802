use anyhow::Result;

use crate::Commands;

use super::container::Container;
use super::controller::{ConvertController, DevicesController, TranscribeController};

pub struct Router<'a> {
    transcribe_controller: TranscribeController<'a>,
    convert_controller: ConvertController<'a>,
    devices_controller: DevicesController<'a>,
}

impl<'a> Router<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self {
            transcribe_controller: TranscribeController::new(container),
            convert_controller: ConvertController::new(container),
            devices_controller: DevicesController::new(container),
        }
    }

    pub async fn route(&self, command: Commands) -> Result<String> {
        match command {
            Commands::Transcribe {
                audio,
                musicxml,
                html,
            } => {
                self.transcribe_controller
                    .transcribe(audio, musicxml, html)
                    .await
            }
            Commands::Convert { midi } => self.convert_controller.convert(midi).await,
            Commands::Devices => self.devices_controller.devices().await,
            Commands::Serve { .. } => unreachable!("Serve command is handled separately in main"),
        }
    }
}
