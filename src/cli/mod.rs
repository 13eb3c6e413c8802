use std::net::IpAddr;
use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web interface
    Serve {
        #[arg(long, env = "PORT", default_value = "7860")]
        port: u16,

        /// Address to bind; 0.0.0.0 exposes the server on all interfaces
        #[arg(long, default_value = "0.0.0.0")]
        host: IpAddr,
    },

    /// Transcribe a piano recording to MIDI
    Transcribe {
        audio: PathBuf,

        /// Also write MusicXML
        #[arg(long)]
        musicxml: bool,

        /// Also write an HTML page rendering the score (implies --musicxml)
        #[arg(long)]
        html: bool,
    },

    /// Convert a MIDI file to MusicXML
    Convert { midi: PathBuf },

    /// Show which ONNX Runtime execution providers are usable
    Devices,
}
