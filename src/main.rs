use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use pianoscribe::{
    Commands, Container, ContainerConfig, DevicePreference, PianoscribeWebServer, Router,
};

#[derive(Parser)]
#[command(name = "pianoscribe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory generated MIDI/MusicXML/HTML files are written to
    #[arg(short, long, global = true, default_value = "./outputs")]
    output_dir: PathBuf,

    /// Local ONNX transcription model
    #[arg(long, global = true)]
    model_path: Option<PathBuf>,

    /// Hugging Face Hub repository to download the model from
    #[arg(long, global = true)]
    model_repo: Option<String>,

    #[arg(long, global = true, default_value = "model.onnx")]
    model_file: String,

    /// auto, cpu, coreml or cuda
    #[arg(long, global = true, default_value = "auto")]
    device: DevicePreference,

    #[arg(long, global = true)]
    mock_model: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let container = Container::new(ContainerConfig {
        output_dir: cli.output_dir,
        model_path: cli.model_path,
        model_repo: cli.model_repo,
        model_file: cli.model_file,
        device: cli.device,
        mock_model: cli.mock_model,
    })
    .await?;

    match cli.command {
        Commands::Serve { port, host } => {
            info!("Starting web interface (model loads on first request)");
            let server = PianoscribeWebServer::new(Arc::new(container));
            server.serve(SocketAddr::new(host, port)).await?;
        }
        command => {
            let router = Router::new(&container);
            let output = router.route(command).await?;
            println!("{}", output);
        }
    }

    Ok(())
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use pianoscribe::ComputeDevice;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "pianoscribe",
            "transcribe",
            "take.wav",
            "--musicxml",
            "--device",
            "cuda",
            "--mock-model",
        ])
        .unwrap();

        assert_eq!(cli.device, DevicePreference::Only(ComputeDevice::Cuda));
        assert!(cli.mock_model);
        assert_eq!(cli.output_dir, PathBuf::from("./outputs"));
        match cli.command {
            Commands::Transcribe {
                audio,
                musicxml,
                html,
            } => {
                assert_eq!(audio, PathBuf::from("take.wav"));
                assert!(musicxml);
                assert!(!html);
            }
            _ => panic!("expected transcribe"),
        }
    }

    #[test]
    fn unknown_device_is_rejected() {
        let res = Cli::try_parse_from(["pianoscribe", "--device", "tpu", "devices"]);
        assert!(res.is_err(), "tpu should not be a valid device");
    }

    #[test]
    fn serve_accepts_port_and_host() {
        let cli =
            Cli::try_parse_from(["pianoscribe", "serve", "--port", "9000", "--host", "127.0.0.1"])
                .unwrap();
        match cli.command {
            Commands::Serve { port, host } => {
                assert_eq!(port, 9000);
                assert_eq!(host.to_string(), "127.0.0.1");
            }
            _ => panic!("expected serve"),
        }
    }
}
