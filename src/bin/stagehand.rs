//! Server binary for the stagehand control plane.

use clap::Parser;
use stagehand::chat::ChatPipeline;
use stagehand::engine::http::{HttpAgent, SpeechServiceClient};
use stagehand::server::AppState;
use stagehand::{AutonomousGenerator, ControlConfig, LiveModel, SessionContext, SessionRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stagehand: character control plane for an AI VTuber backend.
#[derive(Parser)]
#[command(name = "stagehand", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stagehand=info,tower=warn,hyper=warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = if let Some(ref path) = cli.config {
        ControlConfig::from_file(path)?
    } else {
        ControlConfig::default()
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    info!("stagehand v{}", env!("CARGO_PKG_VERSION"));

    let speech = Arc::new(SpeechServiceClient::new(&config.speech));
    let tts: Arc<dyn stagehand::engine::TtsEngine> = speech.clone();
    let asr: Arc<dyn stagehand::engine::AsrEngine> = speech;
    let defaults = Arc::new(SessionContext {
        model: Arc::new(LiveModel::from_config(&config.character)),
        agent: Arc::new(HttpAgent::new(&config.agent)),
        tts,
        asr,
    });
    let registry = Arc::new(SessionRegistry::new(defaults));

    let generator = AutonomousGenerator::new(
        &config.autonomous,
        Arc::clone(&registry),
        config.chat.presenter_session.clone(),
    )?;
    let autonomous = generator.handle();
    let _generator_task = generator.run();

    let (chat_tx, chat_rx) = tokio::sync::mpsc::channel(config.chat.inbound_queue_size.max(8));
    let pipeline = Arc::new(ChatPipeline::new(
        Arc::clone(&registry),
        config.chat.presenter_session.clone(),
    ));
    let _pipeline_task = Arc::clone(&pipeline).run(chat_rx);

    let state = AppState {
        registry,
        autonomous,
        chat_tx,
    };
    stagehand::server::serve(&config.server.host, config.server.port, state).await?;
    Ok(())
}
