use nao_client::clock::{Clock, PollSchedule, SystemClock};
use nao_client::config::{self, ClientMode};
use nao_client::dispatch::CommandHandler;
use nao_client::player::{SimulatedPlayer, StreamingPlayer};
use nao_client::server::ServerClient;
use nao_client::session::Session;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting nao-client (mode={:?}, server={}, device={})",
        config.mode, config.server.base_url, config.device.id,
    );

    let server = match ServerClient::new(&config.server, &config.device.id) {
        Ok(s) => s,
        Err(e) => {
            error!("HTTP client setup failed: {}", e);
            std::process::exit(1);
        }
    };

    let schedule = PollSchedule::new(config.server.poll_interval);
    let clock = SystemClock::new();

    match config.mode {
        ClientMode::Simulated => {
            let session = Session::new(server, SimulatedPlayer::new(), clock, schedule);
            run_until_shutdown(session, &config.device).await;
        }
        ClientMode::Streaming => {
            let player = StreamingPlayer::new(server.clone(), config.playback.clone());
            let session = Session::new(server, player, clock, schedule);
            run_until_shutdown(session, &config.device).await;
        }
    }

    info!("nao-client stopped");
}

async fn run_until_shutdown<H: CommandHandler, C: Clock>(
    mut session: Session<H, C>,
    device: &config::DeviceConfig,
) {
    session.start(device).await;
    info!("Ready, waiting for commands");

    tokio::select! {
        _ = session.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
        }
        _ = async {
            let mut sigterm = tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate()
            ).expect("Failed to register SIGTERM handler");
            sigterm.recv().await;
        } => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
