use argh::FromArgs;
use smpp_gateway::config::{GatewayConfig, LoggingConfig};
use smpp_gateway::egress::EgressClient;
use smpp_gateway::ingress::{self, AppState};
use smpp_gateway::peer::{self, PeerPool, Router};
use smpp_gateway::server::SmppServer;
use std::process;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// HTTP/SMPP gateway bridging an SMSC control plane to SMPP v3.4 peers.
#[derive(FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, default = "String::from(\"gateway.yaml\")")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Args = argh::from_env();

    let config = match GatewayConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            process::exit(1);
        }
    };

    init_logging(&config.logging);
    info!(config = %args.config, peers = config.smpp_peers.len(), "starting smpp-gateway");

    let egress = match EgressClient::new(&config.http_server.kamailio_url) {
        Ok(egress) => Arc::new(egress),
        Err(e) => {
            error!(error = %e, "cannot build egress client");
            process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles = config
        .smpp_peers
        .iter()
        .cloned()
        .map(|peer_config| peer::spawn(peer_config, Arc::clone(&egress), shutdown_rx.clone()))
        .collect();
    let pool = Arc::new(PeerPool::new(handles));
    let router = Router::new(Arc::clone(&pool));

    let smpp_listener = TcpListener::bind(config.smpp_server.address()).await?;
    let server = Arc::new(SmppServer::new(&config.smpp_server, Arc::clone(&egress)));
    tokio::spawn(server.run(smpp_listener, shutdown_rx.clone()));

    let http_listener = TcpListener::bind(config.http_server.address()).await?;
    info!(address = %config.http_server.address(), "HTTP ingress listening");
    let app = ingress::app(Arc::new(AppState::new(pool, router)));

    let mut http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        axum::serve(http_listener, app)
            .with_graceful_shutdown(async move {
                let _ = http_shutdown.changed().await;
            })
            .await
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);

    // Give sessions a moment to write their unbinds before the process
    // drops the sockets.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), http_task).await;
    info!("goodbye");

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = config
        .console_enabled
        .then(|| tracing_subscriber::fmt::layer());

    let file_layer = config.file_path.as_ref().and_then(|path| {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            ),
            Err(e) => {
                eprintln!("cannot open log file {path}: {e}");
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}
