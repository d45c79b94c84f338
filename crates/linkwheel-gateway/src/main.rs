use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use linkwheel_core::config::LinkwheelConfig;
use linkwheel_rotation::RotationStore;
use linkwheel_scheduler::{DispatchEngine, DispatchTarget, EngineConfig, Schedule};
use linkwheel_transport::{supervisor, BackoffPolicy, BridgeTransport, SupervisorConfig, Transport};

mod app;
mod http;

/// Posts the next link in rotation to a chat on a daily or fixed-interval
/// schedule, with a keep-alive HTTP surface for uptime pingers.
#[derive(Parser, Debug)]
#[command(name = "linkwheel", version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linkwheel=info,tower_http=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config flag > LINKWHEEL_CONFIG env > ./linkwheel.toml
    let config = LinkwheelConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        LinkwheelConfig::default()
    });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    // rotation state: a hot-editable link file plus a durable cursor record
    let store = Arc::new(RotationStore::new(
        config.rotation.links.clone(),
        config.rotation.cursor.clone(),
    ));
    info!(
        links = %config.rotation.links,
        cursor = %config.rotation.cursor,
        "rotation store ready"
    );

    let transport: Arc<dyn Transport> = Arc::new(BridgeTransport::new(
        config.bridge.url.clone(),
        config.bridge.token.clone(),
        Duration::from_secs(config.delivery.timeout),
    )?);

    // schedule and target are validated up front — a bad value fails startup
    // instead of the first tick
    let schedule = Schedule::from_config(&config.schedule)?;
    let target = DispatchTarget::from_config(&config.target)?;

    let engine = DispatchEngine::new(
        Arc::clone(&store),
        Arc::clone(&transport),
        target,
        schedule,
        EngineConfig::from_delivery(&config.delivery),
    );

    let supervisor_config = SupervisorConfig {
        probe_interval: Duration::from_secs(config.bridge.probe),
        qr_path: config.bridge.qr.clone().map(PathBuf::from),
        backoff: BackoffPolicy::default(),
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // The connection lifecycle and the dispatch trigger run independently:
    // the supervisor reconnects and re-probes, while the engine registers
    // its schedule once and reads session state at tick time.
    tokio::spawn(supervisor::run(
        Arc::clone(&transport),
        supervisor_config,
        shutdown_rx.clone(),
    ));
    tokio::spawn(engine.run(shutdown_rx));

    let state = Arc::new(app::AppState { transport, store });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Linkwheel gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    // signal background loops to stop
    let _ = shutdown_tx.send(true);
    Ok(())
}
