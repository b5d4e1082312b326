use anyhow::{Context, Result};
use clap::Parser;
use loqa_rooms::{
    create_router, AppState, BackendClient, Config, DryRunEngine, IceConfigProvider, NatsClient,
    NatsRoomChannel, NatsSpeechEngine, PresenceKind, RoomSession, SessionDeps,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "loqa-rooms", about = "Join a room, negotiate peer links and share a live transcript")]
struct Args {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/loqa-rooms")]
    config: String,

    /// Room to join (defaults to relay.room)
    #[arg(long)]
    room: Option<String>,

    /// Participant id (generated when omitted)
    #[arg(long)]
    client_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;
    let session_config = cfg.session_config(args.room, args.client_id);

    info!("Loqa Rooms v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!(
        "Joining room {} as {}",
        session_config.room, session_config.client_id
    );

    let backend = BackendClient::new(cfg.backend.base_url.clone(), cfg.backend.timeout())?;
    let ice_servers = IceConfigProvider::new(backend.clone()).ice_servers().await;

    let nats = NatsClient::connect(
        &cfg.relay.url,
        cfg.relay.subject_prefix.clone(),
        session_config.room.clone(),
        session_config.client_id.clone(),
    )
    .await?;

    // Subscribe before announcing so the membership snapshot is not missed
    let inbound = nats.subscribe_room().await?;
    let (channel, writer) = NatsRoomChannel::spawn(nats.clone());

    let deps = SessionDeps {
        engine: Arc::new(DryRunEngine::new(session_config.client_id.clone())),
        channel: Arc::new(channel),
        ice_servers,
        inbound,
        speech: Box::new(NatsSpeechEngine::new(
            nats.clone(),
            session_config.client_id.to_string(),
        )),
        store: Arc::new(backend.clone()),
    };
    let room = session_config.room.clone();
    let (session, session_task) = RoomSession::spawn(session_config, deps);

    nats.announce(PresenceKind::Join).await?;

    let state = AppState::new(session.clone(), Arc::new(backend), room);
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    let shutdown_handle = session.clone();
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
                _ = shutdown_handle.closed() => info!("Session ended"),
            }
        })
        .await
        .context("HTTP server failed")?;

    if let Err(e) = session.leave().await {
        warn!("Session already closed: {}", e);
    }
    let _ = session_task.await;
    // The writer drains once the session has dropped its channel
    let _ = writer.await;

    nats.announce(PresenceKind::Leave).await?;

    info!("Goodbye");
    Ok(())
}
