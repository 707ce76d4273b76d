// Skill-draft host entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config
// 3. Open the document store, select participants
// 4. Create channels
// 5. Spawn the WebSocket hub
// 6. Spawn the host event loop and start the draft
// 7. Wait for completion or Ctrl+C
// 8. Cleanup on exit

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};

use draft_host::app::{self, HostCommand};
use draft_host::config;
use draft_host::draft::coordinator::Coordinator;
use draft_host::store::{DocumentStore, SqliteStore};
use draft_host::ws_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Skill-draft host starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: ws {}:{}, store {}",
        config.server.bind, config.server.port, config.store.db_path
    );

    // 3. Open the document store and select participants
    let store = Arc::new(
        SqliteStore::open(&config.store.db_path).context("failed to open document store")?,
    );
    let participants: Vec<String> = if config.draft.participants.is_empty() {
        store
            .list_participants()
            .context("failed to list participants")?
            .into_iter()
            .filter(|p| p.player_owned)
            .map(|p| p.id)
            .collect()
    } else {
        config.draft.participants.clone()
    };
    if participants.len() < 2 {
        anyhow::bail!(
            "at least two player-owned actors are required to run a draft \
             (found {}); seed the actor store first",
            participants.len()
        );
    }
    info!("Selected {} participants for the draft", participants.len());

    // 4. Create channels
    let (ws_tx, ws_rx) = mpsc::channel(256);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (broadcast_tx, _) = broadcast::channel(256);

    // 5. Spawn the WebSocket hub
    let listener = TcpListener::bind((config.server.bind.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "failed to bind WebSocket hub on {}:{}",
                config.server.bind, config.server.port
            )
        })?;
    let hub_broadcast = broadcast_tx.clone();
    let hub_handle = tokio::spawn(async move {
        if let Err(e) = ws_server::run(listener, ws_tx, hub_broadcast).await {
            error!("WebSocket hub error: {e:#}");
        }
    });

    // 6. Spawn the host event loop and start the draft
    let coordinator = Coordinator::new(store.clone(), store.clone());
    let mut app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(ws_rx, cmd_rx, broadcast_tx, coordinator).await {
            error!("Host loop error: {e:#}");
        }
    });
    cmd_tx
        .send(HostCommand::StartDraft { participants })
        .await
        .context("host loop unavailable at startup")?;

    // 7. Wait for completion or Ctrl+C
    tokio::select! {
        result = &mut app_handle => {
            if let Err(e) = result {
                error!("Host loop task failed: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, closing the draft");
            let _ = cmd_tx.send(HostCommand::CloseDraft).await;
            let _ = tokio::time::timeout(Duration::from_secs(5), &mut app_handle).await;
        }
    }

    // 8. Cleanup: the hub loops forever, stop it explicitly
    hub_handle.abort();

    info!("Skill-draft host shut down cleanly");
    Ok(())
}

/// Initialize tracing to stderr with an env-filter override
/// (`RUST_LOG=draft_host=debug` etc.).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("draft_host=info,activity=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
