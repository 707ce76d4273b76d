// Host orchestration: the event loop that connects the WebSocket hub to the
// draft coordinator.
//
// One loop, one coordinator, no shared mutable state: every channel event is
// handled to completion (including broadcasting the resulting snapshots)
// before the next one is looked at.

use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crate::draft::coordinator::Coordinator;
use crate::draft::state::ParticipantId;
use crate::protocol;
use crate::store::{ActivityLog, DocumentStore};
use crate::ws_server::WsEvent;

/// Commands from the host operator.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// Begin a draft with the selected participants.
    StartDraft { participants: Vec<ParticipantId> },
    /// Tear the draft down, completed or not.
    CloseDraft,
}

/// Run the host event loop until the draft completes, the operator closes
/// it, or every channel is gone.
pub async fn run<S, L>(
    mut ws_rx: mpsc::Receiver<WsEvent>,
    mut cmd_rx: mpsc::Receiver<HostCommand>,
    broadcast_tx: broadcast::Sender<String>,
    mut coordinator: Coordinator<S, L>,
) -> anyhow::Result<()>
where
    S: DocumentStore,
    L: ActivityLog,
{
    info!("Host event loop started");

    loop {
        tokio::select! {
            ws_event = ws_rx.recv() => {
                match ws_event {
                    Some(WsEvent::Connected { addr }) => {
                        info!("Client connected from {addr}");
                    }
                    Some(WsEvent::Disconnected { addr }) => {
                        // The draft waits indefinitely for the current
                        // picker; a reconnecting client catches up through
                        // a state request.
                        info!("Client {addr} disconnected");
                    }
                    Some(WsEvent::Message { addr, text }) => {
                        handle_frame(&mut coordinator, &addr, &text);
                    }
                    None => {
                        info!("WebSocket channel closed, shutting down");
                        break;
                    }
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(HostCommand::StartDraft { participants }) => {
                        if let Err(e) = coordinator.start_draft(participants) {
                            warn!("Could not start draft: {e}");
                        }
                    }
                    Some(HostCommand::CloseDraft) => {
                        coordinator.close();
                        flush_outbox(&mut coordinator, &broadcast_tx);
                        info!("Draft closed by operator, host loop exiting");
                        return Ok(());
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }
        }

        flush_outbox(&mut coordinator, &broadcast_tx);
        if coordinator.is_complete() {
            info!("Draft complete, host loop exiting");
            break;
        }
    }

    Ok(())
}

/// Decode one inbound frame and hand it to the coordinator. Malformed frames
/// are logged and dropped; the channel has no failure-acknowledgement
/// concept to answer with.
fn handle_frame<S, L>(coordinator: &mut Coordinator<S, L>, addr: &str, text: &str)
where
    S: DocumentStore,
    L: ActivityLog,
{
    let event = match protocol::decode(text) {
        Ok(event) => event,
        Err(e) => {
            warn!("Failed to parse frame from {addr}: {e}");
            return;
        }
    };
    coordinator.handle_event(event);
}

/// Broadcast every pending coordinator event. A send error only means no
/// client is connected yet; the events are snapshots, so late joiners
/// recover through `RequestState`.
fn flush_outbox<S, L>(
    coordinator: &mut Coordinator<S, L>,
    broadcast_tx: &broadcast::Sender<String>,
) where
    S: DocumentStore,
    L: ActivityLog,
{
    for event in coordinator.take_outbox() {
        match protocol::encode(&event) {
            Ok(json) => {
                let _ = broadcast_tx.send(json);
            }
            Err(e) => warn!("Failed to encode outbound event: {e}"),
        }
    }
}
