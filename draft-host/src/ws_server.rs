// WebSocket hub: fan-out broadcast channel between the host loop and all
// connected participant clients.

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{info, warn};

/// Events emitted by the hub to the host loop.
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    /// A client completed the WebSocket handshake.
    Connected { addr: String },
    /// A client disconnected (close frame, error, or dropped socket).
    Disconnected { addr: String },
    /// A text frame received from a client (raw JSON string).
    Message { addr: String, text: String },
}

/// Run the hub on an already-bound listener.
///
/// Every accepted connection gets its own task: inbound text frames are
/// forwarded through `inbound_tx`, and every frame sent on `broadcast_tx`
/// is delivered to every connected client. Handshake failures are logged
/// and the connection dropped; the hub itself runs until the task is
/// cancelled or the listener fails.
pub async fn run(
    listener: TcpListener,
    inbound_tx: mpsc::Sender<WsEvent>,
    broadcast_tx: broadcast::Sender<String>,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("WebSocket hub listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        let addr = addr.to_string();
        let inbound = inbound_tx.clone();
        let outbound = broadcast_tx.subscribe();
        tokio::spawn(async move {
            match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => serve_client(ws, addr, inbound, outbound).await,
                Err(e) => warn!("WebSocket handshake failed for {addr}: {e}"),
            }
        });
    }
}

/// Drive one client connection until either side goes away.
async fn serve_client(
    ws: WebSocketStream<TcpStream>,
    addr: String,
    inbound: mpsc::Sender<WsEvent>,
    mut outbound: broadcast::Receiver<String>,
) {
    if inbound
        .send(WsEvent::Connected { addr: addr.clone() })
        .await
        .is_err()
    {
        return;
    }

    let (mut write, read) = ws.split();

    // Writer half: deliver every host broadcast to this client.
    let writer_addr = addr.clone();
    let writer = tokio::spawn(async move {
        loop {
            match outbound.recv().await {
                Ok(text) => {
                    if write.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // A stalled client misses snapshots; it can ask the host
                    // for a resend once it catches up.
                    warn!("client {writer_addr} lagged, skipped {n} broadcasts");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Reader half: forward inbound frames until close or error.
    let _ = forward_frames(read, &inbound, &addr).await;

    writer.abort();
    let _ = inbound.send(WsEvent::Disconnected { addr }).await;
}

/// Forward raw WebSocket [`Message`] items from any [`Stream`] through `tx`.
/// Returns `Err(())` if the channel is closed (receiver dropped), signalling
/// the caller to stop.
///
/// This is a pure-logic function that requires no I/O and is the primary
/// unit-test target; `serve_client` drives it with the real socket stream.
pub async fn forward_frames<St>(
    mut stream: St,
    tx: &mpsc::Sender<WsEvent>,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let event = WsEvent::Message {
                    addr: addr.to_string(),
                    text: text.to_string(),
                };
                if tx.send(event).await.is_err() {
                    return Err(());
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
    Ok(())
}
