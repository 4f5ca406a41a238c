//! WebSocket transport.
//!
//! One task per connection reads frames and hands them to the [`Hub`] while
//! draining the connection's outbound queue into the socket.

use crate::action::{CommandActionSink, HardwareActionSink, LogActionSink};
use crate::config::HubConfig;
use crate::registry::{ConnectionId, Frame};
use crate::repository::{ContentRepository, MemoryRepository};
use crate::router::Hub;
use futures_util::{SinkExt, StreamExt};
use signage_core::LocationId;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// How long live sessions get to close cleanly before they are aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Build a hub from configuration and serve until Ctrl-C.
pub async fn run(config: HubConfig) -> anyhow::Result<()> {
    let repository: Arc<dyn ContentRepository> = match &config.library {
        Some(path) => Arc::new(MemoryRepository::from_json_file(path)?),
        None => {
            tracing::warn!("No library configured, starting with an empty repository");
            Arc::new(MemoryRepository::new())
        }
    };

    let commands = CommandActionSink::new(&config.actions);
    let actions: Arc<dyn HardwareActionSink> = if commands.is_empty() {
        Arc::new(LogActionSink)
    } else {
        Arc::new(commands)
    };

    let hub = Arc::new(Hub::new(repository, actions).replay_on_connect(config.replay_on_connect));

    let listener = TcpListener::bind(config.bind).await?;
    tracing::info!("Listening on ws://{}", listener.local_addr()?);

    serve(listener, hub, config.outbound_queue, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Accept connections until `shutdown` resolves, then close them all.
pub async fn serve<F>(
    listener: TcpListener,
    hub: Arc<Hub>,
    outbound_queue: usize,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let (closing_tx, closing) = watch::channel(false);
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("Accept failed: {}", e);
                        continue;
                    }
                };
                let hub = hub.clone();
                let closing = closing.clone();
                sessions.spawn(async move {
                    let session = handle_connection(stream, addr, hub, outbound_queue, closing);
                    if let Err(e) = session.await {
                        tracing::warn!("Connection error from {}: {}", addr, e);
                    }
                });
            }

            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}

            _ = &mut shutdown => {
                tracing::info!("Shutting down, closing {} connections", sessions.len());
                break;
            }
        }
    }

    let _ = closing_tx.send(true);
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while sessions.join_next().await.is_some() {}
    })
    .await
    .is_ok();
    if !drained {
        tracing::warn!("{} connections did not close in time, aborting", sessions.len());
        sessions.shutdown().await;
    }
    Ok(())
}

/// Deregisters its connection when dropped, including when the session task
/// is aborted.
struct Registration {
    hub: Arc<Hub>,
    conn: ConnectionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.hub.disconnect(self.conn);
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    hub: Arc<Hub>,
    outbound_queue: usize,
    mut closing: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let mut query = None;
    let ws = tokio_tungstenite::accept_hdr_async(
        stream,
        |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            query = request.uri().query().map(str::to_owned);
            Ok(response)
        },
    )
    .await?;
    let location = query.as_deref().and_then(LocationId::from_query);
    let (mut sink, mut stream) = ws.split();

    let (tx, mut rx) = mpsc::channel::<Frame>(outbound_queue);
    let conn = hub.connect(tx, location).await;
    let registration = Registration {
        hub: hub.clone(),
        conn,
    };
    tracing::info!(%conn, %addr, location = ?location, "Client connected");

    // Ends once the registry drops the connection's sender.
    let writer = async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(frame.to_string().into())).await {
                tracing::debug!(%conn, "Write failed: {}", e);
                break;
            }
        }
        let _ = sink.close().await;
    };

    let reader = async {
        loop {
            tokio::select! {
                message = stream.next() => match message {
                    Some(Ok(Message::Text(text))) => hub.handle_frame(conn, text.as_str()).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(%conn, "WebSocket error: {}", e);
                        break;
                    }
                },
                _ = async { let _ = closing.wait_for(|closing| *closing).await; } => break,
            }
        }
        drop(registration);
    };

    tokio::join!(reader, writer);
    tracing::info!(%conn, %addr, "Client disconnected");
    Ok(())
}
