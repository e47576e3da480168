//! The persistent event connection.
//!
//! [`Gateway::connect`] opens the WebSocket, authenticates, and hands the
//! stream to a background task.  The task forwards inbound text frames
//! untouched, sends a keepalive every [`KEEPALIVE_INTERVAL`], and reports how
//! the connection ended.  There is no reconnection.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::{Error, Result};
use crate::observability::{GATEWAY_BYTES, GATEWAY_ERRORS, GATEWAY_FRAMES, GATEWAY_KEEPALIVES};
use crate::types::ClientFrame;

/// Time between keepalive pings.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);

/// What the connection task reports to the session.
#[derive(Debug)]
pub enum GatewayEvent {
    /// One inbound text frame, undecoded.
    Frame(String),
    /// The server closed the connection.
    Closed,
    /// The connection failed or ended without a close frame.
    Failed(Error),
}

/// Handle to the connection task.  Dropping it closes the connection.
#[derive(Debug)]
pub struct Gateway {
    close: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Gateway {
    /// Connects to `url`, sends the `Authenticate` frame and starts the
    /// connection task.  Events arrive on the returned receiver in delivery
    /// order.
    pub async fn connect(
        url: &str,
        token: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<GatewayEvent>)> {
        url::Url::parse(url)?;
        let (stream, _) = connect_async(url).await.map_err(|err| {
            Error::gateway(
                format!("failed to connect to {url}: {err}"),
                Some(Box::new(err)),
            )
        })?;
        tracing::info!(url, "event connection open");

        let authenticate = ClientFrame::Authenticate {
            token: token.to_string(),
        }
        .encode()?;
        let (close, close_rx) = oneshot::channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(stream, authenticate, close_rx, events_tx));
        Ok((
            Self {
                close: Some(close),
                task: Some(task),
            },
            events,
        ))
    }

    /// A handle with no connection behind it.  The returned receiver
    /// resolves when the handle is closed or dropped.
    pub fn detached() -> (Self, oneshot::Receiver<()>) {
        let (close, close_rx) = oneshot::channel();
        (
            Self {
                close: Some(close),
                task: None,
            },
            close_rx,
        )
    }

    /// Closes the connection and waits for the task to wind down.
    pub async fn close(&mut self) {
        if let Some(close) = self.close.take() {
            let _ = close.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            tracing::warn!("connection task ended abnormally: {err}");
        }
    }
}

async fn run_connection(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    authenticate: String,
    mut close: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<GatewayEvent>,
) {
    let (mut sink, mut source) = stream.split();

    if let Err(err) = sink.send(WsMessage::Text(authenticate)).await {
        GATEWAY_ERRORS.click();
        let _ = events.send(GatewayEvent::Failed(err.into()));
        return;
    }

    let mut keepalive = interval_at(Instant::now() + KEEPALIVE_INTERVAL, KEEPALIVE_INTERVAL);
    let outcome = loop {
        tokio::select! {
            inbound = source.next() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    GATEWAY_FRAMES.click();
                    GATEWAY_BYTES.count(text.len() as u64);
                    if events.send(GatewayEvent::Frame(text)).is_err() {
                        break None;
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    tracing::info!(?frame, "server closed the event connection");
                    break Some(GatewayEvent::Closed);
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => break Some(GatewayEvent::Failed(err.into())),
                None => {
                    break Some(GatewayEvent::Failed(Error::gateway(
                        "connection ended without a close frame",
                        None,
                    )));
                }
            },
            _ = &mut close => {
                let _ = sink.send(WsMessage::Close(None)).await;
                let _ = sink.close().await;
                break None;
            }
            _ = keepalive.tick() => {
                GATEWAY_KEEPALIVES.click();
                let ping = match (ClientFrame::Ping { data: 0 }).encode() {
                    Ok(ping) => ping,
                    Err(err) => break Some(GatewayEvent::Failed(err)),
                };
                if let Err(err) = sink.send(WsMessage::Text(ping)).await {
                    break Some(GatewayEvent::Failed(err.into()));
                }
            }
        }
    };

    if let Some(event) = outcome {
        if let GatewayEvent::Failed(err) = &event {
            GATEWAY_ERRORS.click();
            tracing::error!("event connection failed: {err}");
        }
        let _ = events.send(event);
    }
}
