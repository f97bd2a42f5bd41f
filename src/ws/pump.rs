//! Per-connection pump pair
//!
//! The inbound pump is the only reader of a socket and the outbound pump the
//! only writer. Closing the outbound queue stops the outbound pump, whose exit
//! in turn stops the inbound pump, so both socket halves are released.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::Message;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::game::ClientId;

use super::hub::Hub;

/// The two tasks of one connection, built but not yet running
pub struct PumpPair {
    inbound: BoxFuture<'static, ()>,
    outbound: BoxFuture<'static, ()>,
}

impl PumpPair {
    pub fn new<R, W, E>(
        client_id: ClientId,
        hub: Hub,
        reader: R,
        writer: W,
        outbound: mpsc::Receiver<Bytes>,
        write_wait: Duration,
    ) -> Self
    where
        R: Stream<Item = Result<Message, E>> + Send + Unpin + 'static,
        E: Display + Send + 'static,
        W: Sink<Message> + Send + Unpin + 'static,
        W::Error: Display + Send,
    {
        let (done_tx, done_rx) = oneshot::channel();
        Self {
            inbound: read_pump(client_id, hub, reader, done_rx).boxed(),
            outbound: write_pump(client_id, writer, outbound, write_wait, done_tx).boxed(),
        }
    }

    /// Pair whose tasks finish immediately, for connections driven by hand
    #[cfg(test)]
    pub fn detached() -> Self {
        Self {
            inbound: futures::future::ready(()).boxed(),
            outbound: futures::future::ready(()).boxed(),
        }
    }

    /// Spawn both pumps
    pub fn start(self) -> (JoinHandle<()>, JoinHandle<()>) {
        (tokio::spawn(self.inbound), tokio::spawn(self.outbound))
    }
}

/// Read frames until the socket closes, fails, or the outbound pump stops,
/// then unregister the connection.
pub async fn read_pump<R, E>(
    client_id: ClientId,
    hub: Hub,
    mut reader: R,
    mut writer_done: oneshot::Receiver<()>,
) where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(Message::Binary(data))) => hub.receive(client_id, Bytes::from(data)).await,
                Some(Ok(Message::Text(_))) => {
                    debug!(client_id = %client_id, "Received text frame, ignoring");
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    debug!(client_id = %client_id, "Client closed connection");
                    break;
                }
                Some(Err(e)) => {
                    warn!(client_id = %client_id, error = %e, "WebSocket read error");
                    break;
                }
            },
            _ = &mut writer_done => {
                debug!(client_id = %client_id, "Outbound pump stopped, closing reader");
                break;
            }
        }
    }

    hub.unregister(client_id).await;
}

/// Drain the outbound queue into the socket, one frame per message.
/// Stops on a write error, a missed write deadline, or queue closure.
pub async fn write_pump<W>(
    client_id: ClientId,
    mut writer: W,
    mut outbound: mpsc::Receiver<Bytes>,
    write_wait: Duration,
    done: oneshot::Sender<()>,
) where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    while let Some(frame) = outbound.recv().await {
        match timeout(write_wait, writer.send(Message::Binary(frame.to_vec()))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(client_id = %client_id, error = %e, "WebSocket write error");
                drop(done);
                return;
            }
            Err(_) => {
                warn!(client_id = %client_id, "WebSocket write deadline exceeded");
                drop(done);
                return;
            }
        }
    }

    // The hub closed the queue
    let _ = timeout(write_wait, writer.send(Message::Close(None))).await;
    debug!(client_id = %client_id, "Outbound pump closed");
    drop(done);
}
