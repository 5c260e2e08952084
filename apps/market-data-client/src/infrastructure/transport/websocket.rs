//! WebSocket Transport
//!
//! Channel adapters over `tokio-tungstenite`. `wss://` endpoints use rustls
//! with the webpki root store.
//!
//! # Framing
//!
//! - Request/reply: one binary frame out, one binary (or text) frame back.
//! - Publish/subscribe: JSON text [`ControlFrame`]s out, `MessagePack`
//!   binary [`PublishedFrame`]s in.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{
    DeliverySink, InboundMessage, RequestChannel, SubscriberChannel, TransportError,
};
use crate::infrastructure::metrics;
use crate::infrastructure::wire::{ControlAction, ControlFrame, PublishedFrame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a socket, retrying per the reconnect policy.
async fn connect_with_retry(
    endpoint: &str,
    reconnect: &ReconnectConfig,
) -> Result<WsStream, TransportError> {
    let mut policy = ReconnectPolicy::new(reconnect.clone());

    loop {
        tracing::info!(endpoint, "Connecting");
        match tokio_tungstenite::connect_async(endpoint).await {
            Ok((stream, _response)) => {
                tracing::info!(endpoint, "Connected");
                return Ok(stream);
            }
            Err(e) => {
                tracing::warn!(endpoint, error = %e, "Connection attempt failed");
                metrics::record_reconnect(endpoint);

                let Some(delay) = policy.next_delay() else {
                    return Err(TransportError::ConnectionFailed {
                        endpoint: endpoint.to_string(),
                        message: e.to_string(),
                    });
                };

                tracing::info!(
                    endpoint,
                    attempt = policy.attempt_count(),
                    delay_ms = delay.as_millis(),
                    "Retrying connection"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

// =============================================================================
// Request Channel
// =============================================================================

/// Request/reply over a single WebSocket.
///
/// The stream lives behind an async mutex, so a second request waits until
/// the first one's reply has been read. A request dropped while its reply is
/// outstanding (timeout, cancelled caller) discards the socket, and the next
/// request opens a fresh one while the channel is meant to be connected.
pub struct WsRequestChannel {
    endpoint: String,
    reconnect: ReconnectConfig,
    stream: tokio::sync::Mutex<Option<WsStream>>,
    connected: AtomicBool,
    wanted: AtomicBool,
    disposed: AtomicBool,
}

impl std::fmt::Debug for WsRequestChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsRequestChannel")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl WsRequestChannel {
    /// Create a disconnected channel.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, reconnect: ReconnectConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            reconnect,
            stream: tokio::sync::Mutex::new(None),
            connected: AtomicBool::new(false),
            wanted: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    fn closed(&self, stream: &mut Option<WsStream>) -> TransportError {
        stream.take();
        self.connected.store(false, Ordering::SeqCst);
        TransportError::ConnectionClosed(self.endpoint.clone())
    }
}

/// One request/reply exchange holding the socket.
///
/// Dropped while `awaiting_reply` is set, the socket is discarded: its next
/// frame would be the reply to a request nobody is waiting for.
struct Exchange<'a> {
    stream: tokio::sync::MutexGuard<'a, Option<WsStream>>,
    connected: &'a AtomicBool,
    endpoint: &'a str,
    awaiting_reply: bool,
}

impl Drop for Exchange<'_> {
    fn drop(&mut self) {
        if self.awaiting_reply && self.stream.take().is_some() {
            self.connected.store(false, Ordering::SeqCst);
            tracing::warn!(
                endpoint = self.endpoint,
                "Request abandoned before its reply, socket discarded"
            );
        }
    }
}

#[async_trait]
impl RequestChannel for WsRequestChannel {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), TransportError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(TransportError::Disposed(self.endpoint.clone()));
        }

        let mut guard = self.stream.lock().await;
        if guard.is_none() {
            *guard = Some(connect_with_retry(&self.endpoint, &self.reconnect).await?);
        }
        self.connected.store(true, Ordering::SeqCst);
        self.wanted.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn request(&self, payload: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(TransportError::Disposed(self.endpoint.clone()));
        }

        let mut guard = self.stream.lock().await;
        if guard.is_none() && self.wanted.load(Ordering::SeqCst) {
            tracing::info!(endpoint = %self.endpoint, "Reopening request socket");
            *guard = Some(connect_with_retry(&self.endpoint, &self.reconnect).await?);
            self.connected.store(true, Ordering::SeqCst);
        }
        if guard.is_none() {
            return Err(TransportError::NotConnected(self.endpoint.clone()));
        }

        let mut exchange = Exchange {
            stream: guard,
            connected: &self.connected,
            endpoint: &self.endpoint,
            awaiting_reply: true,
        };
        let sent = match exchange.stream.as_mut() {
            Some(stream) => stream.send(Message::Binary(payload.into())).await,
            None => return Err(TransportError::NotConnected(self.endpoint.clone())),
        };
        if let Err(e) = sent {
            tracing::warn!(endpoint = %self.endpoint, error = %e, "Request send failed");
            self.closed(&mut exchange.stream);
            return Err(TransportError::SendFailed(e.to_string()));
        }

        loop {
            let next = match exchange.stream.as_mut() {
                Some(stream) => stream.next().await,
                None => return Err(TransportError::NotConnected(self.endpoint.clone())),
            };

            match next {
                Some(Ok(Message::Binary(data))) => {
                    exchange.awaiting_reply = false;
                    return Ok(data.to_vec());
                }
                Some(Ok(Message::Text(text))) => {
                    exchange.awaiting_reply = false;
                    return Ok(text.as_str().as_bytes().to_vec());
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(self.closed(&mut exchange.stream));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.closed(&mut exchange.stream);
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.wanted.store(false, Ordering::SeqCst);
        let mut guard = self.stream.lock().await;
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut stream) = guard.take() {
            stream
                .close(None)
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            tracing::info!(endpoint = %self.endpoint, "Disconnected");
        }
        Ok(())
    }

    async fn dispose(&self) {
        if let Err(e) = self.disconnect().await {
            tracing::debug!(endpoint = %self.endpoint, error = %e, "Close during dispose failed");
        }
        self.disposed.store(true, Ordering::SeqCst);
    }
}

// =============================================================================
// Subscriber Channel
// =============================================================================

/// Publish/subscribe over a single WebSocket.
///
/// A reader task decodes published frames and hands them to the sink until
/// the socket closes, the sink closes, or the channel is disconnected.
/// Subscribed topics are remembered and re-sent on every connect.
pub struct WsSubscriberChannel {
    endpoint: String,
    reconnect: ReconnectConfig,
    writer: tokio::sync::Mutex<Option<SplitSink<WsStream, Message>>>,
    cancel: parking_lot::Mutex<Option<CancellationToken>>,
    topics: parking_lot::Mutex<BTreeSet<String>>,
    connected: Arc<AtomicBool>,
    disposed: AtomicBool,
}

impl std::fmt::Debug for WsSubscriberChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSubscriberChannel")
            .field("endpoint", &self.endpoint)
            .field("topics", &*self.topics.lock())
            .finish_non_exhaustive()
    }
}

impl WsSubscriberChannel {
    /// Create a disconnected channel.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, reconnect: ReconnectConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            reconnect,
            writer: tokio::sync::Mutex::new(None),
            cancel: parking_lot::Mutex::new(None),
            topics: parking_lot::Mutex::new(BTreeSet::new()),
            connected: Arc::new(AtomicBool::new(false)),
            disposed: AtomicBool::new(false),
        }
    }

    async fn send_control(&self, action: ControlAction, topic: &str) -> Result<(), TransportError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(TransportError::Disposed(self.endpoint.clone()));
        }

        let frame = ControlFrame {
            action,
            topic: topic.to_string(),
        };
        let text =
            serde_json::to_string(&frame).map_err(|e| TransportError::SendFailed(e.to_string()))?;

        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(TransportError::NotConnected(self.endpoint.clone()));
        };
        writer
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

async fn read_published(
    mut read: SplitStream<WsStream>,
    sink: Arc<dyn DeliverySink>,
    cancel: CancellationToken,
    connected: Arc<AtomicBool>,
    endpoint: String,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!(%endpoint, "Reader cancelled");
                break;
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        match rmp_serde::from_slice::<PublishedFrame>(&data) {
                            Ok(frame) => {
                                let delivered = sink
                                    .deliver(InboundMessage {
                                        topic: frame.topic,
                                        payload: frame.payload,
                                    })
                                    .await;
                                if !delivered {
                                    tracing::debug!(%endpoint, "Delivery sink closed");
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(
                                    %endpoint,
                                    error = %e,
                                    "Undecodable published frame"
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::warn!(%endpoint, "Subscriber socket closed by peer");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(%endpoint, error = %e, "Subscriber socket error");
                        break;
                    }
                }
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

#[async_trait]
impl SubscriberChannel for WsSubscriberChannel {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self, sink: Arc<dyn DeliverySink>) -> Result<(), TransportError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(TransportError::Disposed(self.endpoint.clone()));
        }
        if self.is_connected() {
            return Ok(());
        }

        let stream = connect_with_retry(&self.endpoint, &self.reconnect).await?;
        let (write, read) = stream.split();
        *self.writer.lock().await = Some(write);

        let cancel = CancellationToken::new();
        if let Some(previous) = self.cancel.lock().replace(cancel.clone()) {
            previous.cancel();
        }
        self.connected.store(true, Ordering::SeqCst);

        tokio::spawn(read_published(
            read,
            sink,
            cancel,
            Arc::clone(&self.connected),
            self.endpoint.clone(),
        ));

        let topics: Vec<String> = self.topics.lock().iter().cloned().collect();
        for topic in topics {
            self.send_control(ControlAction::Subscribe, &topic).await?;
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.send_control(ControlAction::Subscribe, topic).await?;
        self.topics.lock().insert(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.send_control(ControlAction::Unsubscribe, topic).await?;
        self.topics.lock().remove(topic);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Some(cancel) = self.cancel.lock().take() {
            cancel.cancel();
        }
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.lock().await.take() {
            writer
                .close()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            tracing::info!(endpoint = %self.endpoint, "Disconnected");
        }
        Ok(())
    }

    async fn dispose(&self) {
        if let Err(e) = self.disconnect().await {
            tracing::debug!(endpoint = %self.endpoint, error = %e, "Close during dispose failed");
        }
        self.topics.lock().clear();
        self.disposed.store(true, Ordering::SeqCst);
    }
}
