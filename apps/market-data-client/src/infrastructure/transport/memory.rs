//! In-Memory Transport
//!
//! Channel adapters that never touch a socket. The request channel answers
//! through a responder closure; the subscriber channel filters published
//! messages by subscribed topic the way the data service does. Used by the
//! test suite and for local demos.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::application::ports::{
    DeliverySink, InboundMessage, RequestChannel, SubscriberChannel, TransportError,
};
use crate::infrastructure::wire::{ControlAction, ControlFrame};

/// Computes the reply for one request.
pub type Responder = Box<dyn Fn(&[u8]) -> Result<Vec<u8>, TransportError> + Send + Sync>;

// =============================================================================
// Request Channel
// =============================================================================

/// Request/reply channel answered by a closure.
pub struct InMemoryRequestChannel {
    endpoint: String,
    responder: Responder,
    connected: AtomicBool,
    disposed: AtomicBool,
    requests: Mutex<Vec<Vec<u8>>>,
    bytes_sent: AtomicUsize,
}

impl fmt::Debug for InMemoryRequestChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRequestChannel")
            .field("endpoint", &self.endpoint)
            .field("requests", &self.requests.lock().len())
            .finish_non_exhaustive()
    }
}

impl InMemoryRequestChannel {
    /// Create a channel answering with `responder`.
    pub fn new(
        endpoint: impl Into<String>,
        responder: impl Fn(&[u8]) -> Result<Vec<u8>, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            responder: Box::new(responder),
            connected: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
            bytes_sent: AtomicUsize::new(0),
        }
    }

    /// Create a channel that fails every request.
    #[must_use]
    pub fn unanswered(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let closed = endpoint.clone();
        Self::new(endpoint, move |_| {
            Err(TransportError::ConnectionClosed(closed.clone()))
        })
    }

    /// Every request payload sent so far.
    #[must_use]
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().clone()
    }

    /// Total request bytes sent so far.
    #[must_use]
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestChannel for InMemoryRequestChannel {
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
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn request(&self, payload: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(TransportError::Disposed(self.endpoint.clone()));
        }
        if !self.is_connected() {
            return Err(TransportError::NotConnected(self.endpoint.clone()));
        }

        self.bytes_sent.fetch_add(payload.len(), Ordering::SeqCst);
        let reply = (self.responder)(&payload);
        self.requests.lock().push(payload);
        reply
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn dispose(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.disposed.store(true, Ordering::SeqCst);
    }
}

// =============================================================================
// Subscriber Channel
// =============================================================================

/// Publish/subscribe channel fed by [`publish`](Self::publish).
pub struct InMemorySubscriberChannel {
    endpoint: String,
    sink: Mutex<Option<Arc<dyn DeliverySink>>>,
    topics: Mutex<BTreeSet<String>>,
    control_log: Mutex<Vec<ControlFrame>>,
    connected: AtomicBool,
    disposed: AtomicBool,
}

impl fmt::Debug for InMemorySubscriberChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySubscriberChannel")
            .field("endpoint", &self.endpoint)
            .field("topics", &*self.topics.lock())
            .finish_non_exhaustive()
    }
}

impl InMemorySubscriberChannel {
    /// Create a disconnected channel.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            sink: Mutex::new(None),
            topics: Mutex::new(BTreeSet::new()),
            control_log: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    /// Publish a message. It is delivered only if the topic is subscribed
    /// and the channel is connected; returns whether it was delivered.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> bool {
        if !self.topics.lock().contains(topic) {
            return false;
        }
        let Some(sink) = self.sink.lock().clone() else {
            return false;
        };

        sink.deliver(InboundMessage {
            topic: topic.to_string(),
            payload,
        })
        .await
    }

    /// Subscribe and unsubscribe frames received, in order.
    #[must_use]
    pub fn control_log(&self) -> Vec<ControlFrame> {
        self.control_log.lock().clone()
    }

    /// Currently subscribed topics.
    #[must_use]
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.topics.lock().iter().cloned().collect()
    }

    fn check_open(&self) -> Result<(), TransportError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(TransportError::Disposed(self.endpoint.clone()));
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected(self.endpoint.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriberChannel for InMemorySubscriberChannel {
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
        *self.sink.lock() = Some(sink);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.check_open()?;
        self.topics.lock().insert(topic.to_string());
        self.control_log.lock().push(ControlFrame {
            action: ControlAction::Subscribe,
            topic: topic.to_string(),
        });
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.check_open()?;
        self.topics.lock().remove(topic);
        self.control_log.lock().push(ControlFrame {
            action: ControlAction::Unsubscribe,
            topic: topic.to_string(),
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        self.sink.lock().take();
        Ok(())
    }

    async fn dispose(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.disposed.store(true, Ordering::SeqCst);
        self.sink.lock().take();
        self.topics.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collect(Mutex<Vec<InboundMessage>>);

    #[async_trait]
    impl DeliverySink for Collect {
        async fn deliver(&self, message: InboundMessage) -> bool {
            self.0.lock().push(message);
            true
        }
    }

    #[tokio::test]
    async fn request_requires_connect() {
        let channel = InMemoryRequestChannel::new("mem://ticks", |bytes| Ok(bytes.to_vec()));
        assert!(matches!(
            channel.request(vec![1]).await,
            Err(TransportError::NotConnected(_))
        ));

        channel.connect().await.unwrap();
        assert_eq!(channel.request(vec![1, 2]).await.unwrap(), vec![1, 2]);
        assert_eq!(channel.bytes_sent(), 2);
    }

    #[tokio::test]
    async fn disposed_request_channel_refuses() {
        let channel = InMemoryRequestChannel::unanswered("mem://ticks");
        channel.dispose().await;
        assert!(matches!(
            channel.connect().await,
            Err(TransportError::Disposed(_))
        ));
    }

    #[tokio::test]
    async fn publish_filters_by_topic() {
        let channel = InMemorySubscriberChannel::new("mem://ticks/subscribe");
        let sink = Arc::new(Collect(Mutex::new(Vec::new())));
        channel.connect(sink.clone()).await.unwrap();

        assert!(!channel.publish("AUD/USD.FXCM", vec![1]).await);
        channel.subscribe("AUD/USD.FXCM").await.unwrap();
        assert!(channel.publish("AUD/USD.FXCM", vec![2]).await);
        channel.unsubscribe("AUD/USD.FXCM").await.unwrap();
        assert!(!channel.publish("AUD/USD.FXCM", vec![3]).await);

        assert_eq!(sink.0.lock().len(), 1);
        assert_eq!(channel.control_log().len(), 2);
    }
}
