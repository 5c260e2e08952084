//! Transport Ports (Driven Ports)
//!
//! The live client talks to the data service over three request/reply
//! channels and three publish/subscribe channels. Each channel is a single
//! socket; adapters decide the framing.

use std::sync::Arc;

use async_trait::async_trait;

/// Transport failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Could not establish the connection.
    #[error("Connection to {endpoint} failed: {message}")]
    ConnectionFailed {
        /// Target endpoint.
        endpoint: String,
        /// Error details.
        message: String,
    },

    /// Operation needs a connected channel.
    #[error("Channel {0} is not connected")]
    NotConnected(String),

    /// Peer closed the connection.
    #[error("Channel {0} closed by peer")]
    ConnectionClosed(String),

    /// Write failed.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Read failed.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Channel was disposed.
    #[error("Channel {0} has been disposed")]
    Disposed(String),
}

/// One message received on a publish/subscribe channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// Encoded item.
    pub payload: Vec<u8>,
}

/// Destination for messages read by a subscriber channel.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Hand over one message. Returns `false` once the sink is closed, after
    /// which the channel stops reading.
    async fn deliver(&self, message: InboundMessage) -> bool;
}

/// Strictly half-duplex request/reply socket.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestChannel: Send + Sync {
    /// Endpoint URL, for logs.
    fn endpoint(&self) -> String;

    /// Whether the socket is connected.
    fn is_connected(&self) -> bool;

    /// Connect the socket.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Send one request and wait for its reply.
    async fn request(&self, payload: Vec<u8>) -> Result<Vec<u8>, TransportError>;

    /// Close the socket. Reconnecting afterwards is allowed.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Release the socket for good.
    async fn dispose(&self);
}

/// Topic-filtered publish/subscribe socket.
#[async_trait]
pub trait SubscriberChannel: Send + Sync {
    /// Endpoint URL, for logs.
    fn endpoint(&self) -> String;

    /// Whether the socket is connected.
    fn is_connected(&self) -> bool;

    /// Connect the socket and start forwarding published messages to `sink`.
    async fn connect(&self, sink: Arc<dyn DeliverySink>) -> Result<(), TransportError>;

    /// Start receiving a topic.
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Stop receiving a topic.
    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Close the socket and stop forwarding.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Release the socket for good.
    async fn dispose(&self);
}
