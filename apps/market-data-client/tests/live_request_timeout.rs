//! Live Request Timeout Tests
//!
//! Runs the live client's tick request channel against a local WebSocket
//! data service whose first reply arrives after the client gave up on it.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

use market_data_client::application::ports::{RequestChannel, RequestOutcome, TransportError};
use market_data_client::application::protocol::{DataRequest, DataResponse, ResponseMetadata};
use market_data_client::infrastructure::transport::{
    InMemoryRequestChannel, InMemorySubscriberChannel, ReconnectConfig, WsRequestChannel,
};
use market_data_client::{
    Codecs, DataClient, DataClientError, LiveChannels, LiveClientConfig, LiveClock,
    LiveDataClient, Symbol,
};

const LATE_REPLY: Duration = Duration::from_millis(300);
const REQUEST_TIMEOUT: Duration = Duration::from_millis(100);

/// Data service answering every request with an empty tick reply. Only the
/// very first reply is held back by [`LATE_REPLY`].
struct SlowFirstReplyService {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    handle: tokio::task::JoinHandle<()>,
}

impl SlowFirstReplyService {
    async fn spawn() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let first_pending = Arc::new(AtomicBool::new(true));

        let accepted = Arc::clone(&connections);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _peer)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, Arc::clone(&first_pending)));
            }
        });

        Self {
            addr,
            connections,
            handle,
        }
    }

    fn endpoint(&self) -> String {
        format!("ws://{}/MarketData/tick-requests", self.addr)
    }

    fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for SlowFirstReplyService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(stream: TcpStream, first_pending: Arc<AtomicBool>) {
    let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };

    while let Some(Ok(message)) = socket.next().await {
        let Message::Binary(bytes) = message else {
            continue;
        };
        let request: DataRequest = serde_json::from_slice(&bytes).unwrap();
        let reply = DataResponse::Data {
            correlation_id: request.id,
            metadata: ResponseMetadata {
                symbol: request.query.symbol.clone(),
                ..ResponseMetadata::default()
            },
            data: Vec::new(),
        };

        if first_pending.swap(false, Ordering::SeqCst) {
            tokio::time::sleep(LATE_REPLY).await;
        }
        let payload = serde_json::to_vec(&reply).unwrap();
        if socket.send(Message::Binary(payload.into())).await.is_err() {
            break;
        }
    }
}

fn no_retry() -> ReconnectConfig {
    ReconnectConfig {
        max_attempts: 1,
        ..ReconnectConfig::default()
    }
}

async fn client_against(
    service: &SlowFirstReplyService,
) -> (LiveDataClient, Arc<WsRequestChannel>) {
    let tick_requests = Arc::new(WsRequestChannel::new(service.endpoint(), no_retry()));
    let channels = LiveChannels {
        tick_requests: tick_requests.clone(),
        tick_subscriber: Arc::new(InMemorySubscriberChannel::new("mem://ticks")),
        bar_requests: Arc::new(InMemoryRequestChannel::unanswered("mem://bar-requests")),
        bar_subscriber: Arc::new(InMemorySubscriberChannel::new("mem://bars")),
        instrument_requests: Arc::new(InMemoryRequestChannel::unanswered(
            "mem://instrument-requests",
        )),
        instrument_subscriber: Arc::new(InMemorySubscriberChannel::new("mem://instruments")),
    };
    let config = LiveClientConfig {
        request_timeout: REQUEST_TIMEOUT,
        ..LiveClientConfig::default()
    };
    let client =
        LiveDataClient::new(config, channels, Codecs::json(), Arc::new(LiveClock)).unwrap();
    client.connect().await.unwrap();
    (client, tick_requests)
}

fn eurusd() -> Symbol {
    "EUR/USD.FXCM".parse().unwrap()
}

#[tokio::test]
async fn late_reply_does_not_answer_the_next_request() {
    let service = SlowFirstReplyService::spawn().await;
    let (client, _) = client_against(&service).await;

    let first = client
        .request_ticks(&eurusd(), None, None, 0, Box::new(|_| {}))
        .await;
    assert!(matches!(first, Err(DataClientError::Timeout { channel: "tick", .. })));

    // Outlive the late reply so it would be sitting on the old socket.
    tokio::time::sleep(LATE_REPLY).await;

    for _ in 0..3 {
        let outcome = client
            .request_ticks(&eurusd(), None, None, 0, Box::new(|_| {}))
            .await
            .unwrap();
        assert_eq!(outcome, RequestOutcome::Delivered { count: 0 });
    }
    assert_eq!(service.connections(), 2);
}

#[tokio::test]
async fn abandoned_exchange_discards_the_socket() {
    let service = SlowFirstReplyService::spawn().await;
    let (client, tick_requests) = client_against(&service).await;

    let timed_out = client
        .request_ticks(&eurusd(), None, None, 0, Box::new(|_| {}))
        .await;
    assert!(timed_out.is_err());
    assert!(!tick_requests.is_connected());

    client
        .request_ticks(&eurusd(), None, None, 0, Box::new(|_| {}))
        .await
        .unwrap();
    assert!(tick_requests.is_connected());
}

#[tokio::test]
async fn disconnected_channel_is_not_reopened_by_a_request() {
    let service = SlowFirstReplyService::spawn().await;
    let channel = WsRequestChannel::new(service.endpoint(), no_retry());
    channel.connect().await.unwrap();
    channel.disconnect().await.unwrap();

    let result = channel.request(b"{}".to_vec()).await;

    assert!(matches!(
        result,
        Err(TransportError::NotConnected(_))
    ));
    assert_eq!(service.connections(), 1);
}
