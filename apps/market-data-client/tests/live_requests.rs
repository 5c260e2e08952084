//! Live Request/Reply Integration Tests
//!
//! Drives the live client against in-memory request channels answered by a
//! scripted data service.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rust_decimal_macros::dec;

use market_data_client::application::ports::{
    DataSerializer, InstrumentSerializer, RequestOutcome, TransportError,
};
use market_data_client::application::protocol::{
    DataRequest, DataResponse, DataType, ResponseMetadata,
};
use market_data_client::infrastructure::transport::{
    InMemoryRequestChannel, InMemorySubscriberChannel,
};
use market_data_client::infrastructure::wire::JsonCodec;
use market_data_client::{
    BarType, Codecs, DataClient, DataClientError, HandlerRef, Instrument, LiveChannels,
    LiveClientConfig, LiveClock, LiveDataClient, Symbol, Tick, Venue,
};

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, d, 0, 0, 0).unwrap()
}

fn eurusd() -> Symbol {
    "EUR/USD.FXCM".parse().unwrap()
}

fn recorded_ticks() -> Vec<Tick> {
    (0..3)
        .map(|i| Tick {
            symbol: eurusd(),
            bid: dec!(1.1000) + rust_decimal::Decimal::new(i, 4),
            ask: dec!(1.1002) + rust_decimal::Decimal::new(i, 4),
            bid_size: dec!(1000000),
            ask_size: dec!(1000000),
            timestamp: day(1) + chrono::Duration::minutes(i),
        })
        .collect()
}

fn eurusd_instrument() -> Instrument {
    Instrument {
        symbol: eurusd(),
        quote_currency: "USD".to_string(),
        price_precision: 5,
        size_precision: 0,
        tick_size: dec!(0.00001),
        lot_size: dec!(1000),
    }
}

/// Scripted data service speaking JSON.
fn data_service(request: &[u8]) -> DataResponse {
    let codec = JsonCodec::new();
    let request: DataRequest = serde_json::from_slice(request).unwrap();
    let correlation_id = request.id;
    let query = request.query;

    match (query.data_type, query.symbol.as_deref()) {
        (DataType::Tick, Some("EUR/USD.FXCM")) => DataResponse::Data {
            correlation_id,
            metadata: ResponseMetadata {
                symbol: query.symbol.clone(),
                ..ResponseMetadata::default()
            },
            data: recorded_ticks()
                .iter()
                .map(|tick| codec.serialize_tick(tick).unwrap())
                .collect(),
        },
        (DataType::Tick, Some("GBP/USD.FXCM")) => DataResponse::Data {
            correlation_id,
            metadata: ResponseMetadata {
                symbol: Some("EUR/USD.FXCM".to_string()),
                ..ResponseMetadata::default()
            },
            data: Vec::new(),
        },
        (DataType::Instruments, _) => DataResponse::Data {
            correlation_id,
            metadata: ResponseMetadata {
                venue: query.venue.clone(),
                ..ResponseMetadata::default()
            },
            data: vec![codec.serialize_instrument(&eurusd_instrument()).unwrap()],
        },
        (_, symbol) => DataResponse::Rejected {
            correlation_id,
            reason: format!("unknown symbol {symbol:?}"),
        },
    }
}

struct Harness {
    client: LiveDataClient,
    tick_requests: Arc<InMemoryRequestChannel>,
    instrument_subscriber: Arc<InMemorySubscriberChannel>,
}

fn harness_with(
    responder: impl Fn(&[u8]) -> DataResponse + Clone + Send + Sync + 'static,
) -> Harness {
    let answer = move |bytes: &[u8]| -> Result<Vec<u8>, TransportError> {
        Ok(serde_json::to_vec(&responder(bytes)).unwrap())
    };
    let tick_requests = Arc::new(InMemoryRequestChannel::new(
        "mem://tick-requests",
        answer.clone(),
    ));
    let instrument_subscriber = Arc::new(InMemorySubscriberChannel::new("mem://instruments"));

    let channels = LiveChannels {
        tick_requests: tick_requests.clone(),
        tick_subscriber: Arc::new(InMemorySubscriberChannel::new("mem://ticks")),
        bar_requests: Arc::new(InMemoryRequestChannel::new("mem://bar-requests", answer.clone())),
        bar_subscriber: Arc::new(InMemorySubscriberChannel::new("mem://bars")),
        instrument_requests: Arc::new(InMemoryRequestChannel::new(
            "mem://instrument-requests",
            answer,
        )),
        instrument_subscriber: instrument_subscriber.clone(),
    };
    let client = LiveDataClient::new(
        LiveClientConfig::default(),
        channels,
        Codecs::json(),
        Arc::new(LiveClock),
    )
    .unwrap();

    Harness {
        client,
        tick_requests,
        instrument_subscriber,
    }
}

async fn connected() -> Harness {
    let harness = harness_with(data_service);
    harness.client.connect().await.unwrap();
    harness
}

#[tokio::test]
async fn tick_request_round_trip_preserves_service_order() {
    let harness = connected().await;
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);

    let outcome = harness
        .client
        .request_ticks(
            &eurusd(),
            Some(day(1)),
            Some(day(2)),
            0,
            Box::new(move |ticks| sink.lock().extend(ticks)),
        )
        .await
        .unwrap();

    assert_eq!(outcome, RequestOutcome::Delivered { count: 3 });
    assert_eq!(*received.lock(), recorded_ticks());

    let sent: DataRequest = serde_json::from_slice(&harness.tick_requests.requests()[0]).unwrap();
    assert_eq!(sent.query.symbol.as_deref(), Some("EUR/USD.FXCM"));
    assert_eq!(sent.query.from, Some(day(1)));
    assert_eq!(sent.query.to, Some(day(2)));
    assert_eq!(sent.query.limit, None);
}

#[tokio::test]
async fn rejection_skips_callback_and_reports_outcome() {
    let harness = connected().await;
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let unknown: Symbol = "XAU/USD.FXCM".parse().unwrap();

    let outcome = harness
        .client
        .request_ticks(&unknown, None, None, 0, Box::new(move |_| *counter.lock() += 1))
        .await
        .unwrap();

    assert!(matches!(outcome, RequestOutcome::Rejected { .. }));
    assert_eq!(*calls.lock(), 0);
}

#[tokio::test]
async fn rejected_instrument_request_is_not_an_error() {
    let harness = connected().await;
    let unknown: Symbol = "XAU/USD.FXCM".parse().unwrap();

    let outcome = harness
        .client
        .request_instrument(&unknown, Box::new(|_| panic!("callback must not run")))
        .await
        .unwrap();

    assert!(matches!(outcome, RequestOutcome::Rejected { ref reason } if reason.contains("XAU")));
}

#[tokio::test]
async fn negative_limit_sends_nothing() {
    let harness = connected().await;

    let result = harness
        .client
        .request_ticks(&eurusd(), None, None, -5, Box::new(|_| {}))
        .await;

    assert!(matches!(result, Err(DataClientError::InvalidArgument(_))));
    assert_eq!(harness.tick_requests.bytes_sent(), 0);
}

#[tokio::test]
async fn inverted_range_sends_nothing() {
    let harness = connected().await;

    let result = harness
        .client
        .request_ticks(&eurusd(), Some(day(2)), Some(day(1)), 0, Box::new(|_| {}))
        .await;

    assert!(matches!(result, Err(DataClientError::InvalidArgument(_))));
    assert!(harness.tick_requests.requests().is_empty());
}

#[tokio::test]
async fn reply_for_another_subject_is_an_error() {
    let harness = connected().await;
    let gbpusd: Symbol = "GBP/USD.FXCM".parse().unwrap();

    let result = harness
        .client
        .request_ticks(&gbpusd, None, None, 0, Box::new(|_| panic!("callback must not run")))
        .await;

    assert!(matches!(result, Err(DataClientError::SubjectMismatch { .. })));
}

/// Answers every request with an empty data reply carrying `metadata`.
fn empty_data_with(
    metadata: ResponseMetadata,
) -> impl Fn(&[u8]) -> DataResponse + Clone + Send + Sync + 'static {
    move |bytes: &[u8]| {
        let request: DataRequest = serde_json::from_slice(bytes).unwrap();
        DataResponse::Data {
            correlation_id: request.id,
            metadata: metadata.clone(),
            data: Vec::new(),
        }
    }
}

#[tokio::test]
async fn tick_reply_without_symbol_is_an_error() {
    let harness = harness_with(empty_data_with(ResponseMetadata::default()));
    harness.client.connect().await.unwrap();

    let result = harness
        .client
        .request_ticks(&eurusd(), None, None, 0, Box::new(|_| panic!("callback must not run")))
        .await;

    assert!(matches!(
        result,
        Err(DataClientError::MissingSubject { ref expected, field: "symbol" })
            if expected == "EUR/USD.FXCM"
    ));
}

#[tokio::test]
async fn bar_reply_without_specification_is_an_error() {
    let harness = harness_with(empty_data_with(ResponseMetadata {
        symbol: Some("EUR/USD.FXCM".to_string()),
        ..ResponseMetadata::default()
    }));
    harness.client.connect().await.unwrap();
    let bar_type: BarType = "EUR/USD.FXCM-1-MINUTE-BID".parse().unwrap();

    let result = harness
        .client
        .request_bars(&bar_type, None, None, 0, Box::new(|_, _| panic!("callback must not run")))
        .await;

    assert!(matches!(
        result,
        Err(DataClientError::MissingSubject { field: "specification", .. })
    ));
}

#[tokio::test]
async fn reply_for_another_request_is_an_error() {
    let harness = harness_with(|bytes| {
        let _: DataRequest = serde_json::from_slice(bytes).unwrap();
        DataResponse::Rejected {
            correlation_id: uuid::Uuid::nil(),
            reason: "stale".to_string(),
        }
    });
    harness.client.connect().await.unwrap();

    let result = harness
        .client
        .request_ticks(&eurusd(), None, None, 0, Box::new(|_| {}))
        .await;

    assert!(matches!(result, Err(DataClientError::CorrelationMismatch { .. })));
}

#[tokio::test]
async fn requests_before_connect_fail() {
    let harness = harness_with(data_service);

    let result = harness
        .client
        .request_ticks(&eurusd(), None, None, 0, Box::new(|_| {}))
        .await;

    assert!(matches!(result, Err(DataClientError::Transport(_))));
}

#[tokio::test]
async fn update_instruments_reaches_subscribed_handlers() {
    let harness = connected().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    harness
        .client
        .subscribe_instrument(
            &eurusd(),
            HandlerRef::new(move |instrument: &Instrument| sink.lock().push(instrument.clone())),
        )
        .await
        .unwrap();
    assert_eq!(
        harness.instrument_subscriber.subscribed_topics(),
        vec!["EUR/USD.FXCM".to_string()]
    );

    let outcome = harness
        .client
        .update_instruments(&Venue::new("FXCM").unwrap())
        .await
        .unwrap();
    // Queue barrier: snapshot is answered after the instrument commands.
    harness.client.subscribed_instruments().await.unwrap();

    assert_eq!(outcome, RequestOutcome::Delivered { count: 1 });
    assert_eq!(*seen.lock(), vec![eurusd_instrument()]);
}
