//! Codec Ports (Driven Ports)
//!
//! Serializers for the request/response envelopes and for the individual
//! data items carried inside them and on the publish/subscribe channels.

use crate::application::protocol::{DataRequest, DataResponse};
use crate::domain::market::{Bar, BarType, Instrument, Symbol, Tick};

/// Encoding or decoding failure.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON failure.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// MessagePack encode failure.
    #[error("MessagePack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MessagePack decode failure.
    #[error("MessagePack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Bytes decoded but do not describe a valid value.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Encodes outbound requests.
pub trait RequestSerializer: Send + Sync {
    /// Encode a request envelope.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the request cannot be encoded.
    fn serialize_request(&self, request: &DataRequest) -> Result<Vec<u8>, CodecError>;
}

/// Decodes inbound replies.
pub trait ResponseSerializer: Send + Sync {
    /// Decode a reply envelope.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the bytes are not a valid reply.
    fn deserialize_response(&self, bytes: &[u8]) -> Result<DataResponse, CodecError>;
}

/// Encodes and decodes ticks and bars.
///
/// The subject (symbol or bar type) is not carried in the item encoding; it
/// comes from the topic or the reply metadata.
pub trait DataSerializer: Send + Sync {
    /// Encode a tick.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] on encoding failure.
    fn serialize_tick(&self, tick: &Tick) -> Result<Vec<u8>, CodecError>;

    /// Decode a tick for `symbol`.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the bytes are not a valid tick.
    fn deserialize_tick(&self, symbol: &Symbol, bytes: &[u8]) -> Result<Tick, CodecError>;

    /// Encode a bar.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] on encoding failure.
    fn serialize_bar(&self, bar: &Bar) -> Result<Vec<u8>, CodecError>;

    /// Decode a bar of `bar_type`.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the bytes are not a valid bar.
    fn deserialize_bar(&self, bar_type: &BarType, bytes: &[u8]) -> Result<Bar, CodecError>;
}

/// Encodes and decodes instrument definitions.
pub trait InstrumentSerializer: Send + Sync {
    /// Encode an instrument.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] on encoding failure.
    fn serialize_instrument(&self, instrument: &Instrument) -> Result<Vec<u8>, CodecError>;

    /// Decode an instrument.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the bytes are not a valid instrument.
    fn deserialize_instrument(&self, bytes: &[u8]) -> Result<Instrument, CodecError>;
}
