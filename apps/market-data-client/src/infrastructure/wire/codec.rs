//! Wire Codecs
//!
//! JSON and `MessagePack` implementations of the codec ports.
//!
//! `MessagePack` output uses named fields (map format) so that enum
//! envelopes and optional fields decode unambiguously.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::messages::{BarRecord, TickRecord};
use crate::application::ports::{
    CodecError, DataSerializer, InstrumentSerializer, RequestSerializer, ResponseSerializer,
};
use crate::application::protocol::{DataRequest, DataResponse};
use crate::domain::market::{Bar, BarType, Instrument, Symbol, Tick};

/// A self-describing serde format.
pub trait WireFormat: Send + Sync {
    /// Encode a value.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] on encoding failure.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode a value.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the bytes do not decode into `T`.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl WireFormat for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// `MessagePack` codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Create a new `MessagePack` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl WireFormat for MsgPackCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

impl<F: WireFormat> RequestSerializer for F {
    fn serialize_request(&self, request: &DataRequest) -> Result<Vec<u8>, CodecError> {
        self.encode(request)
    }
}

impl<F: WireFormat> ResponseSerializer for F {
    fn deserialize_response(&self, bytes: &[u8]) -> Result<DataResponse, CodecError> {
        self.decode(bytes)
    }
}

impl<F: WireFormat> DataSerializer for F {
    fn serialize_tick(&self, tick: &Tick) -> Result<Vec<u8>, CodecError> {
        self.encode(&TickRecord::from(tick))
    }

    fn deserialize_tick(&self, symbol: &Symbol, bytes: &[u8]) -> Result<Tick, CodecError> {
        let record: TickRecord = self.decode(bytes)?;
        Ok(record.into_tick(symbol.clone()))
    }

    fn serialize_bar(&self, bar: &Bar) -> Result<Vec<u8>, CodecError> {
        self.encode(&BarRecord::from(bar))
    }

    fn deserialize_bar(&self, bar_type: &BarType, bytes: &[u8]) -> Result<Bar, CodecError> {
        let record: BarRecord = self.decode(bytes)?;
        if record.low > record.high {
            return Err(CodecError::InvalidFormat(format!(
                "bar low {} above high {}",
                record.low, record.high
            )));
        }
        Ok(record.into_bar(bar_type.clone()))
    }
}

impl<F: WireFormat> InstrumentSerializer for F {
    fn serialize_instrument(&self, instrument: &Instrument) -> Result<Vec<u8>, CodecError> {
        self.encode(instrument)
    }

    fn deserialize_instrument(&self, bytes: &[u8]) -> Result<Instrument, CodecError> {
        self.decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;
    use crate::application::protocol::{DataQuery, ResponseMetadata};

    fn tick() -> Tick {
        Tick {
            symbol: "EUR/USD.FXCM".parse().unwrap(),
            bid: dec!(1.10000),
            ask: dec!(1.10010),
            bid_size: dec!(1000000),
            ask_size: dec!(2000000),
            timestamp: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 1).unwrap(),
        }
    }

    #[test]
    fn json_tick_omits_symbol() {
        let bytes = JsonCodec::new().serialize_tick(&tick()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("EUR/USD"));
        assert!(text.contains("\"bid\":\"1.10000\""));
    }

    #[test]
    fn msgpack_tick_round_trip() {
        let codec = MsgPackCodec::new();
        let original = tick();
        let bytes = codec.serialize_tick(&original).unwrap();
        let decoded = codec.deserialize_tick(&original.symbol, &bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn msgpack_response_envelope() {
        let codec = MsgPackCodec::new();
        let response = DataResponse::Data {
            correlation_id: Uuid::new_v4(),
            metadata: ResponseMetadata {
                symbol: Some("EUR/USD.FXCM".to_string()),
                ..ResponseMetadata::default()
            },
            data: vec![codec.serialize_tick(&tick()).unwrap()],
        };

        let bytes = codec.encode(&response).unwrap();
        assert_eq!(codec.deserialize_response(&bytes).unwrap(), response);
    }

    #[test]
    fn json_request_envelope() {
        let symbol: Symbol = "EUR/USD.FXCM".parse().unwrap();
        let request = DataRequest::new(DataQuery::ticks(&symbol, None, None, None), Utc::now());
        let bytes = JsonCodec::new().serialize_request(&request).unwrap();
        let decoded: DataRequest = JsonCodec::new().decode(&bytes).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn inverted_bar_rejected() {
        let codec = JsonCodec::new();
        let bytes = br#"{"open":"1.1","high":"1.0","low":"1.2","close":"1.1","volume":"10","timestamp":"2020-01-01T00:01:00Z"}"#;
        let bar_type: BarType = "EUR/USD.FXCM-1-MINUTE-BID".parse().unwrap();
        assert!(matches!(
            codec.deserialize_bar(&bar_type, bytes),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(JsonCodec::new().deserialize_response(b"not json").is_err());
        assert!(MsgPackCodec::new().deserialize_instrument(&[0xc1]).is_err());
    }
}
