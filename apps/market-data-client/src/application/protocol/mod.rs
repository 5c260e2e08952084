//! Data Service Protocol
//!
//! Codec-agnostic request and response envelopes exchanged with the remote
//! data service over the request/reply channels.
//!
//! # Request
//!
//! ```json
//! {"id":"…","timestamp":"…","query":{"data_type":"TICK","symbol":"EUR/USD.FXCM","limit":0}}
//! ```
//!
//! # Response
//!
//! One of `Data`, `Rejected` or `QueryFailed`, each echoing the request id
//! as `correlation_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::market::{BarType, Symbol, Venue};

/// Kind of data a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    /// Quote ticks for one symbol.
    Tick,
    /// Bars for one bar type.
    Bar,
    /// One instrument definition.
    Instrument,
    /// Every instrument of a venue.
    Instruments,
}

impl DataType {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::Bar => "bar",
            Self::Instrument => "instrument",
            Self::Instruments => "instruments",
        }
    }
}

/// Flat query field set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQuery {
    /// What is being queried.
    pub data_type: DataType,
    /// Canonical symbol, for tick, bar and instrument queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Venue, for instruments queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    /// Canonical bar specification, for bar queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specification: Option<String>,
    /// Inclusive range start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    /// Inclusive range end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of items; absent means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl DataQuery {
    const fn empty(data_type: DataType) -> Self {
        Self {
            data_type,
            symbol: None,
            venue: None,
            specification: None,
            from: None,
            to: None,
            limit: None,
        }
    }

    /// Query ticks for a symbol.
    #[must_use]
    pub fn ticks(
        symbol: &Symbol,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: Option<u64>,
    ) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            from,
            to,
            limit,
            ..Self::empty(DataType::Tick)
        }
    }

    /// Query bars for a bar type.
    #[must_use]
    pub fn bars(
        bar_type: &BarType,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: Option<u64>,
    ) -> Self {
        Self {
            symbol: Some(bar_type.symbol().to_string()),
            specification: Some(bar_type.specification().to_string()),
            from,
            to,
            limit,
            ..Self::empty(DataType::Bar)
        }
    }

    /// Query one instrument definition.
    #[must_use]
    pub fn instrument(symbol: &Symbol) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            ..Self::empty(DataType::Instrument)
        }
    }

    /// Query every instrument of a venue.
    #[must_use]
    pub fn instruments(venue: &Venue) -> Self {
        Self {
            venue: Some(venue.to_string()),
            ..Self::empty(DataType::Instruments)
        }
    }
}

/// Request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequest {
    /// Fresh correlation identifier.
    pub id: Uuid,
    /// Client time at issue.
    pub timestamp: DateTime<Utc>,
    /// The query.
    pub query: DataQuery,
}

impl DataRequest {
    /// Wrap a query with a fresh correlation id.
    #[must_use]
    pub fn new(query: DataQuery, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            query,
        }
    }
}

/// Subject fields echoed back with a data response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Canonical symbol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Venue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    /// Canonical bar specification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specification: Option<String>,
}

/// Reply envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataResponse {
    /// Query succeeded.
    Data {
        /// Id of the request being answered.
        correlation_id: Uuid,
        /// Subject of the returned items.
        metadata: ResponseMetadata,
        /// Items, each encoded with the data or instrument codec.
        data: Vec<Vec<u8>>,
    },
    /// Service refused the request.
    Rejected {
        /// Id of the request being answered.
        correlation_id: Uuid,
        /// Human-readable reason.
        reason: String,
    },
    /// Service accepted the request but the query failed.
    QueryFailed {
        /// Id of the request being answered.
        correlation_id: Uuid,
        /// Human-readable reason.
        reason: String,
    },
}

impl DataResponse {
    /// The request id this response answers.
    #[must_use]
    pub const fn correlation_id(&self) -> Uuid {
        match self {
            Self::Data { correlation_id, .. }
            | Self::Rejected { correlation_id, .. }
            | Self::QueryFailed { correlation_id, .. } => *correlation_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_query_carries_subject_and_range() {
        let symbol: Symbol = "EUR/USD.FXCM".parse().unwrap();
        let query = DataQuery::ticks(&symbol, None, None, Some(10));

        assert_eq!(query.data_type, DataType::Tick);
        assert_eq!(query.symbol.as_deref(), Some("EUR/USD.FXCM"));
        assert_eq!(query.limit, Some(10));
        assert!(query.specification.is_none());
    }

    #[test]
    fn bar_query_splits_bar_type() {
        let bar_type: BarType = "EUR/USD.FXCM-1-MINUTE-BID".parse().unwrap();
        let query = DataQuery::bars(&bar_type, None, None, None);

        assert_eq!(query.symbol.as_deref(), Some("EUR/USD.FXCM"));
        assert_eq!(query.specification.as_deref(), Some("1-MINUTE-BID"));
    }

    #[test]
    fn query_omits_absent_fields() {
        let venue = Venue::new("FXCM").unwrap();
        let json = serde_json::to_string(&DataQuery::instruments(&venue)).unwrap();
        assert_eq!(json, r#"{"data_type":"INSTRUMENTS","venue":"FXCM"}"#);
    }

    #[test]
    fn requests_get_unique_ids() {
        let venue = Venue::new("FXCM").unwrap();
        let first = DataRequest::new(DataQuery::instruments(&venue), Utc::now());
        let second = DataRequest::new(DataQuery::instruments(&venue), Utc::now());
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn correlation_id_for_every_variant() {
        let id = Uuid::new_v4();
        let rejected = DataResponse::Rejected {
            correlation_id: id,
            reason: "no".to_string(),
        };
        let failed = DataResponse::QueryFailed {
            correlation_id: id,
            reason: "no".to_string(),
        };
        assert_eq!(rejected.correlation_id(), id);
        assert_eq!(failed.correlation_id(), id);
    }
}
