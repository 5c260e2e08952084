//! Live Client Configuration Settings
//!
//! Configuration types for the live data client, loaded from environment
//! variables and validated before any socket is created.

use std::time::Duration;

use crate::infrastructure::transport::ReconnectConfig;

/// Wire encoding for requests, replies and published items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecKind {
    /// MessagePack via `rmp-serde`.
    #[default]
    MsgPack,
    /// JSON via `serde_json`.
    Json,
}

impl CodecKind {
    /// Parse a codec name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for anything other than `json` or `msgpack`.
    pub fn parse(key: &str, value: &str) -> Result<Self, ConfigError> {
        match value.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "msgpack" | "messagepack" => Ok(Self::MsgPack),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Codec name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MsgPack => "msgpack",
            Self::Json => "json",
        }
    }
}

/// Socket encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encryption {
    /// Plain `ws://` sockets.
    #[default]
    None,
    /// `wss://` sockets over rustls.
    Tls,
}

impl Encryption {
    /// URL scheme for this setting.
    #[must_use]
    pub const fn scheme(&self) -> &'static str {
        match self {
            Self::None => "ws",
            Self::Tls => "wss",
        }
    }
}

/// Ports of the six data service endpoints.
///
/// Held as `i64` until validation so out-of-range values from any source
/// are reported instead of silently wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPorts {
    /// Tick request/reply port.
    pub tick_request: i64,
    /// Tick publish/subscribe port.
    pub tick_subscribe: i64,
    /// Bar request/reply port.
    pub bar_request: i64,
    /// Bar publish/subscribe port.
    pub bar_subscribe: i64,
    /// Instrument request/reply port.
    pub instrument_request: i64,
    /// Instrument publish/subscribe port.
    pub instrument_subscribe: i64,
}

impl Default for ChannelPorts {
    fn default() -> Self {
        Self {
            tick_request: 55501,
            tick_subscribe: 55502,
            bar_request: 55503,
            bar_subscribe: 55504,
            instrument_request: 55505,
            instrument_subscribe: 55506,
        }
    }
}

impl ChannelPorts {
    /// Check every port.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPort` for the first port outside 0–65535.
    pub fn validate(&self) -> Result<ValidatedPorts, ConfigError> {
        Ok(ValidatedPorts {
            tick_request: validate_port("tick_request", self.tick_request)?,
            tick_subscribe: validate_port("tick_subscribe", self.tick_subscribe)?,
            bar_request: validate_port("bar_request", self.bar_request)?,
            bar_subscribe: validate_port("bar_subscribe", self.bar_subscribe)?,
            instrument_request: validate_port("instrument_request", self.instrument_request)?,
            instrument_subscribe: validate_port(
                "instrument_subscribe",
                self.instrument_subscribe,
            )?,
        })
    }
}

/// Ports after range validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedPorts {
    /// Tick request/reply port.
    pub tick_request: u16,
    /// Tick publish/subscribe port.
    pub tick_subscribe: u16,
    /// Bar request/reply port.
    pub bar_request: u16,
    /// Bar publish/subscribe port.
    pub bar_subscribe: u16,
    /// Instrument request/reply port.
    pub instrument_request: u16,
    /// Instrument publish/subscribe port.
    pub instrument_subscribe: u16,
}

/// Check that a port is within 0–65535.
///
/// # Errors
///
/// Returns `InvalidPort` otherwise.
pub fn validate_port(name: &str, port: i64) -> Result<u16, ConfigError> {
    u16::try_from(port).map_err(|_| ConfigError::InvalidPort {
        name: name.to_string(),
        port,
    })
}

/// Complete live client configuration.
#[derive(Debug, Clone)]
pub struct LiveClientConfig {
    /// Service name, used as the first URL path segment.
    pub service_name: String,
    /// Host name or address of the data service.
    pub address: String,
    /// Endpoint ports.
    pub ports: ChannelPorts,
    /// Socket encryption.
    pub encryption: Encryption,
    /// Wire encoding.
    pub codec: CodecKind,
    /// Maximum wait for one request/reply round trip.
    pub request_timeout: Duration,
    /// Capacity of the dispatch queue.
    pub queue_capacity: usize,
    /// Reconnection policy for dropped sockets.
    pub reconnect: ReconnectConfig,
}

impl Default for LiveClientConfig {
    fn default() -> Self {
        Self {
            service_name: "MarketData".to_string(),
            address: "localhost".to_string(),
            ports: ChannelPorts::default(),
            encryption: Encryption::None,
            codec: CodecKind::MsgPack,
            request_timeout: Duration::from_secs(10),
            queue_capacity: 10_000,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl LiveClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but unparsable, or if the
    /// resulting configuration fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let service_name = std::env::var("MARKET_DATA_SERVICE_NAME")
            .unwrap_or_else(|_| defaults.service_name.clone());
        let address =
            std::env::var("MARKET_DATA_ADDRESS").unwrap_or_else(|_| defaults.address.clone());

        let ports = ChannelPorts {
            tick_request: parse_env_i64(
                "MARKET_DATA_TICK_REQUEST_PORT",
                defaults.ports.tick_request,
            )?,
            tick_subscribe: parse_env_i64(
                "MARKET_DATA_TICK_SUBSCRIBE_PORT",
                defaults.ports.tick_subscribe,
            )?,
            bar_request: parse_env_i64("MARKET_DATA_BAR_REQUEST_PORT", defaults.ports.bar_request)?,
            bar_subscribe: parse_env_i64(
                "MARKET_DATA_BAR_SUBSCRIBE_PORT",
                defaults.ports.bar_subscribe,
            )?,
            instrument_request: parse_env_i64(
                "MARKET_DATA_INSTRUMENT_REQUEST_PORT",
                defaults.ports.instrument_request,
            )?,
            instrument_subscribe: parse_env_i64(
                "MARKET_DATA_INSTRUMENT_SUBSCRIBE_PORT",
                defaults.ports.instrument_subscribe,
            )?,
        };

        let encryption = if parse_env_bool("MARKET_DATA_TLS", false)? {
            Encryption::Tls
        } else {
            Encryption::None
        };

        let codec = match std::env::var("MARKET_DATA_CODEC") {
            Ok(value) => CodecKind::parse("MARKET_DATA_CODEC", &value)?,
            Err(_) => defaults.codec,
        };

        let request_timeout = parse_env_duration_millis(
            "MARKET_DATA_REQUEST_TIMEOUT_MS",
            defaults.request_timeout,
        )?;
        let queue_capacity =
            parse_env_usize("MARKET_DATA_QUEUE_CAPACITY", defaults.queue_capacity)?;

        let reconnect = ReconnectConfig {
            initial_delay: parse_env_duration_millis(
                "MARKET_DATA_RECONNECT_DELAY_INITIAL_MS",
                defaults.reconnect.initial_delay,
            )?,
            max_delay: parse_env_duration_millis(
                "MARKET_DATA_RECONNECT_DELAY_MAX_MS",
                defaults.reconnect.max_delay,
            )?,
            max_attempts: parse_env_u32(
                "MARKET_DATA_MAX_RECONNECT_ATTEMPTS",
                defaults.reconnect.max_attempts,
            )?,
            ..defaults.reconnect
        };

        let config = Self {
            service_name,
            address,
            ports,
            encryption,
            codec,
            request_timeout,
            queue_capacity,
            reconnect,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns `EmptyValue` for a blank service name or address,
    /// `InvalidPort` for a port outside 0–65535 and `InvalidValue` for a
    /// zero queue capacity or request timeout.
    pub fn validate(&self) -> Result<ValidatedPorts, ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::EmptyValue("service_name".to_string()));
        }
        if self.address.trim().is_empty() {
            return Err(ConfigError::EmptyValue("address".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "queue_capacity".to_string(),
                value: "0".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout".to_string(),
                value: "0".to_string(),
            });
        }
        self.ports.validate()
    }

    /// URL of one endpoint: `{scheme}://{address}:{port}/{service}/{channel}`.
    #[must_use]
    pub fn endpoint(&self, port: u16, channel: &str) -> String {
        format!(
            "{}://{}:{}/{}/{}",
            self.encryption.scheme(),
            self.address,
            port,
            self.service_name,
            channel
        )
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Value cannot be empty.
    #[error("{0} cannot be empty")]
    EmptyValue(String),
    /// Port outside 0–65535.
    #[error("port {name} = {port} is outside 0-65535")]
    InvalidPort {
        /// Port setting name.
        name: String,
        /// Offending value.
        port: i64,
    },
    /// Value could not be parsed or is out of range.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// Offending value.
        value: String,
    },
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_i64(key: &str, default: i64) -> Result<i64, ConfigError> {
    parse_env(key, default)
}

fn parse_env_u32(key: &str, default: u32) -> Result<u32, ConfigError> {
    parse_env(key, default)
}

fn parse_env_usize(key: &str, default: usize) -> Result<usize, ConfigError> {
    parse_env(key, default)
}

fn parse_env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Ok(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        },
        Err(_) => Ok(default),
    }
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Ok(_) => parse_env::<u64>(key, 0).map(Duration::from_millis),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn defaults_validate() {
        let config = LiveClientConfig::default();
        let ports = config.validate().unwrap();
        assert_eq!(ports.tick_request, 55501);
        assert_eq!(ports.instrument_subscribe, 55506);
    }

    #[test_case(0 ; "lowest")]
    #[test_case(8080 ; "typical")]
    #[test_case(65535 ; "highest")]
    fn ports_in_range(port: i64) {
        assert_eq!(validate_port("p", port).unwrap(), u16::try_from(port).unwrap());
    }

    #[test_case(-1 ; "negative")]
    #[test_case(65536 ; "one past max")]
    #[test_case(i64::MAX ; "huge")]
    fn ports_out_of_range(port: i64) {
        assert_eq!(
            validate_port("p", port),
            Err(ConfigError::InvalidPort {
                name: "p".to_string(),
                port
            })
        );
    }

    #[test]
    fn invalid_port_names_the_setting() {
        let config = LiveClientConfig {
            ports: ChannelPorts {
                bar_subscribe: 70000,
                ..ChannelPorts::default()
            },
            ..LiveClientConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidPort {
                name: "bar_subscribe".to_string(),
                port: 70000
            }
        );
    }

    #[test]
    fn blank_address_rejected() {
        let config = LiveClientConfig {
            address: "  ".to_string(),
            ..LiveClientConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyValue("address".to_string()))
        );
    }

    #[test]
    fn zero_queue_capacity_rejected() {
        let config = LiveClientConfig {
            queue_capacity: 0,
            ..LiveClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn endpoint_follows_encryption() {
        let plain = LiveClientConfig::default();
        assert_eq!(
            plain.endpoint(55501, "ticks"),
            "ws://localhost:55501/MarketData/ticks"
        );

        let tls = LiveClientConfig {
            encryption: Encryption::Tls,
            address: "data.example.com".to_string(),
            ..LiveClientConfig::default()
        };
        assert_eq!(
            tls.endpoint(443, "bars/subscribe"),
            "wss://data.example.com:443/MarketData/bars/subscribe"
        );
    }

    #[test_case("json", CodecKind::Json)]
    #[test_case("JSON", CodecKind::Json)]
    #[test_case("msgpack", CodecKind::MsgPack)]
    fn codec_names(value: &str, expected: CodecKind) {
        assert_eq!(CodecKind::parse("MARKET_DATA_CODEC", value).unwrap(), expected);
    }

    #[test]
    fn unknown_codec_rejected() {
        assert!(CodecKind::parse("MARKET_DATA_CODEC", "protobuf").is_err());
    }
}
