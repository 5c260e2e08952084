//! Configuration Validation Tests
//!
//! Port ranges and endpoint construction for the live client configuration.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use proptest::prelude::*;
use test_case::test_case;

use market_data_client::infrastructure::config::{
    ChannelPorts, ConfigError, Encryption, LiveClientConfig, validate_port,
};
use market_data_client::{Codecs, LiveChannels, LiveClock, LiveDataClient};

proptest! {
    #[test]
    fn ports_in_range_are_accepted(port in 0i64..=65_535) {
        prop_assert_eq!(i64::from(validate_port("tick_request", port).unwrap()), port);
    }

    #[test]
    fn ports_out_of_range_are_rejected(
        port in prop_oneof![i64::MIN..0i64, 65_536i64..i64::MAX]
    ) {
        let is_invalid_port = matches!(
            validate_port("tick_request", port),
            Err(ConfigError::InvalidPort { port: p, .. }) if p == port
        );
        prop_assert!(is_invalid_port);
    }
}

#[test_case(Encryption::None, "ws://localhost:55502/MarketData/ticks" ; "plain")]
#[test_case(Encryption::Tls, "wss://localhost:55502/MarketData/ticks" ; "tls")]
fn endpoint_follows_encryption(encryption: Encryption, expected: &str) {
    let config = LiveClientConfig {
        encryption,
        ..LiveClientConfig::default()
    };

    assert_eq!(config.endpoint(55502, "ticks"), expected);
}

#[test]
fn the_first_bad_port_is_named() {
    let config = LiveClientConfig {
        ports: ChannelPorts {
            bar_subscribe: 70_000,
            instrument_request: -1,
            ..ChannelPorts::default()
        },
        ..LiveClientConfig::default()
    };

    assert_eq!(
        config.validate(),
        Err(ConfigError::InvalidPort {
            name: "bar_subscribe".to_string(),
            port: 70_000,
        })
    );
}

#[tokio::test]
async fn client_construction_fails_before_any_connection() {
    let config = LiveClientConfig {
        ports: ChannelPorts {
            tick_request: 65_536,
            ..ChannelPorts::default()
        },
        ..LiveClientConfig::default()
    };

    let defaults = LiveClientConfig::default();
    let channels = LiveChannels::websocket(&defaults, &defaults.validate().unwrap());
    let result = LiveDataClient::new(config, channels, Codecs::msgpack(), Arc::new(LiveClock));

    assert!(matches!(result, Err(ConfigError::InvalidPort { .. })));
}
