//! Configuration Module
//!
//! Configuration loading and validation for the live data client.

mod settings;

pub use settings::{
    ChannelPorts, CodecKind, ConfigError, Encryption, LiveClientConfig, ValidatedPorts,
    validate_port,
};
