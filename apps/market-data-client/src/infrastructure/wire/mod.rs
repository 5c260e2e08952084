//! Wire Format
//!
//! Codecs and frame types for talking to the data service.

pub mod codec;
pub mod messages;

pub use codec::{JsonCodec, MsgPackCodec, WireFormat};
pub use messages::{BarRecord, ControlAction, ControlFrame, PublishedFrame, TickRecord};
