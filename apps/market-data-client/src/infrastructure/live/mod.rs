//! Live Data Client
//!
//! [`LiveDataClient`] and the dispatch task that feeds its handlers.

mod client;
mod clock;
mod dispatch_loop;

pub use client::{Codecs, LiveChannels, LiveDataClient};
pub use clock::LiveClock;
pub use dispatch_loop::{DispatchMessage, QueueSink, SubscriptionSnapshot};
