//! Application Ports (Driver and Driven)
//!
//! Ports define the seams between the data clients and the outside world.
//! - **Driver Port**: [`DataClient`], how strategies use a data client
//! - **Driven Ports**: codecs, transport channels and clocks the clients use

mod clock_port;
mod codec_port;
mod data_client_port;
mod transport_port;

pub use clock_port::{Clock, FiredTimer, TimeEvent, VirtualClock};
pub use codec_port::{
    CodecError, DataSerializer, InstrumentSerializer, RequestSerializer, ResponseSerializer,
};
pub use data_client_port::{
    BarsCallback, DataClient, InstrumentCallback, InstrumentsCallback, RequestOutcome,
    TicksCallback,
};
pub use transport_port::{
    DeliverySink, InboundMessage, RequestChannel, SubscriberChannel, TransportError,
};

#[cfg(test)]
pub use transport_port::MockRequestChannel;
