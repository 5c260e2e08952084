//! Application Services
//!
//! Logic shared by the live and backtest data clients.

mod dispatcher;
mod requests;

pub use dispatcher::{BarSource, DataDispatcher, Registration, TickFanout};
pub use requests::{check_range, query_limit};
