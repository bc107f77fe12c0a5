//! Market data clients.
//!
//! Two independent upstreams feed the market endpoints: Yahoo Finance
//! for index/FX quotes and KRX for whole-market daily stock quotes.

pub mod krx;
pub mod quotes;

pub use krx::KrxClient;
pub use quotes::YahooQuotesClient;
