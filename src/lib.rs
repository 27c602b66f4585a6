//! tap-gorgias
//!
//! A Singer tap for the Gorgias helpdesk API: tickets and their messages are
//! synced incrementally, satisfaction surveys are fully refreshed.

pub mod cli;
pub mod client;
pub mod config;
pub mod cursor;
pub mod error;
pub mod etl;
pub mod singer;
pub mod streams;
pub mod sync;

// Re-exports for convenience
pub use client::{Auth, GorgiasClient, RetryPolicy};
pub use config::TapConfig;
pub use error::{Result, TapError};
pub use etl::{Extractor, Loader, Pipeline, Transformer};
pub use singer::{Catalog, Message, SingerWriter, SyncState};
pub use streams::{StreamKind, TicketIds};
pub use sync::{SyncSummary, Tap};
