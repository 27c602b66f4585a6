//! Singer protocol support
//!
//! This module handles everything the tap exchanges with the outside world:
//! - SCHEMA, RECORD and STATE messages
//! - Bookmark state read from `--state` and emitted as STATE messages
//! - Catalog discovery and stream selection
//! - The line-delimited JSON writer used for stdout

mod catalog;
mod message;
mod state;
mod writer;

pub use catalog::{Catalog, CatalogEntry, MetadataEntry};
pub use message::Message;
pub use state::{Bookmark, SyncState};
pub use writer::SingerWriter;
