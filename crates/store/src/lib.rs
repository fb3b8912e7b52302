//! SQLite persistence: last-known-good snapshots and append-only history.

mod cache;
mod recording;

pub use cache::{PricePoint, QuoteCache, Snapshot};
pub use recording::RecordingSource;
