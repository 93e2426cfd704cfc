//! Feed ingestion.
//!
//! This module defines the [`FeedSource`] trait and the common [`Article`]
//! type.  The RSS implementation lives in [`rss`]: an event-driven parser
//! plus an HTTP source that fetches, parses and sanitizes in one call.
//! [`sanitize`] turns article bodies into plain text.
//!
//! ## For contributors — adding a new source
//!
//! 1. Create a new file in this directory (e.g. `atom.rs`).
//! 2. Define a struct (e.g. `AtomSource`) and implement [`FeedSource`] for it.
//! 3. Add `mod atom;` below and re-export your struct in the `pub use` block.
//! 4. Construct an instance in `main.rs` and hand it to the poller.
//!
//! The poller, the reconciler and the UI only ever see `Vec<Article>`.

mod article;
mod rss;
mod sanitize;

pub use article::Article;
pub use rss::{parse, HttpFeedSource};
pub use sanitize::sanitize;

use crate::error::FeedError;

/// Trait that every feed source must implement.
///
/// The poller calls [`fetch()`](FeedSource::fetch) on a background thread,
/// so implementations must be [`Send`] and [`Sync`] and are free to block.
pub trait FeedSource: Send + Sync {
    /// Human-readable label used in logs and the status bar.
    fn name(&self) -> &str;

    /// Fetch the whole feed and return sanitized articles in document order.
    ///
    /// Network and parse failures are returned, never swallowed: the poller
    /// turns them into a visible error state.
    fn fetch(&self) -> Result<Vec<Article>, FeedError>;
}
