//! Error types shared across the crate.
//!
//! Each failure domain gets its own enum so callers can decide what is
//! terminal (a fetch attempt), what degrades (a membership watch), and what
//! is merely reported (authentication).

use thiserror::Error;

/// The feed document could not be read as well-formed XML.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Mismatched tag nesting, undecodable bytes, broken attributes, etc.
    #[error("malformed feed XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// A single fetch attempt failed.  Terminal for that attempt; the poller
/// tries again on the next tick.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{0}")]
    Parse(#[from] ParseError),
}

/// Failures reported by the remote membership store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A live subscription was cancelled by the remote side.  The
    /// subscription is closed afterwards; retrying is the store's business.
    #[error("watch on {path} cancelled: {reason}")]
    WatchCancelled { path: String, reason: String },

    /// A presence marker could not be written or removed.
    #[error("write to {path} failed: {reason}")]
    Write { path: String, reason: String },
}

/// Sign-in / sign-up outcomes.  Callers only need to know it failed, but
/// the variant is kept for the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid email address")]
    InvalidEmail,

    #[error("password is too weak")]
    WeakPassword,

    #[error("an account already exists for this email")]
    EmailTaken,

    #[error("invalid email or password")]
    InvalidCredentials,
}
