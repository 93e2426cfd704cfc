//! The remote side of per-user state: membership sets and identity.
//!
//! Both collaborators are traits so the pipeline can be driven by the
//! in-process [`MemoryBackend`] in tests and in the binary alike.  A single
//! backend instance is created at start-up and handed to every component as
//! an `Arc`.
//!
//! ## Path layout
//!
//! ```text
//! users/{uid}/visitedArticles/{key}  -> true
//! users/{uid}/favoriteArticles/{key} -> true
//! ```
//!
//! Presence of a key is all that matters; its value is never read.

mod memory;

pub use memory::MemoryBackend;

use std::collections::HashSet;
use std::fmt;

use tokio::sync::{mpsc, watch};

use crate::error::{AuthError, StoreError};

/// Full snapshot of one membership node: the storage keys present under it.
pub type KeySet = HashSet<String>;

/// Which per-user membership node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipList {
    Visited,
    Favorite,
}

impl MembershipList {
    /// Path segment under `users/{uid}/`.
    pub fn segment(self) -> &'static str {
        match self {
            MembershipList::Visited => "visitedArticles",
            MembershipList::Favorite => "favoriteArticles",
        }
    }

    /// `users/{uid}/{segment}`
    pub fn node_path(self, uid: &str) -> String {
        format!("users/{uid}/{}", self.segment())
    }

    /// `users/{uid}/{segment}/{key}`
    pub fn entry_path(self, uid: &str, key: &str) -> String {
        format!("{}/{key}", self.node_path(uid))
    }
}

impl fmt::Display for MembershipList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// A signed-in account as reported by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub uid: String,
    pub email: String,
}

/// A live membership watch.
///
/// Yields a full [`KeySet`] on every change, starting with the current
/// contents.  An `Err` is terminal: nothing follows it.  Dropping the
/// subscription tears the watch down.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Result<KeySet, StoreError>>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Result<KeySet, StoreError>>) -> Self {
        Self { rx }
    }

    /// Next snapshot, or `None` once the store has closed the watch.
    pub async fn next(&mut self) -> Option<Result<KeySet, StoreError>> {
        self.rx.recv().await
    }
}

/// Per-user membership sets in the remote store.
///
/// Writes are fire-and-forget from the caller's point of view: the resulting
/// state arrives through any open [`Subscription`], not through the return
/// value.
pub trait MembershipStore: Send + Sync {
    /// Watch `users/{uid}/{list}`.
    fn subscribe(&self, uid: &str, list: MembershipList) -> Subscription;

    /// Write the presence marker for `key`.
    fn put(&self, uid: &str, list: MembershipList, key: &str) -> Result<(), StoreError>;

    /// Remove the presence marker for `key`.  Removing an absent key is fine.
    fn remove(&self, uid: &str, list: MembershipList, key: &str) -> Result<(), StoreError>;
}

/// Who is signed in.
///
/// Sign-in and sign-up sign the resulting user in; observers of
/// [`watch_user`](IdentityProvider::watch_user) see the change.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<User>;

    /// Latest-value stream of the signed-in user.  Drop the receiver to
    /// unsubscribe.
    fn watch_user(&self) -> watch::Receiver<Option<User>>;

    fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError>;

    fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError>;

    fn sign_out(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_the_remote_layout() {
        assert_eq!(MembershipList::Visited.node_path("u1"), "users/u1/visitedArticles");
        assert_eq!(
            MembershipList::Favorite.entry_path("u1", "Zm9v"),
            "users/u1/favoriteArticles/Zm9v"
        );
    }

    #[test]
    fn display_is_the_segment() {
        assert_eq!(MembershipList::Favorite.to_string(), "favoriteArticles");
    }
}
