//! In-process backend implementing both [`MembershipStore`] and
//! [`IdentityProvider`].
//!
//! Nodes are kept as key sets addressed by their path.  Every write pushes a
//! fresh snapshot to the open watches on that node; watches whose
//! subscription was dropped are pruned on the way.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use super::{IdentityProvider, KeySet, MembershipList, MembershipStore, Subscription, User};
use crate::error::{AuthError, StoreError};
use crate::key::is_storage_safe;

type Watcher = mpsc::UnboundedSender<Result<KeySet, StoreError>>;

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    password: String,
    uid: String,
}

#[derive(Default)]
struct Inner {
    nodes: HashMap<String, KeySet>,
    watchers: HashMap<String, Vec<Watcher>>,
    accounts: HashMap<String, Account>,
    next_uid: u64,
    opened: usize,
}

impl Inner {
    fn publish(&mut self, path: &str) {
        let snapshot = self.nodes.get(path).cloned().unwrap_or_default();
        if let Some(watchers) = self.watchers.get_mut(path) {
            watchers.retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
            if watchers.is_empty() {
                self.watchers.remove(path);
            }
        }
    }

    /// Forget watches whose subscription has been dropped.
    fn prune(&mut self, path: &str) {
        if let Some(watchers) = self.watchers.get_mut(path) {
            watchers.retain(|tx| !tx.is_closed());
            if watchers.is_empty() {
                self.watchers.remove(path);
            }
        }
    }
}

/// Shared in-memory backend.  Wrap in an `Arc` and hand the same instance
/// to every component.
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    user_tx: watch::Sender<Option<User>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (user_tx, _) = watch::channel(None);
        Self {
            inner: Mutex::new(Inner::default()),
            user_tx,
        }
    }

    /// Keys currently stored under `users/{uid}/{list}`.
    #[cfg(test)]
    pub fn keys(&self, uid: &str, list: MembershipList) -> KeySet {
        self.inner
            .lock()
            .nodes
            .get(&list.node_path(uid))
            .cloned()
            .unwrap_or_default()
    }

    /// Open watches on `users/{uid}/{list}` whose subscription is still alive.
    #[cfg(test)]
    pub fn subscriber_count(&self, uid: &str, list: MembershipList) -> usize {
        self.inner
            .lock()
            .watchers
            .get(&list.node_path(uid))
            .map_or(0, |watchers| watchers.iter().filter(|tx| !tx.is_closed()).count())
    }

    /// Watch slots held for a node, including ones not yet pruned.
    #[cfg(test)]
    fn watcher_slots(&self, uid: &str, list: MembershipList) -> usize {
        self.inner
            .lock()
            .watchers
            .get(&list.node_path(uid))
            .map_or(0, Vec::len)
    }

    /// Watches opened since start-up, alive or not.
    #[cfg(test)]
    pub fn subscriptions_opened(&self) -> usize {
        self.inner.lock().opened
    }

    /// Cancel every watch on a node, the way a remote permission change
    /// would.  Each subscription receives one terminal error.
    #[cfg(test)]
    pub fn cancel_watches(&self, uid: &str, list: MembershipList, reason: &str) {
        let path = list.node_path(uid);
        let watchers = self.inner.lock().watchers.remove(&path).unwrap_or_default();
        for tx in watchers {
            let _ = tx.send(Err(StoreError::WatchCancelled {
                path: path.clone(),
                reason: reason.to_string(),
            }));
        }
    }

    fn sign_in_as(&self, user: User) -> User {
        info!(uid = %user.uid, "signed in");
        self.user_tx.send_if_modified(|current| {
            if current.as_ref() == Some(&user) {
                return false;
            }
            *current = Some(user.clone());
            true
        });
        user
    }

    fn write(&self, uid: &str, list: MembershipList, key: &str, present: bool) -> Result<(), StoreError> {
        let path = list.entry_path(uid, key);
        if key.is_empty() || !is_storage_safe(key) || uid.is_empty() || uid.contains('/') {
            return Err(StoreError::Write {
                path,
                reason: "not a legal path".into(),
            });
        }

        let node = list.node_path(uid);
        let mut inner = self.inner.lock();
        let changed = if present {
            inner.nodes.entry(node.clone()).or_default().insert(key.to_string())
        } else {
            inner.nodes.get_mut(&node).is_some_and(|keys| keys.remove(key))
        };
        if changed {
            debug!(%path, present, "membership changed");
            inner.publish(&node);
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MembershipStore for MemoryBackend {
    fn subscribe(&self, uid: &str, list: MembershipList) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let path = list.node_path(uid);

        let mut inner = self.inner.lock();
        let snapshot = inner.nodes.get(&path).cloned().unwrap_or_default();
        // The receiver is still in hand, so this cannot fail.
        let _ = tx.send(Ok(snapshot));
        inner.prune(&path);
        inner.watchers.entry(path.clone()).or_default().push(tx);
        inner.opened += 1;
        debug!(%path, total = inner.opened, "watch opened");

        Subscription::new(rx)
    }

    fn put(&self, uid: &str, list: MembershipList, key: &str) -> Result<(), StoreError> {
        self.write(uid, list, key, true)
    }

    fn remove(&self, uid: &str, list: MembershipList, key: &str) -> Result<(), StoreError> {
        self.write(uid, list, key, false)
    }
}

impl IdentityProvider for MemoryBackend {
    fn current_user(&self) -> Option<User> {
        self.user_tx.borrow().clone()
    }

    fn watch_user(&self) -> watch::Receiver<Option<User>> {
        self.user_tx.subscribe()
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = email.trim();
        let uid = {
            let inner = self.inner.lock();
            match inner.accounts.get(email) {
                Some(account) if account.password == password => account.uid.clone(),
                _ => return Err(AuthError::InvalidCredentials),
            }
        };
        Ok(self.sign_in_as(User {
            uid,
            email: email.to_string(),
        }))
    }

    fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = email.trim();
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if !valid_email {
            return Err(AuthError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let uid = {
            let mut inner = self.inner.lock();
            if inner.accounts.contains_key(email) {
                return Err(AuthError::EmailTaken);
            }
            inner.next_uid += 1;
            let uid = format!("user-{}", inner.next_uid);
            inner.accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    uid: uid.clone(),
                },
            );
            uid
        };
        Ok(self.sign_in_as(User {
            uid,
            email: email.to_string(),
        }))
    }

    fn sign_out(&self) {
        let was_signed_in = self.user_tx.send_if_modified(|current| current.take().is_some());
        if was_signed_in {
            info!("signed out");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscription_starts_with_current_contents() {
        let backend = MemoryBackend::new();
        backend.put("u1", MembershipList::Visited, "a2V5").unwrap();

        let mut sub = backend.subscribe("u1", MembershipList::Visited);
        let first = sub.next().await.unwrap().unwrap();

        assert_eq!(first, KeySet::from(["a2V5".to_string()]));
    }

    #[tokio::test]
    async fn writes_push_full_snapshots() {
        let backend = MemoryBackend::new();
        let mut sub = backend.subscribe("u1", MembershipList::Favorite);
        assert!(sub.next().await.unwrap().unwrap().is_empty());

        backend.put("u1", MembershipList::Favorite, "YQ").unwrap();
        backend.put("u1", MembershipList::Favorite, "Yg").unwrap();
        backend.remove("u1", MembershipList::Favorite, "YQ").unwrap();

        assert_eq!(sub.next().await.unwrap().unwrap().len(), 1);
        assert_eq!(sub.next().await.unwrap().unwrap().len(), 2);
        assert_eq!(
            sub.next().await.unwrap().unwrap(),
            KeySet::from(["Yg".to_string()])
        );
    }

    #[test]
    fn lists_and_users_are_separate_nodes() {
        let backend = MemoryBackend::new();
        backend.put("u1", MembershipList::Visited, "YQ").unwrap();

        assert!(backend.keys("u1", MembershipList::Favorite).is_empty());
        assert!(backend.keys("u2", MembershipList::Visited).is_empty());
        assert_eq!(backend.keys("u1", MembershipList::Visited).len(), 1);
    }

    #[test]
    fn rejects_keys_that_are_not_path_safe() {
        let backend = MemoryBackend::new();
        let err = backend.put("u1", MembershipList::Visited, "a/b").unwrap_err();
        assert_eq!(
            err,
            StoreError::Write {
                path: "users/u1/visitedArticles/a/b".into(),
                reason: "not a legal path".into(),
            }
        );
        assert!(backend.put("u1", MembershipList::Visited, "").is_err());
    }

    #[test]
    fn removing_absent_key_is_ok() {
        let backend = MemoryBackend::new();
        backend.remove("u1", MembershipList::Favorite, "YQ").unwrap();
    }

    #[test]
    fn dropped_subscriptions_stop_counting() {
        let backend = MemoryBackend::new();
        let sub = backend.subscribe("u1", MembershipList::Visited);
        assert_eq!(backend.subscriber_count("u1", MembershipList::Visited), 1);

        drop(sub);
        assert_eq!(backend.subscriber_count("u1", MembershipList::Visited), 0);
        assert_eq!(backend.subscriptions_opened(), 1);
    }

    #[test]
    fn resubscribing_does_not_accumulate_dead_watches() {
        let backend = MemoryBackend::new();
        for _ in 0..1000 {
            drop(backend.subscribe("u1", MembershipList::Visited));
        }
        assert!(backend.watcher_slots("u1", MembershipList::Visited) <= 1);

        let _live = backend.subscribe("u1", MembershipList::Visited);
        assert_eq!(backend.watcher_slots("u1", MembershipList::Visited), 1);
        assert_eq!(backend.subscriptions_opened(), 1001);
    }

    #[test]
    fn last_dropped_watch_is_forgotten_on_write() {
        let backend = MemoryBackend::new();
        drop(backend.subscribe("u1", MembershipList::Favorite));
        backend.put("u1", MembershipList::Favorite, "YQ").unwrap();
        assert_eq!(backend.watcher_slots("u1", MembershipList::Favorite), 0);
    }

    #[tokio::test]
    async fn cancelled_watch_gets_one_terminal_error() {
        let backend = MemoryBackend::new();
        let mut sub = backend.subscribe("u1", MembershipList::Visited);
        sub.next().await.unwrap().unwrap();

        backend.cancel_watches("u1", MembershipList::Visited, "permission denied");

        let err = sub.next().await.unwrap().unwrap_err();
        assert!(matches!(err, StoreError::WatchCancelled { .. }));
        assert!(sub.next().await.is_none(), "nothing follows the error");
    }

    // -- identity ------------------------------------------------------------

    #[test]
    fn sign_up_signs_in() {
        let backend = MemoryBackend::new();
        let user = backend.sign_up("ann@example.com", "secret1").unwrap();

        assert_eq!(backend.current_user(), Some(user.clone()));
        assert_eq!(user.email, "ann@example.com");
    }

    #[test]
    fn sign_up_validates_input() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.sign_up("no-at-sign", "secret1"), Err(AuthError::InvalidEmail));
        assert_eq!(backend.sign_up("a@b", "123"), Err(AuthError::WeakPassword));

        backend.sign_up("a@b", "123456").unwrap();
        assert_eq!(backend.sign_up("a@b", "654321"), Err(AuthError::EmailTaken));
    }

    #[test]
    fn sign_in_checks_password() {
        let backend = MemoryBackend::new();
        let created = backend.sign_up("a@b", "123456").unwrap();
        backend.sign_out();

        assert_eq!(backend.sign_in("a@b", "wrong"), Err(AuthError::InvalidCredentials));
        assert_eq!(backend.sign_in("x@y", "123456"), Err(AuthError::InvalidCredentials));
        assert!(backend.current_user().is_none());

        assert_eq!(backend.sign_in("a@b", "123456"), Ok(created));
    }

    #[test]
    fn sign_in_accepts_the_string_used_to_sign_up() {
        let backend = MemoryBackend::new();
        let created = backend.sign_up(" a@b.c ", "secret1").unwrap();
        backend.sign_out();

        assert_eq!(backend.sign_in(" a@b.c ", "secret1"), Ok(created.clone()));
        backend.sign_out();
        assert_eq!(backend.sign_in("a@b.c", "secret1"), Ok(created));
    }

    #[test]
    fn identity_watchers_see_changes() {
        let backend = MemoryBackend::new();
        let mut rx = backend.watch_user();
        assert!(rx.borrow_and_update().is_none());

        backend.sign_up("a@b", "123456").unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().map(|u| u.email.as_str()), Some("a@b"));

        backend.sign_out();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn signing_out_twice_does_not_notify() {
        let backend = MemoryBackend::new();
        let mut rx = backend.watch_user();
        backend.sign_out();
        assert!(!rx.has_changed().unwrap());
        rx.borrow_and_update();
    }
}
