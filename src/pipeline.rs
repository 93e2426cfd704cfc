//! The live reconciler.
//!
//! [`ArticleFeed`] joins four independently changing inputs into one
//! [`ViewState`]:
//!
//! ```text
//!  feed (poller) ──────┐
//!  visited  (store) ───┤
//!  favorite (store) ───┼──► reconcile() ──► ViewState ──► UI
//!  tab (UI) ───────────┘
//!        ▲
//!  identity ── re-opens both store watches on every user change
//! ```
//!
//! Everything runs in one task, so each recomputation sees the latest value
//! of every input and nothing else touches the intermediate state.  An
//! identity change drops both watches and opens the new user's in the same
//! step, which is what keeps one user's marks out of another user's view.
//!
//! The join only runs while someone observes the view.  When the last
//! receiver goes away it is torn down after a grace period, releasing the
//! store watches.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::key::storage_key;
use crate::reconcile::{reconcile, FeedState, Tab, ViewState};
use crate::source::Article;
use crate::store::{IdentityProvider, KeySet, MembershipList, MembershipStore, Subscription, User};

/// Bucket that mutations are written to while nobody is signed in.
///
/// This attributes the mark to a shared pseudo-user rather than deferring
/// it.  Kept for compatibility with marks already stored that way.
pub const UNKNOWN_USER: &str = "Unknown";

/// Longest a (re)started join holds its first publish for the initial
/// membership snapshots.
const FIRST_SNAPSHOT_WAIT: Duration = Duration::from_secs(2);

/// One user's view of one membership node.
struct Membership {
    list: MembershipList,
    subscription: Option<Subscription>,
    keys: KeySet,
    degraded: bool,
}

impl Membership {
    fn open(store: &dyn MembershipStore, user: Option<&User>, list: MembershipList) -> Self {
        Self {
            list,
            subscription: user.map(|user| store.subscribe(&user.uid, list)),
            keys: KeySet::new(),
            degraded: false,
        }
    }

    /// Next update from the store.  Never resolves without a subscription.
    async fn next(&mut self) -> Option<Result<KeySet, StoreError>> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.next().await,
            None => future::pending().await,
        }
    }

    /// Take the snapshot a freshly opened watch delivers first.
    async fn prime(&mut self) {
        if self.subscription.is_some() {
            let update = self.next().await;
            self.apply(update);
        }
    }

    fn apply(&mut self, update: Option<Result<KeySet, StoreError>>) {
        match update {
            Some(Ok(keys)) => self.keys = keys,
            Some(Err(err)) => {
                warn!(list = %self.list, %err, "membership watch failed; treating it as empty");
                self.keys.clear();
                self.degraded = true;
                self.subscription = None;
            }
            None => {
                debug!(list = %self.list, "membership watch closed by the store");
                self.subscription = None;
            }
        }
    }
}

/// The article list as the user should see it, kept live.
pub struct ArticleFeed {
    store: Arc<dyn MembershipStore>,
    identity: Arc<dyn IdentityProvider>,
    feed_rx: watch::Receiver<FeedState>,
    tab_tx: watch::Sender<Tab>,
    view_tx: watch::Sender<ViewState>,
    degraded_tx: watch::Sender<bool>,
    demand: Notify,
    grace: Duration,
}

impl ArticleFeed {
    /// Build the pipeline.  Nothing runs until [`run`](Self::run) is spawned
    /// and someone [`subscribe`](Self::subscribe)s.
    pub fn new(
        store: Arc<dyn MembershipStore>,
        identity: Arc<dyn IdentityProvider>,
        feed_rx: watch::Receiver<FeedState>,
        grace: Duration,
    ) -> Self {
        let (tab_tx, _) = watch::channel(Tab::default());
        let (view_tx, _) = watch::channel(ViewState::Loading);
        let (degraded_tx, _) = watch::channel(false);
        Self {
            store,
            identity,
            feed_rx,
            tab_tx,
            view_tx,
            degraded_tx,
            demand: Notify::new(),
            grace,
        }
    }

    /// Observe the view.  The join keeps running while any receiver is alive.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        let rx = self.view_tx.subscribe();
        self.demand.notify_one();
        rx
    }

    /// `true` while a membership watch has failed and its set is assumed
    /// empty.
    pub fn degraded(&self) -> watch::Receiver<bool> {
        self.degraded_tx.subscribe()
    }

    pub fn select_tab(&self, tab: Tab) {
        self.tab_tx.send_if_modified(|current| {
            let changed = *current != tab;
            *current = tab;
            changed
        });
    }

    pub fn selected_tab(&self) -> Tab {
        *self.tab_tx.borrow()
    }

    /// Supervise the join: start it when the first observer arrives, stop it
    /// once the last one has been gone for the grace period.  Returns when
    /// the feed input closes.
    pub async fn run(self: Arc<Self>) {
        loop {
            while self.view_tx.receiver_count() == 0 {
                self.demand.notified().await;
            }

            debug!("view observed; starting reconciliation");
            tokio::select! {
                _ = self.join() => {
                    debug!("feed input closed; reconciliation finished");
                    return;
                }
                _ = self.released() => {
                    debug!(grace = ?self.grace, "no observers left; membership watches released");
                }
            }
        }
    }

    /// Resolves once there have been no observers for a whole grace period.
    async fn released(&self) {
        loop {
            self.view_tx.closed().await;

            let deadline = Instant::now() + self.grace;
            loop {
                tokio::select! {
                    _ = sleep_until(deadline) => break,
                    _ = self.demand.notified() => {
                        if self.view_tx.receiver_count() > 0 {
                            break;
                        }
                    }
                }
            }

            if self.view_tx.receiver_count() == 0 {
                return;
            }
        }
    }

    async fn join(&self) {
        let mut feed = self.feed_rx.clone();
        let mut tab = self.tab_tx.subscribe();
        let mut identity = self.identity.watch_user();

        let mut user = identity.borrow_and_update().clone();
        let mut visited = Membership::open(self.store.as_ref(), user.as_ref(), MembershipList::Visited);
        let mut favorite = Membership::open(self.store.as_ref(), user.as_ref(), MembershipList::Favorite);
        // The last published view outlives a release; publishing empty sets
        // over it would blank the marks until the snapshots land.
        let primed = timeout(FIRST_SNAPSHOT_WAIT, async {
            tokio::join!(visited.prime(), favorite.prime());
        })
        .await;
        if primed.is_err() {
            warn!("membership snapshots are late; publishing without them");
        }
        self.publish(&feed, &tab, &visited, &favorite);

        loop {
            tokio::select! {
                changed = feed.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                changed = tab.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                changed = identity.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let next = identity.borrow_and_update().clone();
                    if uid(&next) != uid(&user) {
                        info!(from = ?uid(&user), to = ?uid(&next), "identity changed; re-subscribing");
                        // Old watches are dropped before the next publish.
                        visited = Membership::open(self.store.as_ref(), next.as_ref(), MembershipList::Visited);
                        favorite = Membership::open(self.store.as_ref(), next.as_ref(), MembershipList::Favorite);
                    }
                    user = next;
                }
                update = visited.next() => visited.apply(update),
                update = favorite.next() => favorite.apply(update),
            }

            self.publish(&feed, &tab, &visited, &favorite);
        }
    }

    fn publish(
        &self,
        feed: &watch::Receiver<FeedState>,
        tab: &watch::Receiver<Tab>,
        visited: &Membership,
        favorite: &Membership,
    ) {
        let view = reconcile(&feed.borrow(), &visited.keys, &favorite.keys, *tab.borrow());
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            *current = view;
            true
        });

        let degraded = visited.degraded || favorite.degraded;
        self.degraded_tx.send_if_modified(|current| {
            let changed = *current != degraded;
            *current = degraded;
            changed
        });
    }

    // -- mutations -----------------------------------------------------------

    /// Record that the current user opened `article`.
    ///
    /// Fire-and-forget: the updated flag arrives through the visited watch.
    pub fn mark_visited(&self, article: &Article) {
        let Some(key) = mutation_key(article) else {
            return;
        };
        let uid = self.acting_uid();
        if let Err(err) = self.store.put(&uid, MembershipList::Visited, &key) {
            warn!(%err, "could not mark article visited");
        }
    }

    /// Flip the favorite mark, based on the flag `article` was last
    /// reconciled with.  Two clients toggling at once race; the last write
    /// wins.
    pub fn toggle_favorite(&self, article: &Article) {
        let Some(key) = mutation_key(article) else {
            return;
        };
        let uid = self.acting_uid();
        let result = if article.is_favorite {
            self.store.remove(&uid, MembershipList::Favorite, &key)
        } else {
            self.store.put(&uid, MembershipList::Favorite, &key)
        };
        if let Err(err) = result {
            warn!(%err, "could not toggle favorite");
        }
    }

    fn acting_uid(&self) -> String {
        match self.identity.current_user() {
            Some(user) => user.uid,
            None => {
                warn!("no signed-in user; writing to the {UNKNOWN_USER} bucket");
                UNKNOWN_USER.to_string()
            }
        }
    }
}

fn uid(user: &Option<User>) -> Option<&str> {
    user.as_ref().map(|user| user.uid.as_str())
}

fn mutation_key(article: &Article) -> Option<String> {
    article.has_identity().then(|| storage_key(&article.guid))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
