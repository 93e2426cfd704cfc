use std::sync::mpsc;
use std::sync::Arc;

use ratatui::widgets::ListState;
use tokio::sync::watch;
use tracing::debug;

use crate::pipeline::ArticleFeed;
use crate::reconcile::{Tab, ViewState};
use crate::source::Article;
use crate::store::IdentityProvider;

/// Label shown when nobody is signed in.
const UNKNOWN_EMAIL: &str = "Unknown";

pub struct App {
    /// Latest reconciled view, pulled in by [`App::sync`].
    pub view: ViewState,
    /// A membership watch failed; favorites or read marks may be missing.
    pub degraded: bool,
    /// List selection state for scrolling.
    pub list_state: ListState,
    /// Whether the user has requested to quit.
    pub quit: bool,
    /// Last action / status message.
    pub status: String,
    view_rx: watch::Receiver<ViewState>,
    degraded_rx: watch::Receiver<bool>,
    feed: Arc<ArticleFeed>,
    identity: Arc<dyn IdentityProvider>,
    refresh: mpsc::Sender<()>,
}

impl App {
    /// Subscribing here is what keeps the reconciliation running.
    pub fn new(
        feed: Arc<ArticleFeed>,
        identity: Arc<dyn IdentityProvider>,
        refresh: mpsc::Sender<()>,
    ) -> Self {
        let view_rx = feed.subscribe();
        let degraded_rx = feed.degraded();
        Self {
            view: ViewState::Loading,
            degraded: false,
            list_state: ListState::default(),
            quit: false,
            status: "Starting…".into(),
            view_rx,
            degraded_rx,
            feed,
            identity,
            refresh,
        }
    }

    /// Pull the latest view.  Returns `true` if anything changed.
    pub fn sync(&mut self) -> bool {
        let mut changed = false;
        if self.view_rx.has_changed().unwrap_or(false) {
            self.view = self.view_rx.borrow_and_update().clone();
            self.clamp_selection();
            changed = true;
        }
        if self.degraded_rx.has_changed().unwrap_or(false) {
            self.degraded = *self.degraded_rx.borrow_and_update();
            changed = true;
        }
        changed
    }

    /// Articles currently on screen.  Empty while loading or failed.
    pub fn articles(&self) -> &[Article] {
        match &self.view {
            ViewState::Success(articles) => articles,
            _ => &[],
        }
    }

    pub fn selected(&self) -> Option<&Article> {
        self.list_state.selected().and_then(|i| self.articles().get(i))
    }

    pub fn tab(&self) -> Tab {
        self.feed.selected_tab()
    }

    pub fn user_label(&self) -> String {
        self.identity
            .current_user()
            .map(|user| user.email)
            .unwrap_or_else(|| UNKNOWN_EMAIL.to_string())
    }

    fn clamp_selection(&mut self) {
        let len = self.articles().len();
        match self.list_state.selected() {
            _ if len == 0 => self.list_state.select(None),
            Some(i) if i >= len => self.list_state.select(Some(len - 1)),
            _ => {}
        }
    }

    // -- navigation ----------------------------------------------------------

    pub fn select_next(&mut self) {
        let len = self.articles().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1).min(len - 1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        if self.articles().is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_first(&mut self) {
        if !self.articles().is_empty() {
            self.list_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        let len = self.articles().len();
        if len > 0 {
            self.list_state.select(Some(len - 1));
        }
    }

    pub fn select_tab(&mut self, tab: Tab) {
        if tab != self.tab() {
            self.feed.select_tab(tab);
            self.list_state.select(None);
        }
    }

    pub fn next_tab(&mut self) {
        self.select_tab(self.tab().next());
    }

    // -- actions -------------------------------------------------------------

    /// Open the selected article: mark it visited and show its link.
    pub fn open_selected(&mut self) {
        let Some(article) = self.selected().cloned() else {
            return;
        };
        self.feed.mark_visited(&article);
        self.status = if article.link.is_empty() {
            format!("Opened: {}", article.title)
        } else {
            format!("Opened: {}", article.link)
        };
    }

    pub fn toggle_favorite(&mut self) {
        let Some(article) = self.selected().cloned() else {
            return;
        };
        if !article.has_identity() {
            self.status = "This article has no id and cannot be starred".into();
            return;
        }
        self.feed.toggle_favorite(&article);
        self.status = if article.is_favorite {
            "Removed from favorites".into()
        } else {
            "Added to favorites".into()
        };
    }

    pub fn refresh(&mut self) {
        if self.refresh.send(()).is_err() {
            debug!("poller is gone; refresh ignored");
            self.status = "Refresh unavailable".into();
            return;
        }
        self.status = "Refreshing…".into();
    }

    pub fn sign_out(&mut self) {
        self.identity.sign_out();
        self.status = "Signed out".into();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use super::*;
    use crate::reconcile::FeedState;
    use crate::store::MemoryBackend;

    pub(crate) struct TestApp {
        pub app: App,
        pub backend: Arc<MemoryBackend>,
        pub refresh_rx: mpsc::Receiver<()>,
        _feed_tx: watch::Sender<FeedState>,
    }

    pub(crate) fn article(guid: &str, title: &str) -> Article {
        Article {
            guid: guid.to_string(),
            title: title.to_string(),
            content: format!("Body of {title}"),
            link: format!("https://example.com/{guid}"),
            ..Article::default()
        }
    }

    pub(crate) fn sample_articles() -> Vec<Article> {
        vec![article("1", "First"), article("2", "Second"), article("3", "Third")]
    }

    /// An app wired to a running pipeline over an in-memory backend with a
    /// signed-in user.
    pub(crate) async fn test_app(feed: FeedState) -> TestApp {
        let backend = Arc::new(MemoryBackend::new());
        backend.sign_up("reader@example.com", "secret1").unwrap();
        let (feed_tx, feed_rx) = watch::channel(feed);
        let pipeline = Arc::new(ArticleFeed::new(
            backend.clone(),
            backend.clone(),
            feed_rx,
            Duration::from_secs(5),
        ));
        tokio::spawn(pipeline.clone().run());
        let (refresh_tx, refresh_rx) = mpsc::channel();
        let app = App::new(pipeline, backend.clone(), refresh_tx);
        TestApp {
            app,
            backend,
            refresh_rx,
            _feed_tx: feed_tx,
        }
    }

    /// Pump `sync` until `pred` holds.
    pub(crate) async fn settle(app: &mut App, pred: impl Fn(&App) -> bool) {
        for _ in 0..300 {
            app.sync();
            if pred(app) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("app never settled; view = {:?}", app.view);
    }
}
