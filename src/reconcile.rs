//! The pure half of the reconciler: four input values in, one view out.
//!
//! [`reconcile`] is what the live pipeline ([`crate::pipeline`]) calls every
//! time any of its inputs changes.  Keeping it free of channels makes the
//! join rules easy to test on their own.

use crate::key::storage_key;
use crate::source::Article;
use crate::store::KeySet;

/// Which list the user is looking at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    All,
    Favorites,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::All, Tab::Favorites];

    /// Index 1 selects favorites; every other index shows everything.
    pub fn from_index(index: usize) -> Self {
        if index == 1 {
            Tab::Favorites
        } else {
            Tab::All
        }
    }

    pub fn index(self) -> usize {
        match self {
            Tab::All => 0,
            Tab::Favorites => 1,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Tab::All => "All",
            Tab::Favorites => "Favorites",
        }
    }

    pub fn next(self) -> Self {
        Tab::from_index((self.index() + 1) % Tab::ALL.len())
    }
}

/// The article input as published by the poller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FeedState {
    /// No fetch has completed yet.
    #[default]
    Pending,
    /// The latest fetch succeeded.  May be empty.
    Loaded(Vec<Article>),
    /// The latest fetch failed.
    Failed(String),
}

/// What the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ViewState {
    #[default]
    Loading,
    Success(Vec<Article>),
    Error(String),
}

/// Combine the latest feed, membership sets and tab into a view.
///
/// * A failed fetch is an `Error`.
/// * No articles (pending or an empty feed) is `Loading`, whatever the
///   other inputs say.
/// * Otherwise every article gets its visited/favorite flags from the sets,
///   and the favorites tab keeps only favorites.  Order is preserved.
pub fn reconcile(feed: &FeedState, visited: &KeySet, favorite: &KeySet, tab: Tab) -> ViewState {
    let articles = match feed {
        FeedState::Failed(message) => return ViewState::Error(message.clone()),
        FeedState::Pending => return ViewState::Loading,
        FeedState::Loaded(articles) if articles.is_empty() => return ViewState::Loading,
        FeedState::Loaded(articles) => articles,
    };

    let marked = articles
        .iter()
        .map(|article| {
            let key = storage_key(&article.guid);
            Article {
                is_visited: visited.contains(&key),
                is_favorite: favorite.contains(&key),
                ..article.clone()
            }
        })
        .filter(|article| tab == Tab::All || article.is_favorite)
        .collect();

    ViewState::Success(marked)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn article(guid: &str) -> Article {
        Article {
            guid: guid.to_string(),
            title: format!("title of {guid}"),
            ..Article::default()
        }
    }

    fn keys(guids: &[&str]) -> KeySet {
        guids.iter().map(|g| storage_key(g)).collect()
    }

    fn flags(view: &ViewState) -> Vec<(String, bool, bool)> {
        match view {
            ViewState::Success(articles) => articles
                .iter()
                .map(|a| (a.guid.clone(), a.is_visited, a.is_favorite))
                .collect(),
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn marks_visited_from_encoded_keys() {
        let feed = FeedState::Loaded(vec![article("g1"), article("g2")]);

        let view = reconcile(&feed, &keys(&["g1"]), &KeySet::new(), Tab::All);

        assert_eq!(
            flags(&view),
            [("g1".into(), true, false), ("g2".into(), false, false)]
        );
    }

    #[test]
    fn favorites_tab_with_no_favorites_is_empty_success() {
        let feed = FeedState::Loaded(vec![article("g1"), article("g2")]);

        let view = reconcile(&feed, &keys(&["g1"]), &KeySet::new(), Tab::Favorites);

        assert_eq!(view, ViewState::Success(vec![]));
    }

    #[test]
    fn favorites_tab_keeps_order() {
        let feed = FeedState::Loaded(vec![article("a"), article("b"), article("c"), article("d")]);

        let view = reconcile(&feed, &KeySet::new(), &keys(&["d", "b"]), Tab::Favorites);

        assert_eq!(
            flags(&view),
            [("b".into(), false, true), ("d".into(), false, true)]
        );
    }

    #[test]
    fn raw_guids_do_not_match() {
        let feed = FeedState::Loaded(vec![article("g1")]);
        let raw: KeySet = ["g1".to_string()].into();

        let view = reconcile(&feed, &raw, &raw, Tab::All);

        assert_eq!(flags(&view), [("g1".into(), false, false)]);
    }

    #[test]
    fn empty_feed_is_always_loading() {
        let full = keys(&["g1", "g2"]);
        for feed in [FeedState::Pending, FeedState::Loaded(vec![])] {
            for tab in Tab::ALL {
                for (visited, favorite) in [(&full, &full), (&KeySet::new(), &KeySet::new())] {
                    assert_eq!(reconcile(&feed, visited, favorite, tab), ViewState::Loading);
                }
            }
        }
    }

    #[test]
    fn failed_feed_is_error() {
        let feed = FeedState::Failed("network error: timed out".into());
        assert_eq!(
            reconcile(&feed, &KeySet::new(), &KeySet::new(), Tab::All),
            ViewState::Error("network error: timed out".into())
        );
    }

    #[test]
    fn other_fields_pass_through() {
        let original = Article {
            guid: "g".into(),
            title: "T".into(),
            image_url: Some("https://img".into()),
            content: "body".into(),
            link: "https://l".into(),
            ..Article::default()
        };
        let feed = FeedState::Loaded(vec![original.clone()]);

        let ViewState::Success(articles) = reconcile(&feed, &KeySet::new(), &keys(&["g"]), Tab::All) else {
            panic!("expected Success");
        };

        assert_eq!(
            articles[0],
            Article {
                is_favorite: true,
                ..original
            }
        );
    }

    #[test]
    fn tab_indices() {
        assert_eq!(Tab::from_index(0), Tab::All);
        assert_eq!(Tab::from_index(1), Tab::Favorites);
        assert_eq!(Tab::from_index(7), Tab::All);
        assert_eq!(Tab::All.next(), Tab::Favorites);
        assert_eq!(Tab::Favorites.next(), Tab::All);
    }
}
