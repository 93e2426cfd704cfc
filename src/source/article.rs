//! The core record shared by the parser, the reconciler and the UI.
//!
//! `Article` is produced by the feed parser with its derived flags cleared.
//! Only the reconciler sets [`Article::is_visited`] and
//! [`Article::is_favorite`]; everything else treats the record as an
//! immutable value.

use chrono::{DateTime, Utc};

/// A single feed entry.
///
/// ## Identity
///
/// Two articles with the same non-empty `guid` are the same article.  An
/// article with a blank `guid` still displays, but it can never be marked
/// visited or favorite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Article {
    /// Feed-provided unique identifier (`<guid>`).  Empty when the feed
    /// omits it.
    pub guid: String,

    /// Human-readable headline.
    pub title: String,

    /// Enclosure URL, if the item carried one.
    pub image_url: Option<String>,

    /// Body text.  Raw markup straight out of the parser; plain text once
    /// the source has run it through [`super::sanitize`].
    pub content: String,

    /// URL to the full article.
    pub link: String,

    /// Publication timestamp, display only.  Articles keep document order.
    pub published: Option<DateTime<Utc>>,

    /// Derived: the current user has opened this article.
    pub is_visited: bool,

    /// Derived: the current user has starred this article.
    pub is_favorite: bool,
}

impl Article {
    /// Whether this article can carry per-user marks.
    pub fn has_identity(&self) -> bool {
        !self.guid.trim().is_empty()
    }

    /// First `max_chars` characters of the body, with an ellipsis when cut.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{}…", head.trim_end())
        } else {
            head
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn with_guid(guid: &str) -> Article {
        Article {
            guid: guid.to_string(),
            ..Article::default()
        }
    }

    #[test]
    fn blank_guid_has_no_identity() {
        assert!(!with_guid("").has_identity());
        assert!(!with_guid("   ").has_identity());
        assert!(with_guid("g-1").has_identity());
    }

    #[test]
    fn excerpt_leaves_short_content_alone() {
        let article = Article {
            content: "short body".into(),
            ..Article::default()
        };
        assert_eq!(article.excerpt(40), "short body");
    }

    #[test]
    fn excerpt_cuts_on_char_boundaries() {
        let article = Article {
            content: "zażółć gęślą jaźń".into(),
            ..Article::default()
        };
        assert_eq!(article.excerpt(6), "zażółć…");
    }

    #[test]
    fn parsed_articles_start_unmarked() {
        let article = with_guid("g");
        assert!(!article.is_visited);
        assert!(!article.is_favorite);
    }
}
