//! RSS feed parsing and fetching.
//!
//! [`parse`] is a single forward pass over the [`quick_xml`] event stream.
//! It keeps an "inside item" accumulator, remembers the text seen since the
//! last tag boundary, and dispatches on closing tags.  Tag names are matched
//! case-insensitively and namespaced elements (`media:title`, `atom:link`)
//! are ignored so they cannot clobber the plain RSS fields.
//!
//! [`HttpFeedSource`] wraps the parser with a blocking HTTP GET and the
//! content sanitizer.

use std::io::BufRead;
use std::time::Duration;

use chrono::{DateTime, Utc};
use quick_xml::encoding::Decoder;
use quick_xml::escape::{resolve_html5_entity, resolve_predefined_entity, unescape_with};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use super::{sanitize, Article, FeedSource};
use crate::error::{FeedError, ParseError};

/// Parse an RSS document into articles, in document order.
///
/// Contents are returned raw; sanitizing is the caller's job.  Fails with
/// [`ParseError`] on mismatched tag nesting or undecodable text.  An `<item>`
/// still open when the stream ends is dropped; every item closed before
/// that point is returned.
pub fn parse<R: BufRead>(input: R) -> Result<Vec<Article>, ParseError> {
    let mut reader = Reader::from_reader(input);
    let decoder = reader.decoder();

    let mut buf = Vec::new();
    let mut articles = Vec::new();
    let mut item: Option<Article> = None;
    let mut text = String::new();
    let mut enclosure_url: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                open_tag(&e, decoder, &mut item, &mut enclosure_url)?;
                text.clear();
            }
            // `<enclosure url="…"/>` arrives as a single event: open and close.
            Event::Empty(e) => {
                open_tag(&e, decoder, &mut item, &mut enclosure_url)?;
                text.clear();
                close_tag(e.name().as_ref(), &text, &mut item, &mut enclosure_url, &mut articles);
            }
            Event::End(e) => {
                close_tag(e.name().as_ref(), &text, &mut item, &mut enclosure_url, &mut articles);
                text.clear();
            }
            Event::Text(e) => text.push_str(&decode_text(&e, decoder)?),
            Event::CData(e) => text.push_str(&decoder.decode(&e)?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if item.is_some() {
        warn!(parsed = articles.len(), "feed ended inside an <item>; dropping it");
    }
    debug!(count = articles.len(), "parsed feed");
    Ok(articles)
}

fn open_tag(
    e: &BytesStart<'_>,
    decoder: Decoder,
    item: &mut Option<Article>,
    enclosure_url: &mut Option<String>,
) -> Result<(), ParseError> {
    let name = e.name();
    if name.as_ref().eq_ignore_ascii_case(b"item") {
        *item = Some(Article::default());
        *enclosure_url = None;
    } else if item.is_some() && name.as_ref().eq_ignore_ascii_case(b"enclosure") {
        // Attributes are only visible here, not on the closing event.
        *enclosure_url = url_attribute(e, decoder)?;
    }
    Ok(())
}

fn close_tag(
    name: &[u8],
    text: &str,
    item: &mut Option<Article>,
    enclosure_url: &mut Option<String>,
    articles: &mut Vec<Article>,
) {
    if name.eq_ignore_ascii_case(b"item") {
        if let Some(finished) = item.take() {
            articles.push(finished);
        }
        return;
    }

    let Some(article) = item.as_mut() else {
        return;
    };

    if name.eq_ignore_ascii_case(b"title") {
        article.title = text.to_owned();
    } else if name.eq_ignore_ascii_case(b"link") {
        article.link = text.to_owned();
    } else if name.eq_ignore_ascii_case(b"guid") {
        article.guid = text.to_owned();
    } else if name.eq_ignore_ascii_case(b"description") {
        article.content = text.to_owned();
    } else if name.eq_ignore_ascii_case(b"enclosure") {
        article.image_url = enclosure_url.take();
    } else if name.eq_ignore_ascii_case(b"pubdate") {
        // Unparseable dates degrade to None.
        article.published = DateTime::parse_from_rfc2822(text.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
    }
}

/// Unescape a text node.  Feeds mix XML and HTML entities (`&amp;` next to
/// `&nbsp;`), so both are resolved.
fn decode_text(e: &BytesText<'_>, decoder: Decoder) -> Result<String, ParseError> {
    Ok(unescape_lenient(&decoder.decode(e)?))
}

fn url_attribute(e: &BytesStart<'_>, decoder: Decoder) -> Result<Option<String>, ParseError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref().eq_ignore_ascii_case(b"url") {
            return Ok(Some(unescape_lenient(&decoder.decode(&attr.value)?)));
        }
    }
    Ok(None)
}

/// Resolve entity and character references one at a time.  A reference
/// nothing knows about is kept as written instead of failing the whole node.
fn unescape_lenient(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let reference = tail.find(';').map(|end| &tail[..=end]);
        let decoded = reference.and_then(|r| {
            unescape_with(r, |name| {
                resolve_predefined_entity(name).or_else(|| resolve_html5_entity(name))
            })
            .ok()
        });
        match (reference, decoded) {
            (Some(reference), Some(decoded)) => {
                out.push_str(&decoded);
                rest = &tail[reference.len()..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

/// An RSS feed fetched over HTTP(S).
///
/// Every fetch is a plain full GET: no conditional requests, no paging.
pub struct HttpFeedSource {
    /// The feed URL to poll.
    pub url: String,
    /// A human-readable label shown in the status bar.
    pub label: String,
    timeout: Duration,
}

impl HttpFeedSource {
    /// Create a new source.
    ///
    /// # Arguments
    ///
    /// * `url` — full URL of the RSS feed.
    /// * `label` — short name used in logs and the status bar.
    /// * `timeout` — total request timeout.
    pub fn new(url: impl Into<String>, label: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
            timeout,
        }
    }

    /// Parse an already-fetched body and sanitize each article's content.
    ///
    /// No I/O, so tests can exercise it without the network.
    pub fn read_articles(body: &[u8]) -> Result<Vec<Article>, ParseError> {
        let mut articles = parse(body)?;
        for article in &mut articles {
            article.content = sanitize(&article.content);
        }
        Ok(articles)
    }
}

impl FeedSource for HttpFeedSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn fetch(&self) -> Result<Vec<Article>, FeedError> {
        // Built per call: the blocking client must live and die on the
        // poller thread, never inside the async runtime.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let body = client.get(&self.url).send()?.error_for_status()?.bytes()?;
        Ok(Self::read_articles(&body)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
