//! Markup-to-plain-text conversion for article bodies.
//!
//! Feeds put HTML in `<description>`, sometimes escaped twice.  [`sanitize`]
//! keeps only visible text, in reading order, with whitespace collapsed.

use scraper::{Html, Node};

/// Upper bound on re-parsing passes for multiply-escaped markup.
const MAX_PASSES: usize = 32;

/// Elements whose boundaries separate words even without whitespace.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre",
    "section", "table", "td", "th", "tr", "ul",
];

/// Strip markup and return the visible text.
///
/// Never fails: malformed fragments are parsed best-effort.  The result is
/// a fixed point, so `sanitize(&sanitize(x)) == sanitize(x)`.
pub fn sanitize(markup: &str) -> String {
    let mut text = visible_text(markup);
    for _ in 0..MAX_PASSES {
        let next = visible_text(&text);
        if next == text {
            break;
        }
        text = next;
    }
    text
}

fn is_block(node: &Node) -> bool {
    node.as_element()
        .is_some_and(|el| BLOCK_ELEMENTS.contains(&el.name()))
}

fn visible_text(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    let mut out = String::with_capacity(markup.len());

    for node in fragment.root_element().descendants() {
        // A block boundary on either side of a node separates words.
        let after_block = node.prev_sibling().is_some_and(|prev| is_block(prev.value()));
        if after_block || is_block(node.value()) {
            out.push(' ');
        }

        if let Node::Text(text) = node.value() {
            let hidden = node
                .parent()
                .and_then(|parent| parent.value().as_element())
                .is_some_and(|el| matches!(el.name(), "script" | "style" | "template"));
            if !hidden {
                out.push_str(text);
            }
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
