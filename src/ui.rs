//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from application state ([`App`])
//! and input handling ([`crate::input`]).  Rendering only reads the
//! reconciled view; it never decides visited/favorite state itself.
//!
//! ## For contributors
//!
//! * The layout is a three-row split: tab bar, article list (or a loading /
//!   error message), and a one-line status bar.
//! * Colours and styles are defined inline — feel free to extract them into
//!   constants or a theme struct if the palette grows.
//! * [`ratatui`] is the TUI framework; see its docs for widget details.

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::App;
use crate::reconcile::{Tab, ViewState};
use crate::source::Article;

/// Characters of body text shown under each headline.
const EXCERPT_CHARS: usize = 120;

/// Draw the complete UI for one frame.
pub fn draw(app: &mut App, frame: &mut Frame) {
    let [tabs_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_tabs(app, frame, tabs_area);

    let message = match &app.view {
        ViewState::Loading => Some(("Loading…".to_string(), Color::Yellow)),
        ViewState::Error(message) => Some((
            format!("Could not load the feed\n\n{message}\n\nPress r to retry"),
            Color::Red,
        )),
        ViewState::Success(articles) if articles.is_empty() => Some((
            "No favorites yet. Press f on an article to add one.".to_string(),
            Color::DarkGray,
        )),
        ViewState::Success(_) => None,
    };
    match message {
        Some((text, colour)) => draw_message(frame, main_area, &text, colour),
        None => draw_article_list(app, frame, main_area),
    }
    draw_status_bar(app, frame, status_area);
}

fn draw_tabs(app: &App, frame: &mut Frame, area: Rect) {
    let titles: Vec<&str> = Tab::ALL.iter().map(|tab| tab.title()).collect();
    let tabs = Tabs::new(titles)
        .select(app.tab().index())
        .block(
            Block::default()
                .title(format!(" News for {} ", app.user_label()))
                .borders(Borders::ALL),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, area);
}

fn draw_message(frame: &mut Frame, area: Rect, message: &str, colour: Color) {
    let paragraph = Paragraph::new(message.to_string())
        .style(Style::default().fg(colour))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn article_item(article: &Article) -> ListItem<'_> {
    let star = if article.is_favorite { "★ " } else { "☆ " };
    let title_style = if article.is_visited {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    };
    let date = article
        .published
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();

    let headline = Line::from(vec![
        Span::styled(star, Style::default().fg(Color::Yellow)),
        Span::styled(article.title.as_str(), title_style),
        Span::raw("  "),
        Span::styled(date, Style::default().fg(Color::DarkGray)),
    ]);
    let excerpt = Line::from(Span::styled(
        format!("  {}", article.excerpt(EXCERPT_CHARS)),
        Style::default().fg(Color::Gray),
    ));

    ListItem::new(vec![headline, excerpt])
}

/// Render the scrollable article list.
fn draw_article_list(app: &mut App, frame: &mut Frame, area: Rect) {
    let title = format!(" {} ", app.tab().title());
    // Borrow the view field directly so `list_state` stays free below.
    let articles: &[Article] = match &app.view {
        ViewState::Success(articles) => articles,
        _ => &[],
    };
    let list_items: Vec<ListItem> = articles.iter().map(article_item).collect();

    let list = List::new(list_items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL),
        )
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        )
        .highlight_symbol("▸ ");

    frame.render_stateful_widget(list, area, &mut app.list_state);
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(" ", Style::default()),
        Span::styled(app.status.as_str(), Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(
            format!("{} items", app.articles().len()),
            Style::default().fg(Color::Green),
        ),
    ];
    if app.degraded {
        spans.push(Span::styled("  sync degraded", Style::default().fg(Color::Red)));
    }
    spans.push(Span::raw(
        "  q: quit  ↑/↓: scroll  Tab: switch  Enter: open  f: favorite  r: refresh  x: sign out",
    ));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ---------------------------------------------------------------------------
// Tests (smoke tests against an in-memory terminal)
// ---------------------------------------------------------------------------
