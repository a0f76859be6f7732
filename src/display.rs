//! Plain-text rendering of articles and load states for the terminal.

use crate::loader::LoadState;
use crate::news::Article;
use crate::util::{strip_control_chars, strip_html, truncate_to_width};

/// Shown when a search produced nothing to list.
pub const EMPTY_MESSAGE: &str = "No news found.";

/// Shown when the server could not be reached.
pub const OFFLINE_MESSAGE: &str = "No internet connection.";

/// Shown while a load is in flight.
pub const LOADING_MESSAGE: &str = "Loading...";

/// Publication date as `May 01 '23`, or the raw string if it does not parse.
pub fn format_date(article: &Article) -> String {
    match article.published_at() {
        Some(dt) => dt.format("%b %d '%y").to_string(),
        None => article.web_publication_date.clone(),
    }
}

/// Publication time as `3:04 PM`, or empty if the date does not parse.
pub fn format_time(article: &Article) -> String {
    article
        .published_at()
        .map(|dt| dt.format("%-I:%M %p").to_string())
        .unwrap_or_default()
}

/// Remote text made safe for the terminal and cut to `width` columns.
fn clean_line(s: &str, width: usize) -> String {
    let text = strip_html(s);
    let text = strip_control_chars(&text);
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_to_width(&flat, width).into_owned()
}

/// One list entry: numbered title line, byline/section/date line, trail text.
pub fn render_article(index: usize, article: &Article, width: usize) -> String {
    let prefix = format!("{:>2}. ", index + 1);
    let indent = " ".repeat(prefix.len());
    let inner = width.saturating_sub(prefix.len());

    let thumb = match &article.thumbnail {
        Some(t) => format!(" [img {}x{}]", t.width, t.height),
        None => String::new(),
    };
    let meta = format!(
        "{} | {} | {} {}{}",
        article.byline,
        article.section_name,
        format_date(article),
        format_time(article),
        thumb
    );

    let mut out = format!("{prefix}{}\n", clean_line(&article.web_title, inner));
    out.push_str(&format!("{indent}{}\n", clean_line(meta.trim_end(), inner)));
    let trail = clean_line(&article.trail_text, inner);
    if !trail.is_empty() {
        out.push_str(&format!("{indent}{trail}\n"));
    }
    out
}

/// The whole screen for `state`.
pub fn render_state(state: &LoadState, width: usize) -> String {
    match state {
        LoadState::Idle => String::new(),
        LoadState::Loading => format!("{LOADING_MESSAGE}\n"),
        LoadState::Empty => format!("{EMPTY_MESSAGE}\n"),
        LoadState::Offline(e) => {
            format!("{OFFLINE_MESSAGE}\n{}\n", clean_line(&format!("({e})"), width))
        }
        LoadState::Error(e) => {
            format!("{EMPTY_MESSAGE}\n{}\n", clean_line(&format!("({e})"), width))
        }
        LoadState::Loaded(articles) => articles
            .iter()
            .enumerate()
            .map(|(i, a)| render_article(i, a, width))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::{Thumbnail, UNKNOWN_AUTHOR};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn article(date: &str) -> Article {
        Article {
            web_title: "Storm hits <em>coast</em>".into(),
            trail_text: "<p>Residents   told to &quot;stay inside&quot;</p>".into(),
            byline: UNKNOWN_AUTHOR.into(),
            section_name: "UK news".into(),
            web_publication_date: date.into(),
            web_url: "https://www.theguardian.com/uk/a".into(),
            thumbnail: None,
        }
    }

    #[test]
    fn test_format_date_and_time() {
        let a = article("2023-05-01T15:04:00Z");
        assert_eq!(format_date(&a), "May 01 '23");
        assert_eq!(format_time(&a), "3:04 PM");

        let morning = article("2021-12-09T09:30:00Z");
        assert_eq!(format_date(&morning), "Dec 09 '21");
        assert_eq!(format_time(&morning), "9:30 AM");
    }

    #[test]
    fn test_unparseable_date_falls_back_to_raw() {
        let a = article("yesterday");
        assert_eq!(format_date(&a), "yesterday");
        assert_eq!(format_time(&a), "");
    }

    #[test]
    fn test_render_article_cleans_text() {
        let out = render_article(0, &article("2023-05-01T15:04:00Z"), 80);
        assert_eq!(
            out,
            " 1. Storm hits coast\n    Unknown author | UK news | May 01 '23 3:04 PM\n    Residents told to \"stay inside\"\n"
        );
    }

    #[test]
    fn test_render_article_strips_escapes_and_truncates() {
        let mut a = article("2023-05-01T15:04:00Z");
        a.web_title = "\x1b[31mRed alert\x1b[0m across the whole country".into();
        let out = render_article(0, &a, 20);
        let first = out.lines().next().unwrap();
        assert_eq!(first, " 1. Red alert acr...");
    }

    #[test]
    fn test_render_article_marks_thumbnail() {
        let mut a = article("2023-05-01T15:04:00Z");
        a.thumbnail = Some(Thumbnail {
            source_url: "https://img.example.com/1000.jpg".into(),
            bytes: Arc::from(vec![1u8, 2, 3]),
            width: 1000,
            height: 600,
            format: None,
        });
        assert!(render_article(2, &a, 120).contains("[img 1000x600]"));
        assert!(render_article(2, &a, 120).starts_with(" 3. "));
    }

    #[test]
    fn test_render_states() {
        assert_eq!(render_state(&LoadState::Idle, 80), "");
        assert_eq!(render_state(&LoadState::Loading, 80), "Loading...\n");
        assert_eq!(render_state(&LoadState::Empty, 80), "No news found.\n");
        assert_eq!(
            render_state(&LoadState::Error("HTTP 503".into()), 80),
            "No news found.\n(HTTP 503)\n"
        );
        assert_eq!(
            render_state(&LoadState::Offline("Request timed out".into()), 80),
            "No internet connection.\n(Request timed out)\n"
        );

        let loaded = LoadState::Loaded(Arc::new(vec![
            article("2023-05-01T15:04:00Z"),
            article("2023-05-02T15:04:00Z"),
        ]));
        let out = render_state(&loaded, 80);
        assert!(out.contains(" 1. Storm hits coast"));
        assert!(out.contains(" 2. Storm hits coast"));
    }
}
