use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Byline used when the source omits one or sends `null`.
pub const UNKNOWN_AUTHOR: &str = "Unknown author";

/// A decoded, verified thumbnail image.
///
/// Only built after the bytes decoded successfully, so holding a `Thumbnail`
/// means the image is usable.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    /// URL that produced the image (the high-resolution variant or the original).
    pub source_url: String,
    /// Encoded image bytes as downloaded (Arc for cheap clones across list refreshes)
    pub bytes: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub format: Option<image::ImageFormat>,
}

/// Article fields as extracted from one search result, before thumbnail resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArticle {
    pub web_title: String,
    pub trail_text: String,
    pub byline: String,
    pub section_name: String,
    pub web_publication_date: String,
    pub web_url: String,
    /// Thumbnail URL from `fields.thumbnail`; `None` means no resolution attempt.
    pub thumbnail_url: Option<String>,
}

/// A completed article ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub web_title: String,
    pub trail_text: String,
    pub byline: String,
    pub section_name: String,
    /// ISO-8601 UTC timestamp, kept exactly as the API sent it.
    pub web_publication_date: String,
    pub web_url: String,
    pub thumbnail: Option<Thumbnail>,
}

impl Article {
    pub fn from_parsed(parsed: ParsedArticle, thumbnail: Option<Thumbnail>) -> Self {
        Self {
            web_title: parsed.web_title,
            trail_text: parsed.trail_text,
            byline: parsed.byline,
            section_name: parsed.section_name,
            web_publication_date: parsed.web_publication_date,
            web_url: parsed.web_url,
            thumbnail,
        }
    }

    /// Publication time, or `None` if the stored string is not RFC 3339.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.web_publication_date)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
