use crate::news::article::{ParsedArticle, UNKNOWN_AUTHOR};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The body was empty, so there is nothing to parse.
    #[error("No data in response")]
    NoData,
    /// The body is not JSON, or does not have the expected shape.
    #[error("Malformed JSON: {0}")]
    MalformedJson(String),
}

/// What to do with a result entry that is missing a required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ParsePolicy {
    /// Abort the whole parse on the first malformed entry.
    #[default]
    Strict,
    /// Drop malformed entries and count them in [`ParseResult::skipped`].
    SkipInvalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub articles: Vec<ParsedArticle>,
    /// Entries dropped under [`ParsePolicy::SkipInvalid`]. Always 0 in strict mode.
    pub skipped: usize,
}

#[derive(Deserialize)]
struct SearchEnvelope {
    response: SearchBody,
}

#[derive(Deserialize)]
struct SearchBody {
    // Kept as raw values so one bad entry can be reported (or skipped) on its own.
    results: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    section_name: String,
    web_publication_date: String,
    web_title: String,
    web_url: String,
    fields: ResultFields,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultFields {
    trail_text: String,
    #[serde(default)]
    byline: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

impl From<SearchResult> for ParsedArticle {
    fn from(result: SearchResult) -> Self {
        ParsedArticle {
            web_title: result.web_title,
            trail_text: result.fields.trail_text,
            byline: result
                .fields
                .byline
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            section_name: result.section_name,
            web_publication_date: result.web_publication_date,
            web_url: result.web_url,
            thumbnail_url: result.fields.thumbnail,
        }
    }
}

/// Parses a search response body into articles, in input order.
///
/// Expects `{ "response": { "results": [ ... ] } }`. Each result must carry
/// `sectionName`, `webPublicationDate`, `webTitle`, `webUrl` and
/// `fields.trailText`; `fields.byline` defaults to [`UNKNOWN_AUTHOR`] and
/// `fields.thumbnail` is optional.
///
/// # Errors
///
/// - [`ParseError::NoData`] if `body` is empty or whitespace
/// - [`ParseError::MalformedJson`] if the envelope does not match, or if any
///   entry is malformed under [`ParsePolicy::Strict`]
pub fn parse_response(body: &str, policy: ParsePolicy) -> Result<ParseResult, ParseError> {
    if body.trim().is_empty() {
        return Err(ParseError::NoData);
    }

    let envelope: SearchEnvelope =
        serde_json::from_str(body).map_err(|e| ParseError::MalformedJson(e.to_string()))?;

    let mut articles = Vec::with_capacity(envelope.response.results.len());
    let mut skipped = 0;

    for (index, value) in envelope.response.results.into_iter().enumerate() {
        match serde_json::from_value::<SearchResult>(value) {
            Ok(result) => articles.push(ParsedArticle::from(result)),
            Err(e) => match policy {
                ParsePolicy::Strict => {
                    return Err(ParseError::MalformedJson(format!("result {index}: {e}")));
                }
                ParsePolicy::SkipInvalid => {
                    tracing::debug!(index, error = %e, "Skipping malformed search result");
                    skipped += 1;
                }
            },
        }
    }

    Ok(ParseResult { articles, skipped })
}
