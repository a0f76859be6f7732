use crate::news::fetcher::FetchError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

/// Default search endpoint of the Guardian content API.
pub const DEFAULT_BASE_URL: &str = "https://content.guardianapis.com/search";

/// Fields requested from the API so trail text, byline and thumbnail are present.
pub const DEFAULT_SHOW_FIELDS: &str = "trailText,byline,thumbnail";

/// Ordered list of query-string pairs.
///
/// Insertion order is preserved and duplicate keys are kept, so the built URL
/// carries exactly the pairs that were pushed, in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Builds a request URL from a base endpoint and ordered query parameters.
///
/// Each pair is form-urlencoded and appended after any query already present
/// on `base_url`. Parameter values are not validated.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] if `base_url` cannot be parsed.
pub fn build_url(base_url: &str, params: &QueryParams) -> Result<Url, FetchError> {
    let mut url =
        Url::parse(base_url).map_err(|e| FetchError::InvalidUrl(format!("{base_url}: {e}")))?;

    if !params.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, value) in params.iter() {
            query.append_pair(key, value);
        }
    }

    Ok(url)
}

/// Sort order accepted by the search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    #[default]
    Newest,
    Oldest,
    Relevance,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::Newest => "newest",
            OrderBy::Oldest => "oldest",
            OrderBy::Relevance => "relevance",
        }
    }
}

/// User-facing search settings, turned into API parameters by [`SearchQuery::to_params`].
#[derive(Clone)]
pub struct SearchQuery {
    pub api_key: SecretString,
    pub page_size: u32,
    pub order_by: OrderBy,
    pub show_fields: String,
    pub topic: String,
    /// Free-text search term; replaces `topic` in the request when non-empty.
    pub search: Option<String>,
}

impl std::fmt::Debug for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchQuery")
            .field("api_key", &"[REDACTED]")
            .field("page_size", &self.page_size)
            .field("order_by", &self.order_by)
            .field("show_fields", &self.show_fields)
            .field("topic", &self.topic)
            .field("search", &self.search)
            .finish()
    }
}

impl SearchQuery {
    /// The term sent as `q`: the search text if it has content, else the topic.
    pub fn effective_term(&self) -> &str {
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => term,
            _ => &self.topic,
        }
    }

    /// Request parameters in the order the endpoint documents them.
    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params
            .push("api-key", self.api_key.expose_secret())
            .push("page-size", self.page_size.to_string())
            .push("order-by", self.order_by.as_str())
            .push("show-fields", self.show_fields.as_str())
            .push("q", self.effective_term());
        params
    }
}
