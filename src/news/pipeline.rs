use crate::news::article::Article;
use crate::news::fetcher::{FetchError, HttpFetcher};
use crate::news::parser::{parse_response, ParseError, ParsePolicy, ParseResult};
use crate::news::query::{build_url, QueryParams};
use crate::news::thumbnail::ThumbnailResolver;
use futures::stream::{self, StreamExt};
use thiserror::Error;

/// Any failure of a pipeline run. Thumbnail failures never appear here.
#[derive(Debug, Error)]
pub enum NewsError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl NewsError {
    /// True when the server answered with an empty body.
    pub fn is_no_data(&self) -> bool {
        matches!(self, NewsError::Parse(ParseError::NoData))
    }

    /// True when the server could not be reached or the transfer broke off.
    pub fn is_offline(&self) -> bool {
        matches!(self, NewsError::Fetch(e) if e.is_transport())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub parse_policy: ParsePolicy,
    /// Maximum thumbnails downloaded at once. 1 resolves them one after another.
    pub thumbnail_concurrency: usize,
    /// When false, thumbnail URLs are ignored and no image requests are made.
    pub resolve_thumbnails: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            parse_policy: ParsePolicy::Strict,
            thumbnail_concurrency: 4,
            resolve_thumbnails: true,
        }
    }
}

/// Runs one search: build URL, fetch, parse, then resolve thumbnails.
#[derive(Debug, Clone)]
pub struct ArticleFetchPipeline {
    fetcher: HttpFetcher,
    resolver: ThumbnailResolver,
    options: PipelineOptions,
}

impl ArticleFetchPipeline {
    pub fn new(fetcher: HttpFetcher, options: PipelineOptions) -> Self {
        let resolver = ThumbnailResolver::new(fetcher.clone());
        Self {
            fetcher,
            resolver,
            options,
        }
    }

    /// Fetches and completes the articles for one search.
    ///
    /// Articles come back in response order. Thumbnails are resolved
    /// concurrently (up to `thumbnail_concurrency` at a time); each resolution
    /// is independent and a failed one only leaves that article without a
    /// thumbnail.
    ///
    /// # Errors
    ///
    /// - [`NewsError::Fetch`] if the URL is invalid or the request fails;
    ///   parsing is not attempted
    /// - [`NewsError::Parse`] for an empty body ([`ParseError::NoData`]) or a
    ///   malformed one
    pub async fn fetch_articles(
        &self,
        base_url: &str,
        params: &QueryParams,
    ) -> Result<Vec<Article>, NewsError> {
        let url = build_url(base_url, params)?;
        tracing::debug!(base_url = %base_url, params = params.len(), "Fetching articles");

        let body = self.fetcher.fetch(url.as_str()).await?;

        let ParseResult { articles, skipped } = parse_response(&body, self.options.parse_policy)?;
        if skipped > 0 {
            tracing::warn!(
                base_url = %base_url,
                skipped = skipped,
                "Malformed search results skipped"
            );
        }

        let resolve = self.options.resolve_thumbnails;
        let concurrency = self.options.thumbnail_concurrency.max(1);

        // `buffered` (not `buffer_unordered`) keeps the response order.
        let completed: Vec<Article> = stream::iter(articles)
            .map(|parsed| {
                let resolver = &self.resolver;
                async move {
                    let thumbnail = match parsed.thumbnail_url.as_deref() {
                        Some(url) if resolve => resolver.resolve(url).await,
                        _ => None,
                    };
                    Article::from_parsed(parsed, thumbnail)
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        tracing::info!(
            articles = completed.len(),
            thumbnails = completed.iter().filter(|a| a.thumbnail.is_some()).count(),
            "Articles loaded"
        );

        Ok(completed)
    }

    /// Like [`fetch_articles`](Self::fetch_articles), but logs any failure and
    /// returns an empty list, for callers that only render "nothing to show".
    pub async fn fetch_articles_or_empty(
        &self,
        base_url: &str,
        params: &QueryParams,
    ) -> Vec<Article> {
        match self.fetch_articles(base_url, params).await {
            Ok(articles) => articles,
            Err(e) if e.is_no_data() => {
                tracing::info!(base_url = %base_url, "Search returned no data");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(base_url = %base_url, error = %e, "Article fetch failed");
                Vec::new()
            }
        }
    }
}
