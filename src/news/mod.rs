//! News search client: request building, fetching, parsing and thumbnails.
//!
//! Data flows one way through the submodules:
//!
//! - [`query`] - Ordered query parameters and request URL construction
//! - [`fetcher`] - Single timed HTTP GET with typed failures
//! - [`parser`] - Search response JSON into [`ParsedArticle`] records
//! - [`thumbnail`] - High-resolution-first thumbnail download with fallback
//! - [`pipeline`] - The four steps above as one call
//!
//! # Example
//!
//! ```ignore
//! use newsfeed::news::{ArticleFetchPipeline, FetchSettings, HttpFetcher, PipelineOptions};
//!
//! let fetcher = HttpFetcher::new(FetchSettings::default())?;
//! let pipeline = ArticleFetchPipeline::new(fetcher, PipelineOptions::default());
//! let articles = pipeline.fetch_articles(DEFAULT_BASE_URL, &query.to_params()).await?;
//! ```

mod article;
mod fetcher;
mod parser;
mod pipeline;
mod query;
mod thumbnail;

pub use article::{Article, ParsedArticle, Thumbnail, UNKNOWN_AUTHOR};
pub use fetcher::{
    FetchError, FetchSettings, HttpFetcher, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT,
};
pub use parser::{parse_response, ParseError, ParsePolicy, ParseResult};
pub use pipeline::{ArticleFetchPipeline, NewsError, PipelineOptions};
pub use query::{
    build_url, OrderBy, QueryParams, SearchQuery, DEFAULT_BASE_URL, DEFAULT_SHOW_FIELDS,
};
pub use thumbnail::{high_res_url, ThumbnailResolver};
