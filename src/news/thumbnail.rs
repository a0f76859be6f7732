use crate::news::article::Thumbnail;
use crate::news::fetcher::{FetchError, HttpFetcher};
use thiserror::Error;
use url::Url;

/// File name of the 1000px rendition served next to the original thumbnail.
const HIGH_RES_SEGMENT: &str = "1000.jpg";

#[derive(Debug, Error)]
enum ImageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image decode task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Returns the high-resolution variant of a thumbnail URL.
///
/// Everything after the last `/` is replaced with `1000.jpg`; the query and
/// fragment are dropped with the file name. Returns `None` if the URL cannot
/// be parsed or has no path.
pub fn high_res_url(original: &str) -> Option<String> {
    let mut url = Url::parse(original).ok()?;
    {
        let mut segments = url.path_segments_mut().ok()?;
        segments.pop().push(HIGH_RES_SEGMENT);
    }
    url.set_query(None);
    url.set_fragment(None);
    Some(url.into())
}

/// Downloads the best available thumbnail for an article.
///
/// Tries the 1000px variant first and silently falls back to the original
/// URL. Both attempts go through the shared [`HttpFetcher`], so they are
/// bounded by the same timeouts and size limit as the search request.
#[derive(Debug, Clone)]
pub struct ThumbnailResolver {
    fetcher: HttpFetcher,
}

impl ThumbnailResolver {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }

    /// Resolves `original_url` to a decoded image, or `None` if neither URL works.
    ///
    /// An empty URL returns `None` without any request. Failures are logged and
    /// never propagated: a missing thumbnail is a valid outcome.
    pub async fn resolve(&self, original_url: &str) -> Option<Thumbnail> {
        if original_url.is_empty() {
            return None;
        }

        if let Some(candidate) = high_res_url(original_url) {
            if candidate != original_url {
                match self.download(&candidate).await {
                    Ok(thumbnail) => return Some(thumbnail),
                    Err(e) => {
                        tracing::debug!(
                            url = %candidate,
                            error = %e,
                            "High-resolution thumbnail unavailable, falling back to original"
                        );
                    }
                }
            }
        }

        match self.download(original_url).await {
            Ok(thumbnail) => Some(thumbnail),
            Err(e) => {
                tracing::debug!(url = %original_url, error = %e, "Thumbnail unavailable");
                None
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Thumbnail, ImageError> {
        let bytes = self.fetcher.fetch_bytes(url).await?;
        let source_url = url.to_string();
        // Decoding is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || decode(source_url, bytes)).await?
    }
}

fn decode(source_url: String, bytes: Vec<u8>) -> Result<Thumbnail, ImageError> {
    let format = image::guess_format(&bytes).ok();
    let decoded = image::load_from_memory(&bytes)?;

    Ok(Thumbnail {
        source_url,
        width: decoded.width(),
        height: decoded.height(),
        format,
        bytes: bytes.into(),
    })
}
