//! Background article loading with stale-result protection.
//!
//! Each [`NewsLoader::restart`] bumps a generation counter, aborts the
//! previous in-flight load, and spawns a task that reports back over an
//! `mpsc` channel. [`NewsLoader::accept`] applies only results whose
//! generation is the latest, so a slow older load can never overwrite a newer
//! one regardless of completion order.

use crate::news::{Article, ArticleFetchPipeline, NewsError, QueryParams};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What the presentation layer should show.
#[derive(Debug, Clone, Default)]
pub enum LoadState {
    /// Nothing requested yet.
    #[default]
    Idle,
    Loading,
    Loaded(Arc<Vec<Article>>),
    /// The search succeeded with no results, or the server sent no data.
    Empty,
    /// The server could not be reached; holds the transport error.
    Offline(String),
    Error(String),
}

impl LoadState {
    pub fn from_result(result: Result<Vec<Article>, NewsError>) -> Self {
        match result {
            Ok(articles) if articles.is_empty() => LoadState::Empty,
            Ok(articles) => LoadState::Loaded(Arc::new(articles)),
            Err(e) if e.is_no_data() => LoadState::Empty,
            Err(e) if e.is_offline() => LoadState::Offline(e.to_string()),
            Err(e) => LoadState::Error(e.to_string()),
        }
    }

    pub fn articles(&self) -> &[Article] {
        match self {
            LoadState::Loaded(articles) => articles,
            _ => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

/// Events sent by background load tasks.
#[derive(Debug)]
pub enum LoaderEvent {
    Loaded {
        generation: u64,
        result: Result<Vec<Article>, NewsError>,
    },
    /// The load task panicked; `error` is the panic message.
    Panicked { generation: u64, error: String },
}

impl LoaderEvent {
    pub fn generation(&self) -> u64 {
        match self {
            LoaderEvent::Loaded { generation, .. } | LoaderEvent::Panicked { generation, .. } => {
                *generation
            }
        }
    }
}

pub struct NewsLoader {
    pipeline: Arc<ArticleFetchPipeline>,
    base_url: Arc<str>,
    event_tx: mpsc::Sender<LoaderEvent>,
    generation: u64,
    handle: Option<JoinHandle<()>>,
    state: LoadState,
}

impl NewsLoader {
    pub fn new(
        pipeline: Arc<ArticleFetchPipeline>,
        base_url: impl Into<Arc<str>>,
        event_tx: mpsc::Sender<LoaderEvent>,
    ) -> Self {
        Self {
            pipeline,
            base_url: base_url.into(),
            event_tx,
            generation: 0,
            handle: None,
            state: LoadState::Idle,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Generation of the most recent [`restart`](Self::restart).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts a new load, superseding any load still in flight.
    ///
    /// Returns the generation assigned to the new load.
    pub fn restart(&mut self, params: QueryParams) -> u64 {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!(generation = self.generation, "Aborted previous article load");
        }

        self.generation += 1;
        let generation = self.generation;
        self.state = LoadState::Loading;
        tracing::debug!(generation, "Starting article load");

        self.handle = Some(spawn_load(
            generation,
            Arc::clone(&self.pipeline),
            Arc::clone(&self.base_url),
            params,
            self.event_tx.clone(),
        ));

        generation
    }

    /// Applies a finished load if it belongs to the latest generation.
    ///
    /// Returns `true` when the state was replaced, `false` for a stale event.
    pub fn accept(&mut self, event: LoaderEvent) -> bool {
        let generation = event.generation();
        if generation != self.generation {
            tracing::debug!(
                expected = self.generation,
                got = generation,
                "Ignoring stale article load (generation mismatch)"
            );
            return false;
        }

        self.handle = None;
        self.state = match event {
            LoaderEvent::Loaded { result, .. } => LoadState::from_result(result),
            LoaderEvent::Panicked { error, .. } => {
                tracing::error!(generation, error = %error, "Article load task panicked");
                LoadState::Error(format!("Internal error: {error}"))
            }
        };
        true
    }
}

impl Drop for NewsLoader {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("Aborted article load on loader drop");
        }
    }
}

fn spawn_load(
    generation: u64,
    pipeline: Arc<ArticleFetchPipeline>,
    base_url: Arc<str>,
    params: QueryParams,
    tx: mpsc::Sender<LoaderEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = catch_task_panic(pipeline.fetch_articles(&base_url, &params)).await;

        let event = match outcome {
            Ok(result) => LoaderEvent::Loaded { generation, result },
            Err(error) => LoaderEvent::Panicked { generation, error },
        };

        if let Err(e) = tx.send(event).await {
            tracing::warn!(error = %e, generation, "Loader channel send failed (receiver dropped)");
        }
    })
}

/// Run `future`, turning a panic into its message.
async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::{FetchError, FetchSettings, HttpFetcher, ParseError, PipelineOptions};
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ONE_RESULT: &str = r#"{"response":{"results":[{"sectionName":"World","webPublicationDate":"2023-05-01T12:00:00Z","webTitle":"Fresh","webUrl":"https://x/fresh","fields":{"trailText":"t"}}]}}"#;
    const OLD_RESULT: &str = r#"{"response":{"results":[{"sectionName":"World","webPublicationDate":"2023-05-01T12:00:00Z","webTitle":"Stale","webUrl":"https://x/stale","fields":{"trailText":"t"}}]}}"#;

    fn loader(base_url: String) -> (NewsLoader, mpsc::Receiver<LoaderEvent>) {
        let fetcher = HttpFetcher::new(FetchSettings::default()).unwrap();
        let pipeline = Arc::new(ArticleFetchPipeline::new(fetcher, PipelineOptions::default()));
        let (tx, rx) = mpsc::channel(8);
        (NewsLoader::new(pipeline, base_url, tx), rx)
    }

    fn params(q: &str) -> QueryParams {
        [("q", q)].into_iter().collect()
    }

    #[tokio::test]
    async fn test_restart_loads_articles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ONE_RESULT))
            .mount(&server)
            .await;

        let (mut loader, mut rx) = loader(format!("{}/search", server.uri()));
        assert!(matches!(loader.state(), LoadState::Idle));

        let generation = loader.restart(params("news"));
        assert_eq!(generation, 1);
        assert!(loader.state().is_loading());

        let event = rx.recv().await.unwrap();
        assert!(loader.accept(event));
        assert_eq!(loader.state().articles().len(), 1);
        assert_eq!(loader.state().articles()[0].web_title, "Fresh");
    }

    #[tokio::test]
    async fn test_stale_generation_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "new"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ONE_RESULT))
            .mount(&server)
            .await;

        let (mut loader, mut rx) = loader(format!("{}/search", server.uri()));
        loader.restart(params("old"));
        loader.restart(params("new"));

        // A late result from the first generation must not replace anything.
        let stale = LoaderEvent::Loaded {
            generation: 1,
            result: Ok(Vec::new()),
        };
        assert!(!loader.accept(stale));
        assert!(loader.state().is_loading());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.generation(), 2);
        assert!(loader.accept(event));
        assert_eq!(loader.state().articles()[0].web_title, "Fresh");
    }

    #[tokio::test]
    async fn test_slow_superseded_load_never_wins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(OLD_RESULT)
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "fast"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ONE_RESULT))
            .mount(&server)
            .await;

        let (mut loader, mut rx) = loader(format!("{}/search", server.uri()));
        loader.restart(params("slow"));
        loader.restart(params("fast"));

        let event = rx.recv().await.unwrap();
        assert!(loader.accept(event));
        assert_eq!(loader.state().articles()[0].web_title, "Fresh");

        // The aborted slow load never reports back.
        let late = tokio::time::timeout(Duration::from_millis(400), rx.recv()).await;
        assert!(late.is_err(), "superseded load should have been aborted");
    }

    #[tokio::test]
    async fn test_http_error_becomes_error_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (mut loader, mut rx) = loader(format!("{}/search", server.uri()));
        loader.restart(QueryParams::new());

        let event = rx.recv().await.unwrap();
        match &event {
            LoaderEvent::Loaded {
                result: Err(NewsError::Fetch(FetchError::HttpStatus(404))),
                ..
            } => {}
            _ => panic!("expected HttpStatus(404)"),
        }
        assert!(loader.accept(event));
        assert!(matches!(loader.state(), LoadState::Error(msg) if msg.contains("404")));
        assert!(loader.state().articles().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_becomes_offline_state() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let (mut loader, mut rx) = loader(format!("http://127.0.0.1:{port}/search"));
        loader.restart(params("news"));

        let event = rx.recv().await.unwrap();
        assert!(loader.accept(event));
        assert!(matches!(loader.state(), LoadState::Offline(_)));
        assert!(loader.state().articles().is_empty());
    }

    #[test]
    fn test_state_from_result() {
        assert!(matches!(LoadState::from_result(Ok(Vec::new())), LoadState::Empty));
        assert!(matches!(
            LoadState::from_result(Err(NewsError::Parse(ParseError::NoData))),
            LoadState::Empty
        ));
        assert!(matches!(
            LoadState::from_result(Err(NewsError::Parse(ParseError::MalformedJson("x".into())))),
            LoadState::Error(_)
        ));
        assert!(matches!(
            LoadState::from_result(Err(NewsError::Fetch(FetchError::Timeout))),
            LoadState::Offline(_)
        ));
        assert!(matches!(
            LoadState::from_result(Err(NewsError::Fetch(FetchError::HttpStatus(503)))),
            LoadState::Error(_)
        ));
    }

    #[test]
    fn test_panic_event_becomes_error() {
        let (mut loader, _rx) = loader("https://example.com/search".to_string());
        loader.generation = 3;

        let accepted = loader.accept(LoaderEvent::Panicked {
            generation: 3,
            error: "boom".into(),
        });
        assert!(accepted);
        assert!(matches!(loader.state(), LoadState::Error(msg) if msg.contains("boom")));
    }

    #[tokio::test]
    async fn test_catch_task_panic_reports_message() {
        let result: Result<(), String> = catch_task_panic(async { panic!("kaboom") }).await;
        assert_eq!(result.unwrap_err(), "kaboom");
    }
}
