use anyhow::{Context, Result};
use clap::Parser;
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use newsfeed::config::Config;
use newsfeed::display::render_state;
use newsfeed::loader::{LoadState, NewsLoader};
use newsfeed::news::{ArticleFetchPipeline, HttpFetcher, OrderBy, ParsePolicy};
use newsfeed::util::validate_url_for_open;

/// Output width used when the terminal size is unknown.
const DEFAULT_WIDTH: usize = 100;

/// Get the config directory path (~/.config/newsfeed/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("newsfeed"))
}

/// Usable width from a `crossterm::terminal::size()` result.
fn width_from_size(size: std::io::Result<(u16, u16)>) -> usize {
    match size {
        Ok((cols, _)) if cols > 0 => cols as usize,
        Ok(_) => DEFAULT_WIDTH,
        Err(e) => {
            tracing::debug!(error = %e, "Terminal size unavailable, using default width");
            DEFAULT_WIDTH
        }
    }
}

fn terminal_width() -> usize {
    width_from_size(crossterm::terminal::size())
}

/// Clears the screen and homes the cursor before a refreshed list is printed.
fn clear_screen() -> Result<()> {
    let mut stdout = std::io::stdout();
    execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))
        .context("Failed to clear terminal")?;
    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "newsfeed", about = "Terminal reader for the Guardian content search API")]
struct Args {
    /// Config file (default: ~/.config/newsfeed/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Topic searched when --search is not given
    #[arg(long)]
    topic: Option<String>,

    /// Free-text search; overrides the topic when non-empty
    #[arg(long, short = 's')]
    search: Option<String>,

    /// Results per request (1-200)
    #[arg(long, value_name = "N")]
    page_size: Option<u32>,

    #[arg(long, value_enum)]
    order_by: Option<OrderBy>,

    /// Abort the whole search on the first malformed result
    #[arg(long, conflicts_with = "skip_invalid")]
    strict: bool,

    /// Drop malformed results and keep the rest
    #[arg(long)]
    skip_invalid: bool,

    /// Do not download thumbnails
    #[arg(long)]
    no_thumbnails: bool,

    /// Re-run the search every SECS seconds until Ctrl-C
    #[arg(long, value_name = "SECS", conflicts_with = "open")]
    refresh: Option<u64>,

    /// Open the Nth listed article (1-based) in the browser after loading
    #[arg(long, value_name = "N")]
    open: Option<usize>,
}

impl Args {
    fn apply_to(&self, config: &mut Config) {
        if let Some(topic) = &self.topic {
            config.topic = topic.clone();
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(order_by) = self.order_by {
            config.order_by = order_by;
        }
        if self.strict {
            config.parse_policy = ParsePolicy::Strict;
        }
        if self.skip_invalid {
            config.parse_policy = ParsePolicy::SkipInvalid;
        }
        if self.no_thumbnails {
            config.fetch_thumbnails = false;
        }
        if let Some(secs) = self.refresh {
            config.refresh_interval_secs = secs;
        }
    }
}

/// Opens the `n`th (1-based) article of a finished load.
fn open_article(state: &LoadState, n: usize) -> Result<()> {
    let article = n
        .checked_sub(1)
        .and_then(|i| state.articles().get(i))
        .with_context(|| format!("No article #{n} in the results"))?;

    let url = validate_url_for_open(&article.web_url)
        .with_context(|| format!("Refusing to open '{}'", article.web_url))?;
    open::that(url.as_str()).context("Failed to open browser")?;
    eprintln!("Opened {}", url);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_config_dir()?.join("config.toml"),
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    args.apply_to(&mut config);
    config.validate().context("Invalid settings")?;
    tracing::debug!(?config, "Effective configuration");

    let fetcher =
        HttpFetcher::new(config.fetch_settings()).context("Failed to create HTTP client")?;
    let pipeline = Arc::new(ArticleFetchPipeline::new(
        fetcher,
        config.pipeline_options(),
    ));

    let query = config.search_query(config.resolved_api_key(), args.search.clone());
    tracing::info!(term = %query.effective_term(), "Searching");
    let params = query.to_params();

    let (event_tx, mut event_rx) = mpsc::channel(16);
    let mut loader = NewsLoader::new(pipeline, config.base_url.as_str(), event_tx);

    loader.restart(params.clone());
    print!("{}", render_state(loader.state(), terminal_width()));

    let refresh = (config.refresh_interval_secs > 0)
        .then(|| Duration::from_secs(config.refresh_interval_secs));
    let mut ticker = refresh.map(|period| {
        tokio::time::interval_at(tokio::time::Instant::now() + period, period)
    });
    let refreshing = ticker.is_some();

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                if loader.accept(event) {
                    if refreshing {
                        clear_screen()?;
                    } else {
                        println!();
                    }
                    print!("{}", render_state(loader.state(), terminal_width()));
                    if !refreshing {
                        break;
                    }
                }
            }
            _ = async {
                match ticker.as_mut() {
                    Some(t) => { t.tick().await; }
                    None => std::future::pending::<()>().await,
                }
            } => {
                tracing::debug!("Refreshing");
                loader.restart(params.clone());
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    if let Some(n) = args.open {
        open_article(loader.state(), n)?;
    }

    Ok(())
}
