//! Scrape execution: fetch backends, selector evaluation and the worker
//! pool that drives them.

pub mod engine;
pub mod evaluator;
pub mod fetcher;

pub use engine::{Engine, RecordMap};
pub use fetcher::{BrowserFetcher, FetchError, Fetcher, HttpFetcher};

use crate::{Config, Result};

/// Runs a full scrape for a loaded configuration.
///
/// When `settings.javascript` is set, pages are rendered in a headless
/// browser: an existing one when a DevTools websocket URL is given, a
/// freshly launched one otherwise. Plain HTTP is used in every other case.
pub async fn run_scrape(config: Config, devtools_ws_url: Option<&str>) -> Result<()> {
    let Config { settings, sitemap } = config;
    if settings.javascript {
        let fetcher = match devtools_ws_url {
            Some(ws) => BrowserFetcher::connect(ws).await?,
            None => BrowserFetcher::launch(&settings).await?,
        };
        Engine::new(settings, fetcher)?.run(sitemap).await?;
    } else {
        let fetcher = HttpFetcher::new(&settings)?;
        Engine::new(settings, fetcher)?.run(sitemap).await?;
    }
    Ok(())
}
