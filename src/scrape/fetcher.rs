//! Fetch backends
//!
//! The engine only needs `fetch(url, user_agent) -> body or failure`. Two
//! backends satisfy that contract: a plain HTTP fetch ([`HttpFetcher`]) and a
//! headless-browser fetch ([`BrowserFetcher`]) that substitutes the rendered
//! DOM for the raw body, which is indistinguishable to the selector
//! evaluator. Anti-bot automation lives entirely behind this boundary.

use crate::config::Settings;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Errors from a fetch backend. Always recovered locally: the worker logs
/// the error and drops the job.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed for {url}: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("Browser error for {url}: {message}")]
    Browser { url: String, message: String },

    #[error("Failed to start browser session: {0}")]
    BrowserSession(String),
}

/// Turns a URL into a page body.
///
/// Implementations are cloned into every worker task; clones must share the
/// underlying client or browser session.
pub trait Fetcher: Send + Sync + Clone + 'static {
    fn fetch(
        &self,
        url: &str,
        user_agent: &str,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Plain HTTP fetch backend.
///
/// The response body is returned as-is regardless of status code; a page of
/// error HTML simply matches no selectors. Only transport failures count as
/// fetch failures.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds the shared client. Only `proxy[0]` is consulted; the rest of
    /// the proxy list is carried but unused on the scrape path.
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let mut builder = Client::builder().gzip(true).brotli(true);
        if let Some(proxy) = settings.active_proxy() {
            builder = builder.proxy(reqwest::Proxy::all(proxy).map_err(FetchError::Client)?);
        }
        let client = builder.build().map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, user_agent: &str) -> Result<String, FetchError> {
        let mut request = self.client.get(url);
        if !user_agent.is_empty() {
            request = request.header(USER_AGENT, user_agent);
        }
        let response = request.send().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;
        response.text().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })
    }
}

/// Headless-browser fetch backend using Chromium over the DevTools protocol.
///
/// One Chromium session is shared across all clones; each fetch opens a tab,
/// waits for the body to render, grabs the DOM and closes the tab. No
/// navigation timeout is applied: a stalled page blocks its worker, matching
/// the engine-wide "termination by input exhaustion only" policy.
#[derive(Clone)]
pub struct BrowserFetcher {
    browser: Arc<Browser>,
}

impl BrowserFetcher {
    /// Launches a local headless Chromium.
    pub async fn launch(settings: &Settings) -> Result<Self, FetchError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if let Some(proxy) = settings.active_proxy() {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }
        let config = builder
            .build()
            .map_err(FetchError::BrowserSession)?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::BrowserSession(e.to_string()))?;
        Ok(Self::with_handler(browser, handler))
    }

    /// Attaches to an already-running browser through its DevTools websocket
    /// address, e.g. a remote debugger set up for CAPTCHA interaction.
    pub async fn connect(devtools_ws_url: &str) -> Result<Self, FetchError> {
        let (browser, handler) = Browser::connect(devtools_ws_url)
            .await
            .map_err(|e| FetchError::BrowserSession(e.to_string()))?;
        Ok(Self::with_handler(browser, handler))
    }

    fn with_handler(browser: Browser, mut handler: chromiumoxide::Handler) -> Self {
        // The CDP event stream must be polled continuously for the
        // connection to stay alive.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!(?event, "browser CDP handler error");
                    break;
                }
            }
        });
        Self {
            browser: Arc::new(browser),
        }
    }
}

impl Fetcher for BrowserFetcher {
    async fn fetch(&self, url: &str, user_agent: &str) -> Result<String, FetchError> {
        let browser_err = |message: String| FetchError::Browser {
            url: url.to_string(),
            message,
        };

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| browser_err(format!("failed to open tab: {e}")))?;

        if !user_agent.is_empty() {
            page.set_user_agent(user_agent)
                .await
                .map_err(|e| browser_err(format!("failed to set user agent: {e}")))?;
        }

        let result = async {
            page.goto(url)
                .await
                .map_err(|e| browser_err(format!("navigation failed: {e}")))?;
            // Rendered <body> is the minimal signal that the page is usable.
            page.find_element("body")
                .await
                .map_err(|e| browser_err(format!("page did not render a body: {e}")))?;
            page.content()
                .await
                .map_err(|e| browser_err(format!("failed to read page content: {e}")))
        }
        .await;

        let _ = page.close().await;
        result
    }
}
