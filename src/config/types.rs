use crate::sitemap::SiteMap;
use serde::{Deserialize, Serialize};

/// Top-level configuration document: process settings plus one sitemap.
///
/// The on-disk format is a single JSON file; an external editor owns it
/// between runs, so the engine reads it once at startup and never writes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub settings: Settings,
    pub sitemap: SiteMap,
}

/// Process-wide scrape settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Fetch pages through a headless browser so JS-rendered content is
    /// visible to the selectors.
    #[serde(default)]
    pub javascript: bool,

    /// Worker pool size; also the bound of the job and result channels.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Export format: "json", "xml" or "csv" (case-insensitive). Anything
    /// else is a fatal configuration error.
    pub export: String,

    /// User agents to scrape with. Only the first entry is ever applied; see
    /// the worker loop for why the rest are carried but unused.
    #[serde(rename = "userAgents", default)]
    pub user_agents: Vec<String>,

    /// Proxy URLs. Only element 0 is consulted on the scrape path.
    #[serde(default)]
    pub proxy: Vec<String>,

    /// Speech-API key for the CAPTCHA-solving fetch backend. Carried for that
    /// backend only; the core never reads it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha: Option<String>,

    /// When set, log output goes to `log_file` instead of stderr.
    #[serde(default)]
    pub log: bool,

    #[serde(rename = "log_file", default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,

    /// Path of the export file. Truncated at scrape start.
    #[serde(rename = "output_filename")]
    pub output_file: String,
}

fn default_workers() -> usize {
    4
}

impl Settings {
    /// The user agent applied to every fetch. The settings accept a list, but
    /// the reference scrape loop only ever consumed the first entry, and that
    /// behavior is reproduced rather than silently upgraded to rotation.
    pub fn active_user_agent(&self) -> &str {
        self.user_agents.first().map(String::as_str).unwrap_or("")
    }

    /// The proxy applied to every fetch, when configured.
    pub fn active_proxy(&self) -> Option<&str> {
        self.proxy.first().map(String::as_str)
    }
}
