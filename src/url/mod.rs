//! URL handling: range-pattern expansion, validity checks, href resolution
//!
//! Seed URL patterns may carry a trailing numeric range suffix such as
//! `https://x/page/[1-20]`. [`expand_pattern`] turns a pattern into a lazy,
//! ordered iterator of concrete URLs; the feeder pulls from it while pushing
//! into a bounded job channel, so expansion blocks on downstream capacity
//! instead of materializing the whole range.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static RANGE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d{1,10})-(\d{1,10})\]$").expect("range suffix regex"));

/// Lazy expansion of one seed URL pattern.
///
/// Yields each concrete URL exactly once, in ascending range order. A pattern
/// without a range suffix yields itself once.
#[derive(Debug)]
pub enum UrlExpansion {
    Single(Option<String>),
    Range {
        prefix: String,
        next: u64,
        high: u64,
    },
}

impl Iterator for UrlExpansion {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match self {
            UrlExpansion::Single(url) => url.take(),
            UrlExpansion::Range { prefix, next, high } => {
                if *next > *high {
                    return None;
                }
                let url = format!("{}{}", prefix, next);
                *next += 1;
                Some(url)
            }
        }
    }
}

/// Expands a seed URL pattern into a lazy sequence of concrete URLs.
///
/// A trailing `[<low>-<high>]` suffix emits one URL per integer in
/// `[low, high]` inclusive, the bracket expression replaced by the decimal
/// value without padding. Bounds that fail to parse are treated as 0. An
/// empty range (`low > high`) emits nothing.
pub fn expand_pattern(pattern: &str) -> UrlExpansion {
    match RANGE_SUFFIX.captures(pattern) {
        Some(caps) => {
            let suffix = caps.get(0).expect("whole match");
            let low = caps[1].parse::<u64>().unwrap_or(0);
            let high = caps[2].parse::<u64>().unwrap_or(0);
            UrlExpansion::Range {
                prefix: pattern[..suffix.start()].to_string(),
                next: low,
                high,
            }
        }
        None => UrlExpansion::Single(Some(pattern.to_string())),
    }
}

/// Syntactic validity check applied by the feeder before a URL becomes a job.
/// Invalid URLs are discarded with a log line, never an error.
pub fn is_valid_url(candidate: &str) -> bool {
    Url::parse(candidate).is_ok()
}

/// Resolves an href against the URL of the document it appeared on.
///
/// Unparseable inputs resolve to an empty string, mirroring the "missing
/// attribute becomes empty" policy for link-like selectors.
pub fn resolve_href(href: &str, base_url: &str) -> String {
    let Ok(base) = Url::parse(base_url) else {
        tracing::debug!(base_url, "unparseable base URL");
        return String::new();
    };
    match base.join(href) {
        Ok(resolved) => resolved.to_string(),
        Err(e) => {
            tracing::debug!(href, %e, "unresolvable href");
            String::new()
        }
    }
}
