use std::time::Duration;

/// One request counter's budget: how many requests may be made before the
/// engine pauses, and for how long it pauses.
///
/// A `requests` threshold of zero disables the counter entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u32,
    pub delay: Duration,
}

impl RateLimit {
    pub const fn new(requests: u32, delay: Duration) -> Self {
        Self { requests, delay }
    }

    /// A disabled limit: never pauses.
    pub const fn unlimited() -> Self {
        Self { requests: 0, delay: Duration::ZERO }
    }
}

/// Knobs for one discovery pass.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Re-process chapters that are already cached instead of skipping them.
    pub reindex: bool,
    /// Budget for heavy page-location requests.
    pub page_requests: RateLimit,
    /// Budget for everything else (chapter listing, series lookup).
    pub general_requests: RateLimit,
    /// Track chapters hosted off-site instead of rejecting them.
    pub include_external: bool,
    /// Translated languages to fetch; empty fetches all languages.
    pub languages: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            reindex: false,
            page_requests: RateLimit::new(35, Duration::from_secs(60)),
            general_requests: RateLimit::new(3, Duration::from_secs(3)),
            include_external: false,
            languages: vec![mdwatch_feed::DEFAULT_LANGUAGE.to_string()],
        }
    }
}
