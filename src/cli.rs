use clap::Parser;
use mdwatch_latest::{FetchSettings, RateLimit};
use std::path::PathBuf;
use std::time::Duration;

/// Watch the MangaDex chapter feed and publish new chapters to NATS.
#[derive(Debug, Parser)]
#[command(name = "mdwatch", version)]
pub struct Args {
    /// Configuration file to load instead of the platform default.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// How many seconds to wait between discovery passes.
    #[arg(short, long, default_value_t = 60)]
    pub wait: u64,

    /// Re-process chapters that have already been cached.
    #[arg(short, long)]
    pub reindex: bool,

    /// Track chapters hosted off-site instead of rejecting them.
    #[arg(short = 'e', long)]
    pub include_external: bool,

    /// Languages to fetch chapters for (comma separated; empty fetches all).
    #[arg(short, long, default_value = "en", value_delimiter = ',')]
    pub languages: Vec<String>,

    /// Page-location requests allowed before the heavy pause (0 disables).
    #[arg(short = 'p', long, default_value_t = 35)]
    pub page_requests: u32,

    /// Seconds the heavy rate-limit pause lasts.
    #[arg(short = 's', long, default_value_t = 60)]
    pub page_requests_delay: u64,

    /// General requests allowed before the light pause (0 disables).
    #[arg(short = 'g', long, default_value_t = 3)]
    pub general_requests: u32,

    /// Seconds the light rate-limit pause lasts.
    #[arg(short = 'd', long, default_value_t = 3)]
    pub general_requests_delay: u64,
}

impl Args {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.wait)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            reindex: self.reindex,
            page_requests: RateLimit::new(
                self.page_requests,
                Duration::from_secs(self.page_requests_delay),
            ),
            general_requests: RateLimit::new(
                self.general_requests,
                Duration::from_secs(self.general_requests_delay),
            ),
            include_external: self.include_external,
            languages: self
                .languages
                .iter()
                .map(|lang| lang.trim().to_lowercase())
                .filter(|lang| !lang.is_empty())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let args = Args::parse_from(["mdwatch"]);
        let settings = args.fetch_settings();
        let engine = FetchSettings::default();
        assert_eq!(settings.reindex, engine.reindex);
        assert_eq!(settings.include_external, engine.include_external);
        assert_eq!(settings.page_requests, engine.page_requests);
        assert_eq!(settings.general_requests, engine.general_requests);
        assert_eq!(settings.languages, engine.languages);
        assert_eq!(args.period(), Duration::from_secs(60));
    }

    #[test]
    fn test_languages_are_split_and_normalised() {
        let args = Args::parse_from(["mdwatch", "--languages", "EN, fr ,de"]);
        assert_eq!(args.fetch_settings().languages, vec!["en", "fr", "de"]);
    }

    #[test]
    fn test_zero_thresholds_disable_rate_limits() {
        let args =
            Args::parse_from(["mdwatch", "--page-requests", "0", "--general-requests", "0"]);
        let settings = args.fetch_settings();
        assert_eq!(settings.page_requests.requests, 0);
        assert_eq!(settings.general_requests.requests, 0);
    }
}
