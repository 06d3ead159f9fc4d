use std::time::Duration;
use std::{env, io};

use secrecy::SecretString;
use tracing::{debug, warn};

const DEFAULT_MAX_REQUESTS_PER_DAY: u64 = 100_000;
const DEFAULT_MAX_PAGES_PER_TERM: u32 = 10;
const DEFAULT_OUTPUT_DIR: &str = "resultados";
const DEFAULT_PLACES_API_BASE: &str = "https://maps.googleapis.com/maps/api/place";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub google_places_api_key: Option<SecretString>,
    pub places_api_base: String,
    pub max_requests_per_day: u64,
    pub max_pages_per_term: u32,
    /// The original tool disables TLS peer verification, so that is the
    /// default. Anyone on the network path can impersonate the API while this
    /// is on; set `TLS_NO_VERIFY=false` to verify certificates.
    pub tls_no_verify: bool,
    pub output_dir: String,
    pub scan_plan_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        let max_requests_per_day = parse_u64("MAX_REQUESTS_PER_DAY", DEFAULT_MAX_REQUESTS_PER_DAY);
        let max_requests_per_day = if max_requests_per_day == 0 {
            warn!("MAX_REQUESTS_PER_DAY must be positive; using default");
            DEFAULT_MAX_REQUESTS_PER_DAY
        } else {
            max_requests_per_day
        };

        Self {
            google_places_api_key: env::var("GOOGLE_PLACES_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
            places_api_base: env::var("PLACES_API_BASE")
                .ok()
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_PLACES_API_BASE.to_string()),
            max_requests_per_day,
            max_pages_per_term: parse_u32("MAX_PAGES_PER_TERM", DEFAULT_MAX_PAGES_PER_TERM).max(1),
            tls_no_verify: parse_bool("TLS_NO_VERIFY", true),
            output_dir: env::var("OUTPUT_DIR").unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string()),
            scan_plan_path: env::var("SCAN_PLAN_PATH").ok().filter(|v| !v.is_empty()),
        }
    }
}

/// Blocking waits between API calls. The delays are the rate-limiting
/// mechanism: the whole run is sequential by design.
#[derive(Clone, Debug)]
pub struct Pacing {
    /// Between consecutive place-detail fetches.
    pub detail_fetch: Duration,
    /// Before following a `next_page_token`; the token takes a moment to
    /// become valid on Google's side.
    pub next_page: Duration,
    pub between_terms: Duration,
    pub between_localities: Duration,
    pub between_regions: Duration,
    pub save_retry: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            detail_fetch: Duration::from_millis(500),
            next_page: Duration::from_secs(2),
            between_terms: Duration::from_secs(2),
            between_localities: Duration::from_secs(5),
            between_regions: Duration::from_secs(10),
            save_retry: Duration::from_secs(2),
        }
    }
}

impl Pacing {
    /// No waiting at all; for tests.
    pub fn none() -> Self {
        Self {
            detail_fetch: Duration::ZERO,
            next_page: Duration::ZERO,
            between_terms: Duration::ZERO,
            between_localities: Duration::ZERO,
            between_regions: Duration::ZERO,
            save_retry: Duration::ZERO,
        }
    }
}

fn load_dotenv_if_applicable() {
    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}
