use std::env;

use chrono::Duration;
use keycrm_tools::KeyCrmConfig;
use log::*;
use tps_common::Money;
use wayforpay_tools::WayForPayConfig;

const DEFAULT_TPS_HOST: &str = "127.0.0.1";
const DEFAULT_TPS_PORT: u16 = 8360;
const DEFAULT_RESERVATION_TTL: Duration = Duration::minutes(10);
const DEFAULT_DUPLICATE_WINDOW: Duration = Duration::minutes(5);
const DEFAULT_MATCH_WINDOW_MIN: i64 = 5;
const DEFAULT_MATCH_WINDOW_MAX: i64 = 15;
const DEFAULT_SUBSCRIPTION_PRICE_CENTS: i64 = 30_000;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather
    /// than the connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    /// How long a pending ticket order holds its inventory slot.
    pub reservation_ttl: Duration,
    /// Recency window for the contact-based callback matcher. Clamped to 5..=15 minutes.
    pub match_window: Duration,
    /// Window for the duplicate-submission guard at checkout.
    pub duplicate_window: Duration,
    /// Monthly subscription price, in kopecks.
    pub subscription_price: Money,
    /// Base URL tickets' verification QR codes point at.
    pub ticket_base_url: String,
    /// Directory rendered tickets are dropped into for the mailer to pick up.
    pub ticket_outbox: String,
    pub wayforpay: WayForPayConfig,
    pub keycrm: KeyCrmConfig,
    pub reconciler: ReconcilerConfig,
}

/// Retry policy for the CRM reconciliation that runs inside the webhook request. The defaults mirror
/// how long the CRM usually takes to ingest a gateway transaction; deployments that cannot afford the
/// request budget shrink the backoff instead of disabling reconciliation.
#[derive(Clone, Debug)]
pub struct ReconcilerConfig {
    pub attempts: u32,
    pub backoff: Vec<std::time::Duration>,
    pub page_size: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: vec![
                std::time::Duration::from_secs(2),
                std::time::Duration::from_secs(5),
                std::time::Duration::from_secs(10),
            ],
            page_size: 100,
        }
    }
}

impl ReconcilerConfig {
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();
        if let Ok(s) = env::var("TPS_RECON_ATTEMPTS") {
            match s.parse::<u32>() {
                Ok(n) if n > 0 => config.attempts = n,
                _ => error!("🪛️ TPS_RECON_ATTEMPTS is not a positive integer ({s}). Using the default."),
            }
        }
        if let Ok(s) = env::var("TPS_RECON_BACKOFF_SECONDS") {
            let parsed: Result<Vec<u64>, _> = s.split(',').map(|p| p.trim().parse::<u64>()).collect();
            match parsed {
                Ok(secs) if !secs.is_empty() => {
                    config.backoff = secs.into_iter().map(std::time::Duration::from_secs).collect()
                },
                _ => error!("🪛️ TPS_RECON_BACKOFF_SECONDS must be a comma-separated list of seconds ({s})."),
            }
        }
        if let Ok(s) = env::var("TPS_RECON_PAGE_SIZE") {
            match s.parse::<u32>() {
                Ok(n) if n > 0 => config.page_size = n,
                _ => error!("🪛️ TPS_RECON_PAGE_SIZE is not a positive integer ({s}). Using the default."),
            }
        }
        config
    }

    /// Backoff before retry attempt `i` (zero-based). Repeats the last entry if attempts exceed the
    /// configured schedule.
    pub fn backoff_for(&self, i: usize) -> std::time::Duration {
        self.backoff.get(i).or_else(|| self.backoff.last()).copied().unwrap_or_default()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TPS_HOST.to_string(),
            port: DEFAULT_TPS_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            reservation_ttl: DEFAULT_RESERVATION_TTL,
            match_window: Duration::minutes(10),
            duplicate_window: DEFAULT_DUPLICATE_WINDOW,
            subscription_price: Money::from_cents(DEFAULT_SUBSCRIPTION_PRICE_CENTS),
            ticket_base_url: "http://localhost:8360".to_string(),
            ticket_outbox: "data/tickets".to_string(),
            wayforpay: WayForPayConfig::default(),
            keycrm: KeyCrmConfig::default(),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("TPS_HOST").ok().unwrap_or_else(|| DEFAULT_TPS_HOST.into());
        let port = env::var("TPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for TPS_PORT. {e} Using the default, {DEFAULT_TPS_PORT}, instead."
                    );
                    DEFAULT_TPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_TPS_PORT);
        let database_url = env::var("TPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ TPS_DATABASE_URL is not set. Please set it to the URL for the ticket database.");
            String::default()
        });
        let use_x_forwarded_for =
            env::var("TPS_USE_X_FORWARDED_FOR").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let use_forwarded = env::var("TPS_USE_FORWARDED").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let reservation_ttl = env_minutes("TPS_RESERVATION_TTL_MINUTES", DEFAULT_RESERVATION_TTL);
        let match_window = clamp_match_window(env_minutes("TPS_MATCH_WINDOW_MINUTES", Duration::minutes(10)));
        let duplicate_window = env_minutes("TPS_DUPLICATE_WINDOW_MINUTES", DEFAULT_DUPLICATE_WINDOW);
        let subscription_price = env::var("TPS_SUBSCRIPTION_PRICE")
            .ok()
            .and_then(|s| s.parse::<Money>().ok())
            .unwrap_or_else(|| Money::from_cents(DEFAULT_SUBSCRIPTION_PRICE_CENTS));
        let ticket_base_url = env::var("TPS_TICKET_BASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ TPS_TICKET_BASE_URL is not set. QR codes will point at localhost.");
            "http://localhost:8360".to_string()
        });
        let ticket_base_url = ticket_base_url.trim_end_matches('/').to_string();
        let ticket_outbox = env::var("TPS_TICKET_OUTBOX").unwrap_or_else(|_| "data/tickets".to_string());
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            reservation_ttl,
            match_window,
            duplicate_window,
            subscription_price,
            ticket_base_url,
            ticket_outbox,
            wayforpay: WayForPayConfig::new_from_env_or_default(),
            keycrm: KeyCrmConfig::from_env_or_default(),
            reconciler: ReconcilerConfig::from_env_or_default(),
        }
    }
}

fn env_minutes(var: &str, default: Duration) -> Duration {
    match env::var(var) {
        Ok(s) => match s.parse::<i64>() {
            Ok(n) if n > 0 => Duration::minutes(n),
            _ => {
                error!("🪛️ {var} is not a positive number of minutes ({s}). Using the default.");
                default
            },
        },
        Err(_) => default,
    }
}

fn clamp_match_window(window: Duration) -> Duration {
    let clamped = window.num_minutes().clamp(DEFAULT_MATCH_WINDOW_MIN, DEFAULT_MATCH_WINDOW_MAX);
    if clamped != window.num_minutes() {
        warn!("🪛️ TPS_MATCH_WINDOW_MINUTES clamped to {clamped} minutes");
    }
    Duration::minutes(clamped)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn match_window_is_clamped() {
        assert_eq!(clamp_match_window(Duration::minutes(2)).num_minutes(), 5);
        assert_eq!(clamp_match_window(Duration::minutes(10)).num_minutes(), 10);
        assert_eq!(clamp_match_window(Duration::minutes(60)).num_minutes(), 15);
    }

    #[test]
    fn backoff_repeats_last_entry() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.backoff_for(0).as_secs(), 2);
        assert_eq!(config.backoff_for(2).as_secs(), 10);
        assert_eq!(config.backoff_for(9).as_secs(), 10);
    }
}
