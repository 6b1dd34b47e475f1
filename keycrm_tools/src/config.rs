use log::*;
use tps_common::Secret;

pub const DEFAULT_KEYCRM_API_URL: &str = "https://openapi.keycrm.app/v1";

/// KeyCRM connection settings, sourced from `TPS_KEYCRM_*` environment variables.
///
/// The integration is optional. When no API key is set, [`KeyCrmConfig::enabled`] is false and the
/// server skips lead creation and reconciliation rather than failing checkouts.
#[derive(Clone, Debug)]
pub struct KeyCrmConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
    /// Funnel that new checkout cards land in.
    pub pipeline_id: i64,
    /// Traffic source recorded on each card.
    pub source_id: i64,
    pub enabled: bool,
}

impl Default for KeyCrmConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_KEYCRM_API_URL.into(),
            api_key: Secret::new(String::default()),
            pipeline_id: 0,
            source_id: 0,
            enabled: false,
        }
    }
}

impl KeyCrmConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = std::env::var("TPS_KEYCRM_API_URL").unwrap_or_else(|_| DEFAULT_KEYCRM_API_URL.into());
        let api_url = api_url.trim_end_matches('/').to_string();
        let api_key = std::env::var("TPS_KEYCRM_API_KEY").ok().map(Secret::new);
        let enabled = api_key.is_some();
        if !enabled {
            warn!(
                "🔧️ TPS_KEYCRM_API_KEY is not set. CRM lead creation and payment reconciliation are \
                 disabled."
            );
        }
        let pipeline_id = env_i64("TPS_KEYCRM_PIPELINE_ID", 1);
        let source_id = env_i64("TPS_KEYCRM_SOURCE_ID", 1);
        Self { api_url, api_key: api_key.unwrap_or_else(|| Secret::new(String::default())), pipeline_id, source_id, enabled }
    }
}

fn env_i64(var: &str, default: i64) -> i64 {
    match std::env::var(var) {
        Ok(s) => s.parse::<i64>().unwrap_or_else(|_| {
            error!("🔧️ {var} is not a valid integer ({s}). Using {default}.");
            default
        }),
        Err(_) => default,
    }
}
