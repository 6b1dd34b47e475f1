use log::*;
use tps_common::Secret;

use crate::signature::SignatureScheme;

const DEFAULT_REGULAR_API_URL: &str = "https://api.wayforpay.com/regularApi";
const DEFAULT_TIMEOUT_SECONDS: u64 = 25;

#[derive(Debug, Clone, Default)]
pub struct WayForPayConfig {
    pub merchant_account: String,
    /// The merchant domain as registered with the gateway, without a trailing slash.
    pub merchant_domain: String,
    /// Key for signing payment requests and verifying callback signatures.
    pub secret_key: Secret<String>,
    /// Password for the regular-payments API (a separate credential from the signing key).
    pub merchant_password: Secret<String>,
    pub signature_scheme: SignatureScheme,
    pub currency: String,
    pub language: String,
    /// Where the gateway redirects the client after payment.
    pub return_url: String,
    /// Where the gateway POSTs the webhook callback.
    pub service_url: String,
    pub regular_api_url: String,
    pub timeout_seconds: u64,
}

impl WayForPayConfig {
    pub fn new_from_env_or_default() -> Self {
        let merchant_account = std::env::var("TPS_WAYFORPAY_MERCHANT_ACCOUNT").unwrap_or_else(|_| {
            warn!("TPS_WAYFORPAY_MERCHANT_ACCOUNT not set, using (probably useless) default");
            "test_merch_n1".to_string()
        });
        let merchant_domain = std::env::var("TPS_WAYFORPAY_DOMAIN")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                warn!("TPS_WAYFORPAY_DOMAIN not set, using (probably useless) default");
                "www.example.com".to_string()
            });
        let secret_key = Secret::new(std::env::var("TPS_WAYFORPAY_SECRET_KEY").unwrap_or_else(|_| {
            error!("TPS_WAYFORPAY_SECRET_KEY is not set. Payment signatures will not validate.");
            String::default()
        }));
        let merchant_password = Secret::new(std::env::var("TPS_WAYFORPAY_MERCHANT_PASSWORD").unwrap_or_else(|_| {
            info!("TPS_WAYFORPAY_MERCHANT_PASSWORD not set. The regular-payments STATUS API will be unavailable.");
            String::default()
        }));
        let signature_scheme = std::env::var("TPS_WAYFORPAY_SIGNATURE_SCHEME")
            .ok()
            .and_then(|s| {
                s.parse::<SignatureScheme>()
                    .map_err(|e| warn!("Invalid TPS_WAYFORPAY_SIGNATURE_SCHEME. {e}. Using hmac-md5."))
                    .ok()
            })
            .unwrap_or_default();
        let currency = std::env::var("TPS_WAYFORPAY_CURRENCY").unwrap_or_else(|_| "UAH".to_string());
        let language = std::env::var("TPS_WAYFORPAY_LANGUAGE").unwrap_or_else(|_| "uk".to_string());
        let return_url = std::env::var("TPS_WAYFORPAY_RETURN_URL").unwrap_or_else(|_| {
            warn!("TPS_WAYFORPAY_RETURN_URL not set. Clients will not be redirected back after payment.");
            String::default()
        });
        let service_url = std::env::var("TPS_WAYFORPAY_SERVICE_URL").unwrap_or_else(|_| {
            warn!("TPS_WAYFORPAY_SERVICE_URL not set. The gateway will have nowhere to deliver callbacks.");
            String::default()
        });
        let regular_api_url =
            std::env::var("TPS_WAYFORPAY_API_URL").unwrap_or_else(|_| DEFAULT_REGULAR_API_URL.to_string());
        let timeout_seconds = std::env::var("TPS_WAYFORPAY_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        Self {
            merchant_account,
            merchant_domain,
            secret_key,
            merchant_password,
            signature_scheme,
            currency,
            language,
            return_url,
            service_url,
            regular_api_url,
            timeout_seconds,
        }
    }

    pub fn signer(&self) -> crate::Signer {
        crate::Signer::new(self.secret_key.clone(), self.signature_scheme)
    }
}
