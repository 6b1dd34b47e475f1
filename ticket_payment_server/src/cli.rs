use std::env;

pub fn print_help() -> ! {
    let help = include_str!("./cli-help.txt");
    println!("{help}");
    std::process::exit(0);
}

/// Prints the environment variables the server reads, with secrets redacted.
pub fn display_envs() -> ! {
    const VARS: &[&str] = &[
        "TPS_HOST",
        "TPS_PORT",
        "TPS_DATABASE_URL",
        "TPS_USE_X_FORWARDED_FOR",
        "TPS_USE_FORWARDED",
        "TPS_RESERVATION_TTL_MINUTES",
        "TPS_MATCH_WINDOW_MINUTES",
        "TPS_DUPLICATE_WINDOW_MINUTES",
        "TPS_SUBSCRIPTION_PRICE",
        "TPS_TICKET_BASE_URL",
        "TPS_TICKET_OUTBOX",
        "TPS_WAYFORPAY_MERCHANT_ACCOUNT",
        "TPS_WAYFORPAY_DOMAIN",
        "TPS_WAYFORPAY_SECRET_KEY",
        "TPS_WAYFORPAY_MERCHANT_PASSWORD",
        "TPS_WAYFORPAY_SIGNATURE_SCHEME",
        "TPS_WAYFORPAY_CURRENCY",
        "TPS_WAYFORPAY_LANGUAGE",
        "TPS_WAYFORPAY_RETURN_URL",
        "TPS_WAYFORPAY_SERVICE_URL",
        "TPS_WAYFORPAY_API_URL",
        "TPS_KEYCRM_API_URL",
        "TPS_KEYCRM_API_KEY",
        "TPS_KEYCRM_PIPELINE_ID",
        "TPS_KEYCRM_SOURCE_ID",
        "TPS_RECON_ATTEMPTS",
        "TPS_RECON_BACKOFF_SECONDS",
        "TPS_RECON_PAGE_SIZE",
        "RUST_LOG",
    ];
    for var in VARS {
        let value = match env::var(var) {
            Ok(_) if var.contains("SECRET") || var.contains("PASSWORD") || var.contains("API_KEY") => {
                "********".to_string()
            },
            Ok(v) => v,
            Err(_) => "<not set>".to_string(),
        };
        println!("{var}={value}");
    }
    std::process::exit(0);
}

pub fn handle_command_line_args() {
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "-h" | "--help" => print_help(),
            "-e" | "--envs" => display_envs(),
            s => {
                println!("Unknown argument: {s}");
                print_help();
            },
        }
    }
}
