use log::*;
use ticket_payment_server::{cli::handle_command_line_args, config::ServerConfig, server::run_server};

#[actix_web::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    handle_command_line_args();
    let config = ServerConfig::from_env_or_default();
    info!("🚀️ Starting ticket payment server");
    match run_server(config).await {
        Ok(()) => info!("🚀️ Server shut down"),
        Err(e) => error!("🚀️ Server exited with an error. {e}"),
    }
}
