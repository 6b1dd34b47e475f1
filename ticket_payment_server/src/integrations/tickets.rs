use std::path::{Path, PathBuf};

use log::*;
use qrcode::{render::svg, QrCode};
use thiserror::Error;
use ticket_payment_engine::db_types::Order;

#[derive(Debug, Error)]
pub enum TicketIssueError {
    #[error("Could not encode the ticket QR code. {0}")]
    Encoding(String),
    #[error("Could not write the ticket artifact. {0}")]
    IOError(#[from] std::io::Error),
}

/// A rendered ticket, ready for delivery. The artifact is dropped into the outbox directory, where the
/// mailer job picks it up.
#[derive(Debug, Clone)]
pub struct IssuedTicket {
    pub order_id: i64,
    pub ticket_number: Option<i64>,
    pub verify_url: String,
    pub artifact: PathBuf,
}

/// Produces the deliverable ticket for a paid order.
#[allow(async_fn_in_trait)]
pub trait TicketIssuer {
    async fn issue(&self, order: &Order) -> Result<IssuedTicket, TicketIssueError>;
}

/// Renders each ticket as an SVG QR code pointing at the server's own validation endpoint, so door
/// staff scanning the code land on a live status check rather than static data.
#[derive(Debug, Clone)]
pub struct QrTicketIssuer {
    base_url: String,
    outbox: PathBuf,
}

impl QrTicketIssuer {
    pub fn new<P: AsRef<Path>>(base_url: &str, outbox: P) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), outbox: outbox.as_ref().to_path_buf() }
    }

    pub fn verify_url(&self, order_id: i64) -> String {
        format!("{}/tickets/{order_id}/validate", self.base_url)
    }
}

impl TicketIssuer for QrTicketIssuer {
    async fn issue(&self, order: &Order) -> Result<IssuedTicket, TicketIssueError> {
        let verify_url = self.verify_url(order.id);
        let code = QrCode::new(verify_url.as_bytes()).map_err(|e| TicketIssueError::Encoding(e.to_string()))?;
        let image = code.render::<svg::Color>().min_dimensions(256, 256).build();
        tokio::fs::create_dir_all(&self.outbox).await?;
        let artifact = self.outbox.join(format!("ticket_{}.svg", order.id));
        tokio::fs::write(&artifact, image.as_bytes()).await?;
        info!("🎫️ Issued ticket {:?} for order #{} at {}", order.ticket_number, order.id, artifact.display());
        Ok(IssuedTicket { order_id: order.id, ticket_number: order.ticket_number, verify_url, artifact })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verify_url_strips_trailing_slash() {
        let issuer = QrTicketIssuer::new("https://tickets.example.com/", "/tmp/outbox");
        assert_eq!(issuer.verify_url(42), "https://tickets.example.com/tickets/42/validate");
    }
}
