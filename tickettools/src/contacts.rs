use std::collections::HashMap;

use anyhow::{Context, Result};
use log::*;
use prettytable::{row, Table};
use serde_json::Value;
use ticket_payment_engine::{db_types::Subscription, SqliteDatabase, TicketingDatabase};

/// Fills missing contact fields on orders from the subscription mirror. Matched-by-contact recurring
/// charges can land on orders that never had an email or phone captured at checkout; the gateway's
/// STATUS payload usually carries them.
pub async fn backfill_contacts(apply: bool) -> Result<()> {
    let db = SqliteDatabase::new(5).await.context("Could not open the ticket database")?;
    let orders = db.orders_missing_contacts().await.context("Could not list orders")?;
    if orders.is_empty() {
        println!("No orders are missing contact details.");
        return Ok(());
    }
    let subscriptions = db.fetch_subscriptions().await.context("Could not list subscriptions")?;
    let by_reference: HashMap<&str, &Subscription> =
        subscriptions.iter().map(|s| (s.order_reference.as_str(), s)).collect();

    let mut table = Table::new();
    table.add_row(row!["Order", "Field", "Current", "Fill with"]);
    let mut applied = 0usize;
    for order in &orders {
        let Some(reference) = order.order_reference.as_ref() else { continue };
        let Some(sub) = by_reference.get(reference.as_str()) else { continue };
        let (raw_email, raw_phone, raw_name) = contact_from_raw(sub);
        let email = if order.email.is_empty() { sub.email.clone().or(raw_email) } else { None };
        let phone = if order.phone.is_empty() { sub.phone.clone().or(raw_phone) } else { None };
        let name = if order.name.is_empty() { raw_name } else { None };
        if email.is_none() && phone.is_none() && name.is_none() {
            continue;
        }
        if let Some(v) = &name {
            table.add_row(row![order.id, "name", order.name, v]);
        }
        if let Some(v) = &email {
            table.add_row(row![order.id, "email", order.email, v]);
        }
        if let Some(v) = &phone {
            table.add_row(row![order.id, "phone", order.phone, v]);
        }
        if apply {
            db.backfill_contact(order.id, name.as_deref(), email.as_deref(), phone.as_deref())
                .await
                .with_context(|| format!("Could not backfill order {}", order.id))?;
            applied += 1;
        }
    }
    table.printstd();
    if apply {
        println!("Backfilled {applied} order(s).");
    } else {
        println!("Dry run. Re-run with --apply to write these changes.");
    }
    Ok(())
}

/// Contact fields hiding in the raw STATUS payload from the last sync.
fn contact_from_raw(sub: &Subscription) -> (Option<String>, Option<String>, Option<String>) {
    let Some(raw) = sub.last_raw.as_deref() else { return (None, None, None) };
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            debug!("Unparseable raw payload for {}: {e}", sub.order_reference);
            return (None, None, None);
        },
    };
    let field = |key: &str| {
        value.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(String::from)
    };
    (field("email"), field("phone"), field("clientName"))
}
