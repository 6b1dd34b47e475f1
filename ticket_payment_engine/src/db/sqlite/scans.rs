use log::trace;
use sqlx::SqliteConnection;

use crate::{db::sqlite::SqliteDatabaseError, traits::NewScanRecord};

pub async fn append_scan(scan: &NewScanRecord, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        "INSERT INTO scan_log (order_id, scanned_by, ip_address, was_valid, previous_status) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(scan.order_id)
    .bind(&scan.scanned_by)
    .bind(&scan.ip_address)
    .bind(scan.was_valid)
    .bind(scan.previous_status)
    .execute(conn)
    .await?;
    trace!("🗃️ Scan of order #{} logged (valid: {})", scan.order_id, scan.was_valid);
    Ok(())
}
