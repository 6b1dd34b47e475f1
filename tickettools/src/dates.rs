//! Date coercion for the gateway's STATUS responses.
//!
//! The same field has been observed carrying unix seconds, unix milliseconds and `dd.mm.yyyy`
//! strings, sometimes varying between two calls for the same subscription.
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use wayforpay_tools::WireField;

// Unix-second values this large are actually milliseconds (anything past the year 33658 is not a date
// the gateway means).
const MILLISECOND_THRESHOLD: i64 = 1_000_000_000_000;

pub fn parse_gateway_date(field: &WireField) -> Option<DateTime<Utc>> {
    let s = field.get()?.trim();
    if s.is_empty() || s == "0" {
        return None;
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        let n = s.parse::<i64>().ok()?;
        let secs = if n >= MILLISECOND_THRESHOLD { n / 1000 } else { n };
        return Utc.timestamp_opt(secs, 0).single();
    }
    let date = NaiveDate::parse_from_str(s, "%d.%m.%Y").ok()?;
    date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt))
}
