//! Identifier generation and timestamp helpers.
//!
//! Invoice numbers and order ids embed a millisecond timestamp plus a
//! random alphanumeric nonce, so concurrent generation cannot collide.

use rand::distributions::Alphanumeric;
use rand::Rng;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

pub(crate) fn now_rfc3339() -> String {
    format_rfc3339(OffsetDateTime::now_utc())
}

pub(crate) fn rfc3339_days_from_now(days: i64) -> String {
    format_rfc3339(OffsetDateTime::now_utc() + Duration::days(days))
}

pub(crate) fn rfc3339_hours_ago(hours: i64) -> String {
    format_rfc3339(OffsetDateTime::now_utc() - Duration::hours(hours))
}

fn format_rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn unix_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

fn nonce(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// A fresh record id: `<prefix>-<unix millis>-<nonce>`.
pub(crate) fn fresh_id(prefix: &str) -> String {
    format!("{}-{}-{}", prefix, unix_millis(), nonce(6))
}

/// A fresh globally unique invoice number.
pub(crate) fn invoice_number() -> String {
    format!("INV-{}-{}", unix_millis(), nonce(6))
}

/// A fresh top-up order id bound to the requesting account.
pub(crate) fn topup_order_id(account_id: &str) -> String {
    format!("TOPUP-{}-{}-{}", account_id, unix_millis(), nonce(4))
}
