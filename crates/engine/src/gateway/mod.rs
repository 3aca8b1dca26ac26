//! Vendor gateway seams: the provisioning panel and the payment gateway.
//!
//! Both vendors sit behind async traits so the coordinators can be
//! exercised against mocks. The production implementations in
//! [`pterodactyl`] and [`pakasir`] speak HTTP via `ureq` (sync) wrapped in
//! `tokio::task::spawn_blocking`, with bounded timeouts.

pub mod pakasir;
pub mod pterodactyl;

use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;

use toko_core::{PowerSignal, ServerPackage};

// ──────────────────────────────────────────────
// GatewayError
// ──────────────────────────────────────────────

/// Errors that can occur when talking to a vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Local configuration is incomplete (missing deployment location,
    /// slug, api key).
    InvalidConfig { message: String },
    /// The request could not be delivered or timed out.
    RequestFailed { endpoint: String, message: String },
    /// The vendor answered with a validation or processing error; `detail`
    /// carries the vendor-provided explanation.
    VendorRejected { detail: String },
    /// The vendor answered successfully but the body was not in the
    /// expected shape.
    UnexpectedResponse { message: String },
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::InvalidConfig { message } => {
                write!(f, "gateway config error: {}", message)
            }
            GatewayError::RequestFailed { endpoint, message } => {
                write!(f, "request to '{}' failed: {}", endpoint, message)
            }
            GatewayError::VendorRejected { detail } => {
                write!(f, "vendor rejected the request: {}", detail)
            }
            GatewayError::UnexpectedResponse { message } => {
                write!(f, "unexpected vendor response: {}", message)
            }
        }
    }
}

impl std::error::Error for GatewayError {}

// ──────────────────────────────────────────────
// ProvisioningGateway
// ──────────────────────────────────────────────

/// A user account on the provisioning panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Client for the hosting panel's application API.
#[async_trait]
pub trait ProvisioningGateway: Send + Sync {
    /// Idempotent lookup-or-create of the panel user mapped to a local
    /// account: "already exists" is the lookup-hit path, never an error.
    async fn ensure_panel_user(&self, username: &str) -> Result<PanelUser, GatewayError>;

    /// Create a server for `panel_user_id` from the package configuration.
    /// Fails loudly with vendor-provided detail on validation errors; a
    /// package with neither a deployment location nor an explicit
    /// allocation is rejected before any HTTP call.
    async fn create_server(
        &self,
        panel_user_id: i64,
        server_name: &str,
        package: &ServerPackage,
    ) -> Result<i64, GatewayError>;

    /// Fire-and-forget power signal; no completion guarantee.
    async fn send_power_signal(
        &self,
        panel_server_id: i64,
        signal: PowerSignal,
    ) -> Result<(), GatewayError>;
}

// ──────────────────────────────────────────────
// PaymentGateway
// ──────────────────────────────────────────────

/// Outcome of the authoritative payment verification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentVerification {
    /// True only when the vendor's transaction detail reports a terminal
    /// success status.
    pub paid: bool,
    /// The raw vendor status string, for operator logs.
    pub vendor_status: String,
}

/// Client for the payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// The redirect target the buyer is sent to for this order.
    fn payment_url(&self, amount: &Decimal, order_id: &str) -> String;

    /// Server-to-server verification keyed by order id and expected
    /// amount. The webhook payload is never a substitute for this call.
    async fn verify(
        &self,
        order_id: &str,
        amount: &Decimal,
    ) -> Result<PaymentVerification, GatewayError>;
}

// ──────────────────────────────────────────────
// Shared helpers
// ──────────────────────────────────────────────

/// Percent-encode a query-string value. Unreserved characters pass
/// through; everything else becomes `%XX`.
pub(crate) fn encode_query(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_query_passes_unreserved() {
        assert_eq!(encode_query("alice_42.x-y~z"), "alice_42.x-y~z");
    }

    #[test]
    fn encode_query_escapes_reserved() {
        assert_eq!(encode_query("a@b.c"), "a%40b.c");
        assert_eq!(encode_query("a b&c"), "a%20b%26c");
    }

    #[test]
    fn gateway_error_display() {
        let err = GatewayError::RequestFailed {
            endpoint: "/api/application/servers".to_string(),
            message: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "request to '/api/application/servers' failed: timeout"
        );

        let err = GatewayError::VendorRejected {
            detail: "No allocation could be found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "vendor rejected the request: No allocation could be found"
        );
    }
}
