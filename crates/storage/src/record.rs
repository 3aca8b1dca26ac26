use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use toko_core::{FulfillmentMode, InvoiceStatus, ServerStatus, TopupStatus};

/// A user account with its spendable balance.
///
/// `balance` is never negative after a committed operation; the engine
/// checks before every debit and the `version` field lets backends reject
/// lost updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    pub username: String,
    /// Opaque credential hash. Hashing and verification belong to the auth
    /// layer; this crate only stores the string.
    pub credential_hash: String,
    pub balance: Decimal,
    pub transaction_count: i64,
    pub is_admin: bool,
    /// OCC version, bumped on every funds update.
    pub version: i64,
    /// RFC 3339 timestamp string.
    pub created_at: String,
}

/// A purchasable product with a counted stock quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    /// Unit price in minor units; always positive.
    pub price: Decimal,
    pub description: String,
    /// Counted stock; never negative.
    pub stock: i64,
    pub fulfillment: FulfillmentMode,
    /// OCC version, bumped on every stock update.
    pub version: i64,
}

/// One individually sellable unit of a unique-item product.
///
/// Sold exactly once: `sold` flips to true with buyer and timestamp in a
/// single conditional operation and is never reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockItemRecord {
    pub id: String,
    pub product_id: String,
    /// Opaque payload distributed to the buyer (license key, voucher code).
    pub unique_data: String,
    pub sold: bool,
    pub sold_to: Option<String>,
    /// RFC 3339 timestamp string; set when sold.
    pub sold_at: Option<String>,
}

/// Record of one committed purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Globally unique, human-facing invoice number.
    pub invoice_number: String,
    pub account_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub total_amount: Decimal,
    pub status: InvoiceStatus,
    /// RFC 3339 timestamp string.
    pub purchased_at: String,
    /// Stock items distributed by this purchase; empty for counted-mode
    /// products.
    pub distributed_items: Vec<String>,
}

/// A provisioned server owned by an account.
///
/// The panel ids are the join key back to the provisioning gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: String,
    pub account_id: String,
    /// Human-readable label: package name plus the buyer's chosen name.
    pub name: String,
    pub panel_server_id: String,
    pub panel_user_id: String,
    pub status: ServerStatus,
    /// RFC 3339 timestamp string; next renewal due date.
    pub renewal_due: String,
    /// RFC 3339 timestamp string.
    pub created_at: String,
}

/// Short-lived reconciliation record for one top-up attempt.
///
/// Not a ledger: records past the retention window are purged regardless
/// of status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTopupRecord {
    /// Externally visible order id, unique across all top-ups.
    pub order_id: String,
    pub account_id: String,
    pub amount: Decimal,
    pub status: TopupStatus,
    /// RFC 3339 timestamp string.
    pub created_at: String,
}

/// An announcement shown on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author_id: String,
    /// RFC 3339 timestamp string.
    pub created_at: String,
}
