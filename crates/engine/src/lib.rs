//! Transaction core for the toko storefront backend.
//!
//! Everything that must atomically touch money, inventory or unique-item
//! allocation lives here: the purchase coordinator, the inventory
//! allocator, the hosted-server provisioning flow, the payment webhook
//! reconciler, and the admin operations that seed and adjust the store.
//!
//! The two external vendors (provisioning panel, payment gateway) sit
//! behind async traits in [`gateway`]; coordinators never hold a storage
//! snapshot open across a vendor call.

pub mod admin;
pub mod dashboard;
pub mod error;
pub mod gateway;
mod ids;
pub mod inventory;
pub mod provision;
pub mod purchase;
pub mod topup;

pub use error::EngineError;
pub use provision::{purchase_server, send_power_command};
pub use purchase::{purchase, PurchaseReceipt};
pub use topup::{
    create_topup_intent, handle_callback, purge_expired_topups, CallbackAck, TopupIntent,
};
