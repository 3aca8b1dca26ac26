//! Shared vocabulary for the toko storefront backend -- status enums,
//! money helpers, and the hosted-server package catalog.
//!
//! This crate carries no I/O and no business logic; it exists so the
//! storage and engine crates agree on types without depending on each
//! other.

pub mod catalog;
pub mod money;
pub mod status;

pub use catalog::{FeatureLimits, PackageCatalog, ResourceLimits, ServerPackage};
pub use status::{FulfillmentMode, InvoiceStatus, PowerSignal, ServerStatus, TopupStatus};
