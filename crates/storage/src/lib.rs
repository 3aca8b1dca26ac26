//! Transactional storage boundary for the toko storefront backend.
//!
//! [`TokoStorage`] is the single seam between the transaction engine and
//! whatever holds the data: snapshot (transaction) lifecycle, OCC-checked
//! updates on the money- and stock-bearing records, and unique-constraint
//! enforcement on usernames, product names, invoice numbers and top-up
//! order ids.
//!
//! [`MemoryStorage`] is the bundled backend: serializable single-writer
//! transactions over an in-process store, suitable for tests and
//! development.

mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{MemorySnapshot, MemoryStorage};
pub use record::{
    AccountRecord, InvoiceRecord, NoticeRecord, PendingTopupRecord, ProductRecord, ServerRecord,
    StockItemRecord,
};
pub use traits::TokoStorage;
