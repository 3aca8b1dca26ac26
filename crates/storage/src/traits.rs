use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::StorageError;
use crate::record::{
    AccountRecord, InvoiceRecord, NoticeRecord, PendingTopupRecord, ProductRecord, ServerRecord,
    StockItemRecord,
};

/// The storage trait for toko backends.
///
/// A `TokoStorage` implementation provides transactional storage for
/// accounts, products, stock items, invoices, servers, pending top-ups and
/// notices.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing
/// an in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()` -- start a transaction, returns a `Snapshot`
/// 2. Call mutating methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` -- commit and consume the transaction
///    OR `abort_snapshot(snapshot)` -- roll back and consume the transaction
///
/// If a `Snapshot` is dropped without committing, the underlying
/// transaction MUST be rolled back.
///
/// Snapshots must never be held across an external HTTP call: the engine
/// commits the money step first and talks to vendors afterwards.
///
/// ## OCC Conflict Detection
///
/// `update_account_funds` and `update_product_stock` perform an optimistic
/// concurrency check: `UPDATE WHERE version = expected_version`. If zero
/// rows are affected, the method returns
/// `Err(StorageError::ConcurrentConflict { ... })`.
///
/// ## Unique Constraints
///
/// `insert_account` (username), `insert_product` (name), `insert_invoice`
/// (invoice number) and `insert_pending_topup` (order id) return
/// `Err(StorageError::DuplicateKey { ... })` on collision, leaving the
/// transaction usable for an abort.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be shared across
/// async task boundaries.
#[async_trait]
pub trait TokoStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Accounts (within snapshot) ────────────────────────────────────────

    /// Insert a new account. Usernames are unique.
    async fn insert_account(
        &self,
        snapshot: &mut Self::Snapshot,
        record: AccountRecord,
    ) -> Result<(), StorageError>;

    /// Read an account, locking the row for update.
    async fn get_account_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        account_id: &str,
    ) -> Result<AccountRecord, StorageError>;

    /// Apply a version-validated update to an account's balance and
    /// transaction count (OCC). Returns the new version on success.
    async fn update_account_funds(
        &self,
        snapshot: &mut Self::Snapshot,
        account_id: &str,
        expected_version: i64,
        new_balance: Decimal,
        new_transaction_count: i64,
    ) -> Result<i64, StorageError>;

    // ── Products & stock items (within snapshot) ──────────────────────────

    /// Insert a new product. Product names are unique.
    async fn insert_product(
        &self,
        snapshot: &mut Self::Snapshot,
        record: ProductRecord,
    ) -> Result<(), StorageError>;

    /// Delete a product by id.
    async fn delete_product(
        &self,
        snapshot: &mut Self::Snapshot,
        product_id: &str,
    ) -> Result<(), StorageError>;

    /// Read a product, locking the row for update.
    async fn get_product_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        product_id: &str,
    ) -> Result<ProductRecord, StorageError>;

    /// Apply a version-validated update to a product's counted stock (OCC).
    /// Returns the new version on success.
    async fn update_product_stock(
        &self,
        snapshot: &mut Self::Snapshot,
        product_id: &str,
        expected_version: i64,
        new_stock: i64,
    ) -> Result<i64, StorageError>;

    /// Bulk-insert unique stock items.
    async fn insert_stock_items(
        &self,
        snapshot: &mut Self::Snapshot,
        records: Vec<StockItemRecord>,
    ) -> Result<(), StorageError>;

    /// Conditionally mark up to `quantity` unsold items of `product_id` as
    /// sold to `buyer_id`, in insertion order, and return the ids actually
    /// marked.
    ///
    /// Selection and marking happen in one operation under the snapshot's
    /// isolation, so no two transactions can mark the same item. Callers
    /// MUST compare the returned count against `quantity` and abort the
    /// snapshot when fewer items were marked -- that is the anti-double-sale
    /// guard.
    async fn take_unsold_stock_items(
        &self,
        snapshot: &mut Self::Snapshot,
        product_id: &str,
        quantity: i64,
        buyer_id: &str,
        sold_at: &str,
    ) -> Result<Vec<String>, StorageError>;

    // ── Invoices, servers, top-ups, notices (within snapshot) ─────────────

    /// Insert an invoice. Invoice numbers are unique.
    async fn insert_invoice(
        &self,
        snapshot: &mut Self::Snapshot,
        record: InvoiceRecord,
    ) -> Result<(), StorageError>;

    /// Insert a provisioned-server record.
    async fn insert_server(
        &self,
        snapshot: &mut Self::Snapshot,
        record: ServerRecord,
    ) -> Result<(), StorageError>;

    /// Insert a pending top-up. Order ids are unique.
    async fn insert_pending_topup(
        &self,
        snapshot: &mut Self::Snapshot,
        record: PendingTopupRecord,
    ) -> Result<(), StorageError>;

    /// Read a pending top-up by order id, locking the row for update.
    async fn get_pending_topup_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        order_id: &str,
    ) -> Result<PendingTopupRecord, StorageError>;

    /// Set a pending top-up's status.
    async fn update_topup_status(
        &self,
        snapshot: &mut Self::Snapshot,
        order_id: &str,
        status: toko_core::TopupStatus,
    ) -> Result<(), StorageError>;

    /// Insert a notice.
    async fn insert_notice(
        &self,
        snapshot: &mut Self::Snapshot,
        record: NoticeRecord,
    ) -> Result<(), StorageError>;

    // ── Reads (outside snapshot, against the shared store) ────────────────

    async fn get_account(&self, account_id: &str) -> Result<AccountRecord, StorageError>;

    async fn get_account_by_username(&self, username: &str)
        -> Result<AccountRecord, StorageError>;

    async fn get_product(&self, product_id: &str) -> Result<ProductRecord, StorageError>;

    /// Products with counted stock above zero.
    async fn list_products_in_stock(&self) -> Result<Vec<ProductRecord>, StorageError>;

    /// Count of unsold stock items for a product.
    async fn count_unsold_stock_items(&self, product_id: &str) -> Result<usize, StorageError>;

    async fn get_stock_item(&self, item_id: &str) -> Result<StockItemRecord, StorageError>;

    async fn get_invoice(&self, invoice_number: &str) -> Result<InvoiceRecord, StorageError>;

    async fn get_server(&self, server_id: &str) -> Result<ServerRecord, StorageError>;

    async fn list_servers(&self, account_id: &str) -> Result<Vec<ServerRecord>, StorageError>;

    async fn get_pending_topup(
        &self,
        order_id: &str,
    ) -> Result<PendingTopupRecord, StorageError>;

    /// Notices, newest first.
    async fn list_notices(&self) -> Result<Vec<NoticeRecord>, StorageError>;

    /// Delete pending top-ups created before `cutoff` (RFC 3339),
    /// regardless of status. Returns the number purged.
    async fn purge_expired_topups(&self, cutoff: &str) -> Result<usize, StorageError>;
}
