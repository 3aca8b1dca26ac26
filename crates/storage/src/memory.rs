//! In-memory storage backend.
//!
//! Transactions are serializable by construction: `begin_snapshot` takes
//! the store's single write lock and holds it for the snapshot's lifetime,
//! mutating a working copy of the whole state. Commit swaps the working
//! copy in; abort (or drop) discards it, so a failed transaction leaves no
//! trace.
//!
//! Plain reads take the same lock briefly and therefore block while a
//! snapshot is open. Callers must not interleave plain reads with an open
//! snapshot on the same task.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

use toko_core::TopupStatus;

use crate::error::StorageError;
use crate::record::{
    AccountRecord, InvoiceRecord, NoticeRecord, PendingTopupRecord, ProductRecord, ServerRecord,
    StockItemRecord,
};
use crate::traits::TokoStorage;

#[derive(Debug, Clone, Default)]
struct StoreState {
    accounts: Vec<AccountRecord>,
    products: Vec<ProductRecord>,
    stock_items: Vec<StockItemRecord>,
    invoices: Vec<InvoiceRecord>,
    servers: Vec<ServerRecord>,
    topups: Vec<PendingTopupRecord>,
    notices: Vec<NoticeRecord>,
}

/// Thread-safe in-memory store with serializable transactions.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStorage {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// An exclusive in-progress transaction over the whole store.
pub struct MemorySnapshot {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime, StorageError> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|e| StorageError::Backend(format!("invalid RFC 3339 timestamp '{}': {}", value, e)))
}

#[async_trait]
impl TokoStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemorySnapshot { guard, working })
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        let MemorySnapshot { mut guard, working } = snapshot;
        *guard = working;
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        drop(snapshot);
        Ok(())
    }

    async fn insert_account(
        &self,
        snapshot: &mut MemorySnapshot,
        record: AccountRecord,
    ) -> Result<(), StorageError> {
        if snapshot
            .working
            .accounts
            .iter()
            .any(|a| a.username == record.username)
        {
            return Err(StorageError::DuplicateKey {
                entity: "account",
                key: record.username,
            });
        }
        snapshot.working.accounts.push(record);
        Ok(())
    }

    async fn get_account_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        account_id: &str,
    ) -> Result<AccountRecord, StorageError> {
        snapshot
            .working
            .accounts
            .iter()
            .find(|a| a.id == account_id)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            })
    }

    async fn update_account_funds(
        &self,
        snapshot: &mut MemorySnapshot,
        account_id: &str,
        expected_version: i64,
        new_balance: Decimal,
        new_transaction_count: i64,
    ) -> Result<i64, StorageError> {
        let account = snapshot
            .working
            .accounts
            .iter_mut()
            .find(|a| a.id == account_id)
            .ok_or(StorageError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            })?;
        if account.version != expected_version {
            return Err(StorageError::ConcurrentConflict {
                entity: "account",
                id: account_id.to_string(),
                expected_version,
            });
        }
        account.balance = new_balance;
        account.transaction_count = new_transaction_count;
        account.version += 1;
        Ok(account.version)
    }

    async fn insert_product(
        &self,
        snapshot: &mut MemorySnapshot,
        record: ProductRecord,
    ) -> Result<(), StorageError> {
        if snapshot
            .working
            .products
            .iter()
            .any(|p| p.name == record.name)
        {
            return Err(StorageError::DuplicateKey {
                entity: "product",
                key: record.name,
            });
        }
        snapshot.working.products.push(record);
        Ok(())
    }

    async fn delete_product(
        &self,
        snapshot: &mut MemorySnapshot,
        product_id: &str,
    ) -> Result<(), StorageError> {
        let before = snapshot.working.products.len();
        snapshot.working.products.retain(|p| p.id != product_id);
        if snapshot.working.products.len() == before {
            return Err(StorageError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_product_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        product_id: &str,
    ) -> Result<ProductRecord, StorageError> {
        snapshot
            .working
            .products
            .iter()
            .find(|p| p.id == product_id)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            })
    }

    async fn update_product_stock(
        &self,
        snapshot: &mut MemorySnapshot,
        product_id: &str,
        expected_version: i64,
        new_stock: i64,
    ) -> Result<i64, StorageError> {
        let product = snapshot
            .working
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or(StorageError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            })?;
        if product.version != expected_version {
            return Err(StorageError::ConcurrentConflict {
                entity: "product",
                id: product_id.to_string(),
                expected_version,
            });
        }
        product.stock = new_stock;
        product.version += 1;
        Ok(product.version)
    }

    async fn insert_stock_items(
        &self,
        snapshot: &mut MemorySnapshot,
        records: Vec<StockItemRecord>,
    ) -> Result<(), StorageError> {
        snapshot.working.stock_items.extend(records);
        Ok(())
    }

    async fn take_unsold_stock_items(
        &self,
        snapshot: &mut MemorySnapshot,
        product_id: &str,
        quantity: i64,
        buyer_id: &str,
        sold_at: &str,
    ) -> Result<Vec<String>, StorageError> {
        let wanted = quantity.max(0) as usize;
        let mut marked = Vec::new();
        for item in snapshot
            .working
            .stock_items
            .iter_mut()
            .filter(|i| i.product_id == product_id && !i.sold)
        {
            if marked.len() == wanted {
                break;
            }
            item.sold = true;
            item.sold_to = Some(buyer_id.to_string());
            item.sold_at = Some(sold_at.to_string());
            marked.push(item.id.clone());
        }
        Ok(marked)
    }

    async fn insert_invoice(
        &self,
        snapshot: &mut MemorySnapshot,
        record: InvoiceRecord,
    ) -> Result<(), StorageError> {
        if snapshot
            .working
            .invoices
            .iter()
            .any(|i| i.invoice_number == record.invoice_number)
        {
            return Err(StorageError::DuplicateKey {
                entity: "invoice",
                key: record.invoice_number,
            });
        }
        snapshot.working.invoices.push(record);
        Ok(())
    }

    async fn insert_server(
        &self,
        snapshot: &mut MemorySnapshot,
        record: ServerRecord,
    ) -> Result<(), StorageError> {
        snapshot.working.servers.push(record);
        Ok(())
    }

    async fn insert_pending_topup(
        &self,
        snapshot: &mut MemorySnapshot,
        record: PendingTopupRecord,
    ) -> Result<(), StorageError> {
        if snapshot
            .working
            .topups
            .iter()
            .any(|t| t.order_id == record.order_id)
        {
            return Err(StorageError::DuplicateKey {
                entity: "pending top-up",
                key: record.order_id,
            });
        }
        snapshot.working.topups.push(record);
        Ok(())
    }

    async fn get_pending_topup_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        order_id: &str,
    ) -> Result<PendingTopupRecord, StorageError> {
        snapshot
            .working
            .topups
            .iter()
            .find(|t| t.order_id == order_id)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "pending top-up",
                id: order_id.to_string(),
            })
    }

    async fn update_topup_status(
        &self,
        snapshot: &mut MemorySnapshot,
        order_id: &str,
        status: TopupStatus,
    ) -> Result<(), StorageError> {
        let topup = snapshot
            .working
            .topups
            .iter_mut()
            .find(|t| t.order_id == order_id)
            .ok_or(StorageError::NotFound {
                entity: "pending top-up",
                id: order_id.to_string(),
            })?;
        topup.status = status;
        Ok(())
    }

    async fn insert_notice(
        &self,
        snapshot: &mut MemorySnapshot,
        record: NoticeRecord,
    ) -> Result<(), StorageError> {
        snapshot.working.notices.push(record);
        Ok(())
    }

    async fn get_account(&self, account_id: &str) -> Result<AccountRecord, StorageError> {
        let state = self.state.lock().await;
        state
            .accounts
            .iter()
            .find(|a| a.id == account_id)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            })
    }

    async fn get_account_by_username(
        &self,
        username: &str,
    ) -> Result<AccountRecord, StorageError> {
        let state = self.state.lock().await;
        state
            .accounts
            .iter()
            .find(|a| a.username == username)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "account",
                id: username.to_string(),
            })
    }

    async fn get_product(&self, product_id: &str) -> Result<ProductRecord, StorageError> {
        let state = self.state.lock().await;
        state
            .products
            .iter()
            .find(|p| p.id == product_id)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            })
    }

    async fn list_products_in_stock(&self) -> Result<Vec<ProductRecord>, StorageError> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .iter()
            .filter(|p| p.stock > 0)
            .cloned()
            .collect())
    }

    async fn count_unsold_stock_items(&self, product_id: &str) -> Result<usize, StorageError> {
        let state = self.state.lock().await;
        Ok(state
            .stock_items
            .iter()
            .filter(|i| i.product_id == product_id && !i.sold)
            .count())
    }

    async fn get_stock_item(&self, item_id: &str) -> Result<StockItemRecord, StorageError> {
        let state = self.state.lock().await;
        state
            .stock_items
            .iter()
            .find(|i| i.id == item_id)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "stock item",
                id: item_id.to_string(),
            })
    }

    async fn get_invoice(&self, invoice_number: &str) -> Result<InvoiceRecord, StorageError> {
        let state = self.state.lock().await;
        state
            .invoices
            .iter()
            .find(|i| i.invoice_number == invoice_number)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "invoice",
                id: invoice_number.to_string(),
            })
    }

    async fn get_server(&self, server_id: &str) -> Result<ServerRecord, StorageError> {
        let state = self.state.lock().await;
        state
            .servers
            .iter()
            .find(|s| s.id == server_id)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "server",
                id: server_id.to_string(),
            })
    }

    async fn list_servers(&self, account_id: &str) -> Result<Vec<ServerRecord>, StorageError> {
        let state = self.state.lock().await;
        Ok(state
            .servers
            .iter()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn get_pending_topup(
        &self,
        order_id: &str,
    ) -> Result<PendingTopupRecord, StorageError> {
        let state = self.state.lock().await;
        state
            .topups
            .iter()
            .find(|t| t.order_id == order_id)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "pending top-up",
                id: order_id.to_string(),
            })
    }

    async fn list_notices(&self) -> Result<Vec<NoticeRecord>, StorageError> {
        let state = self.state.lock().await;
        let mut notices: Vec<NoticeRecord> = state.notices.clone();
        // Sort on the parsed timestamp; RFC 3339 strings with mixed
        // subsecond precision do not order lexicographically.
        notices.sort_by_key(|n| {
            std::cmp::Reverse(parse_rfc3339(&n.created_at).unwrap_or(OffsetDateTime::UNIX_EPOCH))
        });
        Ok(notices)
    }

    async fn purge_expired_topups(&self, cutoff: &str) -> Result<usize, StorageError> {
        let cutoff = parse_rfc3339(cutoff)?;
        let mut state = self.state.lock().await;
        let before = state.topups.len();
        // Unparseable timestamps are kept rather than silently destroyed.
        state.topups.retain(|t| match parse_rfc3339(&t.created_at) {
            Ok(created) => created >= cutoff,
            Err(_) => true,
        });
        Ok(before - state.topups.len())
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use toko_core::FulfillmentMode;

    fn account(id: &str, username: &str) -> AccountRecord {
        AccountRecord {
            id: id.to_string(),
            username: username.to_string(),
            credential_hash: "hash".to_string(),
            balance: Decimal::ZERO,
            transaction_count: 0,
            is_admin: false,
            version: 0,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn stock_item(id: &str, product_id: &str) -> StockItemRecord {
        StockItemRecord {
            id: id.to_string(),
            product_id: product_id.to_string(),
            unique_data: format!("KEY-{}", id),
            sold: false,
            sold_to: None,
            sold_at: None,
        }
    }

    fn topup(order_id: &str, created_at: &str) -> PendingTopupRecord {
        PendingTopupRecord {
            order_id: order_id.to_string(),
            account_id: "acc-1".to_string(),
            amount: Decimal::from(1000),
            status: TopupStatus::Pending,
            created_at: created_at.to_string(),
        }
    }

    #[tokio::test]
    async fn commit_makes_mutations_visible() {
        let storage = MemoryStorage::new();
        let mut snapshot = storage.begin_snapshot().await.unwrap();
        storage
            .insert_account(&mut snapshot, account("acc-1", "alice"))
            .await
            .unwrap();
        storage.commit_snapshot(snapshot).await.unwrap();

        let fetched = storage.get_account("acc-1").await.unwrap();
        assert_eq!(fetched.username, "alice");
    }

    #[tokio::test]
    async fn abort_discards_mutations() {
        let storage = MemoryStorage::new();
        let mut snapshot = storage.begin_snapshot().await.unwrap();
        storage
            .insert_account(&mut snapshot, account("acc-1", "alice"))
            .await
            .unwrap();
        storage.abort_snapshot(snapshot).await.unwrap();

        assert!(matches!(
            storage.get_account("acc-1").await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn dropped_snapshot_rolls_back() {
        let storage = MemoryStorage::new();
        {
            let mut snapshot = storage.begin_snapshot().await.unwrap();
            storage
                .insert_account(&mut snapshot, account("acc-1", "alice"))
                .await
                .unwrap();
            // dropped here without commit
        }
        assert!(storage.get_account("acc-1").await.is_err());
    }

    #[tokio::test]
    async fn duplicate_username_rejected() {
        let storage = MemoryStorage::new();
        let mut snapshot = storage.begin_snapshot().await.unwrap();
        storage
            .insert_account(&mut snapshot, account("acc-1", "alice"))
            .await
            .unwrap();
        let err = storage
            .insert_account(&mut snapshot, account("acc-2", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn funds_update_checks_version() {
        let storage = MemoryStorage::new();
        let mut snapshot = storage.begin_snapshot().await.unwrap();
        storage
            .insert_account(&mut snapshot, account("acc-1", "alice"))
            .await
            .unwrap();
        storage.commit_snapshot(snapshot).await.unwrap();

        let mut snapshot = storage.begin_snapshot().await.unwrap();
        let err = storage
            .update_account_funds(&mut snapshot, "acc-1", 7, Decimal::from(10), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ConcurrentConflict { .. }));

        let new_version = storage
            .update_account_funds(&mut snapshot, "acc-1", 0, Decimal::from(10), 1)
            .await
            .unwrap();
        assert_eq!(new_version, 1);
        storage.commit_snapshot(snapshot).await.unwrap();
        assert_eq!(
            storage.get_account("acc-1").await.unwrap().balance,
            Decimal::from(10)
        );
    }

    #[tokio::test]
    async fn take_unsold_marks_in_insertion_order_and_reports_shortfall() {
        let storage = MemoryStorage::new();
        let mut snapshot = storage.begin_snapshot().await.unwrap();
        storage
            .insert_stock_items(
                &mut snapshot,
                vec![
                    stock_item("stk-1", "prod-1"),
                    stock_item("stk-2", "prod-1"),
                    stock_item("stk-3", "other"),
                ],
            )
            .await
            .unwrap();

        let marked = storage
            .take_unsold_stock_items(&mut snapshot, "prod-1", 3, "acc-1", "2026-01-02T00:00:00Z")
            .await
            .unwrap();
        // Only two items belong to prod-1; the shortfall is visible to the caller.
        assert_eq!(marked, vec!["stk-1".to_string(), "stk-2".to_string()]);

        // Marked items are no longer candidates within the same snapshot.
        let again = storage
            .take_unsold_stock_items(&mut snapshot, "prod-1", 1, "acc-2", "2026-01-02T00:00:00Z")
            .await
            .unwrap();
        assert!(again.is_empty());

        storage.commit_snapshot(snapshot).await.unwrap();
        assert_eq!(storage.count_unsold_stock_items("prod-1").await.unwrap(), 0);
        let sold = storage.get_stock_item("stk-1").await.unwrap();
        assert!(sold.sold);
        assert_eq!(sold.sold_to.as_deref(), Some("acc-1"));
        assert!(sold.sold_at.is_some());
    }

    #[tokio::test]
    async fn list_products_in_stock_filters_empty() {
        let storage = MemoryStorage::new();
        let mut snapshot = storage.begin_snapshot().await.unwrap();
        for (id, stock) in [("prod-1", 3), ("prod-2", 0)] {
            storage
                .insert_product(
                    &mut snapshot,
                    ProductRecord {
                        id: id.to_string(),
                        name: format!("product {}", id),
                        price: Decimal::from(100),
                        description: String::new(),
                        stock,
                        fulfillment: FulfillmentMode::Counted,
                        version: 0,
                    },
                )
                .await
                .unwrap();
        }
        storage.commit_snapshot(snapshot).await.unwrap();

        let listed = storage.list_products_in_stock().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "prod-1");
    }

    #[tokio::test]
    async fn purge_removes_only_records_before_cutoff() {
        let storage = MemoryStorage::new();
        let mut snapshot = storage.begin_snapshot().await.unwrap();
        storage
            .insert_pending_topup(&mut snapshot, topup("old", "2026-01-01T00:00:00Z"))
            .await
            .unwrap();
        storage
            .insert_pending_topup(&mut snapshot, topup("fresh", "2026-01-05T00:00:00Z"))
            .await
            .unwrap();
        storage.commit_snapshot(snapshot).await.unwrap();

        let purged = storage
            .purge_expired_topups("2026-01-03T00:00:00Z")
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(storage.get_pending_topup("old").await.is_err());
        assert!(storage.get_pending_topup("fresh").await.is_ok());
    }

    #[tokio::test]
    async fn serialized_snapshots_see_committed_state() {
        let storage = MemoryStorage::new();
        let mut snapshot = storage.begin_snapshot().await.unwrap();
        storage
            .insert_account(&mut snapshot, account("acc-1", "alice"))
            .await
            .unwrap();
        storage.commit_snapshot(snapshot).await.unwrap();

        // A task racing for a snapshot blocks until the first commits, then
        // observes its effects.
        let storage2 = storage.clone();
        let handle = tokio::spawn(async move {
            let mut snapshot = storage2.begin_snapshot().await.unwrap();
            let found = storage2.get_account_for_update(&mut snapshot, "acc-1").await;
            storage2.abort_snapshot(snapshot).await.unwrap();
            found.is_ok()
        });
        assert!(handle.await.unwrap());
    }
}
