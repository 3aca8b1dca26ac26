//! Purchase transaction coordinator.
//!
//! Validates and applies a purchase as one atomic storage snapshot:
//! balance debit, stock decrement, unique-item allocation and invoice
//! creation either all commit or none do. Any violated precondition
//! aborts with zero side effects.

use rust_decimal::Decimal;
use serde::Serialize;

use toko_core::{money, FulfillmentMode, InvoiceStatus};
use toko_storage::{InvoiceRecord, TokoStorage};

use crate::error::EngineError;
use crate::ids;
use crate::inventory;

/// What the buyer gets back after a successful purchase.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub invoice_number: String,
    pub product_name: String,
    pub quantity: i64,
    pub total_amount: Decimal,
    /// Ids of the stock items distributed; empty for counted-mode
    /// products. Payloads are resolved through the invoice view.
    pub distributed_items: Vec<String>,
}

/// Purchase `quantity` units of `product_id` for `account_id`.
///
/// Precondition order: product exists, quantity is at least 1, counted
/// stock covers the quantity, balance covers the total, and (for
/// unique-item products) enough unsold items can be marked. The
/// unique-item check runs under the same snapshot isolation as the
/// marking itself, which is what prevents a double sale.
///
/// Not idempotent per request: a caller retrying a timed-out call can
/// purchase twice. Retries are the caller's responsibility.
pub async fn purchase<S: TokoStorage>(
    storage: &S,
    account_id: &str,
    product_id: &str,
    quantity: i64,
) -> Result<PurchaseReceipt, EngineError> {
    if quantity < 1 {
        return Err(EngineError::InvalidInput {
            reason: "quantity must be at least 1".to_string(),
        });
    }

    let mut snapshot = storage.begin_snapshot().await.map_err(EngineError::from)?;

    let product = match storage.get_product_for_update(&mut snapshot, product_id).await {
        Ok(product) => product,
        Err(e) => {
            let _ = storage.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
    };
    let account = match storage.get_account_for_update(&mut snapshot, account_id).await {
        Ok(account) => account,
        Err(e) => {
            let _ = storage.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
    };

    let total = match money::line_total(product.price, quantity) {
        Some(total) => total,
        None => {
            let _ = storage.abort_snapshot(snapshot).await;
            return Err(EngineError::InvalidInput {
                reason: "total amount overflows".to_string(),
            });
        }
    };

    if product.stock < quantity {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(EngineError::InsufficientInventory);
    }
    if account.balance < total {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(EngineError::InsufficientBalance);
    }

    let purchased_at = ids::now_rfc3339();
    let distributed = if product.fulfillment == FulfillmentMode::UniqueItems {
        match inventory::allocate(
            storage,
            &mut snapshot,
            product_id,
            quantity,
            account_id,
            &purchased_at,
        )
        .await
        {
            Ok(items) => items,
            Err(e) => {
                let _ = storage.abort_snapshot(snapshot).await;
                return Err(e);
            }
        }
    } else {
        Vec::new()
    };

    if let Err(e) = storage
        .update_account_funds(
            &mut snapshot,
            account_id,
            account.version,
            account.balance - total,
            account.transaction_count + 1,
        )
        .await
    {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    if let Err(e) = storage
        .update_product_stock(
            &mut snapshot,
            product_id,
            product.version,
            product.stock - quantity,
        )
        .await
    {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(e.into());
    }

    let invoice = InvoiceRecord {
        invoice_number: ids::invoice_number(),
        account_id: account_id.to_string(),
        product_id: product_id.to_string(),
        quantity,
        total_amount: total,
        status: InvoiceStatus::Paid,
        purchased_at,
        distributed_items: distributed.clone(),
    };
    let invoice_number = invoice.invoice_number.clone();
    if let Err(e) = storage.insert_invoice(&mut snapshot, invoice).await {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(e.into());
    }

    storage
        .commit_snapshot(snapshot)
        .await
        .map_err(EngineError::from)?;

    tracing::info!(
        invoice = %invoice_number,
        account = %account_id,
        product = %product_id,
        quantity,
        total = %total,
        "purchase committed"
    );

    Ok(PurchaseReceipt {
        invoice_number,
        product_name: product.name,
        quantity,
        total_amount: total,
        distributed_items: distributed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use toko_storage::MemoryStorage;

    #[tokio::test]
    async fn zero_quantity_is_invalid_input() {
        let storage = MemoryStorage::new();
        let err = purchase(&storage, "acc-1", "prod-1", 0).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let storage = MemoryStorage::new();
        let err = purchase(&storage, "acc-1", "prod-1", 1).await.unwrap_err();
        assert_eq!(err, EngineError::NotFound { what: "product" });
    }
}
