//! Registration and admin operations: balance adjustment, product CRUD,
//! stock management, notices.
//!
//! Authorization is the routing layer's job; these functions assume the
//! caller already established the admin role where it matters.

use rust_decimal::Decimal;

use toko_core::FulfillmentMode;
use toko_storage::{AccountRecord, NoticeRecord, ProductRecord, StockItemRecord, TokoStorage};

use crate::error::EngineError;
use crate::ids;

/// Register a new account with a zero balance.
pub async fn register_account<S: TokoStorage>(
    storage: &S,
    username: &str,
    credential_hash: &str,
) -> Result<AccountRecord, EngineError> {
    let username = username.trim();
    if username.len() < 3 {
        return Err(EngineError::InvalidInput {
            reason: "username must be at least 3 characters".to_string(),
        });
    }
    if credential_hash.is_empty() {
        return Err(EngineError::InvalidInput {
            reason: "credential hash must not be empty".to_string(),
        });
    }

    let record = AccountRecord {
        id: ids::fresh_id("acc"),
        username: username.to_string(),
        credential_hash: credential_hash.to_string(),
        balance: Decimal::ZERO,
        transaction_count: 0,
        is_admin: false,
        version: 0,
        created_at: ids::now_rfc3339(),
    };

    let mut snapshot = storage.begin_snapshot().await.map_err(EngineError::from)?;
    if let Err(e) = storage.insert_account(&mut snapshot, record.clone()).await {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    storage
        .commit_snapshot(snapshot)
        .await
        .map_err(EngineError::from)?;
    Ok(record)
}

/// Admin credit of `amount` onto the account named `username`.
/// Returns the new balance.
pub async fn adjust_balance<S: TokoStorage>(
    storage: &S,
    username: &str,
    amount: Decimal,
) -> Result<Decimal, EngineError> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::InvalidInput {
            reason: "adjustment amount must be positive".to_string(),
        });
    }
    let account = storage
        .get_account_by_username(username)
        .await
        .map_err(EngineError::from)?;

    let mut snapshot = storage.begin_snapshot().await.map_err(EngineError::from)?;
    let account = match storage.get_account_for_update(&mut snapshot, &account.id).await {
        Ok(account) => account,
        Err(e) => {
            let _ = storage.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
    };
    let new_balance = account.balance + amount;
    if let Err(e) = storage
        .update_account_funds(
            &mut snapshot,
            &account.id,
            account.version,
            new_balance,
            account.transaction_count + 1,
        )
        .await
    {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    storage
        .commit_snapshot(snapshot)
        .await
        .map_err(EngineError::from)?;
    tracing::info!(account = %account.id, amount = %amount, "admin balance adjustment");
    Ok(new_balance)
}

/// Create a product with zero stock.
pub async fn create_product<S: TokoStorage>(
    storage: &S,
    name: &str,
    price: Decimal,
    description: &str,
    fulfillment: FulfillmentMode,
) -> Result<ProductRecord, EngineError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidInput {
            reason: "product name must not be empty".to_string(),
        });
    }
    if price <= Decimal::ZERO {
        return Err(EngineError::InvalidInput {
            reason: "price must be positive".to_string(),
        });
    }

    let record = ProductRecord {
        id: ids::fresh_id("prod"),
        name: name.to_string(),
        price,
        description: description.to_string(),
        stock: 0,
        fulfillment,
        version: 0,
    };

    let mut snapshot = storage.begin_snapshot().await.map_err(EngineError::from)?;
    if let Err(e) = storage.insert_product(&mut snapshot, record.clone()).await {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    storage
        .commit_snapshot(snapshot)
        .await
        .map_err(EngineError::from)?;
    Ok(record)
}

/// Delete a product by id.
pub async fn delete_product<S: TokoStorage>(
    storage: &S,
    product_id: &str,
) -> Result<(), EngineError> {
    let mut snapshot = storage.begin_snapshot().await.map_err(EngineError::from)?;
    if let Err(e) = storage.delete_product(&mut snapshot, product_id).await {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    storage
        .commit_snapshot(snapshot)
        .await
        .map_err(EngineError::from)
}

/// Bulk-insert unique stock items and raise the product's counted stock
/// by the same amount, in one transaction. Returns the new stock level.
pub async fn add_stock_items<S: TokoStorage>(
    storage: &S,
    product_id: &str,
    payloads: Vec<String>,
) -> Result<i64, EngineError> {
    if payloads.is_empty() {
        return Err(EngineError::InvalidInput {
            reason: "at least one stock item is required".to_string(),
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

    let inserted = payloads.len() as i64;
    let records = payloads
        .into_iter()
        .map(|unique_data| StockItemRecord {
            id: ids::fresh_id("stk"),
            product_id: product_id.to_string(),
            unique_data,
            sold: false,
            sold_to: None,
            sold_at: None,
        })
        .collect();
    if let Err(e) = storage.insert_stock_items(&mut snapshot, records).await {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(e.into());
    }

    let new_stock = product.stock + inserted;
    if let Err(e) = storage
        .update_product_stock(&mut snapshot, product_id, product.version, new_stock)
        .await
    {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    storage
        .commit_snapshot(snapshot)
        .await
        .map_err(EngineError::from)?;
    Ok(new_stock)
}

/// Raise a counted product's stock by `quantity`. Unique-item products
/// are restocked through [`add_stock_items`] so the counter stays in sync
/// with the items.
pub async fn restock<S: TokoStorage>(
    storage: &S,
    product_id: &str,
    quantity: i64,
) -> Result<i64, EngineError> {
    if quantity < 1 {
        return Err(EngineError::InvalidInput {
            reason: "restock quantity must be at least 1".to_string(),
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
    if product.fulfillment == FulfillmentMode::UniqueItems {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(EngineError::InvalidInput {
            reason: "unique-item products are restocked by adding stock items".to_string(),
        });
    }
    let new_stock = product.stock + quantity;
    if let Err(e) = storage
        .update_product_stock(&mut snapshot, product_id, product.version, new_stock)
        .await
    {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    storage
        .commit_snapshot(snapshot)
        .await
        .map_err(EngineError::from)?;
    Ok(new_stock)
}

/// Post a dashboard notice.
pub async fn post_notice<S: TokoStorage>(
    storage: &S,
    author_id: &str,
    title: &str,
    content: &str,
) -> Result<NoticeRecord, EngineError> {
    if title.trim().is_empty() {
        return Err(EngineError::InvalidInput {
            reason: "notice title must not be empty".to_string(),
        });
    }

    let record = NoticeRecord {
        id: ids::fresh_id("ntc"),
        title: title.trim().to_string(),
        content: content.to_string(),
        author_id: author_id.to_string(),
        created_at: ids::now_rfc3339(),
    };

    let mut snapshot = storage.begin_snapshot().await.map_err(EngineError::from)?;
    if let Err(e) = storage.insert_notice(&mut snapshot, record.clone()).await {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    storage
        .commit_snapshot(snapshot)
        .await
        .map_err(EngineError::from)?;
    Ok(record)
}
