//! Read-side views: the dashboard summary and owner-scoped invoice
//! resolution.

use rust_decimal::Decimal;
use serde::Serialize;

use toko_storage::{InvoiceRecord, NoticeRecord, ProductRecord, StorageError, TokoStorage};

use crate::error::EngineError;

/// Everything the storefront landing page needs.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub username: String,
    pub balance: Decimal,
    pub transaction_count: i64,
    /// Products with stock above zero.
    pub products: Vec<ProductRecord>,
    /// Notices, newest first.
    pub notices: Vec<NoticeRecord>,
}

pub async fn dashboard<S: TokoStorage>(
    storage: &S,
    account_id: &str,
) -> Result<DashboardData, EngineError> {
    let account = storage.get_account(account_id).await.map_err(EngineError::from)?;
    let products = storage
        .list_products_in_stock()
        .await
        .map_err(EngineError::from)?;
    let notices = storage.list_notices().await.map_err(EngineError::from)?;
    Ok(DashboardData {
        username: account.username,
        balance: account.balance,
        transaction_count: account.transaction_count,
        products,
        notices,
    })
}

/// An invoice with its distributed item payloads resolved.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceView {
    pub invoice: InvoiceRecord,
    pub product_name: String,
    /// The opaque payloads (license keys, vouchers) this purchase
    /// distributed, in allocation order.
    pub item_payloads: Vec<String>,
}

/// Look up an invoice by number, scoped to its owner. Someone else's
/// invoice number reads as missing.
pub async fn invoice_detail<S: TokoStorage>(
    storage: &S,
    account_id: &str,
    invoice_number: &str,
) -> Result<InvoiceView, EngineError> {
    let invoice = storage
        .get_invoice(invoice_number)
        .await
        .map_err(EngineError::from)?;
    if invoice.account_id != account_id {
        return Err(EngineError::NotFound { what: "invoice" });
    }

    let product_name = match storage.get_product(&invoice.product_id).await {
        Ok(product) => product.name,
        // The product may have been deleted since; the invoice still stands.
        Err(StorageError::NotFound { .. }) => "(removed)".to_string(),
        Err(e) => return Err(e.into()),
    };

    let mut item_payloads = Vec::with_capacity(invoice.distributed_items.len());
    for item_id in &invoice.distributed_items {
        let item = storage.get_stock_item(item_id).await.map_err(EngineError::from)?;
        item_payloads.push(item.unique_data);
    }

    Ok(InvoiceView {
        invoice,
        product_name,
        item_payloads,
    })
}
