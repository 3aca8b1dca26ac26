//! Inventory allocator for unique-item products.

use crate::error::EngineError;
use toko_storage::TokoStorage;

/// Reserve exactly `quantity` unsold items of `product_id` for `buyer_id`,
/// marking them sold inside the caller's snapshot.
///
/// Exclusivity: the storage marks candidates conditionally and reports how
/// many it actually marked; anything short of `quantity` makes the caller
/// abort the snapshot, so two concurrent purchases can never end up
/// holding the same item. Items are taken in insertion order.
///
/// Not idempotent -- calling twice allocates twice. Call exactly once per
/// logical purchase.
pub async fn allocate<S: TokoStorage>(
    storage: &S,
    snapshot: &mut S::Snapshot,
    product_id: &str,
    quantity: i64,
    buyer_id: &str,
    sold_at: &str,
) -> Result<Vec<String>, EngineError> {
    let marked = storage
        .take_unsold_stock_items(snapshot, product_id, quantity, buyer_id, sold_at)
        .await?;
    if (marked.len() as i64) < quantity {
        return Err(EngineError::InsufficientPhysicalInventory);
    }
    Ok(marked)
}
