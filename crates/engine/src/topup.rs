//! Payment webhook reconciler.
//!
//! A top-up intent persists its pending record BEFORE the redirect URL is
//! returned, so a webhook arriving before the buyer comes back can still
//! be matched. The webhook handler never trusts the callback payload: it
//! re-verifies against the gateway's authoritative transaction-detail
//! endpoint, then applies the credit and the terminal status transition
//! in one snapshot. No snapshot is ever held across the vendor call.

use rust_decimal::Decimal;
use serde::Serialize;

use toko_core::{money, TopupStatus};
use toko_storage::{PendingTopupRecord, TokoStorage};

use crate::error::EngineError;
use crate::gateway::PaymentGateway;
use crate::ids;

/// Pending top-ups older than this are purged regardless of status; the
/// table is a reconciliation aid, not a ledger.
const RETENTION_HOURS: i64 = 48;

/// What the caller needs to send the buyer to the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct TopupIntent {
    pub order_id: String,
    pub redirect_url: String,
}

/// Acknowledgement for a webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackAck {
    /// No pending top-up with that order id; the delivery is rejected and
    /// nothing else happens.
    UnknownOrder,
    /// Verified success earlier; acknowledged without re-crediting.
    AlreadyCompleted,
    /// Previously marked failed; acknowledged.
    AlreadyFailed,
    /// Verified and credited now.
    Credited,
    /// Verification reported non-success; marked failed, nothing credited.
    MarkedFailed,
}

/// Create a top-up intent for `account_id`.
///
/// The pending record is committed before the redirect URL is built, and
/// the order id is bound to the account so a forged callback cannot
/// redirect a credit.
pub async fn create_topup_intent<S: TokoStorage, G: PaymentGateway>(
    storage: &S,
    gateway: &G,
    account_id: &str,
    amount: Decimal,
) -> Result<TopupIntent, EngineError> {
    if !money::is_valid_topup(amount) {
        return Err(EngineError::InvalidInput {
            reason: format!(
                "top-up amount must be a whole amount of at least {}",
                money::min_topup()
            ),
        });
    }
    let account = storage.get_account(account_id).await.map_err(EngineError::from)?;

    let order_id = ids::topup_order_id(&account.id);
    let record = PendingTopupRecord {
        order_id: order_id.clone(),
        account_id: account.id,
        amount,
        status: TopupStatus::Pending,
        created_at: ids::now_rfc3339(),
    };

    let mut snapshot = storage.begin_snapshot().await.map_err(EngineError::from)?;
    if let Err(e) = storage.insert_pending_topup(&mut snapshot, record).await {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    storage
        .commit_snapshot(snapshot)
        .await
        .map_err(EngineError::from)?;

    let redirect_url = gateway.payment_url(&amount, &order_id);
    tracing::debug!(order = %order_id, amount = %amount, "top-up intent created");
    Ok(TopupIntent {
        order_id,
        redirect_url,
    })
}

/// Handle a webhook delivery for `order_id`.
///
/// `claimed_status` is whatever the callback body asserted; it is logged
/// as advisory context and plays no part in the decision. Duplicate
/// deliveries of a completed order are acknowledged without re-crediting.
pub async fn handle_callback<S: TokoStorage, G: PaymentGateway>(
    storage: &S,
    gateway: &G,
    order_id: &str,
    claimed_status: Option<&str>,
) -> Result<CallbackAck, EngineError> {
    let record = match storage.get_pending_topup(order_id).await {
        Ok(record) => record,
        Err(toko_storage::StorageError::NotFound { .. }) => {
            tracing::debug!(order = %order_id, "webhook for unknown order rejected");
            return Ok(CallbackAck::UnknownOrder);
        }
        Err(e) => return Err(e.into()),
    };
    match record.status {
        TopupStatus::Completed => return Ok(CallbackAck::AlreadyCompleted),
        TopupStatus::Failed => return Ok(CallbackAck::AlreadyFailed),
        TopupStatus::Pending => {}
    }
    if let Some(claimed) = claimed_status {
        tracing::debug!(order = %order_id, claimed, "webhook claimed status (advisory only)");
    }

    // Authoritative server-to-server verification; the store transaction
    // starts only after this call returns.
    let verification = gateway
        .verify(order_id, &record.amount)
        .await
        .map_err(|e| {
            tracing::warn!(order = %order_id, detail = %e, "top-up verification unreachable; left pending");
            EngineError::ExternalServiceFailure {
                service: "payment gateway",
                detail: e.to_string(),
            }
        })?;

    let mut snapshot = storage.begin_snapshot().await.map_err(EngineError::from)?;
    let current = match storage
        .get_pending_topup_for_update(&mut snapshot, order_id)
        .await
    {
        Ok(current) => current,
        Err(e) => {
            let _ = storage.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
    };
    // A concurrent delivery may have won the race while we were verifying.
    match current.status {
        TopupStatus::Completed => {
            let _ = storage.abort_snapshot(snapshot).await;
            return Ok(CallbackAck::AlreadyCompleted);
        }
        TopupStatus::Failed => {
            let _ = storage.abort_snapshot(snapshot).await;
            return Ok(CallbackAck::AlreadyFailed);
        }
        TopupStatus::Pending => {}
    }

    if verification.paid {
        let account = match storage
            .get_account_for_update(&mut snapshot, &current.account_id)
            .await
        {
            Ok(account) => account,
            Err(e) => {
                let _ = storage.abort_snapshot(snapshot).await;
                return Err(e.into());
            }
        };
        if let Err(e) = storage
            .update_account_funds(
                &mut snapshot,
                &account.id,
                account.version,
                account.balance + current.amount,
                account.transaction_count + 1,
            )
            .await
        {
            let _ = storage.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
        if let Err(e) = storage
            .update_topup_status(&mut snapshot, order_id, TopupStatus::Completed)
            .await
        {
            let _ = storage.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
        storage
            .commit_snapshot(snapshot)
            .await
            .map_err(EngineError::from)?;
        tracing::info!(order = %order_id, amount = %current.amount, "top-up credited");
        Ok(CallbackAck::Credited)
    } else {
        if let Err(e) = storage
            .update_topup_status(&mut snapshot, order_id, TopupStatus::Failed)
            .await
        {
            let _ = storage.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
        storage
            .commit_snapshot(snapshot)
            .await
            .map_err(EngineError::from)?;
        tracing::info!(
            order = %order_id,
            vendor_status = %verification.vendor_status,
            "top-up verification reported non-success; marked failed"
        );
        Ok(CallbackAck::MarkedFailed)
    }
}

/// Purge pending top-ups older than the retention window. Returns the
/// number purged.
pub async fn purge_expired_topups<S: TokoStorage>(storage: &S) -> Result<usize, EngineError> {
    let cutoff = ids::rfc3339_hours_ago(RETENTION_HOURS);
    storage
        .purge_expired_topups(&cutoff)
        .await
        .map_err(EngineError::from)
}
