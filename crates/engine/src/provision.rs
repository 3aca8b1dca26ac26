//! Hosted-server purchase flow and server lifecycle commands.
//!
//! The money step is a single committed snapshot; vendor calls happen
//! strictly afterwards, so a vendor failure can leave a debited balance
//! with no server. That condition is surfaced as the distinct
//! [`EngineError::ProvisioningFailedAfterDebit`] and logged for
//! compensation -- it is never silently dropped and never retried
//! automatically (a blind retry could create a duplicate vendor server).

use toko_core::{PackageCatalog, PowerSignal, ServerPackage, ServerStatus};
use toko_storage::{ServerRecord, TokoStorage};

use crate::error::EngineError;
use crate::gateway::ProvisioningGateway;
use crate::ids;

/// Purchase a hosted server: debit the package price, then provision on
/// the panel, then record the server.
///
/// Never creates a vendor resource before the debit commits; never
/// reports success unless the debit, the vendor creation and the record
/// write all succeeded.
pub async fn purchase_server<S: TokoStorage, G: ProvisioningGateway>(
    storage: &S,
    gateway: &G,
    catalog: &PackageCatalog,
    account_id: &str,
    package_id: &str,
    server_name: &str,
) -> Result<ServerRecord, EngineError> {
    let name = server_name.trim();
    if name.len() < 3 {
        return Err(EngineError::InvalidInput {
            reason: "server name must be at least 3 characters".to_string(),
        });
    }
    let package = catalog
        .get(package_id)
        .ok_or(EngineError::NotFound { what: "package" })?;

    // Money boundary: debit inside one snapshot, committed before any
    // vendor call.
    let mut snapshot = storage.begin_snapshot().await.map_err(EngineError::from)?;
    let account = match storage.get_account_for_update(&mut snapshot, account_id).await {
        Ok(account) => account,
        Err(e) => {
            let _ = storage.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
    };
    if account.balance < package.price {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(EngineError::InsufficientBalance);
    }
    if let Err(e) = storage
        .update_account_funds(
            &mut snapshot,
            account_id,
            account.version,
            account.balance - package.price,
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

    // From here on the balance is gone; every failure is compensable.
    let panel_user = match gateway.ensure_panel_user(&account.username).await {
        Ok(user) => user,
        Err(e) => return Err(debited_failure(account_id, package, None, &e.to_string())),
    };
    let panel_server_id = match gateway.create_server(panel_user.id, name, package).await {
        Ok(id) => id,
        Err(e) => return Err(debited_failure(account_id, package, None, &e.to_string())),
    };

    let record = ServerRecord {
        id: ids::fresh_id("srv"),
        account_id: account_id.to_string(),
        name: format!("{} - {}", package.name, name),
        panel_server_id: panel_server_id.to_string(),
        panel_user_id: panel_user.id.to_string(),
        status: ServerStatus::Installing,
        renewal_due: ids::rfc3339_days_from_now(package.billing_period_days),
        created_at: ids::now_rfc3339(),
    };

    let mut snapshot = match storage.begin_snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            return Err(debited_failure(
                account_id,
                package,
                Some(panel_server_id),
                &e.to_string(),
            ))
        }
    };
    if let Err(e) = storage.insert_server(&mut snapshot, record.clone()).await {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(debited_failure(
            account_id,
            package,
            Some(panel_server_id),
            &e.to_string(),
        ));
    }
    if let Err(e) = storage.commit_snapshot(snapshot).await {
        return Err(debited_failure(
            account_id,
            package,
            Some(panel_server_id),
            &e.to_string(),
        ));
    }

    tracing::info!(
        server = %record.id,
        panel_server = panel_server_id,
        account = %account_id,
        package = %package.id,
        "server provisioned"
    );
    Ok(record)
}

/// Send a power lifecycle signal to a server the account owns.
///
/// Ownership is checked locally first; a server belonging to another
/// account is reported as missing rather than forbidden.
pub async fn send_power_command<S: TokoStorage, G: ProvisioningGateway>(
    storage: &S,
    gateway: &G,
    account_id: &str,
    server_id: &str,
    signal: PowerSignal,
) -> Result<(), EngineError> {
    let server = storage.get_server(server_id).await.map_err(EngineError::from)?;
    if server.account_id != account_id {
        return Err(EngineError::NotFound { what: "server" });
    }
    let panel_server_id: i64 = server.panel_server_id.parse().map_err(|_| {
        EngineError::ExternalServiceFailure {
            service: "panel",
            detail: format!("malformed panel server id '{}'", server.panel_server_id),
        }
    })?;
    gateway
        .send_power_signal(panel_server_id, signal)
        .await
        .map_err(|e| EngineError::ExternalServiceFailure {
            service: "panel",
            detail: e.to_string(),
        })
}

fn debited_failure(
    account_id: &str,
    package: &ServerPackage,
    panel_server_id: Option<i64>,
    detail: &str,
) -> EngineError {
    match panel_server_id {
        Some(panel_server) => tracing::warn!(
            account = %account_id,
            package = %package.id,
            amount = %package.price,
            panel_server,
            detail,
            "balance debited and vendor server created, but the server record write failed; manual repair required"
        ),
        None => tracing::warn!(
            account = %account_id,
            package = %package.id,
            amount = %package.price,
            detail,
            "balance debited but provisioning failed; compensation required"
        ),
    }
    EngineError::ProvisioningFailedAfterDebit {
        account_id: account_id.to_string(),
        package_id: package.id.clone(),
        amount: package.price,
        detail: detail.to_string(),
    }
}
