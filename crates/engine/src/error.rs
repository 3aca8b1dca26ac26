//! Engine error taxonomy.
//!
//! Validation and business-rule failures are detected before any mutation
//! and abort with zero side effects. Every variant maps to a stable,
//! non-leaking message; vendor detail strings ride along in fields that
//! are logged, never displayed.

use std::fmt;

use rust_decimal::Decimal;

use toko_storage::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The referenced account, product, package, order, invoice or server
    /// is missing.
    NotFound { what: &'static str },
    /// Malformed quantity, amount or name.
    InvalidInput { reason: String },
    /// The account balance does not cover the charge.
    InsufficientBalance,
    /// Counted stock does not cover the requested quantity.
    InsufficientInventory,
    /// Not enough unsold unique items to fulfil the purchase.
    InsufficientPhysicalInventory,
    /// A unique constraint was violated (username, product name, ...).
    DuplicateResource { what: &'static str },
    /// A vendor API was unreachable or rejected the request before any
    /// money moved.
    ExternalServiceFailure {
        service: &'static str,
        detail: String,
    },
    /// The store reported a conflict or timeout; the whole call may be
    /// retried by the caller.
    TransientStoreFailure,
    /// The balance was debited but the vendor resource does not exist.
    /// Requires compensation and is never collapsed into a generic
    /// failure.
    ProvisioningFailedAfterDebit {
        account_id: String,
        package_id: String,
        amount: Decimal,
        detail: String,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotFound { what } => write!(f, "{} not found", what),
            EngineError::InvalidInput { reason } => write!(f, "invalid input: {}", reason),
            EngineError::InsufficientBalance => {
                write!(f, "balance is not sufficient for this transaction")
            }
            EngineError::InsufficientInventory => {
                write!(f, "product stock is not sufficient")
            }
            EngineError::InsufficientPhysicalInventory => {
                write!(f, "not enough unique stock items available")
            }
            EngineError::DuplicateResource { what } => write!(f, "{} already exists", what),
            EngineError::ExternalServiceFailure { service, .. } => {
                write!(f, "{} request failed", service)
            }
            EngineError::TransientStoreFailure => {
                write!(f, "temporary storage failure, please retry")
            }
            EngineError::ProvisioningFailedAfterDebit { .. } => write!(
                f,
                "balance was debited but server provisioning failed; an administrator will compensate the charge"
            ),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { entity, .. } => EngineError::NotFound { what: entity },
            StorageError::DuplicateKey { entity, .. } => {
                EngineError::DuplicateResource { what: entity }
            }
            StorageError::ConcurrentConflict { .. } | StorageError::Backend(_) => {
                EngineError::TransientStoreFailure
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_do_not_leak_detail() {
        let err = EngineError::ExternalServiceFailure {
            service: "payment gateway",
            detail: "connection refused to 10.0.0.3:443".to_string(),
        };
        assert_eq!(err.to_string(), "payment gateway request failed");

        let err = EngineError::ProvisioningFailedAfterDebit {
            account_id: "acc-1".to_string(),
            package_id: "pkg-1".to_string(),
            amount: Decimal::from(5000),
            detail: "panel returned status 502".to_string(),
        };
        assert!(!err.to_string().contains("502"));
    }

    #[test]
    fn storage_errors_map_to_taxonomy() {
        let e: EngineError = StorageError::ConcurrentConflict {
            entity: "account",
            id: "acc-1".to_string(),
            expected_version: 3,
        }
        .into();
        assert_eq!(e, EngineError::TransientStoreFailure);

        let e: EngineError = StorageError::DuplicateKey {
            entity: "invoice",
            key: "INV-1".to_string(),
        }
        .into();
        assert_eq!(e, EngineError::DuplicateResource { what: "invoice" });

        let e: EngineError = StorageError::NotFound {
            entity: "product",
            id: "prod-9".to_string(),
        }
        .into();
        assert_eq!(e, EngineError::NotFound { what: "product" });
    }
}
