//! Status and mode enums shared between records and engine operations.

use serde::{Deserialize, Serialize};

/// How purchases of a product are fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentMode {
    /// Stock is a bare quantity counter; nothing is distributed per unit.
    Counted,
    /// Stock is backed by individually sellable unique items (license
    /// keys, vouchers) that are distributed on purchase.
    UniqueItems,
}

/// Invoice lifecycle. Invoices are created `Paid`; `Cancelled` exists as a
/// terminal state for admin correction and is never re-opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Cancelled,
}

/// Lifecycle of a provisioned server as tracked locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Installing,
    Active,
    Suspended,
    Unknown,
}

/// State machine of a pending top-up: `Pending` transitions exactly once
/// to `Completed` or `Failed`; both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopupStatus {
    Pending,
    Completed,
    Failed,
}

/// Power lifecycle signal accepted by the provisioning panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSignal {
    Start,
    Stop,
    Restart,
    Kill,
}

impl PowerSignal {
    /// The signal string the panel API expects.
    pub fn as_str(self) -> &'static str {
        match self {
            PowerSignal::Start => "start",
            PowerSignal::Stop => "stop",
            PowerSignal::Restart => "restart",
            PowerSignal::Kill => "kill",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_signal_strings() {
        assert_eq!(PowerSignal::Start.as_str(), "start");
        assert_eq!(PowerSignal::Kill.as_str(), "kill");
    }

    #[test]
    fn status_wire_spellings() {
        assert_eq!(
            serde_json::to_value(InvoiceStatus::Paid).unwrap(),
            serde_json::json!("PAID")
        );
        assert_eq!(
            serde_json::to_value(TopupStatus::Completed).unwrap(),
            serde_json::json!("completed")
        );
        assert_eq!(
            serde_json::to_value(ServerStatus::Installing).unwrap(),
            serde_json::json!("installing")
        );
        assert_eq!(
            serde_json::to_value(FulfillmentMode::UniqueItems).unwrap(),
            serde_json::json!("unique_items")
        );
    }
}
