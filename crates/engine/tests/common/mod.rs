//! Shared test fixtures: mock vendor gateways and a sample package
//! catalog.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use toko_core::{PackageCatalog, PowerSignal, ServerPackage};
use toko_engine::gateway::{
    GatewayError, PanelUser, PaymentGateway, PaymentVerification, ProvisioningGateway,
};

/// Panel mock: hands out user id 77, sequential server ids from 9000, and
/// records every call. `failing()` rejects server creation the way the
/// panel rejects a bad configuration.
pub struct MockProvisioningGateway {
    fail_create: bool,
    next_server_id: AtomicI64,
    pub created_servers: Arc<Mutex<Vec<String>>>,
    pub power_signals: Arc<Mutex<Vec<(i64, PowerSignal)>>>,
}

impl MockProvisioningGateway {
    pub fn new() -> Self {
        MockProvisioningGateway {
            fail_create: false,
            next_server_id: AtomicI64::new(9000),
            created_servers: Arc::new(Mutex::new(Vec::new())),
            power_signals: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        MockProvisioningGateway {
            fail_create: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl ProvisioningGateway for MockProvisioningGateway {
    async fn ensure_panel_user(&self, username: &str) -> Result<PanelUser, GatewayError> {
        Ok(PanelUser {
            id: 77,
            username: username.to_string(),
            email: format!("{}@panel.test", username),
        })
    }

    async fn create_server(
        &self,
        _panel_user_id: i64,
        server_name: &str,
        _package: &ServerPackage,
    ) -> Result<i64, GatewayError> {
        if self.fail_create {
            return Err(GatewayError::VendorRejected {
                detail: "No viable allocation could be found.".to_string(),
            });
        }
        self.created_servers
            .lock()
            .unwrap()
            .push(server_name.to_string());
        Ok(self.next_server_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn send_power_signal(
        &self,
        panel_server_id: i64,
        signal: PowerSignal,
    ) -> Result<(), GatewayError> {
        self.power_signals
            .lock()
            .unwrap()
            .push((panel_server_id, signal));
        Ok(())
    }
}

/// Payment mock: orders marked via `set_paid` verify as success,
/// everything else as pending. `set_unreachable` simulates the vendor API
/// being down; verification calls are counted either way.
pub struct MockPaymentGateway {
    paid_orders: Mutex<HashMap<String, bool>>,
    unreachable: AtomicBool,
    pub verify_calls: AtomicI64,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        MockPaymentGateway {
            paid_orders: Mutex::new(HashMap::new()),
            unreachable: AtomicBool::new(false),
            verify_calls: AtomicI64::new(0),
        }
    }

    pub fn set_paid(&self, order_id: &str, paid: bool) {
        self.paid_orders
            .lock()
            .unwrap()
            .insert(order_id.to_string(), paid);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn verify_call_count(&self) -> i64 {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn payment_url(&self, amount: &Decimal, order_id: &str) -> String {
        format!(
            "https://pay.test/pay/demo/{}?order_id={}&qris_only=1",
            amount.normalize(),
            order_id
        )
    }

    async fn verify(
        &self,
        order_id: &str,
        _amount: &Decimal,
    ) -> Result<PaymentVerification, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(GatewayError::RequestFailed {
                endpoint: "transactiondetail".to_string(),
                message: "connection timed out".to_string(),
            });
        }
        let paid = self
            .paid_orders
            .lock()
            .unwrap()
            .get(order_id)
            .copied()
            .unwrap_or(false);
        Ok(PaymentVerification {
            paid,
            vendor_status: if paid { "completed" } else { "pending" }.to_string(),
        })
    }
}

/// One-package catalog: 5000 minor units per 30 days, deploy location 1.
pub fn sample_catalog() -> PackageCatalog {
    PackageCatalog::from_json(&serde_json::json!([
        {
            "id": "nodejs-1gb",
            "name": "NodeJS 1GB",
            "price": "5000",
            "egg_id": 15,
            "nest_id": 5,
            "docker_image": "ghcr.io/parkervcp/yolks:nodejs_18",
            "startup_command": "npm start",
            "limits": { "memory": 1024, "disk": 2048, "cpu": 50, "swap": 0, "io": 500 },
            "feature_limits": { "databases": 1, "backups": 1, "allocations": 1 },
            "location_id": 1
        }
    ]))
    .expect("sample catalog is valid")
}
