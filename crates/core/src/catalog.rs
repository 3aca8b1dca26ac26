//! Hosted-server package catalog.
//!
//! Packages are an explicit configuration structure loaded once at startup
//! and injected into the provisioning flow, keyed by package id. Prices,
//! vendor template ids and resource limits all live here; nothing in the
//! engine hardcodes a package.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Hard resource limits applied to a provisioned server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory in MiB.
    pub memory: u32,
    /// Disk in MiB.
    pub disk: u32,
    /// CPU as a percentage (100 = one core).
    pub cpu: u32,
    /// Swap in MiB; -1 means unlimited on the panel side.
    pub swap: i64,
    /// Block IO weight.
    pub io: u32,
}

/// Feature limits applied to a provisioned server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureLimits {
    pub databases: u32,
    pub backups: u32,
    pub allocations: u32,
}

/// One purchasable hosted-server package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerPackage {
    pub id: String,
    pub name: String,
    /// Price per billing period, in minor units.
    pub price: Decimal,
    /// Vendor application-template ("egg") id.
    pub egg_id: u32,
    /// Vendor template-category ("nest") id.
    pub nest_id: u32,
    pub docker_image: String,
    pub startup_command: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    pub limits: ResourceLimits,
    pub feature_limits: FeatureLimits,
    /// Deployment location the panel should place the server in. Either
    /// this or `allocation_id` must be set; server creation fails loudly
    /// otherwise.
    #[serde(default)]
    pub location_id: Option<u32>,
    /// Explicit network allocation, as an alternative to location deploy.
    #[serde(default)]
    pub allocation_id: Option<u32>,
    #[serde(default = "default_billing_period_days")]
    pub billing_period_days: i64,
}

fn default_billing_period_days() -> i64 {
    30
}

/// Package configuration table, keyed by package id.
#[derive(Debug, Clone, Default)]
pub struct PackageCatalog {
    packages: BTreeMap<String, ServerPackage>,
}

impl PackageCatalog {
    /// Build a catalog from a list of packages. A later package with the
    /// same id replaces an earlier one.
    pub fn new(packages: Vec<ServerPackage>) -> Self {
        let packages = packages.into_iter().map(|p| (p.id.clone(), p)).collect();
        PackageCatalog { packages }
    }

    /// Load a catalog from a JSON array of package objects.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let packages: Vec<ServerPackage> = serde_json::from_value(value.clone())?;
        Ok(Self::new(packages))
    }

    pub fn get(&self, package_id: &str) -> Option<&ServerPackage> {
        self.packages.get(package_id)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
