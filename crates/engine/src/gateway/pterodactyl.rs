//! Provisioning gateway speaking a Pterodactyl-compatible panel's
//! application API.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime, with a bounded per-gateway timeout. Panel
//! validation errors are surfaced with the vendor-provided detail strings
//! joined, never swallowed.

use std::time::Duration;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;

use toko_core::{PowerSignal, ServerPackage};

use super::{encode_query, GatewayError, PanelUser, ProvisioningGateway};

/// Client for the panel's application API.
#[derive(Clone)]
pub struct PterodactylGateway {
    base_url: String,
    api_key: String,
    /// Domain for the deterministic account-to-panel email mapping.
    email_domain: String,
    timeout: Duration,
}

impl PterodactylGateway {
    pub fn new(base_url: &str, api_key: &str, email_domain: &str) -> Self {
        PterodactylGateway {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            email_domain: email_domain.to_string(),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Panel email for a local account: non-alphanumerics stripped from
    /// the username, fixed domain appended.
    fn panel_email(&self, username: &str) -> String {
        let local: String = username.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        format!("{}@{}", local, self.email_domain)
    }

    /// Panel username: alphanumerics and underscores only, at most 15
    /// characters (the panel's own limit).
    fn panel_username(username: &str) -> String {
        username
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .take(15)
            .collect()
    }

    fn agent(&self) -> ureq::Agent {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .http_status_as_error(false)
            .build();
        ureq::Agent::new_with_config(config)
    }

    fn get_json(&self, path: &str) -> Result<serde_json::Value, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .agent()
            .get(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .call()
            .map_err(|e| GatewayError::RequestFailed {
                endpoint: path.to_string(),
                message: e.to_string(),
            })?;
        read_checked_json(path, response)
    }

    fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .agent()
            .post(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .send_json(body)
            .map_err(|e| GatewayError::RequestFailed {
                endpoint: path.to_string(),
                message: e.to_string(),
            })?;
        read_checked_json(path, response)
    }

    /// POST where success carries no body (the panel answers 204).
    fn post_expect_no_content(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(), GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .agent()
            .post(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .send_json(body)
            .map_err(|e| GatewayError::RequestFailed {
                endpoint: path.to_string(),
                message: e.to_string(),
            })?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.into_body().read_to_string().unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .map(|v| vendor_detail(&v, status.as_u16()))
            .unwrap_or_else(|| format!("panel returned status {}", status.as_u16()));
        Err(GatewayError::VendorRejected { detail })
    }

    fn ensure_panel_user_blocking(&self, username: &str) -> Result<PanelUser, GatewayError> {
        let email = self.panel_email(username);
        let panel_name = Self::panel_username(username);

        let found = self.get_json(&format!(
            "/api/application/users?filter%5Bemail%5D={}",
            encode_query(&email)
        ))?;
        if let Some(user) = first_user(&found) {
            return Ok(user);
        }

        let found = self.get_json(&format!(
            "/api/application/users?filter%5Busername%5D={}",
            encode_query(&panel_name)
        ))?;
        if let Some(user) = first_user(&found) {
            return Ok(user);
        }

        let body = serde_json::json!({
            "email": email,
            "username": panel_name,
            "first_name": username,
            "last_name": "User",
            "password": random_credential(12),
        });
        let created = self.post_json("/api/application/users", &body)?;
        parse_user(&created["attributes"]).ok_or_else(|| GatewayError::UnexpectedResponse {
            message: "created user response is missing attributes".to_string(),
        })
    }
}

#[async_trait]
impl ProvisioningGateway for PterodactylGateway {
    async fn ensure_panel_user(&self, username: &str) -> Result<PanelUser, GatewayError> {
        let client = self.clone();
        let username = username.to_string();
        tokio::task::spawn_blocking(move || client.ensure_panel_user_blocking(&username))
            .await
            .map_err(|e| GatewayError::RequestFailed {
                endpoint: "/api/application/users".to_string(),
                message: format!("task join error: {}", e),
            })?
    }

    async fn create_server(
        &self,
        panel_user_id: i64,
        server_name: &str,
        package: &ServerPackage,
    ) -> Result<i64, GatewayError> {
        let body = server_payload(panel_user_id, server_name, package)?;
        let client = self.clone();
        let created = tokio::task::spawn_blocking(move || {
            client.post_json("/api/application/servers", &body)
        })
        .await
        .map_err(|e| GatewayError::RequestFailed {
            endpoint: "/api/application/servers".to_string(),
            message: format!("task join error: {}", e),
        })??;
        created["attributes"]["id"]
            .as_i64()
            .ok_or_else(|| GatewayError::UnexpectedResponse {
                message: "created server response is missing attributes.id".to_string(),
            })
    }

    async fn send_power_signal(
        &self,
        panel_server_id: i64,
        signal: PowerSignal,
    ) -> Result<(), GatewayError> {
        let client = self.clone();
        let path = format!("/api/application/servers/{}/power", panel_server_id);
        let body = serde_json::json!({ "signal": signal.as_str() });
        tokio::task::spawn_blocking(move || client.post_expect_no_content(&path, &body))
            .await
            .map_err(|e| GatewayError::RequestFailed {
                endpoint: "power".to_string(),
                message: format!("task join error: {}", e),
            })?
    }
}

/// Build the server-creation payload. Requires either an explicit
/// allocation or a deployment location; rejecting locally keeps a
/// misconfigured package from half-failing on the panel.
fn server_payload(
    panel_user_id: i64,
    server_name: &str,
    package: &ServerPackage,
) -> Result<serde_json::Value, GatewayError> {
    let mut body = serde_json::json!({
        "name": server_name,
        "user": panel_user_id,
        "egg": package.egg_id,
        "nest": package.nest_id,
        "docker_image": package.docker_image,
        "startup": package.startup_command,
        "environment": package.environment,
        "limits": {
            "memory": package.limits.memory,
            "swap": package.limits.swap,
            "disk": package.limits.disk,
            "io": package.limits.io,
            "cpu": package.limits.cpu,
        },
        "feature_limits": {
            "databases": package.feature_limits.databases,
            "backups": package.feature_limits.backups,
            "allocations": package.feature_limits.allocations,
        },
        "start_on_completion": true,
    });

    if let Some(allocation) = package.allocation_id {
        body["allocation"] = serde_json::json!({ "default": allocation });
    } else if let Some(location) = package.location_id {
        body["deploy"] = serde_json::json!({
            "locations": [location],
            "dedicated_ip": false,
            "port_range": [],
        });
    } else {
        return Err(GatewayError::InvalidConfig {
            message: format!(
                "package '{}' has neither a deployment location nor an allocation",
                package.id
            ),
        });
    }
    Ok(body)
}

fn read_checked_json(
    path: &str,
    response: ureq::http::Response<ureq::Body>,
) -> Result<serde_json::Value, GatewayError> {
    let status = response.status();
    let value: serde_json::Value =
        response
            .into_body()
            .read_json()
            .map_err(|e| GatewayError::UnexpectedResponse {
                message: format!("failed to parse response from '{}' as JSON: {}", path, e),
            })?;
    if !status.is_success() {
        return Err(GatewayError::VendorRejected {
            detail: vendor_detail(&value, status.as_u16()),
        });
    }
    Ok(value)
}

/// Join the panel's `errors[].detail` strings; fall back to the status
/// code when the body carries none.
fn vendor_detail(value: &serde_json::Value, status: u16) -> String {
    let details: Vec<&str> = value["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["detail"].as_str())
                .collect()
        })
        .unwrap_or_default();
    if details.is_empty() {
        format!("panel returned status {}", status)
    } else {
        details.join(" ")
    }
}

fn first_user(listing: &serde_json::Value) -> Option<PanelUser> {
    listing["data"]
        .as_array()
        .and_then(|data| data.first())
        .and_then(|entry| parse_user(&entry["attributes"]))
}

fn parse_user(attributes: &serde_json::Value) -> Option<PanelUser> {
    Some(PanelUser {
        id: attributes["id"].as_i64()?,
        username: attributes["username"].as_str()?.to_string(),
        email: attributes["email"].as_str()?.to_string(),
    })
}

/// Fresh random credential for a new panel account. Returned to the panel
/// only; never derived from account data.
fn random_credential(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use toko_core::{FeatureLimits, ResourceLimits};

    fn package(location_id: Option<u32>, allocation_id: Option<u32>) -> ServerPackage {
        ServerPackage {
            id: "nodejs-1gb".to_string(),
            name: "NodeJS 1GB".to_string(),
            price: Decimal::from(10_000),
            egg_id: 15,
            nest_id: 5,
            docker_image: "ghcr.io/parkervcp/yolks:nodejs_18".to_string(),
            startup_command: "npm start".to_string(),
            environment: BTreeMap::from([("STARTUP_FILE".to_string(), "index.js".to_string())]),
            limits: ResourceLimits {
                memory: 1024,
                disk: 2048,
                cpu: 50,
                swap: 0,
                io: 500,
            },
            feature_limits: FeatureLimits {
                databases: 1,
                backups: 1,
                allocations: 1,
            },
            location_id,
            allocation_id,
            billing_period_days: 30,
        }
    }

    #[test]
    fn panel_username_strips_and_truncates() {
        assert_eq!(
            PterodactylGateway::panel_username("alice.the-builder!2026"),
            "alicethebuilder"
        );
        assert_eq!(PterodactylGateway::panel_username("bob_7"), "bob_7");
    }

    #[test]
    fn panel_email_strips_non_alphanumerics() {
        let gateway = PterodactylGateway::new("https://panel.test", "key", "shop.example");
        assert_eq!(gateway.panel_email("alice.b!"), "aliceb@shop.example");
    }

    #[test]
    fn server_payload_uses_location_deploy() {
        let body = server_payload(7, "myserver", &package(Some(3), None)).unwrap();
        assert_eq!(body["user"], serde_json::json!(7));
        assert_eq!(body["deploy"]["locations"], serde_json::json!([3]));
        assert_eq!(body["deploy"]["dedicated_ip"], serde_json::json!(false));
        assert!(body.get("allocation").is_none());
        assert_eq!(body["start_on_completion"], serde_json::json!(true));
        assert_eq!(body["limits"]["memory"], serde_json::json!(1024));
    }

    #[test]
    fn server_payload_prefers_explicit_allocation() {
        let body = server_payload(7, "myserver", &package(Some(3), Some(42))).unwrap();
        assert_eq!(body["allocation"]["default"], serde_json::json!(42));
        assert!(body.get("deploy").is_none());
    }

    #[test]
    fn server_payload_without_placement_fails_loudly() {
        let err = server_payload(7, "myserver", &package(None, None)).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidConfig { .. }));
    }

    #[test]
    fn vendor_detail_joins_error_details() {
        let body = serde_json::json!({
            "errors": [
                { "detail": "The name field is required." },
                { "detail": "No viable allocation." }
            ]
        });
        assert_eq!(
            vendor_detail(&body, 422),
            "The name field is required. No viable allocation."
        );
        assert_eq!(
            vendor_detail(&serde_json::json!({}), 502),
            "panel returned status 502"
        );
    }

    #[test]
    fn first_user_reads_listing() {
        let listing = serde_json::json!({
            "data": [
                { "attributes": { "id": 12, "username": "alice", "email": "alice@shop.example" } }
            ]
        });
        let user = first_user(&listing).unwrap();
        assert_eq!(user.id, 12);
        assert_eq!(user.username, "alice");

        assert!(first_user(&serde_json::json!({ "data": [] })).is_none());
    }

    #[test]
    fn random_credentials_are_distinct() {
        let a = random_credential(12);
        let b = random_credential(12);
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
    }
}
