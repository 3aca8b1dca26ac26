//! Payment gateway adapter: redirect URL construction and the
//! authoritative transaction-detail verification call.
//!
//! Verification is keyed by project slug + order id + expected amount
//! against the vendor's query endpoint; a webhook body on its own is
//! never enough to move money.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{encode_query, GatewayError, PaymentGateway, PaymentVerification};

/// Vendor statuses treated as terminal success.
const PAID_STATUSES: [&str; 3] = ["completed", "paid", "success"];

/// Client for the hosted payment page and its transaction-detail API.
#[derive(Clone)]
pub struct PakasirGateway {
    base_url: String,
    slug: String,
    api_key: String,
    timeout: Duration,
}

impl PakasirGateway {
    pub fn new(slug: &str, api_key: &str) -> Self {
        PakasirGateway {
            base_url: "https://app.pakasir.com".to_string(),
            slug: slug.to_string(),
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn verify_blocking(
        &self,
        order_id: &str,
        amount: &Decimal,
    ) -> Result<PaymentVerification, GatewayError> {
        let url = format!(
            "{}/api/transactiondetail?project={}&amount={}&order_id={}&api_key={}",
            self.base_url,
            encode_query(&self.slug),
            amount.normalize(),
            encode_query(order_id),
            encode_query(&self.api_key),
        );

        let config = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .build();
        let agent = ureq::Agent::new_with_config(config);
        let response = agent
            .get(&url)
            .header("Accept", "application/json")
            .call()
            .map_err(|e| GatewayError::RequestFailed {
                endpoint: "transactiondetail".to_string(),
                message: e.to_string(),
            })?;
        let value: serde_json::Value =
            response
                .into_body()
                .read_json()
                .map_err(|e| GatewayError::UnexpectedResponse {
                    message: format!("failed to parse transaction detail as JSON: {}", e),
                })?;
        parse_verification(&value)
    }
}

#[async_trait]
impl PaymentGateway for PakasirGateway {
    fn payment_url(&self, amount: &Decimal, order_id: &str) -> String {
        format!(
            "{}/pay/{}/{}?order_id={}&qris_only=1",
            self.base_url,
            self.slug,
            amount.normalize(),
            order_id
        )
    }

    async fn verify(
        &self,
        order_id: &str,
        amount: &Decimal,
    ) -> Result<PaymentVerification, GatewayError> {
        let client = self.clone();
        let order_id = order_id.to_string();
        let amount = *amount;
        tokio::task::spawn_blocking(move || client.verify_blocking(&order_id, &amount))
            .await
            .map_err(|e| GatewayError::RequestFailed {
                endpoint: "transactiondetail".to_string(),
                message: format!("task join error: {}", e),
            })?
    }
}

/// Read the vendor's `transaction.status` field into a verification
/// verdict. Anything other than a known success status is non-success.
fn parse_verification(value: &serde_json::Value) -> Result<PaymentVerification, GatewayError> {
    let status = value["transaction"]["status"].as_str().ok_or_else(|| {
        GatewayError::UnexpectedResponse {
            message: "transaction detail is missing transaction.status".to_string(),
        }
    })?;
    let normalized = status.to_ascii_lowercase();
    Ok(PaymentVerification {
        paid: PAID_STATUSES.contains(&normalized.as_str()),
        vendor_status: status.to_string(),
    })
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_url_encodes_slug_amount_and_order() {
        let gateway = PakasirGateway::new("tokoku", "secret");
        let url = gateway.payment_url(&Decimal::from(50_000), "TOPUP-acc-1-17-Ab3x");
        assert_eq!(
            url,
            "https://app.pakasir.com/pay/tokoku/50000?order_id=TOPUP-acc-1-17-Ab3x&qris_only=1"
        );
    }

    #[test]
    fn payment_url_normalizes_trailing_zeros() {
        let gateway = PakasirGateway::new("tokoku", "secret").with_base_url("https://pay.test/");
        let url = gateway.payment_url(&Decimal::new(100_000, 1), "X"); // 10000.0
        assert!(url.starts_with("https://pay.test/pay/tokoku/10000?"));
    }

    #[test]
    fn parse_verification_accepts_success_statuses() {
        for status in ["completed", "PAID", "Success"] {
            let body = serde_json::json!({ "transaction": { "status": status } });
            let verification = parse_verification(&body).unwrap();
            assert!(verification.paid, "status {} should be paid", status);
        }
    }

    #[test]
    fn parse_verification_rejects_other_statuses() {
        for status in ["pending", "expired", "failed", "refund"] {
            let body = serde_json::json!({ "transaction": { "status": status } });
            let verification = parse_verification(&body).unwrap();
            assert!(!verification.paid, "status {} should not be paid", status);
            assert_eq!(verification.vendor_status, status);
        }
    }

    #[test]
    fn parse_verification_requires_status_field() {
        let body = serde_json::json!({ "transaction": {} });
        assert!(matches!(
            parse_verification(&body),
            Err(GatewayError::UnexpectedResponse { .. })
        ));
    }
}
