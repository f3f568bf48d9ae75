use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{PaymentError, DEFAULT_CURRENCY};

/// Buyer details EasyKash requires on the hosted payment page.
#[derive(Debug, Clone)]
pub struct Buyer {
    pub name: String,
    pub email: String,
    pub mobile: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DirectPayRequest<'a> {
    amount: f64,
    currency: &'a str,
    payment_options: [u8; 4],
    cash_expiry: u32,
    name: &'a str,
    email: &'a str,
    mobile: &'a str,
    redirect_url: &'a str,
    customer_reference: &'a str,
}

/// EasyKash Direct Pay client.
/// POST {base}/api/directpayv1/pay
pub struct EasyKashClient {
    client: Client,
    base_url: String,
    api_key: String,
    redirect_url: String,
}

impl EasyKashClient {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        if !config.is_payment_configured() {
            return Err(PaymentError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.easykash_base_url.trim_end_matches('/').to_string(),
            api_key: config.easykash_api_key.clone(),
            redirect_url: config.payment_redirect_url.clone(),
        })
    }

    /// Create a hosted payment and return the URL the buyer is sent to.
    pub async fn create_payment(
        &self,
        amount: f64,
        customer_reference: &str,
        buyer: &Buyer,
    ) -> Result<String, PaymentError> {
        let url = format!("{}/api/directpayv1/pay", self.base_url);

        let request_body = DirectPayRequest {
            amount,
            currency: DEFAULT_CURRENCY,
            // Card, Fawry, Aman, mobile wallets.
            payment_options: [2, 4, 5, 6],
            cash_expiry: 24,
            name: &buyer.name,
            email: &buyer.email,
            mobile: &buyer.mobile,
            redirect_url: &self.redirect_url,
            customer_reference,
        };

        debug!("Sending payment request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("authorization", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        if !status.is_success() {
            error!("EasyKash payment creation failed: {} - {}", status, response_text);
            return Err(PaymentError::Gateway(format!("HTTP {}: {}", status, response_text)));
        }

        let body: Value = serde_json::from_str(&response_text)
            .map_err(|e| PaymentError::Gateway(format!("Failed to parse payment response: {}", e)))?;

        let payment_url = body
            .get("redirectUrl")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PaymentError::Gateway("Payment response has no redirectUrl".to_string()))?;

        info!("EasyKash payment created for reference {}", customer_reference);
        Ok(payment_url.to_string())
    }
}
