use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use swiftpass_core::payment::{
    PaymentGateway, PaymentHandle, PaymentRequest, PaymentStatus, PaymentStatusReport,
};
use swiftpass_core::{CoreError, CoreResult};
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);
const REQUEST_TO_PAY_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct MomoConfig {
    pub base_url: String,
    pub subscription_key: String,
    pub target_environment: String,
    pub callback_host: String,
    pub currency: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MomoError {
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway returned {status} for {operation}")]
    UnexpectedStatus {
        operation: &'static str,
        status: StatusCode,
    },

    #[error("Payment reference not found: {0}")]
    ReferenceNotFound(Uuid),
}

#[derive(Clone)]
struct ApiCredentials {
    user_id: Uuid,
    api_key: String,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct ApiKeyResponse {
    #[serde(rename = "apiKey")]
    api_key: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// MTN MoMo collection API client.
///
/// Sandbox credentials (API user + key) are provisioned once per process
/// and the bearer token is cached until shortly before its expiry. Both
/// caches are owned by the client value rather than living in globals.
pub struct MomoClient {
    http: reqwest::Client,
    config: MomoConfig,
    credentials: RwLock<Option<ApiCredentials>>,
    token: RwLock<Option<CachedToken>>,
}

impl MomoClient {
    pub fn new(config: MomoConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            credentials: RwLock::new(None),
            token: RwLock::new(None),
        }
    }

    async fn ensure_provisioned(&self) -> Result<ApiCredentials, MomoError> {
        if let Some(creds) = self.credentials.read().await.as_ref() {
            return Ok(creds.clone());
        }

        let mut guard = self.credentials.write().await;
        // Another request may have provisioned while we waited for the lock.
        if let Some(creds) = guard.as_ref() {
            return Ok(creds.clone());
        }

        let reference = Uuid::new_v4();
        let response = self
            .http
            .post(format!("{}/v1_0/apiuser", self.config.base_url))
            .header("X-Reference-Id", reference.to_string())
            .header("Ocp-Apim-Subscription-Key", &self.config.subscription_key)
            .json(&serde_json::json!({
                "providerCallbackHost": self.config.callback_host,
            }))
            .send()
            .await?;
        if response.status() != StatusCode::CREATED {
            return Err(MomoError::UnexpectedStatus {
                operation: "create api user",
                status: response.status(),
            });
        }

        let response = self
            .http
            .post(format!(
                "{}/v1_0/apiuser/{}/apikey",
                self.config.base_url, reference
            ))
            .header("Ocp-Apim-Subscription-Key", &self.config.subscription_key)
            .send()
            .await?;
        if response.status() != StatusCode::CREATED {
            return Err(MomoError::UnexpectedStatus {
                operation: "create api key",
                status: response.status(),
            });
        }
        let key: ApiKeyResponse = response.json().await?;

        let creds = ApiCredentials {
            user_id: reference,
            api_key: key.api_key,
        };
        *guard = Some(creds.clone());
        info!(api_user = %reference, "gateway credentials provisioned");
        Ok(creds)
    }

    async fn access_token(&self) -> Result<String, MomoError> {
        if let Some(cached) = self.token.read().await.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let creds = self.ensure_provisioned().await?;

        let mut guard = self.token.write().await;
        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let response = self
            .http
            .post(format!("{}/collection/token/", self.config.base_url))
            .basic_auth(creds.user_id.to_string(), Some(&creds.api_key))
            .header("Ocp-Apim-Subscription-Key", &self.config.subscription_key)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(MomoError::UnexpectedStatus {
                operation: "access token",
                status: response.status(),
            });
        }
        let token: TokenResponse = response.json().await?;

        let ttl = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_BUFFER);
        *guard = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(token.access_token)
    }

    async fn submit(&self, request: &PaymentRequest) -> Result<PaymentHandle, MomoError> {
        let token = self.access_token().await?;
        let reference_id = Uuid::new_v4();
        let external_id = Uuid::new_v4();

        let body = serde_json::json!({
            "amount": request.amount.to_string(),
            "currency": self.config.currency,
            "externalId": external_id.to_string(),
            "payer": {
                "partyIdType": "MSISDN",
                "partyId": request.msisdn,
            },
            "payerMessage": "SwiftPass Bus Booking",
            "payeeNote": format!("Bus ticket payment - {}", request.method),
        });

        let response = self
            .http
            .post(format!(
                "{}/collection/v1_0/requesttopay",
                self.config.base_url
            ))
            .bearer_auth(&token)
            .header("X-Reference-Id", reference_id.to_string())
            .header("X-Target-Environment", &self.config.target_environment)
            .header("Ocp-Apim-Subscription-Key", &self.config.subscription_key)
            .json(&body)
            .timeout(REQUEST_TO_PAY_TIMEOUT)
            .send()
            .await?;
        if response.status() != StatusCode::ACCEPTED {
            return Err(MomoError::UnexpectedStatus {
                operation: "request to pay",
                status: response.status(),
            });
        }

        info!(%reference_id, %external_id, amount = request.amount, "payment request accepted");
        Ok(PaymentHandle {
            reference_id,
            external_id,
            currency: self.config.currency.clone(),
        })
    }

    async fn status(&self, reference_id: Uuid) -> Result<PaymentStatusReport, MomoError> {
        let token = self.access_token().await?;

        let response = self
            .http
            .get(format!(
                "{}/collection/v1_0/requesttopay/{}",
                self.config.base_url, reference_id
            ))
            .bearer_auth(&token)
            .header("X-Target-Environment", &self.config.target_environment)
            .header("Ocp-Apim-Subscription-Key", &self.config.subscription_key)
            .timeout(STATUS_TIMEOUT)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(MomoError::ReferenceNotFound(reference_id));
        }
        if response.status() != StatusCode::OK {
            return Err(MomoError::UnexpectedStatus {
                operation: "payment status",
                status: response.status(),
            });
        }

        let raw: serde_json::Value = response.json().await?;
        let status = serde_json::from_value::<PaymentStatus>(raw["status"].clone())
            .unwrap_or(PaymentStatus::Unknown);
        let financial_transaction_id = raw["financialTransactionId"]
            .as_str()
            .map(|s| s.to_string());

        Ok(PaymentStatusReport {
            status,
            financial_transaction_id,
            raw,
        })
    }
}

#[async_trait]
impl PaymentGateway for MomoClient {
    async fn request_to_pay(&self, request: &PaymentRequest) -> CoreResult<PaymentHandle> {
        self.submit(request).await.map_err(|e| {
            error!("request to pay failed: {e}");
            CoreError::Gateway(e.to_string())
        })
    }

    async fn payment_status(&self, reference_id: Uuid) -> CoreResult<PaymentStatusReport> {
        self.status(reference_id).await.map_err(|e| match e {
            MomoError::ReferenceNotFound(id) => CoreError::PaymentNotFound(id),
            other => {
                error!("payment status check failed: {other}");
                CoreError::Gateway(other.to_string())
            }
        })
    }

    async fn is_provisioned(&self) -> bool {
        self.credentials.read().await.is_some()
    }
}
