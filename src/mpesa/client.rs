use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::ProviderError;
use super::password::{stk_password, timestamp};
use super::token::{AccessTokenCache, IssuedToken, TokenSource};
use super::types::{
    B2cPaymentRequest, B2cPaymentResponse, OAuthResponse, ProviderFault, RESPONSE_ACCEPTED,
    StkPushRequest, StkPushResponse, TRANSACTION_TYPE_PAYBILL,
};
use super::{PaymentProvider, PayoutAccepted, PushAccepted};
use crate::config::MpesaConfig;

pub const OAUTH_PATH: &str = "/oauth/v1/generate?grant_type=client_credentials";
pub const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";
pub const B2C_PAYMENT_PATH: &str = "/mpesa/b2c/v3/paymentrequest";

const PUSH_DESCRIPTION: &str = "Wallet deposit";
const PAYOUT_REMARKS: &str = "Wallet withdrawal";

/// Client-credentials exchange against the OAuth endpoint
pub struct OAuthTokenSource {
    http: Client,
    url: String,
    consumer_key: String,
    consumer_secret: String,
}

#[async_trait]
impl TokenSource for OAuthTokenSource {
    async fn fetch(&self) -> Result<IssuedToken, ProviderError> {
        let response = self
            .http
            .get(&self.url)
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Auth(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let token: OAuthResponse = response.json().await?;
        if token.access_token.is_empty() {
            return Err(ProviderError::Malformed("empty access_token".to_string()));
        }
        Ok(IssuedToken {
            value: token.access_token,
            expires_in: Duration::from_secs(token.expires_in.max(0) as u64),
        })
    }
}

/// Daraja HTTP client. Every call is bounded by `mpesa.timeout_secs`.
pub struct MpesaClient {
    http: Client,
    base_url: String,
    config: MpesaConfig,
    oauth: OAuthTokenSource,
    tokens: AccessTokenCache,
}

impl MpesaClient {
    pub fn new(config: MpesaConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let oauth = OAuthTokenSource {
            http: http.clone(),
            url: format!("{}{}", base_url, OAUTH_PATH),
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
        };
        let tokens =
            AccessTokenCache::new(Duration::from_secs(config.token_safety_margin_secs));

        info!(base_url = %base_url, shortcode = %config.shortcode, "M-Pesa client ready");
        Ok(Self {
            http,
            base_url,
            config,
            oauth,
            tokens,
        })
    }

    /// Current bearer token (cached)
    pub async fn access_token(&self) -> Result<String, ProviderError> {
        self.tokens.get(&self.oauth).await
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(path, "Provider rejected access token, invalidating cache");
            self.tokens.invalidate().await;
            return Err(ProviderError::Auth("access token rejected".to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ProviderFault>(&text) {
                Ok(ProviderFault {
                    error_code: Some(code),
                    error_message,
                    ..
                }) => ProviderError::Rejected {
                    code,
                    description: error_message.unwrap_or_default(),
                },
                _ => ProviderError::Http {
                    status: status.as_u16(),
                    body: text,
                },
            });
        }

        Ok(response.json().await?)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[async_trait]
impl PaymentProvider for MpesaClient {
    async fn initiate_push(
        &self,
        phone: &str,
        amount: u64,
        reference: &str,
    ) -> Result<PushAccepted, ProviderError> {
        let ts = timestamp(Utc::now());
        let request = StkPushRequest {
            business_short_code: &self.config.shortcode,
            password: stk_password(&self.config.shortcode, &self.config.passkey, &ts),
            timestamp: ts,
            transaction_type: TRANSACTION_TYPE_PAYBILL,
            amount,
            party_a: phone,
            party_b: &self.config.shortcode,
            phone_number: phone,
            callback_url: &self.config.callback_url,
            account_reference: reference,
            transaction_desc: PUSH_DESCRIPTION,
        };

        let response: StkPushResponse = self.post_json(STK_PUSH_PATH, &request).await?;
        if response.response_code.as_deref() != Some(RESPONSE_ACCEPTED) {
            return Err(ProviderError::Rejected {
                code: response.response_code.unwrap_or_default(),
                description: response.response_description.unwrap_or_default(),
            });
        }
        let correlation_id = non_empty(response.checkout_request_id)
            .ok_or_else(|| ProviderError::Malformed("missing CheckoutRequestID".to_string()))?;
        let secondary_correlation_id = response.merchant_request_id.unwrap_or_default();

        info!(
            checkout_request_id = %correlation_id,
            merchant_request_id = %secondary_correlation_id,
            amount,
            "STK push accepted"
        );
        Ok(PushAccepted {
            correlation_id,
            secondary_correlation_id,
            customer_message: response.customer_message.unwrap_or_default(),
        })
    }

    async fn initiate_payout(
        &self,
        phone: &str,
        amount: u64,
        reference: &str,
    ) -> Result<PayoutAccepted, ProviderError> {
        let b2c = &self.config.b2c;
        let request = B2cPaymentRequest {
            originator_conversation_id: reference,
            initiator_name: &b2c.initiator_name,
            security_credential: &b2c.security_credential,
            command_id: &b2c.command_id,
            amount,
            party_a: &b2c.shortcode,
            party_b: phone,
            remarks: PAYOUT_REMARKS,
            queue_timeout_url: &b2c.queue_timeout_url,
            result_url: &b2c.result_url,
            occasion: reference,
        };

        let response: B2cPaymentResponse = self.post_json(B2C_PAYMENT_PATH, &request).await?;
        if response.response_code.as_deref() != Some(RESPONSE_ACCEPTED) {
            return Err(ProviderError::Rejected {
                code: response.response_code.unwrap_or_default(),
                description: response.response_description.unwrap_or_default(),
            });
        }
        let conversation_id = non_empty(response.conversation_id)
            .ok_or_else(|| ProviderError::Malformed("missing ConversationID".to_string()))?;
        let originator_conversation_id = non_empty(response.originator_conversation_id)
            .unwrap_or_else(|| reference.to_string());

        debug!(reference, "B2C request body sent");
        info!(
            conversation_id = %conversation_id,
            originator_conversation_id = %originator_conversation_id,
            amount,
            "B2C payout accepted"
        );
        Ok(PayoutAccepted {
            conversation_id,
            originator_conversation_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::B2cConfig;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use base64::Engine;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct FakeDaraja {
        oauth_calls: Arc<AtomicUsize>,
        reject_token_once: Arc<AtomicUsize>,
    }

    async fn oauth(State(fake): State<FakeDaraja>, headers: HeaderMap) -> impl IntoResponse {
        let n = fake.oauth_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let expected = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode("key:secret")
        );
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
            return (AxumStatus::BAD_REQUEST, Json(json!({"errorCode": "400.008.01"})));
        }
        (
            AxumStatus::OK,
            Json(json!({"access_token": format!("tok-{}", n), "expires_in": "3599"})),
        )
    }

    async fn stk(
        State(fake): State<FakeDaraja>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> impl IntoResponse {
        if fake.reject_token_once.swap(0, Ordering::SeqCst) == 1 {
            return (AxumStatus::UNAUTHORIZED, Json(json!({})));
        }
        assert!(
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.starts_with("Bearer tok-"))
        );
        let ts = body["Timestamp"].as_str().unwrap_or_default().to_string();
        let expected = stk_password("174379", "passkey", &ts);
        if body["Password"] != expected.as_str() {
            return (AxumStatus::BAD_REQUEST, Json(json!({"errorCode": "400.002.02"})));
        }
        match body["Amount"].as_u64() {
            Some(1) => (
                AxumStatus::OK,
                Json(json!({"ResponseCode": "1", "ResponseDescription": "Rejected"})),
            ),
            Some(2) => (
                AxumStatus::INTERNAL_SERVER_ERROR,
                Json(json!({"requestId": "r1", "errorCode": "500.001.1001",
                            "errorMessage": "Unable to lock subscriber"})),
            ),
            _ => (
                AxumStatus::OK,
                Json(json!({
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "CHK1",
                    "ResponseCode": "0",
                    "ResponseDescription": "Success. Request accepted for processing",
                    "CustomerMessage": "Success. Request accepted for processing"
                })),
            ),
        }
    }

    async fn b2c(Json(body): Json<Value>) -> impl IntoResponse {
        Json(json!({
            "ConversationID": "AG_1",
            "OriginatorConversationID": body["OriginatorConversationID"],
            "ResponseCode": "0",
            "ResponseDescription": "Accept the service request successfully."
        }))
    }

    async fn slow() -> impl IntoResponse {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Json(json!({}))
    }

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn config(base_url: String) -> MpesaConfig {
        MpesaConfig {
            base_url,
            consumer_key: "key".into(),
            consumer_secret: "secret".into(),
            shortcode: "174379".into(),
            passkey: "passkey".into(),
            callback_url: "https://example.com/webhooks/mpesa/stk-callback".into(),
            timeout_secs: 1,
            token_safety_margin_secs: 60,
            b2c: B2cConfig {
                shortcode: "600000".into(),
                initiator_name: "testapi".into(),
                security_credential: "cred".into(),
                result_url: "https://example.com/webhooks/mpesa/b2c-result".into(),
                queue_timeout_url: "https://example.com/webhooks/mpesa/b2c-timeout".into(),
                command_id: "BusinessPayment".into(),
            },
        }
    }

    async fn fake_client() -> (MpesaClient, FakeDaraja) {
        let fake = FakeDaraja::default();
        let router = Router::new()
            .route("/oauth/v1/generate", get(oauth))
            .route(STK_PUSH_PATH, post(stk))
            .route(B2C_PAYMENT_PATH, post(b2c))
            .with_state(fake.clone());
        let base = spawn(router).await;
        (MpesaClient::new(config(base)).unwrap(), fake)
    }

    #[tokio::test]
    async fn test_push_accepted_and_token_reused() {
        let (client, fake) = fake_client().await;
        let first = client.initiate_push("254700000000", 500, "WALLET1").await.unwrap();
        assert_eq!(first.correlation_id, "CHK1");
        assert_eq!(first.secondary_correlation_id, "29115-34620561-1");
        client.initiate_push("254700000000", 500, "WALLET1").await.unwrap();
        assert_eq!(fake.oauth_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_zero_response_code_is_rejection() {
        let (client, _) = fake_client().await;
        let err = client.initiate_push("254700000000", 1, "WALLET1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected { ref code, .. } if code == "1"));
    }

    #[tokio::test]
    async fn test_error_body_is_mapped() {
        let (client, _) = fake_client().await;
        let err = client.initiate_push("254700000000", 2, "WALLET1").await.unwrap_err();
        match err {
            ProviderError::Rejected { code, description } => {
                assert_eq!(code, "500.001.1001");
                assert_eq!(description, "Unable to lock subscriber");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_invalidates_token() {
        let (client, fake) = fake_client().await;
        client.initiate_push("254700000000", 500, "WALLET1").await.unwrap();
        fake.reject_token_once.store(1, Ordering::SeqCst);
        let err = client.initiate_push("254700000000", 500, "WALLET1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
        client.initiate_push("254700000000", 500, "WALLET1").await.unwrap();
        assert_eq!(fake.oauth_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_payout_accepted() {
        let (client, _) = fake_client().await;
        let accepted = client.initiate_payout("254700000000", 990, "payout-1").await.unwrap();
        assert_eq!(accepted.conversation_id, "AG_1");
        assert_eq!(accepted.originator_conversation_id, "payout-1");
    }

    #[tokio::test]
    async fn test_timeout_fails_instead_of_hanging() {
        let router = Router::new()
            .route("/oauth/v1/generate", get(slow));
        let base = spawn(router).await;
        let client = MpesaClient::new(config(base)).unwrap();
        let err = client.initiate_push("254700000000", 500, "WALLET1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout), "{:?}", err);
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        let client = MpesaClient::new(config("http://127.0.0.1:1".into())).unwrap();
        let err: crate::error::PaymentError = client
            .initiate_push("254700000000", 500, "WALLET1")
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code(), "PROVIDER_UNAVAILABLE");
    }
}
