//! Provider wire formats (requests and synchronous responses)

use serde::{Deserialize, Deserializer, Serialize};

pub const TRANSACTION_TYPE_PAYBILL: &str = "CustomerPayBillOnline";
/// `ResponseCode` of an accepted request
pub const RESPONSE_ACCEPTED: &str = "0";

/// Numbers the provider sometimes sends as strings
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Int(i64),
    Float(f64),
    Str(String),
}

pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Lenient::deserialize(deserializer)? {
        Lenient::Int(v) => Ok(v),
        Lenient::Float(v) if v.fract() == 0.0 => Ok(v as i64),
        Lenient::Float(v) => Err(serde::de::Error::custom(format!("not an integer: {}", v))),
        Lenient::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
pub struct OAuthResponse {
    pub access_token: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct StkPushRequest<'a> {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: &'a str,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: &'static str,
    #[serde(rename = "Amount")]
    pub amount: u64,
    #[serde(rename = "PartyA")]
    pub party_a: &'a str,
    #[serde(rename = "PartyB")]
    pub party_b: &'a str,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    pub callback_url: &'a str,
    #[serde(rename = "AccountReference")]
    pub account_reference: &'a str,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResponseCode", default)]
    pub response_code: Option<String>,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: Option<String>,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct B2cPaymentRequest<'a> {
    #[serde(rename = "OriginatorConversationID")]
    pub originator_conversation_id: &'a str,
    #[serde(rename = "InitiatorName")]
    pub initiator_name: &'a str,
    #[serde(rename = "SecurityCredential")]
    pub security_credential: &'a str,
    #[serde(rename = "CommandID")]
    pub command_id: &'a str,
    #[serde(rename = "Amount")]
    pub amount: u64,
    #[serde(rename = "PartyA")]
    pub party_a: &'a str,
    #[serde(rename = "PartyB")]
    pub party_b: &'a str,
    #[serde(rename = "Remarks")]
    pub remarks: &'a str,
    #[serde(rename = "QueueTimeOutURL")]
    pub queue_timeout_url: &'a str,
    #[serde(rename = "ResultURL")]
    pub result_url: &'a str,
    #[serde(rename = "Occasion")]
    pub occasion: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct B2cPaymentResponse {
    #[serde(rename = "ConversationID", default)]
    pub conversation_id: Option<String>,
    #[serde(rename = "OriginatorConversationID", default)]
    pub originator_conversation_id: Option<String>,
    #[serde(rename = "ResponseCode", default)]
    pub response_code: Option<String>,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: Option<String>,
}

/// Body of a non-2xx provider answer
#[derive(Debug, Deserialize)]
pub struct ProviderFault {
    #[serde(rename = "requestId", default)]
    pub request_id: Option<String>,
    #[serde(rename = "errorCode", default)]
    pub error_code: Option<String>,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}
