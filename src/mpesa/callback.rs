//! Asynchronous callback bodies
//!
//! STK push results arrive as `Body.stkCallback`; B2C results as `Result`.
//! Metadata values may be JSON numbers or strings, and a B2C
//! `ResultParameter` may be a single object instead of an array.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use super::error::CallbackParseError;
use super::types::lenient_i64;

/// `ResultCode` of a successful transaction
pub const RESULT_SUCCESS: i64 = 0;

// ============================================================================
// STK push callback
// ============================================================================

#[derive(Debug, Deserialize)]
struct StkEnvelope {
    #[serde(rename = "Body")]
    body: StkBody,
}

#[derive(Debug, Deserialize)]
struct StkBody {
    #[serde(rename = "stkCallback")]
    stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID", default)]
    checkout_request_id: String,
    #[serde(rename = "ResultCode", deserialize_with = "lenient_i64")]
    result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    metadata: Option<StkMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct StkMetadata {
    #[serde(rename = "Item", default)]
    items: Vec<StkItem>,
}

#[derive(Debug, Deserialize)]
struct StkItem {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value", default)]
    value: Option<Value>,
}

/// Parsed STK push result
#[derive(Debug, Clone, PartialEq)]
pub struct StkResult {
    pub correlation_id: String,
    pub secondary_correlation_id: String,
    pub result_code: i64,
    pub result_desc: String,
    pub amount: Option<Decimal>,
    pub receipt: Option<String>,
    pub phone: Option<String>,
    pub transaction_date: Option<String>,
}

impl StkResult {
    pub fn is_success(&self) -> bool {
        self.result_code == RESULT_SUCCESS
    }
}

pub fn parse_stk_callback(body: &[u8]) -> Result<StkResult, CallbackParseError> {
    let envelope: StkEnvelope = serde_json::from_slice(body)?;
    let cb = envelope.body.stk_callback;
    if cb.checkout_request_id.trim().is_empty() {
        return Err(CallbackParseError::MissingField("CheckoutRequestID"));
    }

    let items = cb.metadata.unwrap_or_default().items;
    let lookup = |name: &str| {
        items
            .iter()
            .find(|i| i.name == name)
            .and_then(|i| i.value.as_ref())
    };

    Ok(StkResult {
        correlation_id: cb.checkout_request_id,
        secondary_correlation_id: cb.merchant_request_id,
        result_code: cb.result_code,
        result_desc: cb.result_desc,
        amount: lookup("Amount").and_then(value_decimal),
        receipt: lookup("MpesaReceiptNumber").and_then(value_string),
        phone: lookup("PhoneNumber").and_then(value_string),
        transaction_date: lookup("TransactionDate").and_then(value_string),
    })
}

// ============================================================================
// B2C result callback
// ============================================================================

#[derive(Debug, Deserialize)]
struct B2cEnvelope {
    #[serde(rename = "Result")]
    result: B2cBody,
}

#[derive(Debug, Deserialize)]
struct B2cBody {
    #[serde(rename = "ResultType", default)]
    result_type: Option<Value>,
    #[serde(rename = "ResultCode", deserialize_with = "lenient_i64")]
    result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    result_desc: String,
    #[serde(rename = "OriginatorConversationID", default)]
    originator_conversation_id: Option<String>,
    #[serde(rename = "ConversationID", default)]
    conversation_id: String,
    #[serde(rename = "TransactionID", default)]
    transaction_id: Option<String>,
    #[serde(rename = "ResultParameters", default)]
    parameters: Option<B2cParameters>,
}

#[derive(Debug, Deserialize)]
struct B2cParameters {
    #[serde(rename = "ResultParameter", default)]
    items: OneOrMany<B2cParameter>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct B2cParameter {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value", default)]
    value: Option<Value>,
}

/// Parsed B2C result (also used for queue-timeout notifications)
#[derive(Debug, Clone, PartialEq)]
pub struct B2cResult {
    pub conversation_id: String,
    pub originator_conversation_id: Option<String>,
    pub result_type: Option<i64>,
    pub result_code: i64,
    pub result_desc: String,
    pub transaction_id: Option<String>,
    pub amount: Option<Decimal>,
    pub receiver: Option<String>,
}

impl B2cResult {
    pub fn is_success(&self) -> bool {
        self.result_code == RESULT_SUCCESS
    }
}

pub fn parse_b2c_result(body: &[u8]) -> Result<B2cResult, CallbackParseError> {
    let envelope: B2cEnvelope = serde_json::from_slice(body)?;
    let r = envelope.result;
    if r.conversation_id.trim().is_empty() {
        return Err(CallbackParseError::MissingField("ConversationID"));
    }

    let params = r.parameters.map(|p| p.items.into_vec()).unwrap_or_default();
    let lookup = |key: &str| {
        params
            .iter()
            .find(|p| p.key == key)
            .and_then(|p| p.value.as_ref())
    };

    Ok(B2cResult {
        conversation_id: r.conversation_id,
        originator_conversation_id: r.originator_conversation_id.filter(|s| !s.is_empty()),
        result_type: r.result_type.as_ref().and_then(value_i64),
        result_code: r.result_code,
        result_desc: r.result_desc,
        transaction_id: r
            .transaction_id
            .filter(|s| !s.is_empty())
            .or_else(|| lookup("TransactionReceipt").and_then(value_string)),
        amount: lookup("TransactionAmount").and_then(value_decimal),
        receiver: lookup("ReceiverPartyPublicName").and_then(value_string),
    })
}

// ============================================================================
// Value helpers
// ============================================================================

fn value_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn value_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
