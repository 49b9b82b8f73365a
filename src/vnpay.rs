//! VNPay redirect signing and callback verification.
//!
//! Both directions sign the same canonical string: every non-empty `vnp_*`
//! parameter sorted by key (ordinal), each key and value form-encoded, joined
//! as `k=v&k=v`. The signature is the lowercase hex HMAC-SHA512 of that
//! string keyed with the merchant hash secret.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use thiserror::Error;
use uuid::Uuid;

use crate::config::VnPayConfig;

type HmacSha512 = Hmac<Sha512>;

pub const SECURE_HASH: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";
pub const SUCCESS_CODE: &str = "00";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing vnp_SecureHash")]
    Missing,
    #[error("signature mismatch")]
    Mismatch,
    #[error("invalid HMAC key")]
    Key,
    #[error("amount out of range")]
    Amount,
}

/// What the merchant asks the gateway to charge.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: Uuid,
    /// Order total in VND.
    pub amount: i64,
    pub ip_addr: String,
    /// Unique per payment attempt.
    pub txn_ref: String,
    pub created_at: DateTime<Utc>,
}

/// A verified gateway callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCallback {
    pub order_id: Option<Uuid>,
    pub order_info: String,
    pub txn_ref: Option<String>,
    pub transaction_no: Option<String>,
    pub response_code: String,
    pub card_type: Option<String>,
    /// Amount reported by the gateway, converted back to VND.
    pub amount: Option<i64>,
}

impl GatewayCallback {
    pub fn is_success(&self) -> bool {
        self.response_code == SUCCESS_CODE
    }
}

/// Form-encode one key or value the way the gateway's own signer does:
/// space as `+`, `!*()` left as is, `~` escaped.
pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value)
        .replace('~', "%7E")
        .replace("%20", "+")
        .replace("%21", "!")
        .replace("%2A", "*")
        .replace("%28", "(")
        .replace("%29", ")")
}

/// Sorted, encoded `k=v&...` string; empty values are skipped.
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn sign(secret: &str, data: &str) -> Result<String, SignatureError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Key)?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn order_info(order_id: Uuid) -> String {
    format!("Thanh toan don hang {order_id}")
}

/// First whitespace-separated token of `order_info` that parses as a UUID.
pub fn extract_order_id(order_info: &str) -> Option<Uuid> {
    order_info
        .split_whitespace()
        .map(|part| part.trim_matches('#'))
        .find_map(|part| Uuid::parse_str(part).ok())
}

/// VNPay expects wall-clock time in GMT+7.
pub fn gateway_timestamp(at: DateTime<Utc>) -> String {
    (at + Duration::hours(7)).format("%Y%m%d%H%M%S").to_string()
}

/// VND amount in the gateway's minor units (×100).
pub fn gateway_amount(amount: i64) -> Result<i64, SignatureError> {
    amount
        .checked_mul(100)
        .filter(|minor| *minor > 0)
        .ok_or(SignatureError::Amount)
}

pub fn payment_params(
    config: &VnPayConfig,
    request: &PaymentRequest,
) -> Result<BTreeMap<String, String>, SignatureError> {
    let amount = gateway_amount(request.amount)?;
    let expires_at = request.created_at + Duration::minutes(config.expire_minutes);
    let entries = [
        ("vnp_Version", config.version.clone()),
        ("vnp_Command", "pay".to_string()),
        ("vnp_TmnCode", config.tmn_code.clone()),
        ("vnp_Amount", amount.to_string()),
        ("vnp_CreateDate", gateway_timestamp(request.created_at)),
        ("vnp_ExpireDate", gateway_timestamp(expires_at)),
        ("vnp_CurrCode", "VND".to_string()),
        ("vnp_IpAddr", request.ip_addr.clone()),
        ("vnp_Locale", config.locale.clone()),
        ("vnp_OrderInfo", order_info(request.order_id)),
        ("vnp_OrderType", config.order_type.clone()),
        ("vnp_ReturnUrl", config.return_url.clone()),
        ("vnp_TxnRef", request.txn_ref.clone()),
    ];
    Ok(entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect())
}

/// Build the signed redirect URL for `request`.
pub fn build_payment_url(
    config: &VnPayConfig,
    request: &PaymentRequest,
) -> Result<String, SignatureError> {
    let query = canonical_query(&payment_params(config, request)?);
    let secure_hash = sign(&config.hash_secret, &query)?;
    Ok(format!(
        "{}?{}&{}={}",
        config.payment_url, query, SECURE_HASH, secure_hash
    ))
}

/// Check the signature of a callback query and extract its outcome.
///
/// Only `vnp_*` parameters take part in the signature; the hash itself and
/// its type marker are excluded.
pub fn verify_callback(
    secret: &str,
    query: &HashMap<String, String>,
) -> Result<GatewayCallback, SignatureError> {
    let provided = query
        .get(SECURE_HASH)
        .map(|hash| hash.trim())
        .filter(|hash| !hash.is_empty())
        .ok_or(SignatureError::Missing)?;

    let signed: BTreeMap<String, String> = query
        .iter()
        .filter(|(key, _)| {
            key.starts_with("vnp_") && key.as_str() != SECURE_HASH && key.as_str() != SECURE_HASH_TYPE
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Key)?;
    mac.update(canonical_query(&signed).as_bytes());
    let expected = hex::decode(provided).map_err(|_| SignatureError::Mismatch)?;
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)?;

    Ok(callback_from_params(&signed))
}

fn callback_from_params(params: &BTreeMap<String, String>) -> GatewayCallback {
    let get = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();
    let order_info = get("vnp_OrderInfo").unwrap_or_default();
    GatewayCallback {
        order_id: extract_order_id(&order_info),
        order_info,
        txn_ref: get("vnp_TxnRef"),
        transaction_no: get("vnp_TransactionNo"),
        response_code: get("vnp_ResponseCode").unwrap_or_default(),
        card_type: get("vnp_CardType"),
        amount: get("vnp_Amount")
            .and_then(|amount| amount.parse::<i64>().ok())
            .map(|amount| amount / 100),
    }
}
