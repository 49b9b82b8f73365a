use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, TimeZone, Utc};
use storefront_api::{
    config::VnPayConfig,
    vnpay::{
        self, PaymentRequest, SECURE_HASH, SECURE_HASH_TYPE, SignatureError, build_payment_url,
        canonical_query, encode_component, extract_order_id, gateway_timestamp, payment_params, sign,
        verify_callback,
    },
};
use uuid::Uuid;

const SECRET: &str = "TESTSECRETKEY";

fn config() -> VnPayConfig {
    VnPayConfig {
        version: "2.1.0".into(),
        tmn_code: "DEMO0001".into(),
        hash_secret: SECRET.into(),
        payment_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
        return_url: "http://localhost:3000/payment/result".into(),
        locale: "vn".into(),
        order_type: "other".into(),
        expire_minutes: 15,
    }
}

fn request(order_id: Uuid) -> PaymentRequest {
    PaymentRequest {
        order_id,
        amount: 150_000,
        ip_addr: "203.0.113.7".into(),
        txn_ref: "1704067200000".into(),
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

/// Query a gateway would send back for `order_id`, signed with `secret`.
fn signed_callback(secret: &str, order_id: Uuid, response_code: &str) -> HashMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("vnp_Amount".to_string(), "15000000".to_string());
    params.insert("vnp_BankCode".to_string(), "NCB".to_string());
    params.insert("vnp_CardType".to_string(), "ATM".to_string());
    params.insert("vnp_OrderInfo".to_string(), vnpay::order_info(order_id));
    params.insert("vnp_PayDate".to_string(), "20240101070500".to_string());
    params.insert("vnp_ResponseCode".to_string(), response_code.to_string());
    params.insert("vnp_TmnCode".to_string(), "DEMO0001".to_string());
    params.insert("vnp_TransactionNo".to_string(), "14226112".to_string());
    params.insert("vnp_TxnRef".to_string(), "1704067200000".to_string());

    let hash = sign(secret, &canonical_query(&params)).unwrap();
    let mut query: HashMap<String, String> = params.into_iter().collect();
    query.insert(SECURE_HASH_TYPE.to_string(), "HmacSHA512".to_string());
    query.insert(SECURE_HASH.to_string(), hash);
    query
}

#[test]
fn canonical_query_sorts_skips_empty_and_form_encodes() {
    let mut params = BTreeMap::new();
    params.insert("vnp_b".to_string(), "x y".to_string());
    params.insert("vnp_c".to_string(), String::new());
    params.insert("vnp_a".to_string(), "1".to_string());
    params.insert("vnp_ReturnUrl".to_string(), "http://a/b?c=d".to_string());

    assert_eq!(
        canonical_query(&params),
        "vnp_ReturnUrl=http%3A%2F%2Fa%2Fb%3Fc%3Dd&vnp_a=1&vnp_b=x+y"
    );
}

#[test]
fn encoding_keeps_marks_and_escapes_tilde() {
    assert_eq!(encode_component("Sale! (50%*) a~b"), "Sale!+(50%25*)+a%7Eb");
    assert_eq!(encode_component("-_."), "-_.");
}

#[test]
fn callback_with_marks_in_order_info_verifies() {
    let order_id = Uuid::new_v4();
    let mut params = BTreeMap::new();
    params.insert(
        "vnp_OrderInfo".to_string(),
        format!("Thanh toan (don hang)! {order_id} ~*"),
    );
    params.insert("vnp_ResponseCode".to_string(), "00".to_string());
    params.insert("vnp_TxnRef".to_string(), "1704067200000".to_string());
    // Signed over the gateway's encoding, built by hand.
    let signed = format!(
        "vnp_OrderInfo=Thanh+toan+(don+hang)!+{order_id}+%7E*&vnp_ResponseCode=00&vnp_TxnRef=1704067200000"
    );
    assert_eq!(canonical_query(&params), signed);

    let mut query: HashMap<String, String> = params.into_iter().collect();
    query.insert(SECURE_HASH.to_string(), sign(SECRET, &signed).unwrap());
    let callback = verify_callback(SECRET, &query).unwrap();
    assert_eq!(callback.order_id, Some(order_id));
}

#[test]
fn oversized_amounts_are_refused() {
    assert_eq!(vnpay::gateway_amount(150_000), Ok(15_000_000));
    assert_eq!(
        vnpay::gateway_amount(i64::MAX / 10),
        Err(SignatureError::Amount)
    );

    let mut req = request(Uuid::new_v4());
    req.amount = 100_000_000_000_000_000;
    assert_eq!(build_payment_url(&config(), &req), Err(SignatureError::Amount));
    assert!(payment_params(&config(), &req).is_err());
}

#[test]
fn sign_matches_reference_hmac_sha512() {
    assert_eq!(
        sign("secret", "vnp_a=1&vnp_b=x+y").unwrap(),
        "c08abb990ebc71127340a88b21e47e91c003e0ffbaa7b7748a43e680f2c7cc91911c17d9456afb788787d13e89c370157e603a1e73391f84af5cac171197c0d0"
    );
}

#[test]
fn signing_ignores_insertion_order() {
    let forward: BTreeMap<String, String> = [("vnp_a", "1"), ("vnp_b", "2"), ("vnp_c", "3")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let backward: BTreeMap<String, String> = [("vnp_c", "3"), ("vnp_b", "2"), ("vnp_a", "1")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    assert_eq!(
        sign(SECRET, &canonical_query(&forward)).unwrap(),
        sign(SECRET, &canonical_query(&backward)).unwrap()
    );
}

#[test]
fn gateway_timestamp_is_gmt_plus_seven() {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 17, 30, 0).unwrap();
    assert_eq!(gateway_timestamp(at), "20240102003000");
}

#[test]
fn payment_params_carry_amount_in_minor_units_and_expiry() {
    let order_id = Uuid::new_v4();
    let req = request(order_id);
    let params = payment_params(&config(), &req).unwrap();

    assert_eq!(params["vnp_Amount"], "15000000");
    assert_eq!(params["vnp_Command"], "pay");
    assert_eq!(params["vnp_CurrCode"], "VND");
    assert_eq!(params["vnp_CreateDate"], "20240101070000");
    assert_eq!(
        params["vnp_ExpireDate"],
        gateway_timestamp(req.created_at + Duration::minutes(15))
    );
    assert_eq!(params["vnp_OrderInfo"], format!("Thanh toan don hang {order_id}"));
    assert_eq!(params["vnp_TxnRef"], "1704067200000");
}

#[test]
fn payment_url_is_signed_over_the_canonical_query() {
    let cfg = config();
    let req = request(Uuid::new_v4());
    let url = build_payment_url(&cfg, &req).unwrap();

    let query = canonical_query(&payment_params(&cfg, &req).unwrap());
    let expected_hash = sign(SECRET, &query).unwrap();
    assert_eq!(
        url,
        format!("{}?{}&vnp_SecureHash={}", cfg.payment_url, query, expected_hash)
    );
    assert!(url.contains("vnp_OrderInfo=Thanh+toan+don+hang+"));
}

#[test]
fn valid_callback_is_accepted() {
    let order_id = Uuid::new_v4();
    let query = signed_callback(SECRET, order_id, "00");

    let callback = verify_callback(SECRET, &query).unwrap();
    assert!(callback.is_success());
    assert_eq!(callback.order_id, Some(order_id));
    assert_eq!(callback.transaction_no.as_deref(), Some("14226112"));
    assert_eq!(callback.card_type.as_deref(), Some("ATM"));
    assert_eq!(callback.amount, Some(150_000));
}

#[test]
fn failed_payment_callback_still_verifies() {
    let query = signed_callback(SECRET, Uuid::new_v4(), "24");
    let callback = verify_callback(SECRET, &query).unwrap();
    assert!(!callback.is_success());
    assert_eq!(callback.response_code, "24");
}

#[test]
fn uppercase_hash_is_accepted() {
    let mut query = signed_callback(SECRET, Uuid::new_v4(), "00");
    let upper = query[SECURE_HASH].to_uppercase();
    query.insert(SECURE_HASH.to_string(), upper);
    assert!(verify_callback(SECRET, &query).is_ok());
}

#[test]
fn non_gateway_params_do_not_affect_signature() {
    let mut query = signed_callback(SECRET, Uuid::new_v4(), "00");
    query.insert("utm_source".to_string(), "newsletter".to_string());
    assert!(verify_callback(SECRET, &query).is_ok());
}

#[test]
fn tampered_amount_is_rejected() {
    let mut query = signed_callback(SECRET, Uuid::new_v4(), "00");
    query.insert("vnp_Amount".to_string(), "100".to_string());
    assert_eq!(
        verify_callback(SECRET, &query).unwrap_err(),
        SignatureError::Mismatch
    );
}

#[test]
fn wrong_secret_is_rejected() {
    let query = signed_callback("another-secret", Uuid::new_v4(), "00");
    assert_eq!(
        verify_callback(SECRET, &query).unwrap_err(),
        SignatureError::Mismatch
    );
}

#[test]
fn missing_or_garbled_hash_is_rejected() {
    let mut query = signed_callback(SECRET, Uuid::new_v4(), "00");
    query.remove(SECURE_HASH);
    assert_eq!(
        verify_callback(SECRET, &query).unwrap_err(),
        SignatureError::Missing
    );

    query.insert(SECURE_HASH.to_string(), "not-hex".to_string());
    assert_eq!(
        verify_callback(SECRET, &query).unwrap_err(),
        SignatureError::Mismatch
    );
}

#[test]
fn order_id_is_found_in_order_info() {
    let id = Uuid::new_v4();
    assert_eq!(extract_order_id(&format!("Thanh toan don hang {id}")), Some(id));
    assert_eq!(extract_order_id(&format!("Order #{id} paid")), Some(id));
    assert_eq!(extract_order_id("Thanh toan don hang"), None);
}
