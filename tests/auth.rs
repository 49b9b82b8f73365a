use jsonwebtoken::{EncodingKey, Header, encode};
use storefront_api::{
    error::AppError,
    middleware::auth::{AppMetadata, AuthUser, Claims, TokenVerifier, ensure_admin},
};
use uuid::Uuid;

const SECRET: &str = "auth-test-secret";

fn claims(exp_offset: i64, aud: Option<&str>) -> Claims {
    Claims {
        sub: Uuid::new_v4().to_string(),
        exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        aud: aud.map(|a| serde_json::Value::String(a.to_string())),
        email: None,
        app_metadata: AppMetadata {
            role: Some("admin".into()),
        },
    }
}

fn sign(claims: &Claims) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

#[test]
fn valid_token_yields_claims() {
    let original = claims(3600, None);
    let verified = TokenVerifier::from_secret(SECRET)
        .verify(&sign(&original))
        .unwrap();
    assert_eq!(verified.sub, original.sub);
    assert_eq!(verified.app_metadata.role.as_deref(), Some("admin"));
}

#[test]
fn expired_token_is_rejected() {
    let token = sign(&claims(-3600, None));
    assert!(matches!(
        TokenVerifier::from_secret(SECRET).verify(&token),
        Err(AppError::Unauthorized(_))
    ));
}

#[test]
fn audience_is_enforced_when_configured() {
    let verifier =
        TokenVerifier::from_secret(SECRET).with_audience(Some("authenticated".to_string()));

    assert!(verifier.verify(&sign(&claims(3600, Some("authenticated")))).is_ok());
    assert!(verifier.verify(&sign(&claims(3600, Some("anon")))).is_err());
    assert!(verifier.verify(&sign(&claims(3600, None))).is_err());
}

#[test]
fn only_admins_pass_admin_check() {
    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        role: "admin".into(),
    };
    let shopper = AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    };
    assert!(ensure_admin(&admin).is_ok());
    assert!(matches!(ensure_admin(&shopper), Err(AppError::Forbidden)));
}
