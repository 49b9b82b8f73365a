use std::env;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub auth: AuthConfig,
    pub vnpay: VnPayConfig,
    pub storage: Option<StorageConfig>,
}

/// Where bearer tokens get their verification keys from.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub jwks_url: Option<String>,
    pub audience: Option<String>,
    pub issuer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VnPayConfig {
    pub version: String,
    pub tmn_code: String,
    pub hash_secret: String,
    pub payment_url: String,
    pub return_url: String,
    pub locale: String,
    pub order_type: String,
    pub expire_minutes: i64,
}

/// S3-compatible bucket (Cloudflare R2) holding product images.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub account_id: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub public_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let auth = AuthConfig::from_env()?;
        Ok(Self {
            port,
            database_url,
            host,
            allowed_origins,
            auth,
            vnpay: VnPayConfig::from_env(),
            storage: StorageConfig::from_env(),
        })
    }
}

impl AuthConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = non_empty_var("JWT_SECRET");
        let jwks_url = non_empty_var("JWT_JWKS_URL");
        if jwt_secret.is_none() && jwks_url.is_none() {
            anyhow::bail!("either JWT_JWKS_URL or JWT_SECRET must be set");
        }
        Ok(Self {
            jwt_secret,
            jwks_url,
            audience: non_empty_var("JWT_AUDIENCE"),
            issuer: non_empty_var("JWT_ISSUER"),
        })
    }
}

impl VnPayConfig {
    pub fn from_env() -> Self {
        Self {
            version: env::var("VNPAY_VERSION").unwrap_or_else(|_| "2.1.0".to_string()),
            tmn_code: env::var("VNPAY_TMN_CODE").unwrap_or_default(),
            hash_secret: env::var("VNPAY_HASH_SECRET").unwrap_or_default(),
            payment_url: env::var("VNPAY_PAYMENT_URL").unwrap_or_else(|_| {
                "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string()
            }),
            return_url: env::var("VNPAY_RETURN_URL").unwrap_or_default(),
            locale: env::var("VNPAY_LOCALE").unwrap_or_else(|_| "vn".to_string()),
            order_type: env::var("VNPAY_ORDER_TYPE").unwrap_or_else(|_| "other".to_string()),
            expire_minutes: env::var("VNPAY_EXPIRE_MINUTES")
                .ok()
                .and_then(|m| m.parse::<i64>().ok())
                .unwrap_or(15),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.tmn_code.is_empty() && !self.hash_secret.is_empty()
    }
}

impl StorageConfig {
    /// Returns `None` unless every R2 variable is present.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            account_id: non_empty_var("R2_ACCOUNT_ID")?,
            access_key: non_empty_var("R2_ACCESS_KEY")?,
            secret_key: non_empty_var("R2_SECRET_KEY")?,
            bucket: non_empty_var("R2_BUCKET_NAME")?,
            public_url: non_empty_var("R2_PUBLIC_URL")?,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
