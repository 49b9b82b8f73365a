use std::collections::HashMap;

use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{
    Algorithm, DecodingKey, Validation, decode, decode_header,
    jwk::JwkSet,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::AuthConfig, error::AppError, state::AppState};

pub const ADMIN_ROLE: &str = "admin";
pub const DEFAULT_ROLE: &str = "user";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppMetadata {
    pub role: Option<String>,
}

/// Claims issued by the identity provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

enum VerificationKeys {
    Secret(DecodingKey),
    Jwks(HashMap<String, DecodingKey>),
}

/// Verifies bearer tokens against a shared secret or a published key set.
pub struct TokenVerifier {
    keys: VerificationKeys,
    audience: Option<String>,
    issuer: Option<String>,
}

impl TokenVerifier {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            keys: VerificationKeys::Secret(DecodingKey::from_secret(secret.as_bytes())),
            audience: None,
            issuer: None,
        }
    }

    /// Keys without a `kid`, or that cannot be turned into a decoding key, are skipped.
    pub fn from_jwks(jwks: &JwkSet) -> Self {
        let keys = jwks
            .keys
            .iter()
            .filter_map(|jwk| {
                let kid = jwk.common.key_id.clone()?;
                match DecodingKey::from_jwk(jwk) {
                    Ok(key) => Some((kid, key)),
                    Err(err) => {
                        tracing::warn!(kid = %kid, error = %err, "skipping unusable signing key");
                        None
                    }
                }
            })
            .collect();
        Self {
            keys: VerificationKeys::Jwks(keys),
            audience: None,
            issuer: None,
        }
    }

    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.issuer = issuer;
        self
    }

    /// Fetches the key set once when `JWT_JWKS_URL` is configured.
    pub async fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        let verifier = match (&config.jwks_url, &config.jwt_secret) {
            (Some(url), _) => {
                let jwks: JwkSet = reqwest::get(url)
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                tracing::info!(keys = jwks.keys.len(), url = %url, "loaded signing keys");
                Self::from_jwks(&jwks)
            }
            (None, Some(secret)) => Self::from_secret(secret),
            (None, None) => anyhow::bail!("no token verification key configured"),
        };
        Ok(verifier
            .with_audience(config.audience.clone())
            .with_issuer(config.issuer.clone()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let (key, algorithm) = self.key_for(token)?;

        let mut validation = Validation::new(algorithm);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        decode::<Claims>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))
    }

    fn key_for(&self, token: &str) -> Result<(&DecodingKey, Algorithm), AppError> {
        match &self.keys {
            VerificationKeys::Secret(key) => Ok((key, Algorithm::HS256)),
            VerificationKeys::Jwks(keys) => {
                let header = decode_header(token)
                    .map_err(|_| AppError::Unauthorized("Invalid token header".into()))?;
                if matches!(
                    header.alg,
                    Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
                ) {
                    return Err(AppError::Unauthorized("Unsupported token algorithm".into()));
                }
                let key = header
                    .kid
                    .as_deref()
                    .and_then(|kid| keys.get(kid))
                    .ok_or_else(|| AppError::Unauthorized("Unknown signing key".into()))?;
                Ok((key, header.alg))
            }
        }
    }
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, ADMIN_ROLE)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))?;

        let claims = state.verifier.verify(token)?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;

        Ok(AuthUser {
            user_id,
            role: claims
                .app_metadata
                .role
                .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        })
    }
}
