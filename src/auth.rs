//! Bearer credential verification and the authorization guards built on it.
//!
//! Every service in the deployment signs and verifies tokens with the same
//! HS256 secret, so the claims are re-validated here (signature and expiry)
//! rather than trusted from the gateway.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::services::access::AccessControl;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    AppError::Authentication("token has expired".to_string())
                }
                _ => AppError::Authentication("invalid token".to_string()),
            })
    }
}

/// The verified identity of the caller, scoped to a single request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: i64,
    pub role: String,
    pub is_admin: bool,
    token: String,
}

impl Caller {
    pub fn from_claims(claims: Claims, token: String, admin_role: &str) -> Self {
        Self {
            is_admin: claims.role == admin_role,
            user_id: claims.user_id,
            role: claims.role,
            token,
        }
    }

    /// Raw bearer token, forwarded to collaborators so they can authorize the call themselves.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Owners manage their own bookings; administrators manage everyone's.
    pub fn ensure_owner_or_admin(&self, owner_id: i64) -> Result<(), AppError> {
        if self.is_admin || self.user_id == owner_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "not authorized to access this booking".to_string(),
            ))
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Authentication("missing bearer token".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::Authentication("expected 'Authorization: Bearer <token>'".to_string())
            })?;

        let claims = state.tokens.verify(token)?;
        Ok(Caller::from_claims(
            claims,
            token.to_string(),
            &state.config.admin_role,
        ))
    }
}

/// One step of an authorization chain. Steps run in order and the first failure wins.
#[derive(Debug, Clone, Copy)]
pub enum Guard<'a> {
    Authenticated,
    Admin,
    Permission(&'a str),
}

pub async fn authorize(
    caller: &Caller,
    guards: &[Guard<'_>],
    access: &dyn AccessControl,
) -> Result<(), AppError> {
    for guard in guards {
        match guard {
            Guard::Authenticated => {}
            Guard::Admin => {
                if !caller.is_admin {
                    return Err(AppError::Forbidden(
                        "administrator role required".to_string(),
                    ));
                }
            }
            Guard::Permission(name) => {
                // Administrators hold every permission.
                if caller.is_admin {
                    continue;
                }
                let granted = access
                    .permissions_for(caller.user_id, caller.token())
                    .await?;
                if !granted.iter().any(|p| p == name) {
                    return Err(AppError::Forbidden(format!("permission '{name}' required")));
                }
            }
        }
    }
    Ok(())
}
