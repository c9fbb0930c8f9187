use axum::{async_trait, extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Actor, Role, UserId};

use super::{error::ApiError, handlers::AppState};

/// JWTクレーム
///
/// トークンの発行は認証サービスの責務。このサービスは検証のみ行う。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(actor: &Actor, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: actor.user_id.value(),
            name: actor.name.clone(),
            role: actor.role,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }

    /// Create a signed HS256 token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{EncodingKey, Header, encode};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Verify signature and expiry, then decode
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{DecodingKey, Validation, decode};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: UserId::from_uuid(self.sub),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

/// エンドポイントが要求するロール
pub trait RequiredRole: Send + Sync + 'static {
    const ROLE: Role;
}

pub struct AdminOnly;
pub struct StaffOnly;
pub struct BorrowerOnly;

impl RequiredRole for AdminOnly {
    const ROLE: Role = Role::Admin;
}

impl RequiredRole for StaffOnly {
    const ROLE: Role = Role::Staff;
}

impl RequiredRole for BorrowerOnly {
    const ROLE: Role = Role::Borrower;
}

/// 認可済みの操作主体
///
/// すべてのライフサイクルエンドポイントがこの1つの抽出器でロールを検査する。
/// トークンがない・不正・ロール不一致はいずれも403。
pub struct Authorized<R: RequiredRole> {
    pub actor: Actor,
    _role: PhantomData<R>,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl<R: RequiredRole> FromRequestParts<Arc<AppState>> for Authorized<R> {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthenticated)?;

        let claims = Claims::from_token(token, &state.jwt_secret).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            ApiError::Unauthenticated
        })?;

        if claims.role != R::ROLE {
            return Err(ApiError::Forbidden(R::ROLE));
        }

        Ok(Authorized {
            actor: claims.actor(),
            _role: PhantomData,
        })
    }
}
