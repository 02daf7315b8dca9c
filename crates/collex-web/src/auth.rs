//! 用户认证和授权
//!
//! 令牌格式：`base64url(claims JSON) + "." + hex(HMAC-SHA256(secret, 第一段))`。

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Duration;
use collex_core::{codes, Clock, CollexError, Result, Role};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::debug;
use uuid::Uuid;

use crate::response::ApiError;
use crate::server::AppState;

type HmacSha256 = Hmac<Sha256>;

/// 已认证的调用者
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl Identity {
    /// 要求调用者具有指定角色
    pub fn require(&self, role: Role) -> Result<()> {
        if self.role != role {
            return Err(CollexError::forbidden(format!(
                "This action requires the {} role",
                role.as_str()
            )));
        }
        Ok(())
    }

    /// 要求调用者具有任一指定角色
    pub fn require_any(&self, roles: &[Role]) -> Result<()> {
        if !roles.contains(&self.role) {
            return Err(CollexError::forbidden("Role is not permitted for this action"));
        }
        Ok(())
    }
}

/// 令牌声明
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    role: String,
    exp: i64,
    iat: i64,
}

/// 令牌服务
pub trait TokenService: Send + Sync {
    fn issue(&self, user_id: Uuid, role: Role) -> Result<String>;

    fn verify(&self, token: &str) -> Result<Identity>;
}

/// HMAC签名令牌
pub struct HmacTokenService {
    secret: Vec<u8>,
    access_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for HmacTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacTokenService")
            .field("access_ttl", &self.access_ttl)
            .finish_non_exhaustive()
    }
}

fn invalid_token(message: &str) -> CollexError {
    CollexError::unauthorized(codes::INVALID_TOKEN, message)
}

impl HmacTokenService {
    pub fn new(secret: impl Into<Vec<u8>>, access_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl,
            clock,
        }
    }

    fn mac(&self, payload: &[u8]) -> Vec<u8> {
        // HMAC接受任意长度的密钥
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC accepts keys of any length"),
        };
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

impl TokenService for HmacTokenService {
    fn issue(&self, user_id: Uuid, role: Role) -> Result<String> {
        let now = self.clock.now();
        let claims = Claims {
            sub: user_id,
            role: role.as_str().to_string(),
            exp: (now + self.access_ttl).timestamp(),
            iat: now.timestamp(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signature = hex::encode(self.mac(payload.as_bytes()));
        Ok(format!("{}.{}", payload, signature))
    }

    fn verify(&self, token: &str) -> Result<Identity> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| invalid_token("Malformed token"))?;

        let provided = hex::decode(signature).map_err(|_| invalid_token("Malformed token signature"))?;
        let expected = self.mac(payload.as_bytes());
        if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            return Err(invalid_token("Token signature mismatch"));
        }

        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| invalid_token("Malformed token payload"))?;
        let claims: Claims = serde_json::from_slice(&raw).map_err(|_| invalid_token("Malformed token claims"))?;

        if claims.exp <= self.clock.now().timestamp() {
            return Err(invalid_token("Token has expired"));
        }
        let role = Role::parse(&claims.role).ok_or_else(|| invalid_token("Unknown role"))?;

        Ok(Identity {
            user_id: claims.sub,
            role,
        })
    }
}

/// 认证中间件：校验Bearer令牌并把 [`Identity`] 放入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if !token.trim().is_empty() => token.trim(),
        _ => {
            return Err(CollexError::unauthorized(codes::MISSING_TOKEN, "Missing bearer token").into());
        }
    };

    let identity = state.tokens.verify(token)?;
    debug!("Authenticated user {} as {}", identity.user_id, identity.role.as_str());
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .copied()
            .ok_or_else(|| CollexError::unauthorized(codes::MISSING_TOKEN, "User not authenticated").into())
    }
}
