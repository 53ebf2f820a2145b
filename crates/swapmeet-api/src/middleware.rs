use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use swapmeet_chat::ChatError;
use swapmeet_types::api::Claims;
use swapmeet_types::models::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller, attached to every protected request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: UserId,
    /// Peer address when the server was started with connect info.
    pub address: Option<String>,
}

/// Extract and validate the bearer JWT from the Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ChatError::Unauthenticated)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ChatError::Unauthenticated)?;

    let address = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    req.extensions_mut().insert(Caller {
        id: token_data.claims.sub,
        address,
    });
    Ok(next.run(req).await)
}

/// Signs a token for `user`. Production tokens come from the session
/// service; this serves local tooling and tests.
pub fn issue_token(secret: &str, user: UserId, ttl: chrono::Duration) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user,
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}
