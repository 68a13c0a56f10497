//! Request extractors for the authenticated user and caller address

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;

use crate::db::PublicUser;
use crate::error::AppError;
use crate::state::AppState;

use super::session::SESSION_COOKIE;

/// The logged-in user behind the request's session cookie
///
/// Rejects with `AppError::Unauthorized`; wrap in `Option` for pages that
/// redirect instead.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user: PublicUser,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or(AppError::Unauthorized)?;

        let user = state
            .sessions()
            .resolve(state.db(), &token)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(SessionUser { user, token })
    }
}

/// Network address of the caller
///
/// First hop of `X-Forwarded-For` when behind a proxy, otherwise the socket
/// peer, otherwise `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(addr) = forwarded {
            return Ok(ClientAddr(addr.to_string()));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientAddr(peer.unwrap_or_else(|| "unknown".to_string())))
    }
}
