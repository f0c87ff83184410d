// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    models::auth::{Claims, SessionContext},
};

const ACCESS_TOKEN_COOKIE: &str = "access_token";
const REQUEST_ID_HEADER: &str = "x-request-id";

// O middleware em si: valida a credencial e deixa o SessionContext
// nos "extensions" da requisição.
pub async fn auth_guard(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    let credential = bearer_token(&mut parts, &app_state)
        .await
        .or_else(|| cookie_token(&parts.headers))
        .ok_or(AppError::Unauthenticated)?;

    let claims = decode_claims(&credential, &app_state.config.jwt_secret)?;
    let session = SessionContext::new(claims, credential, request_id(&parts.headers));

    tracing::debug!(
        request_id = %session.request_id(),
        user_id = %session.user_id(),
        "Sessão estabelecida"
    );

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

async fn bearer_token(parts: &mut Parts, state: &AppState) -> Option<String> {
    TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
        .await
        .ok()
        .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

fn request_id(headers: &HeaderMap) -> Uuid {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .unwrap_or_else(Uuid::new_v4)
}

pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, AppError> {
    Claims::decode(token, secret).map_err(|e| {
        tracing::debug!(error = %e, "Token de identidade rejeitado");
        AppError::Unauthenticated
    })
}

// Extrator para obter a sessão diretamente nos handlers atrás do `auth_guard`.
impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}
