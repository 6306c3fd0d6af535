//! Verified-identity extraction.
//!
//! Authentication itself is an external collaborator: the upstream auth
//! proxy verifies the session and forwards the identity on trusted headers.
//! This extractor only reads them; requests that bypass the proxy carry no
//! identity and are rejected with 401.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Identity of the authenticated caller, as asserted by the auth proxy.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
}

impl AuthUser {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let user_id = headers
            .get(USER_ID_HEADER)?
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v).ok())?;
        let name = headers.get(USER_NAME_HEADER)?.to_str().ok()?.to_string();
        let email = headers.get(USER_EMAIL_HEADER)?.to_str().ok()?.to_string();
        Some(Self {
            user_id,
            name,
            email,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        AuthUser::from_headers(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_identity_from_trusted_headers() {
        let mut headers = HeaderMap::new();
        let id = Uuid::new_v4();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        headers.insert(USER_NAME_HEADER, HeaderValue::from_static("Kim"));
        headers.insert(USER_EMAIL_HEADER, HeaderValue::from_static("kim@example.com"));

        let user = AuthUser::from_headers(&headers).unwrap();
        assert_eq!(user.user_id, id);
        assert_eq!(user.name, "Kim");
    }

    #[test]
    fn missing_or_malformed_headers_yield_no_identity() {
        assert!(AuthUser::from_headers(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        headers.insert(USER_NAME_HEADER, HeaderValue::from_static("Kim"));
        headers.insert(USER_EMAIL_HEADER, HeaderValue::from_static("kim@example.com"));
        assert!(AuthUser::from_headers(&headers).is_none());
    }
}
