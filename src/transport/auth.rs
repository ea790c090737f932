use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::auth::Principal;
use crate::error::AccessError;

use super::{ApiError, AppState};

/// The caller, authenticated from the request's Basic credentials.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let (username, password) = basic_credentials(&parts.headers)?;
        let principal = state
            .run(move |platform| platform.authenticate(&username, &password))
            .await?;
        Ok(Self(principal))
    }
}

/// Decodes `Authorization: Basic <base64(user:password)>`.
fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), AccessError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AccessError::MissingCredentials)?;
    let (scheme, encoded) = value.split_once(' ').ok_or(AccessError::MissingCredentials)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AccessError::MissingCredentials);
    }
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AccessError::MissingCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AccessError::MissingCredentials)?;
    let (username, password) = decoded.split_once(':').ok_or(AccessError::MissingCredentials)?;
    Ok((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_decodes_basic_credentials() {
        let encoded = STANDARD.encode("coach1:pa:ss");
        let (user, pass) = basic_credentials(&headers(&format!("Basic {encoded}"))).unwrap();
        assert_eq!(user, "coach1");
        assert_eq!(pass, "pa:ss");
    }

    #[test]
    fn test_rejects_missing_or_foreign_schemes() {
        assert!(basic_credentials(&HeaderMap::new()).is_err());
        assert!(basic_credentials(&headers("Bearer abc")).is_err());
        assert!(basic_credentials(&headers("Basic !!!")).is_err());
        let no_colon = STANDARD.encode("coach1");
        assert!(basic_credentials(&headers(&format!("Basic {no_colon}"))).is_err());
    }
}
