//! Bearer-token extraction for request edges.

use crate::auth::Claims;

use super::error::AuthError;
use super::session_svc::SessionService;

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let token = header
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AuthError::Blank)?;
    if token.is_empty() {
        return Err(AuthError::Blank);
    }
    Ok(token)
}

/// Resolve an `Authorization` header value to the caller's claims.
pub async fn authenticate_header(
    sessions: &SessionService,
    header: Option<&str>,
    now: i64,
) -> Result<Claims, AuthError> {
    let token = bearer_token(header)?;
    sessions.authenticate(token, now).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_header_is_blank() {
        assert!(matches!(bearer_token(None), Err(AuthError::Blank)));
    }

    #[test]
    fn wrong_scheme_is_blank() {
        assert!(matches!(bearer_token(Some("Basic dXNlcg==")), Err(AuthError::Blank)));
    }

    #[test]
    fn empty_bearer_is_blank() {
        assert!(matches!(bearer_token(Some("Bearer   ")), Err(AuthError::Blank)));
    }
}
