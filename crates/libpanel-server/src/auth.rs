//! Requester identity
//!
//! Authentication happens upstream. The proxy in front of this server sets
//! identity headers, which are trusted as-is.

use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};

use libpanel_core::{OrgRole, SignedInUser};

use crate::http::ApiError;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const ORG_ID_HEADER: &str = "X-Org-Id";
pub const USER_LOGIN_HEADER: &str = "X-User-Login";
pub const USER_EMAIL_HEADER: &str = "X-User-Email";
pub const USER_AVATAR_HEADER: &str = "X-User-Avatar";
pub const ORG_ROLE_HEADER: &str = "X-Org-Role";

const DEFAULT_ORG_ID: i64 = 1;

/// The signed-in user making the request
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SignedInUser);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Build the requester from identity headers.
pub fn user_from_headers(headers: &HeaderMap) -> Result<SignedInUser, ApiError> {
    let user_id = header(headers, USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?
        .parse::<i64>()
        .map_err(|_| ApiError::Unauthorized(format!("invalid {} header", USER_ID_HEADER)))?;

    let org_id = match header(headers, ORG_ID_HEADER) {
        Some(v) => v
            .parse::<i64>()
            .map_err(|_| ApiError::BadRequest(format!("invalid {} header", ORG_ID_HEADER)))?,
        None => DEFAULT_ORG_ID,
    };

    let org_role = match header(headers, ORG_ROLE_HEADER) {
        Some(v) => v.parse::<OrgRole>().map_err(ApiError::BadRequest)?,
        None => OrgRole::Viewer,
    };

    let login = header(headers, USER_LOGIN_HEADER).unwrap_or_default();
    let mut user = SignedInUser::new(user_id, org_id, login, org_role);
    user.email = header(headers, USER_EMAIL_HEADER).unwrap_or_default().to_string();
    user.avatar_url = header(headers, USER_AVATAR_HEADER).unwrap_or_default().to_string();
    if user.login.is_empty() {
        user.name = format!("user {}", user_id);
    }
    Ok(user)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_from_headers(&parts.headers).map(CurrentUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn test_defaults() {
        let user = user_from_headers(&headers(&[("x-user-id", "7")])).unwrap();
        assert_eq!(user.user_id, 7);
        assert_eq!(user.org_id, 1);
        assert_eq!(user.org_role, OrgRole::Viewer);
        assert_eq!(user.display_name(), "user 7");
    }

    #[test]
    fn test_full_identity() {
        let user = user_from_headers(&headers(&[
            ("x-user-id", "2"),
            ("x-org-id", "3"),
            ("x-user-login", "editor"),
            ("x-user-email", "editor@example.com"),
            ("x-user-avatar", "/avatar/2"),
            ("x-org-role", "editor"),
        ]))
        .unwrap();
        assert_eq!(user.org_id, 3);
        assert_eq!(user.org_role, OrgRole::Editor);
        assert_eq!(user.display_name(), "editor");
        assert_eq!(user.avatar_url, "/avatar/2");
    }

    #[test]
    fn test_missing_or_bad_user_id() {
        assert!(matches!(
            user_from_headers(&HeaderMap::new()),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            user_from_headers(&headers(&[("x-user-id", "abc")])),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_bad_role() {
        assert!(matches!(
            user_from_headers(&headers(&[("x-user-id", "1"), ("x-org-role", "owner")])),
            Err(ApiError::BadRequest(_))
        ));
    }
}
