//! Caller clearance forwarded by the gateway.
//!
//! The gateway puts its decision in `x-topology-access` (`read` or `write`,
//! comma separated) and the caller's name in `x-topology-user`. Both are
//! trusted as-is.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use netsite_core::Access;
use std::convert::Infallible;

/// Header carrying the access decision
pub const ACCESS_HEADER: &str = "x-topology-access";

/// Header carrying the user recorded on writes
pub const USER_HEADER: &str = "x-topology-user";

/// Extracts [`Access`] from request headers; missing headers mean no access
#[derive(Debug, Clone)]
pub struct RequestAccess(pub Access);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestAccess
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut access = Access {
            user: header(parts, USER_HEADER).map(str::to_string),
            ..Default::default()
        };

        for grant in header(parts, ACCESS_HEADER).unwrap_or_default().split(',') {
            match grant.trim().to_lowercase().as_str() {
                "read" => access.can_read = true,
                "write" => {
                    access.can_read = true;
                    access.can_write = true;
                }
                "" => {}
                other => tracing::debug!(grant = other, "Ignoring unknown access grant"),
            }
        }

        Ok(RequestAccess(access))
    }
}
