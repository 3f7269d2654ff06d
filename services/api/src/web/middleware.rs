//! services/api/src/web/middleware.rs
//!
//! Principal extraction for protected routes.
//!
//! Token issuance and verification belong to the identity collaborator in
//! front of this service; by the time a request reaches the core it carries
//! an authenticated principal id and role in headers, which this middleware
//! trusts verbatim.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::ApiError;
use training_core::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Candidate,
}

/// The authenticated caller, as asserted by the identity collaborator.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    /// The candidate id this principal acts for; admins are not candidates.
    pub fn candidate_id(&self) -> Result<Uuid, ApiError> {
        match self.role {
            Role::Candidate => Ok(self.id),
            Role::Admin => Err(ApiError::Domain(DomainError::Forbidden(
                "Candidate role required".to_string(),
            ))),
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Candidate => Err(ApiError::Domain(DomainError::Forbidden(
                "Admin role required".to_string(),
            ))),
        }
    }
}

fn principal_from_headers(headers: &HeaderMap) -> Option<Principal> {
    let id = headers
        .get("x-principal-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())?;
    let role = match headers.get("x-principal-role").and_then(|v| v.to_str().ok()) {
        Some("admin") => Role::Admin,
        Some("candidate") => Role::Candidate,
        _ => return None,
    };
    Some(Principal { id, role })
}

/// Middleware that extracts the principal headers and makes the `Principal`
/// available to handlers via request extensions. Requests without a valid
/// principal are rejected with 401.
pub async fn require_principal(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let principal =
        principal_from_headers(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
