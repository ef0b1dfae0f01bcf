//! Bearer-token authentication and role gates.
//!
//! Handlers that need a caller take an [`AuthUser`] argument. The extractor
//! resolves the token once per request, before the handler body runs, so a
//! missing or expired token is rejected without side effects.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use uuid::Uuid;

use crate::models::{Role, User};
use crate::state::AppState;
use crate::store::StoreError;
use crate::utils::error::AppError;

pub mod password;
pub mod token;

pub use token::{bearer_token, hash_token, issue_token};

const UNAUTHENTICATED: &str = "Unauthenticated";

/// The caller of a protected route.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.user.role == role {
            Ok(())
        } else {
            Err(forbidden())
        }
    }

    pub fn forbid_role(&self, role: Role) -> Result<(), AppError> {
        if self.user.role == role {
            Err(forbidden())
        } else {
            Ok(())
        }
    }

    /// Passes only when the caller has `role` and is `owner_id`.
    pub fn require_owner(&self, role: Role, owner_id: Uuid) -> Result<(), AppError> {
        self.require_role(role)?;

        if self.user.id == owner_id {
            Ok(())
        } else {
            Err(forbidden())
        }
    }
}

pub fn forbidden() -> AppError {
    AppError::Forbidden("Forbidden".to_string())
}

fn unauthenticated() -> AppError {
    AppError::AuthError(UNAUTHENTICATED.to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(unauthenticated)?;
        let token = bearer_token(header).ok_or_else(unauthenticated)?;

        let stored = match state.store.token_by_hash(&hash_token(token)).await {
            Ok(stored) => stored,
            Err(StoreError::NotFound { .. }) => return Err(unauthenticated()),
            Err(e) => return Err(e.into()),
        };

        if stored.is_expired(Utc::now()) {
            tracing::debug!(user_id = %stored.user_id, "Rejected expired token");
            return Err(unauthenticated());
        }

        let user = match state.store.user_by_id(stored.user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound { .. }) => return Err(unauthenticated()),
            Err(e) => return Err(e.into()),
        };

        Ok(AuthUser { user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role) -> AuthUser {
        let now = Utc::now();
        AuthUser {
            user: User {
                id: Uuid::new_v4(),
                name: "Mira".to_string(),
                email: "mira@example.com".to_string(),
                password_hash: String::new(),
                role,
                address: None,
                phone: None,
                image_url: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    #[test]
    fn test_role_gates() {
        let manager = caller(Role::EventManager);

        assert!(manager.require_role(Role::EventManager).is_ok());
        assert!(manager.require_role(Role::Buyer).is_err());
        assert!(manager.forbid_role(Role::Administrator).is_ok());
        assert!(caller(Role::Administrator)
            .forbid_role(Role::Administrator)
            .is_err());
    }

    #[test]
    fn test_ownership_needs_role_and_identity() {
        let manager = caller(Role::EventManager);

        assert!(manager.require_owner(Role::EventManager, manager.id()).is_ok());
        assert!(manager
            .require_owner(Role::EventManager, Uuid::new_v4())
            .is_err());
        assert!(manager.require_owner(Role::Buyer, manager.id()).is_err());
    }

    #[test]
    fn test_forbidden_leaks_no_detail() {
        let err = caller(Role::Buyer).require_role(Role::Administrator).unwrap_err();
        assert_eq!(err.to_string(), "Forbidden: Forbidden");
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }
}
