use axum::{extract::State, response::Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    issue_token,
    password::{hash_password_blocking, verify_password_blocking},
    AuthUser,
};
use crate::models::{NewAccessToken, NewUser, Role, User};
use crate::state::AppState;
use crate::store::StoreError;
use crate::utils::error::AppError;
use crate::utils::extract::ValidatedJson;
use crate::utils::response::{created, empty_success, success};

const INVALID_CREDENTIALS: &str = "Invalid login credentials";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirmation: String,
    pub role: Role,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionPayload {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub image_url: Option<String>,
    pub token: String,
}

enum SessionAction {
    Registered,
    LoggedIn,
    LoggedOut,
}

fn role_message(role: Role, action: SessionAction) -> &'static str {
    match (role, action) {
        (Role::Buyer, SessionAction::Registered) => {
            "Welcome, valued buyer! Your account has been successfully created."
        }
        (Role::Buyer, SessionAction::LoggedIn) => "Hello, buyer! You are now logged in.",
        (Role::Buyer, SessionAction::LoggedOut) => "Goodbye, buyer! See you again soon!",
        (Role::EventManager, SessionAction::Registered) => {
            "Welcome, manager! You can now create and manage events."
        }
        (Role::EventManager, SessionAction::LoggedIn) => {
            "Hello, manager! Ready to oversee your events?"
        }
        (Role::EventManager, SessionAction::LoggedOut) => {
            "Goodbye, manager! Your events are safe with us."
        }
        (Role::Administrator, SessionAction::Registered) => {
            "Welcome, administrator! You now have access to manage the platform."
        }
        (Role::Administrator, SessionAction::LoggedIn) => {
            "Hello, administrator! Ready to oversee the platform?"
        }
        (Role::Administrator, SessionAction::LoggedOut) => "Goodbye, administrator! Take care.",
    }
}

async fn open_session(state: &AppState, user: &User) -> Result<SessionPayload, AppError> {
    let (token, token_hash) = issue_token();

    state
        .store
        .create_token(NewAccessToken {
            user_id: user.id,
            token_hash,
            expires_at: Utc::now() + state.config.token_ttl,
        })
        .await?;

    Ok(SessionPayload {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
        image_url: user.image_url.clone(),
        token,
    })
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<Response, AppError> {
    let password_hash = hash_password_blocking(payload.password).await?;

    let user = state
        .store
        .create_user(NewUser {
            name: payload.name,
            email: payload.email.trim().to_lowercase(),
            password_hash,
            role: payload.role,
            address: payload.address,
            phone: payload.phone,
            image_url: payload.image_url,
        })
        .await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    let session = open_session(&state, &user).await?;
    Ok(created(
        session,
        role_message(user.role, SessionAction::Registered),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Response, AppError> {
    let email = payload.email.trim().to_lowercase();

    let user = match state.store.user_by_email(&email).await {
        Ok(user) => user,
        Err(StoreError::NotFound { .. }) => {
            tracing::warn!("Login attempt for unknown email");
            return Err(AppError::AuthError(INVALID_CREDENTIALS.to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    if !verify_password_blocking(payload.password, user.password_hash.clone()).await {
        tracing::warn!(user_id = %user.id, "Login attempt with wrong password");
        return Err(AppError::AuthError(INVALID_CREDENTIALS.to_string()));
    }

    let purged = state.store.clear_expired_tokens(Utc::now()).await?;
    if purged > 0 {
        tracing::debug!(purged, "Cleared expired tokens");
    }

    let session = open_session(&state, &user).await?;
    Ok(success(session, role_message(user.role, SessionAction::LoggedIn)))
}

pub async fn logout(State(state): State<AppState>, caller: AuthUser) -> Result<Response, AppError> {
    let revoked = state.store.delete_tokens_for_user(caller.id()).await?;
    tracing::info!(user_id = %caller.id(), revoked, "User logged out");

    Ok(empty_success(role_message(
        caller.role(),
        SessionAction::LoggedOut,
    )))
}
