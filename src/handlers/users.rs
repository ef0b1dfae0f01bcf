use axum::{extract::State, response::Response};

use crate::auth::AuthUser;
use crate::models::Role;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;
use crate::views::UserView;

pub async fn list_buyers(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Response, AppError> {
    caller.require_role(Role::Administrator)?;

    let buyers: Vec<UserView> = state
        .store
        .users_by_role(Role::Buyer)
        .await?
        .iter()
        .map(UserView::from)
        .collect();

    Ok(success(buyers, "Buyers retrieved successfully"))
}
