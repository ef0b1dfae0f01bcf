use axum::{extract::State, response::Response};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::models::{NewAuthor, NewVenue, Role};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{PathParam, ValidatedJson};
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVenueRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub city: String,
    #[validate(length(min = 1, max = 255))]
    pub country: String,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[validate(range(min = 0))]
    pub capacity_people: i32,
    #[validate(url)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAuthorRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub music_genre: String,
    #[validate(url)]
    pub image_url: Option<String>,
}

pub async fn list_venues(State(state): State<AppState>) -> Result<Response, AppError> {
    let venues = state.store.list_venues().await?;
    Ok(success(venues, "Venues retrieved successfully"))
}

pub async fn get_venue(
    State(state): State<AppState>,
    PathParam(venue_id): PathParam<Uuid>,
) -> Result<Response, AppError> {
    let venue = state.store.venue_by_id(venue_id).await?;
    Ok(success(venue, "Venue retrieved successfully"))
}

pub async fn create_venue(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidatedJson(payload): ValidatedJson<CreateVenueRequest>,
) -> Result<Response, AppError> {
    caller.require_role(Role::Administrator)?;

    let venue = state
        .store
        .create_venue(NewVenue {
            name: payload.name,
            city: payload.city,
            country: payload.country,
            address: payload.address,
            capacity_people: payload.capacity_people,
            image_url: payload.image_url,
        })
        .await?;

    tracing::info!(venue_id = %venue.id, "Venue created");
    Ok(created(venue, "Venue created successfully"))
}

pub async fn list_authors(State(state): State<AppState>) -> Result<Response, AppError> {
    let authors = state.store.list_authors().await?;
    Ok(success(authors, "Authors retrieved successfully"))
}

pub async fn get_author(
    State(state): State<AppState>,
    PathParam(author_id): PathParam<Uuid>,
) -> Result<Response, AppError> {
    let author = state.store.author_by_id(author_id).await?;
    Ok(success(author, "Author retrieved successfully"))
}

pub async fn create_author(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidatedJson(payload): ValidatedJson<CreateAuthorRequest>,
) -> Result<Response, AppError> {
    caller.require_role(Role::Administrator)?;

    let author = state
        .store
        .create_author(NewAuthor {
            name: payload.name,
            music_genre: payload.music_genre,
            image_url: payload.image_url,
        })
        .await?;

    tracing::info!(author_id = %author.id, "Author created");
    Ok(created(author, "Author created successfully"))
}
