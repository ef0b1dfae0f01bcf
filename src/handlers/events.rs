use axum::{extract::State, response::Response};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::models::{Event, EventChanges, NewEvent, Role};
use crate::state::AppState;
use crate::store::{Store, StoreError};
use crate::utils::error::AppError;
use crate::utils::extract::{PathParam, ValidatedJson};
use crate::utils::response::{created, empty_success, success};
use crate::views::{EventRelations, EventView};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub venue_id: Uuid,
    pub author_id: Uuid,
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(range(min = 0))]
    pub tickets_capacity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub venue_id: Option<Uuid>,
    pub author_id: Option<Uuid>,
    /// `null` clears the image.
    #[serde(default, deserialize_with = "crate::utils::nullable::deserialize")]
    #[validate(url)]
    pub image_url: Option<Option<String>>,
    #[validate(range(min = 0))]
    pub tickets_capacity: Option<i32>,
}

impl From<UpdateEventRequest> for EventChanges {
    fn from(request: UpdateEventRequest) -> Self {
        EventChanges {
            title: request.title,
            description: request.description,
            starts_at: request.starts_at,
            ends_at: request.ends_at,
            venue_id: request.venue_id,
            author_id: request.author_id,
            image_url: request.image_url,
            tickets_capacity: request.tickets_capacity,
        }
    }
}

fn check_schedule(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<(), AppError> {
    if ends_at > starts_at {
        Ok(())
    } else {
        Err(AppError::ValidationError(
            "ends_at must be after starts_at".to_string(),
        ))
    }
}

/// A referenced venue or author that is missing is a bad request, not a 404.
async fn check_references(
    store: &dyn Store,
    venue_id: Option<Uuid>,
    author_id: Option<Uuid>,
) -> Result<(), AppError> {
    let missing = |err: StoreError, field: &str| match err {
        StoreError::NotFound { .. } => {
            AppError::ValidationError(format!("The selected {} is invalid", field))
        }
        other => other.into(),
    };

    if let Some(venue_id) = venue_id {
        store
            .venue_by_id(venue_id)
            .await
            .map_err(|e| missing(e, "venue_id"))?;
    }
    if let Some(author_id) = author_id {
        store
            .author_by_id(author_id)
            .await
            .map_err(|e| missing(e, "author_id"))?;
    }

    Ok(())
}

/// Loads the event and checks that the caller is the manager who owns it.
async fn owned_event(state: &AppState, caller: &AuthUser, event_id: Uuid) -> Result<Event, AppError> {
    let event = state.store.event_by_id(event_id).await?;
    caller.require_owner(Role::EventManager, event.manager_id)?;
    Ok(event)
}

pub async fn list_events(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Response, AppError> {
    caller.forbid_role(Role::Administrator)?;

    let events = state.store.list_events().await?;
    let views = EventView::load_all(state.store.as_ref(), events, EventRelations::SUMMARY).await?;

    Ok(success(views, "Events retrieved successfully"))
}

pub async fn get_event(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(event_id): PathParam<Uuid>,
) -> Result<Response, AppError> {
    caller.forbid_role(Role::Administrator)?;

    let event = state.store.event_by_id(event_id).await?;
    let view = EventView::load(state.store.as_ref(), event, EventRelations::FULL).await?;

    Ok(success(view, "Event retrieved successfully"))
}

pub async fn my_events(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Response, AppError> {
    caller.require_role(Role::EventManager)?;

    let events = state.store.events_by_manager(caller.id()).await?;
    let views = EventView::load_all(state.store.as_ref(), events, EventRelations::OWNED).await?;

    Ok(success(views, "Your events retrieved successfully"))
}

pub async fn create_event(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidatedJson(payload): ValidatedJson<CreateEventRequest>,
) -> Result<Response, AppError> {
    caller.require_role(Role::EventManager)?;
    check_schedule(payload.starts_at, payload.ends_at)?;
    check_references(
        state.store.as_ref(),
        Some(payload.venue_id),
        Some(payload.author_id),
    )
    .await?;

    let event = state
        .store
        .create_event(NewEvent {
            title: payload.title,
            description: payload.description,
            starts_at: payload.starts_at,
            ends_at: payload.ends_at,
            venue_id: payload.venue_id,
            manager_id: caller.id(),
            author_id: payload.author_id,
            image_url: payload.image_url,
            tickets_capacity: payload.tickets_capacity,
        })
        .await?;

    tracing::info!(event_id = %event.id, manager_id = %caller.id(), "Event created");

    let view = EventView::load(state.store.as_ref(), event, EventRelations::FULL).await?;
    Ok(created(view, "Event created successfully"))
}

pub async fn update_event(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(event_id): PathParam<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateEventRequest>,
) -> Result<Response, AppError> {
    let event = owned_event(&state, &caller, event_id).await?;

    let changes = EventChanges::from(payload);
    let merged = changes.apply_to(&event);
    check_schedule(merged.starts_at, merged.ends_at)?;
    check_references(state.store.as_ref(), changes.venue_id, changes.author_id).await?;

    let event = state.store.update_event(event_id, changes).await?;
    tracing::info!(event_id = %event.id, "Event updated");

    let view = EventView::load(state.store.as_ref(), event, EventRelations::FULL).await?;
    Ok(success(view, "Event updated successfully"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(event_id): PathParam<Uuid>,
) -> Result<Response, AppError> {
    owned_event(&state, &caller, event_id).await?;

    state.store.delete_event(event_id).await?;
    tracing::info!(event_id = %event_id, manager_id = %caller.id(), "Event deleted");

    Ok(empty_success("Event deleted successfully"))
}
