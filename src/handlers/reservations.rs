use axum::{extract::State, response::Response};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::models::{NewReservation, ReservationStatus, Role};
use crate::state::AppState;
use crate::store::StoreError;
use crate::utils::error::AppError;
use crate::utils::extract::{PathParam, ValidatedJson};
use crate::utils::response::{created, empty_success, success};
use crate::views::{ReservationRelations, ReservationView};

const CREATE_FAILED: &str = "Could not create reservation. Please try again.";
const DELETE_FAILED: &str = "Could not delete reservation. Please try again.";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReservationRequest {
    pub event_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub seats: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: ReservationStatus,
}

/// Reservations on every event the calling manager runs.
pub async fn for_my_events(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Response, AppError> {
    caller.require_role(Role::EventManager)?;

    let reservations = state.store.reservations_for_manager(caller.id()).await?;
    let views = ReservationView::load_all(
        state.store.as_ref(),
        reservations,
        ReservationRelations::FOR_MANAGER,
    )
    .await?;

    Ok(success(views, "Reservations retrieved successfully"))
}

pub async fn my_reservations(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Response, AppError> {
    caller.require_role(Role::Buyer)?;

    let reservations = state.store.reservations_by_user(caller.id()).await?;
    let views = ReservationView::load_all(
        state.store.as_ref(),
        reservations,
        ReservationRelations::FOR_BUYER,
    )
    .await?;

    Ok(success(views, "Your reservations retrieved successfully"))
}

pub async fn create_reservation(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidatedJson(payload): ValidatedJson<CreateReservationRequest>,
) -> Result<Response, AppError> {
    caller.require_role(Role::Buyer)?;

    let reservation = state
        .store
        .create_reservation(NewReservation {
            user_id: caller.id(),
            event_id: payload.event_id,
            seat_ids: payload.seats,
        })
        .await
        .map_err(|err| match err {
            StoreError::NotFound { resource, .. } => {
                AppError::ValidationError(format!("The selected {} is invalid", resource))
            }
            other => AppError::transactional(CREATE_FAILED)(other),
        })?;

    tracing::info!(
        reservation_id = %reservation.id,
        event_id = %reservation.event_id,
        seats = reservation.number_of_seats,
        "Reservation created"
    );

    let view = ReservationView::load(
        state.store.as_ref(),
        reservation,
        ReservationRelations::FOR_MANAGER,
    )
    .await?;
    Ok(created(view, "Reservation created successfully"))
}

pub async fn update_status(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(reservation_id): PathParam<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateStatusRequest>,
) -> Result<Response, AppError> {
    let reservation = state.store.reservation_by_id(reservation_id).await?;
    let event = state.store.event_by_id(reservation.event_id).await?;
    caller.require_owner(Role::EventManager, event.manager_id)?;

    let updated = state
        .store
        .set_reservation_status(reservation_id, payload.status)
        .await
        .map_err(AppError::transactional(
            "Could not update reservation. Please try again.",
        ))?;

    tracing::info!(
        reservation_id = %updated.id,
        from = %reservation.status,
        to = %updated.status,
        "Reservation status changed"
    );

    let view = ReservationView::load(
        state.store.as_ref(),
        updated,
        ReservationRelations::FOR_MANAGER,
    )
    .await?;
    Ok(success(view, "Reservation status updated successfully"))
}

pub async fn delete_reservation(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(reservation_id): PathParam<Uuid>,
) -> Result<Response, AppError> {
    let reservation = state.store.reservation_by_id(reservation_id).await?;
    caller.require_owner(Role::Buyer, reservation.user_id)?;

    let deleted = state
        .store
        .delete_reservation(reservation_id)
        .await
        .map_err(AppError::transactional(DELETE_FAILED))?;

    tracing::info!(
        reservation_id = %deleted.id,
        status = %deleted.status,
        "Reservation deleted"
    );

    Ok(empty_success("Reservation deleted successfully"))
}
