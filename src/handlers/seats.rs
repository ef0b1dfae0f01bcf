use axum::{extract::State, response::Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::inventory::generate_positions;
use crate::models::Role;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{PathParam, ValidatedJson};
use crate::utils::response::{created, success};

const MAX_SEATS_PER_EVENT: usize = 10_000;

#[derive(Debug, Serialize, Deserialize)]
pub struct SeatPosition {
    pub position: String,
}

/// Either an explicit layout or a count of generated `S1..SN` positions.
#[derive(Debug, Deserialize, Validate)]
pub struct ProvisionSeatsRequest {
    #[validate(length(min = 1, max = 10000))]
    pub seats: Option<Vec<SeatPosition>>,
    #[validate(range(min = 1, max = 10000))]
    pub count: Option<usize>,
}

impl ProvisionSeatsRequest {
    fn into_positions(self) -> Result<Vec<String>, AppError> {
        match (self.seats, self.count) {
            (Some(seats), None) => Ok(seats.into_iter().map(|s| s.position).collect()),
            (None, Some(count)) if count <= MAX_SEATS_PER_EVENT => Ok(generate_positions(count)),
            _ => Err(AppError::ValidationError(
                "Provide either a seats list or a seat count".to_string(),
            )),
        }
    }
}

pub async fn list_seats(State(state): State<AppState>) -> Result<Response, AppError> {
    let seats = state.store.list_seats().await?;
    Ok(success(seats, "Seats retrieved successfully"))
}

pub async fn get_seat(
    State(state): State<AppState>,
    PathParam(seat_id): PathParam<Uuid>,
) -> Result<Response, AppError> {
    let seat = state.store.seat_by_id(seat_id).await?;
    Ok(success(seat, "Seat retrieved successfully"))
}

pub async fn provision_seats(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(event_id): PathParam<Uuid>,
    ValidatedJson(payload): ValidatedJson<ProvisionSeatsRequest>,
) -> Result<Response, AppError> {
    let event = state.store.event_by_id(event_id).await?;
    if caller.role() != Role::Administrator {
        caller.require_owner(Role::EventManager, event.manager_id)?;
    }

    let positions = payload.into_positions()?;
    let seats = state
        .store
        .provision_seats(event_id, positions)
        .await
        .map_err(AppError::transactional(
            "Could not create seats. Please try again.",
        ))?;

    tracing::info!(
        event_id = %event_id,
        seats = seats.len(),
        provisioned_by = %caller.id(),
        "Seats provisioned"
    );

    Ok(created(seats, "Seats created successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(seats: Option<Vec<&str>>, count: Option<usize>) -> ProvisionSeatsRequest {
        ProvisionSeatsRequest {
            seats: seats.map(|positions| {
                positions
                    .into_iter()
                    .map(|p| SeatPosition {
                        position: p.to_string(),
                    })
                    .collect()
            }),
            count,
        }
    }

    #[test]
    fn test_count_generates_positions() {
        let positions = request(None, Some(3)).into_positions().unwrap();
        assert_eq!(positions, vec!["S1", "S2", "S3"]);
    }

    #[test]
    fn test_explicit_layout_is_kept_in_order() {
        let positions = request(Some(vec!["B2", "A1"]), None)
            .into_positions()
            .unwrap();
        assert_eq!(positions, vec!["B2", "A1"]);
    }

    #[test]
    fn test_layout_and_count_are_exclusive() {
        assert!(request(Some(vec!["A1"]), Some(1)).into_positions().is_err());
        assert!(request(None, None).into_positions().is_err());
    }

    #[test]
    fn test_zero_count_fails_validation() {
        assert!(request(None, Some(0)).validate().is_err());
        assert!(request(Some(vec![]), None).validate().is_err());
    }

    #[test]
    fn test_layout_passes_validation() {
        assert!(request(Some(vec!["A1", "A2"]), None).validate().is_ok());
        assert!(request(None, Some(10_000)).validate().is_ok());
        assert!(request(None, Some(10_001)).validate().is_err());
    }
}
