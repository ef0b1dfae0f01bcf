use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::inventory::InventoryError;
use crate::models::{
    AccessToken, Author, Event, EventChanges, NewAccessToken, NewAuthor, NewEvent, NewReservation,
    NewUser, NewVenue, Reservation, ReservationStatus, Role, Seat, User, Venue,
};

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A row that was looked up doesn't exist
    #[error("{resource} {id} doesn't exist")]
    NotFound { resource: &'static str, id: String },

    /// A unique constraint would be violated
    #[error("{resource} with {field} '{value}' already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },

    /// A seat or ticket rule was broken, nothing was written
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

/// Persistence for the ticketing domain.
///
/// Every method that changes more than one row is atomic: either all of its
/// writes are visible afterwards or none are. Methods that touch
/// `tickets_reserved` or `tickets_capacity` serialize on the event.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User>;
    async fn user_by_id(&self, user_id: Uuid) -> StoreResult<User>;
    async fn user_by_email(&self, email: &str) -> StoreResult<User>;
    async fn users_by_role(&self, role: Role) -> StoreResult<Vec<User>>;

    async fn create_token(&self, new_token: NewAccessToken) -> StoreResult<AccessToken>;
    async fn token_by_hash(&self, token_hash: &str) -> StoreResult<AccessToken>;
    /// Revokes every token of a user, returning how many were removed.
    async fn delete_tokens_for_user(&self, user_id: Uuid) -> StoreResult<u64>;
    async fn clear_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    async fn list_venues(&self) -> StoreResult<Vec<Venue>>;
    async fn venue_by_id(&self, venue_id: Uuid) -> StoreResult<Venue>;
    async fn create_venue(&self, new_venue: NewVenue) -> StoreResult<Venue>;

    async fn list_authors(&self) -> StoreResult<Vec<Author>>;
    async fn author_by_id(&self, author_id: Uuid) -> StoreResult<Author>;
    async fn create_author(&self, new_author: NewAuthor) -> StoreResult<Author>;

    async fn list_events(&self) -> StoreResult<Vec<Event>>;
    async fn events_by_manager(&self, manager_id: Uuid) -> StoreResult<Vec<Event>>;
    async fn event_by_id(&self, event_id: Uuid) -> StoreResult<Event>;
    async fn create_event(&self, new_event: NewEvent) -> StoreResult<Event>;
    /// Fails if a new capacity would drop below the reserved count.
    async fn update_event(&self, event_id: Uuid, changes: EventChanges) -> StoreResult<Event>;
    /// Deletes the event together with its seats and reservations.
    async fn delete_event(&self, event_id: Uuid) -> StoreResult<()>;
    /// Distinct users holding an active reservation for the event.
    async fn attendees(&self, event_id: Uuid) -> StoreResult<Vec<User>>;

    async fn list_seats(&self) -> StoreResult<Vec<Seat>>;
    async fn seat_by_id(&self, seat_id: Uuid) -> StoreResult<Seat>;
    async fn seats_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Seat>>;
    /// Makes the event's seat set exactly `positions` and sets its capacity to
    /// the new seat count. Surviving positions keep their seat ids.
    async fn provision_seats(&self, event_id: Uuid, positions: Vec<String>)
        -> StoreResult<Vec<Seat>>;

    async fn reservation_by_id(&self, reservation_id: Uuid) -> StoreResult<Reservation>;
    async fn reservations_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Reservation>>;
    /// Reservations on every event managed by `manager_id`.
    async fn reservations_for_manager(&self, manager_id: Uuid) -> StoreResult<Vec<Reservation>>;
    async fn seats_for_reservation(&self, reservation_id: Uuid) -> StoreResult<Vec<Seat>>;
    /// Inserts a pending reservation, links its seats and bumps
    /// `tickets_reserved` by the seat count.
    async fn create_reservation(&self, new_reservation: NewReservation)
        -> StoreResult<Reservation>;
    /// Changes the status and moves `tickets_reserved` when the cancelled
    /// boundary is crossed.
    async fn set_reservation_status(
        &self,
        reservation_id: Uuid,
        status: ReservationStatus,
    ) -> StoreResult<Reservation>;
    /// Deletes the reservation and releases its tickets unless it was
    /// already cancelled. Returns the reservation as it was before deletion.
    async fn delete_reservation(&self, reservation_id: Uuid) -> StoreResult<Reservation>;
}
