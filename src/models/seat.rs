use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A reservable unit of one event.
///
/// `is_reserved` is not stored. It is computed on every read and is true
/// when the seat is linked to a reservation that is not cancelled.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Seat {
    pub id: Uuid,
    pub event_id: Uuid,
    pub position: String,
    pub is_reserved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
