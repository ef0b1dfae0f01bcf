use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub venue_id: Uuid,
    pub manager_id: Uuid,
    pub author_id: Uuid,
    pub image_url: Option<String>,
    pub tickets_capacity: i32,
    pub tickets_reserved: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Tickets that can still be reserved, never negative.
    pub fn tickets_available(&self) -> i32 {
        (self.tickets_capacity - self.tickets_reserved).max(0)
    }
}

/// A new event. `tickets_reserved` always starts at zero.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub venue_id: Uuid,
    pub manager_id: Uuid,
    pub author_id: Uuid,
    pub image_url: Option<String>,
    pub tickets_capacity: i32,
}

/// A partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub venue_id: Option<Uuid>,
    pub author_id: Option<Uuid>,
    /// `Some(None)` clears the image.
    pub image_url: Option<Option<String>>,
    pub tickets_capacity: Option<i32>,
}

impl EventChanges {
    /// Applies the changes to a copy of `event`.
    pub fn apply_to(&self, event: &Event) -> Event {
        let mut updated = event.clone();

        if let Some(title) = &self.title {
            updated.title = title.clone();
        }
        if let Some(description) = &self.description {
            updated.description = description.clone();
        }
        if let Some(starts_at) = self.starts_at {
            updated.starts_at = starts_at;
        }
        if let Some(ends_at) = self.ends_at {
            updated.ends_at = ends_at;
        }
        if let Some(venue_id) = self.venue_id {
            updated.venue_id = venue_id;
        }
        if let Some(author_id) = self.author_id {
            updated.author_id = author_id;
        }
        if let Some(image_url) = &self.image_url {
            updated.image_url = image_url.clone();
        }
        if let Some(capacity) = self.tickets_capacity {
            updated.tickets_capacity = capacity;
        }

        updated
    }
}
