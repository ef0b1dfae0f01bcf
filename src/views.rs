//! JSON projections of the domain rows.
//!
//! Relations are nested only when the caller asks for them through a
//! relations preset; anything not requested is left out of the payload.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Author, Event, Reservation, Role, Seat, User, Venue};
use crate::store::{Store, StoreResult};

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            address: user.address.clone(),
            phone: user.phone.clone(),
            image_url: user.image_url.clone(),
            created_at: user.created_at,
        }
    }
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        UserView::from(&user)
    }
}

/// Which relations an [`EventView`] carries.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventRelations {
    pub venue: bool,
    pub manager: bool,
    pub author: bool,
    pub seats: bool,
    pub attendees: bool,
}

impl EventRelations {
    pub const NONE: Self = Self {
        venue: false,
        manager: false,
        author: false,
        seats: false,
        attendees: false,
    };

    /// Public listing.
    pub const SUMMARY: Self = Self {
        venue: true,
        manager: true,
        author: true,
        seats: false,
        attendees: false,
    };

    pub const FULL: Self = Self {
        venue: true,
        manager: true,
        author: true,
        seats: true,
        attendees: true,
    };

    /// A manager's own events; the manager is the caller.
    pub const OWNED: Self = Self {
        venue: true,
        manager: false,
        author: true,
        seats: true,
        attendees: true,
    };
}

#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub tickets_available: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<Venue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<UserView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats: Option<Vec<Seat>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<UserView>>,
}

impl EventView {
    pub fn bare(event: Event) -> Self {
        Self {
            tickets_available: event.tickets_available(),
            event,
            venue: None,
            manager: None,
            author: None,
            seats: None,
            attendees: None,
        }
    }

    pub async fn load(
        store: &dyn Store,
        event: Event,
        relations: EventRelations,
    ) -> StoreResult<Self> {
        let mut view = Self::bare(event);
        let event = &view.event;

        if relations.venue {
            view.venue = Some(store.venue_by_id(event.venue_id).await?);
        }
        if relations.manager {
            view.manager = Some(store.user_by_id(event.manager_id).await?.into());
        }
        if relations.author {
            view.author = Some(store.author_by_id(event.author_id).await?);
        }
        if relations.seats {
            view.seats = Some(store.seats_for_event(event.id).await?);
        }
        if relations.attendees {
            let attendees = store.attendees(event.id).await?;
            view.attendees = Some(attendees.iter().map(UserView::from).collect());
        }

        Ok(view)
    }

    pub async fn load_all(
        store: &dyn Store,
        events: Vec<Event>,
        relations: EventRelations,
    ) -> StoreResult<Vec<Self>> {
        let mut views = Vec::with_capacity(events.len());
        for event in events {
            views.push(Self::load(store, event, relations).await?);
        }
        Ok(views)
    }
}

/// Which relations a [`ReservationView`] carries. `event` also selects the
/// relations of the nested event.
#[derive(Debug, Clone, Copy)]
pub struct ReservationRelations {
    pub user: bool,
    pub event: Option<EventRelations>,
    pub seats: bool,
}

impl ReservationRelations {
    /// What a buyer sees of their own reservations.
    pub const FOR_BUYER: Self = Self {
        user: false,
        event: Some(EventRelations::SUMMARY),
        seats: true,
    };

    /// What a manager sees of reservations on their events.
    pub const FOR_MANAGER: Self = Self {
        user: true,
        event: Some(EventRelations::NONE),
        seats: true,
    };
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationView {
    #[serde(flatten)]
    pub reservation: Reservation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<EventView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats: Option<Vec<Seat>>,
}

impl ReservationView {
    pub fn bare(reservation: Reservation) -> Self {
        Self {
            reservation,
            user: None,
            event: None,
            seats: None,
        }
    }

    pub async fn load(
        store: &dyn Store,
        reservation: Reservation,
        relations: ReservationRelations,
    ) -> StoreResult<Self> {
        let mut view = Self::bare(reservation);
        let reservation = &view.reservation;

        if relations.user {
            view.user = Some(store.user_by_id(reservation.user_id).await?.into());
        }
        if let Some(event_relations) = relations.event {
            let event = store.event_by_id(reservation.event_id).await?;
            view.event = Some(EventView::load(store, event, event_relations).await?);
        }
        if relations.seats {
            view.seats = Some(store.seats_for_reservation(reservation.id).await?);
        }

        Ok(view)
    }

    pub async fn load_all(
        store: &dyn Store,
        reservations: Vec<Reservation>,
        relations: ReservationRelations,
    ) -> StoreResult<Vec<Self>> {
        let mut views = Vec::with_capacity(reservations.len());
        for reservation in reservations {
            views.push(Self::load(store, reservation, relations).await?);
        }
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewAuthor, NewEvent, NewReservation, NewUser, NewVenue};
    use crate::store::MemoryStore;
    use chrono::Duration;

    async fn seeded() -> (MemoryStore, Event, User) {
        let store = MemoryStore::new();
        let manager = store
            .create_user(NewUser {
                name: "Ines".to_string(),
                email: "ines@example.com".to_string(),
                password_hash: "$argon2id$secret".to_string(),
                role: Role::EventManager,
                address: None,
                phone: None,
                image_url: None,
            })
            .await
            .unwrap();
        let buyer = store
            .create_user(NewUser {
                name: "Theo".to_string(),
                email: "theo@example.com".to_string(),
                password_hash: "$argon2id$secret".to_string(),
                role: Role::Buyer,
                address: None,
                phone: None,
                image_url: None,
            })
            .await
            .unwrap();
        let venue = store
            .create_venue(NewVenue {
                name: "Hall".to_string(),
                city: "Lyon".to_string(),
                country: "France".to_string(),
                address: "1 Quai".to_string(),
                capacity_people: 300,
                image_url: None,
            })
            .await
            .unwrap();
        let author = store
            .create_author(NewAuthor {
                name: "Quartet".to_string(),
                music_genre: "Jazz".to_string(),
                image_url: None,
            })
            .await
            .unwrap();
        let now = Utc::now();
        let event = store
            .create_event(NewEvent {
                title: "Late set".to_string(),
                description: "Two hours of standards".to_string(),
                starts_at: now,
                ends_at: now + Duration::hours(2),
                venue_id: venue.id,
                manager_id: manager.id,
                author_id: author.id,
                image_url: None,
                tickets_capacity: 0,
            })
            .await
            .unwrap();
        (store, event, buyer)
    }

    #[tokio::test]
    async fn test_unrequested_relations_are_omitted() {
        let (store, event, _) = seeded().await;

        let view = EventView::load(&store, event, EventRelations::SUMMARY)
            .await
            .unwrap();
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["venue"]["city"], "Lyon");
        assert_eq!(json["manager"]["name"], "Ines");
        assert!(json.get("seats").is_none());
        assert!(json.get("attendees").is_none());
        assert!(json["manager"].get("password_hash").is_none());
        assert_eq!(json["tickets_available"], 0);
    }

    #[tokio::test]
    async fn test_full_event_lists_attendees() {
        let (store, event, buyer) = seeded().await;
        let seats = store
            .provision_seats(event.id, vec!["A1".to_string(), "A2".to_string()])
            .await
            .unwrap();
        store
            .create_reservation(NewReservation {
                user_id: buyer.id,
                event_id: event.id,
                seat_ids: vec![seats[0].id],
            })
            .await
            .unwrap();

        let event = store.event_by_id(event.id).await.unwrap();
        let view = EventView::load(&store, event, EventRelations::FULL)
            .await
            .unwrap();

        let attendees = view.attendees.unwrap();
        assert_eq!(attendees.len(), 1);
        assert_eq!(attendees[0].id, buyer.id);
        let seats = view.seats.unwrap();
        assert_eq!(seats.iter().filter(|s| s.is_reserved).count(), 1);
    }

    #[tokio::test]
    async fn test_manager_view_of_reservation_nests_buyer() {
        let (store, event, buyer) = seeded().await;
        let seats = store
            .provision_seats(event.id, vec!["A1".to_string()])
            .await
            .unwrap();
        let reservation = store
            .create_reservation(NewReservation {
                user_id: buyer.id,
                event_id: event.id,
                seat_ids: vec![seats[0].id],
            })
            .await
            .unwrap();

        let view = ReservationView::load(&store, reservation, ReservationRelations::FOR_MANAGER)
            .await
            .unwrap();
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["status"], "pending");
        assert_eq!(json["user"]["email"], "theo@example.com");
        assert_eq!(json["event"]["title"], "Late set");
        assert!(json["event"].get("venue").is_none());
        assert_eq!(json["seats"][0]["position"], "A1");
    }
}
