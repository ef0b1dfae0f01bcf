use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::inventory;
use crate::models::{
    AccessToken, Author, Event, EventChanges, NewAccessToken, NewAuthor, NewEvent, NewReservation,
    NewUser, NewVenue, Reservation, ReservationStatus, Role, Seat, User, Venue,
};
use crate::store::{Store, StoreError, StoreResult};

/// An in-process store. Each operation holds the state lock for its whole
/// duration and only writes once every check has passed, which gives the same
/// all-or-nothing behaviour as a Postgres transaction.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    users: Vec<User>,
    tokens: Vec<AccessToken>,
    venues: Vec<Venue>,
    authors: Vec<Author>,
    events: Vec<Event>,
    seats: Vec<Seat>,
    reservations: Vec<Reservation>,
    /// (reservation id, seat id)
    links: Vec<(Uuid, Uuid)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State {
    fn event(&self, event_id: Uuid) -> StoreResult<&Event> {
        self.events
            .iter()
            .find(|e| e.id == event_id)
            .ok_or_else(|| StoreError::not_found("event", event_id))
    }

    fn event_mut(&mut self, event_id: Uuid) -> StoreResult<&mut Event> {
        self.events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| StoreError::not_found("event", event_id))
    }

    fn reservation(&self, reservation_id: Uuid) -> StoreResult<&Reservation> {
        self.reservations
            .iter()
            .find(|r| r.id == reservation_id)
            .ok_or_else(|| StoreError::not_found("reservation", reservation_id))
    }

    fn is_held(&self, seat_id: Uuid) -> bool {
        self.links
            .iter()
            .filter(|(_, linked_seat)| *linked_seat == seat_id)
            .any(|(reservation_id, _)| {
                self.reservations
                    .iter()
                    .any(|r| r.id == *reservation_id && r.status.holds_seats())
            })
    }

    /// A copy of the seat with its derived reservation state.
    fn read_seat(&self, seat: &Seat) -> Seat {
        Seat {
            is_reserved: self.is_held(seat.id),
            ..seat.clone()
        }
    }

    fn seats_for_event(&self, event_id: Uuid) -> Vec<Seat> {
        self.seats
            .iter()
            .filter(|s| s.event_id == event_id)
            .map(|s| self.read_seat(s))
            .collect()
    }

    fn seats_for_reservation(&self, reservation_id: Uuid) -> Vec<Seat> {
        self.links
            .iter()
            .filter(|(linked, _)| *linked == reservation_id)
            .filter_map(|(_, seat_id)| self.seats.iter().find(|s| s.id == *seat_id))
            .map(|s| self.read_seat(s))
            .collect()
    }

    fn adjust_reserved(&mut self, event_id: Uuid, delta: i32) -> StoreResult<()> {
        if delta == 0 {
            return Ok(());
        }

        let event = self.event_mut(event_id)?;
        event.tickets_reserved += delta;
        event.updated_at = Utc::now();

        Ok(())
    }

    fn remove_reservations(&mut self, doomed: impl Fn(&Reservation) -> bool) {
        let removed: Vec<Uuid> = self
            .reservations
            .iter()
            .filter(|r| doomed(r))
            .map(|r| r.id)
            .collect();

        self.reservations.retain(|r| !removed.contains(&r.id));
        self.links.retain(|(reservation_id, _)| !removed.contains(reservation_id));
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let mut state = self.state.lock().await;

        if state.users.iter().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict {
                resource: "user",
                field: "email",
                value: new_user.email,
            });
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            role: new_user.role,
            address: new_user.address,
            phone: new_user.phone,
            image_url: new_user.image_url,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());

        Ok(user)
    }

    async fn user_by_id(&self, user_id: Uuid) -> StoreResult<User> {
        let state = self.state.lock().await;

        state
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", user_id))
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<User> {
        let state = self.state.lock().await;

        state
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", email))
    }

    async fn users_by_role(&self, role: Role) -> StoreResult<Vec<User>> {
        let state = self.state.lock().await;

        Ok(state.users.iter().filter(|u| u.role == role).cloned().collect())
    }

    async fn create_token(&self, new_token: NewAccessToken) -> StoreResult<AccessToken> {
        let mut state = self.state.lock().await;

        let token = AccessToken {
            id: Uuid::new_v4(),
            user_id: new_token.user_id,
            token_hash: new_token.token_hash,
            expires_at: new_token.expires_at,
            created_at: Utc::now(),
        };
        state.tokens.push(token.clone());

        Ok(token)
    }

    async fn token_by_hash(&self, token_hash: &str) -> StoreResult<AccessToken> {
        let state = self.state.lock().await;

        state
            .tokens
            .iter()
            .find(|t| t.token_hash == token_hash)
            .cloned()
            .ok_or_else(|| StoreError::not_found("access token", "<redacted>"))
    }

    async fn delete_tokens_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut state = self.state.lock().await;

        let before = state.tokens.len();
        state.tokens.retain(|t| t.user_id != user_id);

        Ok((before - state.tokens.len()) as u64)
    }

    async fn clear_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock().await;

        let before = state.tokens.len();
        state.tokens.retain(|t| !t.is_expired(now));

        Ok((before - state.tokens.len()) as u64)
    }

    async fn list_venues(&self) -> StoreResult<Vec<Venue>> {
        Ok(self.state.lock().await.venues.clone())
    }

    async fn venue_by_id(&self, venue_id: Uuid) -> StoreResult<Venue> {
        let state = self.state.lock().await;

        state
            .venues
            .iter()
            .find(|v| v.id == venue_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("venue", venue_id))
    }

    async fn create_venue(&self, new_venue: NewVenue) -> StoreResult<Venue> {
        let mut state = self.state.lock().await;

        let duplicate = state.venues.iter().any(|v| {
            v.name == new_venue.name && v.city == new_venue.city && v.address == new_venue.address
        });
        if duplicate {
            return Err(StoreError::Conflict {
                resource: "venue",
                field: "name, city and address",
                value: new_venue.name,
            });
        }

        let now = Utc::now();
        let venue = Venue {
            id: Uuid::new_v4(),
            name: new_venue.name,
            city: new_venue.city,
            country: new_venue.country,
            address: new_venue.address,
            capacity_people: new_venue.capacity_people,
            image_url: new_venue.image_url,
            created_at: now,
            updated_at: now,
        };
        state.venues.push(venue.clone());

        Ok(venue)
    }

    async fn list_authors(&self) -> StoreResult<Vec<Author>> {
        Ok(self.state.lock().await.authors.clone())
    }

    async fn author_by_id(&self, author_id: Uuid) -> StoreResult<Author> {
        let state = self.state.lock().await;

        state
            .authors
            .iter()
            .find(|a| a.id == author_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("author", author_id))
    }

    async fn create_author(&self, new_author: NewAuthor) -> StoreResult<Author> {
        let mut state = self.state.lock().await;

        if state.authors.iter().any(|a| a.name == new_author.name) {
            return Err(StoreError::Conflict {
                resource: "author",
                field: "name",
                value: new_author.name,
            });
        }

        let now = Utc::now();
        let author = Author {
            id: Uuid::new_v4(),
            name: new_author.name,
            music_genre: new_author.music_genre,
            image_url: new_author.image_url,
            created_at: now,
            updated_at: now,
        };
        state.authors.push(author.clone());

        Ok(author)
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        let mut events = self.state.lock().await.events.clone();
        events.sort_by_key(|e| e.starts_at);

        Ok(events)
    }

    async fn events_by_manager(&self, manager_id: Uuid) -> StoreResult<Vec<Event>> {
        let state = self.state.lock().await;

        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|e| e.manager_id == manager_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.starts_at);

        Ok(events)
    }

    async fn event_by_id(&self, event_id: Uuid) -> StoreResult<Event> {
        self.state.lock().await.event(event_id).cloned()
    }

    async fn create_event(&self, new_event: NewEvent) -> StoreResult<Event> {
        let mut state = self.state.lock().await;

        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            title: new_event.title,
            description: new_event.description,
            starts_at: new_event.starts_at,
            ends_at: new_event.ends_at,
            venue_id: new_event.venue_id,
            manager_id: new_event.manager_id,
            author_id: new_event.author_id,
            image_url: new_event.image_url,
            tickets_capacity: new_event.tickets_capacity,
            tickets_reserved: 0,
            created_at: now,
            updated_at: now,
        };
        state.events.push(event.clone());

        Ok(event)
    }

    async fn update_event(&self, event_id: Uuid, changes: EventChanges) -> StoreResult<Event> {
        let mut state = self.state.lock().await;

        let event = state.event_mut(event_id)?;
        if let Some(capacity) = changes.tickets_capacity {
            inventory::check_capacity_change(event, capacity)?;
        }

        let merged = changes.apply_to(event);
        inventory::check_schedule(&merged)?;

        *event = merged;
        event.updated_at = Utc::now();

        Ok(event.clone())
    }

    async fn delete_event(&self, event_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;

        state.event(event_id)?;
        state.remove_reservations(|r| r.event_id == event_id);

        let doomed: Vec<Uuid> = state
            .seats
            .iter()
            .filter(|s| s.event_id == event_id)
            .map(|s| s.id)
            .collect();
        state.links.retain(|(_, seat_id)| !doomed.contains(seat_id));
        state.seats.retain(|s| s.event_id != event_id);
        state.events.retain(|e| e.id != event_id);

        Ok(())
    }

    async fn attendees(&self, event_id: Uuid) -> StoreResult<Vec<User>> {
        let state = self.state.lock().await;

        let mut users: Vec<User> = state
            .users
            .iter()
            .filter(|u| {
                state.reservations.iter().any(|r| {
                    r.user_id == u.id && r.event_id == event_id && r.status.holds_seats()
                })
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(users)
    }

    async fn list_seats(&self) -> StoreResult<Vec<Seat>> {
        let state = self.state.lock().await;

        Ok(state.seats.iter().map(|s| state.read_seat(s)).collect())
    }

    async fn seat_by_id(&self, seat_id: Uuid) -> StoreResult<Seat> {
        let state = self.state.lock().await;

        state
            .seats
            .iter()
            .find(|s| s.id == seat_id)
            .map(|s| state.read_seat(s))
            .ok_or_else(|| StoreError::not_found("seat", seat_id))
    }

    async fn seats_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Seat>> {
        Ok(self.state.lock().await.seats_for_event(event_id))
    }

    async fn provision_seats(
        &self,
        event_id: Uuid,
        positions: Vec<String>,
    ) -> StoreResult<Vec<Seat>> {
        let mut state = self.state.lock().await;

        state.event(event_id)?;
        let existing = state.seats_for_event(event_id);
        let plan = inventory::plan_layout(&existing, &positions)?;

        state.seats.retain(|s| !plan.remove.contains(&s.id));
        state.links.retain(|(_, seat_id)| !plan.remove.contains(seat_id));

        let now = Utc::now();
        for position in &plan.insert {
            state.seats.push(Seat {
                id: Uuid::new_v4(),
                event_id,
                position: position.clone(),
                is_reserved: false,
                created_at: now,
                updated_at: now,
            });
        }

        let event = state.event_mut(event_id)?;
        event.tickets_capacity = plan.capacity();
        event.updated_at = now;

        Ok(state.seats_for_event(event_id))
    }

    async fn reservation_by_id(&self, reservation_id: Uuid) -> StoreResult<Reservation> {
        self.state.lock().await.reservation(reservation_id).cloned()
    }

    async fn reservations_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Reservation>> {
        let state = self.state.lock().await;

        Ok(state
            .reservations
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn reservations_for_manager(&self, manager_id: Uuid) -> StoreResult<Vec<Reservation>> {
        let state = self.state.lock().await;

        Ok(state
            .reservations
            .iter()
            .filter(|r| {
                state
                    .events
                    .iter()
                    .any(|e| e.id == r.event_id && e.manager_id == manager_id)
            })
            .cloned()
            .collect())
    }

    async fn seats_for_reservation(&self, reservation_id: Uuid) -> StoreResult<Vec<Seat>> {
        Ok(self.state.lock().await.seats_for_reservation(reservation_id))
    }

    async fn create_reservation(
        &self,
        new_reservation: NewReservation,
    ) -> StoreResult<Reservation> {
        let mut state = self.state.lock().await;

        let event = state.event(new_reservation.event_id)?;
        let seats = state.seats_for_event(event.id);
        let count = inventory::check_selection(event, &new_reservation.seat_ids, &seats)?;

        let now = Utc::now();
        let reservation = Reservation {
            id: Uuid::new_v4(),
            user_id: new_reservation.user_id,
            event_id: new_reservation.event_id,
            status: ReservationStatus::Pending,
            number_of_seats: count,
            created_at: now,
            updated_at: now,
        };

        state.reservations.push(reservation.clone());
        for seat_id in &new_reservation.seat_ids {
            state.links.push((reservation.id, *seat_id));
        }
        state.adjust_reserved(reservation.event_id, count)?;

        Ok(reservation)
    }

    async fn set_reservation_status(
        &self,
        reservation_id: Uuid,
        status: ReservationStatus,
    ) -> StoreResult<Reservation> {
        let mut state = self.state.lock().await;

        let current = state.reservation(reservation_id)?.clone();
        let delta = inventory::reserved_delta(current.status, status, current.number_of_seats);
        if delta > 0 {
            let event = state.event(current.event_id)?;
            let seats = state.seats_for_reservation(reservation_id);
            inventory::check_reactivation(event, &seats, current.number_of_seats)?;
        }

        let now = Utc::now();
        let updated = Reservation {
            status,
            updated_at: now,
            ..current
        };
        if let Some(slot) = state.reservations.iter_mut().find(|r| r.id == reservation_id) {
            *slot = updated.clone();
        }
        state.adjust_reserved(updated.event_id, delta)?;

        Ok(updated)
    }

    async fn delete_reservation(&self, reservation_id: Uuid) -> StoreResult<Reservation> {
        let mut state = self.state.lock().await;

        let current = state.reservation(reservation_id)?.clone();
        state.remove_reservations(|r| r.id == reservation_id);

        if current.status.holds_seats() {
            state.adjust_reserved(current.event_id, -current.number_of_seats)?;
        }

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seeded_event(store: &MemoryStore, seats: usize) -> (Event, Vec<Seat>) {
        let now = Utc::now();
        let event = store
            .create_event(NewEvent {
                title: "Jazz in the park".to_string(),
                description: "Open air".to_string(),
                starts_at: now,
                ends_at: now + Duration::hours(2),
                venue_id: Uuid::new_v4(),
                manager_id: Uuid::new_v4(),
                author_id: Uuid::new_v4(),
                image_url: None,
                tickets_capacity: 0,
            })
            .await
            .unwrap();
        let seats = store
            .provision_seats(event.id, inventory::generate_positions(seats))
            .await
            .unwrap();
        let event = store.event_by_id(event.id).await.unwrap();

        (event, seats)
    }

    #[tokio::test]
    async fn test_reserve_cancel_reconfirm_moves_counter() {
        let store = MemoryStore::new();
        let (event, seats) = seeded_event(&store, 10).await;
        assert_eq!(event.tickets_capacity, 10);

        let reservation = store
            .create_reservation(NewReservation {
                user_id: Uuid::new_v4(),
                event_id: event.id,
                seat_ids: seats[..3].iter().map(|s| s.id).collect(),
            })
            .await
            .unwrap();
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.number_of_seats, 3);
        assert_eq!(store.event_by_id(event.id).await.unwrap().tickets_reserved, 3);

        store
            .set_reservation_status(reservation.id, ReservationStatus::Cancelled)
            .await
            .unwrap();
        store
            .set_reservation_status(reservation.id, ReservationStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(store.event_by_id(event.id).await.unwrap().tickets_reserved, 0);

        store
            .set_reservation_status(reservation.id, ReservationStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(store.event_by_id(event.id).await.unwrap().tickets_reserved, 3);
    }

    #[tokio::test]
    async fn test_failed_reservation_writes_nothing() {
        let store = MemoryStore::new();
        let (event, seats) = seeded_event(&store, 2).await;

        let err = store
            .create_reservation(NewReservation {
                user_id: Uuid::new_v4(),
                event_id: event.id,
                seat_ids: vec![seats[0].id, Uuid::new_v4()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Inventory(_)));

        assert_eq!(store.event_by_id(event.id).await.unwrap().tickets_reserved, 0);
        assert!(store
            .reservations_for_manager(event.manager_id)
            .await
            .unwrap()
            .is_empty());
        assert!(!store.seat_by_id(seats[0].id).await.unwrap().is_reserved);
    }

    #[tokio::test]
    async fn test_cancelled_reservation_frees_its_seats() {
        let store = MemoryStore::new();
        let (event, seats) = seeded_event(&store, 2).await;

        let first = store
            .create_reservation(NewReservation {
                user_id: Uuid::new_v4(),
                event_id: event.id,
                seat_ids: vec![seats[0].id],
            })
            .await
            .unwrap();
        assert!(store.seat_by_id(seats[0].id).await.unwrap().is_reserved);

        store
            .set_reservation_status(first.id, ReservationStatus::Cancelled)
            .await
            .unwrap();
        assert!(!store.seat_by_id(seats[0].id).await.unwrap().is_reserved);

        // Someone else takes the seat, so the first reservation can't come back.
        store
            .create_reservation(NewReservation {
                user_id: Uuid::new_v4(),
                event_id: event.id,
                seat_ids: vec![seats[0].id],
            })
            .await
            .unwrap();
        let err = store
            .set_reservation_status(first.id, ReservationStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Inventory(inventory::InventoryError::SeatTaken(_))
        ));
        assert_eq!(store.event_by_id(event.id).await.unwrap().tickets_reserved, 1);
    }

    #[tokio::test]
    async fn test_delete_event_cascades() {
        let store = MemoryStore::new();
        let (event, seats) = seeded_event(&store, 2).await;
        let reservation = store
            .create_reservation(NewReservation {
                user_id: Uuid::new_v4(),
                event_id: event.id,
                seat_ids: vec![seats[1].id],
            })
            .await
            .unwrap();

        store.delete_event(event.id).await.unwrap();

        assert!(store.list_seats().await.unwrap().is_empty());
        assert!(matches!(
            store.reservation_by_id(reservation.id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_rejects_event_ending_before_start() {
        let store = MemoryStore::new();
        let (event, _) = seeded_event(&store, 1).await;

        let err = store
            .update_event(
                event.id,
                EventChanges {
                    ends_at: Some(event.starts_at - Duration::minutes(5)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Inventory(inventory::InventoryError::InvalidSchedule)
        ));
        assert_eq!(store.event_by_id(event.id).await.unwrap().ends_at, event.ends_at);
    }
}
