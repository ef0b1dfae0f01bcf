use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, query, query_as, PgConnection, PgPool};
use uuid::Uuid;

use crate::inventory;
use crate::models::{
    AccessToken, Author, Event, EventChanges, NewAccessToken, NewAuthor, NewEvent, NewReservation,
    NewUser, NewVenue, Reservation, ReservationStatus, Role, Seat, User, Venue,
};
use crate::store::{Store, StoreError, StoreResult};

/// Postgres-backed store. Multi-row writes run in a transaction that first
/// locks the affected event row.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }
}

/// Seats with their reservation state derived from active reservation links.
fn seat_query(filter: &str) -> String {
    format!(
        "SELECT s.id, s.event_id, s.position, s.created_at, s.updated_at,
            EXISTS (
                SELECT 1 FROM reservation_seat rs
                    INNER JOIN reservations r ON r.id = rs.reservation_id
                WHERE rs.seat_id = s.id AND r.status <> 'cancelled'
            ) AS is_reserved
        FROM seats s
        {filter}
        ORDER BY s.created_at, length(s.position), s.position"
    )
}

fn unique_or(
    err: sqlx::Error,
    resource: &'static str,
    field: &'static str,
    value: &str,
) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict {
            resource,
            field,
            value: value.to_string(),
        },
        _ => StoreError::Database(err),
    }
}

async fn lock_event(conn: &mut PgConnection, event_id: Uuid) -> StoreResult<Event> {
    query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
        .bind(event_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::not_found("event", event_id))
}

async fn find_reservation(conn: &mut PgConnection, reservation_id: Uuid) -> StoreResult<Reservation> {
    query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
        .bind(reservation_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::not_found("reservation", reservation_id))
}

async fn adjust_reserved(conn: &mut PgConnection, event_id: Uuid, delta: i32) -> StoreResult<()> {
    if delta == 0 {
        return Ok(());
    }

    query("UPDATE events SET tickets_reserved = tickets_reserved + $2, updated_at = now() WHERE id = $1")
        .bind(event_id)
        .bind(delta)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        query_as::<_, User>(
            "INSERT INTO users (id, name, email, password_hash, role, address, phone, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .bind(&new_user.address)
        .bind(&new_user.phone)
        .bind(&new_user.image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_or(e, "user", "email", &new_user.email))
    }

    async fn user_by_id(&self, user_id: Uuid) -> StoreResult<User> {
        query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("user", user_id))
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<User> {
        query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("user", email))
    }

    async fn users_by_role(&self, role: Role) -> StoreResult<Vec<User>> {
        let users = query_as::<_, User>("SELECT * FROM users WHERE role = $1 ORDER BY created_at")
            .bind(role)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    async fn create_token(&self, new_token: NewAccessToken) -> StoreResult<AccessToken> {
        let token = query_as::<_, AccessToken>(
            "INSERT INTO access_tokens (id, user_id, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new_token.user_id)
        .bind(&new_token.token_hash)
        .bind(new_token.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(token)
    }

    async fn token_by_hash(&self, token_hash: &str) -> StoreResult<AccessToken> {
        query_as::<_, AccessToken>("SELECT * FROM access_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("access token", "<redacted>"))
    }

    async fn delete_tokens_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        let result = query("DELETE FROM access_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn clear_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = query("DELETE FROM access_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_venues(&self) -> StoreResult<Vec<Venue>> {
        let venues = query_as::<_, Venue>("SELECT * FROM venues ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        Ok(venues)
    }

    async fn venue_by_id(&self, venue_id: Uuid) -> StoreResult<Venue> {
        query_as::<_, Venue>("SELECT * FROM venues WHERE id = $1")
            .bind(venue_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("venue", venue_id))
    }

    async fn create_venue(&self, new_venue: NewVenue) -> StoreResult<Venue> {
        query_as::<_, Venue>(
            "INSERT INTO venues (id, name, city, country, address, capacity_people, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new_venue.name)
        .bind(&new_venue.city)
        .bind(&new_venue.country)
        .bind(&new_venue.address)
        .bind(new_venue.capacity_people)
        .bind(&new_venue.image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_or(e, "venue", "name, city and address", &new_venue.name))
    }

    async fn list_authors(&self) -> StoreResult<Vec<Author>> {
        let authors = query_as::<_, Author>("SELECT * FROM authors ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        Ok(authors)
    }

    async fn author_by_id(&self, author_id: Uuid) -> StoreResult<Author> {
        query_as::<_, Author>("SELECT * FROM authors WHERE id = $1")
            .bind(author_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("author", author_id))
    }

    async fn create_author(&self, new_author: NewAuthor) -> StoreResult<Author> {
        query_as::<_, Author>(
            "INSERT INTO authors (id, name, music_genre, image_url)
            VALUES ($1, $2, $3, $4)
            RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new_author.name)
        .bind(&new_author.music_genre)
        .bind(&new_author.image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_or(e, "author", "name", &new_author.name))
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        let events = query_as::<_, Event>("SELECT * FROM events ORDER BY starts_at, created_at")
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }

    async fn events_by_manager(&self, manager_id: Uuid) -> StoreResult<Vec<Event>> {
        let events = query_as::<_, Event>(
            "SELECT * FROM events WHERE manager_id = $1 ORDER BY starts_at, created_at",
        )
        .bind(manager_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn event_by_id(&self, event_id: Uuid) -> StoreResult<Event> {
        query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("event", event_id))
    }

    async fn create_event(&self, new_event: NewEvent) -> StoreResult<Event> {
        let event = query_as::<_, Event>(
            "INSERT INTO events (
                id, title, description, starts_at, ends_at, venue_id, manager_id, author_id,
                image_url, tickets_capacity, tickets_reserved
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0)
            RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new_event.title)
        .bind(&new_event.description)
        .bind(new_event.starts_at)
        .bind(new_event.ends_at)
        .bind(new_event.venue_id)
        .bind(new_event.manager_id)
        .bind(new_event.author_id)
        .bind(&new_event.image_url)
        .bind(new_event.tickets_capacity)
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    async fn update_event(&self, event_id: Uuid, changes: EventChanges) -> StoreResult<Event> {
        let mut tx = self.pool.begin().await?;

        let current = lock_event(&mut tx, event_id).await?;
        if let Some(capacity) = changes.tickets_capacity {
            inventory::check_capacity_change(&current, capacity)?;
        }
        let merged = changes.apply_to(&current);
        inventory::check_schedule(&merged)?;

        let event = query_as::<_, Event>(
            "UPDATE events SET
                title = $2, description = $3, starts_at = $4, ends_at = $5, venue_id = $6,
                author_id = $7, image_url = $8, tickets_capacity = $9, updated_at = now()
            WHERE id = $1
            RETURNING *",
        )
        .bind(event_id)
        .bind(&merged.title)
        .bind(&merged.description)
        .bind(merged.starts_at)
        .bind(merged.ends_at)
        .bind(merged.venue_id)
        .bind(merged.author_id)
        .bind(&merged.image_url)
        .bind(merged.tickets_capacity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(event)
    }

    async fn delete_event(&self, event_id: Uuid) -> StoreResult<()> {
        let result = query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("event", event_id));
        }

        Ok(())
    }

    async fn attendees(&self, event_id: Uuid) -> StoreResult<Vec<User>> {
        let users = query_as::<_, User>(
            "SELECT u.* FROM users u
            WHERE EXISTS (
                SELECT 1 FROM reservations r
                WHERE r.user_id = u.id AND r.event_id = $1 AND r.status <> 'cancelled'
            )
            ORDER BY u.name",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn list_seats(&self) -> StoreResult<Vec<Seat>> {
        let seats = query_as::<_, Seat>(&seat_query(""))
            .fetch_all(&self.pool)
            .await?;

        Ok(seats)
    }

    async fn seat_by_id(&self, seat_id: Uuid) -> StoreResult<Seat> {
        query_as::<_, Seat>(&seat_query("WHERE s.id = $1"))
            .bind(seat_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("seat", seat_id))
    }

    async fn seats_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Seat>> {
        let seats = query_as::<_, Seat>(&seat_query("WHERE s.event_id = $1"))
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(seats)
    }

    async fn provision_seats(
        &self,
        event_id: Uuid,
        positions: Vec<String>,
    ) -> StoreResult<Vec<Seat>> {
        let mut tx = self.pool.begin().await?;

        lock_event(&mut tx, event_id).await?;

        let existing = query_as::<_, Seat>(&seat_query("WHERE s.event_id = $1"))
            .bind(event_id)
            .fetch_all(&mut *tx)
            .await?;
        let plan = inventory::plan_layout(&existing, &positions)?;

        if !plan.remove.is_empty() {
            query("DELETE FROM seats WHERE id = ANY($1)")
                .bind(&plan.remove)
                .execute(&mut *tx)
                .await?;
        }

        if !plan.insert.is_empty() {
            let ids: Vec<Uuid> = plan.insert.iter().map(|_| Uuid::new_v4()).collect();
            query(
                "INSERT INTO seats (id, event_id, position)
                SELECT id, $1, position FROM UNNEST($2::uuid[], $3::text[]) AS t(id, position)",
            )
            .bind(event_id)
            .bind(&ids)
            .bind(&plan.insert)
            .execute(&mut *tx)
            .await?;
        }

        query("UPDATE events SET tickets_capacity = $2, updated_at = now() WHERE id = $1")
            .bind(event_id)
            .bind(plan.capacity())
            .execute(&mut *tx)
            .await?;

        let seats = query_as::<_, Seat>(&seat_query("WHERE s.event_id = $1"))
            .bind(event_id)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(seats)
    }

    async fn reservation_by_id(&self, reservation_id: Uuid) -> StoreResult<Reservation> {
        let mut conn = self.pool.acquire().await?;
        find_reservation(&mut conn, reservation_id).await
    }

    async fn reservations_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Reservation>> {
        let reservations = query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    async fn reservations_for_manager(&self, manager_id: Uuid) -> StoreResult<Vec<Reservation>> {
        let reservations = query_as::<_, Reservation>(
            "SELECT r.* FROM reservations r
                INNER JOIN events e ON e.id = r.event_id
            WHERE e.manager_id = $1
            ORDER BY r.created_at",
        )
        .bind(manager_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    async fn seats_for_reservation(&self, reservation_id: Uuid) -> StoreResult<Vec<Seat>> {
        let seats = query_as::<_, Seat>(&seat_query(
            "INNER JOIN reservation_seat link ON link.seat_id = s.id
            WHERE link.reservation_id = $1",
        ))
        .bind(reservation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(seats)
    }

    async fn create_reservation(
        &self,
        new_reservation: NewReservation,
    ) -> StoreResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let event = lock_event(&mut tx, new_reservation.event_id).await?;
        let seats = query_as::<_, Seat>(&seat_query("WHERE s.event_id = $1"))
            .bind(event.id)
            .fetch_all(&mut *tx)
            .await?;
        let count = inventory::check_selection(&event, &new_reservation.seat_ids, &seats)?;

        let reservation = query_as::<_, Reservation>(
            "INSERT INTO reservations (id, user_id, event_id, status, number_of_seats)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new_reservation.user_id)
        .bind(event.id)
        .bind(ReservationStatus::Pending)
        .bind(count)
        .fetch_one(&mut *tx)
        .await?;

        query(
            "INSERT INTO reservation_seat (reservation_id, seat_id)
            SELECT $1, UNNEST($2::uuid[])",
        )
        .bind(reservation.id)
        .bind(&new_reservation.seat_ids)
        .execute(&mut *tx)
        .await?;

        adjust_reserved(&mut tx, event.id, count).await?;

        tx.commit().await?;

        Ok(reservation)
    }

    async fn set_reservation_status(
        &self,
        reservation_id: Uuid,
        status: ReservationStatus,
    ) -> StoreResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let unlocked = find_reservation(&mut tx, reservation_id).await?;
        let event = lock_event(&mut tx, unlocked.event_id).await?;
        // Re-read under the event lock so the status we compare against is current.
        let current = find_reservation(&mut tx, reservation_id).await?;

        let delta = inventory::reserved_delta(current.status, status, current.number_of_seats);
        if delta > 0 {
            let seats = query_as::<_, Seat>(&seat_query(
                "INNER JOIN reservation_seat link ON link.seat_id = s.id
                WHERE link.reservation_id = $1",
            ))
            .bind(reservation_id)
            .fetch_all(&mut *tx)
            .await?;
            inventory::check_reactivation(&event, &seats, current.number_of_seats)?;
        }

        let updated = query_as::<_, Reservation>(
            "UPDATE reservations SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(reservation_id)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        adjust_reserved(&mut tx, event.id, delta).await?;

        tx.commit().await?;

        Ok(updated)
    }

    async fn delete_reservation(&self, reservation_id: Uuid) -> StoreResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let unlocked = find_reservation(&mut tx, reservation_id).await?;
        lock_event(&mut tx, unlocked.event_id).await?;
        let current = find_reservation(&mut tx, reservation_id).await?;

        query("DELETE FROM reservations WHERE id = $1")
            .bind(reservation_id)
            .execute(&mut *tx)
            .await?;

        if current.status.holds_seats() {
            adjust_reserved(&mut tx, current.event_id, -current.number_of_seats).await?;
        }

        tx.commit().await?;

        Ok(current)
    }
}
