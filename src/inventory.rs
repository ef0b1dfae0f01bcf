//! Seat and ticket bookkeeping.
//!
//! Every storage backend runs these checks while holding exclusive access to
//! the event (a row lock in Postgres, the state mutex in memory), so the
//! counters on `Event` only ever move through the functions in this module.

use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{Event, ReservationStatus, Seat};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("At least one seat must be selected")]
    EmptySelection,

    #[error("Seat {0} was selected more than once")]
    DuplicateSeat(Uuid),

    #[error("Seat {0} does not belong to this event")]
    ForeignSeat(Uuid),

    #[error("Seat {0} is already reserved")]
    SeatTaken(String),

    #[error("Only {available} tickets left but {requested} were requested")]
    CapacityExceeded { requested: i32, available: i32 },

    #[error("Capacity {capacity} is below the {reserved} tickets already reserved")]
    CapacityBelowReserved { capacity: i32, reserved: i32 },

    #[error("Seat positions must not be blank")]
    BlankPosition,

    #[error("Seat position {0} appears more than once")]
    DuplicatePosition(String),

    #[error("Seat {0} is held by an active reservation and cannot be removed")]
    SeatHeld(String),

    #[error("{missing} of the reserved seats no longer exist")]
    SeatsRemoved { missing: i32 },

    #[error("ends_at must be after starts_at")]
    InvalidSchedule,
}

impl InventoryError {
    /// Conflicts depend on the current state of the event, everything else is
    /// a malformed request.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            InventoryError::SeatTaken(_)
                | InventoryError::CapacityExceeded { .. }
                | InventoryError::SeatHeld(_)
                | InventoryError::SeatsRemoved { .. }
        )
    }
}

/// How much `tickets_reserved` moves when a reservation of `seats` seats goes
/// from `from` to `to`. Only crossing the cancelled boundary counts.
pub fn reserved_delta(from: ReservationStatus, to: ReservationStatus, seats: i32) -> i32 {
    match (from.holds_seats(), to.holds_seats()) {
        (true, false) => -seats,
        (false, true) => seats,
        _ => 0,
    }
}

/// Fails when `additional` more tickets would overflow the event.
pub fn check_capacity(event: &Event, additional: i32) -> Result<(), InventoryError> {
    if event.tickets_reserved + additional > event.tickets_capacity {
        return Err(InventoryError::CapacityExceeded {
            requested: additional,
            available: event.tickets_available(),
        });
    }

    Ok(())
}

/// Validates a seat selection against the event's current seats and returns
/// the number of seats to reserve.
pub fn check_selection(
    event: &Event,
    requested: &[Uuid],
    event_seats: &[Seat],
) -> Result<i32, InventoryError> {
    if requested.is_empty() {
        return Err(InventoryError::EmptySelection);
    }

    let mut seen = HashSet::with_capacity(requested.len());
    for seat_id in requested {
        if !seen.insert(*seat_id) {
            return Err(InventoryError::DuplicateSeat(*seat_id));
        }

        let seat = event_seats
            .iter()
            .find(|seat| seat.id == *seat_id && seat.event_id == event.id)
            .ok_or(InventoryError::ForeignSeat(*seat_id))?;

        if seat.is_reserved {
            return Err(InventoryError::SeatTaken(seat.position.clone()));
        }
    }

    let count = requested.len() as i32;
    check_capacity(event, count)?;

    Ok(count)
}

/// Validates moving a cancelled reservation back to an active status.
/// `seats` are the reservation's own seats as currently read; a layout change
/// may have removed some of them while the reservation was cancelled.
pub fn check_reactivation(
    event: &Event,
    seats: &[Seat],
    number_of_seats: i32,
) -> Result<(), InventoryError> {
    let attached = seats.len() as i32;
    if attached != number_of_seats {
        return Err(InventoryError::SeatsRemoved {
            missing: number_of_seats - attached,
        });
    }

    if let Some(taken) = seats.iter().find(|seat| seat.is_reserved) {
        return Err(InventoryError::SeatTaken(taken.position.clone()));
    }

    check_capacity(event, number_of_seats)
}

/// Fails when a new capacity would drop below what is already reserved.
pub fn check_capacity_change(event: &Event, capacity: i32) -> Result<(), InventoryError> {
    if capacity < event.tickets_reserved {
        return Err(InventoryError::CapacityBelowReserved {
            capacity,
            reserved: event.tickets_reserved,
        });
    }

    Ok(())
}

/// An event must end after it starts.
pub fn check_schedule(event: &Event) -> Result<(), InventoryError> {
    if event.ends_at <= event.starts_at {
        return Err(InventoryError::InvalidSchedule);
    }

    Ok(())
}

/// The difference between an event's current seats and a requested layout.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeatPlan {
    /// Seats whose position survives, identity is preserved
    pub keep: Vec<Uuid>,
    /// Seats whose position disappears
    pub remove: Vec<Uuid>,
    /// Positions that have no seat yet
    pub insert: Vec<String>,
}

impl SeatPlan {
    /// The seat count once the plan is applied, which becomes the event capacity.
    pub fn capacity(&self) -> i32 {
        (self.keep.len() + self.insert.len()) as i32
    }
}

/// Works out how to turn `existing` into exactly `positions`.
///
/// Positions are trimmed. A seat that is held by an active reservation may
/// not be removed.
pub fn plan_layout(existing: &[Seat], positions: &[String]) -> Result<SeatPlan, InventoryError> {
    let mut wanted = Vec::with_capacity(positions.len());
    let mut seen = HashSet::with_capacity(positions.len());

    for position in positions {
        let position = position.trim();
        if position.is_empty() {
            return Err(InventoryError::BlankPosition);
        }
        if !seen.insert(position) {
            return Err(InventoryError::DuplicatePosition(position.to_string()));
        }
        wanted.push(position);
    }

    let mut plan = SeatPlan::default();

    for seat in existing {
        if seen.contains(seat.position.as_str()) {
            plan.keep.push(seat.id);
        } else if seat.is_reserved {
            return Err(InventoryError::SeatHeld(seat.position.clone()));
        } else {
            plan.remove.push(seat.id);
        }
    }

    let current: HashSet<&str> = existing.iter().map(|seat| seat.position.as_str()).collect();
    plan.insert = wanted
        .into_iter()
        .filter(|position| !current.contains(position))
        .map(str::to_string)
        .collect();

    Ok(plan)
}

/// Sequential labels `S1..=Sn`.
pub fn generate_positions(count: usize) -> Vec<String> {
    (1..=count).map(|n| format!("S{n}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use ReservationStatus::*;

    fn event(capacity: i32, reserved: i32) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            title: "Night at the opera".to_string(),
            description: "An evening of arias".to_string(),
            starts_at: now,
            ends_at: now + Duration::hours(3),
            venue_id: Uuid::new_v4(),
            manager_id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            image_url: None,
            tickets_capacity: capacity,
            tickets_reserved: reserved,
            created_at: now,
            updated_at: now,
        }
    }

    fn seat(event: &Event, position: &str, is_reserved: bool) -> Seat {
        let now = Utc::now();
        Seat {
            id: Uuid::new_v4(),
            event_id: event.id,
            position: position.to_string(),
            is_reserved,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_delta_only_moves_across_cancelled_boundary() {
        assert_eq!(reserved_delta(Pending, Cancelled, 3), -3);
        assert_eq!(reserved_delta(Confirmed, Cancelled, 3), -3);
        assert_eq!(reserved_delta(Cancelled, Confirmed, 3), 3);
        assert_eq!(reserved_delta(Cancelled, Pending, 3), 3);
        assert_eq!(reserved_delta(Pending, Confirmed, 3), 0);
        assert_eq!(reserved_delta(Confirmed, Pending, 3), 0);
    }

    #[test]
    fn test_repeated_cancel_does_not_decrement_twice() {
        assert_eq!(reserved_delta(Cancelled, Cancelled, 5), 0);
    }

    #[test]
    fn test_selection_counts_free_seats() {
        let event = event(10, 0);
        let seats = vec![
            seat(&event, "S1", false),
            seat(&event, "S2", false),
            seat(&event, "S3", false),
        ];
        let ids: Vec<_> = seats.iter().map(|s| s.id).collect();

        assert_eq!(check_selection(&event, &ids, &seats), Ok(3));
    }

    #[test]
    fn test_selection_rejects_bad_input() {
        let event = event(10, 0);
        let seats = vec![seat(&event, "S1", false), seat(&event, "S2", true)];

        assert_eq!(
            check_selection(&event, &[], &seats),
            Err(InventoryError::EmptySelection)
        );
        assert_eq!(
            check_selection(&event, &[seats[0].id, seats[0].id], &seats),
            Err(InventoryError::DuplicateSeat(seats[0].id))
        );

        let stranger = Uuid::new_v4();
        assert_eq!(
            check_selection(&event, &[stranger], &seats),
            Err(InventoryError::ForeignSeat(stranger))
        );

        let taken = check_selection(&event, &[seats[1].id], &seats).unwrap_err();
        assert_eq!(taken, InventoryError::SeatTaken("S2".to_string()));
        assert!(taken.is_conflict());
    }

    #[test]
    fn test_selection_respects_capacity() {
        let event = event(3, 2);
        let seats = vec![seat(&event, "S1", false), seat(&event, "S2", false)];
        let ids: Vec<_> = seats.iter().map(|s| s.id).collect();

        assert_eq!(
            check_selection(&event, &ids, &seats),
            Err(InventoryError::CapacityExceeded {
                requested: 2,
                available: 1
            })
        );
    }

    #[test]
    fn test_reactivation_requires_free_seats_and_room() {
        let roomy = event(10, 2);
        let free = vec![seat(&roomy, "S1", false), seat(&roomy, "S2", false)];
        assert!(check_reactivation(&roomy, &free, 2).is_ok());

        let taken = vec![seat(&roomy, "S1", false), seat(&roomy, "S2", true)];
        assert_eq!(
            check_reactivation(&roomy, &taken, 2),
            Err(InventoryError::SeatTaken("S2".to_string()))
        );

        let full = event(2, 1);
        assert!(check_reactivation(&full, &free, 2).is_err());
    }

    #[test]
    fn test_reactivation_fails_when_seats_were_removed() {
        let roomy = event(10, 0);
        let remaining = vec![seat(&roomy, "S2", false)];

        let err = check_reactivation(&roomy, &remaining, 2).unwrap_err();
        assert_eq!(err, InventoryError::SeatsRemoved { missing: 1 });
        assert!(err.is_conflict());
        assert_eq!(
            check_reactivation(&roomy, &[], 1),
            Err(InventoryError::SeatsRemoved { missing: 1 })
        );
    }

    #[test]
    fn test_schedule_must_end_after_start() {
        let mut event = event(10, 0);
        assert!(check_schedule(&event).is_ok());

        event.ends_at = event.starts_at;
        assert_eq!(check_schedule(&event), Err(InventoryError::InvalidSchedule));
        assert!(!InventoryError::InvalidSchedule.is_conflict());
    }

    #[test]
    fn test_capacity_change_cannot_go_below_reserved() {
        let event = event(10, 4);
        assert!(check_capacity_change(&event, 4).is_ok());
        assert_eq!(
            check_capacity_change(&event, 3),
            Err(InventoryError::CapacityBelowReserved {
                capacity: 3,
                reserved: 4
            })
        );
    }

    #[test]
    fn test_plan_keeps_surviving_positions() {
        let event = event(3, 0);
        let existing = vec![
            seat(&event, "S1", true),
            seat(&event, "S2", false),
            seat(&event, "S3", false),
        ];

        let positions: Vec<String> = ["S1", " S3 ", "S4", "S5"]
            .iter()
            .map(|p| p.to_string())
            .collect();
        let plan = plan_layout(&existing, &positions).unwrap();

        assert_eq!(plan.keep, vec![existing[0].id, existing[2].id]);
        assert_eq!(plan.remove, vec![existing[1].id]);
        assert_eq!(plan.insert, vec!["S4".to_string(), "S5".to_string()]);
        assert_eq!(plan.capacity(), 4);
    }

    #[test]
    fn test_plan_refuses_to_drop_held_seat() {
        let event = event(2, 1);
        let existing = vec![seat(&event, "S1", true), seat(&event, "S2", false)];

        let err = plan_layout(&existing, &["S2".to_string()]).unwrap_err();
        assert_eq!(err, InventoryError::SeatHeld("S1".to_string()));
        assert!(err.is_conflict());
    }

    #[test]
    fn test_plan_rejects_blank_and_duplicate_positions() {
        assert_eq!(
            plan_layout(&[], &["  ".to_string()]),
            Err(InventoryError::BlankPosition)
        );
        assert_eq!(
            plan_layout(&[], &["A1".to_string(), "A1 ".to_string()]),
            Err(InventoryError::DuplicatePosition("A1".to_string()))
        );
    }

    #[test]
    fn test_generated_positions_are_sequential() {
        assert_eq!(generate_positions(3), vec!["S1", "S2", "S3"]);
        assert!(generate_positions(0).is_empty());
    }
}
