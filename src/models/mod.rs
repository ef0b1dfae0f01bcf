pub mod author;
pub mod event;
pub mod reservation;
pub mod seat;
pub mod token;
pub mod user;
pub mod venue;

pub use author::{Author, NewAuthor};
pub use event::{Event, EventChanges, NewEvent};
pub use reservation::{NewReservation, Reservation, ReservationStatus};
pub use seat::Seat;
pub use token::{AccessToken, NewAccessToken};
pub use user::{NewUser, Role, User};
pub use venue::{NewVenue, Venue};
