use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{auth, catalog, events, health_check, reservations, seats, users};
use crate::state::AppState;

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/authors", get(catalog::list_authors).post(catalog::create_author))
        .route("/authors/:id", get(catalog::get_author))
        .route("/venues", get(catalog::list_venues).post(catalog::create_venue))
        .route("/venues/:id", get(catalog::get_venue))
        .route("/seats", get(seats::list_seats))
        .route("/seats/:id", get(seats::get_seat))
}

/// Every handler here takes an `AuthUser`, so a missing or expired token is
/// rejected before the handler runs.
fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(auth::logout))
        .route("/buyers", get(users::list_buyers))
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/my", get(events::my_events))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/seats", post(seats::provision_seats))
        .route("/reservations", post(reservations::create_reservation))
        .route("/reservations/events", get(reservations::for_my_events))
        .route("/reservations/my", get(reservations::my_reservations))
        .route("/reservations/:id", delete(reservations::delete_reservation))
        .route("/reservations/:id/status", patch(reservations::update_status))
}

pub fn create_routes(state: AppState) -> Router {
    let security_headers = create_security_headers_layer(&state.config);
    let cors = create_cors_layer(&state.config);

    Router::new()
        .merge(public_routes())
        .merge(protected_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(security_headers)
        .layer(cors)
}
