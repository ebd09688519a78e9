use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any user who has successfully passed the
/// authentication layer. This module implements the core features for a
/// standard CUSTOMER: booking a car and reviewing their own rentals.
///
/// Access Control Strategy:
/// Every handler in this module relies on the `AuthUser` extractor
/// middleware being present on the router layer above this module. This
/// guarantees that all handlers receive a validated `AuthUser` struct
/// containing the user's ID and role.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // Retrieves the currently authenticated user's profile.
        .route("/me", get(handlers::get_me))
        // POST /rentals
        // Books a car for the authenticated user. The lifecycle module
        // validates dates, computes the price and atomically holds the car.
        .route("/rentals", post(handlers::create_rental))
        // GET /rentals/me
        // Lists the authenticated user's own rental history.
        .route("/rentals/me", get(handlers::my_rentals))
}
