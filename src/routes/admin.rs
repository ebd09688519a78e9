use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to users with the ADMIN role:
/// fleet management, the image upload pipeline, rental oversight, user
/// administration and the dashboard.
///
/// Access Control:
/// This entire router is wrapped in the authentication middleware; each
/// handler then explicitly checks for `Role::Admin` before proceeding, so
/// an authenticated CUSTOMER hitting these endpoints receives a 403.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // Fleet-wide dashboard counters (cars, availability, users, active rentals).
        .route("/stats", get(handlers::get_stats))
        // --- Fleet Management ---
        // POST /admin/cars
        // Adds a car to the fleet.
        .route("/cars", post(handlers::create_car))
        // PUT/DELETE /admin/cars/{id}
        // Updates a car's descriptive fields or removes it (plus its stored image).
        .route(
            "/cars/{id}",
            put(handlers::update_car).delete(handlers::delete_car),
        )
        // POST /admin/upload/presigned
        // Issues a short-lived presigned S3 URL so the admin client can
        // upload a car photo directly to the bucket, bypassing this server.
        .route("/upload/presigned", post(handlers::get_presigned_url))
        // --- Rental Oversight ---
        // GET /admin/rentals?term=...&status=...&page=...&size=...
        // Paginated listing of all rentals with search and status filters.
        .route("/rentals", get(handlers::list_rentals))
        // PUT /admin/rentals/{id}/status
        // Drives a rental through its lifecycle (confirm, pick up, return, ...).
        .route("/rentals/{id}/status", put(handlers::update_rental_status))
        // --- User Administration ---
        // GET /admin/users
        // Full user directory.
        .route("/users", get(handlers::list_users))
        // PUT /admin/users/{id}/role
        // Promotes or demotes an account.
        .route("/users/{id}/role", put(handlers::set_user_role))
        // DELETE /admin/users/{id}
        // Removes an account.
        .route("/users/{id}", delete(handlers::delete_user))
}
