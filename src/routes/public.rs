use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any
/// client. Anonymous visitors can browse the fleet; the auth gateway
/// endpoints create sessions for everything else.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // New account creation. Every self-registered account is a CUSTOMER.
        .route("/auth/register", post(handlers::register))
        // POST /auth/login
        // Credential verification and JWT issuance.
        .route("/auth/login", post(handlers::login))
        // GET /cars?search=...&available=...&page=...&size=...
        // Paginated fleet browsing with search and availability filters.
        .route("/cars", get(handlers::list_cars))
        // GET /cars/{id}
        // Detailed view of a single car.
        .route("/cars/{id}", get(handlers::get_car))
}
