use car_rental_backend::{
    AppConfig, AppState, MemoryRepository, MockStorageService, create_router,
    models::{AuthResponse, Car, CreateCarRequest, Rental, Role},
    repository::{Repository, RepositoryState},
    storage::StorageState,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    /// Direct handle to the in-memory store for seeding and assertions.
    pub repo: Arc<MemoryRepository>,
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    let storage = Arc::new(MockStorageService::new()) as StorageState;
    let config = AppConfig::default();

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        storage,
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, repo }
}

async fn seed_car(app: &TestApp, brand: &str, model: &str, daily_rate: f64) -> Car {
    app.repo
        .create_car(CreateCarRequest {
            brand: brand.to_string(),
            model: model.to_string(),
            year: 2023,
            license_plate: format!("{}-{}", brand, model).to_uppercase(),
            daily_rate,
            image_key: None,
        })
        .await
        .unwrap()
}

async fn register(app: &TestApp, client: &reqwest::Client, username: &str) -> AuthResponse {
    let response = client
        .post(format!("{}/auth/register", app.address))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "hunter2hunter2"
        }))
        .send()
        .await
        .expect("register fail");
    assert_eq!(response.status(), 201);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_register_login_and_book() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let car = seed_car(&app, "Toyota", "Corolla", 100.0).await;

    let auth = register(&app, &client, "alice").await;
    assert_eq!(auth.username, "alice");
    assert_eq!(auth.role, Role::Customer);
    assert!(!auth.token.is_empty());

    // A fresh login works too and issues a usable token.
    let login = client
        .post(format!("{}/auth/login", app.address))
        .json(&serde_json::json!({ "username": "alice", "password": "hunter2hunter2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), 200);
    let auth: AuthResponse = login.json().await.unwrap();

    // Book 3 inclusive days at 100/day. Start tomorrow so the test cannot
    // straddle a date rollover between client and server.
    let start = Utc::now().date_naive() + Duration::days(1);
    let end = start + Duration::days(2);
    let response = client
        .post(format!("{}/rentals", app.address))
        .bearer_auth(&auth.token)
        .json(&serde_json::json!({ "car_id": car.id, "start_date": start, "end_date": end }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let rental: Rental = response.json().await.unwrap();
    assert_eq!(rental.total_price, 300.0);
    assert_eq!(rental.status.to_string(), "PENDING");

    // The car is now held.
    let held = app.repo.get_car(car.id).await.unwrap().unwrap();
    assert!(!held.available);

    // Booking again conflicts.
    let response = client
        .post(format!("{}/rentals", app.address))
        .bearer_auth(&auth.token)
        .json(&serde_json::json!({ "car_id": car.id, "start_date": start, "end_date": end }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    // The rental shows up in the caller's history, with the joined fields.
    let response = client
        .get(format!("{}/rentals/me", app.address))
        .bearer_auth(&auth.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let rentals: Vec<Rental> = response.json().await.unwrap();
    assert_eq!(rentals.len(), 1);
    assert_eq!(rentals[0].username.as_deref(), Some("alice"));
    assert_eq!(rentals[0].car_brand.as_deref(), Some("Toyota"));
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register(&app, &client, "bob").await;
    let response = client
        .post(format!("{}/auth/register", app.address))
        .json(&serde_json::json!({
            "username": "bob",
            "email": "other@example.com",
            "password": "hunter2hunter2"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&app, &client, "carol").await;

    let response = client
        .post(format!("{}/auth/login", app.address))
        .json(&serde_json::json!({ "username": "carol", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // Unknown username produces the same status so the endpoint cannot be
    // used to probe for accounts.
    let response = client
        .post(format!("{}/auth/login", app.address))
        .json(&serde_json::json!({ "username": "nobody", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_customer_cannot_reach_admin_endpoints() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let auth = register(&app, &client, "dave").await;

    let response = client
        .get(format!("{}/admin/stats", app.address))
        .bearer_auth(&auth.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    // Unauthenticated requests never get as far as the role check.
    let response = client
        .get(format!("{}/admin/stats", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_admin_manages_rental_lifecycle() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let car = seed_car(&app, "Honda", "Civic", 80.0).await;

    let customer = register(&app, &client, "erin").await;
    let admin = register(&app, &client, "frank").await;

    // Promote frank through the store directly; role changes over HTTP are
    // covered separately.
    let frank = app
        .repo
        .get_user_by_username("frank")
        .await
        .unwrap()
        .unwrap();
    app.repo.set_user_role(frank.id, Role::Admin).await.unwrap();

    let start = Utc::now().date_naive() + Duration::days(1);
    let response = client
        .post(format!("{}/rentals", app.address))
        .bearer_auth(&customer.token)
        .json(&serde_json::json!({ "car_id": car.id, "start_date": start, "end_date": start }))
        .send()
        .await
        .unwrap();
    let rental: Rental = response.json().await.unwrap();

    // Walk the rental through its whole life.
    for status in ["CONFIRMED", "PICKED_UP", "RETURNED", "COMPLETED"] {
        let response = client
            .put(format!(
                "{}/admin/rentals/{}/status",
                app.address, rental.id
            ))
            .bearer_auth(&admin.token)
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200, "transition to {status} failed");
    }

    // Returning released the car.
    let released = app.repo.get_car(car.id).await.unwrap().unwrap();
    assert!(released.available);

    // A terminal rental rejects further transitions.
    let response = client
        .put(format!(
            "{}/admin/rentals/{}/status",
            app.address, rental.id
        ))
        .bearer_auth(&admin.token)
        .json(&serde_json::json!({ "status": "CANCELLED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // The admin listing finds it by the renter's username.
    let response = client
        .get(format!("{}/admin/rentals?term=erin", app.address))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let page: serde_json::Value = response.json().await.unwrap();
    assert_eq!(page["total_items"], 1);
}

#[tokio::test]
async fn test_public_car_browsing() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    seed_car(&app, "Tesla", "Model 3", 150.0).await;
    seed_car(&app, "Ford", "Focus", 60.0).await;

    // No auth required to browse.
    let response = client
        .get(format!("{}/cars?search=tesla", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let page: serde_json::Value = response.json().await.unwrap();
    assert_eq!(page["total_items"], 1);
    assert_eq!(page["items"][0]["brand"], "Tesla");

    let response = client
        .get(format!(
            "{}/cars/{}",
            app.address,
            uuid::Uuid::new_v4()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
