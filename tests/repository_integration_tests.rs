//! Contract tests for the `Repository` trait, run against the in-memory
//! implementation. The Postgres implementation answers the same queries
//! with the same ordering and filter semantics.

use car_rental_backend::{
    ApiError, MemoryRepository,
    models::{CreateCarRequest, NewRental, NewUser, PageParams, RentalStatus, Role},
    repository::Repository,
};
use chrono::NaiveDate;
use uuid::Uuid;

fn car(brand: &str, model: &str, rate: f64) -> CreateCarRequest {
    CreateCarRequest {
        brand: brand.to_string(),
        model: model.to_string(),
        year: 2020,
        license_plate: format!("{brand}-1"),
        daily_rate: rate,
        image_key: None,
    }
}

fn user(name: &str) -> NewUser {
    NewUser {
        username: name.to_string(),
        email: format!("{name}@example.com"),
        password_hash: "$argon2id$fake".to_string(),
        role: Role::Customer,
    }
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[tokio::test]
async fn car_listing_paginates_and_filters() {
    let repo = MemoryRepository::new();
    for i in 0..12 {
        repo.create_car(car("Toyota", &format!("Model {i}"), 10.0))
            .await
            .unwrap();
    }
    repo.create_car(car("Ford", "Fiesta", 20.0)).await.unwrap();

    // Default page size is 10.
    let page = repo
        .list_cars(None, None, PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 10);
    assert_eq!(page.total_items, 13);
    assert_eq!(page.total_pages, 2);

    // Second page holds the remainder.
    let page = repo
        .list_cars(
            None,
            None,
            PageParams {
                page: Some(1),
                size: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.items.len(), 3);

    // Search is case-insensitive over brand and model.
    let page = repo
        .list_cars(Some("fiesta".to_string()), None, PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.items[0].brand, "Ford");
}

#[tokio::test]
async fn availability_filter_tracks_holds() {
    let repo = MemoryRepository::new();
    let renter = repo.create_user(user("kim")).await.unwrap();
    let held = repo.create_car(car("Seat", "Ibiza", 30.0)).await.unwrap();
    repo.create_car(car("Seat", "Leon", 40.0)).await.unwrap();

    repo.hold_car_and_create_rental(NewRental {
        car_id: held.id,
        user_id: renter.id,
        start_date: date("2030-01-01"),
        end_date: date("2030-01-02"),
        total_price: 60.0,
    })
    .await
    .unwrap();

    let available = repo
        .list_cars(None, Some(true), PageParams::default())
        .await
        .unwrap();
    assert_eq!(available.total_items, 1);
    assert_eq!(available.items[0].model, "Leon");

    let unavailable = repo
        .list_cars(None, Some(false), PageParams::default())
        .await
        .unwrap();
    assert_eq!(unavailable.total_items, 1);
    assert_eq!(unavailable.items[0].model, "Ibiza");
}

#[tokio::test]
async fn duplicate_usernames_and_emails_conflict() {
    let repo = MemoryRepository::new();
    repo.create_user(user("lena")).await.unwrap();

    let err = repo.create_user(user("lena")).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    let mut clash = user("other");
    clash.email = "lena@example.com".to_string();
    let err = repo.create_user(clash).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[tokio::test]
async fn apply_transition_guards_against_stale_expectations() {
    let repo = MemoryRepository::new();
    let renter = repo.create_user(user("mike")).await.unwrap();
    let c = repo.create_car(car("VW", "Golf", 55.0)).await.unwrap();

    let rental = repo
        .hold_car_and_create_rental(NewRental {
            car_id: c.id,
            user_id: renter.id,
            start_date: date("2030-02-01"),
            end_date: date("2030-02-03"),
            total_price: 165.0,
        })
        .await
        .unwrap();

    // A caller that read PENDING but lost the race to someone who already
    // confirmed must fail, not double-apply.
    repo.apply_transition(rental.id, RentalStatus::Pending, RentalStatus::Confirmed, false)
        .await
        .unwrap();
    let err = repo
        .apply_transition(rental.id, RentalStatus::Pending, RentalStatus::Cancelled, true)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    // The winning transition stuck.
    let stored = repo.get_rental(rental.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RentalStatus::Confirmed);

    // And the losing one did not release the car.
    assert!(!repo.get_car(c.id).await.unwrap().unwrap().available);
}

#[tokio::test]
async fn delete_car_returns_row_for_image_cleanup() {
    let repo = MemoryRepository::new();
    let mut req = car("Skoda", "Fabia", 25.0);
    req.image_key = Some("cars/xyz/fabia.jpg".to_string());
    let created = repo.create_car(req).await.unwrap();

    let removed = repo.delete_car(created.id).await.unwrap().unwrap();
    assert_eq!(removed.image_key.as_deref(), Some("cars/xyz/fabia.jpg"));

    // Idempotence: a second delete finds nothing.
    assert!(repo.delete_car(created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn rental_listing_filters_by_term_and_status() {
    let repo = MemoryRepository::new();
    let nina = repo.create_user(user("nina")).await.unwrap();
    let omar = repo.create_user(user("omar")).await.unwrap();
    let car_a = repo.create_car(car("Renault", "Clio", 35.0)).await.unwrap();
    let car_b = repo.create_car(car("Peugeot", "208", 38.0)).await.unwrap();

    let r1 = repo
        .hold_car_and_create_rental(NewRental {
            car_id: car_a.id,
            user_id: nina.id,
            start_date: date("2030-03-01"),
            end_date: date("2030-03-02"),
            total_price: 70.0,
        })
        .await
        .unwrap();
    repo.hold_car_and_create_rental(NewRental {
        car_id: car_b.id,
        user_id: omar.id,
        start_date: date("2030-03-01"),
        end_date: date("2030-03-02"),
        total_price: 76.0,
    })
    .await
    .unwrap();
    repo.apply_transition(r1.id, RentalStatus::Pending, RentalStatus::Confirmed, false)
        .await
        .unwrap();

    // By renter username.
    let page = repo
        .list_rentals(Some("nina".to_string()), None, PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.items[0].id, r1.id);

    // By car brand.
    let page = repo
        .list_rentals(Some("peugeot".to_string()), None, PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.items[0].car_brand.as_deref(), Some("Peugeot"));

    // By status.
    let page = repo
        .list_rentals(None, Some(RentalStatus::Confirmed), PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.items[0].status, RentalStatus::Confirmed);

    // Per-user history ignores filters and orders by id.
    let mine = repo.rentals_for_user(omar.id).await.unwrap();
    assert_eq!(mine.len(), 1);
}

#[tokio::test]
async fn stats_count_active_rentals_only() {
    let repo = MemoryRepository::new();
    let renter = repo.create_user(user("pia")).await.unwrap();
    let c = repo.create_car(car("Fiat", "Panda", 22.0)).await.unwrap();

    let rental = repo
        .hold_car_and_create_rental(NewRental {
            car_id: c.id,
            user_id: renter.id,
            start_date: date("2030-04-01"),
            end_date: date("2030-04-02"),
            total_price: 44.0,
        })
        .await
        .unwrap();

    let stats = repo.get_stats().await.unwrap();
    assert_eq!(stats.total_cars, 1);
    assert_eq!(stats.available_cars, 0);
    assert_eq!(stats.total_users, 1);
    assert_eq!(stats.active_rentals, 1);

    repo.apply_transition(rental.id, RentalStatus::Pending, RentalStatus::Cancelled, true)
        .await
        .unwrap();
    let stats = repo.get_stats().await.unwrap();
    assert_eq!(stats.available_cars, 1);
    assert_eq!(stats.active_rentals, 0);

    // Missing user id as a sanity check for the lookup path.
    assert!(repo.get_user(Uuid::new_v4()).await.unwrap().is_none());
}
