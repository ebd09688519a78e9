//! Wire-format checks: the JSON the frontend sees must use the
//! SCREAMING_SNAKE_CASE enum spelling, and the pagination math must line up
//! with what listing pages render.

use car_rental_backend::models::{
    Car, Page, PageParams, Rental, RentalStatus, Role, UpdateCarRequest,
};

#[test]
fn rental_status_serializes_screaming_snake() {
    assert_eq!(
        serde_json::to_string(&RentalStatus::PickedUp).unwrap(),
        "\"PICKED_UP\""
    );
    assert_eq!(
        serde_json::to_string(&RentalStatus::Overdue).unwrap(),
        "\"OVERDUE\""
    );
    let parsed: RentalStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
    assert_eq!(parsed, RentalStatus::Cancelled);
}

#[test]
fn role_serializes_screaming_snake() {
    assert_eq!(serde_json::to_string(&Role::Customer).unwrap(), "\"CUSTOMER\"");
    assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
}

#[test]
fn rental_status_from_str_is_exact() {
    assert_eq!("PICKED_UP".parse::<RentalStatus>(), Ok(RentalStatus::PickedUp));
    assert!("picked_up".parse::<RentalStatus>().is_err());
    assert!("PickedUp".parse::<RentalStatus>().is_err());
    assert!("".parse::<RentalStatus>().is_err());
}

#[test]
fn rental_status_display_round_trips() {
    for status in RentalStatus::ALL {
        let rendered = status.to_string();
        assert_eq!(rendered.parse::<RentalStatus>(), Ok(status));
    }
}

#[test]
fn rental_join_columns_are_optional_in_json() {
    // Rentals straight from an INSERT have no joined columns yet; the JSON
    // must still parse on the client.
    let rental = Rental::default();
    let json = serde_json::to_value(&rental).unwrap();
    assert!(json["username"].is_null());
    assert!(json["car_brand"].is_null());
}

#[test]
fn update_car_request_has_no_availability_field() {
    // A payload trying to flip availability must not deserialize it into
    // anything; the field simply does not exist on the update type.
    let req: UpdateCarRequest =
        serde_json::from_str(r#"{ "daily_rate": 10.0 }"#).unwrap();
    assert_eq!(req.daily_rate, Some(10.0));
    assert!(req.brand.is_none());

    let json = serde_json::to_value(UpdateCarRequest::default()).unwrap();
    assert!(json.get("available").is_none());
}

#[test]
fn page_math_rounds_up() {
    let page: Page<Car> = Page::new(vec![], 0, 10, 0);
    assert_eq!(page.total_pages, 0);

    let page: Page<Car> = Page::new(vec![], 0, 10, 10);
    assert_eq!(page.total_pages, 1);

    let page: Page<Car> = Page::new(vec![], 0, 10, 11);
    assert_eq!(page.total_pages, 2);

    let page: Page<Car> = Page::new(vec![], 2, 3, 7);
    assert_eq!(page.total_pages, 3);
}

#[test]
fn page_params_clamp_and_default() {
    let params = PageParams::default();
    assert_eq!(params.page(), 0);
    assert_eq!(params.size(), 10);
    assert_eq!(params.offset(), 0);

    let params = PageParams {
        page: Some(-5),
        size: Some(0),
    };
    assert_eq!(params.page(), 0);
    assert_eq!(params.size(), 1);

    let params = PageParams {
        page: Some(3),
        size: Some(500),
    };
    assert_eq!(params.size(), 100);
    assert_eq!(params.offset(), 300);
}

#[test]
fn active_statuses_hold_the_car() {
    let active: Vec<_> = RentalStatus::ALL
        .into_iter()
        .filter(|s| s.is_active())
        .collect();
    assert_eq!(
        active,
        vec![
            RentalStatus::Pending,
            RentalStatus::Confirmed,
            RentalStatus::PickedUp
        ]
    );
}
