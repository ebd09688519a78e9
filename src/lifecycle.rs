//! Rental lifecycle manager.
//!
//! Owns the rental status state machine and the coupled car-availability
//! updates. Booking and transitions go through this module only; the
//! repository merely executes the decided effects atomically.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{CreateRentalRequest, NewRental, Rental, RentalStatus},
    repository::RepositoryState,
};

/// Legal targets for a given current status. Terminal states (CANCELLED,
/// COMPLETED) admit nothing; every pair not produced here is rejected with
/// `InvalidInput`.
pub fn allowed_targets(current: RentalStatus) -> &'static [RentalStatus] {
    use RentalStatus::*;
    match current {
        Pending => &[Confirmed, Cancelled],
        Confirmed => &[PickedUp, Cancelled],
        PickedUp => &[Returned, Overdue, Cancelled],
        Overdue => &[Returned, Cancelled],
        Returned => &[Completed],
        Cancelled | Completed => &[],
    }
}

/// Whether entering `target` may release the car back to the pool. The
/// release itself is conditional: the repository re-counts other active
/// rentals of the car inside the transition transaction and only flips the
/// flag when none remain.
pub fn releases_car(target: RentalStatus) -> bool {
    matches!(target, RentalStatus::Returned | RentalStatus::Cancelled)
}

/// Inclusive day count of a booking window, never less than one. A same-day
/// rental (start == end) is billed as a single day.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    ((end - start).num_days() + 1).max(1)
}

/// Total price for a booking window at the given daily rate.
pub fn quote(daily_rate: f64, start: NaiveDate, end: NaiveDate) -> f64 {
    daily_rate * inclusive_days(start, end) as f64
}

/// Booking date validation: the start date must not be in the past, the end
/// date must not precede the start date.
pub fn validate_dates(today: NaiveDate, start: NaiveDate, end: NaiveDate) -> Result<(), ApiError> {
    if start < today {
        return Err(ApiError::InvalidInput(
            "start date must not be in the past".to_string(),
        ));
    }
    if end < start {
        return Err(ApiError::InvalidInput(
            "end date must not be before start date".to_string(),
        ));
    }
    Ok(())
}

/// book
///
/// The booking operation. Validation order: car exists (NotFound), car
/// available (Conflict), dates sane (InvalidInput). On success the car hold
/// and the PENDING rental row are persisted as one atomic unit; the
/// availability check inside that unit is a compare-and-swap, so of two
/// concurrent bookings for the same car exactly one succeeds and the other
/// observes Conflict.
///
/// `today` and the acting user are explicit parameters; there is no ambient
/// clock or authentication context in here.
pub async fn book(
    repo: &RepositoryState,
    user_id: Uuid,
    req: &CreateRentalRequest,
    today: NaiveDate,
) -> Result<Rental, ApiError> {
    let car = repo
        .get_car(req.car_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("car {} not found", req.car_id)))?;

    if !car.available {
        return Err(ApiError::Conflict("car unavailable".to_string()));
    }

    validate_dates(today, req.start_date, req.end_date)?;

    let total_price = quote(car.daily_rate, req.start_date, req.end_date);

    repo.hold_car_and_create_rental(NewRental {
        car_id: car.id,
        user_id,
        start_date: req.start_date,
        end_date: req.end_date,
        total_price,
    })
    .await
}

/// transition
///
/// The status transition operation. Fails with NotFound for an unknown
/// rental, InvalidInput for an unknown target string, and InvalidInput
/// naming the (current, target) pair for a transition the table forbids.
///
/// The status write is guarded by the expected current status, so a rental
/// transitioned concurrently loses the race with a Conflict instead of
/// skipping a state.
pub async fn transition(
    repo: &RepositoryState,
    rental_id: i64,
    target: &str,
) -> Result<Rental, ApiError> {
    let rental = repo
        .get_rental(rental_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("rental {rental_id} not found")))?;

    let target: RentalStatus = target
        .parse()
        .map_err(|_| ApiError::InvalidInput(format!("unknown rental status: {target}")))?;

    if !allowed_targets(rental.status).contains(&target) {
        return Err(ApiError::InvalidInput(format!(
            "illegal status transition: {} -> {}",
            rental.status, target
        )));
    }

    repo.apply_transition(rental_id, rental.status, target, releases_car(target))
        .await
}
