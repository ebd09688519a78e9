use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The RBAC field stored on every user record. Stored in Postgres as the
/// `user_role` enum type; serialized to JSON in SCREAMING_SNAKE_CASE to match
/// the frontend's expectations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

/// RentalStatus
///
/// Closed enumeration of the rental lifecycle states. The legal transitions
/// between these states are owned by the `lifecycle` module; nothing else in
/// the application writes the status column.
///
/// An *active* status (PENDING, CONFIRMED, PICKED_UP) holds the rented car
/// unavailable. Stored in Postgres as the `rental_status` enum type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "rental_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum RentalStatus {
    #[default]
    Pending,
    Confirmed,
    PickedUp,
    Returned,
    Overdue,
    Cancelled,
    Completed,
}

impl RentalStatus {
    /// All states, in declaration order. Used by the exhaustive transition
    /// table tests.
    pub const ALL: [RentalStatus; 7] = [
        RentalStatus::Pending,
        RentalStatus::Confirmed,
        RentalStatus::PickedUp,
        RentalStatus::Returned,
        RentalStatus::Overdue,
        RentalStatus::Cancelled,
        RentalStatus::Completed,
    ];

    /// A rental in an active state holds its car unavailable.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RentalStatus::Pending | RentalStatus::Confirmed | RentalStatus::PickedUp
        )
    }

    /// The wire representation, identical to the Postgres enum label.
    pub fn as_str(self) -> &'static str {
        match self {
            RentalStatus::Pending => "PENDING",
            RentalStatus::Confirmed => "CONFIRMED",
            RentalStatus::PickedUp => "PICKED_UP",
            RentalStatus::Returned => "RETURNED",
            RentalStatus::Overdue => "OVERDUE",
            RentalStatus::Cancelled => "CANCELLED",
            RentalStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RentalStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RentalStatus::Pending),
            "CONFIRMED" => Ok(RentalStatus::Confirmed),
            "PICKED_UP" => Ok(RentalStatus::PickedUp),
            "RETURNED" => Ok(RentalStatus::Returned),
            "OVERDUE" => Ok(RentalStatus::Overdue),
            "CANCELLED" => Ok(RentalStatus::Cancelled),
            "COMPLETED" => Ok(RentalStatus::Completed),
            _ => Err(()),
        }
    }
}

/// Car
///
/// A fleet vehicle record from the `cars` table.
///
/// The `available` flag is mutated exclusively by the rental lifecycle in
/// response to state transitions. Inventory edits (`UpdateCarRequest`) do not
/// carry the flag, so an admin cannot flip it out from under an active rental.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Car {
    pub id: Uuid,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub license_plate: String,
    /// Rental price per day, in the shop currency.
    pub daily_rate: f64,
    /// True iff no rental referencing this car is in an active state.
    pub available: bool,
    /// Object key of the car photo in the storage bucket, if one was uploaded.
    pub image_key: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// User
///
/// Internal user record from the `users` table. Carries the argon2 password
/// hash, so it is never serialized directly; API responses use `UserResponse`.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// NewUser
///
/// Insertion payload for the user directory. Built by the register handler
/// (role CUSTOMER, hashed password) or by test seeding.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub role: Role,
}

/// UserResponse
///
/// The public projection of a user record (no password hash).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Rental
///
/// A booking record from the `rentals` table, enriched on read with the
/// renter's username and the car's brand/model (JOIN columns, used by the
/// admin search screen).
///
/// Rows are created only through the booking operation, and the status column
/// is written only through the lifecycle transition.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Rental {
    // BigInt id: rentals are the high-volume table.
    pub id: i64,
    pub car_id: Uuid,
    pub user_id: Uuid,
    #[ts(type = "string")]
    pub start_date: NaiveDate,
    #[ts(type = "string")]
    pub end_date: NaiveDate,
    /// daily_rate * inclusive day count, computed at booking time.
    pub total_price: f64,
    pub status: RentalStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,

    // Loaded via JOINs in the repository queries.
    #[sqlx(default)]
    pub username: Option<String>,
    #[sqlx(default)]
    pub car_brand: Option<String>,
    #[sqlx(default)]
    pub car_model: Option<String>,
}

/// NewRental
///
/// Insertion payload produced by the lifecycle manager after validation and
/// pricing. Persisted atomically together with the car-availability hold.
#[derive(Debug, Clone, Default)]
pub struct NewRental {
    pub car_id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price: f64,
}

// --- Pagination ---

/// Page
///
/// Generic pagination envelope returned by every listing endpoint. Ordering
/// is stable (by id ascending) so that pages do not shuffle between requests.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Zero-based page index that was requested.
    pub page: i64,
    pub size: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: i64, size: i64, total_items: i64) -> Self {
        let total_pages = if total_items == 0 {
            0
        } else {
            (total_items + size - 1) / size
        };
        Page {
            items,
            page,
            size,
            total_items,
            total_pages,
        }
    }
}

/// PageParams
///
/// Query parameters shared by all paginated endpoints. Defaults: page 0,
/// 10 items per page.
#[derive(Debug, Clone, Copy, Default, Deserialize, utoipa::IntoParams)]
pub struct PageParams {
    /// Zero-based page index.
    pub page: Option<i64>,
    /// Page size, clamped to 1..=100.
    pub size: Option<i64>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(0).max(0)
    }

    pub fn size(&self) -> i64 {
        self.size.unwrap_or(10).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        self.page() * self.size()
    }
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input for POST /auth/register. The password is argon2-hashed before it
/// touches the database and is never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// LoginRequest
///
/// Input for POST /auth/login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// AuthResponse
///
/// Output of both auth endpoints: a signed bearer token plus the identity
/// fields the frontend keeps in its session context.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub username: String,
    pub role: Role,
}

/// CreateCarRequest
///
/// Input payload for adding a car to the fleet (POST /admin/cars). The
/// `image_key` is the object key returned by the presigned-upload flow, if
/// the admin attached a photo. New cars always start available.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCarRequest {
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub license_plate: String,
    pub daily_rate: f64,
    pub image_key: Option<String>,
}

/// UpdateCarRequest
///
/// Partial update payload for PUT /admin/cars/{id}. All fields optional;
/// only provided fields are written (COALESCE at the repository layer).
///
/// Deliberately has no `available` field: availability belongs to the rental
/// lifecycle, not to inventory edits.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCarRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_rate: Option<f64>,

    /// Replaces the stored image key; the previous object is deleted from
    /// storage by the handler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
}

/// CreateRentalRequest
///
/// Input payload for the booking operation (POST /rentals). The acting user
/// and the total price are resolved server-side; the client never sends them.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateRentalRequest {
    pub car_id: Uuid,
    #[ts(type = "string")]
    pub start_date: NaiveDate,
    #[ts(type = "string")]
    pub end_date: NaiveDate,
}

/// UpdateRentalStatusRequest
///
/// Input payload for PUT /admin/rentals/{id}/status. The target is carried
/// as a free-form string on the wire and validated against the closed
/// `RentalStatus` enum by the lifecycle manager.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateRentalStatusRequest {
    pub status: String,
}

/// UpdateUserRoleRequest
///
/// Input payload for PUT /admin/users/{id}/role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateUserRoleRequest {
    pub role: Role,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL for a car photo
/// (POST /admin/upload/presigned).
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "corolla.jpg")]
    pub filename: String,
    /// The MIME type, used to constrain the upload to the declared type.
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

/// PresignedUrlResponse
///
/// Output schema containing the temporary URL for the direct-to-bucket PUT
/// and the object key to reference in `CreateCarRequest.image_key`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    pub resource_key: String,
}

// --- Dashboard Schemas (Output) ---

/// FleetStats
///
/// Output schema for the administrative dashboard (GET /admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct FleetStats {
    pub total_cars: i64,
    pub available_cars: i64,
    pub total_users: i64,
    /// Rentals currently in PENDING, CONFIRMED or PICKED_UP.
    pub active_rentals: i64,
}
