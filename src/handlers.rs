use crate::{
    AppState, auth,
    auth::AuthUser,
    error::ApiError,
    lifecycle,
    models::{
        AuthResponse, Car, CreateCarRequest, CreateRentalRequest, FleetStats, LoginRequest,
        NewUser, Page, PageParams, PresignedUrlRequest, PresignedUrlResponse, RegisterRequest,
        Rental, Role, UpdateCarRequest, UpdateRentalStatusRequest, UpdateUserRoleRequest,
        UserResponse,
    },
    storage::sanitize_key,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

// --- Filter Structs ---

/// CarFilter
///
/// Accepted query parameters for the public car listing endpoint (GET /cars).
/// Used by Axum's Query extractor to safely bind HTTP query parameters.
#[derive(serde::Deserialize, utoipa::IntoParams)]
pub struct CarFilter {
    /// Optional case-insensitive substring match on brand or model.
    pub search: Option<String>,
    /// Optional availability filter.
    pub available: Option<bool>,
}

/// RentalFilter
///
/// Accepted query parameters for the admin rental listing (GET /admin/rentals).
#[derive(serde::Deserialize, utoipa::IntoParams)]
pub struct RentalFilter {
    /// Matches the renter's username or the car's brand.
    pub term: Option<String>,
    /// Exact status filter, e.g. "PICKED_UP". The sentinel "ALL"
    /// (case-insensitive) means no filter, same as leaving it out.
    pub status: Option<String>,
}

/// require_admin
///
/// RBAC gate used by every handler mounted under /admin. The authentication
/// middleware only proves identity; role enforcement happens here.
fn require_admin(auth: &AuthUser) -> Result<(), ApiError> {
    if auth.role != Role::Admin {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

// --- Auth Handlers ---

/// register
///
/// [Public Route] Creates a new account. Every self-registered account is a
/// CUSTOMER; roles are only elevated through the admin user endpoints. The
/// password is hashed before it ever reaches the repository, and the
/// response logs the caller straight in with a fresh token.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account Created", body = AuthResponse),
        (status = 400, description = "Missing Fields"),
        (status = 409, description = "Username Or Email Taken")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    if payload.username.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.password.is_empty()
    {
        return Err(ApiError::InvalidInput(
            "username, email and password are required".to_string(),
        ));
    }

    let password_hash = auth::hash_password(&payload.password)?;
    let user = state
        .repo
        .create_user(NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
            role: Role::Customer,
        })
        .await?;

    let token = auth::issue_token(&state.config, user.id)?;
    tracing::info!(username = %user.username, "new account registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            username: user.username,
            role: user.role,
        }),
    ))
}

/// login
///
/// [Public Route] Verifies credentials and issues a signed JWT. A missing
/// user and a wrong password produce the identical 401 so the endpoint
/// cannot be used to enumerate usernames.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 401, description = "Invalid Credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state
        .repo
        .get_user_by_username(&payload.username)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !auth::verify_password(&payload.password, &user.password_hash) {
        return Err(ApiError::Unauthorized);
    }

    let token = auth::issue_token(&state.config, user.id)?;
    Ok(Json(AuthResponse {
        token,
        username: user.username,
        role: user.role,
    }))
}

/// get_me
///
/// [Authenticated Route] Returns the caller's own profile, resolved from
/// the token by the `AuthUser` extractor.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "My Profile", body = UserResponse))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
    Ok(Json(UserResponse::from(user)))
}

// --- Car Handlers ---

/// list_cars
///
/// [Public Route] Paginated fleet listing with optional search and
/// availability filters, so anonymous visitors can browse before signing up.
#[utoipa::path(
    get,
    path = "/cars",
    params(CarFilter, PageParams),
    responses((status = 200, description = "Car Page", body = Page<Car>))
)]
pub async fn list_cars(
    State(state): State<AppState>,
    Query(filter): Query<CarFilter>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<Car>>, ApiError> {
    let cars = state
        .repo
        .list_cars(filter.search, filter.available, page)
        .await?;
    Ok(Json(cars))
}

/// get_car
///
/// [Public Route] Retrieves a single car by id.
#[utoipa::path(
    get,
    path = "/cars/{id}",
    responses(
        (status = 200, description = "Car", body = Car),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Car>, ApiError> {
    let car = state
        .repo
        .get_car(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("car {id} not found")))?;
    Ok(Json(car))
}

/// create_car
///
/// [Admin Route] Adds a car to the fleet. New cars always enter as
/// available; the flag is owned by the rental lifecycle from then on.
#[utoipa::path(
    post,
    path = "/admin/cars",
    request_body = CreateCarRequest,
    responses(
        (status = 201, description = "Car Created", body = Car),
        (status = 403, description = "Not Admin")
    )
)]
pub async fn create_car(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCarRequest>,
) -> Result<(StatusCode, Json<Car>), ApiError> {
    require_admin(&auth)?;

    if payload.brand.trim().is_empty() || payload.model.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "brand and model are required".to_string(),
        ));
    }
    if payload.daily_rate <= 0.0 {
        return Err(ApiError::InvalidInput(
            "daily_rate must be positive".to_string(),
        ));
    }

    let car = state.repo.create_car(payload).await?;
    tracing::info!(car_id = %car.id, brand = %car.brand, "car added to fleet");
    Ok((StatusCode::CREATED, Json(car)))
}

/// update_car
///
/// [Admin Route] Partial update of a car's descriptive fields. Availability
/// is not accepted here; it only moves through rental transitions.
#[utoipa::path(
    put,
    path = "/admin/cars/{id}",
    request_body = UpdateCarRequest,
    responses(
        (status = 200, description = "Updated", body = Car),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_car(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCarRequest>,
) -> Result<Json<Car>, ApiError> {
    require_admin(&auth)?;

    if payload.daily_rate.is_some_and(|r| r <= 0.0) {
        return Err(ApiError::InvalidInput(
            "daily_rate must be positive".to_string(),
        ));
    }

    // When the image is being replaced, remember the old key so the stale
    // object can be removed after the row is updated.
    let replaced_key = if payload.image_key.is_some() {
        state.repo.get_car(id).await?.and_then(|c| c.image_key)
    } else {
        None
    };

    let car = state
        .repo
        .update_car(id, payload)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("car {id} not found")))?;

    if let Some(old_key) = replaced_key.filter(|k| Some(k) != car.image_key.as_ref()) {
        if let Err(e) = state.storage.delete_object(&old_key).await {
            tracing::warn!(car_id = %id, key = %old_key, error = %e, "failed to delete replaced car image");
        }
    }

    Ok(Json(car))
}

/// delete_car
///
/// [Admin Route] Removes a car from the fleet and cleans up its stored
/// image. A storage failure during cleanup is logged but does not fail the
/// request; the database row is already gone.
#[utoipa::path(
    delete,
    path = "/admin/cars/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_car(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_admin(&auth)?;

    let car = state
        .repo
        .delete_car(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("car {id} not found")))?;

    if let Some(key) = car.image_key {
        if let Err(e) = state.storage.delete_object(&key).await {
            tracing::warn!(car_id = %id, key = %key, error = %e, "failed to delete car image");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// get_presigned_url
///
/// [Admin Route] Issues a short-lived direct-to-bucket upload URL for a car
/// photo. The object key is namespaced under `cars/` with a random UUID so
/// uploads can never collide or overwrite each other.
#[utoipa::path(
    post,
    path = "/admin/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "Presigned URL", body = PresignedUrlResponse),
        (status = 403, description = "Not Admin")
    )
)]
pub async fn get_presigned_url(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> Result<Json<PresignedUrlResponse>, ApiError> {
    require_admin(&auth)?;

    let filename = sanitize_key(&payload.filename);
    if filename.is_empty() {
        return Err(ApiError::InvalidInput("invalid filename".to_string()));
    }
    let key = format!("cars/{}/{}", Uuid::new_v4(), filename);

    let upload_url = state
        .storage
        .get_presigned_upload_url(&key, &payload.file_type)
        .await
        .map_err(ApiError::Internal)?;

    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: key,
    }))
}

// --- Rental Handlers ---

/// create_rental
///
/// [Authenticated Route] Books a car for the caller. Validation, pricing and
/// the atomic availability hold all live in the lifecycle module; this
/// handler only supplies the identity and today's date.
#[utoipa::path(
    post,
    path = "/rentals",
    request_body = CreateRentalRequest,
    responses(
        (status = 201, description = "Rental Booked", body = Rental),
        (status = 400, description = "Invalid Dates"),
        (status = 404, description = "Car Not Found"),
        (status = 409, description = "Car Unavailable")
    )
)]
pub async fn create_rental(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateRentalRequest>,
) -> Result<(StatusCode, Json<Rental>), ApiError> {
    let today = Utc::now().date_naive();
    let rental = lifecycle::book(&state.repo, user_id, &payload, today).await?;
    tracing::info!(rental_id = rental.id, car_id = %rental.car_id, "rental booked");
    Ok((StatusCode::CREATED, Json(rental)))
}

/// my_rentals
///
/// [Authenticated Route] Lists the caller's own rental history, oldest first.
#[utoipa::path(
    get,
    path = "/rentals/me",
    responses((status = 200, description = "My Rentals", body = [Rental]))
)]
pub async fn my_rentals(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Rental>>, ApiError> {
    let rentals = state.repo.rentals_for_user(id).await?;
    Ok(Json(rentals))
}

/// list_rentals
///
/// [Admin Route] Paginated listing of all rentals with search over the
/// renter's username and the car's brand, plus an exact status filter.
#[utoipa::path(
    get,
    path = "/admin/rentals",
    params(RentalFilter, PageParams),
    responses((status = 200, description = "Rental Page", body = Page<Rental>))
)]
pub async fn list_rentals(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<RentalFilter>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<Rental>>, ApiError> {
    require_admin(&auth)?;

    // "ALL" is the frontend's everything-selected dropdown value, not a
    // real status; treat it like an absent filter.
    let status = filter
        .status
        .as_deref()
        .filter(|s| !s.eq_ignore_ascii_case("ALL"))
        .map(|s| {
            s.parse()
                .map_err(|_| ApiError::InvalidInput(format!("unknown rental status: {s}")))
        })
        .transpose()?;

    let rentals = state.repo.list_rentals(filter.term, status, page).await?;
    Ok(Json(rentals))
}

/// update_rental_status
///
/// [Admin Route] Drives a rental through its lifecycle. The transition
/// table and the car-availability side effects are enforced by the
/// lifecycle module.
#[utoipa::path(
    put,
    path = "/admin/rentals/{id}/status",
    request_body = UpdateRentalStatusRequest,
    responses(
        (status = 200, description = "Transitioned", body = Rental),
        (status = 400, description = "Illegal Transition"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Concurrent Modification")
    )
)]
pub async fn update_rental_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRentalStatusRequest>,
) -> Result<Json<Rental>, ApiError> {
    require_admin(&auth)?;

    let rental = lifecycle::transition(&state.repo, id, &payload.status).await?;
    tracing::info!(rental_id = id, status = %rental.status, "rental transitioned");
    Ok(Json(rental))
}

// --- User Administration Handlers ---

/// list_users
///
/// [Admin Route] Full user directory, without password hashes.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "Users", body = [UserResponse]))
)]
pub async fn list_users(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_admin(&auth)?;

    let users = state.repo.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// set_user_role
///
/// [Admin Route] Promotes or demotes an account. Self-demotion is rejected
/// so an instance can never lock out its last administrator by accident.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    request_body = UpdateUserRoleRequest,
    responses(
        (status = 200, description = "Role Updated", body = UserResponse),
        (status = 400, description = "Self Demotion"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn set_user_role(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_admin(&auth)?;

    if id == auth.id && payload.role != Role::Admin {
        return Err(ApiError::InvalidInput(
            "cannot demote your own account".to_string(),
        ));
    }

    let user = state
        .repo
        .set_user_role(id, payload.role)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
    tracing::info!(user_id = %id, role = ?user.role, "user role changed");
    Ok(Json(UserResponse::from(user)))
}

/// delete_user
///
/// [Admin Route] Removes an account. Self-deletion is rejected for the same
/// reason as self-demotion.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Self Deletion"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_admin(&auth)?;

    if id == auth.id {
        return Err(ApiError::InvalidInput(
            "cannot delete your own account".to_string(),
        ));
    }

    if state.repo.delete_user(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("user {id} not found")))
    }
}

// --- Dashboard Handler ---

/// get_stats
///
/// [Admin Route] Fleet-wide counters for the dashboard.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses((status = 200, description = "Fleet Stats", body = FleetStats))
)]
pub async fn get_stats(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FleetStats>, ApiError> {
    require_admin(&auth)?;

    let stats = state.repo.get_stats().await?;
    Ok(Json(stats))
}
