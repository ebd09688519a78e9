use crate::error::ApiError;
use crate::models::{
    Car, CreateCarRequest, FleetStats, NewRental, NewUser, Page, PageParams, Rental, RentalStatus,
    Role, UpdateCarRequest, User,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Repository Trait
///
/// The abstract contract for all persistence operations, shared across the
/// application as `Arc<dyn Repository>`. Handlers and the lifecycle manager
/// never see a connection pool directly, which is what lets the tests run
/// against `MemoryRepository` with identical semantics.
///
/// The two lifecycle-critical methods (`hold_car_and_create_rental`,
/// `apply_transition`) are *transactional primitives*: each executes its
/// side effects as one atomic unit against the store. The decisions about
/// which effects to apply stay in the `lifecycle` module.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Car inventory ---
    /// Paginated listing with an optional case-insensitive brand/model search
    /// term and an optional availability filter. Ordered by id.
    async fn list_cars(
        &self,
        search: Option<String>,
        available: Option<bool>,
        page: PageParams,
    ) -> Result<Page<Car>, ApiError>;
    async fn get_car(&self, id: Uuid) -> Result<Option<Car>, ApiError>;
    async fn create_car(&self, req: CreateCarRequest) -> Result<Car, ApiError>;
    /// Partial update (COALESCE semantics). Never touches the availability
    /// flag. Returns None if the car does not exist.
    async fn update_car(&self, id: Uuid, req: UpdateCarRequest) -> Result<Option<Car>, ApiError>;
    /// Deletes a car and returns the removed row so the caller can clean up
    /// the stored image object.
    async fn delete_car(&self, id: Uuid) -> Result<Option<Car>, ApiError>;

    // --- User directory ---
    async fn list_users(&self) -> Result<Vec<User>, ApiError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, ApiError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError>;
    /// Fails with Conflict on a duplicate username or email.
    async fn create_user(&self, user: NewUser) -> Result<User, ApiError>;
    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>, ApiError>;
    async fn delete_user(&self, id: Uuid) -> Result<bool, ApiError>;

    // --- Rentals ---
    /// Atomically marks the car unavailable and inserts the PENDING rental.
    /// The availability hold is a compare-and-swap: if the car is no longer
    /// available by the time the transaction runs, the whole unit fails with
    /// Conflict and nothing is persisted.
    async fn hold_car_and_create_rental(&self, new: NewRental) -> Result<Rental, ApiError>;
    async fn get_rental(&self, id: i64) -> Result<Option<Rental>, ApiError>;
    /// Atomically writes the new status (guarded by the expected current
    /// status) and, when `reevaluate` is set, re-derives the car's
    /// availability: if no other rental of the same car is active, the car
    /// is released back to the pool. Fails with Conflict if the rental's
    /// status changed concurrently.
    async fn apply_transition(
        &self,
        rental_id: i64,
        expected: RentalStatus,
        target: RentalStatus,
        reevaluate: bool,
    ) -> Result<Rental, ApiError>;
    /// Paginated listing for the admin screen. `term` matches the renter's
    /// username or the car's brand (case-insensitive substring); `status`
    /// filters exactly. Ordered by id.
    async fn list_rentals(
        &self,
        term: Option<String>,
        status: Option<RentalStatus>,
        page: PageParams,
    ) -> Result<Page<Rental>, ApiError>;
    async fn rentals_for_user(&self, user_id: Uuid) -> Result<Vec<Rental>, ApiError>;

    // --- Dashboard ---
    async fn get_stats(&self) -> Result<FleetStats, ApiError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The production implementation, backed by PostgreSQL. All queries are
/// runtime-checked (`query_as` / `QueryBuilder` with bound parameters), so
/// the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CAR_COLUMNS: &str =
    "id, brand, model, year, license_plate, daily_rate, available, image_key, created_at, updated_at";

const USER_COLUMNS: &str = "id, username, password_hash, email, role, created_at";

/// Rental rows are always read through the user/car JOIN so the admin search
/// columns come back populated.
const RENTAL_SELECT: &str = r#"
    SELECT r.id, r.car_id, r.user_id, r.start_date, r.end_date,
           r.total_price, r.status, r.created_at,
           u.username AS username, c.brand AS car_brand, c.model AS car_model
    FROM rentals r
    JOIN users u ON r.user_id = u.id
    JOIN cars c ON r.car_id = c.id
"#;

/// Appends the shared car listing predicates to both the page query and the
/// count query so the total stays consistent with the filter.
fn push_car_filters(
    builder: &mut QueryBuilder<'_, sqlx::Postgres>,
    search: &Option<String>,
    available: Option<bool>,
) {
    if let Some(a) = available {
        builder.push(" AND available = ");
        builder.push_bind(a);
    }
    if let Some(s) = search {
        let pattern = format!("%{}%", s);
        builder.push(" AND (brand ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR model ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

fn push_rental_filters(
    builder: &mut QueryBuilder<'_, sqlx::Postgres>,
    term: &Option<String>,
    status: Option<RentalStatus>,
) {
    if let Some(status) = status {
        builder.push(" AND r.status = ");
        builder.push_bind(status);
    }
    if let Some(t) = term {
        let pattern = format!("%{}%", t);
        builder.push(" AND (u.username ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR c.brand ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_cars(
        &self,
        search: Option<String>,
        available: Option<bool>,
        page: PageParams,
    ) -> Result<Page<Car>, ApiError> {
        let mut count: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM cars WHERE TRUE");
        push_car_filters(&mut count, &search, available);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {CAR_COLUMNS} FROM cars WHERE TRUE"));
        push_car_filters(&mut builder, &search, available);
        builder.push(" ORDER BY id ASC LIMIT ");
        builder.push_bind(page.size());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let cars = builder.build_query_as::<Car>().fetch_all(&self.pool).await?;
        Ok(Page::new(cars, page.page(), page.size(), total))
    }

    async fn get_car(&self, id: Uuid) -> Result<Option<Car>, ApiError> {
        let car = sqlx::query_as::<_, Car>(&format!(
            "SELECT {CAR_COLUMNS} FROM cars WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(car)
    }

    async fn create_car(&self, req: CreateCarRequest) -> Result<Car, ApiError> {
        let car = sqlx::query_as::<_, Car>(&format!(
            r#"INSERT INTO cars (id, brand, model, year, license_plate, daily_rate, available, image_key, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, true, $7, NOW(), NOW())
               RETURNING {CAR_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(&req.brand)
        .bind(&req.model)
        .bind(req.year)
        .bind(&req.license_plate)
        .bind(req.daily_rate)
        .bind(&req.image_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(car)
    }

    async fn update_car(&self, id: Uuid, req: UpdateCarRequest) -> Result<Option<Car>, ApiError> {
        // COALESCE keeps columns untouched when the corresponding field is
        // None. The availability flag is deliberately absent here.
        let car = sqlx::query_as::<_, Car>(&format!(
            r#"UPDATE cars
               SET brand = COALESCE($2, brand),
                   model = COALESCE($3, model),
                   year = COALESCE($4, year),
                   license_plate = COALESCE($5, license_plate),
                   daily_rate = COALESCE($6, daily_rate),
                   image_key = COALESCE($7, image_key),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {CAR_COLUMNS}"#
        ))
        .bind(id)
        .bind(&req.brand)
        .bind(&req.model)
        .bind(req.year)
        .bind(&req.license_plate)
        .bind(req.daily_rate)
        .bind(&req.image_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(car)
    }

    async fn delete_car(&self, id: Uuid) -> Result<Option<Car>, ApiError> {
        let car = sqlx::query_as::<_, Car>(&format!(
            "DELETE FROM cars WHERE id = $1 RETURNING {CAR_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(car)
    }

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, ApiError> {
        let result = sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO users (id, username, password_hash, email, role, created_at)
               VALUES ($1, $2, $3, $4, $5, NOW())
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(ApiError::Conflict(
                "username or email already taken".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, ApiError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn hold_car_and_create_rental(&self, new: NewRental) -> Result<Rental, ApiError> {
        let mut tx = self.pool.begin().await?;

        // Compare-and-swap hold: two concurrent bookings both reach this
        // UPDATE, but only one matches `available = true`.
        let held = sqlx::query(
            "UPDATE cars SET available = false, updated_at = NOW() WHERE id = $1 AND available = true",
        )
        .bind(new.car_id)
        .execute(&mut *tx)
        .await?;

        if held.rows_affected() == 0 {
            // Dropping the transaction rolls it back.
            return Err(ApiError::Conflict("car unavailable".to_string()));
        }

        let rental = sqlx::query_as::<_, Rental>(
            r#"INSERT INTO rentals (car_id, user_id, start_date, end_date, total_price, status, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, NOW())
               RETURNING id, car_id, user_id, start_date, end_date, total_price, status, created_at"#,
        )
        .bind(new.car_id)
        .bind(new.user_id)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.total_price)
        .bind(RentalStatus::Pending)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rental)
    }

    async fn get_rental(&self, id: i64) -> Result<Option<Rental>, ApiError> {
        let rental = sqlx::query_as::<_, Rental>(&format!("{RENTAL_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(rental)
    }

    async fn apply_transition(
        &self,
        rental_id: i64,
        expected: RentalStatus,
        target: RentalStatus,
        reevaluate: bool,
    ) -> Result<Rental, ApiError> {
        let mut tx = self.pool.begin().await?;

        // Guarded write: a concurrent transition that already moved the
        // rental off `expected` makes this a no-op and the caller loses.
        let rental = sqlx::query_as::<_, Rental>(
            r#"UPDATE rentals SET status = $1 WHERE id = $2 AND status = $3
               RETURNING id, car_id, user_id, start_date, end_date, total_price, status, created_at"#,
        )
        .bind(target)
        .bind(rental_id)
        .bind(expected)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ApiError::Conflict(format!("rental {rental_id} was modified concurrently"))
        })?;

        if reevaluate {
            let active: i64 = sqlx::query_scalar(
                r#"SELECT COUNT(*) FROM rentals
                   WHERE car_id = $1 AND id <> $2
                     AND status IN ('PENDING', 'CONFIRMED', 'PICKED_UP')"#,
            )
            .bind(rental.car_id)
            .bind(rental_id)
            .fetch_one(&mut *tx)
            .await?;

            if active == 0 {
                sqlx::query("UPDATE cars SET available = true, updated_at = NOW() WHERE id = $1")
                    .bind(rental.car_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(rental)
    }

    async fn list_rentals(
        &self,
        term: Option<String>,
        status: Option<RentalStatus>,
        page: PageParams,
    ) -> Result<Page<Rental>, ApiError> {
        let mut count: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"SELECT COUNT(*) FROM rentals r
               JOIN users u ON r.user_id = u.id
               JOIN cars c ON r.car_id = c.id
               WHERE TRUE"#,
        );
        push_rental_filters(&mut count, &term, status);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("{RENTAL_SELECT} WHERE TRUE"));
        push_rental_filters(&mut builder, &term, status);
        builder.push(" ORDER BY r.id ASC LIMIT ");
        builder.push_bind(page.size());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let rentals = builder
            .build_query_as::<Rental>()
            .fetch_all(&self.pool)
            .await?;
        Ok(Page::new(rentals, page.page(), page.size(), total))
    }

    async fn rentals_for_user(&self, user_id: Uuid) -> Result<Vec<Rental>, ApiError> {
        let rentals = sqlx::query_as::<_, Rental>(&format!(
            "{RENTAL_SELECT} WHERE r.user_id = $1 ORDER BY r.id ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rentals)
    }

    async fn get_stats(&self) -> Result<FleetStats, ApiError> {
        let total_cars: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cars")
            .fetch_one(&self.pool)
            .await?;
        let available_cars: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cars WHERE available = true")
                .fetch_one(&self.pool)
                .await?;
        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let active_rentals: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM rentals WHERE status IN ('PENDING', 'CONFIRMED', 'PICKED_UP')",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(FleetStats {
            total_cars,
            available_cars,
            total_users,
            active_rentals,
        })
    }
}

// --- In-Memory Implementation (For Tests) ---

#[derive(Default)]
struct MemoryInner {
    cars: Vec<Car>,
    users: Vec<User>,
    rentals: Vec<Rental>,
    next_rental_id: i64,
}

/// MemoryRepository
///
/// A full in-memory implementation of `Repository` used by the integration
/// tests, mirroring how `MockStorageService` stands in for the S3 client.
/// The single mutex makes every operation atomic, which is exactly the
/// isolation the transactional primitives promise.
#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<MemoryInner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T: Clone>(items: &[T], page: PageParams) -> Page<T> {
    let total = items.len() as i64;
    let slice: Vec<T> = items
        .iter()
        .skip(page.offset() as usize)
        .take(page.size() as usize)
        .cloned()
        .collect();
    Page::new(slice, page.page(), page.size(), total)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_cars(
        &self,
        search: Option<String>,
        available: Option<bool>,
        page: PageParams,
    ) -> Result<Page<Car>, ApiError> {
        let inner = self.inner.lock().unwrap();
        let mut cars: Vec<Car> = inner
            .cars
            .iter()
            .filter(|c| available.is_none_or(|a| c.available == a))
            .filter(|c| {
                search
                    .as_deref()
                    .is_none_or(|s| contains_ci(&c.brand, s) || contains_ci(&c.model, s))
            })
            .cloned()
            .collect();
        cars.sort_by_key(|c| c.id);
        Ok(paginate(&cars, page))
    }

    async fn get_car(&self, id: Uuid) -> Result<Option<Car>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.cars.iter().find(|c| c.id == id).cloned())
    }

    async fn create_car(&self, req: CreateCarRequest) -> Result<Car, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let car = Car {
            id: Uuid::new_v4(),
            brand: req.brand,
            model: req.model,
            year: req.year,
            license_plate: req.license_plate,
            daily_rate: req.daily_rate,
            available: true,
            image_key: req.image_key,
            created_at: now,
            updated_at: now,
        };
        inner.cars.push(car.clone());
        Ok(car)
    }

    async fn update_car(&self, id: Uuid, req: UpdateCarRequest) -> Result<Option<Car>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(car) = inner.cars.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(brand) = req.brand {
            car.brand = brand;
        }
        if let Some(model) = req.model {
            car.model = model;
        }
        if let Some(year) = req.year {
            car.year = year;
        }
        if let Some(plate) = req.license_plate {
            car.license_plate = plate;
        }
        if let Some(rate) = req.daily_rate {
            car.daily_rate = rate;
        }
        if let Some(key) = req.image_key {
            car.image_key = Some(key);
        }
        car.updated_at = Utc::now();
        Ok(Some(car.clone()))
    }

    async fn delete_car(&self, id: Uuid) -> Result<Option<Car>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let pos = inner.cars.iter().position(|c| c.id == id);
        Ok(pos.map(|i| inner.cars.remove(i)))
    }

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.clone())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(ApiError::Conflict(
                "username or email already taken".to_string(),
            ));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            password_hash: user.password_hash,
            email: user.email,
            role: user.role,
            created_at: Utc::now(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.role = role;
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.users.len();
        inner.users.retain(|u| u.id != id);
        Ok(inner.users.len() < before)
    }

    async fn hold_car_and_create_rental(&self, new: NewRental) -> Result<Rental, ApiError> {
        // One lock acquisition for check + hold + insert: atomic, like the
        // Postgres transaction.
        let mut inner = self.inner.lock().unwrap();

        let username = inner
            .users
            .iter()
            .find(|u| u.id == new.user_id)
            .map(|u| u.username.clone());

        let Some(car) = inner.cars.iter_mut().find(|c| c.id == new.car_id) else {
            return Err(ApiError::NotFound(format!("car {} not found", new.car_id)));
        };
        if !car.available {
            return Err(ApiError::Conflict("car unavailable".to_string()));
        }
        car.available = false;
        let (car_brand, car_model) = (car.brand.clone(), car.model.clone());

        inner.next_rental_id += 1;
        let rental = Rental {
            id: inner.next_rental_id,
            car_id: new.car_id,
            user_id: new.user_id,
            start_date: new.start_date,
            end_date: new.end_date,
            total_price: new.total_price,
            status: RentalStatus::Pending,
            created_at: Utc::now(),
            username,
            car_brand: Some(car_brand),
            car_model: Some(car_model),
        };
        inner.rentals.push(rental.clone());
        Ok(rental)
    }

    async fn get_rental(&self, id: i64) -> Result<Option<Rental>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rentals.iter().find(|r| r.id == id).cloned())
    }

    async fn apply_transition(
        &self,
        rental_id: i64,
        expected: RentalStatus,
        target: RentalStatus,
        reevaluate: bool,
    ) -> Result<Rental, ApiError> {
        let mut inner = self.inner.lock().unwrap();

        let Some(rental) = inner.rentals.iter_mut().find(|r| r.id == rental_id) else {
            return Err(ApiError::NotFound(format!("rental {rental_id} not found")));
        };
        if rental.status != expected {
            return Err(ApiError::Conflict(format!(
                "rental {rental_id} was modified concurrently"
            )));
        }
        rental.status = target;
        let (car_id, updated) = (rental.car_id, rental.clone());

        if reevaluate {
            let other_active = inner
                .rentals
                .iter()
                .any(|r| r.car_id == car_id && r.id != rental_id && r.status.is_active());
            if !other_active {
                if let Some(car) = inner.cars.iter_mut().find(|c| c.id == car_id) {
                    car.available = true;
                }
            }
        }

        Ok(updated)
    }

    async fn list_rentals(
        &self,
        term: Option<String>,
        status: Option<RentalStatus>,
        page: PageParams,
    ) -> Result<Page<Rental>, ApiError> {
        let inner = self.inner.lock().unwrap();
        let mut rentals: Vec<Rental> = inner
            .rentals
            .iter()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .filter(|r| {
                term.as_deref().is_none_or(|t| {
                    r.username.as_deref().is_some_and(|u| contains_ci(u, t))
                        || r.car_brand.as_deref().is_some_and(|b| contains_ci(b, t))
                })
            })
            .cloned()
            .collect();
        rentals.sort_by_key(|r| r.id);
        Ok(paginate(&rentals, page))
    }

    async fn rentals_for_user(&self, user_id: Uuid) -> Result<Vec<Rental>, ApiError> {
        let inner = self.inner.lock().unwrap();
        let mut rentals: Vec<Rental> = inner
            .rentals
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rentals.sort_by_key(|r| r.id);
        Ok(rentals)
    }

    async fn get_stats(&self) -> Result<FleetStats, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(FleetStats {
            total_cars: inner.cars.len() as i64,
            available_cars: inner.cars.iter().filter(|c| c.available).count() as i64,
            total_users: inner.users.len() as i64,
            active_rentals: inner.rentals.iter().filter(|r| r.status.is_active()).count() as i64,
        })
    }
}
