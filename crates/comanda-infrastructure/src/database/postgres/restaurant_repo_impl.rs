// ============================================================================
// Comanda Infrastructure - PostgreSQL Restaurant Repository
// File: crates/comanda-infrastructure/src/database/postgres/restaurant_repo_impl.rs
// ============================================================================
//! Tenant registry on PostgreSQL.
//!
//! Port and subdomain allocation run inside a transaction holding a
//! transaction-scoped advisory lock, so concurrent control-plane workers (or
//! several control-plane processes) serialize the read-compute-write. The
//! UNIQUE constraints on `puerto` and `subdominio` stay as a backstop; a
//! violation of either is retried with the same jittered backoff.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{error, info, warn};
use uuid::Uuid;

use comanda_core::allocator::{conflict_backoff, next_available_port, PortRange, MAX_ALLOCATION_ATTEMPTS};
use comanda_core::domain::{NewRestaurant, Restaurant, RestaurantPatch, SubscriptionStatus};
use comanda_core::error::DomainError;
use comanda_core::repositories::RestaurantRepository;
use comanda_core::subdomain::{candidate_pattern, derive_subdomain, slugify};

/// Key for `pg_advisory_xact_lock` guarding port and subdomain allocation.
const ALLOCATION_LOCK_KEY: i64 = 0x636f_6d61_6e64_61;

const COLUMNS: &str = "id, nombre, email, password, telefono, direccion, puerto, subdominio, \
                       activo, subscription_status::text AS subscription_status, created_at, updated_at";

const EMAIL_CONSTRAINT: &str = "restaurantes_email_key";

pub struct PgRestaurantRepository {
    pool: PgPool,
}

impl PgRestaurantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run `op` again after a uniqueness conflict on port or subdomain.
    async fn with_conflict_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(DomainError::Conflict(constraint)) if attempt < MAX_ALLOCATION_ATTEMPTS => {
                    let delay = conflict_backoff(attempt);
                    warn!(
                        "{}: conflict on {} (attempt {}/{}), retrying in {:?}",
                        what, constraint, attempt, MAX_ALLOCATION_ATTEMPTS, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn try_create(&self, new: &NewRestaurant, ports: Option<PortRange>) -> Result<Restaurant, DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e: sqlx::Error| {
            error!("Database error opening transaction: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        lock_allocation(&mut tx).await?;

        // 1. Subdomain
        let taken: HashSet<String> = sqlx::query_scalar::<_, String>(
            "SELECT subdominio FROM restaurantes WHERE subdominio LIKE $1",
        )
        .bind(candidate_pattern(&slugify(&new.name)))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error reading subdomains: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?
        .into_iter()
        .collect();
        let subdomain = derive_subdomain(&new.name, |candidate| taken.contains(candidate));

        // 2. Port
        let port = match ports {
            Some(range) => Some(next_available_port(&occupied_ports(&mut tx).await?, range)?),
            None => None,
        };

        // 3. Insert
        let record = new.clone().into_record(subdomain, port);
        let sql = format!(
            r#"
            INSERT INTO restaurantes (
                id, nombre, email, password, telefono, direccion,
                puerto, subdominio, activo, subscription_status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, CAST($10 AS subscription_status), $11)
            RETURNING {}
            "#,
            COLUMNS
        );
        let row: RestaurantRow = sqlx::query_as(&sql)
            .bind(record.id)
            .bind(&record.name)
            .bind(&record.email)
            .bind(&record.password)
            .bind(&record.phone)
            .bind(&record.address)
            .bind(record.port.map(i32::from))
            .bind(&record.subdomain)
            .bind(record.active)
            .bind(record.subscription_status.as_str())
            .bind(record.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| write_error(e, &record.email))?;

        tx.commit().await.map_err(|e| write_error(e, &record.email))?;

        Ok(row.into())
    }

    async fn try_reserve_port(&self, id: &Uuid, ports: PortRange) -> Result<Option<Restaurant>, DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e: sqlx::Error| {
            error!("Database error opening transaction: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        lock_allocation(&mut tx).await?;

        let current: Option<RestaurantRow> =
            sqlx::query_as(&format!("SELECT {} FROM restaurantes WHERE id = $1 FOR UPDATE", COLUMNS))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e: sqlx::Error| {
                    error!("Database error finding restaurant for port reservation: {}", e);
                    DomainError::DatabaseError(e.to_string())
                })?;

        let Some(current) = current else {
            return Ok(None);
        };
        if current.puerto.is_some() {
            return Ok(Some(current.into()));
        }

        let port = next_available_port(&occupied_ports(&mut tx).await?, ports)?;

        let row: RestaurantRow = sqlx::query_as(&format!(
            "UPDATE restaurantes SET puerto = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .bind(i32::from(port))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| write_error(e, &current.email))?;

        tx.commit().await.map_err(|e| write_error(e, &current.email))?;

        info!("Port {} reserved for restaurant {}", port, id);
        Ok(Some(row.into()))
    }
}

// Internal row type for SQLx mapping
#[derive(Debug, FromRow)]
struct RestaurantRow {
    pub id: Uuid,
    pub nombre: String,
    pub email: String,
    pub password: String,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub puerto: Option<i32>,
    pub subdominio: String,
    pub activo: bool,
    pub subscription_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<RestaurantRow> for Restaurant {
    fn from(row: RestaurantRow) -> Self {
        Restaurant {
            id: row.id,
            name: row.nombre,
            email: row.email,
            password: row.password,
            phone: row.telefono,
            address: row.direccion,
            port: row.puerto.and_then(|p| u16::try_from(p).ok()),
            subdomain: row.subdominio,
            active: row.activo,
            subscription_status: SubscriptionStatus::from_str(&row.subscription_status).unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

async fn lock_allocation(conn: &mut PgConnection) -> Result<(), DomainError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(ALLOCATION_LOCK_KEY)
        .execute(conn)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error taking allocation lock: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;
    Ok(())
}

async fn occupied_ports(conn: &mut PgConnection) -> Result<BTreeSet<u16>, DomainError> {
    let ports: Vec<i32> = sqlx::query_scalar("SELECT puerto FROM restaurantes WHERE puerto IS NOT NULL")
        .fetch_all(conn)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error reading occupied ports: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

    Ok(ports.into_iter().filter_map(|p| u16::try_from(p).ok()).collect())
}

/// Map a failed write. Email uniqueness is a caller error; port and
/// subdomain uniqueness are allocation races and become `Conflict`.
fn write_error(e: sqlx::Error, email: &str) -> DomainError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some(EMAIL_CONSTRAINT) => DomainError::EmailAlreadyExists(email.to_string()),
                Some(constraint) => DomainError::Conflict(constraint.to_string()),
                None => DomainError::Conflict("unique constraint".to_string()),
            };
        }
    }
    error!("Database error writing restaurant: {}", e);
    DomainError::DatabaseError(e.to_string())
}

#[async_trait]
impl RestaurantRepository for PgRestaurantRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Restaurant>, DomainError> {
        let row: Option<RestaurantRow> =
            sqlx::query_as(&format!("SELECT {} FROM restaurantes WHERE id = $1", COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e: sqlx::Error| {
                    error!("Database error finding restaurant by id: {}", e);
                    DomainError::DatabaseError(e.to_string())
                })?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Restaurant>, DomainError> {
        let row: Option<RestaurantRow> =
            sqlx::query_as(&format!("SELECT {} FROM restaurantes WHERE email = LOWER($1)", COLUMNS))
                .bind(email.trim())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e: sqlx::Error| {
                    error!("Database error finding restaurant by email: {}", e);
                    DomainError::DatabaseError(e.to_string())
                })?;

        Ok(row.map(|r| r.into()))
    }

    async fn list(&self) -> Result<Vec<Restaurant>, DomainError> {
        let rows: Vec<RestaurantRow> =
            sqlx::query_as(&format!("SELECT {} FROM restaurantes ORDER BY created_at", COLUMNS))
                .fetch_all(&self.pool)
                .await
                .map_err(|e: sqlx::Error| {
                    error!("Database error listing restaurants: {}", e);
                    DomainError::DatabaseError(e.to_string())
                })?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn list_active(&self) -> Result<Vec<Restaurant>, DomainError> {
        let rows: Vec<RestaurantRow> = sqlx::query_as(&format!(
            "SELECT {} FROM restaurantes WHERE activo = TRUE ORDER BY puerto NULLS LAST",
            COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error listing active restaurants: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn occupied_ports(&self) -> Result<BTreeSet<u16>, DomainError> {
        let mut conn = self.pool.acquire().await.map_err(|e: sqlx::Error| {
            error!("Database error acquiring connection: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;
        occupied_ports(&mut conn).await
    }

    async fn create(&self, new: &NewRestaurant, ports: Option<PortRange>) -> Result<Restaurant, DomainError> {
        info!("Creating restaurant: {}", new.name);

        let created = self
            .with_conflict_retry("create restaurant", || self.try_create(new, ports))
            .await?;

        info!(
            "Restaurant created: {} (subdomain={}, port={:?})",
            created.id, created.subdomain, created.port
        );
        Ok(created)
    }

    async fn reserve_port(&self, id: &Uuid, ports: PortRange) -> Result<Option<Restaurant>, DomainError> {
        self.with_conflict_retry("reserve port", || self.try_reserve_port(id, ports))
            .await
    }

    async fn update(&self, id: &Uuid, patch: &RestaurantPatch) -> Result<Option<Restaurant>, DomainError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE restaurantes SET updated_at = NOW()");

        if let Some(name) = &patch.name {
            qb.push(", nombre = ").push_bind(name.clone());
        }
        if let Some(email) = &patch.email {
            qb.push(", email = ").push_bind(email.clone());
        }
        if let Some(password_hash) = &patch.password_hash {
            qb.push(", password = ").push_bind(password_hash.clone());
        }
        if let Some(phone) = &patch.phone {
            qb.push(", telefono = ").push_bind(phone.clone());
        }
        if let Some(address) = &patch.address {
            qb.push(", direccion = ").push_bind(address.clone());
        }
        if let Some(active) = patch.active {
            qb.push(", activo = ").push_bind(active);
        }
        if let Some(status) = patch.subscription_status {
            qb.push(", subscription_status = CAST(")
                .push_bind(status.as_str())
                .push(" AS subscription_status)");
        }

        qb.push(" WHERE id = ").push_bind(*id);
        qb.push(" RETURNING ").push(COLUMNS);

        let email = patch.email.as_deref().unwrap_or_default();
        let row: Option<RestaurantRow> = qb
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(e, email))?;

        Ok(row.map(|r| r.into()))
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM restaurantes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e: sqlx::Error| {
                error!("Database error deleting restaurant: {}", e);
                DomainError::DatabaseError(e.to_string())
            })?;

        Ok(result.rows_affected() > 0)
    }
}
