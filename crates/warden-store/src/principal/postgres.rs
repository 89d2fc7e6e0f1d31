//! PostgreSQL [`PrincipalStore`] via SQLx.
//!
//! Schema lives in `migrations/`; uniqueness of the unique code and of each
//! natural key is enforced by constraints there, and violations map to
//! [`StoreError::Conflict`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Acquire, Postgres, Transaction};
use warden_core::{NaturalKey, NewPrincipal, Principal, PrincipalId, Role, RoleCode, UniCode};

use super::{PrincipalStore, ProvisioningTx, RoleStore, StoreError};

const PRINCIPAL_COLUMNS: &str = "p.id, p.uni_code, p.email, p.mobile, p.country_code, p.nickname, p.created_at, \
     COALESCE(ARRAY(SELECT r.code FROM principal_roles pr JOIN roles r ON r.id = pr.role_id \
                    WHERE pr.principal_id = p.id ORDER BY r.id), '{}') AS roles";

#[derive(Debug, Clone)]
pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    /// Connect to `url` and apply embedded migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;

        tracing::info!("Connected to PostgreSQL");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;
        tracing::info!("Database migrations applied");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RoleStore for PgPrincipalStore {
    async fn enabled_roles(&self, code: &UniCode) -> Result<Vec<RoleCode>, StoreError> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT r.code FROM roles r
             JOIN principal_roles pr ON pr.role_id = r.id
             JOIN principals p ON p.id = pr.principal_id
             WHERE p.uni_code = $1 AND r.enabled
             ORDER BY r.id",
        )
        .bind(code.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|raw| parse_role(raw)).collect()
    }
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    async fn find_by_natural_key(
        &self,
        key: &NaturalKey,
    ) -> Result<Option<Principal>, StoreError> {
        let row = match key {
            NaturalKey::Email(email) => {
                let sql = format!("SELECT {PRINCIPAL_COLUMNS} FROM principals p WHERE p.email = $1");
                sqlx::query_as::<_, PrincipalRow>(&sql)
                    .bind(email)
                    .fetch_optional(&self.pool)
                    .await?
            }
            NaturalKey::Mobile {
                mobile,
                country_code,
            } => {
                let sql = format!(
                    "SELECT {PRINCIPAL_COLUMNS} FROM principals p \
                     WHERE p.mobile = $1 AND p.country_code = $2"
                );
                sqlx::query_as::<_, PrincipalRow>(&sql)
                    .bind(mobile)
                    .bind(country_code)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        row.map(PrincipalRow::into_principal).transpose()
    }

    async fn find_by_code(&self, code: &UniCode) -> Result<Option<Principal>, StoreError> {
        let sql = format!("SELECT {PRINCIPAL_COLUMNS} FROM principals p WHERE p.uni_code = $1");
        let row = sqlx::query_as::<_, PrincipalRow>(&sql)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(PrincipalRow::into_principal).transpose()
    }

    async fn begin(&self) -> Result<Box<dyn ProvisioningTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgProvisioningTx { tx }))
    }

    async fn ensure_roles(&self, codes: &[RoleCode]) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for code in codes {
            let result = sqlx::query(
                "INSERT INTO roles (code, enabled) VALUES ($1, TRUE) ON CONFLICT (code) DO NOTHING",
            )
            .bind(code.as_str())
            .execute(&self.pool)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        Ok(inserted)
    }
}

/// Open transaction; SQLx rolls it back when dropped uncommitted.
struct PgProvisioningTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ProvisioningTx for PgProvisioningTx {
    async fn code_exists(&mut self, code: &UniCode) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM principals WHERE uni_code = $1)")
                .bind(code.as_str())
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn find_role(&mut self, code: RoleCode) -> Result<Option<Role>, StoreError> {
        let row: Option<(i64, String, bool)> =
            sqlx::query_as("SELECT id, code, enabled FROM roles WHERE code = $1")
                .bind(code.as_str())
                .fetch_optional(&mut *self.tx)
                .await?;
        row.map(|(id, raw, enabled)| {
            Ok(Role {
                id,
                code: parse_role(&raw)?,
                enabled,
            })
        })
        .transpose()
    }

    async fn create_principal(&mut self, new: &NewPrincipal) -> Result<Principal, StoreError> {
        let (email, mobile, country_code) = match &new.key {
            NaturalKey::Email(email) => (Some(email.as_str()), None, None),
            NaturalKey::Mobile {
                mobile,
                country_code,
            } => (None, Some(mobile.as_str()), Some(country_code.as_str())),
        };

        // A savepoint keeps the outer transaction usable after a unique violation.
        let mut savepoint = Acquire::begin(&mut self.tx).await?;

        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO principals (uni_code, email, mobile, country_code, nickname)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, created_at",
        )
        .bind(new.uni_code.as_str())
        .bind(email)
        .bind(mobile)
        .bind(country_code)
        .bind(&new.nickname)
        .fetch_one(&mut *savepoint)
        .await?;

        sqlx::query("INSERT INTO principal_roles (principal_id, role_id) VALUES ($1, $2)")
            .bind(id)
            .bind(new.role.id)
            .execute(&mut *savepoint)
            .await?;

        savepoint.commit().await?;

        Ok(Principal {
            id: PrincipalId(id),
            uni_code: new.uni_code.clone(),
            email: email.map(String::from),
            mobile: mobile.map(String::from),
            country_code: country_code.map(String::from),
            nickname: new.nickname.clone(),
            roles: vec![new.role.code],
            created_at,
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Self { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}

fn parse_role(raw: &str) -> Result<RoleCode, StoreError> {
    raw.parse()
        .map_err(|e: String| StoreError::Corrupt(format!("roles.code: {e}")))
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct PrincipalRow {
    id: i64,
    uni_code: String,
    email: Option<String>,
    mobile: Option<String>,
    country_code: Option<String>,
    nickname: String,
    created_at: DateTime<Utc>,
    roles: Vec<String>,
}

impl PrincipalRow {
    fn into_principal(self) -> Result<Principal, StoreError> {
        let roles = self
            .roles
            .iter()
            .map(|raw| parse_role(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Principal {
            id: PrincipalId(self.id),
            uni_code: UniCode::new(self.uni_code),
            email: self.email,
            mobile: self.mobile,
            country_code: self.country_code,
            nickname: self.nickname,
            roles,
            created_at: self.created_at,
        })
    }
}
