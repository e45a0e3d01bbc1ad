use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::users::repo_types::{User, UserRow};

/// Durable user storage.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by email. The password hash is not loaded.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Find a user by email together with the password hash.
    async fn find_by_email_for_login(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Load a user by id, `NotFound` if absent.
    async fn get_by_id(&self, id: Uuid) -> Result<User, AppError>;

    /// Insert or update. A `None` hash leaves the stored hash as is.
    async fn save(&self, user: &User) -> Result<User, AppError>;

    async fn remove(&self, user: &User) -> Result<User, AppError>;

    /// One page of users ordered by creation time, plus the total count.
    async fn list(&self, page: u32, limit: u32) -> Result<(Vec<User>, u64), AppError>;
}

pub(crate) fn user_not_found() -> AppError {
    AppError::not_found("User wasn't found by ID")
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const PUBLIC_COLUMNS: &str = "id, email, first_name, last_name, image, NULL::text AS password_hash, \
                              status, role, created_at, updated_at";

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {PUBLIC_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn find_by_email_for_login(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, first_name, last_name, image, password_hash,
                   status, role, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user for login")?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {PUBLIC_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get user by id")?;
        match row {
            Some(row) => Ok(User::try_from(row)?),
            None => Err(user_not_found()),
        }
    }

    async fn save(&self, user: &User) -> Result<User, AppError> {
        let result = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, email, first_name, last_name, image, password_hash,
                               status, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                image = EXCLUDED.image,
                password_hash = COALESCE(EXCLUDED.password_hash, users.password_hash),
                status = EXCLUDED.status,
                role = EXCLUDED.role,
                updated_at = now()
            RETURNING {PUBLIC_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.profile.first_name)
        .bind(&user.profile.last_name)
        .bind(&user.profile.image)
        .bind(user.password_hash.as_deref())
        .bind(user.status.as_str())
        .bind(user.role.code())
        .bind(user.created_at)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(row) => Ok(User::try_from(row)?),
            Err(e) if is_unique_violation(&e) => {
                Err(AppError::conflict("Email has been already taken."))
            }
            Err(e) => Err(anyhow::Error::new(e).context("save user").into()),
        }
    }

    async fn remove(&self, user: &User) -> Result<User, AppError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user.id)
            .execute(&self.db)
            .await
            .context("remove user")?;
        Ok(user.clone().without_password())
    }

    async fn list(&self, page: u32, limit: u32) -> Result<(Vec<User>, u64), AppError> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {PUBLIC_COLUMNS} FROM users ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list users")?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await
            .context("count users")?;

        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((users, total.max(0) as u64))
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|d| d.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}
