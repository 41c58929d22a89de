use airtix_core::repository::AdminRepository;
use airtix_core::CoreResult;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::storage_error;

pub struct PostgresAdminRepository {
    pool: PgPool,
}

impl PostgresAdminRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminRepository for PostgresAdminRepository {
    async fn find_admin_hash(&self, username: &str) -> CoreResult<Option<String>> {
        sqlx::query_scalar("SELECT password_hash FROM admins WHERE username = $1 AND active_ind")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)
    }

    async fn upsert_admin(&self, username: &str, password_hash: &str) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admins (username, password_hash, active_ind)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (username) DO UPDATE
            SET password_hash = EXCLUDED.password_hash, active_ind = TRUE
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }
}
