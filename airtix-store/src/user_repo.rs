use airtix_core::repository::UserRepository;
use airtix_core::user::{
    Gender, NewAccount, PersonDetail, ProfileChanges, SecurityChallenge, StoredCredential,
    UserProfile,
};
use airtix_core::{CoreError, CoreResult, UserId};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::error::{conflict_as, storage_error};

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    user_id: i32,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: i32,
    username: String,
    person_id: i32,
    name: String,
    contact_no: String,
    address: String,
    gender: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ChallengeRow {
    security_ques: String,
    security_ans: String,
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn insert_user(&self, account: &NewAccount) -> CoreResult<UserId> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let person_id: i32 = sqlx::query_scalar("SELECT add_person($1, $2, $3, $4)")
            .bind(&account.person.name)
            .bind(&account.person.contact_number)
            .bind(&account.person.address)
            .bind(account.person.gender.code())
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_error)?;

        let now = Utc::now();
        let user_id: i32 = sqlx::query_scalar("SELECT add_user($1, $2, $3, $4, $5, $6, $7, $8)")
            .bind(&account.username)
            .bind(&account.password_hash)
            .bind(person_id)
            .bind(now)
            .bind(now)
            .bind(true)
            .bind(&account.security_question)
            .bind(&account.security_answer)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_as(e, || format!("Username '{}' is taken", account.username)))?;

        tx.commit().await.map_err(storage_error)?;

        Ok(user_id)
    }

    async fn find_credential(&self, username: &str) -> CoreResult<Option<StoredCredential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT user_id, password_hash FROM users WHERE username = $1 AND active_ind",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(row.map(|r| StoredCredential {
            user_id: r.user_id,
            password_hash: r.password_hash,
        }))
    }

    async fn get_user(&self, user_id: UserId) -> CoreResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT u.user_id, u.username, u.person_id, p.name, p.contact_no, p.address, p.gender
            FROM users u
            JOIN persons p ON p.person_id = u.person_id
            WHERE u.user_id = $1 AND u.active_ind
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let gender = row
            .gender
            .as_deref()
            .ok_or_else(|| CoreError::Storage(format!("Person {} has no gender", row.person_id)))
            .and_then(Gender::from_code)?;

        Ok(Some(UserProfile {
            user_id: row.user_id,
            username: row.username,
            person_id: row.person_id,
            person: PersonDetail {
                name: row.name,
                contact_number: row.contact_no,
                address: row.address,
                gender,
            },
        }))
    }

    async fn update_user(&self, changes: &ProfileChanges) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET username = $1,
                password_hash = COALESCE($2, password_hash),
                last_updated_date_time = NOW()
            WHERE user_id = $3 AND active_ind
            "#,
        )
        .bind(&changes.username)
        .bind(changes.password_hash.as_deref())
        .bind(changes.user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_as(e, || format!("Username '{}' is taken", changes.username)))?;

        if updated.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("User {}", changes.user_id)));
        }

        sqlx::query(
            r#"
            UPDATE persons AS p
            SET name = $1, contact_no = $2, address = $3, last_updated_date = NOW()
            FROM users AS u
            WHERE p.person_id = u.person_id AND u.user_id = $4
            "#,
        )
        .bind(&changes.person_name)
        .bind(&changes.contact_number)
        .bind(&changes.address)
        .bind(changes.user_id)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(())
    }

    async fn security_challenge(&self, username: &str) -> CoreResult<Option<SecurityChallenge>> {
        let row = sqlx::query_as::<_, ChallengeRow>(
            "SELECT security_ques, security_ans FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(row.map(|r| SecurityChallenge {
            question: r.security_ques,
            answer: r.security_ans,
        }))
    }

    async fn set_password_hash(&self, username: &str, password_hash: &str) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, last_updated_date_time = NOW()
            WHERE username = $2
            "#,
        )
        .bind(password_hash)
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("User '{}'", username)));
        }
        Ok(())
    }
}
