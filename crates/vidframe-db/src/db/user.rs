use async_trait::async_trait;
use sqlx::PgPool;
use vidframe_core::AppError;

/// Read-only lookup of user contact details
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Email address of `user_id`, if the user exists
    async fn email_for(&self, user_id: i64) -> Result<Option<String>, AppError>;
}

#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    #[tracing::instrument(skip(self))]
    async fn email_for(&self, user_id: i64) -> Result<Option<String>, AppError> {
        let email: Option<String> = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(email)
    }
}
