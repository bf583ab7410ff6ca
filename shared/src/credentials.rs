//! Storage for the calendar integration's refresh token.

use async_trait::async_trait;

use crate::db::{self, DbSettings};
use crate::Result;

/// Fixed slot holding the Google Calendar service account.
pub const GOOGLE_CALENDAR_SLOT: &str = "googleCalendar";

/// Persistence for the single long-lived refresh credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn refresh_token(&self) -> Result<Option<String>>;

    /// Merge the token into the slot, creating it if needed.
    async fn save_refresh_token(&self, refresh_token: &str) -> Result<()>;
}

/// Postgres implementation over the `service_accounts` table.
pub struct PgCredentialStore {
    settings: DbSettings,
}

impl PgCredentialStore {
    pub fn new(settings: DbSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn refresh_token(&self) -> Result<Option<String>> {
        let pool = db::pool(&self.settings).await?;

        let token: Option<Option<String>> = sqlx::query_scalar(
            "SELECT data->>'refresh_token' FROM service_accounts WHERE id = $1",
        )
        .bind(GOOGLE_CALENDAR_SLOT)
        .fetch_optional(pool)
        .await?;

        Ok(token.flatten())
    }

    async fn save_refresh_token(&self, refresh_token: &str) -> Result<()> {
        let pool = db::pool(&self.settings).await?;

        sqlx::query(
            r#"
            INSERT INTO service_accounts (id, data, updated_at)
            VALUES ($1, jsonb_build_object('refresh_token', $2::text), NOW())
            ON CONFLICT (id) DO UPDATE SET
                data = service_accounts.data || EXCLUDED.data,
                updated_at = NOW()
            "#,
        )
        .bind(GOOGLE_CALENDAR_SLOT)
        .bind(refresh_token)
        .execute(pool)
        .await?;

        Ok(())
    }
}
