//! Recipient persistence.
//!
//! The dispatcher only needs two operations: list pending recipients and mark
//! one as notified. [`PgRecipientStore`] implements them over the `recipients`
//! table; seeding and counting are used by the worker binary at startup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use courier_common::types::{NewRecipient, Recipient};

use crate::error::StoreError;

#[async_trait]
pub trait RecipientStore: Send + Sync {
    /// Return at most `limit` recipients that have not been notified yet.
    ///
    /// The order is stable within one call; no recipient appears twice.
    async fn find_pending(&self, limit: u32) -> Result<Vec<Recipient>, StoreError>;

    /// Flag a recipient as notified at `at`. Calling it again for the same id is a no-op.
    async fn mark_notified(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// PostgreSQL-backed recipient store.
#[derive(Debug, Clone)]
pub struct PgRecipientStore {
    pool: PgPool,
}

impl PgRecipientStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert `recipients` only when the table is empty.
    ///
    /// Returns the number of rows inserted (0 when the table was already populated).
    pub async fn seed_if_empty(&self, recipients: &[NewRecipient]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let (populated,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM recipients)")
            .fetch_one(&mut *tx)
            .await?;

        if populated {
            tracing::debug!("Recipient table already populated, skipping seed");
            return Ok(0);
        }

        let mut inserted = 0u64;
        for recipient in recipients {
            let result = sqlx::query(
                r#"
                INSERT INTO recipients (id, name, email, notified)
                VALUES ($1, $2, $3, false)
                ON CONFLICT (email) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&recipient.name)
            .bind(&recipient.email)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;

        tracing::info!(inserted, "Seeded recipients");
        Ok(inserted)
    }

    /// Number of recipients still waiting for their notification.
    pub async fn count_pending(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM recipients WHERE notified = false")
                .fetch_one(&self.pool)
                .await?;

        Ok(count as u64)
    }
}

#[async_trait]
impl RecipientStore for PgRecipientStore {
    async fn find_pending(&self, limit: u32) -> Result<Vec<Recipient>, StoreError> {
        let recipients = sqlx::query_as::<_, Recipient>(
            r#"
            SELECT id, name, email, notified, notified_at
            FROM recipients
            WHERE notified = false
            ORDER BY created_at, id
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Failed to fetch pending recipients"))?;

        tracing::debug!(count = recipients.len(), limit, "Fetched pending recipients");
        Ok(recipients)
    }

    async fn mark_notified(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE recipients
            SET notified = true, notified_at = $2
            WHERE id = $1 AND notified = false
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .inspect_err(|e| {
            tracing::error!(recipient_id = %id, error = %e, "Failed to update notification status")
        })?;

        if result.rows_affected() == 0 {
            tracing::debug!(recipient_id = %id, "Recipient already notified or missing");
        } else {
            tracing::info!(recipient_id = %id, "Updated notification status");
        }
        Ok(())
    }
}
