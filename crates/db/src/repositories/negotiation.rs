use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use haggle_core::domain::customer::CustomerId;
use haggle_core::domain::negotiation::{NegotiationOutcome, NegotiationProfile};

use super::{datetime_from_millis, NegotiationProfileStore, RepositoryError};
use crate::DbPool;

pub struct SqlNegotiationProfileStore {
    pool: DbPool,
}

impl SqlNegotiationProfileStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NegotiationProfileStore for SqlNegotiationProfileStore {
    async fn get_or_create(
        &self,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<NegotiationProfile, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let profile = match fetch_profile(&mut *tx, customer_id).await? {
            Some(mut profile) => {
                if profile.reset_monthly_count_if_needed(now) {
                    upsert_profile(&mut *tx, &profile).await?;
                }
                profile
            }
            None => {
                let profile = NegotiationProfile::new(customer_id.clone(), now);
                upsert_profile(&mut *tx, &profile).await?;
                tracing::debug!(
                    event_name = "negotiation_profile_created",
                    customer_id = %customer_id,
                    "created negotiation profile on first contact"
                );
                profile
            }
        };
        tx.commit().await?;
        Ok(profile)
    }

    async fn find(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<NegotiationProfile>, RepositoryError> {
        fetch_profile(&self.pool, customer_id).await
    }

    async fn record_attempt(
        &self,
        customer_id: &CustomerId,
        outcome: NegotiationOutcome,
        now: DateTime<Utc>,
    ) -> Result<NegotiationProfile, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut profile = fetch_profile(&mut *tx, customer_id)
            .await?
            .unwrap_or_else(|| NegotiationProfile::new(customer_id.clone(), now));

        profile.reset_monthly_count_if_needed(now);
        profile.increment_attempt(now);
        let was_blocked = profile.blocked_from_negotiation;
        profile.record_outcome(outcome, now);
        if profile.blocked_from_negotiation && !was_blocked {
            tracing::warn!(
                event_name = "negotiation_auto_block",
                customer_id = %customer_id,
                consecutive_rejections = profile.consecutive_rejections,
                block_until = ?profile.block_until_date,
                "customer auto-blocked from negotiation"
            );
        }

        upsert_profile(&mut *tx, &profile).await?;
        tx.commit().await?;
        Ok(profile)
    }

    async fn save(&self, profile: &NegotiationProfile) -> Result<(), RepositoryError> {
        upsert_profile(&self.pool, profile).await
    }
}

async fn fetch_profile<'e, E>(
    executor: E,
    customer_id: &CustomerId,
) -> Result<Option<NegotiationProfile>, RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let row = sqlx::query(
        "SELECT customer_id, negotiation_style, negotiation_attempts,
                monthly_negotiation_count, last_monthly_reset, last_negotiation_date,
                last_outcome, consecutive_rejections, consecutive_acceptances,
                blocked_from_negotiation, block_reason, block_until_date,
                created_at, updated_at
         FROM negotiation_profile WHERE customer_id = ?1",
    )
    .bind(&customer_id.0)
    .fetch_optional(executor)
    .await?;

    row.map(|row| map_profile_row(&row)).transpose()
}

async fn upsert_profile<'e, E>(
    executor: E,
    profile: &NegotiationProfile,
) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO negotiation_profile (
            customer_id, negotiation_style, negotiation_attempts,
            monthly_negotiation_count, last_monthly_reset, last_negotiation_date,
            last_outcome, consecutive_rejections, consecutive_acceptances,
            blocked_from_negotiation, block_reason, block_until_date,
            created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
         ON CONFLICT(customer_id) DO UPDATE SET
            negotiation_style = excluded.negotiation_style,
            negotiation_attempts = excluded.negotiation_attempts,
            monthly_negotiation_count = excluded.monthly_negotiation_count,
            last_monthly_reset = excluded.last_monthly_reset,
            last_negotiation_date = excluded.last_negotiation_date,
            last_outcome = excluded.last_outcome,
            consecutive_rejections = excluded.consecutive_rejections,
            consecutive_acceptances = excluded.consecutive_acceptances,
            blocked_from_negotiation = excluded.blocked_from_negotiation,
            block_reason = excluded.block_reason,
            block_until_date = excluded.block_until_date,
            updated_at = excluded.updated_at",
    )
    .bind(&profile.customer_id.0)
    .bind(&profile.negotiation_style)
    .bind(i64::from(profile.negotiation_attempts))
    .bind(i64::from(profile.monthly_negotiation_count))
    .bind(profile.last_monthly_reset.map(|ts| ts.timestamp_millis()))
    .bind(profile.last_negotiation_date.map(|ts| ts.timestamp_millis()))
    .bind(profile.last_outcome.map(|outcome| outcome.as_str()))
    .bind(i64::from(profile.consecutive_rejections))
    .bind(i64::from(profile.consecutive_acceptances))
    .bind(profile.blocked_from_negotiation)
    .bind(profile.block_reason.as_deref())
    .bind(profile.block_until_date.map(|ts| ts.timestamp_millis()))
    .bind(profile.created_at.timestamp_millis())
    .bind(profile.updated_at.timestamp_millis())
    .execute(executor)
    .await?;
    Ok(())
}

fn map_profile_row(row: &SqliteRow) -> Result<NegotiationProfile, RepositoryError> {
    let last_outcome = row
        .get::<Option<String>, _>("last_outcome")
        .map(|label| {
            NegotiationOutcome::parse(&label).ok_or_else(|| {
                RepositoryError::Decode(format!("unknown negotiation outcome `{label}`"))
            })
        })
        .transpose()?;

    Ok(NegotiationProfile {
        customer_id: CustomerId(row.get("customer_id")),
        negotiation_style: row.get("negotiation_style"),
        negotiation_attempts: count_column(
            row.get::<i64, _>("negotiation_attempts"),
            "negotiation_attempts",
        )?,
        monthly_negotiation_count: count_column(
            row.get::<i64, _>("monthly_negotiation_count"),
            "monthly_negotiation_count",
        )?,
        last_monthly_reset: optional_datetime(row, "last_monthly_reset")?,
        last_negotiation_date: optional_datetime(row, "last_negotiation_date")?,
        last_outcome,
        consecutive_rejections: count_column(
            row.get::<i64, _>("consecutive_rejections"),
            "consecutive_rejections",
        )?,
        consecutive_acceptances: count_column(
            row.get::<i64, _>("consecutive_acceptances"),
            "consecutive_acceptances",
        )?,
        blocked_from_negotiation: row.get("blocked_from_negotiation"),
        block_reason: row.get("block_reason"),
        block_until_date: optional_datetime(row, "block_until_date")?,
        created_at: datetime_from_millis(row.get::<i64, _>("created_at"), "created_at")?,
        updated_at: datetime_from_millis(row.get::<i64, _>("updated_at"), "updated_at")?,
    })
}

fn optional_datetime(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    row.get::<Option<i64>, _>(column).map(|millis| datetime_from_millis(millis, column)).transpose()
}

fn count_column(value: i64, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!("column `{column}` holds a negative count: {value}"))
    })
}
