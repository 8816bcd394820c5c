use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use haggle_core::domain::coupon::{
    fallback_code, random_code, Coupon, CouponIssueSpec, CouponSource, CouponType,
    CouponUsageStats,
};
use haggle_core::domain::customer::CustomerId;

use super::{datetime_from_millis, decimal_from_text, CouponStore, RepositoryError};
use crate::DbPool;

pub const DEFAULT_CODE_RETRY_LIMIT: u32 = 10;

pub struct SqlCouponStore {
    pool: DbPool,
    code_retry_limit: u32,
}

impl SqlCouponStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool, code_retry_limit: DEFAULT_CODE_RETRY_LIMIT }
    }

    pub fn with_retry_limit(pool: DbPool, code_retry_limit: u32) -> Self {
        Self { pool, code_retry_limit: code_retry_limit.max(1) }
    }

    async fn insert(&self, coupon: &Coupon) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO coupon (
                coupon_code, coupon_type, discount_value, minimum_order_value,
                customer_id, source, expiration_date, max_uses, current_uses,
                is_active, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&coupon.coupon_code)
        .bind(coupon.coupon_type.as_str())
        .bind(coupon.discount_value.to_string())
        .bind(coupon.minimum_order_value.to_string())
        .bind(coupon.customer_id.as_ref().map(|id| id.0.clone()))
        .bind(coupon.source.as_str())
        .bind(coupon.expiration_date.timestamp_millis())
        .bind(i64::from(coupon.max_uses))
        .bind(i64::from(coupon.current_uses))
        .bind(coupon.is_active)
        .bind(coupon.created_at.timestamp_millis())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db))
                if db.kind() == sqlx::error::ErrorKind::UniqueViolation =>
            {
                Err(RepositoryError::DuplicateCouponCode { code: coupon.coupon_code.clone() })
            }
            Err(other) => Err(other.into()),
        }
    }
}

#[async_trait]
impl CouponStore for SqlCouponStore {
    async fn issue(
        &self,
        spec: &CouponIssueSpec,
        now: DateTime<Utc>,
    ) -> Result<Coupon, RepositoryError> {
        let prefix = spec.source.code_prefix();
        for attempt in 0..self.code_retry_limit {
            let code = {
                let mut rng = rand::thread_rng();
                random_code(prefix, &mut rng)
            };
            let coupon = spec.build(code, now);
            match self.insert(&coupon).await {
                Ok(()) => return Ok(coupon),
                Err(RepositoryError::DuplicateCouponCode { .. }) => {
                    tracing::debug!(
                        event_name = "coupon_code_collision",
                        code = %coupon.coupon_code,
                        attempt,
                        "generated coupon code collided, retrying"
                    );
                }
                Err(other) => return Err(other),
            }
        }

        // Random attempts exhausted. The timestamp code is not rechecked;
        // the primary-key constraint is the final arbiter on this path.
        let coupon = spec.build(fallback_code(prefix, now), now);
        tracing::warn!(
            event_name = "coupon_code_fallback",
            code = %coupon.coupon_code,
            retry_limit = self.code_retry_limit,
            "falling back to timestamp-derived coupon code"
        );
        self.insert(&coupon).await?;
        Ok(coupon)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query(
            "SELECT coupon_code, coupon_type, discount_value, minimum_order_value,
                    customer_id, source, expiration_date, max_uses, current_uses,
                    is_active, created_at
             FROM coupon WHERE coupon_code = ?1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| map_coupon_row(&row)).transpose()
    }

    async fn use_coupon(&self, code: &str) -> Result<(), RepositoryError> {
        let updated = sqlx::query(
            "UPDATE coupon SET current_uses = current_uses + 1
             WHERE coupon_code = ?1 AND is_active = 1 AND current_uses < max_uses",
        )
        .bind(code)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 1 {
            return Ok(());
        }
        match self.find_by_code(code).await? {
            Some(_) => Err(RepositoryError::UsageExhausted { code: code.to_string() }),
            None => Err(RepositoryError::CouponNotFound { code: code.to_string() }),
        }
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let swept = sqlx::query(
            "UPDATE coupon SET is_active = 0 WHERE is_active = 1 AND expiration_date <= ?1",
        )
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if swept > 0 {
            tracing::info!(event_name = "coupon_expiry_sweep", swept, "deactivated expired coupons");
        }
        Ok(swept)
    }

    async fn usage_stats(
        &self,
        source: CouponSource,
        since: DateTime<Utc>,
    ) -> Result<CouponUsageStats, RepositoryError> {
        let rows = sqlx::query(
            "SELECT discount_value, current_uses FROM coupon
             WHERE source = ?1 AND created_at >= ?2",
        )
        .bind(source.as_str())
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        let mut stats =
            CouponUsageStats { generated: 0, used: 0, total_discount_granted: Decimal::ZERO };
        for row in rows {
            stats.generated += 1;
            if row.get::<i64, _>("current_uses") > 0 {
                stats.used += 1;
                stats.total_discount_granted +=
                    decimal_from_text(&row.get::<String, _>("discount_value"), "discount_value")?;
            }
        }
        Ok(stats)
    }
}

fn map_coupon_row(row: &SqliteRow) -> Result<Coupon, RepositoryError> {
    let type_label = row.get::<String, _>("coupon_type");
    let coupon_type = CouponType::parse(&type_label)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown coupon_type `{type_label}`")))?;
    let source_label = row.get::<String, _>("source");
    let source = CouponSource::parse(&source_label)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown coupon source `{source_label}`")))?;

    Ok(Coupon {
        coupon_code: row.get("coupon_code"),
        coupon_type,
        discount_value: decimal_from_text(
            &row.get::<String, _>("discount_value"),
            "discount_value",
        )?,
        minimum_order_value: decimal_from_text(
            &row.get::<String, _>("minimum_order_value"),
            "minimum_order_value",
        )?,
        customer_id: row.get::<Option<String>, _>("customer_id").map(CustomerId),
        source,
        expiration_date: datetime_from_millis(
            row.get::<i64, _>("expiration_date"),
            "expiration_date",
        )?,
        max_uses: count_column(row.get::<i64, _>("max_uses"), "max_uses")?,
        current_uses: count_column(row.get::<i64, _>("current_uses"), "current_uses")?,
        is_active: row.get("is_active"),
        created_at: datetime_from_millis(row.get::<i64, _>("created_at"), "created_at")?,
    })
}

fn count_column(value: i64, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!("column `{column}` holds a negative count: {value}"))
    })
}
