//! Scheduled deactivation of expired coupons.
//!
//! The storefront already refuses expired coupons at apply time. This job
//! flips `is_active` so the admin list and the storefront's available
//! coupons page agree with the expiry date.

use chrono::Utc;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::db::{CouponRepository, RepositoryError};

/// Start the coupon expiry scheduler.
///
/// `cron` uses the six-field format with seconds (`0 0 0 * * *` is daily at
/// midnight UTC). The returned scheduler must be kept alive.
///
/// # Errors
///
/// Returns `JobSchedulerError` if the expression is invalid or the
/// scheduler cannot start.
pub async fn start_scheduler(pool: PgPool, cron: &str) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pool = pool.clone();

        Box::pin(async move {
            if let Err(e) = deactivate_expired(&pool).await {
                tracing::error!("Error deactivating expired coupons: {e}");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(cron, "Coupon expiry scheduler started");

    Ok(scheduler)
}

/// Deactivate every coupon past its expiry. Returns how many changed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn deactivate_expired(pool: &PgPool) -> Result<u64, RepositoryError> {
    let count = CouponRepository::new(pool)
        .deactivate_expired(Utc::now())
        .await?;

    if count > 0 {
        tracing::info!(count, "Deactivated expired coupons");
    } else {
        tracing::debug!("No expired coupons to deactivate");
    }

    Ok(count)
}
