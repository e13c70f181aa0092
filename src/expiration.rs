use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::store::CredentialStore;

/// `tokio::time::interval` panics on a zero period
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Start the background task that purges expired refresh records.
///
/// Expired records can no longer authorize a rotation (their signature
/// check fails first), so this only reclaims space for sessions that were
/// abandoned without a logout.
pub fn start_expiration_cleaner(
    store: Arc<dyn CredentialStore>,
    interval: Duration,
) -> JoinHandle<()> {
    if interval < MIN_INTERVAL {
        tracing::warn!(
            requested_ms = interval.as_millis() as u64,
            "Cleanup interval too short; using 1s"
        );
    }
    let interval = interval.max(MIN_INTERVAL);

    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);

        loop {
            interval_timer.tick().await;
            run_cleanup(store.as_ref()).await;
        }
    })
}

/// One purge pass; returns the number of records removed.
pub async fn run_cleanup(store: &dyn CredentialStore) -> u64 {
    tracing::debug!("Running refresh token cleanup");

    match store.delete_expired(Utc::now()).await {
        Ok(count) => {
            if count > 0 {
                tracing::info!(removed = count, "Expired refresh tokens purged");
            }
            count
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to purge expired refresh tokens");
            0
        }
    }
}
