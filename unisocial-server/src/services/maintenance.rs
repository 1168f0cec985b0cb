use std::sync::Arc;
use std::time::Duration;

use crate::services::{block_service, notification_service};
use crate::AppState;

/// Periodic housekeeping loop, spawned from `main`.
///
/// Every tick: remove expired user-to-user blocks (notifying each affected
/// user once), clear lapsed account-level blocks, and purge notifications
/// past the retention window. Every step is idempotent, so an overlapping
/// or restarted run is harmless; failures are logged and the loop continues.
pub async fn run(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(state.config.maintenance_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match block_service::cleanup_expired_blocks(&state.db, state.config.notifications_enabled) {
            Ok(notices) => {
                for notice in notices {
                    let Some(to) = notice.blocked_email else { continue };
                    if let Err(e) = state.email.send_unblock_notice(&to, &notice.blocker_username).await {
                        tracing::warn!(
                            error = %e,
                            block_id = %notice.block.id,
                            "failed to send unblock email"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "expired block cleanup failed");
            }
        }

        if let Err(e) = block_service::clear_lapsed_account_blocks(&state.db) {
            tracing::error!(error = %e, "account block cleanup failed");
        }

        if let Err(e) = notification_service::delete_older_than(
            &state.db,
            state.config.notification_retention_days,
        ) {
            tracing::error!(error = %e, "notification retention purge failed");
        }
    }
}
