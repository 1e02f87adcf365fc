//! Periodic removal of expired tokens and sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::links::LinkError;
use crate::AppState;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub tokens_removed: usize,
    pub sessions_removed: usize,
}

/// Run one token + session cleanup pass against the current time.
pub async fn sweep(state: &AppState) -> Result<SweepStats, LinkError> {
    let now = Utc::now();
    let tokens_removed = state.tokens.cleanup(now).await?;
    let sessions_removed = state.sessions.cleanup(now).await?;
    Ok(SweepStats {
        tokens_removed,
        sessions_removed,
    })
}

/// Spawn the background sweep. Returns `None` when `interval` is zero.
pub fn spawn(state: Arc<AppState>, interval: Duration) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; startup already swept.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match sweep(&state).await {
                Ok(stats) if stats.tokens_removed + stats.sessions_removed > 0 => {
                    tracing::info!(
                        tokens = stats.tokens_removed,
                        sessions = stats.sessions_removed,
                        "Sweep removed expired links"
                    );
                }
                Ok(_) => tracing::debug!("Sweep found nothing to remove"),
                Err(e) => tracing::error!(error = %e, "Sweep failed"),
            }
        }
    }))
}
