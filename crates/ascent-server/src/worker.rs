//! Poll loop for scheduled nudges.
//!
//! Every tick, due nudges are claimed (`Sending`), dispatched — colleague
//! kinds through the `Mailer`, norms refreshes against the store — and
//! marked `Sent` or `Failed`. A failed dispatch never stops the loop, and
//! none of this runs on the request path.

use std::sync::Arc;
use std::time::Duration;

use ascent_core::scheduler::{Nudge, NudgeKind, NudgeStatus};

use crate::state::AppState;

/// Outbound mail delivery. Template rendering and transport live elsewhere;
/// the worker only hands over recipient, subject, and body.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Default mailer: records the send in the log. Stands in until a real
/// delivery backend is wired up.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to, subject, body, "mail dispatched");
        Ok(())
    }
}

/// Spawn the poll loop. Recovers nudges stuck in `Sending` from a previous
/// run before the first tick.
pub fn spawn(state: AppState, mailer: Arc<dyn Mailer>) -> tokio::task::JoinHandle<()> {
    let poll = Duration::from_secs(state.config.nudge_poll_seconds.max(1));
    tokio::spawn(async move {
        match state.nudges.startup_recovery(poll * 4) {
            Ok(0) => {}
            Ok(n) => tracing::warn!("recovered {n} stuck nudges from previous run"),
            Err(e) => tracing::error!("nudge startup recovery failed: {e}"),
        }
        let mut interval = tokio::time::interval(poll);
        loop {
            interval.tick().await;
            match dispatch_due(&state, mailer.as_ref()).await {
                Ok(0) => {}
                Ok(n) => tracing::debug!("dispatched {n} nudges"),
                Err(e) => tracing::error!("nudge dispatch failed: {e}"),
            }
        }
    })
}

/// Dispatch everything currently due. Returns the number of nudges handled.
pub async fn dispatch_due(state: &AppState, mailer: &dyn Mailer) -> anyhow::Result<usize> {
    let due = state.nudges.range_due(chrono::Utc::now())?;
    let mut handled = 0;
    for nudge in due {
        state.nudges.set_status(nudge.id, NudgeStatus::Sending)?;
        let outcome = dispatch_one(state, mailer, &nudge).await;
        let status = match outcome {
            Ok(()) => NudgeStatus::Sent,
            Err(e) => {
                tracing::warn!("nudge {} failed: {e}", nudge.id);
                NudgeStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };
        state.nudges.set_status(nudge.id, status)?;
        handled += 1;
    }
    Ok(handled)
}

async fn dispatch_one(state: &AppState, mailer: &dyn Mailer, nudge: &Nudge) -> anyhow::Result<()> {
    match &nudge.kind {
        NudgeKind::ColleagueInvite { email } => mailer.send(
            email,
            "A colleague asked for your feedback",
            "They are starting a four-week development program and would value \
             your perspective on their chosen strength and weakness.",
        ),
        NudgeKind::ColleagueSurvey { email } => mailer.send(
            email,
            "Final feedback survey",
            "The development program is wrapping up — please share what changed \
             over the past four weeks.",
        ),
        NudgeKind::StatsRefresh => {
            let app = state.clone();
            let updates = tokio::task::spawn_blocking(move || {
                let store = app.open_store()?;
                store.refresh_norms(app.config.stats.sample_size)
            })
            .await??;
            tracing::info!("refreshed norms for {} traits", updates.len());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
