use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{plan, ReminderSpec};
use crate::platform::Messenger;

/// Arms in-memory, fire-once reminder timers.
///
/// There is no cancellation: every armed reminder either fires once or is
/// dropped with the runtime at shutdown.
#[derive(Clone)]
pub struct ReminderScheduler {
    messenger: Arc<dyn Messenger>,
    pending: Arc<AtomicUsize>,
}

impl ReminderScheduler {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self {
            messenger,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reminders armed but not fired yet.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Spawn one timer per future offset of `spec`. Returns how many were armed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&self, spec: ReminderSpec) -> usize {
        let now = Utc::now();
        let planned = plan(&spec, now);
        let skipped = spec.offsets.len() - planned.len();
        if skipped > 0 {
            debug!(skipped, target = %spec.target, "reminder offsets already elapsed");
        }

        for reminder in &planned {
            let delay = (reminder.fire_at - now).to_std().unwrap_or_default();
            let messenger = Arc::clone(&self.messenger);
            let pending = Arc::clone(&self.pending);
            let destination = spec.destination.clone();
            let text = reminder.message(&spec.payload);
            let fire_at = reminder.fire_at;

            pending.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                pending.fetch_sub(1, Ordering::SeqCst);
                match messenger.send(&destination, text.into()).await {
                    Ok(_) => info!(%destination, %fire_at, "reminder delivered"),
                    // Best effort: a deleted channel just loses the reminder.
                    Err(e) => warn!(%destination, %fire_at, error = %e, "reminder delivery failed"),
                }
            });
        }

        info!(
            armed = planned.len(),
            target = %spec.target,
            destination = %spec.destination,
            "reminders armed"
        );
        planned.len()
    }
}
