//! Fire-once reminders for tests and deadlines.
//!
//! A [`ReminderSpec`] names a target instant and a list of offsets. Each
//! offset that still lies in the future becomes one tokio task that sleeps
//! until its fire time and then posts the payload. Nothing is persisted:
//! pending reminders die with the process.

mod scheduler;

pub use scheduler::ReminderScheduler;

use chrono::{DateTime, Duration, Utc};

use crate::platform::ChannelId;

/// What to remind about, when, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderSpec {
    pub target: DateTime<Utc>,
    /// Signed offsets from `target`; negative means "before".
    pub offsets: Vec<Duration>,
    pub payload: String,
    pub destination: ChannelId,
}

impl ReminderSpec {
    /// Spec with whole-day offsets, as configured for tests and deadlines.
    pub fn with_day_offsets(
        target: DateTime<Utc>,
        offset_days: &[i64],
        payload: impl Into<String>,
        destination: ChannelId,
    ) -> Self {
        Self {
            target,
            offsets: offset_days.iter().map(|d| Duration::days(*d)).collect(),
            payload: payload.into(),
            destination,
        }
    }
}

/// One reminder that will fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedReminder {
    pub fire_at: DateTime<Utc>,
    /// Time between firing and the target.
    pub lead: Duration,
}

impl PlannedReminder {
    /// Human wording for the lead time: "in 3 days", "tomorrow", "in 1 hour".
    pub fn lead_text(&self) -> String {
        let hours = self.lead.num_hours();
        let days = self.lead.num_days();
        if days >= 2 {
            format!("in {days} days")
        } else if days == 1 {
            "tomorrow".to_string()
        } else if hours >= 2 {
            format!("in {hours} hours")
        } else if hours == 1 {
            "in 1 hour".to_string()
        } else {
            "now".to_string()
        }
    }

    /// Text delivered to the destination.
    pub fn message(&self, payload: &str) -> String {
        format!("{payload}\n⏰ {}", self.lead_text())
    }
}

/// Compute fire times for `spec` as seen at `now`.
///
/// `fire_at = target + offset`, except that a zero offset fires one hour
/// before the target. Fire times at or before `now` are dropped. The result
/// is sorted by fire time.
pub fn plan(spec: &ReminderSpec, now: DateTime<Utc>) -> Vec<PlannedReminder> {
    let mut planned: Vec<PlannedReminder> = spec
        .offsets
        .iter()
        .map(|offset| {
            let mut fire_at = spec.target + *offset;
            if *offset == Duration::zero() {
                fire_at -= Duration::hours(1);
            }
            PlannedReminder {
                fire_at,
                lead: spec.target - fire_at,
            }
        })
        .filter(|p| p.fire_at > now)
        .collect();
    planned.sort_by_key(|p| p.fire_at);
    planned
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn spec(target: DateTime<Utc>, days: &[i64]) -> ReminderSpec {
        ReminderSpec::with_day_offsets(target, days, "Math test", ChannelId::new("c"))
    }

    #[test]
    fn zero_offset_fires_an_hour_early() {
        let target = Utc.with_ymd_and_hms(2027, 3, 10, 0, 0, 0).unwrap();
        let now = target - Duration::days(30);
        let planned = plan(&spec(target, &[-7, -3, -2, -1, 0]), now);
        let fire_times: Vec<_> = planned.iter().map(|p| p.fire_at).collect();
        assert_eq!(
            fire_times,
            vec![
                target - Duration::days(7),
                target - Duration::days(3),
                target - Duration::days(2),
                target - Duration::days(1),
                target - Duration::hours(1),
            ]
        );
        assert_eq!(planned[4].lead_text(), "in 1 hour");
        assert_eq!(planned[3].lead_text(), "tomorrow");
        assert_eq!(planned[0].lead_text(), "in 7 days");
    }

    #[test]
    fn elapsed_offsets_are_dropped() {
        let target = Utc.with_ymd_and_hms(2027, 3, 10, 0, 0, 0).unwrap();
        let now = target - Duration::days(2) - Duration::minutes(5);
        let planned = plan(&spec(target, &[-7, -3, -2, -1, 0]), now);
        assert_eq!(planned.len(), 3);
        assert!(planned.iter().all(|p| p.fire_at > now));
    }

    #[test]
    fn exactly_now_is_not_future() {
        let target = Utc.with_ymd_and_hms(2027, 3, 10, 0, 0, 0).unwrap();
        let now = target - Duration::days(1);
        let planned = plan(&spec(target, &[-1]), now);
        assert!(planned.is_empty());
    }

    #[test]
    fn past_target_plans_nothing() {
        let target = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(plan(&spec(target, &[-7, -2, -1]), Utc::now()).is_empty());
    }

    #[test]
    fn unsorted_offsets_come_out_chronological() {
        let target = Utc.with_ymd_and_hms(2027, 3, 10, 0, 0, 0).unwrap();
        let now = target - Duration::days(30);
        let planned = plan(&spec(target, &[-1, -7, -2]), now);
        assert!(planned.windows(2).all(|w| w[0].fire_at < w[1].fire_at));
    }

    #[test]
    fn message_appends_lead() {
        let p = PlannedReminder {
            fire_at: Utc::now(),
            lead: Duration::days(3),
        };
        assert_eq!(p.message("📢 Math test"), "📢 Math test\n⏰ in 3 days");
    }
}
