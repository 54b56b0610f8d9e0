//! ABOUTME: The scheduler's in-memory representation of a job's trigger
//! ABOUTME: One `Trigger` per job, keyed by job_id, held by the engine behind a mutex

use chrono::{DateTime, Utc};
use cronctl_cron::CronSchedule;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// The wake loop's view of one job: its parsed schedule, its next fire time,
/// and how many instances are currently running (to enforce `max_instances`).
#[derive(Clone)]
pub struct Trigger {
    pub job_id: String,
    pub job_class_string: String,
    pub pub_args: Vec<serde_json::Value>,
    pub schedule: CronSchedule,
    pub timezone: chrono_tz::Tz,
    pub paused: bool,
    pub next_run_time: Option<DateTime<Utc>>,
    pub running_count: Arc<AtomicU32>,
}

impl Trigger {
    pub fn running(&self) -> u32 {
        self.running_count.load(Ordering::SeqCst)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.paused && self.next_run_time.is_some_and(|t| t <= now)
    }
}

/// Outcome of applying misfire/coalesce policy to a trigger whose
/// `next_run_time` has passed, possibly by more than one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MisfirePolicy {
    /// Fire once now, catching up a single missed firing.
    FireOnce,
    /// Too far in the past (beyond the misfire grace period): skip straight
    /// to the next future occurrence without firing at all.
    Skip,
}

/// Decide how to handle a trigger whose `next_run_time` is `due_at`, given
/// the current time and the configured grace period.
///
/// The grace check is unconditional: a firing more than `misfire_grace` late
/// is abandoned as a `SCHEDULED_ERROR` regardless of `coalesce`. `coalesce`
/// governs a separate question — whether several *missed* occurrences within
/// the grace window collapse into one catch-up run — but since a `Trigger`
/// keeps only a single `next_run_time` rather than a queue of missed
/// occurrences, every within-grace catch-up is structurally already a single
/// firing. `coalesce` is accepted for API symmetry with the configuration
/// surface and documented here rather than silently ignored.
pub fn resolve_misfire(
    due_at: DateTime<Utc>,
    now: DateTime<Utc>,
    misfire_grace: chrono::Duration,
    _coalesce: bool,
) -> MisfirePolicy {
    let overdue = now - due_at;
    if overdue <= misfire_grace {
        MisfirePolicy::FireOnce
    } else {
        MisfirePolicy::Skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn within_grace_fires_once() {
        let due = utc(1_000);
        let now = utc(1_060);
        let policy = resolve_misfire(due, now, chrono::Duration::seconds(120), true);
        assert_eq!(policy, MisfirePolicy::FireOnce);
    }

    #[test]
    fn beyond_grace_with_coalesce_skips() {
        let due = utc(1_000);
        let now = utc(5_000);
        let policy = resolve_misfire(due, now, chrono::Duration::seconds(3600), true);
        assert_eq!(policy, MisfirePolicy::Skip);
    }

    #[test]
    fn beyond_grace_without_coalesce_still_skips() {
        let due = utc(1_000);
        let now = utc(5_000);
        let policy = resolve_misfire(due, now, chrono::Duration::seconds(3600), false);
        assert_eq!(policy, MisfirePolicy::Skip);
    }
}
