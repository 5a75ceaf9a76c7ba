//! Weekly summary trigger.
//!
//! Wakes up on a fixed interval and emits [`Event::PeriodClosed`] once the
//! next cutoff has passed.

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::deadline::Deadline;
use crate::worker::Event;

/// Tracks the next cutoff to fire.
#[derive(Debug, Clone)]
pub struct WeeklyTrigger {
    deadline: Deadline,
    next: NaiveDateTime,
}

impl WeeklyTrigger {
    /// Schedules the first cutoff strictly after `now`.
    pub fn new(deadline: Deadline, now: NaiveDateTime) -> Self {
        Self {
            deadline,
            next: deadline.next_cutoff(now),
        }
    }

    pub fn next(&self) -> NaiveDateTime {
        self.next
    }

    /// Returns the due cutoff if `now` has reached it and moves on to the
    /// following one. Cutoffs missed while asleep fire once, not repeatedly.
    pub fn poll(&mut self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if now < self.next {
            return None;
        }
        let due = self.next;
        self.next = self.deadline.next_cutoff(now);
        Some(due)
    }
}

/// Runs the trigger against local time, checking every `tick`. Returns once
/// the event queue is closed.
#[tracing::instrument(skip(deadline, tx), fields(tick_secs = tick.as_secs()))]
pub async fn run_weekly(deadline: Deadline, tick: Duration, tx: mpsc::Sender<Event>) -> Result<()> {
    let mut trigger = WeeklyTrigger::new(deadline, Local::now().naive_local());
    info!(next = %trigger.next(), "Weekly summary scheduled");

    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if tx.is_closed() {
            info!("Event queue closed, stopping scheduler");
            return Ok(());
        }
        let now = Local::now().naive_local();

        let Some(cutoff) = trigger.poll(now) else {
            debug!(next = %trigger.next(), "Scheduler tick");
            continue;
        };

        info!(cutoff = %cutoff, next = %trigger.next(), "Cutoff reached");
        if tx.send(Event::PeriodClosed { cutoff }).await.is_err() {
            info!("Event queue closed, stopping scheduler");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Weekday};

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn deadline() -> Deadline {
        Deadline::new(Weekday::Fri, NaiveTime::from_hms_opt(16, 0, 0).unwrap())
    }

    #[test]
    fn test_fires_once_at_cutoff() {
        let mut trigger = WeeklyTrigger::new(deadline(), at(14, 9, 0));
        assert_eq!(trigger.next(), at(16, 16, 0));

        assert_eq!(trigger.poll(at(16, 15, 59)), None);
        assert_eq!(trigger.poll(at(16, 16, 0)), Some(at(16, 16, 0)));
        assert_eq!(trigger.poll(at(16, 16, 1)), None);
        assert_eq!(trigger.next(), at(23, 16, 0));
    }

    #[test]
    fn test_started_on_cutoff_waits_a_week() {
        let mut trigger = WeeklyTrigger::new(deadline(), at(16, 16, 0));
        assert_eq!(trigger.poll(at(16, 16, 0)), None);
        assert_eq!(trigger.next(), at(23, 16, 0));
    }

    #[test]
    fn test_missed_cutoffs_collapse() {
        let mut trigger = WeeklyTrigger::new(deadline(), at(2, 10, 0));
        assert_eq!(trigger.poll(at(16, 17, 0)), Some(at(2, 16, 0)));
        assert_eq!(trigger.next(), at(23, 16, 0));
        assert_eq!(trigger.poll(at(17, 10, 0)), None);
    }

    #[tokio::test]
    async fn test_run_weekly_stops_when_queue_closes() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = tokio::spawn(run_weekly(deadline(), Duration::from_millis(1), tx));
        let joined = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop");
        assert!(joined.unwrap().is_ok());
    }
}
