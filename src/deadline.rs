//! Weekly deadline arithmetic.
//!
//! A [`Deadline`] is a weekday plus a time of day. Each occurrence of it is a
//! cutoff: submissions made on the deadline day at or after the deadline time
//! are late, and the period between two cutoffs is one summary period.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub day: Weekday,
    pub time: NaiveTime,
}

impl Deadline {
    pub fn new(day: Weekday, time: NaiveTime) -> Self {
        Self { day, time }
    }

    /// Returns `false` only on the deadline day at or after the deadline
    /// time. The comparison has minute granularity.
    pub fn should_accept(&self, at: NaiveDateTime) -> bool {
        if at.weekday() != self.day {
            return true;
        }
        truncate_to_minute(at.time()) < truncate_to_minute(self.time)
    }

    /// The most recent cutoff at or before `at`.
    pub fn last_cutoff(&self, at: NaiveDateTime) -> NaiveDateTime {
        let days_back = (at.weekday().num_days_from_monday() + 7
            - self.day.num_days_from_monday())
            % 7;
        let candidate = (at.date() - Duration::days(days_back.into())).and_time(self.time);
        if candidate > at {
            candidate - Duration::weeks(1)
        } else {
            candidate
        }
    }

    /// The first cutoff strictly after `at`.
    pub fn next_cutoff(&self, at: NaiveDateTime) -> NaiveDateTime {
        self.last_cutoff(at) + Duration::weeks(1)
    }

    /// Whether a submission sent at `sent_at` belongs to the period that is
    /// still open at `now`.
    pub fn is_current_period(&self, sent_at: NaiveDateTime, now: NaiveDateTime) -> bool {
        sent_at >= self.last_cutoff(now)
    }
}

fn truncate_to_minute(t: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn friday_four_pm() -> Deadline {
        Deadline::new(Weekday::Fri, NaiveTime::from_hms_opt(16, 0, 0).unwrap())
    }

    /// 2026-10-16 is a Friday.
    fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_exact_deadline_is_rejected() {
        assert!(!friday_four_pm().should_accept(at(16, 16, 0, 0)));
    }

    #[test]
    fn test_one_second_before_is_accepted() {
        assert!(friday_four_pm().should_accept(at(16, 15, 59, 59)));
    }

    #[test]
    fn test_within_deadline_minute_is_rejected() {
        assert!(!friday_four_pm().should_accept(at(16, 16, 0, 30)));
        assert!(!friday_four_pm().should_accept(at(16, 23, 59, 59)));
    }

    #[test]
    fn test_other_weekdays_always_accept() {
        let d = friday_four_pm();
        for day in 10..=15 {
            assert!(d.should_accept(at(day, 0, 0, 0)));
            assert!(d.should_accept(at(day, 16, 0, 0)));
            assert!(d.should_accept(at(day, 23, 59, 59)));
        }
    }

    #[test]
    fn test_last_cutoff() {
        let d = friday_four_pm();
        assert_eq!(d.last_cutoff(at(16, 16, 0, 0)), at(16, 16, 0, 0));
        assert_eq!(d.last_cutoff(at(16, 15, 59, 59)), at(9, 16, 0, 0));
        assert_eq!(d.last_cutoff(at(17, 9, 0, 0)), at(16, 16, 0, 0));
        assert_eq!(d.last_cutoff(at(14, 12, 0, 0)), at(9, 16, 0, 0));
    }

    #[test]
    fn test_next_cutoff_is_strictly_after() {
        let d = friday_four_pm();
        assert_eq!(d.next_cutoff(at(16, 16, 0, 0)), at(23, 16, 0, 0));
        assert_eq!(d.next_cutoff(at(16, 15, 0, 0)), at(16, 16, 0, 0));
        assert_eq!(d.next_cutoff(at(12, 8, 0, 0)), at(16, 16, 0, 0));
    }

    #[test]
    fn test_closed_period_submission() {
        let d = friday_four_pm();
        let now = at(16, 16, 1, 0);
        assert!(!d.is_current_period(at(16, 15, 59, 0), now));
        assert!(d.is_current_period(at(16, 16, 0, 0), now));
        assert!(d.is_current_period(at(14, 10, 0, 0), at(15, 10, 0, 0)));
    }
}
