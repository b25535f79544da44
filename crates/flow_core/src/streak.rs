//! crates/flow_core/src/streak.rs
//!
//! Consecutive-day writing streak rules. A save on the same day keeps the
//! streak, a save the day after the last one extends it, anything later
//! starts over at one.

use chrono::NaiveDate;

use crate::domain::StreakState;

impl StreakState {
    /// The streak to display on `today`: unchanged while the chain is alive
    /// (last written today or yesterday), zero once it has lapsed.
    pub fn effective(&self, today: NaiveDate) -> u32 {
        match self.last_written {
            Some(date) if date == today => self.current_streak,
            Some(date) if Some(date) == today.pred_opt() => self.current_streak,
            _ => 0,
        }
    }

    /// Records that the user wrote on `today`. Idempotent within a day.
    pub fn record_writing_day(&mut self, today: NaiveDate) {
        match self.last_written {
            Some(date) if date == today => {}
            Some(date) if Some(date) == today.pred_opt() => {
                self.current_streak += 1;
                self.last_written = Some(today);
            }
            _ => {
                self.current_streak = 1;
                self.last_written = Some(today);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn first_write_starts_a_streak_of_one() {
        let mut streak = StreakState::default();
        streak.record_writing_day(day("2026-08-30"));
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.effective(day("2026-08-30")), 1);
    }

    #[test]
    fn consecutive_days_extend_the_streak() {
        let mut streak = StreakState::default();
        streak.record_writing_day(day("2026-08-28"));
        streak.record_writing_day(day("2026-08-29"));
        streak.record_writing_day(day("2026-08-30"));
        assert_eq!(streak.current_streak, 3);
    }

    #[test]
    fn repeated_writes_on_one_day_do_not_double_count() {
        let mut streak = StreakState::default();
        streak.record_writing_day(day("2026-08-30"));
        streak.record_writing_day(day("2026-08-30"));
        assert_eq!(streak.current_streak, 1);
    }

    #[test]
    fn a_gap_resets_to_one() {
        let mut streak = StreakState::default();
        streak.record_writing_day(day("2026-08-25"));
        streak.record_writing_day(day("2026-08-26"));
        streak.record_writing_day(day("2026-08-30"));
        assert_eq!(streak.current_streak, 1);
    }

    #[test]
    fn lapsed_streak_displays_as_zero_but_yesterday_still_counts() {
        let mut streak = StreakState::default();
        streak.record_writing_day(day("2026-08-27"));
        assert_eq!(streak.effective(day("2026-08-28")), 1);
        assert_eq!(streak.effective(day("2026-08-30")), 0);
    }
}
