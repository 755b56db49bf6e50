//! Attendance ledger: presence percentage over one enrollment's daily marks.

use crate::domain::entities::{AttendanceMark, AttendanceStatus};
use crate::domain::grade_ledger::round_half_up;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether `excused` marks sit in the denominator of the presence percentage.
/// They never count as present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExcusedPolicy {
    /// Excused days are neutral: neither attended nor missed.
    #[default]
    Exclude,
    /// Excused days count as sessions that were not attended.
    Count,
}

/// Per-status counts for one enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttendanceTally {
    pub present: u32,
    pub late: u32,
    pub absent: u32,
    pub excused: u32,
}

impl AttendanceTally {
    pub fn from_marks(marks: &[AttendanceMark]) -> Self {
        marks.iter().fold(Self::default(), |mut t, m| {
            match m.status {
                AttendanceStatus::Present => t.present += 1,
                AttendanceStatus::Late => t.late += 1,
                AttendanceStatus::Absent => t.absent += 1,
                AttendanceStatus::Excused => t.excused += 1,
            }
            t
        })
    }

    pub fn total(&self) -> u32 {
        self.present + self.late + self.absent + self.excused
    }

    pub fn attended(&self) -> u32 {
        self.present + self.late
    }

    /// Sessions in the denominator under `policy`.
    pub fn counted_sessions(&self, policy: ExcusedPolicy) -> u32 {
        match policy {
            ExcusedPolicy::Exclude => self.attended() + self.absent,
            ExcusedPolicy::Count => self.total(),
        }
    }

    /// `attended / counted * 100`, 2 places half-up. Zero when nothing is counted.
    pub fn presence_percentage(&self, policy: ExcusedPolicy) -> Decimal {
        let counted = self.counted_sessions(policy);
        if counted == 0 {
            return Decimal::ZERO;
        }
        round_half_up(
            Decimal::from(self.attended()) * Decimal::ONE_HUNDRED / Decimal::from(counted),
        )
    }
}

pub fn tally(marks: &[AttendanceMark]) -> AttendanceTally {
    AttendanceTally::from_marks(marks)
}

/// Empty input yields 0%, unlike the grade ledger's "undefined".
pub fn compute_presence_percentage(marks: &[AttendanceMark], policy: ExcusedPolicy) -> Decimal {
    AttendanceTally::from_marks(marks).presence_percentage(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use crate::domain::entities::AttendanceStatus::*;

    fn marks(statuses: &[AttendanceStatus]) -> Vec<AttendanceMark> {
        let start = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        statuses
            .iter()
            .enumerate()
            .map(|(i, s)| AttendanceMark::new(start + chrono::Days::new(i as u64), *s))
            .collect()
    }

    #[test]
    fn empty_set_is_zero_percent() {
        assert_eq!(compute_presence_percentage(&[], ExcusedPolicy::Exclude), dec!(0));
        assert_eq!(compute_presence_percentage(&[], ExcusedPolicy::Count), dec!(0));
    }

    #[test]
    fn late_counts_as_present() {
        let m = marks(&[Present, Present, Absent, Late]);
        assert_eq!(compute_presence_percentage(&m, ExcusedPolicy::Exclude), dec!(75.00));
        assert_eq!(compute_presence_percentage(&m, ExcusedPolicy::Count), dec!(75.00));
    }

    #[test]
    fn excused_policy_controls_the_denominator() {
        let m = marks(&[Present, Absent, Excused]);
        assert_eq!(compute_presence_percentage(&m, ExcusedPolicy::Exclude), dec!(50.00));
        assert_eq!(compute_presence_percentage(&m, ExcusedPolicy::Count), dec!(33.33));
    }

    #[test]
    fn only_excused_marks_yield_zero_when_excluded() {
        let m = marks(&[Excused, Excused]);
        assert_eq!(compute_presence_percentage(&m, ExcusedPolicy::Exclude), dec!(0));
    }

    #[test]
    fn tally_counts_each_status() {
        let t = tally(&marks(&[Present, Late, Late, Absent, Excused]));
        assert_eq!(
            t,
            AttendanceTally {
                present: 1,
                late: 2,
                absent: 1,
                excused: 1
            }
        );
        assert_eq!(t.total(), 5);
        assert_eq!(t.attended(), 3);
        assert_eq!(t.presence_percentage(ExcusedPolicy::Exclude), dec!(75.00));
        assert_eq!(t.presence_percentage(ExcusedPolicy::Count), dec!(60.00));
    }

    #[test]
    fn two_thirds_rounds_half_up() {
        let m = marks(&[Present, Present, Absent]);
        assert_eq!(compute_presence_percentage(&m, ExcusedPolicy::Exclude), dec!(66.67));
    }
}
