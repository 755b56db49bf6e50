//! Grade ledger: weighted percentage and letter grade over one enrollment's grades.
//!
//! All functions are pure. The weighted percentage is a commutative sum, so
//! the order grades were recorded in never changes the result.

use crate::domain::entities::Grade;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Two decimal places, half-up. All figures handled here are non-negative,
/// where half-up and midpoint-away-from-zero coincide.
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `Σ(score / max * 100 * weight) / Σ weight`, rounded once at the end.
///
/// Returns `None` for an empty set: no grade yet, which is not the same as zero.
pub fn compute_weighted_percentage(grades: &[Grade]) -> Option<Decimal> {
    if grades.is_empty() {
        return None;
    }
    let (weighted_sum, total_weight) = grades
        .iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(sum, weight), g| {
            (sum + g.raw_percentage() * g.weight, weight + g.weight)
        });
    // Zero weights are rejected on creation; guard anyway against unvalidated input.
    if total_weight.is_zero() {
        return None;
    }
    Some(round_half_up(weighted_sum / total_weight))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    /// Inclusive lower bounds: 90 A, 80 B, 70 C, 60 D, otherwise F.
    pub fn from_percentage(percentage: Decimal) -> Self {
        if percentage >= Decimal::from(90) {
            Self::A
        } else if percentage >= Decimal::from(80) {
            Self::B
        } else if percentage >= Decimal::from(70) {
            Self::C
        } else if percentage >= Decimal::from(60) {
            Self::D
        } else {
            Self::F
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn letter_grade(percentage: Decimal) -> LetterGrade {
    LetterGrade::from_percentage(percentage)
}

pub fn is_passing(percentage: Decimal, passing_threshold: Decimal) -> bool {
    percentage >= passing_threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn grade(score: Decimal, max: Decimal, weight: Decimal) -> Grade {
        Grade::new("Assignment", score, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap())
            .with_max_score(max)
            .with_weight(weight)
    }

    #[test]
    fn empty_set_is_undefined_not_zero() {
        assert_eq!(compute_weighted_percentage(&[]), None);
    }

    #[test]
    fn equal_weights_average_the_percentages() {
        let grades = [
            grade(dec!(85), dec!(100), dec!(1)),
            grade(dec!(95), dec!(100), dec!(1)),
        ];
        assert_eq!(compute_weighted_percentage(&grades), Some(dec!(90.00)));
    }

    #[test]
    fn weights_and_differing_max_scores_combine() {
        // 40/50 = 80% at weight 30, 18/20 = 90% at weight 70 -> (2400 + 6300) / 100 = 87
        let grades = [
            grade(dec!(40), dec!(50), dec!(30)),
            grade(dec!(18), dec!(20), dec!(70)),
        ];
        assert_eq!(compute_weighted_percentage(&grades), Some(dec!(87.00)));
    }

    #[test]
    fn result_rounds_half_up_at_two_places() {
        // (100 + 100 + 0) / 3 = 66.666.. -> 66.67
        let grades = [
            grade(dec!(10), dec!(10), dec!(1)),
            grade(dec!(10), dec!(10), dec!(1)),
            grade(dec!(0), dec!(10), dec!(1)),
        ];
        assert_eq!(compute_weighted_percentage(&grades), Some(dec!(66.67)));
        assert_eq!(round_half_up(dec!(89.995)), dec!(90.00));
        assert_eq!(round_half_up(dec!(89.994)), dec!(89.99));
    }

    #[test]
    fn reordering_does_not_change_the_result() {
        let grades = vec![
            grade(dec!(7), dec!(9), dec!(2.5)),
            grade(dec!(31), dec!(40), dec!(10)),
            grade(dec!(1), dec!(3), dec!(0.75)),
            grade(dec!(88), dec!(100), dec!(45)),
        ];
        let expected = compute_weighted_percentage(&grades);
        let mut reversed = grades.clone();
        reversed.reverse();
        assert_eq!(compute_weighted_percentage(&reversed), expected);
        let mut rotated = grades.clone();
        rotated.rotate_left(2);
        assert_eq!(compute_weighted_percentage(&rotated), expected);
    }

    #[test]
    fn result_stays_within_zero_and_hundred() {
        let cases = [
            vec![grade(dec!(0), dec!(10), dec!(100))],
            vec![grade(dec!(10), dec!(10), dec!(0.01))],
            vec![
                grade(dec!(0), dec!(7), dec!(3)),
                grade(dec!(7), dec!(7), dec!(99)),
                grade(dec!(2), dec!(3), dec!(1)),
            ],
        ];
        for grades in cases {
            let pct = compute_weighted_percentage(&grades).unwrap();
            assert!(pct >= Decimal::ZERO && pct <= Decimal::ONE_HUNDRED, "{pct}");
        }
    }

    #[test]
    fn letter_grade_lower_bounds_are_inclusive() {
        assert_eq!(letter_grade(dec!(90.00)), LetterGrade::A);
        assert_eq!(letter_grade(dec!(89.99)), LetterGrade::B);
        assert_eq!(letter_grade(dec!(80)), LetterGrade::B);
        assert_eq!(letter_grade(dec!(70)), LetterGrade::C);
        assert_eq!(letter_grade(dec!(60.00)), LetterGrade::D);
        assert_eq!(letter_grade(dec!(59.99)), LetterGrade::F);
        assert_eq!(letter_grade(dec!(0)), LetterGrade::F);
    }

    #[test]
    fn passing_is_inclusive_of_threshold() {
        assert!(is_passing(dec!(60.00), dec!(60.00)));
        assert!(!is_passing(dec!(59.99), dec!(60.00)));
    }
}
