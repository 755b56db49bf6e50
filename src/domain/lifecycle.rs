//! Enrollment lifecycle state machine.
//!
//! `Enrolled` is the only non-terminal state. From it an enrollment moves to
//! `Completed` or `Failed` on finalization (or `Failed` when forced), or to
//! `Dropped` on withdrawal. Nothing leaves a terminal state.
//!
//! Grading stays open after completion or failure so that corrections can be
//! recorded retroactively; only a dropped enrollment is closed to grading.

use crate::domain::errors::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Enrolled,
    Completed,
    Dropped,
    Failed,
}

/// Operations the state machine gates. Carried in `InvalidStateTransition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentOperation {
    RecordGrade,
    RecordAttendance,
    Finalize,
    Withdraw,
    ForceFail,
}

impl fmt::Display for EnrollmentOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RecordGrade => "record a grade",
            Self::RecordAttendance => "record attendance",
            Self::Finalize => "finalize",
            Self::Withdraw => "withdraw",
            Self::ForceFail => "force a failure",
        })
    }
}

impl EnrollmentStatus {
    pub const ALL: [EnrollmentStatus; 4] = [
        Self::Enrolled,
        Self::Completed,
        Self::Dropped,
        Self::Failed,
    ];

    /// Counts against course capacity.
    pub fn is_active(self) -> bool {
        self == Self::Enrolled
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Retroactive grading after completion/failure is allowed; dropped is closed.
    pub fn allows_grading(self) -> bool {
        matches!(self, Self::Enrolled | Self::Completed | Self::Failed)
    }

    pub fn allows_attendance(self) -> bool {
        self == Self::Enrolled
    }

    /// Whether `self -> to` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, to: EnrollmentStatus) -> bool {
        matches!(
            (self, to),
            (Self::Enrolled, Self::Completed)
                | (Self::Enrolled, Self::Failed)
                | (Self::Enrolled, Self::Dropped)
        )
    }

    /// Applies `self -> to` on behalf of `operation`.
    pub fn transition(
        self,
        to: EnrollmentStatus,
        operation: EnrollmentOperation,
    ) -> Result<EnrollmentStatus, DomainError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(DomainError::InvalidStateTransition {
                current: self,
                operation,
            })
        }
    }

    /// Fails with `InvalidStateTransition` unless grading is open.
    pub fn ensure_grading(self) -> Result<(), DomainError> {
        self.ensure(self.allows_grading(), EnrollmentOperation::RecordGrade)
    }

    /// Fails with `InvalidStateTransition` unless attendance is open.
    pub fn ensure_attendance(self) -> Result<(), DomainError> {
        self.ensure(
            self.allows_attendance(),
            EnrollmentOperation::RecordAttendance,
        )
    }

    fn ensure(self, allowed: bool, operation: EnrollmentOperation) -> Result<(), DomainError> {
        if allowed {
            Ok(())
        } else {
            Err(DomainError::InvalidStateTransition {
                current: self,
                operation,
            })
        }
    }

    /// Terminal status reached by finalization.
    pub fn finalized(passed: bool) -> EnrollmentStatus {
        if passed {
            Self::Completed
        } else {
            Self::Failed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enrolled => "ENROLLED",
            Self::Completed => "COMPLETED",
            Self::Dropped => "DROPPED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ENROLLED" => Ok(Self::Enrolled),
            "COMPLETED" => Ok(Self::Completed),
            "DROPPED" => Ok(Self::Dropped),
            "FAILED" => Ok(Self::Failed),
            other => Err(DomainError::Parse(format!(
                "invalid enrollment status: {}",
                other
            ))),
        }
    }
}
