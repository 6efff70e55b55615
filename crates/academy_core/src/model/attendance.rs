//! Attendance mark model.
//!
//! # Invariants
//! - One mark per `(subject_id, subject_kind, day)`.
//! - A stored mark is never changed by the ordinary marking flow.

use crate::model::PersonId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MarkId = Uuid;

/// Roster a marked subject belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectKind {
    Student,
    Coach,
    Staff,
}

impl SubjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Coach => "coach",
            Self::Staff => "staff",
        }
    }

    /// Accepts the stored lowercase form, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "coach" => Some(Self::Coach),
            "staff" => Some(Self::Staff),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceMark {
    pub id: MarkId,
    pub subject_id: PersonId,
    pub subject_kind: SubjectKind,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    /// Unix epoch milliseconds of creation.
    pub created_at: i64,
}

/// Result of one marking request.
///
/// `created == false` means the stored mark was returned untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkOutcome {
    pub mark: AttendanceMark,
    pub created: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub present: u32,
    pub absent: u32,
}

impl AttendanceSummary {
    pub fn total(&self) -> u32 {
        self.present + self.absent
    }
}
