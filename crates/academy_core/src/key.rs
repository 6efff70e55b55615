//! Ledger key resolution.
//!
//! # Responsibility
//! - Normalize every caller's notion of "the same period" into one key:
//!   `(student, month, year)` for bills, `(subject, kind, day)` for marks.
//! - Derive the billing due date.
//!
//! # Invariants
//! - Pure functions; no I/O.
//! - Timestamps are truncated to the calendar day of their own offset.

use crate::model::attendance::SubjectKind;
use crate::model::PersonId;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

const DUE_DAY_OF_MONTH: u32 = 5;
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("month {0} is outside 1..=12")]
    MonthOutOfRange(u32),
    #[error("year {0} is outside 1..=9999")]
    YearOutOfRange(i32),
    #[error("`{0}` is not a calendar day")]
    UnresolvableDay(String),
    #[error("range start {from} is after range end {to}")]
    InvertedRange { from: NaiveDate, to: NaiveDate },
}

/// Identity of one billing period for one student.
///
/// Only `resolve_fee_key` builds one, so month and year are always in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeeKey {
    student_id: PersonId,
    month: u32,
    year: i32,
}

impl FeeKey {
    pub fn student_id(&self) -> PersonId {
        self.student_id
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn due_date(&self) -> NaiveDate {
        // Month and year were range-checked when the key was resolved.
        NaiveDate::from_ymd_opt(self.year, self.month, DUE_DAY_OF_MONTH).unwrap_or_default()
    }
}

/// Identity of one attendance day for one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttendanceKey {
    pub subject_id: PersonId,
    pub subject_kind: SubjectKind,
    pub day: NaiveDate,
}

/// Anything a caller may hand in as "the day".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayInput {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// `YYYY-MM-DD`, an RFC 3339 timestamp, or a naive `YYYY-MM-DD HH:MM:SS`.
    Text(String),
}

impl From<NaiveDate> for DayInput {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDateTime> for DayInput {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<&str> for DayInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DayInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

pub fn resolve_fee_key(student_id: PersonId, month: u32, year: i32) -> Result<FeeKey, PeriodError> {
    validate_period(month, year)?;
    Ok(FeeKey {
        student_id,
        month,
        year,
    })
}

pub fn resolve_attendance_key(
    subject_id: PersonId,
    subject_kind: SubjectKind,
    date: impl Into<DayInput>,
) -> Result<AttendanceKey, PeriodError> {
    Ok(AttendanceKey {
        subject_id,
        subject_kind,
        day: resolve_day(date)?,
    })
}

/// Truncates any supported day input to a calendar day.
pub fn resolve_day(date: impl Into<DayInput>) -> Result<NaiveDate, PeriodError> {
    match date.into() {
        DayInput::Date(day) => Ok(day),
        DayInput::DateTime(moment) => Ok(moment.date()),
        DayInput::Text(text) => parse_day_text(&text),
    }
}

/// Returns the due date of the `month`/`year` bill (the 5th).
pub fn due_date_for(month: u32, year: i32) -> Result<NaiveDate, PeriodError> {
    validate_period(month, year)?;
    NaiveDate::from_ymd_opt(year, month, DUE_DAY_OF_MONTH)
        .ok_or_else(|| PeriodError::UnresolvableDay(format!("{year:04}-{month:02}-05")))
}

pub fn validate_period(month: u32, year: i32) -> Result<(), PeriodError> {
    if !(1..=12).contains(&month) {
        return Err(PeriodError::MonthOutOfRange(month));
    }
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(PeriodError::YearOutOfRange(year));
    }
    Ok(())
}

fn parse_day_text(text: &str) -> Result<NaiveDate, PeriodError> {
    let trimmed = text.trim();
    if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(day);
    }
    if let Ok(moment) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(moment.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(moment) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(moment.date());
        }
    }
    Err(PeriodError::UnresolvableDay(trimmed.to_string()))
}
