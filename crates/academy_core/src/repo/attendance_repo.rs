//! Attendance mark persistence.
//!
//! # Invariants
//! - `uq_attendance_subject_day` guarantees one mark per subject per day.
//! - No update path exists: a stored mark is terminal.

use crate::db::is_unique_violation;
use crate::key::AttendanceKey;
use crate::model::attendance::{AttendanceMark, AttendanceStatus, AttendanceSummary, SubjectKind};
use crate::model::PersonId;
use crate::repo::{day_to_db, parse_day, parse_uuid, RepoError, RepoResult};
use chrono::NaiveDate;
use log::debug;
use rusqlite::{params, Connection, Row};

const MARK_SELECT_SQL: &str = "SELECT
    id,
    subject_id,
    subject_kind,
    day,
    status,
    created_at
FROM attendance_marks";

pub trait AttendanceRepository {
    fn find_mark(&self, key: &AttendanceKey) -> RepoResult<Option<AttendanceMark>>;
    /// Inserts `mark` unless one exists for its key.
    ///
    /// Returns the stored mark and whether this call created it.
    fn insert_mark_if_absent(&self, mark: &AttendanceMark) -> RepoResult<(AttendanceMark, bool)>;
    fn list_day(&self, kind: SubjectKind, day: NaiveDate) -> RepoResult<Vec<AttendanceMark>>;
    /// Counts marks for one subject over an inclusive day range.
    fn summarize(
        &self,
        subject_id: PersonId,
        kind: SubjectKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<AttendanceSummary>;
}

pub struct SqliteAttendanceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttendanceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AttendanceRepository for SqliteAttendanceRepository<'_> {
    fn find_mark(&self, key: &AttendanceKey) -> RepoResult<Option<AttendanceMark>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MARK_SELECT_SQL} WHERE subject_id = ?1 AND subject_kind = ?2 AND day = ?3;"
        ))?;
        let mut rows = stmt.query(params![
            key.subject_id.to_string(),
            key.subject_kind.as_str(),
            day_to_db(key.day),
        ])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_mark_row(row)?));
        }
        Ok(None)
    }

    fn insert_mark_if_absent(&self, mark: &AttendanceMark) -> RepoResult<(AttendanceMark, bool)> {
        let inserted = self.conn.execute(
            "INSERT INTO attendance_marks (id, subject_id, subject_kind, day, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                mark.id.to_string(),
                mark.subject_id.to_string(),
                mark.subject_kind.as_str(),
                day_to_db(mark.date),
                mark.status.as_str(),
                mark.created_at,
            ],
        );

        match inserted {
            Ok(_) => Ok((mark.clone(), true)),
            Err(err) if is_unique_violation(&err) => {
                debug!(
                    "event=attendance_insert module=repo status=conflict kind={} day={}",
                    mark.subject_kind.as_str(),
                    mark.date
                );
                let key = AttendanceKey {
                    subject_id: mark.subject_id,
                    subject_kind: mark.subject_kind,
                    day: mark.date,
                };
                let existing = self.find_mark(&key)?.ok_or_else(|| {
                    RepoError::InvalidData(
                        "unique conflict on attendance_marks without a stored row".to_string(),
                    )
                })?;
                Ok((existing, false))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn list_day(&self, kind: SubjectKind, day: NaiveDate) -> RepoResult<Vec<AttendanceMark>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MARK_SELECT_SQL} WHERE subject_kind = ?1 AND day = ?2 ORDER BY subject_id ASC;"
        ))?;
        let mut rows = stmt.query(params![kind.as_str(), day_to_db(day)])?;
        let mut marks = Vec::new();
        while let Some(row) = rows.next()? {
            marks.push(parse_mark_row(row)?);
        }
        Ok(marks)
    }

    fn summarize(
        &self,
        subject_id: PersonId,
        kind: SubjectKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<AttendanceSummary> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) AS total
             FROM attendance_marks
             WHERE subject_id = ?1
               AND subject_kind = ?2
               AND day BETWEEN ?3 AND ?4
             GROUP BY status;",
        )?;
        let mut rows = stmt.query(params![
            subject_id.to_string(),
            kind.as_str(),
            day_to_db(from),
            day_to_db(to),
        ])?;

        let mut summary = AttendanceSummary::default();
        while let Some(row) = rows.next()? {
            let status_text: String = row.get("status")?;
            let total: u32 = row.get("total")?;
            match parse_status(&status_text)? {
                AttendanceStatus::Present => summary.present = total,
                AttendanceStatus::Absent => summary.absent = total,
            }
        }
        Ok(summary)
    }
}

fn parse_status(value: &str) -> RepoResult<AttendanceStatus> {
    AttendanceStatus::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid attendance status `{value}` in attendance_marks.status"
        ))
    })
}

fn parse_mark_row(row: &Row<'_>) -> RepoResult<AttendanceMark> {
    let id_text: String = row.get("id")?;
    let subject_text: String = row.get("subject_id")?;
    let kind_text: String = row.get("subject_kind")?;
    let day_text: String = row.get("day")?;
    let status_text: String = row.get("status")?;

    let subject_kind = SubjectKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid subject kind `{kind_text}` in attendance_marks.subject_kind"
        ))
    })?;

    Ok(AttendanceMark {
        id: parse_uuid(&id_text, "attendance_marks.id")?,
        subject_id: parse_uuid(&subject_text, "attendance_marks.subject_id")?,
        subject_kind,
        date: parse_day(&day_text, "attendance_marks.day")?,
        status: parse_status(&status_text)?,
        created_at: row.get("created_at")?,
    })
}
