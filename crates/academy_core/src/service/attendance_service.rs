//! Attendance register use-case service.
//!
//! # Invariants
//! - `UNMARKED -> PRESENT | ABSENT` is the only transition; both targets are
//!   terminal for this service.
//! - `AttendanceMarked` fires once per created mark, never on replays.

use crate::error::{CoreError, CoreResult};
use crate::key::{resolve_attendance_key, resolve_day, DayInput, PeriodError};
use crate::model::attendance::{
    AttendanceMark, AttendanceStatus, AttendanceSummary, MarkOutcome, SubjectKind,
};
use crate::model::PersonId;
use crate::notify::{dispatch_isolated, DomainEvent, NotificationDispatcher};
use crate::repo::attendance_repo::AttendanceRepository;
use crate::repo::roster_repo::RosterRepository;
use chrono::Utc;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

pub struct AttendanceService<A: AttendanceRepository, R: RosterRepository> {
    marks: A,
    roster: R,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl<A: AttendanceRepository, R: RosterRepository> AttendanceService<A, R> {
    pub fn new(marks: A, roster: R, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            marks,
            roster,
            dispatcher,
        }
    }

    /// Marks the subject for the day unless already marked.
    ///
    /// A replay returns the stored mark with `created = false`; a differing
    /// `status` on replay is ignored, not applied.
    pub fn mark(
        &self,
        subject_id: PersonId,
        subject_kind: SubjectKind,
        date: impl Into<DayInput>,
        status: AttendanceStatus,
    ) -> CoreResult<MarkOutcome> {
        let key = resolve_attendance_key(subject_id, subject_kind, date)?;
        if !self.roster.subject_exists(subject_kind, subject_id)? {
            return Err(CoreError::SubjectNotFound {
                kind: subject_kind,
                id: subject_id,
            });
        }

        if let Some(existing) = self.marks.find_mark(&key)? {
            log_mark(&existing, false);
            return Ok(MarkOutcome {
                mark: existing,
                created: false,
            });
        }

        let candidate = AttendanceMark {
            id: Uuid::new_v4(),
            subject_id,
            subject_kind,
            date: key.day,
            status,
            created_at: Utc::now().timestamp_millis(),
        };
        let (mark, created) = self.marks.insert_mark_if_absent(&candidate)?;
        log_mark(&mark, created);

        if created {
            dispatch_isolated(
                self.dispatcher.as_ref(),
                &DomainEvent::AttendanceMarked {
                    subject_id: mark.subject_id,
                    subject_kind: mark.subject_kind,
                    date: mark.date,
                    status: mark.status,
                },
            );
        }
        Ok(MarkOutcome { mark, created })
    }

    /// Stored status for the day, `None` when unmarked.
    pub fn get_marked_status(
        &self,
        subject_id: PersonId,
        subject_kind: SubjectKind,
        date: impl Into<DayInput>,
    ) -> CoreResult<Option<AttendanceStatus>> {
        let key = resolve_attendance_key(subject_id, subject_kind, date)?;
        Ok(self.marks.find_mark(&key)?.map(|mark| mark.status))
    }

    pub fn list_day(
        &self,
        subject_kind: SubjectKind,
        date: impl Into<DayInput>,
    ) -> CoreResult<Vec<AttendanceMark>> {
        let day = resolve_day(date)?;
        Ok(self.marks.list_day(subject_kind, day)?)
    }

    /// Present/absent counts over an inclusive day range.
    pub fn summarize(
        &self,
        subject_id: PersonId,
        subject_kind: SubjectKind,
        from: impl Into<DayInput>,
        to: impl Into<DayInput>,
    ) -> CoreResult<AttendanceSummary> {
        let from = resolve_day(from)?;
        let to = resolve_day(to)?;
        if from > to {
            return Err(PeriodError::InvertedRange { from, to }.into());
        }
        if !self.roster.subject_exists(subject_kind, subject_id)? {
            return Err(CoreError::SubjectNotFound {
                kind: subject_kind,
                id: subject_id,
            });
        }
        Ok(self.marks.summarize(subject_id, subject_kind, from, to)?)
    }
}

fn log_mark(mark: &AttendanceMark, created: bool) {
    info!(
        "event=attendance_mark module=attendance status={} mark_id={} kind={} day={} mark_status={}",
        if created { "ok" } else { "replay" },
        mark.id,
        mark.subject_kind.as_str(),
        mark.date,
        mark.status.as_str()
    );
}
