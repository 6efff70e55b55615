//! Request boundary for dashboard callers.
//!
//! # Responsibility
//! - Accept the external request shapes of the ledger and the register.
//! - Consult the access policy before any operation runs.
//! - Wrap outcomes into a discriminated envelope with a readable message.
//!
//! # Invariants
//! - No ledger/register call is reachable without a passing access check.
//! - Every request owns its connection borrow; nothing is shared between
//!   requests except the store itself.

use crate::access::AccessPolicy;
use crate::error::CoreResult;
use crate::model::attendance::{AttendanceStatus, SubjectKind};
use crate::model::fee::{MarkPaidOptions, MonthlyFeeRecord, PeriodSummary};
use crate::model::money::Money;
use crate::model::PersonId;
use crate::notify::NotificationDispatcher;
use crate::repo::attendance_repo::SqliteAttendanceRepository;
use crate::repo::fee_repo::SqliteFeeRepository;
use crate::repo::roster_repo::SqliteRosterRepository;
use crate::service::attendance_service::AttendanceService;
use crate::service::fee_service::FeeService;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ROUTE_FEE_ENSURE: &str = "/api/fees/ensure";
pub const ROUTE_FEE_PAY: &str = "/api/fees/pay";
pub const ROUTE_FEE_YEAR: &str = "/api/fees/year";
pub const ROUTE_ATTENDANCE_MARK: &str = "/api/attendance/mark";
pub const ROUTE_ATTENDANCE_STATUS: &str = "/api/attendance/status";

/// Ensure-or-pay request for one student-period.
///
/// Amounts are minor units. With `paid_amount` set the request records a
/// payment; otherwise it only ensures the bill exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRequest {
    pub student_id: PersonId,
    pub month: u32,
    pub year: i32,
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub paid_amount: Option<Money>,
    #[serde(default)]
    pub send_email: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListYearRequest {
    pub student_id: PersonId,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkAttendanceRequest {
    pub subject_id: PersonId,
    pub subject_kind: SubjectKind,
    /// `YYYY-MM-DD` or a timestamp; truncated to the calendar day.
    pub date: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkAttendanceResponse {
    pub status: AttendanceStatus,
    pub created: bool,
}

/// Success/failure envelope handed back to UI callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error_code: Option<String>,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn from_result(result: CoreResult<T>, success_message: impl Into<String>) -> Self {
        match result {
            Ok(data) => Self {
                ok: true,
                data: Some(data),
                error_code: None,
                message: success_message.into(),
            },
            Err(err) => Self {
                ok: false,
                data: None,
                error_code: Some(err.code().to_string()),
                message: err.to_string(),
            },
        }
    }
}

/// Access-gated entry point over one connection.
pub struct Gateway<'a> {
    conn: &'a Connection,
    policy: &'a AccessPolicy,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl<'a> Gateway<'a> {
    pub fn new(
        conn: &'a Connection,
        policy: &'a AccessPolicy,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            conn,
            policy,
            dispatcher,
        }
    }

    pub fn check_access(&self, route_path: &str, role: Option<&str>) -> bool {
        self.policy.is_allowed(route_path, role)
    }

    /// Ensures the bill, and records a payment when `paid_amount` is set.
    pub fn submit_fee(
        &self,
        role: Option<&str>,
        request: &FeeRequest,
    ) -> CoreResult<MonthlyFeeRecord> {
        match request.paid_amount {
            Some(paid_amount) => {
                self.policy.require(ROUTE_FEE_PAY, role)?;
                self.fee_service().mark_paid(
                    request.student_id,
                    request.month,
                    request.year,
                    paid_amount,
                    MarkPaidOptions {
                        send_email: request.send_email,
                        amount: request.amount,
                    },
                )
            }
            None => {
                self.policy.require(ROUTE_FEE_ENSURE, role)?;
                self.fee_service().ensure_monthly_record(
                    request.student_id,
                    request.month,
                    request.year,
                    request.amount,
                )
            }
        }
    }

    pub fn list_year(
        &self,
        role: Option<&str>,
        request: &ListYearRequest,
    ) -> CoreResult<Vec<PeriodSummary>> {
        self.policy.require(ROUTE_FEE_YEAR, role)?;
        self.fee_service()
            .list_year(request.student_id, request.year)
    }

    pub fn mark_attendance(
        &self,
        role: Option<&str>,
        request: &MarkAttendanceRequest,
    ) -> CoreResult<MarkAttendanceResponse> {
        self.policy.require(ROUTE_ATTENDANCE_MARK, role)?;
        let outcome = self.attendance_service().mark(
            request.subject_id,
            request.subject_kind,
            request.date.as_str(),
            request.status,
        )?;
        Ok(MarkAttendanceResponse {
            status: outcome.mark.status,
            created: outcome.created,
        })
    }

    pub fn marked_status(
        &self,
        role: Option<&str>,
        subject_id: PersonId,
        subject_kind: SubjectKind,
        date: &str,
    ) -> CoreResult<Option<AttendanceStatus>> {
        self.policy.require(ROUTE_ATTENDANCE_STATUS, role)?;
        self.attendance_service()
            .get_marked_status(subject_id, subject_kind, date)
    }

    fn fee_service(&self) -> FeeService<SqliteFeeRepository<'a>, SqliteRosterRepository<'a>> {
        FeeService::new(
            SqliteFeeRepository::new(self.conn),
            SqliteRosterRepository::new(self.conn),
            Arc::clone(&self.dispatcher),
        )
    }

    fn attendance_service(
        &self,
    ) -> AttendanceService<SqliteAttendanceRepository<'a>, SqliteRosterRepository<'a>> {
        AttendanceService::new(
            SqliteAttendanceRepository::new(self.conn),
            SqliteRosterRepository::new(self.conn),
            Arc::clone(&self.dispatcher),
        )
    }
}
