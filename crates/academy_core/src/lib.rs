//! Core domain logic for the academy fee ledger and attendance register.
//! This crate is the single source of truth for billing and attendance
//! invariants.

pub mod access;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod key;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;

pub use access::{AccessPolicy, AccessPolicyError, AccessRule};
pub use api::{
    ApiResponse, FeeRequest, Gateway, ListYearRequest, MarkAttendanceRequest,
    MarkAttendanceResponse,
};
pub use config::{ConfigError, ConfigOverrides, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use error::{CoreError, CoreResult};
pub use key::{resolve_attendance_key, resolve_fee_key, DayInput, PeriodError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::attendance::{
    AttendanceMark, AttendanceStatus, AttendanceSummary, MarkOutcome, SubjectKind,
};
pub use model::fee::{
    BatchReport, FeePlan, FeeStatus, MarkPaidOptions, MonthlyFeeRecord, PeriodSummary,
};
pub use model::money::Money;
pub use model::roster::{Member, Parent, Student};
pub use model::PersonId;
pub use notify::{
    DispatchError, DomainEvent, LogDispatcher, NoopDispatcher, NotificationDispatcher,
    QueueDispatcher,
};
pub use repo::attendance_repo::{AttendanceRepository, SqliteAttendanceRepository};
pub use repo::fee_repo::{FeeRepository, SqliteFeeRepository};
pub use repo::roster_repo::{RosterRepository, SqliteRosterRepository};
pub use repo::{RepoError, RepoResult};
pub use service::attendance_service::AttendanceService;
pub use service::fee_service::FeeService;
pub use service::roster_service::RosterService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
