//! Command handlers.
//!
//! Every handler checks the access policy for its route before touching the
//! ledger or the register. Results are printed as JSON on stdout.

use crate::args::{
    AccessCommand, AttendanceCommand, FeeCommand, NamedCommand, PlanCommand, StudentCommand,
};
use academy_core::{
    AccessPolicy, AttendanceService, CoreError, FeeRequest, FeeService, Gateway, ListYearRequest,
    MarkAttendanceRequest, NotificationDispatcher, RosterService, SqliteAttendanceRepository,
    SqliteFeeRepository, SqliteRosterRepository, SubjectKind,
};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

const ROUTE_ROSTER: &str = "/api/roster";
const ROUTE_PLANS: &str = "/api/plans";
const ROUTE_FEE_PERIOD: &str = "/api/fees/period";
const ROUTE_FEE_GENERATE: &str = "/api/fees/generate";
const ROUTE_FEE_DELETE: &str = "/api/fees/delete";
const ROUTE_ATTENDANCE_DAY: &str = "/api/attendance/day";
const ROUTE_ATTENDANCE_SUMMARY: &str = "/api/attendance/summary";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Per-invocation state shared by all handlers.
pub struct Context<'a> {
    pub conn: &'a Connection,
    pub policy: &'a AccessPolicy,
    pub role: Option<&'a str>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
}

impl<'a> Context<'a> {
    fn require(&self, route: &str) -> Result<(), CommandError> {
        Ok(self.policy.require(route, self.role)?)
    }

    fn gateway(&self) -> Gateway<'a> {
        Gateway::new(self.conn, self.policy, Arc::clone(&self.dispatcher))
    }

    fn roster(&self) -> RosterService<SqliteRosterRepository<'a>> {
        RosterService::new(SqliteRosterRepository::new(self.conn))
    }

    fn fees(&self) -> FeeService<SqliteFeeRepository<'a>, SqliteRosterRepository<'a>> {
        FeeService::new(
            SqliteFeeRepository::new(self.conn),
            SqliteRosterRepository::new(self.conn),
            Arc::clone(&self.dispatcher),
        )
    }

    fn attendance(
        &self,
    ) -> AttendanceService<SqliteAttendanceRepository<'a>, SqliteRosterRepository<'a>> {
        AttendanceService::new(
            SqliteAttendanceRepository::new(self.conn),
            SqliteRosterRepository::new(self.conn),
            Arc::clone(&self.dispatcher),
        )
    }
}

pub fn student(ctx: &Context<'_>, action: StudentCommand) -> Result<(), CommandError> {
    ctx.require(&format!("{ROUTE_ROSTER}/students"))?;
    match action {
        StudentCommand::Add { name, parent } => {
            print_json(&ctx.roster().add_student(name, parent)?)
        }
        StudentCommand::Activate { id } => {
            ctx.roster().set_student_active(id, true)?;
            print_json(&ctx.roster().get_student(id)?)
        }
        StudentCommand::Deactivate { id } => {
            ctx.roster().set_student_active(id, false)?;
            print_json(&ctx.roster().get_student(id)?)
        }
    }
}

pub fn parent(ctx: &Context<'_>, action: NamedCommand) -> Result<(), CommandError> {
    ctx.require(&format!("{ROUTE_ROSTER}/parents"))?;
    let NamedCommand::Add { name, email } = action;
    print_json(&ctx.roster().add_parent(name, email)?)
}

/// Adds a coach or staff member.
pub fn member(
    ctx: &Context<'_>,
    kind: SubjectKind,
    action: NamedCommand,
) -> Result<(), CommandError> {
    ctx.require(&format!("{ROUTE_ROSTER}/{}", kind.as_str()))?;
    let NamedCommand::Add { name, email } = action;
    if email.is_some() {
        return Err(CoreError::InvalidInput("--email applies to parents only".to_string()).into());
    }
    print_json(&ctx.roster().add_member(kind, name)?)
}

pub fn plan(ctx: &Context<'_>, action: PlanCommand) -> Result<(), CommandError> {
    ctx.require(ROUTE_PLANS)?;
    let fees = ctx.fees();
    match action {
        PlanCommand::Add {
            name,
            amount,
            default,
        } => print_json(&fees.create_plan(name, amount, default)?),
        PlanCommand::Default { id } => {
            fees.set_default_plan(id)?;
            print_json(&fees.active_default_plan()?)
        }
        PlanCommand::Delete { id } => {
            fees.delete_plan(id)?;
            println!("deleted plan {id}");
            Ok(())
        }
        PlanCommand::List => print_json(&fees.list_plans()?),
    }
}

pub fn fee(ctx: &Context<'_>, action: FeeCommand) -> Result<(), CommandError> {
    match action {
        FeeCommand::Ensure {
            student,
            month,
            year,
            amount,
        } => {
            let request = FeeRequest {
                student_id: student,
                month,
                year,
                amount,
                paid_amount: None,
                send_email: false,
            };
            print_json(&ctx.gateway().submit_fee(ctx.role, &request)?)
        }
        FeeCommand::Pay {
            student,
            month,
            year,
            paid,
            amount,
            send_email,
        } => {
            let request = FeeRequest {
                student_id: student,
                month,
                year,
                amount,
                paid_amount: Some(paid),
                send_email,
            };
            print_json(&ctx.gateway().submit_fee(ctx.role, &request)?)
        }
        FeeCommand::Year { student, year } => {
            let request = ListYearRequest {
                student_id: student,
                year,
            };
            print_json(&ctx.gateway().list_year(ctx.role, &request)?)
        }
        FeeCommand::Period { month, year } => {
            ctx.require(ROUTE_FEE_PERIOD)?;
            print_json(&ctx.fees().list_period(month, year)?)
        }
        FeeCommand::Generate { month, year } => {
            ctx.require(ROUTE_FEE_GENERATE)?;
            let report = ctx.fees().generate_month(month, year)?;
            info!(
                "event=cli_fee_generate module=cli status=ok created={} existing={}",
                report.created, report.existing
            );
            print_json(&report)
        }
        FeeCommand::Delete { id } => {
            ctx.require(ROUTE_FEE_DELETE)?;
            ctx.fees().delete_record(id)?;
            println!("deleted fee record {id}");
            Ok(())
        }
    }
}

pub fn attendance(ctx: &Context<'_>, action: AttendanceCommand) -> Result<(), CommandError> {
    match action {
        AttendanceCommand::Mark {
            kind,
            subject,
            date,
            status,
        } => {
            let request = MarkAttendanceRequest {
                subject_id: subject,
                subject_kind: kind.into(),
                date,
                status: status.into(),
            };
            print_json(&ctx.gateway().mark_attendance(ctx.role, &request)?)
        }
        AttendanceCommand::Status {
            kind,
            subject,
            date,
        } => {
            let status = ctx
                .gateway()
                .marked_status(ctx.role, subject, kind.into(), &date)?;
            match status {
                Some(status) => println!("{}", status.as_str()),
                None => println!("unmarked"),
            }
            Ok(())
        }
        AttendanceCommand::Day { kind, date } => {
            ctx.require(ROUTE_ATTENDANCE_DAY)?;
            print_json(&ctx.attendance().list_day(kind.into(), date)?)
        }
        AttendanceCommand::Summary {
            kind,
            subject,
            from,
            to,
        } => {
            ctx.require(ROUTE_ATTENDANCE_SUMMARY)?;
            print_json(&ctx.attendance().summarize(subject, kind.into(), from, to)?)
        }
    }
}

pub fn access(ctx: &Context<'_>, action: AccessCommand) -> Result<(), CommandError> {
    let AccessCommand::Check { route } = action;
    let allowed = ctx.policy.is_allowed(&route, ctx.role);
    println!(
        "{} {} {}",
        if allowed { "allow" } else { "deny" },
        route,
        ctx.role.unwrap_or("anonymous")
    );
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
