//! CLI argument definitions for the `academy` binary.

use academy_core::config::ConfigOverrides;
use academy_core::{AttendanceStatus, Money, SubjectKind};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "academy", version, about = "Academy fee ledger and attendance register")]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SQLite database file; overrides `[database] path`.
    #[arg(long, global = true, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Log level; overrides `[logging] level`.
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevelArg>,

    /// Role the command runs as, checked against the access policy.
    #[arg(long, global = true)]
    pub role: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn to_config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            db_path: self.db.clone(),
            log_level: self.log_level.map(|level| level.as_str().to_string()),
            log_dir: None,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevelArg {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum KindArg {
    Student,
    Coach,
    Staff,
}

impl From<KindArg> for SubjectKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Student => Self::Student,
            KindArg::Coach => Self::Coach,
            KindArg::Staff => Self::Staff,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum StatusArg {
    Present,
    Absent,
}

impl From<StatusArg> for AttendanceStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Present => Self::Present,
            StatusArg::Absent => Self::Absent,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create or migrate the database.
    Init,
    /// Manage students.
    Student {
        #[command(subcommand)]
        action: StudentCommand,
    },
    /// Manage parents.
    Parent {
        #[command(subcommand)]
        action: NamedCommand,
    },
    /// Manage coaches.
    Coach {
        #[command(subcommand)]
        action: NamedCommand,
    },
    /// Manage staff members.
    Staff {
        #[command(subcommand)]
        action: NamedCommand,
    },
    /// Manage fee plans.
    Plan {
        #[command(subcommand)]
        action: PlanCommand,
    },
    /// Monthly fee ledger.
    Fee {
        #[command(subcommand)]
        action: FeeCommand,
    },
    /// Daily attendance register.
    Attendance {
        #[command(subcommand)]
        action: AttendanceCommand,
    },
    /// Route access policy.
    Access {
        #[command(subcommand)]
        action: AccessCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum StudentCommand {
    Add {
        name: String,
        #[arg(long)]
        parent: Uuid,
    },
    /// Exclude a student from batch fee generation.
    Deactivate { id: Uuid },
    Activate { id: Uuid },
}

#[derive(Debug, Subcommand)]
pub enum NamedCommand {
    Add {
        name: String,
        /// Contact address; parents only.
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum PlanCommand {
    Add {
        name: String,
        #[arg(value_parser = parse_money)]
        amount: Money,
        /// Make this the monthly default plan.
        #[arg(long)]
        default: bool,
    },
    Default { id: Uuid },
    Delete { id: Uuid },
    List,
}

#[derive(Debug, Subcommand)]
pub enum FeeCommand {
    /// Create the bill for a student-period unless it exists.
    Ensure {
        student: Uuid,
        month: u32,
        year: i32,
        /// Bill amount; defaults to the active default plan.
        #[arg(long, value_parser = parse_money)]
        amount: Option<Money>,
    },
    /// Record a payment total for a student-period.
    Pay {
        student: Uuid,
        month: u32,
        year: i32,
        #[arg(value_parser = parse_money)]
        paid: Money,
        #[arg(long, value_parser = parse_money)]
        amount: Option<Money>,
        /// Emit a payment notification.
        #[arg(long)]
        send_email: bool,
    },
    /// Twelve-month view for one student.
    Year { student: Uuid, year: i32 },
    /// Every bill in one period.
    Period { month: u32, year: i32 },
    /// Bill every active student with the default plan.
    Generate { month: u32, year: i32 },
    Delete { id: Uuid },
}

#[derive(Debug, Subcommand)]
pub enum AttendanceCommand {
    Mark {
        #[arg(value_enum)]
        kind: KindArg,
        subject: Uuid,
        /// `YYYY-MM-DD` or an RFC 3339 timestamp.
        date: String,
        #[arg(value_enum)]
        status: StatusArg,
    },
    Status {
        #[arg(value_enum)]
        kind: KindArg,
        subject: Uuid,
        date: String,
    },
    Day {
        #[arg(value_enum)]
        kind: KindArg,
        date: String,
    },
    Summary {
        #[arg(value_enum)]
        kind: KindArg,
        subject: Uuid,
        from: String,
        to: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum AccessCommand {
    /// Print whether `--role` may reach ROUTE.
    Check { route: String },
}

fn parse_money(value: &str) -> Result<Money, String> {
    Money::parse(value).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, FeeCommand};
    use academy_core::Money;
    use clap::Parser;

    #[test]
    fn fee_pay_parses_decimal_amounts() {
        let cli = Cli::try_parse_from([
            "academy",
            "--role",
            "admin",
            "fee",
            "pay",
            "7f1c1d8e-7a63-4a4e-9c7d-1f7f3a9f6a01",
            "3",
            "2025",
            "49.50",
            "--send-email",
        ])
        .unwrap();
        assert_eq!(cli.role.as_deref(), Some("admin"));
        match cli.command {
            Command::Fee {
                action:
                    FeeCommand::Pay {
                        paid, send_email, ..
                    },
            } => {
                assert_eq!(paid, Money::from_minor(4950));
                assert!(send_email);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn malformed_amount_is_rejected() {
        let result = Cli::try_parse_from(["academy", "plan", "add", "Monthly", "12.345"]);
        assert!(result.is_err());
    }
}
