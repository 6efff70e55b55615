//! `academy` command-line entry point.
//!
//! # Responsibility
//! - Load configuration, apply flag overrides, start logging.
//! - Open one migrated connection and dispatch the subcommand.

mod args;
mod commands;

use academy_core::{
    init_logging, open_db, ConfigError, CoreConfig, DbError, LogDispatcher, SubjectKind,
};
use args::{Cli, Command};
use clap::Parser;
use commands::{CommandError, Context};
use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logging(#[from] academy_core::logging::LoggingError),
    #[error("failed to open database: {0}")]
    Db(#[from] DbError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = CoreConfig::load_or_default(cli.config.as_deref())?;
    config.apply_overrides(cli.to_config_overrides());
    init_logging(config.log_level(), config.log_dir())?;

    let policy = config.access_policy()?;
    let db_path = config.database_path();
    let conn = open_db(&db_path)?;
    info!(
        "event=cli_run module=cli status=start db={} role={}",
        db_path.display(),
        cli.role.as_deref().unwrap_or("none")
    );

    let ctx = Context {
        conn: &conn,
        policy: &policy,
        role: cli.role.as_deref(),
        dispatcher: Arc::new(LogDispatcher),
    };

    match cli.command {
        Command::Init => {
            println!("database ready at {}", db_path.display());
            Ok(())
        }
        Command::Student { action } => commands::student(&ctx, action),
        Command::Parent { action } => commands::parent(&ctx, action),
        Command::Coach { action } => commands::member(&ctx, SubjectKind::Coach, action),
        Command::Staff { action } => commands::member(&ctx, SubjectKind::Staff, action),
        Command::Plan { action } => commands::plan(&ctx, action),
        Command::Fee { action } => commands::fee(&ctx, action),
        Command::Attendance { action } => commands::attendance(&ctx, action),
        Command::Access { action } => commands::access(&ctx, action),
    }?;
    Ok(())
}
