//! tasklane command-line client.
//!
//! Each invocation resolves the caller, opens the database, and runs one
//! facade operation inside a single transaction. Results go to stdout as
//! JSON; domain failures print their code and exit non-zero.

#![deny(unsafe_code)]

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tasklane_core::Principal;
use tasklane_core::logging::init_subscriber;
use tasklane_settings::{TasklaneSettings, load_settings, load_settings_from_path};
use tasklane_store::Database;
use tasklane_tasks::TaskError;
use tracing::debug;

use crate::commands::{Command, Output, execute, prepare};

/// tasklane - tasks, shared tags, and checklists over `SQLite`.
#[derive(Parser, Debug)]
#[command(name = "tasklane", about = "Task backend command-line client")]
pub(crate) struct Cli {
    /// Acting user ID. Omit to run unauthenticated.
    #[arg(long, global = true)]
    user: Option<String>,

    /// Act with admin rights.
    #[arg(long, global = true)]
    admin: bool,

    /// Settings file (defaults to ~/.tasklane/settings.json).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Database file, overriding settings.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Log level, overriding settings.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// The caller as the domain sees it.
    pub(crate) fn principal(&self) -> Option<Principal> {
        self.user.as_deref().map(|user| {
            if self.admin {
                Principal::admin(user)
            } else {
                Principal::user(user)
            }
        })
    }

    fn settings(&self) -> Result<TasklaneSettings> {
        let mut settings = match &self.settings {
            Some(path) => load_settings_from_path(path),
            None => load_settings(),
        }
        .context("Failed to load settings")?;

        if let Some(path) = &self.db_path {
            settings.database.path.clone_from(path);
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}

/// How an invocation ended.
enum Outcome {
    Done(Output),
    Rejected(TaskError),
}

fn run(cli: &Cli) -> Result<Outcome> {
    let settings = cli.settings()?;
    init_subscriber(&settings.logging.level);

    let prepared = prepare(&cli.command)?;
    let principal = cli.principal();

    let db = Database::open(&settings.database).with_context(|| {
        format!(
            "Failed to open database at {}",
            settings.database.path.display()
        )
    })?;
    debug!(path = %settings.database.path.display(), "database ready");

    Ok(
        match db.transaction(|tx| execute(tx, principal.as_ref(), &prepared)) {
            Ok(output) => Outcome::Done(output),
            Err(err) => Outcome::Rejected(err),
        },
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(Outcome::Done(output)) => match serde_json::to_string_pretty(&output) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: failed to render output: {err}");
                ExitCode::FAILURE
            }
        },
        Ok(Outcome::Rejected(err)) => {
            eprintln!("error [{}]: {err}", err.code());
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
