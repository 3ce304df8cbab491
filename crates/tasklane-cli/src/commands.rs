//! Subcommands and their mapping onto `TaskService` calls.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use rusqlite::Connection;
use serde::Serialize;
use tasklane_core::{CategoryId, Principal, TaskId};
use tasklane_tasks::{
    Category, Checklist, ChecklistInput, ChecklistReplacement, Tag, TagRelease, Task,
    TaskCreateParams, TaskDeletion, TaskError, TaskPatch, TaskService, TaskSummary,
    TaskWithDetails,
};

/// Top-level command groups.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage categories.
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Manage tasks.
    #[command(subcommand)]
    Task(TaskCommand),
    /// Attach, detach, and list tags.
    #[command(subcommand)]
    Tag(TagCommand),
    /// Read or replace a task's checklists.
    #[command(subcommand)]
    Checklist(ChecklistCommand),
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    /// Create a category (admin only).
    Add {
        /// Category description.
        description: String,
    },
    /// List categories.
    List,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Create a task owned by the current user.
    Add {
        /// Task description.
        description: String,
        /// Category ID.
        #[arg(long)]
        category: String,
    },
    /// List visible tasks.
    List {
        /// Case-insensitive substring filter on the description.
        #[arg(long)]
        search: Option<String>,
    },
    /// Show a task with tags and checklists.
    Show(TaskRef),
    /// Change description and/or category.
    Edit {
        /// Task ID.
        id: String,
        /// New description.
        #[arg(long)]
        description: Option<String>,
        /// New category ID.
        #[arg(long)]
        category: Option<String>,
    },
    /// Mark a task completed.
    Done(TaskRef),
    /// Reopen a completed task.
    Reopen(TaskRef),
    /// Delete a task.
    Rm(TaskRef),
}

#[derive(Subcommand, Debug)]
pub enum TagCommand {
    /// Attach a tag, creating it on first use.
    Attach(TagRef),
    /// Detach a tag, deleting it when no task uses it any more.
    Detach(TagRef),
    /// List all tags.
    List,
}

#[derive(Subcommand, Debug)]
pub enum ChecklistCommand {
    /// Show a task's checklists.
    Show(TaskRef),
    /// Replace a task's checklists with the JSON array in a file.
    Set {
        /// Task ID.
        task: String,
        /// JSON file with the desired checklists (`-` for stdin).
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct TaskRef {
    /// Task ID.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct TagRef {
    /// Task ID.
    pub task: String,
    /// Tag description.
    pub tag: String,
}

/// Everything a command can return, printed as JSON.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Output {
    Category(Category),
    Categories(Vec<Category>),
    Task(Task),
    Tasks(Vec<TaskSummary>),
    Details(Box<TaskWithDetails>),
    Deleted(TaskDeletion),
    Tag(Tag),
    Tags(Vec<Tag>),
    Released(TagRelease),
    Checklists(Vec<Checklist>),
    Replaced(ChecklistReplacement),
}

/// Input that must be read before the transaction opens.
pub enum Prepared<'a> {
    /// Run as-is.
    Plain(&'a Command),
    /// Checklist replacement with its parsed body.
    ReplaceChecklists {
        task: TaskId,
        desired: Vec<ChecklistInput>,
    },
}

/// Read any file input the command needs.
pub fn prepare(command: &Command) -> Result<Prepared<'_>> {
    if let Command::Checklist(ChecklistCommand::Set { task, file }) = command {
        let raw = if file.as_os_str() == "-" {
            std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
        } else {
            std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))?
        };
        let desired: Vec<ChecklistInput> =
            serde_json::from_str(&raw).context("Checklist file must be a JSON array")?;
        return Ok(Prepared::ReplaceChecklists {
            task: TaskId::from(task.as_str()),
            desired,
        });
    }
    Ok(Prepared::Plain(command))
}

/// Run one prepared command on `conn`.
pub fn execute(
    conn: &Connection,
    principal: Option<&Principal>,
    prepared: &Prepared<'_>,
) -> Result<Output, TaskError> {
    let command = match prepared {
        Prepared::ReplaceChecklists { task, desired } => {
            return TaskService::replace_checklists(conn, principal, task, desired)
                .map(Output::Replaced);
        }
        Prepared::Plain(command) => *command,
    };

    match command {
        Command::Category(CategoryCommand::Add { description }) => {
            TaskService::create_category(conn, principal, description).map(Output::Category)
        }
        Command::Category(CategoryCommand::List) => {
            TaskService::list_categories(conn, principal).map(Output::Categories)
        }

        Command::Task(TaskCommand::Add {
            description,
            category,
        }) => TaskService::create_task(
            conn,
            principal,
            &TaskCreateParams {
                description: description.clone(),
                category_id: CategoryId::from(category.as_str()),
            },
        )
        .map(Output::Task),
        Command::Task(TaskCommand::List { search }) => {
            TaskService::list_tasks(conn, principal, search.as_deref()).map(Output::Tasks)
        }
        Command::Task(TaskCommand::Show(r)) => {
            TaskService::get_task(conn, principal, &task_id(&r.id))
                .map(|d| Output::Details(Box::new(d)))
        }
        Command::Task(TaskCommand::Edit {
            id,
            description,
            category,
        }) => TaskService::patch_task(
            conn,
            principal,
            &task_id(id),
            &TaskPatch {
                description: description.clone(),
                category_id: category.as_deref().map(CategoryId::from),
            },
        )
        .map(Output::Task),
        Command::Task(TaskCommand::Done(r)) => {
            TaskService::complete_task(conn, principal, &task_id(&r.id)).map(Output::Task)
        }
        Command::Task(TaskCommand::Reopen(r)) => {
            TaskService::reopen_task(conn, principal, &task_id(&r.id)).map(Output::Task)
        }
        Command::Task(TaskCommand::Rm(r)) => {
            TaskService::delete_task(conn, principal, &task_id(&r.id)).map(Output::Deleted)
        }

        Command::Tag(TagCommand::Attach(r)) => {
            TaskService::attach_tag(conn, principal, &task_id(&r.task), &r.tag).map(Output::Tag)
        }
        Command::Tag(TagCommand::Detach(r)) => {
            TaskService::detach_tag(conn, principal, &task_id(&r.task), &r.tag)
                .map(Output::Released)
        }
        Command::Tag(TagCommand::List) => TaskService::list_tags(conn, principal).map(Output::Tags),

        Command::Checklist(ChecklistCommand::Show(r)) => {
            TaskService::get_checklists(conn, principal, &task_id(&r.id)).map(Output::Checklists)
        }
        Command::Checklist(ChecklistCommand::Set { task, .. }) => Err(TaskError::InvalidState {
            code: "UNPREPARED_INPUT",
            message: format!("checklist body for {task} was not loaded"),
        }),
    }
}

fn task_id(raw: &str) -> TaskId {
    TaskId::from(raw)
}
