//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "taskboard", version, about = "Taskboard command-line client")]
pub struct Cli {
    /// Config file (default: $TASKBOARD_CONFIG or ./taskboard.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log as JSON lines instead of plain text
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Print Prometheus metrics to stderr on exit
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Log in and store a new session
    Login {
        /// Account email (default: auth.email from the config)
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the session state
    Status,
    /// Print a fresh access token, refreshing if needed
    Token,
    /// List projects
    Projects,
    /// List tasks of a project, or your own tasks
    Tasks {
        #[arg(long)]
        project: Option<u64>,
    },
    /// List teams
    Teams,
    /// Show the logged-in user
    Me,
    /// Control the task timer
    Timer {
        #[command(subcommand)]
        action: TimerAction,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum TimerAction {
    /// Start timing a task from zero
    Start { task_id: String },
    /// Stop the running timer
    Stop,
    /// Clear the timer
    Reset,
    /// Show the timer
    Status,
}
