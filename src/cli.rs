use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{self, AppConfig, BoardConfig};
use crate::error::SyncError;
use crate::providers;
use crate::sync::{BoardSync, SyncReport, UserDirectory};

/// Keep Trello boards and GitHub issues in step
#[derive(Parser, Debug)]
#[command(name = "gitthello", version, about)]
pub struct Cli {
    /// Path to config file (default: ~/.gitthello/config.toml)
    #[arg(short, long, env = "GITTHELLO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run every synchronization pass
    Sync {
        /// Only this board
        #[arg(short, long)]
        board: Option<String>,
    },

    /// Add card links to issues that lack them
    Link {
        /// Only this board
        #[arg(short, long)]
        board: Option<String>,
    },

    /// Archive the Done list and start a fresh one
    ArchiveDone {
        /// Only this board
        #[arg(short, long)]
        board: Option<String>,
    },
}

impl Command {
    fn board_filter(&self) -> Option<&str> {
        match self {
            Command::Sync { board } | Command::Link { board } | Command::ArchiveDone { board } => {
                board.as_deref()
            }
        }
    }
}

/// Configured boards, narrowed to `only` when given.
pub fn select_boards<'a>(config: &'a AppConfig, only: Option<&str>) -> Result<Vec<&'a BoardConfig>> {
    match only {
        Some(name) => match config.board(name) {
            Some(board) => Ok(vec![board]),
            None => bail!("No board named '{name}' in config"),
        },
        None => Ok(config.boards.iter().collect()),
    }
}

fn log_report(board: &str, report: &SyncReport) {
    info!(
        board,
        issues_closed = report.issues_closed,
        cards_reopened = report.cards_reopened,
        cards_completed = report.cards_completed,
        issues_created = report.issues_created,
        cards_created = report.cards_created,
        backlinks_added = report.backlinks_added,
        "board done"
    );
}

async fn run_board(command: &Command, sync: &BoardSync<'_>) -> Result<()> {
    match command {
        Command::Sync { .. } => {
            let report = sync.synchronize().await?;
            log_report(sync.name(), &report);
        }
        Command::Link { .. } => {
            let report = sync.add_trello_link_to_issues().await?;
            log_report(sync.name(), &report);
        }
        Command::ArchiveDone { .. } => {
            let today = chrono::Local::now().date_naive();
            let list = sync.archive_done(today).await?;
            info!(board = sync.name(), list = %list.id, "fresh done list created");
        }
    }
    Ok(())
}

/// Runs `cli.command` for each selected board. A failing board is logged and
/// skipped; the run fails if any board failed.
pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let config = config::load_config(&path)?;
    let boards = select_boards(&config, cli.command.board_filter())?;

    let (board_client, tracker) = providers::create_clients(&config)?;
    let users = UserDirectory::new(config.github.members.clone());

    let mut failed = 0;
    for board in &boards {
        let sync = BoardSync::new(board, &users, &board_client, &tracker, cancel.clone());
        if let Err(e) = run_board(&cli.command, &sync).await {
            if matches!(e.downcast_ref::<SyncError>(), Some(SyncError::Cancelled)) {
                return Err(e);
            }
            error!(board = %board.name, "{e:#}");
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{failed} of {} board(s) failed", boards.len());
    }
    Ok(())
}
