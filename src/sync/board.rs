use anyhow::Result;
use chrono::NaiveDate;
use futures::{stream, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::BoardConfig;
use crate::error::SyncError;
use crate::model::board::{BoardList, BoardSummary, Card, ListRole};
use crate::model::issue::RepoRef;
use crate::providers::{BoardClient, TrackerClient};

use super::directory::{LabelColors, UserDirectory};
use super::engine::{ensure_live, until_cancelled, Reconciler, SyncReport};
use super::snapshot::{BoardSnapshot, ListCards, ResolvedLists};

const LIST_FETCH_CONCURRENCY: usize = 4;

/// Runs the reconciliation passes for one configured board.
pub struct BoardSync<'a> {
    config: &'a BoardConfig,
    users: &'a UserDirectory,
    colors: LabelColors,
    board: &'a dyn BoardClient,
    tracker: &'a dyn TrackerClient,
    cancel: CancellationToken,
}

impl<'a> BoardSync<'a> {
    pub fn new(
        config: &'a BoardConfig,
        users: &'a UserDirectory,
        board: &'a dyn BoardClient,
        tracker: &'a dyn TrackerClient,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            users,
            colors: LabelColors::new(config.colors.clone()),
            board,
            tracker,
            cancel,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self.board, self.tracker, self.users, &self.colors, &self.cancel)
    }

    /// `repo_to` feeds TODO, every `repos_from` feeds BACKLOG.
    fn issue_sources(&self) -> Vec<(RepoRef, ListRole)> {
        std::iter::once((self.config.repo_to.clone(), ListRole::Todo))
            .chain(
                self.config
                    .repos_from
                    .iter()
                    .map(|r| (r.clone(), ListRole::Backlog)),
            )
            .collect()
    }

    async fn resolve_board(&self) -> Result<(BoardSummary, Vec<BoardList>, ResolvedLists)> {
        let summary = self
            .board
            .list_boards()
            .await?
            .into_iter()
            .find(|b| b.name == self.config.name)
            .ok_or_else(|| SyncError::BoardNotFound {
                board: self.config.name.clone(),
            })?;
        let lists = self.board.list_lists(&summary.id).await?;
        let roles = ResolvedLists::resolve(&self.config.name, &lists, &self.config.lists)?;
        Ok((summary, lists, roles))
    }

    /// Resolves the list roles and fetches every card, building the link
    /// index before any pass runs.
    pub async fn setup(&self) -> Result<BoardSnapshot> {
        let (summary, lists, roles) = self.resolve_board().await?;
        let fetch = stream::iter(&lists)
            .map(|l| self.board.list_cards(&l.id))
            .buffered(LIST_FETCH_CONCURRENCY)
            .try_collect();
        let cards: Vec<Vec<Card>> = until_cancelled(&self.cancel, fetch).await?;

        let lists = lists
            .into_iter()
            .zip(cards)
            .map(|(list, cards)| ListCards { list, cards })
            .collect();
        let snapshot = BoardSnapshot::new(summary, roles, lists);
        info!(board = %self.config.name, linked = snapshot.links.len(), "found linked cards");
        Ok(snapshot)
    }

    /// Full cycle: close issues, move cards, create issues, create cards,
    /// then repair backlinks.
    pub async fn synchronize(&self) -> Result<SyncReport> {
        info!(board = %self.config.name, "handling board");
        let mut snapshot = self.setup().await?;
        let engine = self.reconciler();
        let mut report = SyncReport::default();

        engine.close_issues(&mut snapshot, &mut report).await?;
        engine
            .move_cards_with_closed_issue(&mut snapshot, &mut report)
            .await?;
        engine
            .new_cards_to_issues(&self.config.repo_to, &mut snapshot, &mut report)
            .await?;
        engine
            .new_issues_to_cards(&self.issue_sources(), &mut snapshot, &mut report)
            .await?;
        self.backlinks(&snapshot, &engine, &mut report).await?;

        Ok(report)
    }

    /// Link repair only: setup followed by the backlink pass.
    pub async fn add_trello_link_to_issues(&self) -> Result<SyncReport> {
        info!(board = %self.config.name, "adding card links to issues");
        let snapshot = self.setup().await?;
        let mut report = SyncReport::default();
        self.backlinks(&snapshot, &self.reconciler(), &mut report)
            .await?;
        Ok(report)
    }

    async fn backlinks(
        &self,
        snapshot: &BoardSnapshot,
        engine: &Reconciler<'_>,
        report: &mut SyncReport,
    ) -> Result<()> {
        ensure_live(&self.cancel)?;
        let cards = until_cancelled(
            &self.cancel,
            self.board.list_cards_on_board(&snapshot.board.id),
        )
        .await?;
        engine.add_backlinks(&cards, report).await
    }

    /// Renames the DONE list after the week of `today`, archives it and puts
    /// a fresh DONE list right after it.
    pub async fn archive_done(&self, today: NaiveDate) -> Result<BoardList> {
        let (summary, _, roles) = self.resolve_board().await?;
        let mut done = roles.done;
        let archived_name = format!("Done KW{}", today.format("%W"));

        ensure_live(&self.cancel)?;
        self.board.rename_list(&mut done, &archived_name).await?;
        self.board.close_list(&done).await?;
        let fresh = self
            .board
            .create_list(&summary.id, &self.config.lists.done, done.pos + 1.0)
            .await?;
        info!(board = %self.config.name, archived = %archived_name, "archived done list");
        Ok(fresh)
    }
}
