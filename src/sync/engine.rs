use std::collections::HashMap;
use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::model::board::{Card, CardPosition, ListRole, NewCard};
use crate::model::issue::{Comment, Issue, IssueRef, IssueState, RepoRef};
use crate::providers::{BoardClient, TrackerClient};

use super::directory::{LabelColors, UserDirectory};
use super::link::{parse_issue_url, resolve, LINK_ATTACHMENT_NAME};
use super::snapshot::BoardSnapshot;
use super::text::truncate;

/// Prefix for the title of every card created from an issue.
pub const CARD_TITLE_PREFIX: &str = "{bug}";

/// Issue fetches in flight at once within a pass.
const FETCH_CONCURRENCY: usize = 8;

/// Counts of what one run changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub issues_closed: usize,
    pub cards_reopened: usize,
    pub cards_completed: usize,
    pub issues_created: usize,
    pub cards_created: usize,
    pub backlinks_added: usize,
}

/// What to do with a linked card sitting in DONE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneCardAction {
    CloseIssue,
    ReopenCard,
    Nothing,
}

/// Card moved to DONE after the issue's last update closes the issue; an
/// open issue updated after the card moved sends the card back to TODO.
/// Equal timestamps do nothing.
pub fn decide_done_card(
    card_activity: DateTime<Utc>,
    issue_updated: DateTime<Utc>,
    state: IssueState,
) -> DoneCardAction {
    if card_activity > issue_updated {
        DoneCardAction::CloseIssue
    } else if card_activity < issue_updated && state == IssueState::Open {
        DoneCardAction::ReopenCard
    } else {
        DoneCardAction::Nothing
    }
}

pub fn format_comment(comment: &Comment) -> String {
    format!(
        "**{}** on {}:\r\n-------\r\n{}",
        comment.author,
        comment.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        comment.body
    )
}

pub(crate) fn ensure_live(cancel: &CancellationToken) -> Result<(), SyncError> {
    if cancel.is_cancelled() {
        Err(SyncError::Cancelled)
    } else {
        Ok(())
    }
}

/// Awaits a remote read, giving up as soon as `cancel` fires.
pub(crate) async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled.into()),
        result = fut => result,
    }
}

/// Key an issue is indexed under: its canonical URL when that parses.
fn link_key(issue: &Issue) -> IssueRef {
    parse_issue_url(&issue.html_url).unwrap_or_else(|| issue.issue_ref())
}

/// Applies the reconciliation passes to a board snapshot.
pub struct Reconciler<'a> {
    board: &'a dyn BoardClient,
    tracker: &'a dyn TrackerClient,
    users: &'a UserDirectory,
    colors: &'a LabelColors,
    cancel: &'a CancellationToken,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        board: &'a dyn BoardClient,
        tracker: &'a dyn TrackerClient,
        users: &'a UserDirectory,
        colors: &'a LabelColors,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            board,
            tracker,
            users,
            colors,
            cancel,
        }
    }

    /// Fetches issues concurrently, returned in the order of `refs`.
    async fn fetch_issues(&self, refs: &[IssueRef]) -> Result<Vec<Issue>> {
        ensure_live(self.cancel)?;
        let fetch = stream::iter(refs)
            .map(|r| self.tracker.get_issue(r))
            .buffered(FETCH_CONCURRENCY)
            .try_collect();
        until_cancelled(self.cancel, fetch).await
    }

    /// Board member ids for a tracker assignee. Any miss yields no members.
    async fn member_ids_for(&self, login: Option<&str>) -> Vec<String> {
        let Some(login) = login else {
            return Vec::new();
        };
        let Some(username) = self.users.board_username(login) else {
            debug!(login, "assignee not in user directory");
            return Vec::new();
        };
        match self.board.find_member_id(username).await {
            Ok(Some(id)) => vec![id],
            Ok(None) => {
                debug!(username, "no board member with that username");
                Vec::new()
            }
            Err(e) => {
                warn!(username, error = %format!("{e:#}"), "member lookup failed");
                Vec::new()
            }
        }
    }

    /// Pass A: reconcile linked cards already in DONE.
    pub async fn close_issues(&self, snapshot: &mut BoardSnapshot, report: &mut SyncReport) -> Result<()> {
        let todo_id = snapshot.roles.todo.id.clone();
        let linked: Vec<(Card, IssueRef)> = snapshot
            .cards_in(&snapshot.roles.done.id)
            .iter()
            .filter_map(|c| resolve(c).map(|r| (c.clone(), r)))
            .collect();
        let refs: Vec<IssueRef> = linked.iter().map(|(_, r)| r.clone()).collect();
        let issues = self.fetch_issues(&refs).await?;

        for ((mut card, issue_ref), issue) in linked.into_iter().zip(issues) {
            match decide_done_card(card.last_activity, issue.updated_at, issue.state) {
                DoneCardAction::CloseIssue => {
                    ensure_live(self.cancel)?;
                    info!(card = %card.id, issue = %issue_ref, "closing issue of done card");
                    self.tracker.close_issue(&issue_ref).await?;
                    report.issues_closed += 1;
                }
                DoneCardAction::ReopenCard => {
                    ensure_live(self.cancel)?;
                    info!(card = %card.id, issue = %issue_ref, "issue reopened, moving card to todo");
                    self.board.move_card(&mut card, &todo_id).await?;
                    snapshot.relocate_card(card, CardPosition::Bottom);
                    report.cards_reopened += 1;
                }
                DoneCardAction::Nothing => {}
            }
        }
        Ok(())
    }

    /// Pass B: cards outside DONE whose issue was closed move to the top of
    /// DONE, pick up the issue's assignee and get its comments appended.
    pub async fn move_cards_with_closed_issue(
        &self,
        snapshot: &mut BoardSnapshot,
        report: &mut SyncReport,
    ) -> Result<()> {
        let done_id = snapshot.roles.done.id.clone();
        let linked: Vec<(Card, IssueRef)> = snapshot
            .cards_outside(&done_id)
            .filter_map(|c| resolve(c).map(|r| (c.clone(), r)))
            .collect();
        let refs: Vec<IssueRef> = linked.iter().map(|(_, r)| r.clone()).collect();
        let issues = self.fetch_issues(&refs).await?;

        for ((mut card, issue_ref), issue) in linked.into_iter().zip(issues) {
            if issue.state != IssueState::Closed {
                continue;
            }
            let comments =
                until_cancelled(self.cancel, self.tracker.get_comments(&issue_ref)).await?;
            let member_ids = self.member_ids_for(issue.assignee.as_deref()).await;

            ensure_live(self.cancel)?;
            info!(card = %card.id, issue = %issue_ref, "issue closed, moving card to done");
            self.board.move_card(&mut card, &done_id).await?;
            self.board.set_card_position(&card, CardPosition::Top).await?;
            card.member_ids = member_ids;
            self.board.save_card(&card).await?;
            for comment in &comments {
                self.board.add_comment(&card, &format_comment(comment)).await?;
            }

            snapshot.relocate_card(card, CardPosition::Top);
            report.cards_completed += 1;
        }
        Ok(())
    }

    /// Pass C: every unlinked card outside DONE gets an issue in `repo`.
    pub async fn new_cards_to_issues(
        &self,
        repo: &RepoRef,
        snapshot: &mut BoardSnapshot,
        report: &mut SyncReport,
    ) -> Result<()> {
        let unlinked: Vec<Card> = snapshot
            .cards_outside(&snapshot.roles.done.id)
            .filter(|c| resolve(c).is_none())
            .cloned()
            .collect();

        for mut card in unlinked {
            ensure_live(self.cancel)?;
            let issue = self.tracker.create_issue(repo, &card.name, &card.desc).await?;
            info!(card = %card.id, issue = %issue.issue_ref(), "created issue for card");
            let issue = if card.url.is_empty() {
                issue
            } else {
                self.tracker.add_backlink_url(&issue, &card.url).await?
            };
            self.board
                .add_attachment(&mut card, &issue.html_url, LINK_ATTACHMENT_NAME)
                .await?;

            snapshot.links.insert(link_key(&issue));
            snapshot.update_card(card);
            report.issues_created += 1;
        }
        Ok(())
    }

    /// Open issues without a card get one, in the list paired with their repo.
    pub async fn new_issues_to_cards(
        &self,
        sources: &[(RepoRef, ListRole)],
        snapshot: &mut BoardSnapshot,
        report: &mut SyncReport,
    ) -> Result<()> {
        for (repo, role) in sources {
            ensure_live(self.cancel)?;
            let list_id = snapshot.roles.get(*role).id.clone();
            let issues = until_cancelled(self.cancel, self.tracker.list_open_issues(repo)).await?;

            for issue in issues.iter().filter(|i| !i.is_pull_request) {
                let key = link_key(issue);
                if snapshot.links.has_card(&key) {
                    continue;
                }
                ensure_live(self.cancel)?;
                let card = self.create_card_from_issue(issue, &list_id).await?;
                info!(card = %card.id, issue = %key, list = %role, "created card for issue");

                snapshot.links.insert(key);
                snapshot.insert_card(card, CardPosition::Bottom);
                report.cards_created += 1;
            }
        }
        Ok(())
    }

    /// Builds a card mirroring `issue`: tagged, truncated title and body,
    /// mapped assignee, link attachment, and a color per mapped label.
    pub async fn create_card_from_issue(&self, issue: &Issue, list_id: &str) -> Result<Card> {
        let new_card = NewCard {
            list_id: list_id.to_string(),
            name: format!("{CARD_TITLE_PREFIX}{}", truncate(&issue.title)),
            desc: truncate(issue.body.as_deref().unwrap_or_default()),
            member_ids: self.member_ids_for(issue.assignee.as_deref()).await,
        };
        let mut card = self.board.create_card(&new_card).await?;
        self.board
            .add_attachment(&mut card, &issue.html_url, LINK_ATTACHMENT_NAME)
            .await?;

        for label in &issue.labels {
            match self.colors.color_for(label) {
                Some(color) => self.board.add_label(&mut card, color).await?,
                None => debug!(label = %label, "no color mapped for label"),
            }
        }
        Ok(card)
    }

    /// Pass D: make sure every linked card's issue points back at the card.
    /// Cards sharing an issue are applied to one working copy of it, so each
    /// edit starts from the body the previous one wrote.
    pub async fn add_backlinks(&self, cards: &[Card], report: &mut SyncReport) -> Result<()> {
        let linked: Vec<(&Card, IssueRef)> = cards
            .iter()
            .filter(|c| !c.url.is_empty())
            .filter_map(|c| resolve(c).map(|r| (c, r)))
            .collect();
        let refs: Vec<IssueRef> = linked.iter().map(|(_, r)| r.clone()).collect();
        let issues = self.fetch_issues(&refs).await?;

        let mut current: HashMap<IssueRef, Issue> = HashMap::new();
        for ((card, issue_ref), fetched) in linked.into_iter().zip(issues) {
            let issue = current.entry(issue_ref.clone()).or_insert(fetched);
            if issue.has_backlink(&card.url) {
                continue;
            }
            ensure_live(self.cancel)?;
            info!(card = %card.id, issue = %issue_ref, "adding card link to issue");
            let updated = self.tracker.add_backlink_url(issue, &card.url).await?;
            *issue = updated;
            report.backlinks_added += 1;
        }
        Ok(())
    }
}
