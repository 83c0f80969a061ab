//! In-memory collaborators for driving the sync passes in tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use super::github::body_with_backlink;
use super::{BoardClient, TrackerClient};
use crate::model::board::{Attachment, BoardList, BoardSummary, Card, CardPosition, NewCard};
use crate::model::issue::{Comment, Issue, IssueRef, IssueState, RepoRef};

pub const BOARD_ID: &str = "board-1";

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

pub fn card(id: &str, name: &str, last_activity: DateTime<Utc>) -> Card {
    Card {
        id: id.to_string(),
        name: name.to_string(),
        desc: format!("{name} description"),
        list_id: String::new(),
        url: format!("https://trello.com/c/{id}"),
        last_activity,
        member_ids: vec![],
        label_colors: vec![],
        attachments: vec![],
    }
}

pub fn linked(mut card: Card, issue: &IssueRef) -> Card {
    card.attachments.push(Attachment {
        name: "github".into(),
        url: format!(
            "https://github.com/{}/{}/issues/{}",
            issue.owner, issue.repo, issue.number
        ),
    });
    card
}

pub fn issue(repo: &str, number: u64, state: IssueState, updated_at: DateTime<Utc>) -> Issue {
    let repo: RepoRef = repo.parse().unwrap();
    Issue {
        html_url: format!("https://github.com/{repo}/issues/{number}"),
        repo,
        number,
        title: format!("Issue {number}"),
        body: Some(format!("Body of issue {number}")),
        state,
        updated_at,
        assignee: None,
        labels: vec![],
        is_pull_request: false,
    }
}

#[derive(Default)]
pub struct BoardState {
    pub boards: Vec<BoardSummary>,
    pub lists: Vec<BoardList>,
    pub closed_lists: Vec<String>,
    /// Board order: earlier cards sit higher in their list.
    pub cards: Vec<Card>,
    pub comments: Vec<(String, String)>,
    pub members: HashMap<String, String>,
    pub saved: Vec<String>,
    pub fail_member_lookup: bool,
    pub fail_moves: bool,
    pub fail_comments: bool,
    next_id: usize,
}

impl BoardState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-new-{}", self.next_id)
    }

    fn card_mut(&mut self, id: &str) -> Result<&mut Card> {
        self.cards
            .iter_mut()
            .find(|c| c.id == id)
            .with_context(|| format!("card {id} not found"))
    }
}

#[derive(Default)]
pub struct MemoryBoard {
    state: Mutex<BoardState>,
}

impl MemoryBoard {
    pub fn new(board_name: &str, list_names: &[&str]) -> Self {
        let board = Self::default();
        {
            let mut state = board.state();
            state.boards.push(BoardSummary {
                id: BOARD_ID.into(),
                name: board_name.into(),
            });
            for (i, name) in list_names.iter().enumerate() {
                state.lists.push(BoardList {
                    id: list_slug(name),
                    name: name.to_string(),
                    pos: (i as f64 + 1.0) * 1024.0,
                });
            }
        }
        board
    }

    /// A board named "Development" with the default three lists.
    pub fn standard() -> Self {
        Self::new("Development", &["To Do", "Backlog", "Done"])
    }

    pub fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap()
    }

    pub fn list_id(&self, name: &str) -> String {
        list_slug(name)
    }

    pub fn add_card(&self, list_name: &str, mut card: Card) {
        card.list_id = list_slug(list_name);
        self.state().cards.push(card);
    }

    pub fn add_member(&self, username: &str, id: &str) {
        self.state().members.insert(username.into(), id.into());
    }

    pub fn cards_in(&self, list_name: &str) -> Vec<Card> {
        let id = list_slug(list_name);
        self.state()
            .cards
            .iter()
            .filter(|c| c.list_id == id)
            .cloned()
            .collect()
    }

    pub fn card(&self, id: &str) -> Card {
        self.state()
            .cards
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .unwrap()
    }

    pub fn comments_on(&self, card_id: &str) -> Vec<String> {
        self.state()
            .comments
            .iter()
            .filter(|(id, _)| id == card_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

fn list_slug(name: &str) -> String {
    format!("list-{}", name.to_lowercase().replace(' ', "-"))
}

#[async_trait]
impl BoardClient for MemoryBoard {
    async fn list_boards(&self) -> Result<Vec<BoardSummary>> {
        Ok(self.state().boards.clone())
    }

    async fn list_lists(&self, _board_id: &str) -> Result<Vec<BoardList>> {
        let state = self.state();
        Ok(state
            .lists
            .iter()
            .filter(|l| !state.closed_lists.contains(&l.id))
            .cloned()
            .collect())
    }

    async fn list_cards(&self, list_id: &str) -> Result<Vec<Card>> {
        Ok(self
            .state()
            .cards
            .iter()
            .filter(|c| c.list_id == list_id)
            .cloned()
            .collect())
    }

    async fn list_cards_on_board(&self, _board_id: &str) -> Result<Vec<Card>> {
        Ok(self.state().cards.clone())
    }

    async fn create_card(&self, new_card: &NewCard) -> Result<Card> {
        let mut state = self.state();
        let id = state.next_id("card");
        let created = Card {
            url: format!("https://trello.com/c/{id}"),
            id,
            name: new_card.name.clone(),
            desc: new_card.desc.clone(),
            list_id: new_card.list_id.clone(),
            last_activity: Utc::now(),
            member_ids: new_card.member_ids.clone(),
            label_colors: vec![],
            attachments: vec![],
        };
        state.cards.push(created.clone());
        Ok(created)
    }

    async fn move_card(&self, card: &mut Card, list_id: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail_moves {
            bail!("move rejected");
        }
        let pos = state
            .cards
            .iter()
            .position(|c| c.id == card.id)
            .with_context(|| format!("card {} not found", card.id))?;
        let mut stored = state.cards.remove(pos);
        stored.list_id = list_id.to_string();
        stored.last_activity = Utc::now();
        card.list_id = stored.list_id.clone();
        card.last_activity = stored.last_activity;
        state.cards.push(stored);
        Ok(())
    }

    async fn set_card_position(&self, card: &Card, position: CardPosition) -> Result<()> {
        let mut state = self.state();
        let pos = state
            .cards
            .iter()
            .position(|c| c.id == card.id)
            .with_context(|| format!("card {} not found", card.id))?;
        let stored = state.cards.remove(pos);
        match position {
            CardPosition::Top => state.cards.insert(0, stored),
            CardPosition::Bottom => state.cards.push(stored),
        }
        Ok(())
    }

    async fn add_comment(&self, card: &Card, text: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail_comments {
            bail!("comment rejected");
        }
        state.comments.push((card.id.clone(), text.to_string()));
        Ok(())
    }

    async fn add_label(&self, card: &mut Card, color: &str) -> Result<()> {
        self.state()
            .card_mut(&card.id)?
            .label_colors
            .push(color.to_string());
        card.label_colors.push(color.to_string());
        Ok(())
    }

    async fn add_attachment(&self, card: &mut Card, url: &str, name: &str) -> Result<()> {
        let attachment = Attachment {
            name: name.to_string(),
            url: url.to_string(),
        };
        self.state()
            .card_mut(&card.id)?
            .attachments
            .push(attachment.clone());
        card.attachments.push(attachment);
        Ok(())
    }

    async fn save_card(&self, card: &Card) -> Result<()> {
        let mut state = self.state();
        let stored = state.card_mut(&card.id)?;
        stored.name = card.name.clone();
        stored.desc = card.desc.clone();
        stored.member_ids = card.member_ids.clone();
        state.saved.push(card.id.clone());
        Ok(())
    }

    async fn rename_list(&self, list: &mut BoardList, name: &str) -> Result<()> {
        let mut state = self.state();
        let stored = state
            .lists
            .iter_mut()
            .find(|l| l.id == list.id)
            .with_context(|| format!("list {} not found", list.id))?;
        stored.name = name.to_string();
        list.name = name.to_string();
        Ok(())
    }

    async fn close_list(&self, list: &BoardList) -> Result<()> {
        self.state().closed_lists.push(list.id.clone());
        Ok(())
    }

    async fn create_list(&self, _board_id: &str, name: &str, pos: f64) -> Result<BoardList> {
        let mut state = self.state();
        let list = BoardList {
            id: state.next_id("list"),
            name: name.to_string(),
            pos,
        };
        state.lists.push(list.clone());
        Ok(list)
    }

    async fn find_member_id(&self, username: &str) -> Result<Option<String>> {
        let state = self.state();
        if state.fail_member_lookup {
            bail!("member service unavailable");
        }
        Ok(state.members.get(username).cloned())
    }
}

#[derive(Default)]
pub struct TrackerState {
    pub issues: Vec<Issue>,
    pub comments: HashMap<IssueRef, Vec<Comment>>,
    pub closed: Vec<IssueRef>,
    pub created: Vec<Issue>,
    pub backlinks: Vec<(IssueRef, String)>,
    pub fail_close: bool,
}

#[derive(Default)]
pub struct MemoryTracker {
    state: Mutex<TrackerState>,
}

impl MemoryTracker {
    pub fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap()
    }

    pub fn add_issue(&self, issue: Issue) {
        self.state().issues.push(issue);
    }

    pub fn add_comment(&self, issue: &IssueRef, author: &str, created_at: DateTime<Utc>, body: &str) {
        self.state()
            .comments
            .entry(issue.clone())
            .or_default()
            .push(Comment {
                author: author.into(),
                created_at,
                body: body.into(),
            });
    }

    pub fn issue(&self, issue: &IssueRef) -> Issue {
        self.state()
            .issues
            .iter()
            .find(|i| &i.issue_ref() == issue)
            .cloned()
            .unwrap()
    }
}

#[async_trait]
impl TrackerClient for MemoryTracker {
    async fn get_issue(&self, issue: &IssueRef) -> Result<Issue> {
        self.state()
            .issues
            .iter()
            .find(|i| &i.issue_ref() == issue)
            .cloned()
            .with_context(|| format!("issue {issue} not found"))
    }

    async fn close_issue(&self, issue: &IssueRef) -> Result<()> {
        let mut state = self.state();
        if state.fail_close {
            bail!("close rejected");
        }
        let stored = state
            .issues
            .iter_mut()
            .find(|i| &i.issue_ref() == issue)
            .with_context(|| format!("issue {issue} not found"))?;
        stored.state = IssueState::Closed;
        stored.updated_at = Utc::now();
        state.closed.push(issue.clone());
        Ok(())
    }

    async fn create_issue(&self, repo: &RepoRef, title: &str, body: &str) -> Result<Issue> {
        let mut state = self.state();
        let number = state
            .issues
            .iter()
            .filter(|i| &i.repo == repo)
            .map(|i| i.number)
            .max()
            .unwrap_or(0)
            + 1;
        let created = Issue {
            repo: repo.clone(),
            number,
            title: title.to_string(),
            body: Some(body.to_string()),
            state: IssueState::Open,
            html_url: format!("https://github.com/{repo}/issues/{number}"),
            updated_at: Utc::now(),
            assignee: None,
            labels: vec![],
            is_pull_request: false,
        };
        state.issues.push(created.clone());
        state.created.push(created.clone());
        Ok(created)
    }

    async fn get_comments(&self, issue: &IssueRef) -> Result<Vec<Comment>> {
        Ok(self.state().comments.get(issue).cloned().unwrap_or_default())
    }

    async fn list_open_issues(&self, repo: &RepoRef) -> Result<Vec<Issue>> {
        Ok(self
            .state()
            .issues
            .iter()
            .filter(|i| &i.repo == repo && i.state == IssueState::Open)
            .cloned()
            .collect())
    }

    async fn add_backlink_url(&self, issue: &Issue, url: &str) -> Result<Issue> {
        let mut state = self.state();
        let issue_ref = issue.issue_ref();
        let stored = state
            .issues
            .iter_mut()
            .find(|i| i.issue_ref() == issue_ref)
            .with_context(|| format!("issue {issue_ref} not found"))?;
        stored.body = Some(body_with_backlink(issue.body.as_deref(), url));
        stored.updated_at = Utc::now();
        let updated = stored.clone();
        state.backlinks.push((issue_ref, url.to_string()));
        Ok(updated)
    }
}
