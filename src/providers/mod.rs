pub mod github;
pub mod trello;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::AppConfig;
use crate::model::board::{BoardList, BoardSummary, Card, CardPosition, NewCard};
use crate::model::issue::{Comment, Issue, IssueRef, RepoRef};

/// The Kanban side of the sync.
#[async_trait]
pub trait BoardClient: Send + Sync {
    async fn list_boards(&self) -> Result<Vec<BoardSummary>>;
    async fn list_lists(&self, board_id: &str) -> Result<Vec<BoardList>>;
    async fn list_cards(&self, list_id: &str) -> Result<Vec<Card>>;
    async fn list_cards_on_board(&self, board_id: &str) -> Result<Vec<Card>>;
    async fn create_card(&self, card: &NewCard) -> Result<Card>;
    /// Moves the card remotely and updates `card.list_id`.
    async fn move_card(&self, card: &mut Card, list_id: &str) -> Result<()>;
    async fn set_card_position(&self, card: &Card, position: CardPosition) -> Result<()>;
    async fn add_comment(&self, card: &Card, text: &str) -> Result<()>;
    async fn add_label(&self, card: &mut Card, color: &str) -> Result<()>;
    /// Attaches `url` remotely and records it in `card.attachments`.
    async fn add_attachment(&self, card: &mut Card, url: &str, name: &str) -> Result<()>;
    /// Persists name, description and members.
    async fn save_card(&self, card: &Card) -> Result<()>;
    async fn rename_list(&self, list: &mut BoardList, name: &str) -> Result<()>;
    async fn close_list(&self, list: &BoardList) -> Result<()>;
    async fn create_list(&self, board_id: &str, name: &str, pos: f64) -> Result<BoardList>;
    /// `Ok(None)` when the board knows no such user.
    async fn find_member_id(&self, username: &str) -> Result<Option<String>>;
}

/// The issue tracker side of the sync.
#[async_trait]
pub trait TrackerClient: Send + Sync {
    async fn get_issue(&self, issue: &IssueRef) -> Result<Issue>;
    async fn close_issue(&self, issue: &IssueRef) -> Result<()>;
    async fn create_issue(&self, repo: &RepoRef, title: &str, body: &str) -> Result<Issue>;
    async fn get_comments(&self, issue: &IssueRef) -> Result<Vec<Comment>>;
    /// Open issues and pull requests of `repo`.
    async fn list_open_issues(&self, repo: &RepoRef) -> Result<Vec<Issue>>;
    /// Appends a link to `url` to the issue body, returning the edited issue.
    async fn add_backlink_url(&self, issue: &Issue, url: &str) -> Result<Issue>;
}

#[cfg(test)]
pub mod mock;


pub fn create_clients(config: &AppConfig) -> Result<(trello::TrelloClient, github::GitHubClient)> {
    let board = trello::TrelloClient::new(config.trello.api_key.clone(), config.trello.token.clone())?;
    let tracker = github::GitHubClient::new(config.github.token.clone())?;
    Ok((board, tracker))
}
