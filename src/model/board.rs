use std::fmt;

use chrono::{DateTime, Utc};
/// The three lists every synchronised board must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListRole {
    Todo,
    Backlog,
    Done,
}

impl ListRole {
    pub const ALL: [ListRole; 3] = [ListRole::Todo, ListRole::Backlog, ListRole::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            ListRole::Todo => "todo",
            ListRole::Backlog => "backlog",
            ListRole::Done => "done",
        }
    }
}

impl fmt::Display for ListRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardList {
    pub id: String,
    pub name: String,
    pub pos: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub desc: String,
    pub list_id: String,
    /// Short URL of the card, used as the backlink written into issues.
    pub url: String,
    pub last_activity: DateTime<Utc>,
    pub member_ids: Vec<String>,
    pub label_colors: Vec<String>,
    pub attachments: Vec<Attachment>,
}

/// Fields needed to create a card; everything else is assigned by the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCard {
    pub list_id: String,
    pub name: String,
    pub desc: String,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardPosition {
    Top,
    Bottom,
}

impl CardPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            CardPosition::Top => "top",
            CardPosition::Bottom => "bottom",
        }
    }
}
