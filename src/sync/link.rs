use std::collections::HashSet;

use reqwest::Url;

use crate::model::board::Card;
use crate::model::issue::IssueRef;

/// Attachment name marking a card's issue link.
pub const LINK_ATTACHMENT_NAME: &str = "github";

/// Parses `https://github.com/<owner>/<repo>/issues/<number>` (or `/pull/`).
pub fn parse_issue_url(url: &str) -> Option<IssueRef> {
    let parsed = Url::parse(url.trim()).ok()?;
    if parsed.host_str() != Some("github.com") {
        return None;
    }
    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [owner, repo, "issues" | "pull", number, ..] => {
            let number = number.parse().ok()?;
            Some(IssueRef::new(*owner, *repo, number))
        }
        _ => None,
    }
}

fn looks_like_issue_url(url: &str) -> bool {
    url.strip_prefix("https://github.com")
        .is_some_and(|rest| rest.contains("issues"))
}

/// The issue a card is linked to. Attachments are scanned in order; the first
/// one that is tagged or shaped like an issue link and parses wins.
pub fn resolve(card: &Card) -> Option<IssueRef> {
    card.attachments
        .iter()
        .filter(|a| a.name == LINK_ATTACHMENT_NAME || looks_like_issue_url(&a.url))
        .find_map(|a| parse_issue_url(&a.url))
}

/// Every issue already linked from some card on the board.
#[derive(Debug, Default, Clone)]
pub struct LinkIndex {
    refs: HashSet<IssueRef>,
}

impl LinkIndex {
    pub fn build<'a>(cards: impl IntoIterator<Item = &'a Card>) -> Self {
        Self {
            refs: cards.into_iter().filter_map(resolve).collect(),
        }
    }

    pub fn has_card(&self, issue: &IssueRef) -> bool {
        self.refs.contains(issue)
    }

    pub fn insert(&mut self, issue: IssueRef) {
        self.refs.insert(issue);
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }
}
