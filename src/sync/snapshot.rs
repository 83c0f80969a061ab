use crate::config::ListNames;
use crate::error::SyncError;
use crate::model::board::{BoardList, BoardSummary, Card, CardPosition, ListRole};

use super::link::LinkIndex;

/// The TODO, BACKLOG and DONE lists of one board.
#[derive(Debug, Clone)]
pub struct ResolvedLists {
    pub todo: BoardList,
    pub backlog: BoardList,
    pub done: BoardList,
}

impl ResolvedLists {
    /// Matches configured display names against the board's lists. The first
    /// list with a matching name wins; a missing role is fatal.
    pub fn resolve(board: &str, lists: &[BoardList], names: &ListNames) -> Result<Self, SyncError> {
        let find = |role: ListRole| {
            let wanted = names.name_for(role);
            lists
                .iter()
                .find(|l| l.name == wanted)
                .cloned()
                .ok_or_else(|| SyncError::MissingList {
                    board: board.to_string(),
                    role,
                    list_name: wanted.to_string(),
                })
        };
        Ok(Self {
            todo: find(ListRole::Todo)?,
            backlog: find(ListRole::Backlog)?,
            done: find(ListRole::Done)?,
        })
    }

    pub fn get(&self, role: ListRole) -> &BoardList {
        match role {
            ListRole::Todo => &self.todo,
            ListRole::Backlog => &self.backlog,
            ListRole::Done => &self.done,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListCards {
    pub list: BoardList,
    /// Cards in board order, top first.
    pub cards: Vec<Card>,
}

/// Board state fetched in setup and kept current as passes mutate it.
#[derive(Debug, Clone)]
pub struct BoardSnapshot {
    pub board: BoardSummary,
    pub roles: ResolvedLists,
    pub lists: Vec<ListCards>,
    pub links: LinkIndex,
}

impl BoardSnapshot {
    pub fn new(board: BoardSummary, roles: ResolvedLists, lists: Vec<ListCards>) -> Self {
        let links = LinkIndex::build(lists.iter().flat_map(|l| l.cards.iter()));
        Self {
            board,
            roles,
            lists,
            links,
        }
    }

    pub fn cards_in(&self, list_id: &str) -> &[Card] {
        self.lists
            .iter()
            .find(|l| l.list.id == list_id)
            .map(|l| l.cards.as_slice())
            .unwrap_or_default()
    }

    /// Cards on every list except `list_id`.
    pub fn cards_outside<'a>(&'a self, list_id: &'a str) -> impl Iterator<Item = &'a Card> + 'a {
        self.lists
            .iter()
            .filter(move |l| l.list.id != list_id)
            .flat_map(|l| l.cards.iter())
    }

    /// Replaces the stored card with the same id, keeping its place.
    pub fn update_card(&mut self, card: Card) {
        for list in &mut self.lists {
            if let Some(slot) = list.cards.iter_mut().find(|c| c.id == card.id) {
                *slot = card;
                return;
            }
        }
    }

    /// Removes the card from wherever it is and files it under `card.list_id`.
    pub fn relocate_card(&mut self, card: Card, position: CardPosition) {
        for list in &mut self.lists {
            list.cards.retain(|c| c.id != card.id);
        }
        self.insert_card(card, position);
    }

    pub fn insert_card(&mut self, card: Card, position: CardPosition) {
        if let Some(list) = self.lists.iter_mut().find(|l| l.list.id == card.list_id) {
            match position {
                CardPosition::Top => list.cards.insert(0, card),
                CardPosition::Bottom => list.cards.push(card),
            }
        }
    }
}
