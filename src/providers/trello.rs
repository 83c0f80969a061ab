use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::BoardClient;
use crate::model::board::{Attachment, BoardList, BoardSummary, Card, CardPosition, NewCard};

const BASE: &str = "https://api.trello.com/1";
const GET_TIMEOUT: Duration = Duration::from_secs(10);
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);
const CARD_FIELDS: &str = "id,name,desc,idList,shortUrl,dateLastActivity,idMembers,labels";

pub struct TrelloClient {
    api_key: String,
    token: String,
    client: reqwest::Client,
}

impl TrelloClient {
    pub fn new(api_key: String, token: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("gitthello")
            .build()
            .context("Failed to build Trello HTTP client")?;
        Ok(Self {
            api_key,
            token,
            client,
        })
    }

    fn auth_params(&self) -> [(&str, &str); 2] {
        [("key", &self.api_key), ("token", &self.token)]
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let timeout = if method == Method::GET {
            GET_TIMEOUT
        } else {
            WRITE_TIMEOUT
        };
        self.client
            .request(method, format!("{BASE}{path}"))
            .query(&self.auth_params())
            .timeout(timeout)
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let resp = req
            .send()
            .await
            .with_context(|| format!("Trello {what} failed"))?;
        resp.error_for_status()
            .with_context(|| format!("Trello {what} rejected"))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)], what: &str) -> Result<T> {
        let req = self.request(Method::GET, path).query(query);
        self.send(req, what)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse Trello {what} response"))
    }

    async fn fetch_cards(&self, path: &str, what: &str) -> Result<Vec<Card>> {
        let cards: Vec<TrelloCard> = self
            .get(
                path,
                &[
                    ("fields", CARD_FIELDS),
                    ("attachments", "true"),
                    ("attachment_fields", "name,url"),
                ],
                what,
            )
            .await?;
        Ok(cards.into_iter().map(Card::from).collect())
    }
}

#[derive(Deserialize)]
struct TrelloBoard {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct TrelloList {
    id: String,
    name: String,
    #[serde(default)]
    pos: f64,
}

#[derive(Deserialize)]
struct TrelloLabel {
    color: Option<String>,
}

#[derive(Deserialize)]
struct TrelloAttachment {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
}

#[derive(Deserialize)]
struct TrelloMember {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrelloCard {
    id: String,
    name: String,
    #[serde(default)]
    desc: String,
    id_list: String,
    #[serde(default)]
    short_url: String,
    date_last_activity: DateTime<Utc>,
    #[serde(default)]
    id_members: Vec<String>,
    #[serde(default)]
    labels: Vec<TrelloLabel>,
    #[serde(default)]
    attachments: Vec<TrelloAttachment>,
}

impl From<TrelloBoard> for BoardSummary {
    fn from(b: TrelloBoard) -> Self {
        BoardSummary { id: b.id, name: b.name }
    }
}

impl From<TrelloList> for BoardList {
    fn from(l: TrelloList) -> Self {
        BoardList {
            id: l.id,
            name: l.name,
            pos: l.pos,
        }
    }
}

impl From<TrelloCard> for Card {
    fn from(c: TrelloCard) -> Self {
        Card {
            id: c.id,
            name: c.name,
            desc: c.desc,
            list_id: c.id_list,
            url: c.short_url,
            last_activity: c.date_last_activity,
            member_ids: c.id_members,
            label_colors: c.labels.into_iter().filter_map(|l| l.color).collect(),
            attachments: c
                .attachments
                .into_iter()
                .map(|a| Attachment {
                    name: a.name,
                    url: a.url,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl BoardClient for TrelloClient {
    async fn list_boards(&self) -> Result<Vec<BoardSummary>> {
        let boards: Vec<TrelloBoard> = self
            .get(
                "/members/me/boards",
                &[("fields", "id,name"), ("filter", "open")],
                "members/me/boards",
            )
            .await?;
        Ok(boards.into_iter().map(BoardSummary::from).collect())
    }

    async fn list_lists(&self, board_id: &str) -> Result<Vec<BoardList>> {
        let lists: Vec<TrelloList> = self
            .get(
                &format!("/boards/{board_id}/lists"),
                &[("fields", "id,name,pos"), ("filter", "open")],
                "board lists",
            )
            .await?;
        Ok(lists.into_iter().map(BoardList::from).collect())
    }

    async fn list_cards(&self, list_id: &str) -> Result<Vec<Card>> {
        self.fetch_cards(&format!("/lists/{list_id}/cards"), "list cards")
            .await
    }

    async fn list_cards_on_board(&self, board_id: &str) -> Result<Vec<Card>> {
        self.fetch_cards(&format!("/boards/{board_id}/cards"), "board cards")
            .await
    }

    async fn create_card(&self, card: &NewCard) -> Result<Card> {
        let body = serde_json::json!({
            "idList": card.list_id,
            "name": card.name,
            "desc": card.desc,
            "idMembers": card.member_ids.join(","),
        });
        let req = self.request(Method::POST, "/cards").json(&body);
        let created: TrelloCard = self
            .send(req, "create card")
            .await?
            .json()
            .await
            .context("Failed to parse created Trello card")?;
        debug!(card = %created.id, "created card");
        Ok(created.into())
    }

    async fn move_card(&self, card: &mut Card, list_id: &str) -> Result<()> {
        let req = self
            .request(Method::PUT, &format!("/cards/{}", card.id))
            .json(&serde_json::json!({ "idList": list_id }));
        self.send(req, "move card").await?;
        card.list_id = list_id.to_string();
        Ok(())
    }

    async fn set_card_position(&self, card: &Card, position: CardPosition) -> Result<()> {
        let req = self
            .request(Method::PUT, &format!("/cards/{}", card.id))
            .json(&serde_json::json!({ "pos": position.as_str() }));
        self.send(req, "position card").await?;
        Ok(())
    }

    async fn add_comment(&self, card: &Card, text: &str) -> Result<()> {
        let req = self
            .request(Method::POST, &format!("/cards/{}/actions/comments", card.id))
            .json(&serde_json::json!({ "text": text }));
        self.send(req, "add comment").await?;
        Ok(())
    }

    async fn add_label(&self, card: &mut Card, color: &str) -> Result<()> {
        let req = self
            .request(Method::POST, &format!("/cards/{}/labels", card.id))
            .json(&serde_json::json!({ "color": color, "name": "" }));
        self.send(req, "add label").await?;
        card.label_colors.push(color.to_string());
        Ok(())
    }

    async fn add_attachment(&self, card: &mut Card, url: &str, name: &str) -> Result<()> {
        let req = self
            .request(Method::POST, &format!("/cards/{}/attachments", card.id))
            .json(&serde_json::json!({ "url": url, "name": name }));
        self.send(req, "add attachment").await?;
        card.attachments.push(Attachment {
            name: name.to_string(),
            url: url.to_string(),
        });
        Ok(())
    }

    async fn save_card(&self, card: &Card) -> Result<()> {
        let req = self
            .request(Method::PUT, &format!("/cards/{}", card.id))
            .json(&serde_json::json!({
                "name": card.name,
                "desc": card.desc,
                "idMembers": card.member_ids.join(","),
            }));
        self.send(req, "save card").await?;
        Ok(())
    }

    async fn rename_list(&self, list: &mut BoardList, name: &str) -> Result<()> {
        let req = self
            .request(Method::PUT, &format!("/lists/{}", list.id))
            .json(&serde_json::json!({ "name": name }));
        self.send(req, "rename list").await?;
        list.name = name.to_string();
        Ok(())
    }

    async fn close_list(&self, list: &BoardList) -> Result<()> {
        let req = self
            .request(Method::PUT, &format!("/lists/{}/closed", list.id))
            .json(&serde_json::json!({ "value": true }));
        self.send(req, "close list").await?;
        Ok(())
    }

    async fn create_list(&self, board_id: &str, name: &str, pos: f64) -> Result<BoardList> {
        let req = self.request(Method::POST, "/lists").json(&serde_json::json!({
            "name": name,
            "idBoard": board_id,
            "pos": pos,
        }));
        let list: TrelloList = self
            .send(req, "create list")
            .await?
            .json()
            .await
            .context("Failed to parse created Trello list")?;
        Ok(list.into())
    }

    async fn find_member_id(&self, username: &str) -> Result<Option<String>> {
        let path = format!("/members/{}", urlencoding::encode(username));
        let resp = self
            .request(Method::GET, &path)
            .query(&[("fields", "id")])
            .send()
            .await
            .context("Trello member lookup failed")?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let member: TrelloMember = resp
            .error_for_status()
            .context("Trello member lookup rejected")?
            .json()
            .await
            .context("Failed to parse Trello member")?;
        Ok(Some(member.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_from_api_json() {
        let json = r#"{
            "id": "5f1",
            "name": "Fix login",
            "desc": "SSO broken",
            "idList": "list-todo",
            "shortUrl": "https://trello.com/c/abc",
            "dateLastActivity": "2024-01-10T12:00:00.000Z",
            "idMembers": ["m1"],
            "labels": [{"color": "red", "name": "bug"}, {"color": null, "name": "x"}],
            "attachments": [{"name": "github", "url": "https://github.com/acme/app/issues/7"}]
        }"#;
        let card: Card = serde_json::from_str::<TrelloCard>(json).unwrap().into();
        assert_eq!(card.list_id, "list-todo");
        assert_eq!(card.url, "https://trello.com/c/abc");
        assert_eq!(card.label_colors, vec!["red".to_string()]);
        assert_eq!(card.attachments[0].name, "github");
        assert_eq!(card.last_activity.to_rfc3339(), "2024-01-10T12:00:00+00:00");
    }

    #[test]
    fn card_without_optional_fields() {
        let json = r#"{
            "id": "5f2",
            "name": "Bare",
            "idList": "l",
            "dateLastActivity": "2024-01-10T12:00:00Z"
        }"#;
        let card: Card = serde_json::from_str::<TrelloCard>(json).unwrap().into();
        assert!(card.desc.is_empty());
        assert!(card.attachments.is_empty());
        assert!(card.member_ids.is_empty());
    }

    #[test]
    fn list_from_api_json() {
        let list: BoardList = serde_json::from_str::<TrelloList>(r#"{"id":"l1","name":"Done","pos":65535.5}"#)
            .unwrap()
            .into();
        assert_eq!(list.name, "Done");
        assert_eq!(list.pos, 65535.5);
    }
}
