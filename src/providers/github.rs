use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::TrackerClient;
use crate::model::issue::{Comment, Issue, IssueRef, IssueState, RepoRef};

const BASE: &str = "https://api.github.com";
const GET_TIMEOUT: Duration = Duration::from_secs(10);
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);
const PER_PAGE: usize = 100;

pub struct GitHubClient {
    token: String,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(token: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("gitthello")
            .build()
            .context("Failed to build GitHub HTTP client")?;
        Ok(Self { token, client })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let timeout = if method == Method::GET {
            GET_TIMEOUT
        } else {
            WRITE_TIMEOUT
        };
        self.client
            .request(method, format!("{BASE}{path}"))
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .timeout(timeout)
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let resp = req
            .send()
            .await
            .with_context(|| format!("GitHub {what} failed"))?;
        resp.error_for_status()
            .with_context(|| format!("GitHub {what} rejected"))
    }

    async fn json<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
        self.send(req, what)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse GitHub {what} response"))
    }

    /// Follows `page=N` until a short page comes back.
    async fn paginate<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<Vec<T>> {
        let mut all = Vec::new();
        let per_page = PER_PAGE.to_string();
        for page in 1.. {
            let page = page.to_string();
            let req = self
                .request(Method::GET, path)
                .query(query)
                .query(&[("per_page", per_page.as_str()), ("page", page.as_str())]);
            let batch: Vec<T> = self.json(req, what).await?;
            let done = batch.len() < PER_PAGE;
            all.extend(batch);
            if done {
                break;
            }
        }
        Ok(all)
    }
}

#[derive(Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Deserialize)]
struct GhIssue {
    number: u64,
    title: String,
    body: Option<String>,
    state: IssueState,
    html_url: String,
    updated_at: DateTime<Utc>,
    assignee: Option<GhUser>,
    #[serde(default)]
    labels: Vec<GhLabel>,
    pull_request: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GhComment {
    user: GhUser,
    created_at: DateTime<Utc>,
    #[serde(default)]
    body: String,
}

impl GhIssue {
    fn into_issue(self, repo: RepoRef) -> Issue {
        Issue {
            repo,
            number: self.number,
            title: self.title,
            body: self.body,
            state: self.state,
            html_url: self.html_url,
            updated_at: self.updated_at,
            assignee: self.assignee.map(|u| u.login),
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            is_pull_request: self.pull_request.is_some(),
        }
    }
}

impl From<GhComment> for Comment {
    fn from(c: GhComment) -> Self {
        Comment {
            author: c.user.login,
            created_at: c.created_at,
            body: c.body,
        }
    }
}

fn issue_path(issue: &IssueRef) -> String {
    format!("/repos/{}/{}/issues/{}", issue.owner, issue.repo, issue.number)
}

/// Body of an issue after appending a backlink to `card_url`.
pub fn body_with_backlink(body: Option<&str>, card_url: &str) -> String {
    let link = format!("---\nTrello card: {card_url}");
    match body.map(str::trim_end) {
        Some(text) if !text.is_empty() => format!("{text}\n\n{link}"),
        _ => link,
    }
}

#[async_trait]
impl TrackerClient for GitHubClient {
    async fn get_issue(&self, issue: &IssueRef) -> Result<Issue> {
        let req = self.request(Method::GET, &issue_path(issue));
        let gh: GhIssue = self
            .json(req, "get issue")
            .await
            .with_context(|| format!("Fetching {issue}"))?;
        Ok(gh.into_issue(issue.repo_ref()))
    }

    async fn close_issue(&self, issue: &IssueRef) -> Result<()> {
        let req = self
            .request(Method::PATCH, &issue_path(issue))
            .json(&serde_json::json!({ "state": "closed" }));
        self.send(req, "close issue")
            .await
            .with_context(|| format!("Closing {issue}"))?;
        Ok(())
    }

    async fn create_issue(&self, repo: &RepoRef, title: &str, body: &str) -> Result<Issue> {
        let req = self
            .request(Method::POST, &format!("/repos/{}/{}/issues", repo.owner, repo.name))
            .json(&serde_json::json!({ "title": title, "body": body }));
        let gh: GhIssue = self
            .json(req, "create issue")
            .await
            .with_context(|| format!("Creating issue in {repo}"))?;
        debug!(repo = %repo, number = gh.number, "created issue");
        Ok(gh.into_issue(repo.clone()))
    }

    async fn get_comments(&self, issue: &IssueRef) -> Result<Vec<Comment>> {
        let comments: Vec<GhComment> = self
            .paginate(&format!("{}/comments", issue_path(issue)), &[], "issue comments")
            .await
            .with_context(|| format!("Fetching comments of {issue}"))?;
        Ok(comments.into_iter().map(Comment::from).collect())
    }

    async fn list_open_issues(&self, repo: &RepoRef) -> Result<Vec<Issue>> {
        let issues: Vec<GhIssue> = self
            .paginate(
                &format!("/repos/{}/{}/issues", repo.owner, repo.name),
                &[("state", "open")],
                "list issues",
            )
            .await
            .with_context(|| format!("Listing open issues of {repo}"))?;
        Ok(issues
            .into_iter()
            .map(|gh| gh.into_issue(repo.clone()))
            .collect())
    }

    async fn add_backlink_url(&self, issue: &Issue, url: &str) -> Result<Issue> {
        let body = body_with_backlink(issue.body.as_deref(), url);
        let req = self
            .request(Method::PATCH, &issue_path(&issue.issue_ref()))
            .json(&serde_json::json!({ "body": body }));
        let gh: GhIssue = self
            .json(req, "update issue body")
            .await
            .with_context(|| format!("Adding backlink to {}", issue.issue_ref()))?;
        Ok(gh.into_issue(issue.repo.clone()))
    }
}
