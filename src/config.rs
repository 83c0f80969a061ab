use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::model::board::ListRole;
use crate::model::issue::RepoRef;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub trello: TrelloConfig,
    pub github: GitHubConfig,
    pub boards: Vec<BoardConfig>,
}

#[derive(Debug, Deserialize)]
pub struct TrelloConfig {
    pub api_key: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct GitHubConfig {
    pub token: String,
    /// Tracker login -> board username.
    #[serde(default)]
    pub members: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    pub name: String,
    /// Cards without an issue get one here; its open issues land in TODO.
    pub repo_to: RepoRef,
    /// Open issues from these repositories land in BACKLOG.
    #[serde(default)]
    pub repos_from: Vec<RepoRef>,
    #[serde(default)]
    pub lists: ListNames,
    /// Label name -> board color token.
    #[serde(default)]
    pub colors: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListNames {
    pub todo: String,
    pub backlog: String,
    pub done: String,
}

impl Default for ListNames {
    fn default() -> Self {
        Self {
            todo: "To Do".into(),
            backlog: "Backlog".into(),
            done: "Done".into(),
        }
    }
}

impl ListNames {
    pub fn name_for(&self, role: ListRole) -> &str {
        match role {
            ListRole::Todo => &self.todo,
            ListRole::Backlog => &self.backlog,
            ListRole::Done => &self.done,
        }
    }
}

impl AppConfig {
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks run once at startup, before any remote call.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.trello.api_key.trim().is_empty() || self.trello.token.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "trello.api_key and trello.token are required".into(),
            ));
        }
        if self.github.token.trim().is_empty() {
            return Err(SyncError::InvalidConfig("github.token is required".into()));
        }
        if self.boards.is_empty() {
            return Err(SyncError::InvalidConfig("no [[boards]] configured".into()));
        }

        let mut seen = HashSet::new();
        for board in &self.boards {
            if board.name.trim().is_empty() {
                return Err(SyncError::InvalidConfig("board with empty name".into()));
            }
            if !seen.insert(board.name.as_str()) {
                return Err(SyncError::InvalidConfig(format!(
                    "board '{}' configured twice",
                    board.name
                )));
            }
            for role in ListRole::ALL {
                if board.lists.name_for(role).trim().is_empty() {
                    return Err(SyncError::InvalidConfig(format!(
                        "board '{}': empty name for {role} list",
                        board.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn board(&self, name: &str) -> Option<&BoardConfig> {
        self.boards.iter().find(|b| b.name == name)
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gitthello")
        .join("config.toml")
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    AppConfig::parse(&contents).with_context(|| format!("Invalid config {}", path.display()))
}
