use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// Optional league or group name shown under the title.
    #[serde(default)]
    pub league: String,
    #[serde(default = "default_notes")]
    pub notes: String,
    #[serde(default = "default_span_hours")]
    pub span_hours: u32,
    /// `YYYY-MM-DD`; slots on or after this date are rejected. Empty string
    /// disables the check.
    #[serde(default)]
    pub deadline: String,
    /// Participant roster for the ballot log. Empty disables the name picker.
    #[serde(default)]
    pub players: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_votes_file")]
    pub votes_file: String,
    #[serde(default = "default_ballots_file")]
    pub ballots_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub votes_file: Option<String>,
    pub ballots_file: Option<String>,
    pub span_hours: Option<u32>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/slotpoll/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(votes_file) = overrides.votes_file {
            self.storage.votes_file = votes_file;
        }
        if let Some(ballots_file) = overrides.ballots_file {
            self.storage.ballots_file = ballots_file;
        }
        if let Some(span_hours) = overrides.span_hours {
            self.poll.span_hours = span_hours;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_votes_path(&self) -> PathBuf {
        expand_tilde(&self.storage.votes_file)
    }

    pub fn resolved_ballots_path(&self) -> PathBuf {
        expand_tilde(&self.storage.ballots_file)
    }

    pub fn parsed_deadline(&self) -> Result<Option<NaiveDate>> {
        let raw = self.poll.deadline.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("invalid poll.deadline (expected YYYY-MM-DD): {raw}"))?;
        Ok(Some(date))
    }

    pub fn default_template() -> String {
        let template = r#"[poll]
title = "Draft Scheduler"
league = ""
notes = "Each vote has an automatic 3-hour span: voting for 09:00 also counts towards 10:00 and 11:00."
span_hours = 3
deadline = ""
players = []

[storage]
votes_file = "~/.local/share/slotpoll/votes.csv"
ballots_file = "~/.local/share/slotpoll/ballots.csv"

[server]
host = "127.0.0.1"
port = 3001
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            league: String::new(),
            notes: default_notes(),
            span_hours: default_span_hours(),
            deadline: String::new(),
            players: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            votes_file: default_votes_file(),
            ballots_file: default_ballots_file(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_title() -> String {
    "Draft Scheduler".to_string()
}

fn default_notes() -> String {
    "Each vote has an automatic 3-hour span: voting for 09:00 also counts towards 10:00 and 11:00."
        .to_string()
}

fn default_span_hours() -> u32 {
    3
}

fn default_votes_file() -> String {
    "~/.local/share/slotpoll/votes.csv".to_string()
}

fn default_ballots_file() -> String {
    "~/.local/share/slotpoll/ballots.csv".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_back_into_config() {
        let config: Config = toml::from_str(&Config::default_template()).expect("parse template");
        assert_eq!(config.poll.span_hours, 3);
        assert!(config.poll.players.is_empty());
        assert_eq!(config.server.port, 3001);
    }

    #[test]
    fn empty_deadline_disables_the_check() {
        let config = Config::default();
        assert_eq!(config.parsed_deadline().expect("parse"), None);
    }

    #[test]
    fn deadline_string_parses_as_date() {
        let mut config = Config::default();
        config.poll.deadline = "2024-09-05".to_string();
        let parsed = config.parsed_deadline().expect("parse");
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2024, 9, 5));
    }

    #[test]
    fn garbage_deadline_is_an_error() {
        let mut config = Config::default();
        config.poll.deadline = "kickoff".to_string();
        assert!(config.parsed_deadline().is_err());
    }
}
