//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.teampulse.toml` files. Tokens can live in the file for local use,
//! but the CLI env-var fallbacks (`GITHUB_TOKEN`, `JIRA_API_TOKEN`) take
//! precedence so secrets can stay out of the repository.

use crate::models::{PeerIdentity, RepoRef};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// GitHub source settings.
    #[serde(default)]
    pub github: GithubConfig,

    /// Jira source settings.
    #[serde(default)]
    pub jira: JiraConfig,

    /// Team roster.
    #[serde(default)]
    pub team: TeamConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// GitHub API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Personal access token. Usually supplied via `GITHUB_TOKEN` instead.
    #[serde(default)]
    pub token: Option<String>,

    /// REST API base URL.
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// GraphQL endpoint URL.
    #[serde(default = "default_github_graphql_url")]
    pub graphql_url: String,

    /// Repositories to aggregate, as `owner/name`.
    #[serde(default)]
    pub repositories: Vec<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_github_api_url(),
            graphql_url: default_github_graphql_url(),
            repositories: Vec::new(),
        }
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_github_graphql_url() -> String {
    "https://api.github.com/graphql".to_string()
}

/// Jira API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    /// Site hostname, e.g. `yourteam.atlassian.net`.
    #[serde(default)]
    pub host: Option<String>,

    /// Account email for Basic auth.
    #[serde(default)]
    pub email: Option<String>,

    /// API token. Usually supplied via `JIRA_API_TOKEN` instead.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Project key to aggregate, e.g. `PROJ`.
    #[serde(default)]
    pub project_key: Option<String>,

    /// Issue types included in the aggregation.
    #[serde(default = "default_issue_types")]
    pub issue_types: Vec<String>,

    /// Atlassian cloud id for the GraphQL gateway. Discovered from the
    /// host when absent.
    #[serde(default)]
    pub cloud_id: Option<String>,

    /// Search through the Atlassian GraphQL gateway instead of the
    /// site-local REST endpoint.
    #[serde(default)]
    pub use_gateway: bool,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            host: None,
            email: None,
            api_token: None,
            project_key: None,
            issue_types: default_issue_types(),
            cloud_id: None,
            use_gateway: false,
        }
    }
}

fn default_issue_types() -> Vec<String> {
    vec!["Story", "Bug", "Task"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Team roster settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Tracked team members.
    #[serde(default)]
    pub peers: Vec<PeerEntry>,
}

/// One roster entry in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerEntry {
    /// Internal identifier.
    pub id: String,

    /// Display name for reports.
    pub name: String,

    /// GitHub login, if the peer has one.
    #[serde(default)]
    pub github: Option<String>,

    /// Jira account id, if the peer has one.
    #[serde(default)]
    pub jira: Option<String>,
}

impl From<&PeerEntry> for PeerIdentity {
    fn from(entry: &PeerEntry) -> Self {
        PeerIdentity {
            internal_id: entry.id.clone(),
            display_name: entry.name.clone(),
            github_login: entry.github.clone(),
            jira_account_id: entry.jira.clone(),
        }
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Number of contributors shown in leaderboards.
    #[serde(default = "default_top_contributors")]
    pub top_contributors: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            top_contributors: default_top_contributors(),
        }
    }
}

fn default_output() -> String {
    "teampulse_report.md".to_string()
}

fn default_top_contributors() -> usize {
    5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists
    /// but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".teampulse.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings. Only
    /// explicitly provided values override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref token) = args.github_token {
            self.github.token = Some(token.clone());
        }
        if let Some(ref repos) = args.repos {
            self.github.repositories = repos.clone();
        }
        if let Some(ref token) = args.jira_token {
            self.jira.api_token = Some(token.clone());
        }
        if let Some(ref host) = args.jira_host {
            self.jira.host = Some(host.clone());
        }
        if let Some(ref email) = args.jira_email {
            self.jira.email = Some(email.clone());
        }
        if let Some(ref project) = args.project {
            self.jira.project_key = Some(project.clone());
        }
        if let Some(ref output) = args.output {
            self.report.output = output.display().to_string();
        }
    }

    /// The roster as domain identities, narrowed to `members` when the
    /// filter is non-empty. The filter matches internal ids and display
    /// names case-insensitively.
    pub fn peers(&self, members: &[String]) -> Vec<PeerIdentity> {
        self.team
            .peers
            .iter()
            .filter(|entry| {
                members.is_empty()
                    || members.iter().any(|m| {
                        m.eq_ignore_ascii_case(&entry.id) || m.eq_ignore_ascii_case(&entry.name)
                    })
            })
            .map(PeerIdentity::from)
            .collect()
    }

    /// Parsed repository references.
    pub fn repositories(&self) -> Result<Vec<RepoRef>> {
        self.github
            .repositories
            .iter()
            .map(|s| s.parse::<RepoRef>().map_err(anyhow::Error::msg))
            .collect()
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let mut config = Config::default();
        config.github.repositories = vec!["owner/repository".to_string()];
        config.jira.host = Some("yourteam.atlassian.net".to_string());
        config.jira.email = Some("you@example.com".to_string());
        config.jira.project_key = Some("PROJ".to_string());
        config.team.peers = vec![PeerEntry {
            id: "peer-1".to_string(),
            name: "Ada Lovelace".to_string(),
            github: Some("ada".to_string()),
            jira: Some("5f8a9b2c1d".to_string()),
        }];
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
