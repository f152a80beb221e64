//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// TeamPulse - team performance dashboard for GitHub and Jira
///
/// Aggregate your team's pull requests and issues over a time window
/// into a Markdown or JSON report: merge rates, cycle times, per-member
/// leaderboards, PR size distribution, and daily activity timelines.
///
/// Examples:
///   teampulse --repos acme/widgets,acme/gadgets --window 14
///   teampulse --source jira --project PROJ --jira-host acme.atlassian.net
///   teampulse --member alice --member bob --format json --output pulse.json
///   teampulse --plan
///   teampulse --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// GitHub personal access token
    ///
    /// Can also be set in .teampulse.toml under [github].token.
    #[arg(long, env = "GITHUB_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Repositories to aggregate, as owner/name (comma-separated)
    ///
    /// Overrides [github].repositories from the config file.
    /// Example: --repos acme/widgets,acme/gadgets
    #[arg(short, long, value_name = "REPOS", value_delimiter = ',')]
    pub repos: Option<Vec<String>>,

    /// Jira API token
    #[arg(long, env = "JIRA_API_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub jira_token: Option<String>,

    /// Jira site hostname (e.g. yourteam.atlassian.net)
    #[arg(long, value_name = "HOST")]
    pub jira_host: Option<String>,

    /// Jira account email for Basic auth
    #[arg(long, value_name = "EMAIL")]
    pub jira_email: Option<String>,

    /// Jira project key to aggregate (e.g. PROJ)
    #[arg(short, long, value_name = "KEY")]
    pub project: Option<String>,

    /// Time window in days, ending now
    #[arg(short, long, default_value = "30", value_name = "DAYS")]
    pub window: u32,

    /// Which sources to collect from
    #[arg(long, default_value = "all", value_name = "SOURCE")]
    pub source: SourceSelection,

    /// Narrow the report to specific team members (repeatable)
    ///
    /// Matches roster ids and display names case-insensitively.
    #[arg(short, long, value_name = "NAME")]
    pub member: Vec<String>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .teampulse.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Look up Jira users by name or email and exit
    ///
    /// Prints matching account ids, useful for filling in the roster's
    /// jira fields. Requires Jira credentials.
    #[arg(long, value_name = "QUERY")]
    pub lookup_jira_user: Option<String>,

    /// Plan mode: print the queries that would be sent and exit
    ///
    /// Shows the GitHub GraphQL document and the Jira JQL without
    /// making any network calls.
    #[arg(long)]
    pub plan: bool,

    /// Generate a default .teampulse.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Which sources the run collects from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SourceSelection {
    /// GitHub pull requests only
    Github,
    /// Jira issues only
    Jira,
    /// Both sources (default)
    #[default]
    All,
}

impl SourceSelection {
    pub fn includes_github(self) -> bool {
        matches!(self, SourceSelection::Github | SourceSelection::All)
    }

    pub fn includes_jira(self) -> bool {
        matches!(self, SourceSelection::Jira | SourceSelection::All)
    }
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.window == 0 {
            return Err("Window must be at least 1 day".to_string());
        }

        if self.window > 365 {
            return Err("Window must be at most 365 days".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref repos) = self.repos {
            for repo in repos {
                if !repo.contains('/') {
                    return Err(format!(
                        "Repository '{}' is not in owner/name form",
                        repo
                    ));
                }
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
