//! TeamPulse - team performance dashboard for GitHub and Jira
//!
//! A CLI tool that aggregates a team's pull requests and issues over a
//! time window and renders a Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, network, write failure, etc.)

mod aggregate;
mod cli;
mod config;
mod errors;
mod fetch;
mod github;
mod identity;
mod jira;
mod models;
mod query;
mod report;

use anyhow::{bail, Context, Result};
use cli::{Args, OutputFormat};
use config::Config;
use github::GithubClient;
use identity::{reconcile, IdentitySplit};
use jira::JiraClient;
use models::{IssueSummary, PullRequestSummary, Source, TimeWindow};
use query::github::build_team_pull_request_query;
use query::jira::build_team_jql;
use report::{ReportFormat, SourceSection, TeamReport};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("TeamPulse v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_pulse(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .teampulse.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".teampulse.toml");

    if path.exists() {
        eprintln!("⚠️  .teampulse.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .teampulse.toml")?;

    println!("✅ Created .teampulse.toml with default settings.");
    println!("   Edit it to add your repositories, Jira project, and team roster.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete collection and report workflow.
async fn run_pulse(args: Args) -> Result<()> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Handle --lookup-jira-user: roster setup helper, no report
    if let Some(ref query) = args.lookup_jira_user {
        return handle_user_lookup(&config, query).await;
    }

    let window = TimeWindow::ending_now(args.window);

    let peers = config.peers(&args.member);
    if peers.is_empty() {
        if args.member.is_empty() {
            bail!(
                "No team members configured. Add [[team.peers]] entries to \
                 .teampulse.toml or run --init-config for a template."
            );
        }
        bail!(
            "No roster entries match the --member filter: {}",
            args.member.join(", ")
        );
    }
    info!("Team roster: {} member(s)", peers.len());

    let github_split = reconcile(&peers, Source::Github);
    let jira_split = reconcile(&peers, Source::Jira);

    // Handle --plan: print the queries and exit without any network calls
    if args.plan {
        return handle_plan(&config, &args, &window, &github_split, &jira_split);
    }

    // Collect from each selected source
    println!(
        "📡 Collecting activity for the last {} days...",
        window.days
    );
    let pull_requests = collect_pull_requests(&config, &args, &github_split, &window).await;
    let issues = collect_issues(&config, &args, &jira_split, &window).await;

    // Build and render the report
    println!("📝 Generating report...");
    let report = TeamReport::new(
        &window,
        peers.len(),
        github_split.excluded.clone(),
        jira_split.excluded.clone(),
        pull_requests,
        issues,
    );

    let format = match args.format {
        OutputFormat::Markdown => ReportFormat::Markdown,
        OutputFormat::Json => ReportFormat::Json,
    };
    let rendered = report.render(format, config.report.top_contributors)?;

    let output_path = PathBuf::from(&config.report.output);
    report::write_report(&rendered, &output_path)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    print_summary(&report);
    println!("\n✅ Report saved to: {}", output_path.display());

    Ok(())
}

/// Handle --lookup-jira-user: print matching account ids for the roster.
async fn handle_user_lookup(config: &Config, query: &str) -> Result<()> {
    let client = JiraClient::new(&config.jira)?;
    let users = client.search_users(query).await?;

    if users.is_empty() {
        println!("No Jira users match '{}'.", query);
        return Ok(());
    }

    println!("Found {} user(s):", users.len());
    for user in &users {
        println!(
            "   {}  {}  {}",
            user.account_id,
            user.display_name,
            user.email_address.as_deref().unwrap_or("-")
        );
    }
    println!("\nCopy the account id into [[team.peers]] as the jira field.");
    Ok(())
}

/// Handle --plan: show the queries a real run would send.
fn handle_plan(
    config: &Config,
    args: &Args,
    window: &TimeWindow,
    github_split: &IdentitySplit,
    jira_split: &IdentitySplit,
) -> Result<()> {
    println!("\n🔍 Plan: queries for the last {} days (no network calls)\n", window.days);

    if args.source.includes_github() && !github_split.is_empty() {
        let repos = config.repositories().context("Invalid repository list")?;
        if repos.is_empty() {
            println!("GitHub: no repositories configured, nothing to query.\n");
        } else {
            let query =
                build_team_pull_request_query(&repos, &github_split.external_ids(), window);
            println!("GitHub GraphQL document:\n{}\n", query.document);
            println!(
                "GitHub GraphQL variables:\n{}\n",
                serde_json::to_string_pretty(&query.variables)?
            );
        }
    } else {
        println!("GitHub: skipped (not selected or no mapped logins).\n");
    }

    if args.source.includes_jira() && !jira_split.is_empty() {
        match config.jira.project_key.as_deref() {
            Some(project_key) if !project_key.is_empty() => {
                let jql = build_team_jql(
                    project_key,
                    &jira_split.external_ids(),
                    window,
                    &config.jira.issue_types,
                );
                println!("Jira JQL:\n{}\n", jql);
            }
            _ => println!("Jira: no project key configured, nothing to query.\n"),
        }
    } else {
        println!("Jira: skipped (not selected or no mapped account ids).\n");
    }

    println!("✅ Plan complete. No network calls were made.");
    Ok(())
}

/// Collect and summarize the GitHub side, degrading to a skipped section
/// when the source is unselected, unconfigured, or failing.
async fn collect_pull_requests(
    config: &Config,
    args: &Args,
    identities: &IdentitySplit,
    window: &TimeWindow,
) -> SourceSection<PullRequestSummary> {
    if !args.source.includes_github() {
        return SourceSection::Skipped {
            reason: "excluded by --source".to_string(),
        };
    }

    let repos = match config.repositories() {
        Ok(repos) => repos,
        Err(e) => {
            warn!("Invalid repository list: {}", e);
            return SourceSection::Skipped {
                reason: format!("{:#}", e),
            };
        }
    };

    let client = match GithubClient::new(&config.github) {
        Ok(client) => client,
        Err(e) => {
            warn!("GitHub client unavailable: {}", e);
            return SourceSection::Skipped {
                reason: e.to_string(),
            };
        }
    };

    match fetch::fetch_team_pull_requests(&client, &repos, identities, window).await {
        Ok(fetch) => {
            info!(
                "Fetched {} pull requests ({} merged)",
                fetch.total_count, fetch.merged_count
            );
            SourceSection::Collected {
                summary: aggregate::summarize_pull_requests(&fetch.records, identities, window),
            }
        }
        Err(e) => {
            error!("Pull request collection failed: {}", e);
            SourceSection::Skipped {
                reason: e.to_string(),
            }
        }
    }
}

/// Collect and summarize the Jira side.
async fn collect_issues(
    config: &Config,
    args: &Args,
    identities: &IdentitySplit,
    window: &TimeWindow,
) -> SourceSection<IssueSummary> {
    if !args.source.includes_jira() {
        return SourceSection::Skipped {
            reason: "excluded by --source".to_string(),
        };
    }

    let client = match JiraClient::new(&config.jira) {
        Ok(client) => client,
        Err(e) => {
            warn!("Jira client unavailable: {}", e);
            return SourceSection::Skipped {
                reason: e.to_string(),
            };
        }
    };

    let project_key = config.jira.project_key.clone().unwrap_or_default();

    match fetch::fetch_team_issues(
        &client,
        &project_key,
        identities,
        window,
        &config.jira.issue_types,
    )
    .await
    {
        Ok(fetch) => {
            info!("Fetched {} issues", fetch.records.len());
            SourceSection::Collected {
                summary: aggregate::summarize_issues(&fetch.records, identities, window),
            }
        }
        Err(e) => {
            error!("Issue collection failed: {}", e);
            SourceSection::Skipped {
                reason: e.to_string(),
            }
        }
    }
}

/// Print the closing summary panel.
fn print_summary(report: &TeamReport) {
    println!("\n📊 TeamPulse Summary:");

    match &report.pull_requests {
        SourceSection::Collected { summary } => {
            println!(
                "   Pull requests: {} total, {} merged ({:.1}% merge rate)",
                summary.total_prs, summary.merged_prs, summary.merge_rate
            );
        }
        SourceSection::Skipped { reason } => {
            println!("   Pull requests: not collected ({})", reason);
        }
    }

    match &report.issues {
        SourceSection::Collected { summary } => {
            println!(
                "   Issues: {} total, {} stories / {} bugs / {} tasks completed",
                summary.total_issues,
                summary.stories_completed,
                summary.bugs_fixed,
                summary.tasks_completed
            );
        }
        SourceSection::Skipped { reason } => {
            println!("   Issues: not collected ({})", reason);
        }
    }

    if !report.metadata.github_excluded.is_empty() || !report.metadata.jira_excluded.is_empty() {
        println!("   ⚠️  Some peers lack source identities; see the report's coverage notes.");
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .teampulse.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
