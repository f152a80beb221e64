//! Report generation.
//!
//! This module renders the aggregated summaries as Markdown or JSON.
//! A source that was never configured is reported differently from a
//! source that was queried and came back empty; readers should be able
//! to tell "we did not ask" from "there was nothing".

use crate::models::{IssueSummary, PullRequestSummary, TimeWindow, TimelinePoint};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Output format of the rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Json,
}

/// Outcome of one source in the report.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceSection<T> {
    /// The source was not queried at all.
    Skipped { reason: String },
    /// The source was queried; the summary may still be empty.
    Collected { summary: T },
}

/// Report metadata header.
#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub window_days: u32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub team_size: usize,
    /// Peers dropped from a source because they carry no identity there.
    pub github_excluded: Vec<String>,
    pub jira_excluded: Vec<String>,
}

/// The complete report document.
#[derive(Debug, Serialize)]
pub struct TeamReport {
    pub metadata: ReportMetadata,
    pub pull_requests: SourceSection<PullRequestSummary>,
    pub issues: SourceSection<IssueSummary>,
}

impl TeamReport {
    pub fn new(
        window: &TimeWindow,
        team_size: usize,
        github_excluded: Vec<String>,
        jira_excluded: Vec<String>,
        pull_requests: SourceSection<PullRequestSummary>,
        issues: SourceSection<IssueSummary>,
    ) -> Self {
        Self {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                window_days: window.days,
                window_start: window.since(),
                window_end: window.end,
                team_size,
                github_excluded,
                jira_excluded,
            },
            pull_requests,
            issues,
        }
    }

    pub fn render(&self, format: ReportFormat, top_contributors: usize) -> Result<String> {
        match format {
            ReportFormat::Markdown => Ok(generate_markdown_report(self, top_contributors)),
            ReportFormat::Json => generate_json_report(self),
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &TeamReport, top_contributors: usize) -> String {
    let mut output = String::new();

    output.push_str("# TeamPulse Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_pull_request_section(
        &report.pull_requests,
        top_contributors,
    ));
    output.push_str(&generate_issue_section(&report.issues, top_contributors));
    output.push_str(&generate_exclusions_section(&report.metadata));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Overview\n\n");
    section.push_str(&format!(
        "- **Window:** last {} days ({} to {})\n",
        metadata.window_days,
        metadata.window_start.format("%Y-%m-%d"),
        metadata.window_end.format("%Y-%m-%d")
    ));
    section.push_str(&format!("- **Team members:** {}\n", metadata.team_size));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push('\n');

    section
}

/// Generate the pull request section.
fn generate_pull_request_section(
    section_data: &SourceSection<PullRequestSummary>,
    top_contributors: usize,
) -> String {
    let mut section = String::new();

    section.push_str("## Pull Requests\n\n");

    let summary = match section_data {
        SourceSection::Skipped { reason } => {
            section.push_str(&format!("_Not collected: {}_\n\n", reason));
            return section;
        }
        SourceSection::Collected { summary } => summary,
    };

    if summary.total_prs == 0 {
        section.push_str("No pull requests were found in the window.\n\n");
        return section;
    }

    // KPI cards
    section.push_str("| Total | Merged | Open | Closed | Merge rate |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {:.1}% |\n\n",
        summary.total_prs,
        summary.merged_prs,
        summary.open_prs,
        summary.closed_prs,
        summary.merge_rate
    ));

    section.push_str(&format!(
        "- **Avg time to merge:** {}\n",
        format_hours(summary.avg_time_to_merge_hours)
    ));
    section.push_str(&format!(
        "- **Review participation:** {:.1}% of PRs received review activity\n",
        summary.review_participation
    ));
    section.push_str(&format!(
        "- **Lines changed:** +{} / -{}\n\n",
        summary.total_additions, summary.total_deletions
    ));

    // Contributor leaderboard
    if !summary.top_contributors.is_empty() {
        section.push_str("### Top Contributors\n\n");
        section.push_str("| Login | PRs | Merged | Avg lines changed |\n");
        section.push_str("|:---|:---:|:---:|:---:|\n");
        for contributor in summary.top_contributors.iter().take(top_contributors) {
            section.push_str(&format!(
                "| {} | {} | {} | {:.0} |\n",
                contributor.login,
                contributor.total_prs,
                contributor.merged_prs,
                contributor.avg_lines_changed
            ));
        }
        section.push('\n');
    }

    // Size distribution
    let dist = &summary.size_distribution;
    section.push_str("### PR Size Distribution\n\n");
    section.push_str("| Small (≤50) | Medium (51-200) | Large (201-500) | X-Large (>500) |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        dist.small, dist.medium, dist.large, dist.xlarge
    ));

    section.push_str(&generate_timeline_section("PR Activity", &summary.timeline));

    section
}

/// Generate the issue section.
fn generate_issue_section(
    section_data: &SourceSection<IssueSummary>,
    top_contributors: usize,
) -> String {
    let mut section = String::new();

    section.push_str("## Issues\n\n");

    let summary = match section_data {
        SourceSection::Skipped { reason } => {
            section.push_str(&format!("_Not collected: {}_\n\n", reason));
            return section;
        }
        SourceSection::Collected { summary } => summary,
    };

    if summary.total_issues == 0 {
        section.push_str("No issues were found in the window.\n\n");
        return section;
    }

    section.push_str("| Total | Stories done | Bugs fixed | Tasks done |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        summary.total_issues,
        summary.stories_completed,
        summary.bugs_fixed,
        summary.tasks_completed
    ));

    section.push_str(&format!(
        "- **Avg cycle time:** {}\n\n",
        format_hours(summary.avg_cycle_time_hours)
    ));

    if !summary.top_contributors.is_empty() {
        section.push_str("### Top Contributors\n\n");
        section.push_str("| Assignee | Issues | Resolved |\n");
        section.push_str("|:---|:---:|:---:|\n");
        for contributor in summary.top_contributors.iter().take(top_contributors) {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                contributor.display_name, contributor.total_issues, contributor.resolved_issues
            ));
        }
        section.push('\n');
    }

    section.push_str(&generate_timeline_section(
        "Issue Activity",
        &summary.timeline,
    ));

    section
}

/// Generate a per-day activity chart.
fn generate_timeline_section(title: &str, timeline: &[TimelinePoint]) -> String {
    let mut section = String::new();

    section.push_str(&format!("### {}\n\n", title));
    section.push_str("```\n");
    for point in timeline {
        section.push_str(&format!(
            "{} | {:>3} {}\n",
            point.date.format("%Y-%m-%d"),
            point.count,
            "#".repeat(point.count as usize)
        ));
    }
    section.push_str("```\n\n");

    section
}

/// Generate the note on peers excluded for lacking identities.
fn generate_exclusions_section(metadata: &ReportMetadata) -> String {
    if metadata.github_excluded.is_empty() && metadata.jira_excluded.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Coverage Notes\n\n");
    if !metadata.github_excluded.is_empty() {
        section.push_str(&format!(
            "- Not counted for GitHub (no login on file): {}\n",
            metadata.github_excluded.join(", ")
        ));
    }
    if !metadata.jira_excluded.is_empty() {
        section.push_str(&format!(
            "- Not counted for Jira (no account id on file): {}\n",
            metadata.jira_excluded.join(", ")
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by TeamPulse*\n");

    footer
}

fn format_hours(hours: f64) -> String {
    if hours >= 48.0 {
        format!("{:.1} days", hours / 24.0)
    } else {
        format!("{:.1} hours", hours)
    }
}

/// Generate a JSON report.
pub fn generate_json_report(report: &TeamReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write a rendered report to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
