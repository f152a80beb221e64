//! Data models for the metrics aggregator.
//!
//! This module contains all the core data structures used throughout
//! the application for representing peers, fetched records, and the
//! derived metric summaries.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External data source a metric is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// GitHub pull requests.
    Github,
    /// Jira issues.
    Jira,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Github => write!(f, "GitHub"),
            Source::Jira => write!(f, "Jira"),
        }
    }
}

/// An internal team member record with optional external identities.
///
/// At least one of `github_login`/`jira_account_id` should be present for
/// the peer to contribute to any metric; absence of one means exclusion
/// from that source only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerIdentity {
    /// Internal identifier, unique within the roster.
    pub internal_id: String,
    /// Human-readable name used in reports.
    pub display_name: String,
    /// GitHub login, if mapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_login: Option<String>,
    /// Jira account id, if mapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_account_id: Option<String>,
}

impl PeerIdentity {
    /// Returns the external identity for the given source, if mapped.
    pub fn identity_for(&self, source: Source) -> Option<&str> {
        match source {
            Source::Github => self.github_login.as_deref(),
            Source::Jira => self.jira_account_id.as_deref(),
        }
    }
}

/// An `owner/name` repository reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok(RepoRef {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(format!(
                "Invalid repository reference '{}': expected owner/name",
                s
            )),
        }
    }
}

/// State of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Merged,
    Closed,
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Merged => write!(f, "merged"),
            PrState::Closed => write!(f, "closed"),
        }
    }
}

/// A fetched pull request. Immutable once fetched; re-fetched on each
/// aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub id: u64,
    pub title: String,
    pub state: PrState,
    /// GitHub login of the author.
    pub author: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    pub additions: u64,
    pub deletions: u64,
    /// Number of submitted reviews (approvals, change requests, review
    /// comments). Both fetch strategies report this same quantity.
    pub review_count: u64,
    /// `owner/name` of the repository the PR belongs to.
    pub repository: String,
}

impl PullRequestRecord {
    /// Total lines touched by the PR.
    pub fn changed_lines(&self) -> u64 {
        self.additions + self.deletions
    }
}

/// A fetched Jira issue. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: String,
    /// Issue key, e.g. `PROJ-123`.
    pub key: String,
    pub issue_type: String,
    pub status: String,
    pub priority: String,
    /// Jira account id of the assignee, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Display name of the assignee, for reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,
    pub created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_points: Option<f64>,
    pub project: String,
}

impl IssueRecord {
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }
}

/// The aggregation window: `days` calendar days ending at `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub end: DateTime<Utc>,
    pub days: u32,
}

impl TimeWindow {
    /// A window of `days` days ending now.
    pub fn ending_now(days: u32) -> Self {
        Self {
            end: Utc::now(),
            days,
        }
    }

    /// Lower bound timestamp for fetch queries.
    pub fn since(&self) -> DateTime<Utc> {
        self.end - Duration::days(i64::from(self.days))
    }

    /// The calendar days covered by the window, oldest first.
    ///
    /// Always exactly `days` entries, ending with the day of `end`.
    pub fn calendar_days(&self) -> Vec<NaiveDate> {
        let last = self.end.date_naive();
        (0..self.days)
            .map(|i| last - Duration::days(i64::from(self.days - 1 - i)))
            .collect()
    }
}

/// Size bucket for a pull request, by total changed lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeBucket {
    /// Up to 50 changed lines.
    Small,
    /// 51 to 200 changed lines.
    Medium,
    /// 201 to 500 changed lines.
    Large,
    /// More than 500 changed lines.
    Xlarge,
}

impl SizeBucket {
    /// Buckets a changed-line count. Total and non-overlapping: every
    /// count falls into exactly one bucket.
    pub fn from_changed_lines(lines: u64) -> Self {
        match lines {
            0..=50 => SizeBucket::Small,
            51..=200 => SizeBucket::Medium,
            201..=500 => SizeBucket::Large,
            _ => SizeBucket::Xlarge,
        }
    }
}

impl fmt::Display for SizeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeBucket::Small => write!(f, "small"),
            SizeBucket::Medium => write!(f, "medium"),
            SizeBucket::Large => write!(f, "large"),
            SizeBucket::Xlarge => write!(f, "xlarge"),
        }
    }
}

/// Pull request counts per size bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeDistribution {
    pub small: u64,
    pub medium: u64,
    pub large: u64,
    pub xlarge: u64,
}

impl SizeDistribution {
    pub fn record(&mut self, bucket: SizeBucket) {
        match bucket {
            SizeBucket::Small => self.small += 1,
            SizeBucket::Medium => self.medium += 1,
            SizeBucket::Large => self.large += 1,
            SizeBucket::Xlarge => self.xlarge += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.small + self.medium + self.large + self.xlarge
    }
}

/// One day of the activity timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub count: u64,
}

/// Per-contributor pull request statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrContributor {
    /// GitHub login.
    pub login: String,
    pub total_prs: u64,
    pub merged_prs: u64,
    pub additions: u64,
    pub deletions: u64,
    /// Mean changed lines per PR.
    pub avg_lines_changed: f64,
}

/// Per-contributor issue statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueContributor {
    /// Jira account id.
    pub account_id: String,
    /// Display name, falling back to the account id.
    pub display_name: String,
    pub total_issues: u64,
    pub resolved_issues: u64,
}

/// Derived GitHub metrics for the team over one window.
///
/// Field names and types are a stable contract for the presentation
/// layer; recomputed on every run, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub total_prs: u64,
    pub merged_prs: u64,
    pub open_prs: u64,
    pub closed_prs: u64,
    /// `merged / total * 100`; 0 when no PRs were fetched.
    pub merge_rate: f64,
    /// Mean hours from creation to merge, over merged PRs only; 0 when
    /// nothing merged in the window.
    pub avg_time_to_merge_hours: f64,
    pub total_additions: u64,
    pub total_deletions: u64,
    /// Percentage of PRs with at least one submitted review.
    pub review_participation: f64,
    pub top_contributors: Vec<PrContributor>,
    pub size_distribution: SizeDistribution,
    /// Dense per-day series: exactly `window.days` entries.
    pub timeline: Vec<TimelinePoint>,
}

impl PullRequestSummary {
    /// The zero-valued summary for a window, used when no identities are
    /// mapped for GitHub. The timeline is still dense.
    pub fn empty(window: &TimeWindow) -> Self {
        Self {
            total_prs: 0,
            merged_prs: 0,
            open_prs: 0,
            closed_prs: 0,
            merge_rate: 0.0,
            avg_time_to_merge_hours: 0.0,
            total_additions: 0,
            total_deletions: 0,
            review_participation: 0.0,
            top_contributors: Vec::new(),
            size_distribution: SizeDistribution::default(),
            timeline: window
                .calendar_days()
                .into_iter()
                .map(|date| TimelinePoint { date, count: 0 })
                .collect(),
        }
    }
}

/// Derived Jira metrics for the team over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub total_issues: u64,
    pub stories_completed: u64,
    pub bugs_fixed: u64,
    pub tasks_completed: u64,
    /// Mean hours from creation to resolution, over resolved issues only.
    pub avg_cycle_time_hours: f64,
    pub top_contributors: Vec<IssueContributor>,
    /// Dense per-day series: exactly `window.days` entries.
    pub timeline: Vec<TimelinePoint>,
}

impl IssueSummary {
    /// The zero-valued summary for a window.
    pub fn empty(window: &TimeWindow) -> Self {
        Self {
            total_issues: 0,
            stories_completed: 0,
            bugs_fixed: 0,
            tasks_completed: 0,
            avg_cycle_time_hours: 0.0,
            top_contributors: Vec::new(),
            timeline: window
                .calendar_days()
                .into_iter()
                .map(|date| TimelinePoint { date, count: 0 })
                .collect(),
        }
    }
}

/// Result of one team pull request fetch, owned by the orchestrator for
/// the duration of the aggregation call.
#[derive(Debug, Clone, Default)]
pub struct PullRequestFetch {
    pub records: Vec<PullRequestRecord>,
    pub total_count: u64,
    pub merged_count: u64,
    pub open_count: u64,
}

/// Result of one team issue fetch.
///
/// `total_count` comes from the search response and may exceed
/// `records.len()` when the first page was capped.
#[derive(Debug, Clone, Default)]
pub struct IssueFetch {
    pub records: Vec<IssueRecord>,
    pub total_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_size_bucket_boundaries() {
        assert_eq!(SizeBucket::from_changed_lines(0), SizeBucket::Small);
        assert_eq!(SizeBucket::from_changed_lines(50), SizeBucket::Small);
        assert_eq!(SizeBucket::from_changed_lines(51), SizeBucket::Medium);
        assert_eq!(SizeBucket::from_changed_lines(200), SizeBucket::Medium);
        assert_eq!(SizeBucket::from_changed_lines(201), SizeBucket::Large);
        assert_eq!(SizeBucket::from_changed_lines(500), SizeBucket::Large);
        assert_eq!(SizeBucket::from_changed_lines(501), SizeBucket::Xlarge);
        assert_eq!(SizeBucket::from_changed_lines(10_000), SizeBucket::Xlarge);
    }

    #[test]
    fn test_repo_ref_parse() {
        let repo: RepoRef = "acme/widgets".parse().unwrap();
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "widgets");
        assert_eq!(repo.to_string(), "acme/widgets");

        assert!("acme".parse::<RepoRef>().is_err());
        assert!("/widgets".parse::<RepoRef>().is_err());
        assert!("acme/".parse::<RepoRef>().is_err());
    }

    #[test]
    fn test_time_window_calendar_days() {
        let end = Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap();
        let window = TimeWindow { end, days: 3 };

        let days = window.calendar_days();
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].to_string(), "2024-03-08");
        assert_eq!(days[2].to_string(), "2024-03-10");
    }

    #[test]
    fn test_time_window_since() {
        let end = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let window = TimeWindow { end, days: 30 };
        assert_eq!(
            window.since(),
            Utc.with_ymd_and_hms(2024, 2, 9, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_identity_for_source() {
        let peer = PeerIdentity {
            internal_id: "p1".to_string(),
            display_name: "Alice".to_string(),
            github_login: Some("alice-gh".to_string()),
            jira_account_id: None,
        };
        assert_eq!(peer.identity_for(Source::Github), Some("alice-gh"));
        assert_eq!(peer.identity_for(Source::Jira), None);
    }

    #[test]
    fn test_empty_summary_has_dense_timeline() {
        let end = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let window = TimeWindow { end, days: 7 };

        let summary = PullRequestSummary::empty(&window);
        assert_eq!(summary.timeline.len(), 7);
        assert!(summary.timeline.iter().all(|p| p.count == 0));
        assert_eq!(summary.merge_rate, 0.0);
    }
}
