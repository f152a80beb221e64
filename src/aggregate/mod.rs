//! Statistical folding of fetched records into team summaries.
//!
//! Pure functions: records and identities in, summary out. Contributor
//! accumulation folds over an insertion-ordered map so leaderboard order
//! is deterministic — ties keep first-seen order instead of depending on
//! hash iteration.

use crate::identity::IdentitySplit;
use crate::models::{
    IssueContributor, IssueRecord, IssueSummary, PrContributor, PrState, PullRequestRecord,
    PullRequestSummary, SizeBucket, SizeDistribution, TimeWindow, TimelinePoint,
};
use chrono::NaiveDate;
use indexmap::IndexMap;

/// `merged / total * 100`, and 0 for an empty total — never NaN.
fn rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Fold pull request records into the team summary.
///
/// `identities` bounds the leaderboard: only authors reconciled for
/// GitHub appear in `top_contributors`, so an unmapped peer can never
/// surface there regardless of what the fetch returned.
pub fn summarize_pull_requests(
    records: &[PullRequestRecord],
    identities: &IdentitySplit,
    window: &TimeWindow,
) -> PullRequestSummary {
    if records.is_empty() {
        return PullRequestSummary::empty(window);
    }

    let total_prs = records.len() as u64;
    let merged_prs = records.iter().filter(|r| r.state == PrState::Merged).count() as u64;
    let open_prs = records.iter().filter(|r| r.state == PrState::Open).count() as u64;
    let closed_prs = records.iter().filter(|r| r.state == PrState::Closed).count() as u64;

    // Mean time to merge over PRs that actually merged; unmerged PRs are
    // excluded from numerator and denominator, never treated as zero.
    let merge_durations: Vec<f64> = records
        .iter()
        .filter_map(|r| {
            r.merged_at
                .map(|merged| (merged - r.created_at).num_seconds() as f64 / 3600.0)
        })
        .collect();
    let avg_time_to_merge_hours = mean(&merge_durations);

    let total_additions: u64 = records.iter().map(|r| r.additions).sum();
    let total_deletions: u64 = records.iter().map(|r| r.deletions).sum();

    let reviewed = records.iter().filter(|r| r.review_count > 0).count() as u64;

    let mut size_distribution = SizeDistribution::default();
    for record in records {
        size_distribution.record(SizeBucket::from_changed_lines(record.changed_lines()));
    }

    PullRequestSummary {
        total_prs,
        merged_prs,
        open_prs,
        closed_prs,
        merge_rate: rate(merged_prs, total_prs),
        avg_time_to_merge_hours,
        total_additions,
        total_deletions,
        review_participation: rate(reviewed, total_prs),
        top_contributors: rank_pr_contributors(records, identities),
        size_distribution,
        timeline: dense_timeline(window, records.iter().map(|r| r.created_at.date_naive())),
    }
}

/// Group records by author into an ordered leaderboard.
fn rank_pr_contributors(
    records: &[PullRequestRecord],
    identities: &IdentitySplit,
) -> Vec<PrContributor> {
    let mut by_author: IndexMap<String, PrContributor> = IndexMap::new();

    for record in records {
        let mapped = identities
            .included
            .iter()
            .any(|id| id.external_id.eq_ignore_ascii_case(&record.author));
        if !mapped {
            continue;
        }

        let entry = by_author
            .entry(record.author.clone())
            .or_insert_with(|| PrContributor {
                login: record.author.clone(),
                total_prs: 0,
                merged_prs: 0,
                additions: 0,
                deletions: 0,
                avg_lines_changed: 0.0,
            });
        entry.total_prs += 1;
        if record.state == PrState::Merged {
            entry.merged_prs += 1;
        }
        entry.additions += record.additions;
        entry.deletions += record.deletions;
    }

    let mut ranked: Vec<PrContributor> = by_author
        .into_values()
        .map(|mut c| {
            c.avg_lines_changed = (c.additions + c.deletions) as f64 / c.total_prs as f64;
            c
        })
        .collect();

    // Stable sort: ties keep first-seen order.
    ranked.sort_by(|a, b| b.total_prs.cmp(&a.total_prs));
    ranked
}

/// Fold issue records into the team summary.
pub fn summarize_issues(
    records: &[IssueRecord],
    identities: &IdentitySplit,
    window: &TimeWindow,
) -> IssueSummary {
    if records.is_empty() {
        return IssueSummary::empty(window);
    }

    let total_issues = records.len() as u64;

    let completed_of_type = |issue_type: &str| {
        records
            .iter()
            .filter(|r| r.is_resolved() && r.issue_type.eq_ignore_ascii_case(issue_type))
            .count() as u64
    };

    let cycle_times: Vec<f64> = records
        .iter()
        .filter_map(|r| {
            r.resolved
                .map(|resolved| (resolved - r.created).num_seconds() as f64 / 3600.0)
        })
        .collect();

    IssueSummary {
        total_issues,
        stories_completed: completed_of_type("Story"),
        bugs_fixed: completed_of_type("Bug"),
        tasks_completed: completed_of_type("Task"),
        avg_cycle_time_hours: mean(&cycle_times),
        top_contributors: rank_issue_contributors(records, identities),
        timeline: dense_timeline(window, records.iter().map(|r| r.created.date_naive())),
    }
}

/// Group records by assignee account id. Unassigned issues count in the
/// totals but cannot appear on the leaderboard.
fn rank_issue_contributors(
    records: &[IssueRecord],
    identities: &IdentitySplit,
) -> Vec<IssueContributor> {
    let mut by_assignee: IndexMap<String, IssueContributor> = IndexMap::new();

    for record in records {
        let Some(account_id) = record.assignee.as_deref() else {
            continue;
        };
        let resolved_identity = identities
            .included
            .iter()
            .find(|id| id.external_id == account_id);
        if resolved_identity.is_none() {
            continue;
        }

        let entry = by_assignee
            .entry(account_id.to_string())
            .or_insert_with(|| IssueContributor {
                account_id: account_id.to_string(),
                display_name: record
                    .assignee_name
                    .clone()
                    .or_else(|| resolved_identity.map(|id| id.display_name.clone()))
                    .unwrap_or_else(|| account_id.to_string()),
                total_issues: 0,
                resolved_issues: 0,
            });
        entry.total_issues += 1;
        if record.is_resolved() {
            entry.resolved_issues += 1;
        }
    }

    let mut ranked: Vec<IssueContributor> = by_assignee.into_values().collect();
    ranked.sort_by(|a, b| b.resolved_issues.cmp(&a.resolved_issues));
    ranked
}

/// Zero-filled per-day series over the window, incremented per record
/// date. Always exactly `window.days` entries; dates outside the window
/// are ignored rather than growing the series.
fn dense_timeline(window: &TimeWindow, dates: impl Iterator<Item = NaiveDate>) -> Vec<TimelinePoint> {
    let mut by_day: IndexMap<NaiveDate, u64> = window
        .calendar_days()
        .into_iter()
        .map(|date| (date, 0))
        .collect();

    for date in dates {
        if let Some(count) = by_day.get_mut(&date) {
            *count += 1;
        }
    }

    by_day
        .into_iter()
        .map(|(date, count)| TimelinePoint { date, count })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
