//! Fetch orchestration.
//!
//! Fans one logical team query out to the external APIs and collects raw
//! record lists for the aggregator. The GitHub path has two named
//! strategies: the primary single GraphQL request, and a REST fallback
//! that lists every configured repository and filters client-side. The
//! Jira path is a single REST search over the built JQL.
//!
//! Both entry points short-circuit on an empty identity list and return
//! a zero-valued result without touching the network: an empty author
//! array or OR-clause can be misread by the external API as "no filter".

use crate::errors::FetchError;
use crate::github::GithubClient;
use crate::identity::IdentitySplit;
use crate::jira::JiraClient;
use crate::models::{IssueFetch, PrState, PullRequestFetch, PullRequestRecord, RepoRef, TimeWindow};
use crate::query::github::{build_team_pull_request_query, GithubQuery};
use crate::query::jira::build_team_jql;
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{info, warn};

/// Page size for Jira searches. Only the first page is aggregated.
pub const JIRA_PAGE_SIZE: u32 = 100;

/// Seam between the orchestrator and the GitHub client, so strategy
/// selection can be tested without a network.
#[async_trait]
pub trait GithubGateway: Sync {
    /// Primary strategy: one GraphQL request covering every repository.
    async fn fetch_team_graphql(
        &self,
        query: &GithubQuery,
    ) -> Result<Vec<PullRequestRecord>, FetchError>;

    /// Fallback strategy: REST listing of one repository.
    async fn fetch_repo_rest(&self, repo: &RepoRef)
        -> Result<Vec<PullRequestRecord>, FetchError>;
}

/// Seam between the orchestrator and the Jira client.
#[async_trait]
pub trait JiraGateway: Sync {
    async fn search_issues(&self, jql: &str, max_results: u32) -> Result<IssueFetch, FetchError>;
}

#[async_trait]
impl GithubGateway for GithubClient {
    async fn fetch_team_graphql(
        &self,
        query: &GithubQuery,
    ) -> Result<Vec<PullRequestRecord>, FetchError> {
        self.execute_team_query(query).await
    }

    async fn fetch_repo_rest(
        &self,
        repo: &RepoRef,
    ) -> Result<Vec<PullRequestRecord>, FetchError> {
        self.list_repo_pull_requests(repo).await
    }
}

#[async_trait]
impl JiraGateway for JiraClient {
    async fn search_issues(&self, jql: &str, max_results: u32) -> Result<IssueFetch, FetchError> {
        self.run_search(jql, max_results).await
    }
}

/// Fetch the team's pull requests over the window.
///
/// GraphQL first; any failure of the primary strategy other than a
/// configuration error logs and falls back to REST. Configuration errors
/// propagate, since retrying a misconfigured client cannot help.
pub async fn fetch_team_pull_requests<G: GithubGateway>(
    gateway: &G,
    repos: &[RepoRef],
    identities: &IdentitySplit,
    window: &TimeWindow,
) -> Result<PullRequestFetch, FetchError> {
    if identities.is_empty() {
        info!("No peers mapped to GitHub; skipping fetch");
        return Ok(PullRequestFetch::default());
    }
    if repos.is_empty() {
        return Err(FetchError::Configuration(
            "No GitHub repositories configured".to_string(),
        ));
    }

    let logins = identities.external_ids();

    let records = match fetch_via_graphql(gateway, repos, &logins, window).await {
        Ok(records) => records,
        Err(e) if e.triggers_fallback() => {
            warn!("GraphQL strategy failed ({}); falling back to REST", e);
            fetch_via_rest(gateway, repos, &logins, window).await
        }
        Err(e) => return Err(e),
    };

    Ok(tally_pull_requests(records))
}

/// Primary strategy: one GraphQL request for every repository.
async fn fetch_via_graphql<G: GithubGateway>(
    gateway: &G,
    repos: &[RepoRef],
    logins: &[String],
    window: &TimeWindow,
) -> Result<Vec<PullRequestRecord>, FetchError> {
    let query = build_team_pull_request_query(repos, logins, window);
    gateway.fetch_team_graphql(&query).await
}

/// Fallback strategy: list each repository over REST, filter client-side
/// by author membership and the window lower bound, deduplicate by id,
/// and sort newest first.
///
/// A failing repository is logged and skipped; partial data beats
/// aborting the whole aggregation.
async fn fetch_via_rest<G: GithubGateway>(
    gateway: &G,
    repos: &[RepoRef],
    logins: &[String],
    window: &TimeWindow,
) -> Vec<PullRequestRecord> {
    let since = window.since();
    let mut records: Vec<PullRequestRecord> = Vec::new();
    let mut seen: HashSet<u64> = HashSet::new();

    for repo in repos {
        let listed = match gateway.fetch_repo_rest(repo).await {
            Ok(listed) => listed,
            Err(e) => {
                warn!("REST listing for {} failed ({}); skipping repository", repo, e);
                continue;
            }
        };

        if listed.len() as u32 >= crate::github::REST_PAGE_SIZE {
            warn!(
                "{} returned a full page of {} pull requests; older activity may be truncated",
                repo,
                crate::github::REST_PAGE_SIZE
            );
        }

        for record in listed {
            let authored_by_team = logins
                .iter()
                .any(|login| login.eq_ignore_ascii_case(&record.author));
            if !authored_by_team || record.created_at < since {
                continue;
            }
            if seen.insert(record.id) {
                records.push(record);
            }
        }
    }

    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

fn tally_pull_requests(records: Vec<PullRequestRecord>) -> PullRequestFetch {
    let total_count = records.len() as u64;
    let merged_count = records.iter().filter(|r| r.state == PrState::Merged).count() as u64;
    let open_count = records.iter().filter(|r| r.state == PrState::Open).count() as u64;

    PullRequestFetch {
        records,
        total_count,
        merged_count,
        open_count,
    }
}

/// Fetch the team's issues over the window.
///
/// A single search with the built JQL; failures propagate as typed
/// errors, there is no further fallback on the Jira path.
pub async fn fetch_team_issues<J: JiraGateway>(
    gateway: &J,
    project_key: &str,
    identities: &IdentitySplit,
    window: &TimeWindow,
    issue_types: &[String],
) -> Result<IssueFetch, FetchError> {
    if identities.is_empty() {
        info!("No peers mapped to Jira; skipping fetch");
        return Ok(IssueFetch::default());
    }
    if project_key.is_empty() {
        return Err(FetchError::Configuration(
            "No Jira project key configured".to_string(),
        ));
    }

    let account_ids = identities.external_ids();
    let jql = build_team_jql(project_key, &account_ids, window, issue_types);

    let fetch = gateway.search_issues(&jql, JIRA_PAGE_SIZE).await?;

    if fetch.total_count > fetch.records.len() as u64 {
        warn!(
            "Jira search matched {} issues but only {} were returned on the first page",
            fetch.total_count,
            fetch.records.len()
        );
    }

    Ok(fetch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{reconcile, IdentitySplit};
    use crate::models::{IssueRecord, PeerIdentity, Source};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn window() -> TimeWindow {
        TimeWindow {
            end: Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
            days: 30,
        }
    }

    fn repos() -> Vec<RepoRef> {
        vec![
            "acme/widgets".parse().unwrap(),
            "acme/gadgets".parse().unwrap(),
        ]
    }

    fn identities(logins: &[&str]) -> IdentitySplit {
        let peers: Vec<PeerIdentity> = logins
            .iter()
            .enumerate()
            .map(|(i, login)| PeerIdentity {
                internal_id: format!("p{}", i),
                display_name: login.to_string(),
                github_login: Some(login.to_string()),
                jira_account_id: None,
            })
            .collect();
        reconcile(&peers, Source::Github)
    }

    fn pr(id: u64, author: &str, repo: &str, days_ago: i64) -> PullRequestRecord {
        PullRequestRecord {
            id,
            title: format!("PR {}", id),
            state: PrState::Merged,
            author: author.to_string(),
            created_at: window().end - Duration::days(days_ago),
            merged_at: Some(window().end - Duration::days(days_ago - 1)),
            additions: 10,
            deletions: 5,
            review_count: 1,
            repository: repo.to_string(),
        }
    }

    /// Mock GitHub gateway with per-strategy call counters.
    struct MockGithub {
        graphql_calls: AtomicUsize,
        rest_calls: AtomicUsize,
        graphql_result: Result<Vec<PullRequestRecord>, FetchError>,
        rest_repos: HashMap<String, Result<Vec<PullRequestRecord>, String>>,
    }

    impl MockGithub {
        fn graphql_ok(records: Vec<PullRequestRecord>) -> Self {
            Self {
                graphql_calls: AtomicUsize::new(0),
                rest_calls: AtomicUsize::new(0),
                graphql_result: Ok(records),
                rest_repos: HashMap::new(),
            }
        }

        fn graphql_failing(rest_repos: HashMap<String, Result<Vec<PullRequestRecord>, String>>) -> Self {
            Self {
                graphql_calls: AtomicUsize::new(0),
                rest_calls: AtomicUsize::new(0),
                graphql_result: Err(FetchError::GraphQl("boom".to_string())),
                rest_repos,
            }
        }
    }

    #[async_trait]
    impl GithubGateway for MockGithub {
        async fn fetch_team_graphql(
            &self,
            _query: &GithubQuery,
        ) -> Result<Vec<PullRequestRecord>, FetchError> {
            self.graphql_calls.fetch_add(1, Ordering::SeqCst);
            match &self.graphql_result {
                Ok(records) => Ok(records.clone()),
                Err(FetchError::GraphQl(msg)) => Err(FetchError::GraphQl(msg.clone())),
                Err(_) => unreachable!("mock only models GraphQL failures"),
            }
        }

        async fn fetch_repo_rest(
            &self,
            repo: &RepoRef,
        ) -> Result<Vec<PullRequestRecord>, FetchError> {
            self.rest_calls.fetch_add(1, Ordering::SeqCst);
            match self.rest_repos.get(&repo.to_string()) {
                Some(Ok(records)) => Ok(records.clone()),
                Some(Err(msg)) => Err(FetchError::GraphQl(msg.clone())),
                None => Ok(Vec::new()),
            }
        }
    }

    /// Mock Jira gateway recording the JQL it was handed.
    struct MockJira {
        calls: AtomicUsize,
        result: Result<IssueFetch, String>,
        last_jql: std::sync::Mutex<Option<String>>,
    }

    impl MockJira {
        fn ok(fetch: IssueFetch) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Ok(fetch),
                last_jql: std::sync::Mutex::new(None),
            }
        }

        fn failing(msg: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Err(msg.to_string()),
                last_jql: std::sync::Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl JiraGateway for MockJira {
        async fn search_issues(
            &self,
            jql: &str,
            _max_results: u32,
        ) -> Result<IssueFetch, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_jql.lock().unwrap() = Some(jql.to_string());
            match &self.result {
                Ok(fetch) => Ok(IssueFetch {
                    records: fetch.records.clone(),
                    total_count: fetch.total_count,
                }),
                Err(msg) => Err(FetchError::Api {
                    endpoint: "/rest/api/3/search".to_string(),
                    status: 500,
                    body: msg.clone(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_empty_identities_issue_no_http_calls() {
        let gateway = MockGithub::graphql_ok(vec![pr(1, "alice", "acme/widgets", 2)]);
        let empty = IdentitySplit::default();

        let fetch = fetch_team_pull_requests(&gateway, &repos(), &empty, &window())
            .await
            .unwrap();

        assert_eq!(fetch.total_count, 0);
        assert!(fetch.records.is_empty());
        assert_eq!(gateway.graphql_calls.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.rest_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_graphql_success_skips_rest() {
        let gateway = MockGithub::graphql_ok(vec![
            pr(1, "alice", "acme/widgets", 2),
            pr(2, "bob", "acme/gadgets", 3),
        ]);

        let fetch =
            fetch_team_pull_requests(&gateway, &repos(), &identities(&["alice", "bob"]), &window())
                .await
                .unwrap();

        assert_eq!(fetch.total_count, 2);
        assert_eq!(fetch.merged_count, 2);
        assert_eq!(gateway.graphql_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.rest_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_graphql_failure_falls_back_once_per_repository() {
        let mut rest = HashMap::new();
        rest.insert(
            "acme/widgets".to_string(),
            Ok(vec![pr(1, "alice", "acme/widgets", 2)]),
        );
        rest.insert(
            "acme/gadgets".to_string(),
            Ok(vec![pr(2, "bob", "acme/gadgets", 3), pr(1, "alice", "acme/gadgets", 2)]),
        );
        let gateway = MockGithub::graphql_failing(rest);

        let fetch =
            fetch_team_pull_requests(&gateway, &repos(), &identities(&["alice", "bob"]), &window())
                .await
                .unwrap();

        assert_eq!(gateway.graphql_calls.load(Ordering::SeqCst), 1);
        // Exactly once per configured repository.
        assert_eq!(gateway.rest_calls.load(Ordering::SeqCst), 2);
        // PR 1 appears in both listings; deduplicated by id.
        assert_eq!(fetch.total_count, 2);
    }

    #[tokio::test]
    async fn test_rest_filters_by_author_and_window() {
        let mut rest = HashMap::new();
        rest.insert(
            "acme/widgets".to_string(),
            Ok(vec![
                pr(1, "alice", "acme/widgets", 2),
                pr(2, "mallory", "acme/widgets", 2), // not on the team
                pr(3, "alice", "acme/widgets", 45),  // before the window
            ]),
        );
        let gateway = MockGithub::graphql_failing(rest);
        let repos: Vec<RepoRef> = vec!["acme/widgets".parse().unwrap()];

        let fetch = fetch_team_pull_requests(&gateway, &repos, &identities(&["alice"]), &window())
            .await
            .unwrap();

        assert_eq!(fetch.total_count, 1);
        assert_eq!(fetch.records[0].id, 1);
    }

    #[tokio::test]
    async fn test_failing_repository_is_skipped_not_fatal() {
        let mut rest = HashMap::new();
        rest.insert("acme/widgets".to_string(), Err("rate limited".to_string()));
        rest.insert(
            "acme/gadgets".to_string(),
            Ok(vec![pr(2, "bob", "acme/gadgets", 3)]),
        );
        let gateway = MockGithub::graphql_failing(rest);

        let fetch =
            fetch_team_pull_requests(&gateway, &repos(), &identities(&["alice", "bob"]), &window())
                .await
                .unwrap();

        // No error propagates; the healthy repository still contributes.
        assert_eq!(fetch.total_count, 1);
        assert_eq!(fetch.records[0].repository, "acme/gadgets");
        assert_eq!(gateway.rest_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rest_result_sorted_newest_first() {
        let mut rest = HashMap::new();
        rest.insert(
            "acme/widgets".to_string(),
            Ok(vec![
                pr(1, "alice", "acme/widgets", 10),
                pr(2, "alice", "acme/widgets", 1),
                pr(3, "alice", "acme/widgets", 5),
            ]),
        );
        let gateway = MockGithub::graphql_failing(rest);
        let repos: Vec<RepoRef> = vec!["acme/widgets".parse().unwrap()];

        let fetch = fetch_team_pull_requests(&gateway, &repos, &identities(&["alice"]), &window())
            .await
            .unwrap();

        let ids: Vec<u64> = fetch.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn test_no_repositories_is_a_configuration_error() {
        let gateway = MockGithub::graphql_ok(Vec::new());

        let err = fetch_team_pull_requests(&gateway, &[], &identities(&["alice"]), &window())
            .await
            .err()
            .expect("should fail");

        assert!(matches!(err, FetchError::Configuration(_)));
        assert_eq!(gateway.graphql_calls.load(Ordering::SeqCst), 0);
    }

    fn jira_identities(ids: &[&str]) -> IdentitySplit {
        let peers: Vec<PeerIdentity> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| PeerIdentity {
                internal_id: format!("p{}", i),
                display_name: format!("Peer {}", i),
                github_login: None,
                jira_account_id: Some(id.to_string()),
            })
            .collect();
        reconcile(&peers, Source::Jira)
    }

    fn issue(key: &str, assignee: &str) -> IssueRecord {
        IssueRecord {
            id: key.to_string(),
            key: key.to_string(),
            issue_type: "Story".to_string(),
            status: "Done".to_string(),
            priority: "Medium".to_string(),
            assignee: Some(assignee.to_string()),
            assignee_name: Some(assignee.to_string()),
            created: window().end - Duration::days(5),
            resolved: Some(window().end - Duration::days(1)),
            story_points: Some(3.0),
            project: "PROJ".to_string(),
        }
    }

    #[tokio::test]
    async fn test_jira_empty_identities_issue_no_call() {
        let gateway = MockJira::ok(IssueFetch::default());
        let empty = IdentitySplit::default();

        let fetch = fetch_team_issues(&gateway, "PROJ", &empty, &window(), &[])
            .await
            .unwrap();

        assert_eq!(fetch.total_count, 0);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_jira_search_uses_built_jql() {
        let gateway = MockJira::ok(IssueFetch {
            records: vec![issue("PROJ-1", "acc-1")],
            total_count: 1,
        });

        let fetch = fetch_team_issues(
            &gateway,
            "PROJ",
            &jira_identities(&["acc-1"]),
            &window(),
            &["Story".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(fetch.total_count, 1);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        let jql = gateway.last_jql.lock().unwrap().clone().unwrap();
        assert!(jql.starts_with("project = PROJ"));
        assert!(jql.contains("assignee WAS \"acc-1\" DURING (-30d, now())"));
        assert!(jql.ends_with("ORDER BY updated DESC"));
    }

    #[tokio::test]
    async fn test_jira_failure_propagates_without_fallback() {
        let gateway = MockJira::failing("internal error");

        let err = fetch_team_issues(
            &gateway,
            "PROJ",
            &jira_identities(&["acc-1"]),
            &window(),
            &[],
        )
        .await
        .err()
        .expect("should fail");

        assert!(matches!(err, FetchError::Api { status: 500, .. }));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_jira_first_page_total_preserved() {
        let gateway = MockJira::ok(IssueFetch {
            records: vec![issue("PROJ-1", "acc-1")],
            total_count: 250,
        });

        let fetch = fetch_team_issues(
            &gateway,
            "PROJ",
            &jira_identities(&["acc-1"]),
            &window(),
            &[],
        )
        .await
        .unwrap();

        // Pagination is not followed; the mismatch is surfaced, not hidden.
        assert_eq!(fetch.records.len(), 1);
        assert_eq!(fetch.total_count, 250);
    }
}
