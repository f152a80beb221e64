//! GitHub API client.
//!
//! Two strategies live here: the GraphQL endpoint (primary, one request
//! for the whole team) and the REST pull request listing (fallback, one
//! listing per repository plus per-PR detail and review fetches). Both
//! strategies report the same review quantity: submitted reviews.
//! The client is constructed per run from explicit configuration; there
//! is no shared token state.

use crate::config::GithubConfig;
use crate::errors::FetchError;
use crate::models::{PrState, PullRequestRecord, RepoRef};
use crate::query::github::GithubQuery;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Request timeout for both endpoints.
const TIMEOUT_SECONDS: u64 = 30;

/// Page size for REST pull request listings. First page only; the
/// orchestrator logs a warning when a page comes back full.
pub const REST_PAGE_SIZE: u32 = 100;

/// GitHub API client holding an authenticated HTTP client.
pub struct GithubClient {
    http_client: reqwest::Client,
    token: String,
    api_url: String,
    graphql_url: String,
}

impl GithubClient {
    /// Create a client from configuration. Fails with a configuration
    /// error when no token is present.
    pub fn new(config: &GithubConfig) -> Result<Self, FetchError> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                FetchError::Configuration(
                    "GitHub token is not set (config [github].token or GITHUB_TOKEN)".to_string(),
                )
            })?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECONDS))
            .user_agent(concat!("teampulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            token,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            graphql_url: config.graphql_url.clone(),
        })
    }

    /// Execute the team GraphQL query and decode every repository alias.
    ///
    /// Any `errors` array in the response body fails the whole call, even
    /// when partial data is present; the orchestrator treats that as the
    /// signal to fall back to REST.
    pub async fn execute_team_query(
        &self,
        query: &GithubQuery,
    ) -> Result<Vec<PullRequestRecord>, FetchError> {
        let body = json!({
            "query": query.document,
            "variables": query.variables,
        });

        debug!(
            "POST {} ({} repository aliases)",
            self.graphql_url,
            query.aliases.len()
        );

        let response = self
            .http_client
            .post(&self.graphql_url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                endpoint: self.graphql_url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                endpoint: self.graphql_url.clone(),
                status,
                body,
            });
        }

        let graphql: GraphQlResponse =
            response.json().await.map_err(|e| FetchError::Decode {
                endpoint: self.graphql_url.clone(),
                message: e.to_string(),
            })?;

        if let Some(errors) = graphql.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(FetchError::GraphQl(messages.join("; ")));
        }

        let data = graphql.data.ok_or_else(|| FetchError::Decode {
            endpoint: self.graphql_url.clone(),
            message: "response carried neither data nor errors".to_string(),
        })?;

        self.decode_aliases(&data, query)
    }

    /// Walk the per-repository aliases of a GraphQL `data` object.
    fn decode_aliases(
        &self,
        data: &Value,
        query: &GithubQuery,
    ) -> Result<Vec<PullRequestRecord>, FetchError> {
        let mut records = Vec::new();

        for (alias, repo) in &query.aliases {
            let nodes = data
                .get(alias)
                .and_then(|a| a.get("nodes"))
                .and_then(Value::as_array)
                .ok_or_else(|| FetchError::Decode {
                    endpoint: self.graphql_url.clone(),
                    message: format!("missing alias '{}' in response data", alias),
                })?;

            for node in nodes {
                // Search results can interleave non-PR nodes; skip them.
                let Ok(pr) = serde_json::from_value::<GraphPrNode>(node.clone()) else {
                    warn!("Skipping undecodable search node in {}", repo);
                    continue;
                };
                records.push(pr.into_record(repo));
            }
        }

        Ok(records)
    }

    /// List pull requests of one repository via REST, newest first, and
    /// enrich each with its detail (additions/deletions) and submitted
    /// review count.
    pub async fn list_repo_pull_requests(
        &self,
        repo: &RepoRef,
    ) -> Result<Vec<PullRequestRecord>, FetchError> {
        let endpoint = format!(
            "{}/repos/{}/{}/pulls?state=all&sort=created&direction=desc&per_page={}",
            self.api_url, repo.owner, repo.name, REST_PAGE_SIZE
        );
        debug!("GET {}", endpoint);

        let listed: Vec<RestPullRequest> = self.get_json(&endpoint).await?;

        let enriched = futures::future::join_all(listed.iter().map(|pr| async move {
            (
                self.get_pull_request_detail(repo, pr.number).await,
                self.count_reviews(repo, pr.number).await,
            )
        }))
        .await;

        let mut records = Vec::with_capacity(listed.len());
        for (pr, (detail, reviews)) in listed.into_iter().zip(enriched) {
            // A missing enrichment degrades its counts to zero rather
            // than dropping the PR from the aggregation.
            let detail = match detail {
                Ok(d) => d,
                Err(e) => {
                    warn!("Detail fetch for {}#{} failed: {}", repo, pr.number, e);
                    RestPullRequestDetail::default()
                }
            };
            let review_count = match reviews {
                Ok(count) => count,
                Err(e) => {
                    warn!("Review listing for {}#{} failed: {}", repo, pr.number, e);
                    0
                }
            };
            records.push(pr.into_record(repo, detail, review_count));
        }

        Ok(records)
    }

    async fn get_pull_request_detail(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> Result<RestPullRequestDetail, FetchError> {
        let endpoint = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.api_url, repo.owner, repo.name, number
        );
        self.get_json(&endpoint).await
    }

    /// Submitted reviews on one PR, the same quantity the GraphQL
    /// fragment's `reviews.totalCount` carries. First page only.
    async fn count_reviews(&self, repo: &RepoRef, number: u64) -> Result<u64, FetchError> {
        let endpoint = format!(
            "{}/repos/{}/{}/pulls/{}/reviews?per_page={}",
            self.api_url, repo.owner, repo.name, number, REST_PAGE_SIZE
        );
        let reviews: Vec<Value> = self.get_json(&endpoint).await?;
        Ok(reviews.len() as u64)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<T, FetchError> {
        let response = self
            .http_client
            .get(endpoint)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                endpoint: endpoint.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                endpoint: endpoint.to_string(),
                status,
                body,
            });
        }

        response.json().await.map_err(|e| FetchError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// One pull request node from the GraphQL search results.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphPrNode {
    database_id: u64,
    title: String,
    state: String,
    author: Option<GraphActor>,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    reviews: Option<GraphReviewCount>,
}

#[derive(Debug, Deserialize)]
struct GraphActor {
    login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphReviewCount {
    total_count: u64,
}

impl GraphPrNode {
    fn into_record(self, repo: &RepoRef) -> PullRequestRecord {
        let state = match self.state.as_str() {
            "MERGED" => PrState::Merged,
            "OPEN" => PrState::Open,
            _ => PrState::Closed,
        };
        PullRequestRecord {
            id: self.database_id,
            title: self.title,
            state,
            author: self.author.map(|a| a.login).unwrap_or_default(),
            created_at: self.created_at,
            merged_at: self.merged_at,
            additions: self.additions,
            deletions: self.deletions,
            review_count: self.reviews.map(|r| r.total_count).unwrap_or(0),
            repository: repo.to_string(),
        }
    }
}

/// One pull request from the REST listing endpoint.
#[derive(Debug, Deserialize)]
struct RestPullRequest {
    id: u64,
    number: u64,
    title: String,
    state: String,
    user: Option<RestUser>,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RestUser {
    login: String,
}

/// Detail fields absent from the listing endpoint.
#[derive(Debug, Default, Deserialize)]
struct RestPullRequestDetail {
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

impl RestPullRequest {
    fn into_record(
        self,
        repo: &RepoRef,
        detail: RestPullRequestDetail,
        review_count: u64,
    ) -> PullRequestRecord {
        // REST reports merged PRs as "closed" with merged_at set.
        let state = if self.merged_at.is_some() {
            PrState::Merged
        } else if self.state == "open" {
            PrState::Open
        } else {
            PrState::Closed
        };
        PullRequestRecord {
            id: self.id,
            title: self.title,
            state,
            author: self.user.map(|u| u.login).unwrap_or_default(),
            created_at: self.created_at,
            merged_at: self.merged_at,
            additions: detail.additions,
            deletions: detail.deletions,
            review_count,
            repository: repo.to_string(),
        }
    }
}
