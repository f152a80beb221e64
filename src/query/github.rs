//! GitHub GraphQL query construction.
//!
//! One query document covers every configured repository: each repository
//! gets an aliased `search` field whose query string is bound as a
//! variable, so the whole team fetch is a single round trip.

use crate::models::{RepoRef, TimeWindow};
use serde_json::{json, Map, Value};

/// Page size requested per repository alias.
pub const PAGE_SIZE: u32 = 100;

/// A GraphQL query document with its bound variables.
#[derive(Debug, Clone, PartialEq)]
pub struct GithubQuery {
    pub document: String,
    pub variables: Value,
    /// Alias name per repository, in configuration order. Response
    /// decoding walks these to reassemble the fan-out.
    pub aliases: Vec<(String, RepoRef)>,
}

/// Builds the single team pull request query.
///
/// `logins` must be non-empty: the orchestrator short-circuits before
/// this point when no identity is mapped, because an `author`-less search
/// qualifier would match unrelated pull requests.
pub fn build_team_pull_request_query(
    repos: &[RepoRef],
    logins: &[String],
    window: &TimeWindow,
) -> GithubQuery {
    let mut document = String::new();
    let mut variables = Map::new();
    let mut aliases = Vec::with_capacity(repos.len());

    document.push_str("query TeamPullRequests(");
    for i in 0..repos.len() {
        if i > 0 {
            document.push_str(", ");
        }
        document.push_str(&format!("$q{}: String!", i));
    }
    document.push_str(") {\n");

    for (i, repo) in repos.iter().enumerate() {
        let alias = format!("repo{}", i);
        document.push_str(&format!(
            "  {}: search(query: $q{}, type: ISSUE, first: {}) {{\n",
            alias, i, PAGE_SIZE
        ));
        document.push_str("    issueCount\n");
        document.push_str("    nodes { ...PrFields }\n");
        document.push_str("  }\n");

        variables.insert(
            format!("q{}", i),
            json!(search_qualifier(repo, logins, window)),
        );
        aliases.push((alias, repo.clone()));
    }

    document.push_str("}\n");
    document.push_str(PR_FIELDS_FRAGMENT);

    GithubQuery {
        document,
        variables: Value::Object(variables),
        aliases,
    }
}

/// The search qualifier string for one repository: `repo:` target, PR
/// type, one `author:` qualifier per login, and the created lower bound.
fn search_qualifier(repo: &RepoRef, logins: &[String], window: &TimeWindow) -> String {
    let mut q = format!("repo:{}/{} is:pr", repo.owner, repo.name);
    for login in logins {
        q.push_str(&format!(" author:{}", login));
    }
    q.push_str(&format!(" created:>={}", window.since().format("%Y-%m-%d")));
    q
}

const PR_FIELDS_FRAGMENT: &str = r#"fragment PrFields on PullRequest {
  databaseId
  title
  state
  author { login }
  createdAt
  mergedAt
  additions
  deletions
  reviews { totalCount }
  repository { nameWithOwner }
}
"#;
