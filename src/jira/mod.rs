//! Jira API client.
//!
//! The default flow is the REST v3 search endpoint with Basic auth
//! (email + API token). A parallel GraphQL variant exists against the
//! Atlassian gateway; it needs a cloud id, either configured or
//! discovered via the tenant-info lookup keyed by hostname.

use crate::config::JiraConfig;
use crate::errors::FetchError;
use crate::models::{IssueFetch, IssueRecord};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Request timeout.
const TIMEOUT_SECONDS: u64 = 30;

/// Atlassian GraphQL gateway endpoint.
const GATEWAY_GRAPHQL_URL: &str = "https://api.atlassian.com/graphql";

/// Story points live in a custom field; this is the Jira Cloud default id.
const STORY_POINTS_FIELD: &str = "customfield_10016";

/// Jira API client holding an authenticated HTTP client.
pub struct JiraClient {
    http_client: reqwest::Client,
    host: String,
    email: String,
    api_token: String,
    cloud_id: Option<String>,
    use_gateway: bool,
}

impl JiraClient {
    /// Create a client from configuration. Fails with a configuration
    /// error when host, email, or token is missing.
    pub fn new(config: &JiraConfig) -> Result<Self, FetchError> {
        let host = config
            .host
            .clone()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| missing("host"))?;
        let email = config
            .email
            .clone()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| missing("email"))?;
        let api_token = config
            .api_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| missing("api_token (or JIRA_API_TOKEN)"))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECONDS))
            .user_agent(concat!("teampulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            host,
            email,
            api_token,
            cloud_id: config.cloud_id.clone(),
            use_gateway: config.use_gateway,
        })
    }

    /// Run the configured search variant: the GraphQL gateway when
    /// `use_gateway` is set, the site-local REST endpoint otherwise.
    pub async fn run_search(&self, jql: &str, max_results: u32) -> Result<IssueFetch, FetchError> {
        if self.use_gateway {
            self.search_graphql(jql, max_results).await
        } else {
            self.search(jql, max_results).await
        }
    }

    /// Run one REST search for the built JQL. First page only; the
    /// response `total` may exceed the number of returned issues.
    pub async fn search(&self, jql: &str, max_results: u32) -> Result<IssueFetch, FetchError> {
        let endpoint = format!("https://{}/rest/api/3/search", self.host);
        debug!("GET {} jql={}", endpoint, jql);

        let fields = format!(
            "summary,issuetype,status,priority,assignee,created,resolutiondate,project,{}",
            STORY_POINTS_FIELD
        );

        let response = self
            .http_client
            .get(&endpoint)
            .basic_auth(&self.email, Some(&self.api_token))
            .query(&[
                ("jql", jql),
                ("maxResults", &max_results.to_string()),
                ("fields", &fields),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                endpoint,
                status,
                body,
            });
        }

        let search: SearchResponse = response.json().await.map_err(|e| FetchError::Decode {
            endpoint: format!("https://{}/rest/api/3/search", self.host),
            message: e.to_string(),
        })?;

        let records = search
            .issues
            .into_iter()
            .map(|issue| issue.into_record())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| FetchError::Decode {
                endpoint: format!("https://{}/rest/api/3/search", self.host),
                message,
            })?;

        Ok(IssueFetch {
            records,
            total_count: search.total,
        })
    }

    /// Look up users by name or email, for roster setup.
    pub async fn search_users(&self, query: &str) -> Result<Vec<JiraUser>, FetchError> {
        let endpoint = format!("https://{}/rest/api/3/user/search", self.host);
        debug!("GET {} query={}", endpoint, query);

        let response = self
            .http_client
            .get(&endpoint)
            .basic_auth(&self.email, Some(&self.api_token))
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                endpoint,
                status,
                body,
            });
        }

        response.json().await.map_err(|e| FetchError::Decode {
            endpoint: format!("https://{}/rest/api/3/user/search", self.host),
            message: e.to_string(),
        })
    }

    /// Resolve the Atlassian cloud id for this site: configured value if
    /// present, otherwise the tenant-info lookup keyed by hostname.
    pub async fn resolve_cloud_id(&self) -> Result<String, FetchError> {
        if let Some(ref id) = self.cloud_id {
            return Ok(id.clone());
        }

        let endpoint = format!("https://{}/_edge/tenant_info", self.host);
        debug!("GET {}", endpoint);

        let response = self
            .http_client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                endpoint,
                status,
                body,
            });
        }

        let tenant: TenantInfo = response.json().await.map_err(|e| FetchError::Decode {
            endpoint: format!("https://{}/_edge/tenant_info", self.host),
            message: e.to_string(),
        })?;

        Ok(tenant.cloud_id)
    }

    /// GraphQL gateway variant of the issue search. Requires a resolved
    /// cloud id; returns the same shape as the REST path.
    pub async fn search_graphql(
        &self,
        jql: &str,
        max_results: u32,
    ) -> Result<IssueFetch, FetchError> {
        let cloud_id = self.resolve_cloud_id().await?;

        let body = json!({
            "query": GATEWAY_SEARCH_QUERY,
            "variables": {
                "cloudId": cloud_id,
                "jql": jql,
                "first": max_results,
            },
        });

        debug!("POST {} jql={}", GATEWAY_GRAPHQL_URL, jql);

        let response = self
            .http_client
            .post(GATEWAY_GRAPHQL_URL)
            .basic_auth(&self.email, Some(&self.api_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                endpoint: GATEWAY_GRAPHQL_URL.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                endpoint: GATEWAY_GRAPHQL_URL.to_string(),
                status,
                body,
            });
        }

        let envelope: GatewayResponse =
            response.json().await.map_err(|e| FetchError::Decode {
                endpoint: GATEWAY_GRAPHQL_URL.to_string(),
                message: e.to_string(),
            })?;

        if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(FetchError::GraphQl(messages.join("; ")));
        }

        let search = envelope
            .data
            .and_then(|d| d.jira)
            .map(|j| j.issue_search)
            .ok_or_else(|| FetchError::Decode {
                endpoint: GATEWAY_GRAPHQL_URL.to_string(),
                message: "missing jira.issueSearch in gateway response".to_string(),
            })?;

        let records = search
            .edges
            .into_iter()
            .map(|edge| edge.node.into_record())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| FetchError::Decode {
                endpoint: GATEWAY_GRAPHQL_URL.to_string(),
                message,
            })?;

        Ok(IssueFetch {
            records,
            total_count: search.total_count,
        })
    }
}

fn missing(field: &str) -> FetchError {
    FetchError::Configuration(format!("Jira {} is not set", field))
}

/// Jira emits `2024-03-01T12:34:56.000+0000`; RFC 3339 parsing rejects
/// the colon-less offset, so both forms are tried.
fn parse_jira_datetime(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.3f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid Jira datetime '{}': {}", value, e))
}

/// REST search response envelope.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    total: u64,
    issues: Vec<JiraIssue>,
}

#[derive(Debug, Deserialize)]
struct JiraIssue {
    id: String,
    key: String,
    fields: JiraIssueFields,
}

#[derive(Debug, Deserialize)]
struct JiraIssueFields {
    issuetype: NamedField,
    status: NamedField,
    priority: Option<NamedField>,
    assignee: Option<JiraUser>,
    created: String,
    resolutiondate: Option<String>,
    #[serde(rename = "customfield_10016")]
    story_points: Option<f64>,
    project: Option<ProjectField>,
}

#[derive(Debug, Deserialize)]
struct NamedField {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProjectField {
    key: String,
}

/// A Jira user as returned by search and issue payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct JiraUser {
    #[serde(rename = "accountId")]
    pub account_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "emailAddress", default)]
    pub email_address: Option<String>,
}

impl JiraIssue {
    fn into_record(self) -> Result<IssueRecord, String> {
        let created = parse_jira_datetime(&self.fields.created)?;
        let resolved = self
            .fields
            .resolutiondate
            .as_deref()
            .map(parse_jira_datetime)
            .transpose()?;

        Ok(IssueRecord {
            id: self.id,
            key: self.key,
            issue_type: self.fields.issuetype.name,
            status: self.fields.status.name,
            priority: self
                .fields
                .priority
                .map(|p| p.name)
                .unwrap_or_else(|| "None".to_string()),
            assignee: self.fields.assignee.as_ref().map(|a| a.account_id.clone()),
            assignee_name: self.fields.assignee.map(|a| a.display_name),
            created,
            resolved,
            story_points: self.fields.story_points,
            project: self.fields.project.map(|p| p.key).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TenantInfo {
    cloud_id: String,
}

/// Gateway GraphQL envelope.
#[derive(Debug, Deserialize)]
struct GatewayResponse {
    data: Option<GatewayData>,
    errors: Option<Vec<GatewayError>>,
}

#[derive(Debug, Deserialize)]
struct GatewayError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GatewayData {
    jira: Option<GatewayJira>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayJira {
    issue_search: GatewaySearch,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewaySearch {
    total_count: u64,
    edges: Vec<GatewayEdge>,
}

#[derive(Debug, Deserialize)]
struct GatewayEdge {
    node: JiraIssue,
}

const GATEWAY_SEARCH_QUERY: &str = r#"query IssueSearch($cloudId: ID!, $jql: String!, $first: Int) {
  jira {
    issueSearch(cloudId: $cloudId, issueSearchInput: {jql: $jql}, first: $first) {
      totalCount
      edges {
        node {
          id
          key
          fields
        }
      }
    }
  }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_credentials() {
        let config = JiraConfig::default();
        let err = JiraClient::new(&config).err().expect("should fail");
        assert!(matches!(err, FetchError::Configuration(_)));
    }

    #[test]
    fn test_parse_jira_datetime_formats() {
        // Jira's own format: millisecond precision, colon-less offset.
        let dt = parse_jira_datetime("2024-03-01T12:34:56.000+0000").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-01T12:34:56+00:00");

        // RFC 3339 also accepted.
        assert!(parse_jira_datetime("2024-03-01T12:34:56Z").is_ok());

        assert!(parse_jira_datetime("not a date").is_err());
    }

    #[test]
    fn test_issue_conversion() {
        let issue: JiraIssue = serde_json::from_value(serde_json::json!({
            "id": "10001",
            "key": "PROJ-1",
            "fields": {
                "issuetype": {"name": "Story"},
                "status": {"name": "Done"},
                "priority": {"name": "High"},
                "assignee": {"accountId": "acc-1", "displayName": "Alice"},
                "created": "2024-03-01T09:00:00.000+0000",
                "resolutiondate": "2024-03-04T17:00:00.000+0000",
                "customfield_10016": 5.0,
                "project": {"key": "PROJ"}
            }
        }))
        .unwrap();

        let record = issue.into_record().unwrap();
        assert_eq!(record.key, "PROJ-1");
        assert_eq!(record.issue_type, "Story");
        assert_eq!(record.assignee.as_deref(), Some("acc-1"));
        assert_eq!(record.assignee_name.as_deref(), Some("Alice"));
        assert_eq!(record.story_points, Some(5.0));
        assert!(record.is_resolved());
    }

    #[test]
    fn test_issue_conversion_without_assignee_or_priority() {
        let issue: JiraIssue = serde_json::from_value(serde_json::json!({
            "id": "10002",
            "key": "PROJ-2",
            "fields": {
                "issuetype": {"name": "Bug"},
                "status": {"name": "Open"},
                "priority": null,
                "assignee": null,
                "created": "2024-03-02T09:00:00.000+0000",
                "resolutiondate": null,
                "project": {"key": "PROJ"}
            }
        }))
        .unwrap();

        let record = issue.into_record().unwrap();
        assert!(record.assignee.is_none());
        assert_eq!(record.priority, "None");
        assert!(!record.is_resolved());
    }
}
