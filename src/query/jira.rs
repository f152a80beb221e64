//! JQL query construction.
//!
//! Clause order is a contract the presentation layer depends on for
//! "recent issues" lists: project filter, assignee/time filter, updated
//! bound, issue-type filter, then `ORDER BY updated DESC`.

use crate::models::TimeWindow;

/// Characters that force a JQL value into quoted form. An unquoted value
/// containing any of these fails to parse or changes meaning; `\` starts
/// an escape sequence outside quotes.
const JQL_SPECIAL: &[char] = &[
    '@', '"', '\'', '\\', '<', '>', '=', '!', '~', '(', ')', '[', ']', '{', '}', '+', '-', '*',
    '/', '%', '&', '|', '^',
];

/// Escapes a single JQL value.
///
/// Values containing whitespace or a JQL-special character are wrapped in
/// double quotes with internal `\` and `"` backslash-escaped; everything
/// else passes through bare. Quoting an already-safe value would be
/// harmless, but over-escaping doubles backslashes, so the rule is exact.
pub fn escape_jql_value(value: &str) -> String {
    let needs_quoting = value
        .chars()
        .any(|c| c.is_whitespace() || JQL_SPECIAL.contains(&c));

    if !needs_quoting {
        return value.to_string();
    }

    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('"');
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            other => escaped.push(other),
        }
    }
    escaped.push('"');
    escaped
}

/// Builds the team issue search JQL.
///
/// One `assignee WAS <id> DURING (-<days>d, now())` clause per account
/// id, OR-combined. `WAS` rather than `=` so issues reassigned after the
/// window still count for the peer who worked them.
///
/// `account_ids` must be non-empty: the orchestrator short-circuits
/// before this point, because an empty OR-clause is misread by Jira as
/// "no assignee filter" and returns unrelated issues.
pub fn build_team_jql(
    project_key: &str,
    account_ids: &[String],
    window: &TimeWindow,
    issue_types: &[String],
) -> String {
    let mut clauses: Vec<String> = Vec::with_capacity(4);

    clauses.push(format!("project = {}", escape_jql_value(project_key)));

    if !account_ids.is_empty() {
        let assignee_terms: Vec<String> = account_ids
            .iter()
            .map(|id| {
                format!(
                    "assignee WAS {} DURING (-{}d, now())",
                    escape_jql_value(id),
                    window.days
                )
            })
            .collect();
        clauses.push(format!("({})", assignee_terms.join(" OR ")));
    }

    clauses.push(format!("updated >= -{}d", window.days));

    if !issue_types.is_empty() {
        let types: Vec<String> = issue_types.iter().map(|t| escape_jql_value(t)).collect();
        clauses.push(format!("issuetype IN ({})", types.join(", ")));
    }

    format!("{} ORDER BY updated DESC", clauses.join(" AND "))
}
