//! Source-specific query construction.
//!
//! Builds one GraphQL document per GitHub fetch (fan-out expressed via
//! per-repository aliases) and one JQL string per Jira search. Builders
//! are pure: identities, window, and target set in, query out.

pub mod github;
pub mod jira;
