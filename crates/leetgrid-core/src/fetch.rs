use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::stats::RawStats;

pub const DEFAULT_ENDPOINT: &str = "https://leetcode.com/graphql";

/// Username shipped in sample configs; treated the same as no username.
pub const USERNAME_PLACEHOLDER: &str = "MY_USERNAME_HERE";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const CALENDAR_QUERY: &str = "query userCalendar($username: String!) {
  matchedUser(username: $username) {
    submissionCalendar
    submitStats {
      acSubmissionNum {
        difficulty
        count
      }
    }
  }
}";

/// Failures of the profile fetch. Only [`FetchError::MissingUsername`] is a
/// configuration problem; the rest are transient.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error(
        "Please configure your LeetCode username: set `username = <name>` in ~/.leetgridrc \
         or pass --rc username=<name>"
    )]
    MissingUsername,

    #[error("LeetCode user not found: {0}")]
    UserNotFound(String),

    #[error("Failed to reach LeetCode: {0}")]
    Transport(String),

    #[error("LeetCode returned HTTP {0}")]
    Status(u16),

    #[error("Failed to parse LeetCode response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingUsername)
    }
}

/// Source of profile stats for one user.
pub trait StatsFetcher {
    fn fetch_stats(&self, username: &str) -> impl Future<Output = Result<RawStats, FetchError>>;
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<ProfileData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileData {
    matched_user: Option<MatchedUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchedUser {
    #[serde(default)]
    submission_calendar: Option<serde_json::Value>,
    submit_stats: SubmitStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitStats {
    #[serde(default)]
    ac_submission_num: Vec<AcceptedCount>,
}

#[derive(Debug, Deserialize)]
struct AcceptedCount {
    difficulty: String,
    count: u64,
}

pub fn is_configured_username(username: &str) -> bool {
    let trimmed = username.trim();
    !trimmed.is_empty() && trimmed != USERNAME_PLACEHOLDER
}

/// Decodes a GraphQL profile response body.
pub fn decode_profile(body: &str, username: &str) -> Result<RawStats, FetchError> {
    let response: GraphqlResponse =
        serde_json::from_str(body).map_err(|err| FetchError::Decode(err.to_string()))?;

    for error in &response.errors {
        debug!(message = %error.message, "graphql error reported");
    }

    let Some(user) = response.data.and_then(|data| data.matched_user) else {
        return Err(FetchError::UserNotFound(username.to_string()));
    };

    Ok(RawStats {
        total_solved: solved_total(&user.submit_stats.ac_submission_num),
        submission_calendar: calendar_payload(user.submission_calendar),
    })
}

/// The calendar arrives as a JSON-encoded string. Any other shape is passed
/// on as an empty payload so the total still gets through.
fn calendar_payload(value: Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(payload)) => payload,
        None | Some(serde_json::Value::Null) => String::new(),
        Some(other) => {
            warn!(kind = %json_kind(&other), "submission calendar is not a string; treating as empty");
            String::new()
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Count of the "All" bucket, else the first bucket, else zero.
fn solved_total(buckets: &[AcceptedCount]) -> u64 {
    buckets
        .iter()
        .find(|bucket| bucket.difficulty.eq_ignore_ascii_case("all"))
        .or_else(|| buckets.first())
        .map(|bucket| bucket.count)
        .unwrap_or(0)
}

/// GraphQL client for the public LeetCode profile endpoint.
#[derive(Debug, Clone)]
pub struct LeetCodeClient {
    http: reqwest::Client,
    endpoint: String,
}

impl LeetCodeClient {
    pub fn new(endpoint: Option<&str>) -> anyhow::Result<Self> {
        let endpoint = endpoint
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_ENDPOINT)
            .to_string();

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("leetgrid/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed building HTTP client for LeetCode")?;

        debug!(endpoint = %endpoint, "built LeetCode client");
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl StatsFetcher for LeetCodeClient {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch_stats(&self, username: &str) -> Result<RawStats, FetchError> {
        if !is_configured_username(username) {
            return Err(FetchError::MissingUsername);
        }
        let username = username.trim();

        let payload = serde_json::json!({
            "query": CALENDAR_QUERY,
            "variables": { "username": username },
        });

        let response = self
            .http
            .post(self.endpoint.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::REFERER, "https://leetcode.com")
            .body(payload.to_string())
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "profile request failed");
                FetchError::Transport(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "profile request returned non-success status");
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let raw = decode_profile(&body, username)?;
        info!(
            username,
            total_solved = raw.total_solved,
            calendar_bytes = raw.submission_calendar.len(),
            "fetched LeetCode profile"
        );
        Ok(raw)
    }
}
