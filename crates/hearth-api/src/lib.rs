// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Blocking REST client for a remote hearth server.
//!
//! Failures carry the HTTP status (or `None` for transport errors) as an
//! [`ApiError`] so callers can decide whether a retry makes sense.

use anyhow::{Context, Result, bail};
use hearth_app::{
    Activity, ContributionFormInput, DataSource, Goal, GoalCriteria, GoalFormInput, GoalId,
    InviteFormInput, Member, MemberId, Reminder, ReminderCriteria, ReminderFormInput, ReminderId,
    SearchHit, Transaction,
};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

/// HTTP status behind an error produced by [`Client`], if any. Transport
/// failures and non-API errors both yield `None`.
pub fn error_status(error: &anyhow::Error) -> Option<u16> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<ApiError>())
        .and_then(|api| api.status)
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("api.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "api.base_url {base_url:?} uses scheme {:?} -- use http:// or https://",
                parsed.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn ping(&self) -> Result<()> {
        let response = self.send(self.request(Method::GET, "/health"))?;
        expect_success(response)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{path}", self.base_url))
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        request
            .send()
            .map_err(|error| connection_error(&self.base_url, error))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        what: &str,
    ) -> Result<T> {
        debug!(path, params = query.len(), "GET");
        let response = self.send(self.request(Method::GET, path).query(query))?;
        read_json(response, what)
    }

    fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        what: &str,
    ) -> Result<T> {
        debug!(%method, path, "send");
        let response = self.send(self.request(method, path).json(body))?;
        read_json(response, what)
    }
}

impl DataSource for Client {
    fn list_goals(&self, criteria: &GoalCriteria) -> Result<Vec<Goal>> {
        self.get_json("/goals", &criteria.to_query_pairs(), "goal list")
    }

    fn get_goal(&self, goal_id: GoalId) -> Result<Goal> {
        self.get_json(&format!("/goals/{}", goal_id.get()), &[], "goal")
    }

    fn list_reminders(&self, criteria: &ReminderCriteria) -> Result<Vec<Reminder>> {
        self.get_json("/reminders", &criteria.to_query_pairs(), "reminder list")
    }

    fn list_transactions(&self, goal_id: Option<GoalId>) -> Result<Vec<Transaction>> {
        let query = goal_id
            .map(|goal_id| vec![("goal_id".to_owned(), goal_id.get().to_string())])
            .unwrap_or_default();
        self.get_json("/transactions", &query, "transaction list")
    }

    fn list_activities(&self, limit: usize) -> Result<Vec<Activity>> {
        self.get_json(
            "/activities",
            &[("limit".to_owned(), limit.to_string())],
            "activity list",
        )
    }

    fn list_members(&self) -> Result<Vec<Member>> {
        self.get_json("/members", &[], "member list")
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        self.get_json(
            "/search",
            &[
                ("q".to_owned(), trimmed.to_owned()),
                ("limit".to_owned(), limit.to_string()),
            ],
            "search results",
        )
    }

    fn create_goal(&self, input: &GoalFormInput, author: Option<MemberId>) -> Result<Goal> {
        input.validate()?;
        self.send_json(
            Method::POST,
            "/goals",
            &CreateGoalRequest { goal: input, author },
            "created goal",
        )
    }

    fn update_goal(&self, goal_id: GoalId, input: &GoalFormInput) -> Result<Goal> {
        input.validate()?;
        self.send_json(
            Method::PUT,
            &format!("/goals/{}", goal_id.get()),
            input,
            "updated goal",
        )
    }

    fn delete_goal(&self, goal_id: GoalId) -> Result<()> {
        let path = format!("/goals/{}", goal_id.get());
        let response = self.send(self.request(Method::DELETE, &path))?;
        expect_success(response)
    }

    fn record_transaction(&self, input: &ContributionFormInput) -> Result<Goal> {
        input.validate()?;
        self.send_json(Method::POST, "/transactions", input, "goal balance")
    }

    fn create_reminder(&self, input: &ReminderFormInput) -> Result<Reminder> {
        input.validate()?;
        self.send_json(Method::POST, "/reminders", input, "created reminder")
    }

    fn dismiss_reminder(&self, reminder_id: ReminderId) -> Result<Reminder> {
        let path = format!("/reminders/{}/dismiss", reminder_id.get());
        let response = self.send(self.request(Method::POST, &path))?;
        read_json(response, "dismissed reminder")
    }

    fn invite_member(&self, input: &InviteFormInput) -> Result<Member> {
        input.validate()?;
        self.send_json(Method::POST, "/members", input, "invited member")
    }
}

fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(clean_error_response(status, &body));
    }
    response.json().with_context(|| format!("decode {what}"))
}

fn expect_success(response: Response) -> Result<()> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(clean_error_response(status, &body));
    }
    Ok(())
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow::Error::new(ApiError {
        status: None,
        message: format!(
            "cannot reach {base_url} -- check [api] base_url or your network ({error})"
        ),
    })
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    let code = status.as_u16();
    let message = if let Ok(parsed) = serde_json::from_str::<DetailedErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.message.is_empty()
    {
        format!("server error ({code}): {}", error.message)
    } else if let Ok(parsed) = serde_json::from_str::<PlainErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.is_empty()
    {
        format!("server error ({code}): {error}")
    } else if !body.is_empty() && body.len() < 100 && !body.contains('{') {
        format!("server error ({code}): {body}")
    } else {
        format!("server returned {code}")
    };
    anyhow::Error::new(ApiError {
        status: Some(code),
        message,
    })
}

#[derive(Debug, Serialize)]
struct CreateGoalRequest<'a> {
    goal: &'a GoalFormInput,
    author: Option<MemberId>,
}

#[derive(Debug, Deserialize)]
struct DetailedErrorEnvelope {
    error: Option<DetailedErrorBody>,
}

#[derive(Debug, Deserialize)]
struct DetailedErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PlainErrorEnvelope {
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{Client, clean_error_response, error_status};
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn new_rejects_non_http_urls() {
        assert!(Client::new("", Duration::from_secs(1)).is_err());
        assert!(Client::new("ftp://example.com", Duration::from_secs(1)).is_err());
        assert!(Client::new("not a url", Duration::from_secs(1)).is_err());
        let client = Client::new("http://localhost:8080/api/", Duration::from_secs(1))
            .expect("valid base url");
        assert_eq!(client.base_url(), "http://localhost:8080/api");
    }

    #[test]
    fn error_bodies_are_cleaned_and_keep_status() {
        let nested = clean_error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error":{"message":"title is required"}}"#,
        );
        assert_eq!(nested.to_string(), "server error (422): title is required");
        assert_eq!(error_status(&nested), Some(422));

        let plain = clean_error_response(StatusCode::NOT_FOUND, r#"{"error":"no such goal"}"#);
        assert_eq!(plain.to_string(), "server error (404): no such goal");

        let short = clean_error_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(short.to_string(), "server error (502): upstream down");

        let opaque = clean_error_response(StatusCode::INTERNAL_SERVER_ERROR, "<html>{}</html>");
        assert_eq!(opaque.to_string(), "server returned 500");
        assert_eq!(error_status(&opaque), Some(500));
    }

    #[test]
    fn error_status_survives_context() {
        let error = clean_error_response(StatusCode::SERVICE_UNAVAILABLE, "")
            .context("load goals");
        assert_eq!(error_status(&error), Some(503));
        assert_eq!(error_status(&anyhow::anyhow!("plain")), None);
    }
}
