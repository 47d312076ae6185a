//! Zulip REST API client — auth, register, paginated message retrieval,
//! retry with backoff.

use base64::Engine;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::util::strip_html;

/// Page bound for message retrieval (server-recommended maximum).
pub const PAGE_SIZE: usize = 1000;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid credentials. Fatal for the site pass; never retried.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The requested resource no longer exists on the server.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network failure, 5xx, or rate limiting, surviving all retries.
    #[error("transient error after {attempts} attempt(s): {reason}")]
    Transient { attempts: u32, reason: String },

    /// The server rejected the request or returned an unusable response.
    #[error("API error: {0}")]
    Api(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// One stream subscription from the register response.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub stream_id: i64,
    pub name: String,
    pub is_muted: bool,
}

/// Unread message ids for one stream topic, as reported by the server.
#[derive(Debug, Clone)]
pub struct UnreadTopic {
    pub stream_id: i64,
    pub topic: String,
    pub unread_message_ids: Vec<i64>,
}

/// Snapshot of the account's unread state plus its stream memberships.
#[derive(Debug, Clone, Default)]
pub struct RegisterState {
    pub stream_unreads: Vec<UnreadTopic>,
    pub pm_unread_count: usize,
    pub mention_count: usize,
    pub subscriptions: Vec<Subscription>,
}

impl RegisterState {
    /// stream id → display name, from the subscription list.
    pub fn stream_names(&self) -> std::collections::HashMap<i64, String> {
        self.subscriptions
            .iter()
            .map(|s| (s.stream_id, s.name.clone()))
            .collect()
    }
}

/// A message normalized from the wire payload.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub sender_name: String,
    pub sender_email: String,
    pub content: String,
    pub content_text: String,
    pub timestamp: i64,
    /// Original payload, retained for forward-compatible fields.
    pub raw: Value,
}

/// One page of a topic's history plus the server's continuation signal.
#[derive(Debug, Clone)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    /// `found_newest` from the server; None when the field is missing.
    pub found_newest: Option<bool>,
}

/// A topic listed for a stream, with the newest message id the server knows.
#[derive(Debug, Clone)]
pub struct TopicInfo {
    pub name: String,
    pub max_id: i64,
}

/// A stream message authored by the account, seen while scanning history.
#[derive(Debug, Clone)]
pub struct AuthoredRef {
    pub message_id: i64,
    pub stream_id: i64,
    pub stream_name: String,
    pub topic: String,
}

/// One backwards page of the account's own messages.
#[derive(Debug, Clone)]
pub struct AuthoredPage {
    pub refs: Vec<AuthoredRef>,
    pub oldest_scanned: Option<i64>,
    pub found_oldest: bool,
}

pub struct Client {
    base_url: String,
    email: String,
    api_key: String,
    agent: ureq::Agent,
    max_attempts: u32,
    backoff: Duration,
}

impl Client {
    pub fn new(base_url: &str, email: &str, api_key: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(60))
            .build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            api_key: api_key.to_string(),
            agent,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }

    /// Override the retry policy (tests use a short backoff).
    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    fn auth_header(&self) -> String {
        let raw = format!("{}:{}", self.email, self.api_key);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw.as_bytes())
        )
    }

    /// Register against the event system and collect initial unread state
    /// plus the subscription list.
    pub fn register(&self) -> ApiResult<RegisterState> {
        let response = self.post_form(
            "/api/v1/register",
            &[
                ("fetch_event_types", r#"["message","subscription"]"#),
                ("event_types", "[]"),
                ("apply_markdown", "false"),
            ],
        )?;

        let mut state = RegisterState::default();

        if let Some(unread) = response.get("unread_msgs") {
            for group in json_array(unread.get("streams")) {
                let ids = json_array(group.get("unread_message_ids"))
                    .iter()
                    .filter_map(Value::as_i64)
                    .collect::<Vec<_>>();
                let (Some(stream_id), Some(topic)) = (
                    group.get("stream_id").and_then(Value::as_i64),
                    group.get("topic").and_then(Value::as_str),
                ) else {
                    continue;
                };
                state.stream_unreads.push(UnreadTopic {
                    stream_id,
                    topic: topic.to_string(),
                    unread_message_ids: ids,
                });
            }
            state.pm_unread_count = json_array(unread.get("pms"))
                .iter()
                .map(|pm| json_array(pm.get("unread_message_ids")).len())
                .sum();
            state.mention_count = json_array(unread.get("mentions")).len();
        }

        for sub in json_array(response.get("subscriptions")) {
            let (Some(stream_id), Some(name)) = (
                sub.get("stream_id").and_then(Value::as_i64),
                sub.get("name").and_then(Value::as_str),
            ) else {
                continue;
            };
            state.subscriptions.push(Subscription {
                stream_id,
                name: name.to_string(),
                is_muted: sub.get("is_muted").and_then(Value::as_bool).unwrap_or(false),
            });
        }

        Ok(state)
    }

    /// Fetch one page of a topic's messages strictly after `anchor`
    /// (oldest-first when no anchor is set).
    pub fn fetch_page(
        &self,
        stream_name: &str,
        topic_name: &str,
        anchor: Option<i64>,
        page_size: usize,
    ) -> ApiResult<MessagePage> {
        let narrow = serde_json::json!([
            {"operator": "stream", "operand": stream_name},
            {"operator": "topic", "operand": topic_name},
        ]);
        // The server includes the anchor message itself, so ask from
        // watermark + 1 and also drop anything at or below the watermark
        // from the response.
        let anchor_param = match anchor {
            Some(id) => (id + 1).to_string(),
            None => "oldest".to_string(),
        };
        let response = self.get(
            "/api/v1/messages",
            &[
                ("narrow", narrow.to_string()),
                ("anchor", anchor_param),
                ("num_before", "0".to_string()),
                ("num_after", page_size.to_string()),
                ("apply_markdown", "false".to_string()),
            ],
        )?;

        let mut messages = Vec::new();
        for raw in json_array(response.get("messages")) {
            let msg = normalize_message(raw)?;
            if anchor.map(|a| msg.id > a).unwrap_or(true) {
                messages.push(msg);
            }
        }
        messages.sort_by_key(|m| m.id);

        Ok(MessagePage {
            messages,
            found_newest: response.get("found_newest").and_then(Value::as_bool),
        })
    }

    /// List topics in a stream, newest-first, with each topic's max id.
    pub fn stream_topics(&self, stream_id: i64) -> ApiResult<Vec<TopicInfo>> {
        let response = self.get(
            &format!("/api/v1/users/me/{}/topics", stream_id),
            &[],
        )?;
        let mut topics = Vec::new();
        for raw in json_array(response.get("topics")) {
            let (Some(name), Some(max_id)) = (
                raw.get("name").and_then(Value::as_str),
                raw.get("max_id").and_then(Value::as_i64),
            ) else {
                continue;
            };
            topics.push(TopicInfo {
                name: name.to_string(),
                max_id,
            });
        }
        Ok(topics)
    }

    /// Fetch one page of the account's own stream messages, scanning
    /// backwards from `before` (or from the newest message).
    pub fn authored_page(&self, before: Option<i64>, page_size: usize) -> ApiResult<AuthoredPage> {
        let narrow = serde_json::json!([
            {"operator": "sender", "operand": self.email},
        ]);
        let anchor_param = match before {
            Some(id) => (id - 1).to_string(),
            None => "newest".to_string(),
        };
        let response = self.get(
            "/api/v1/messages",
            &[
                ("narrow", narrow.to_string()),
                ("anchor", anchor_param),
                ("num_before", page_size.to_string()),
                ("num_after", "0".to_string()),
                ("apply_markdown", "false".to_string()),
            ],
        )?;

        let mut refs = Vec::new();
        let mut oldest: Option<i64> = None;
        for raw in json_array(response.get("messages")) {
            let Some(id) = raw.get("id").and_then(Value::as_i64) else {
                continue;
            };
            if before.map(|b| id >= b).unwrap_or(false) {
                continue;
            }
            oldest = Some(oldest.map_or(id, |o: i64| o.min(id)));
            // Direct messages carry an array recipient; only stream
            // messages name a conversation we can sync.
            if raw.get("type").and_then(Value::as_str) != Some("stream") {
                continue;
            }
            let (Some(stream_id), Some(stream_name), Some(topic)) = (
                raw.get("stream_id").and_then(Value::as_i64),
                raw.get("display_recipient").and_then(Value::as_str),
                raw.get("subject").and_then(Value::as_str),
            ) else {
                continue;
            };
            refs.push(AuthoredRef {
                message_id: id,
                stream_id,
                stream_name: stream_name.to_string(),
                topic: topic.to_string(),
            });
        }

        Ok(AuthoredPage {
            refs,
            oldest_scanned: oldest,
            found_oldest: response
                .get("found_oldest")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    // --- Transport ---

    fn get(&self, endpoint: &str, params: &[(&str, String)]) -> ApiResult<Value> {
        self.request_with_retry(|| {
            let mut req = self
                .agent
                .get(&format!("{}{}", self.base_url, endpoint))
                .set("Authorization", &self.auth_header());
            for (key, value) in params {
                req = req.query(key, value);
            }
            req.call()
        })
    }

    fn post_form(&self, endpoint: &str, form: &[(&str, &str)]) -> ApiResult<Value> {
        self.request_with_retry(|| {
            self.agent
                .post(&format!("{}{}", self.base_url, endpoint))
                .set("Authorization", &self.auth_header())
                .send_form(form)
        })
    }

    /// Run one request, retrying transient failures with exponential
    /// backoff. Auth and not-found failures propagate immediately.
    fn request_with_retry(
        &self,
        send: impl Fn() -> Result<ureq::Response, ureq::Error>,
    ) -> ApiResult<Value> {
        let mut delay = self.backoff;
        for attempt in 1..=self.max_attempts {
            let mut wait = delay;
            match send() {
                Ok(response) => return parse_body(response),
                Err(ureq::Error::Status(code, response)) => {
                    // Rate-limited responses name their own wait time.
                    if code == 429 {
                        if let Some(secs) = response
                            .header("retry-after")
                            .and_then(|v| v.parse::<u64>().ok())
                        {
                            wait = wait.max(Duration::from_secs(secs.min(60)));
                        }
                    }
                    let reason = error_reason(code, response);
                    match code {
                        401 | 403 => return Err(ApiError::Auth(reason)),
                        404 => return Err(ApiError::NotFound(reason)),
                        429 | 500..=599 => {
                            if attempt == self.max_attempts {
                                return Err(ApiError::Transient {
                                    attempts: attempt,
                                    reason,
                                });
                            }
                        }
                        _ => return Err(ApiError::Api(reason)),
                    }
                }
                Err(ureq::Error::Transport(err)) => {
                    if attempt == self.max_attempts {
                        return Err(ApiError::Transient {
                            attempts: attempt,
                            reason: err.to_string(),
                        });
                    }
                }
            }
            std::thread::sleep(wait);
            delay *= 2;
        }
        unreachable!("retry loop returns before exhausting attempts")
    }
}

/// Read the response body, requiring `result: success` from the server.
fn parse_body(response: ureq::Response) -> ApiResult<Value> {
    let body: Value = response
        .into_json()
        .map_err(|e| ApiError::Api(format!("invalid JSON response: {}", e)))?;
    match body.get("result").and_then(Value::as_str) {
        Some("success") => Ok(body),
        _ => {
            let msg = body
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(ApiError::Api(msg.to_string()))
        }
    }
}

/// Extract a human-readable reason from an error response.
fn error_reason(code: u16, response: ureq::Response) -> String {
    let body = response.into_string().unwrap_or_default();
    let msg = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("msg").and_then(Value::as_str).map(String::from));
    match msg {
        Some(m) if !m.is_empty() => format!("HTTP {}: {}", code, m),
        _ => format!("HTTP {}", code),
    }
}

fn json_array(value: Option<&Value>) -> &[Value] {
    value.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

fn normalize_message(raw: &Value) -> ApiResult<Message> {
    let id = raw
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| ApiError::Api("message payload without id".to_string()))?;
    let content = raw
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    // With apply_markdown=false the content is raw markdown; older servers
    // may still hand back rendered HTML.
    let content_text = if content.trim_start().starts_with('<') {
        strip_html(&content)
    } else {
        content.clone()
    };
    Ok(Message {
        id,
        sender_name: raw
            .get("sender_full_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        sender_email: raw
            .get("sender_email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        content,
        content_text,
        timestamp: raw.get("timestamp").and_then(Value::as_i64).unwrap_or(0),
        raw: raw.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_markdown_content() {
        let raw = serde_json::json!({
            "id": 42,
            "sender_full_name": "Alice",
            "sender_email": "alice@example.com",
            "content": "plain **markdown**",
            "timestamp": 1700000000,
        });
        let msg = normalize_message(&raw).unwrap();
        assert_eq!(msg.id, 42);
        assert_eq!(msg.content_text, "plain **markdown**");
    }

    #[test]
    fn test_normalize_html_content_stripped() {
        let raw = serde_json::json!({
            "id": 7,
            "content": "<p>Hello <b>world</b></p>",
            "timestamp": 0,
        });
        let msg = normalize_message(&raw).unwrap();
        assert_eq!(msg.content_text, "Hello world");
    }

    #[test]
    fn test_normalize_missing_id_rejected() {
        let raw = serde_json::json!({"content": "x"});
        assert!(normalize_message(&raw).is_err());
    }
}
