//! Remote client tests against a mock server: auth, parsing, pagination
//! anchors, error taxonomy, retry behavior.

mod common;

use base64::Engine;
use mockito::Matcher;
use pretty_assertions::assert_eq;
use std::time::Duration;

use common::{messages_body, register_body, sender_narrow, topic_narrow, wire_message};
use zulite::api::{ApiError, Client};

fn client(url: &str) -> Client {
    Client::new(url, "alice@example.com", "secret").with_retry(3, Duration::from_millis(10))
}

fn expected_auth() -> String {
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode("alice@example.com:secret")
    )
}

// ---------------------------------------------------------------------------
// register
// ---------------------------------------------------------------------------

#[test]
fn test_register_sends_basic_auth_and_parses_state() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/api/v1/register")
        .match_header("authorization", expected_auth().as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(register_body(1, "general", "welcome", &[1, 2, 3]))
        .create();

    let state = client(&server.url()).register().unwrap();

    assert_eq!(state.stream_unreads.len(), 1);
    assert_eq!(state.stream_unreads[0].stream_id, 1);
    assert_eq!(state.stream_unreads[0].topic, "welcome");
    assert_eq!(state.stream_unreads[0].unread_message_ids, vec![1, 2, 3]);
    assert_eq!(state.subscriptions.len(), 1);
    assert_eq!(state.subscriptions[0].name, "general");
    assert_eq!(state.stream_names().get(&1).map(String::as_str), Some("general"));
    mock.assert();
}

#[test]
fn test_register_counts_dms_and_mentions() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/api/v1/register")
        .with_status(200)
        .with_body(
            serde_json::json!({
                "result": "success",
                "unread_msgs": {
                    "streams": [],
                    "pms": [
                        {"unread_message_ids": [1, 2]},
                        {"unread_message_ids": [3]},
                    ],
                    "mentions": [7, 8],
                },
                "subscriptions": [],
            })
            .to_string(),
        )
        .create();

    let state = client(&server.url()).register().unwrap();
    assert_eq!(state.pm_unread_count, 3);
    assert_eq!(state.mention_count, 2);
}

#[test]
fn test_auth_failure_is_not_retried() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/api/v1/register")
        .with_status(401)
        .with_body(r#"{"result": "error", "msg": "Invalid API key"}"#)
        .expect(1)
        .create();

    let err = client(&server.url()).register().unwrap_err();
    match err {
        ApiError::Auth(reason) => assert!(reason.contains("Invalid API key")),
        other => panic!("expected Auth error, got {:?}", other),
    }
    mock.assert();
}

#[test]
fn test_error_result_in_ok_response() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/api/v1/register")
        .with_status(200)
        .with_body(r#"{"result": "error", "msg": "Bad event queue"}"#)
        .create();

    let err = client(&server.url()).register().unwrap_err();
    match err {
        ApiError::Api(msg) => assert_eq!(msg, "Bad event queue"),
        other => panic!("expected Api error, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// fetch_page
// ---------------------------------------------------------------------------

#[test]
fn test_fetch_page_from_oldest() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/api/v1/messages")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("narrow".into(), topic_narrow("general", "welcome")),
            Matcher::UrlEncoded("anchor".into(), "oldest".into()),
            Matcher::UrlEncoded("num_before".into(), "0".into()),
            Matcher::UrlEncoded("num_after".into(), "2".into()),
        ]))
        .with_status(200)
        .with_body(messages_body(
            &[wire_message(1, "Alice", "hi"), wire_message(2, "Bob", "hello")],
            false,
        ))
        .create();

    let page = client(&server.url())
        .fetch_page("general", "welcome", None, 2)
        .unwrap();

    let ids: Vec<i64> = page.messages.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(page.found_newest, Some(false));
    assert_eq!(page.messages[0].sender_name, "Alice");
    mock.assert();
}

#[test]
fn test_fetch_page_requests_past_anchor_and_filters_it() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/api/v1/messages")
        .match_query(Matcher::UrlEncoded("anchor".into(), "3".into()))
        .with_status(200)
        // Server echoes the boundary message despite the +1 anchor
        .with_body(messages_body(
            &[wire_message(2, "Bob", "old"), wire_message(3, "Carol", "new")],
            true,
        ))
        .create();

    let page = client(&server.url())
        .fetch_page("general", "welcome", Some(2), 100)
        .unwrap();

    let ids: Vec<i64> = page.messages.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![3]);
    mock.assert();
}

#[test]
fn test_fetch_page_vanished_topic() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/api/v1/messages")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"result": "error", "msg": "Invalid narrow"}"#)
        .create();

    let err = client(&server.url())
        .fetch_page("general", "gone", None, 10)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[test]
fn test_transient_exhaustion_reports_attempts() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/api/v1/messages")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("oops")
        .expect(3)
        .create();

    let err = client(&server.url())
        .fetch_page("general", "welcome", None, 10)
        .unwrap_err();
    match err {
        ApiError::Transient { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected Transient error, got {:?}", other),
    }
    mock.assert();
}

// ---------------------------------------------------------------------------
// Retry sequencing (tiny_http: respond per-request)
// ---------------------------------------------------------------------------

/// Serve `failures` error responses, then `body` with 200, on one socket.
fn flaky_server(failures: usize, status: u16, retry_after: Option<&str>, body: String) -> String {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    let retry_after = retry_after.map(String::from);
    std::thread::spawn(move || {
        let mut served = 0;
        while let Ok(request) = server.recv() {
            if served < failures {
                let mut response =
                    tiny_http::Response::from_string("try later").with_status_code(status);
                if let Some(ref secs) = retry_after {
                    response.add_header(
                        tiny_http::Header::from_bytes(&b"Retry-After"[..], secs.as_bytes())
                            .unwrap(),
                    );
                }
                let _ = request.respond(response);
                served += 1;
            } else {
                let _ = request.respond(tiny_http::Response::from_string(body.clone()));
                break;
            }
        }
    });
    format!("http://127.0.0.1:{}", port)
}

#[test]
fn test_retries_are_invisible_to_the_result() {
    let body = messages_body(&[wire_message(1, "Alice", "hi")], true);
    let url = flaky_server(2, 500, None, body);

    let page = client(&url).fetch_page("general", "welcome", None, 10).unwrap();

    let ids: Vec<i64> = page.messages.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1]);
    assert_eq!(page.found_newest, Some(true));
}

#[test]
fn test_rate_limit_backs_off_then_succeeds() {
    let body = messages_body(&[wire_message(5, "Bob", "later")], true);
    let url = flaky_server(1, 429, Some("0"), body);

    let page = client(&url).fetch_page("general", "welcome", None, 10).unwrap();
    assert_eq!(page.messages.len(), 1);
    assert_eq!(page.messages[0].id, 5);
}

// ---------------------------------------------------------------------------
// stream_topics / authored_page
// ---------------------------------------------------------------------------

#[test]
fn test_stream_topics_parses_max_ids() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/api/v1/users/me/5/topics")
        .with_status(200)
        .with_body(
            serde_json::json!({
                "result": "success",
                "topics": [
                    {"name": "roadmap", "max_id": 120},
                    {"name": "standup", "max_id": 118},
                ],
            })
            .to_string(),
        )
        .create();

    let topics = client(&server.url()).stream_topics(5).unwrap();
    assert_eq!(topics.len(), 2);
    assert_eq!(topics[0].name, "roadmap");
    assert_eq!(topics[0].max_id, 120);
}

#[test]
fn test_authored_page_keeps_only_stream_messages() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/api/v1/messages")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("narrow".into(), sender_narrow("alice@example.com")),
            Matcher::UrlEncoded("anchor".into(), "newest".into()),
            Matcher::UrlEncoded("num_before".into(), "10".into()),
            Matcher::UrlEncoded("num_after".into(), "0".into()),
        ]))
        .with_status(200)
        .with_body(
            serde_json::json!({
                "result": "success",
                "found_oldest": true,
                "messages": [
                    {"id": 40, "type": "private", "display_recipient": [{"email": "bob@example.com"}]},
                    {"id": 50, "type": "stream", "stream_id": 3,
                     "display_recipient": "dev", "subject": "release"},
                ],
            })
            .to_string(),
        )
        .create();

    let page = client(&server.url()).authored_page(None, 10).unwrap();

    assert_eq!(page.refs.len(), 1);
    assert_eq!(page.refs[0].stream_name, "dev");
    assert_eq!(page.refs[0].topic, "release");
    assert_eq!(page.oldest_scanned, Some(40));
    assert!(page.found_oldest);
    mock.assert();
}

#[test]
fn test_authored_page_scans_strictly_older() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/api/v1/messages")
        .match_query(Matcher::UrlEncoded("anchor".into(), "39".into()))
        .with_status(200)
        .with_body(
            serde_json::json!({
                "result": "success",
                "found_oldest": false,
                "messages": [
                    {"id": 40, "type": "stream", "stream_id": 3,
                     "display_recipient": "dev", "subject": "echoed boundary"},
                    {"id": 30, "type": "stream", "stream_id": 3,
                     "display_recipient": "dev", "subject": "older"},
                ],
            })
            .to_string(),
        )
        .create();

    let page = client(&server.url()).authored_page(Some(40), 10).unwrap();
    assert_eq!(page.refs.len(), 1);
    assert_eq!(page.refs[0].topic, "older");
    assert_eq!(page.oldest_scanned, Some(30));
}
