//! End-to-end tests against a local mock of an OpenAI-compatible endpoint.

use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use threadchat::chat::{ChatConfig, Orchestrator, Renderer, TurnOutcome};
use threadchat::{
    ChatMessage, CompletionClient, CompletionRequest, Role, SessionState, StreamDelta,
};

const MODEL: &str = "openai/gpt-4o-mini";

#[derive(Default)]
struct Recorder {
    text: String,
    thinking: String,
    errors: Vec<String>,
    finished: usize,
    interrupted: usize,
}

impl Renderer for Recorder {
    fn print_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn print_thinking(&mut self, text: &str) {
        self.thinking.push_str(text);
    }

    fn print_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
    }

    fn print_info(&mut self, _info: &str) {}

    fn finish_response(&mut self) {
        self.finished += 1;
    }

    fn print_interrupted(&mut self) {
        self.interrupted += 1;
    }
}

fn sse_body(frames: &[serde_json::Value]) -> String {
    let mut body = String::new();
    for frame in frames {
        body.push_str(&format!("data: {frame}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn content_chunk(text: &str) -> serde_json::Value {
    json!({"choices": [{"index": 0, "delta": {"content": text}}]})
}

fn reasoning_chunk(text: &str) -> serde_json::Value {
    json!({"choices": [{"index": 0, "delta": {"reasoning": text}}]})
}

fn stop_chunk() -> serde_json::Value {
    json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]})
}

fn client_for(server: &MockServer) -> CompletionClient {
    CompletionClient::with_options(
        Some("test-key".to_string()),
        Some(server.uri()),
        None,
        Some(Duration::from_secs(5)),
    )
    .unwrap()
}

fn config_for(base_url: &str) -> ChatConfig {
    ChatConfig::new()
        .with_api_key("test-key")
        .with_base_url(base_url)
        .with_model(MODEL)
        .with_connect_timeout(Duration::from_secs(2))
        .with_read_timeout(Some(Duration::from_secs(5)))
        .without_color()
}

fn hello_request() -> CompletionRequest {
    CompletionRequest::new(MODEL, vec![ChatMessage::user("Hello")])
}

#[tokio::test]
async fn stream_sends_headers_and_yields_deltas() {
    let server = MockServer::start().await;
    let body = sse_body(&[content_chunk("Hi"), content_chunk(" there"), stop_chunk()]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(json!({"model": MODEL, "stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = client_for(&server).stream(hello_request()).await.unwrap();
    assert_eq!(session.state(), SessionState::Created);

    let mut deltas = Vec::new();
    while let Some(delta) = session.next_delta().await {
        deltas.push(delta.unwrap());
    }

    assert_eq!(
        deltas,
        vec![
            StreamDelta::content("Hi"),
            StreamDelta::content(" there"),
            StreamDelta {
                is_terminal: true,
                ..StreamDelta::default()
            },
        ]
    );
    assert_eq!(session.state(), SessionState::Exhausted);
    assert!(session.is_closed());
    assert!(session.next_delta().await.is_none());
}

#[tokio::test]
async fn stream_skips_malformed_frames() {
    let server = MockServer::start().await;
    let body = format!(
        ": keep-alive\n\ndata: {{not json\n\nevent: ping\ndata: {}\n\ndata: [DONE]\n\ndata: {}\n\n",
        content_chunk("ok"),
        content_chunk("ignored"),
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let session = client_for(&server).stream(hello_request()).await.unwrap();
    let deltas: Vec<_> = session.into_stream().collect().await;

    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].as_ref().unwrap(), &StreamDelta::content("ok"));
}

#[tokio::test]
async fn stream_maps_unauthorized_to_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "No auth credentials found", "code": 401}
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).stream(hello_request()).await.unwrap_err();
    assert!(err.is_authentication(), "unexpected error: {err}");
    assert!(err.to_string().contains("No auth credentials found"));
}

#[tokio::test]
async fn stream_maps_too_many_requests_to_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_json(json!({"error": {"message": "slow down"}})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).stream(hello_request()).await.unwrap_err();
    assert!(err.is_rate_limit(), "unexpected error: {err}");
    assert!(err.to_string().contains("retry after 7 seconds"));
}

#[tokio::test]
async fn send_returns_complete_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("accept", "application/json"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "gen-1",
            "model": MODEL,
            "created": 1_700_000_000,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi there"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        })))
        .mount(&server)
        .await;

    let completion = client_for(&server).send(hello_request()).await.unwrap();
    assert_eq!(completion.id.as_deref(), Some("gen-1"));
    assert_eq!(completion.content(), Some("Hi there"));
    assert!(completion.created_at().is_some());
}

#[tokio::test]
async fn send_surfaces_in_band_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"message": "upstream provider failed", "code": 502}
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).send(hello_request()).await.unwrap_err();
    assert_eq!(err.status_code(), Some(502));
    assert!(err.to_string().contains("upstream provider failed"));
}

#[tokio::test]
async fn orchestrator_streams_a_reply() {
    let server = MockServer::start().await;
    let body = sse_body(&[content_chunk("Hi"), content_chunk(" there"), stop_chunk()]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{"role": "user", "content": "Hello"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let config = config_for(&server.uri());
    let client = CompletionClient::from_config(&config).unwrap();
    let mut orchestrator = Orchestrator::new(client, config).unwrap();
    let mut recorder = Recorder::default();

    let outcome = orchestrator.submit("Hello", &mut recorder).await.unwrap();

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(recorder.text, "Hi there");
    assert_eq!(recorder.finished, 1);
    let messages = orchestrator.conversation().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].text(), "Hello");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].text(), "Hi there");
    assert!(!orchestrator.is_processing());
}

#[tokio::test]
async fn orchestrator_keeps_reasoning_apart_from_content() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        reasoning_chunk("Let me think"),
        content_chunk("Answer"),
        stop_chunk(),
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"include_reasoning": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let config = config_for(&server.uri()).with_include_reasoning(true);
    let client = CompletionClient::from_config(&config).unwrap();
    let mut orchestrator = Orchestrator::new(client, config).unwrap();
    let mut recorder = Recorder::default();

    let outcome = orchestrator.submit("Why?", &mut recorder).await.unwrap();

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(recorder.thinking, "Let me think");
    assert_eq!(recorder.text, "Answer");
    let reply = orchestrator.conversation().last().unwrap();
    assert_eq!(reply.reasoning.as_deref(), Some("Let me think"));
    assert_eq!(reply.text(), "Answer");
}

#[tokio::test]
async fn orchestrator_records_connection_failure() {
    // Nothing listens on port 1.
    let config = config_for("http://127.0.0.1:1");
    let client = CompletionClient::from_config(&config).unwrap();
    let mut orchestrator = Orchestrator::new(client, config).unwrap();
    let mut recorder = Recorder::default();

    let outcome = orchestrator.submit("Hello", &mut recorder).await.unwrap();

    assert!(matches!(outcome, TurnOutcome::Failed { .. }));
    assert_eq!(recorder.errors.len(), 1);
    let messages = orchestrator.conversation().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text(), "Hello");
    assert!(
        messages[1].text().starts_with("Error: "),
        "unexpected reply: {}",
        messages[1].text()
    );
    assert!(!orchestrator.is_processing());
}

#[tokio::test]
async fn orchestrator_cancels_while_waiting_for_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&[content_chunk("late")]), "text/event-stream")
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let config = config_for(&server.uri());
    let client = CompletionClient::from_config(&config).unwrap();
    let mut orchestrator = Orchestrator::new(client, config).unwrap();
    let canceller = orchestrator.canceller();
    let mut recorder = Recorder::default();

    let driver = async {
        while !canceller.is_processing() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    };
    let (outcome, ()) = tokio::join!(orchestrator.submit("Hello", &mut recorder), driver);

    assert_eq!(outcome.unwrap(), TurnOutcome::Cancelled);
    assert_eq!(recorder.interrupted, 1);
    assert!(recorder.text.is_empty());
    let reply = orchestrator.conversation().last().unwrap();
    assert_eq!(reply.role, Role::Assistant);
    assert!(reply.text().is_empty());
    assert!(!orchestrator.is_processing());
}
