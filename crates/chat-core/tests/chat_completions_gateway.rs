use std::collections::VecDeque;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::post;
use axum::{Json, Router};
use chat_core::config::{EmbeddingConfig, LlmProviderConfig};
use chat_core::llm::prompts::LEGAL_ASSISTANT_SYSTEM_PROMPT;
use chat_core::llm::{
    ChatCompletionsGateway, CompletionProvider, EmbeddingProvider, EmbeddingsClient,
    LlmGatewayError, SummaryProvider, TopicProvider, embed_or_zero,
};
use chat_core::models::ConversationTurn;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

#[derive(Debug, Clone)]
struct MockReply {
    status: StatusCode,
    body: Value,
}

#[derive(Debug, Clone)]
struct TestServerState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    seen_payloads: Arc<Mutex<Vec<Value>>>,
    seen_auth_headers: Arc<Mutex<Vec<String>>>,
}

impl TestServerState {
    fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            seen_payloads: Arc::new(Mutex::new(Vec::new())),
            seen_auth_headers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn payloads(&self) -> Vec<Value> {
        self.seen_payloads.lock().await.clone()
    }
}

#[tokio::test]
async fn completion_sends_system_prompt_history_and_prompt() {
    let state = TestServerState::with_replies(vec![ok_reply("The Equality Act 2010 applies.")]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = ChatCompletionsGateway::new(llm_config(&base_url, 0))
        .expect("gateway should build");
    let history = vec![ConversationTurn {
        prompt: "What is discrimination?".to_string(),
        response: "Less favourable treatment.".to_string(),
    }];
    let response = gateway
        .complete(LEGAL_ASSISTANT_SYSTEM_PROMPT, &history, "Which statute applies?")
        .await
        .expect("completion should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(response, "The Equality Act 2010 applies.");

    let payloads = state.payloads().await;
    assert_eq!(payloads.len(), 1);
    let payload = &payloads[0];
    assert_eq!(payload["model"], "deepseek-chat");
    assert_eq!(payload["max_tokens"], 2048);
    let roles = payload["messages"]
        .as_array()
        .expect("messages array")
        .iter()
        .map(|message| message["role"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    assert_eq!(payload["messages"][0]["content"], LEGAL_ASSISTANT_SYSTEM_PROMPT);
    assert_eq!(payload["messages"][1]["content"], "What is discrimination?");
    assert_eq!(payload["messages"][3]["content"], "Which statute applies?");

    let seen_auth_headers = state.seen_auth_headers.lock().await.clone();
    assert_eq!(seen_auth_headers, vec!["Bearer test-llm-key".to_string()]);
}

#[tokio::test]
async fn retries_transient_failures_before_succeeding() {
    let state = TestServerState::with_replies(vec![
        provider_error_reply(StatusCode::SERVICE_UNAVAILABLE, "overloaded"),
        provider_error_reply(StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        ok_reply("recovered"),
    ]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = ChatCompletionsGateway::new(llm_config(&base_url, 2))
        .expect("gateway should build");
    let response = gateway
        .complete("Answer briefly.", &[], "hello")
        .await
        .expect("request should succeed after retries");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(response, "recovered");
    assert_eq!(state.payloads().await.len(), 3);
}

#[tokio::test]
async fn does_not_retry_authorization_failures() {
    let state = TestServerState::with_replies(vec![
        provider_error_reply(StatusCode::UNAUTHORIZED, "invalid_api_key"),
        ok_reply("should not be reached"),
    ]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = ChatCompletionsGateway::new(llm_config(&base_url, 2))
        .expect("gateway should build");
    let err = gateway
        .complete("Answer briefly.", &[], "hello")
        .await
        .expect_err("401 should fail fast");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    match err {
        LlmGatewayError::ProviderFailure(message) => {
            assert_eq!(message, "status=401 code=invalid_api_key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(state.payloads().await.len(), 1);
}

#[tokio::test]
async fn malformed_success_payload_is_rejected() {
    let state = TestServerState::with_replies(vec![MockReply {
        status: StatusCode::OK,
        body: json!({ "choices": [] }),
    }]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let gateway = ChatCompletionsGateway::new(llm_config(&base_url, 0))
        .expect("gateway should build");
    let err = gateway
        .complete("Answer briefly.", &[], "hello")
        .await
        .expect_err("missing choice should fail");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert!(matches!(err, LlmGatewayError::InvalidProviderPayload(_)));
}

#[tokio::test]
async fn topics_and_titles_use_their_own_prompts_and_cleanup() {
    let long_title = "A very long title about the statutory right not to be unfairly dismissed";
    let state = TestServerState::with_replies(vec![
        ok_reply("  Employment Law, Contract Law\nThese topics were chosen because..."),
        ok_reply(long_title),
    ]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = ChatCompletionsGateway::new(llm_config(&base_url, 0))
        .expect("gateway should build");
    let topics = gateway
        .extract_topics("Can my employer dismiss me?")
        .await
        .expect("topics");
    let title = gateway
        .generate_title("Can my employer dismiss me?")
        .await
        .expect("title");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(topics, "Employment Law, Contract Law");
    assert_eq!(title.chars().count(), 50);
    assert!(title.ends_with("..."));

    let payloads = state.payloads().await;
    assert_eq!(payloads[0]["max_tokens"], 100);
    assert!(
        payloads[0]["messages"][0]["content"]
            .as_str()
            .unwrap_or_default()
            .starts_with("You are a legal topic classifier.")
    );
    assert_eq!(payloads[1]["max_tokens"], 50);
}

#[tokio::test]
async fn summary_request_formats_the_conversation() {
    let state = TestServerState::with_replies(vec![ok_reply(
        "  The user asked about negligence and duty of care.  ",
    )]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = ChatCompletionsGateway::new(llm_config(&base_url, 0))
        .expect("gateway should build");
    let turns = vec![
        ConversationTurn {
            prompt: "What is negligence?".to_string(),
            response: "A breach of a duty of care.".to_string(),
        },
        ConversationTurn {
            prompt: "Who owes a duty?".to_string(),
            response: "See Caparo.".to_string(),
        },
    ];
    let summary = gateway.summarize(&turns).await.expect("summary");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(summary, "The user asked about negligence and duty of care.");
    let payloads = state.payloads().await;
    assert_eq!(payloads[0]["max_tokens"], 200);
    assert_eq!(
        payloads[0]["messages"][1]["content"],
        "Conversation: User: What is negligence?\nAssistant: A breach of a duty of care.\n\nUser: Who owes a duty?\nAssistant: See Caparo.\n\n\nSummary:"
    );
}

#[tokio::test]
async fn embeddings_return_vector_or_zero_fallback() {
    let state = TestServerState::with_replies(vec![
        MockReply {
            status: StatusCode::OK,
            body: json!({ "data": [{ "embedding": [0.1, 0.2, 0.3] }] }),
        },
        provider_error_reply(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
    ]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let mut config = EmbeddingConfig::for_endpoint(format!("{base_url}/embeddings"), "embed-key");
    config.dimensions = 3;
    let client = EmbeddingsClient::new(config).expect("client should build");

    let embedding = client.embed("summary text").await.expect("embedding");
    let fallback = embed_or_zero(&client, "summary text").await;

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
    assert_eq!(fallback, vec![0.0, 0.0, 0.0]);
    let payloads = state.payloads().await;
    assert_eq!(payloads[0]["model"], "text-embedding-ada-002");
    assert_eq!(payloads[0]["input"], "summary text");
}

fn llm_config(base_url: &str, max_retries: u32) -> LlmProviderConfig {
    let mut config =
        LlmProviderConfig::for_endpoint(format!("{base_url}/chat/completions"), "test-llm-key");
    config.timeout_ms = 2_000;
    config.max_retries = max_retries;
    config.retry_base_backoff_ms = 0;
    config
}

fn ok_reply(content: &str) -> MockReply {
    MockReply {
        status: StatusCode::OK,
        body: json!({
            "id": "gen-123",
            "model": "deepseek-chat",
            "choices": [
                {
                    "message": {
                        "role": "assistant",
                        "content": content
                    }
                }
            ],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 8,
                "total_tokens": 20
            }
        }),
    }
}

fn provider_error_reply(status: StatusCode, code: &str) -> MockReply {
    MockReply {
        status,
        body: json!({
            "error": {
                "code": code
            }
        }),
    }
}

async fn spawn_test_server(
    state: TestServerState,
) -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/chat/completions", post(test_handler))
        .route("/embeddings", post(test_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let local_addr = listener
        .local_addr()
        .expect("listener address should resolve");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server_task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        server.await.expect("test server should run");
    });

    (format!("http://{local_addr}"), shutdown_tx, server_task)
}

async fn test_handler(
    State(state): State<TestServerState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.seen_payloads.lock().await.push(payload);

    if let Some(value) = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
    {
        state.seen_auth_headers.lock().await.push(value.to_string());
    }

    let reply = state.replies.lock().await.pop_front().unwrap_or(MockReply {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: json!({
            "error": {
                "code": "exhausted_test_replies"
            }
        }),
    });

    (reply.status, Json(reply.body))
}
