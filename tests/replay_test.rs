use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use sessionscope::error::ScopeError;
use sessionscope::parsers::text_logs::{
    parse_automate_text_logs, LogRequest, ParsedRequest, ParsedTextLogs,
};
use sessionscope::replay::{
    ReplayStep, RetryPolicy, SessionReplayEngine, StartedSession, WebDriverExecutor,
};
use url::Url;

struct MockExecutor {
    results: Mutex<VecDeque<Result<Value, ScopeError>>>,
    calls: Mutex<Vec<ParsedRequest>>,
    stopped: Mutex<Vec<String>>,
    hub_urls: std::sync::Mutex<Vec<Url>>,
}

impl MockExecutor {
    fn new(results: Vec<Result<Value, ScopeError>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            calls: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            hub_urls: std::sync::Mutex::new(Vec::new()),
        })
    }

    async fn calls(&self) -> Vec<ParsedRequest> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl WebDriverExecutor for MockExecutor {
    async fn start_session(&self, _capabilities: &Value) -> Result<StartedSession, ScopeError> {
        Ok(StartedSession {
            session_id: "live-session".to_string(),
            raw: json!({ "value": { "sessionId": "live-session" } }),
        })
    }

    async fn execute(
        &self,
        request: &ParsedRequest,
        _session_id: &str,
    ) -> Result<Value, ScopeError> {
        self.calls.lock().await.push(request.clone());
        self.results
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(json!({ "value": null })))
    }

    async fn stop_session(&self, session_id: &str) -> Result<(), ScopeError> {
        self.stopped.lock().await.push(session_id.to_string());
        Ok(())
    }

    fn set_hub_url(&self, url: Url) {
        self.hub_urls.lock().unwrap().push(url);
    }
}

fn command(method: &str, endpoint: &str, command_name: &str, data: Value) -> LogRequest {
    LogRequest::Command(ParsedRequest {
        method: method.to_string(),
        endpoint: endpoint.to_string(),
        data,
        command_name: command_name.to_string(),
    })
}

/// findElement followed by a click on the found element, as the tokenizer
/// would produce them. Recorded responses carry `value` already extracted.
fn find_and_click_logs() -> ParsedTextLogs {
    ParsedTextLogs {
        capabilities: vec![json!({ "browserName": "chrome" })],
        requests: vec![
            command(
                "POST",
                "/element",
                "findElement",
                json!({ "using": "css selector", "value": "#login" }),
            ),
            command("POST", "/element/elem-1/click", "elementClick", json!({})),
        ],
        responses: vec![
            json!({ "element-6066-11e4-a52e-4f735466cecf": "elem-1" }),
            json!(null),
        ],
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_secs(30),
        interval: Duration::from_millis(500),
    }
}

#[tokio::test]
async fn test_element_id_remapped_between_steps() {
    let executor = MockExecutor::new(vec![
        // live session finds the element under a different id
        Ok(json!({ "value": { "element-6066-11e4-a52e-4f735466cecf": "elem-9" } })),
        Ok(json!({ "value": null })),
    ]);
    let mut engine = SessionReplayEngine::new(find_and_click_logs(), executor.clone());
    engine.start_session(r#"{"browserName":"chrome"}"#).await.unwrap();

    let first = engine.execute_next_request().await.unwrap().unwrap();
    assert!(matches!(first, ReplayStep::Executed { .. }));

    let second = engine.execute_next_request().await.unwrap().unwrap();
    let ReplayStep::Executed { request, .. } = &second else {
        panic!("expected executed step, got {second:?}");
    };
    assert_eq!(request.endpoint, "/element/elem-9/click");

    let calls = executor.calls().await;
    assert_eq!(calls[1].endpoint, "/element/elem-9/click");

    assert!(engine.execute_next_request().await.unwrap().is_none());
}

#[tokio::test]
async fn test_remap_with_tokenizer_output() {
    // end to end: raw log text through the tokenizer into the engine
    let lines = vec![
        r#"2024-05-14 10:00:00:000 REQUEST [session] DEBUG POST /session {"desiredCapabilities":{"browserName":"chrome"}}"#,
        "ACCEPTED_CAPABILITIES",
        "{}",
        "DONE",
        r##"2024-05-14 10:00:05:000 REQUEST [session] DEBUG POST /session/abc123/element {"using":"css selector","value":"#login"}"##,
        r#"2024-05-14 10:00:05:300 RESPONSE {"value":{"element-6066-11e4-a52e-4f735466cecf":"elem-1"}}"#,
        r#"2024-05-14 10:00:05:500 REQUEST [session] DEBUG POST /session/abc123/element/elem-1/click {}"#,
        r#"2024-05-14 10:00:05:900 RESPONSE {"value":null}"#,
    ];
    let logs = parse_automate_text_logs(&lines);
    assert_eq!(logs.requests.len(), 2);

    let executor = MockExecutor::new(vec![
        Ok(json!({ "value": { "element-6066-11e4-a52e-4f735466cecf": "elem-9" } })),
        Ok(json!({ "value": null })),
    ]);
    let mut engine = SessionReplayEngine::new(logs, executor.clone());
    engine.start_session("{}").await.unwrap();

    engine.execute_next_request().await.unwrap().unwrap();
    engine.execute_next_request().await.unwrap().unwrap();

    let calls = executor.calls().await;
    assert_eq!(calls[1].endpoint, "/element/elem-9/click");
}

#[tokio::test]
async fn test_mapping_survives_a_later_find() {
    let executor = MockExecutor::new(vec![
        Ok(json!({ "value": { "element-6066-11e4-a52e-4f735466cecf": "elem-9" } })),
        Ok(json!({ "value": { "element-6066-11e4-a52e-4f735466cecf": "elem-8" } })),
        Ok(json!({ "value": null })),
    ]);
    let logs = ParsedTextLogs {
        capabilities: vec![json!({})],
        requests: vec![
            command(
                "POST",
                "/element",
                "findElement",
                json!({ "using": "css selector", "value": "#first" }),
            ),
            command(
                "POST",
                "/element",
                "findElement",
                json!({ "using": "css selector", "value": "#second" }),
            ),
            // references the element from the first find
            command("POST", "/element/elem-1/click", "elementClick", json!({})),
        ],
        responses: vec![
            json!({ "element-6066-11e4-a52e-4f735466cecf": "elem-1" }),
            json!({ "element-6066-11e4-a52e-4f735466cecf": "elem-2" }),
            json!(null),
        ],
    };
    let mut engine = SessionReplayEngine::new(logs, executor.clone());
    engine.start_session("{}").await.unwrap();
    for _ in 0..3 {
        engine.execute_next_request().await.unwrap().unwrap();
    }

    let calls = executor.calls().await;
    assert_eq!(calls[2].endpoint, "/element/elem-9/click");
}

#[tokio::test]
async fn test_set_hub_url_reaches_executor() {
    let executor = MockExecutor::new(vec![]);
    let engine = SessionReplayEngine::new(ParsedTextLogs::default(), executor.clone());
    let url = Url::parse("http://10.0.0.5:4444/wd/hub").unwrap();
    engine.set_hub_url(url.clone());
    assert_eq!(*executor.hub_urls.lock().unwrap(), vec![url]);
}

#[tokio::test(start_paused = true)]
async fn test_find_element_retries_until_success() {
    let lookup_error = || {
        Err(ScopeError::CommandFailed {
            status: 404,
            body: "no such element".to_string(),
        })
    };
    let executor = MockExecutor::new(vec![
        lookup_error(),
        lookup_error(),
        Ok(json!({ "value": { "element-6066-11e4-a52e-4f735466cecf": "elem-9" } })),
    ]);
    let logs = ParsedTextLogs {
        capabilities: vec![json!({})],
        requests: vec![command(
            "POST",
            "/element",
            "findElement",
            json!({ "using": "css selector", "value": "#slow" }),
        )],
        responses: vec![json!({ "ELEMENT": "elem-1" })],
    };
    let mut engine = SessionReplayEngine::with_retry(logs, executor.clone(), fast_retry());
    engine.start_session("{}").await.unwrap();

    let step = engine.execute_next_request().await.unwrap().unwrap();
    assert!(matches!(step, ReplayStep::Executed { .. }));
    assert_eq!(executor.calls().await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_find_element_fails_after_deadline_and_stops_replay() {
    // executor queue empties immediately; every attempt fails
    let errors: Vec<Result<Value, ScopeError>> = (0..200)
        .map(|_| {
            Err(ScopeError::CommandFailed {
                status: 404,
                body: "no such element".to_string(),
            })
        })
        .collect();
    let executor = MockExecutor::new(errors);
    let logs = ParsedTextLogs {
        capabilities: vec![json!({})],
        requests: vec![
            command(
                "POST",
                "/element",
                "findElement",
                json!({ "using": "css selector", "value": "#missing" }),
            ),
            command("GET", "/title", "getTitle", json!({})),
        ],
        responses: vec![json!(null), json!("t")],
    };
    let mut engine = SessionReplayEngine::with_retry(logs, executor, fast_retry());
    engine.start_session("{}").await.unwrap();

    let step = engine.execute_next_request().await.unwrap().unwrap();
    assert!(matches!(step, ReplayStep::Failed { .. }));
    // fail-fast: the remaining getTitle is never executed
    assert!(engine.is_finished());
    assert!(engine.execute_next_request().await.unwrap().is_none());
}

#[tokio::test]
async fn test_non_find_command_fails_immediately() {
    let executor = MockExecutor::new(vec![Err(ScopeError::CommandFailed {
        status: 500,
        body: "boom".to_string(),
    })]);
    let logs = ParsedTextLogs {
        capabilities: vec![json!({})],
        requests: vec![command(
            "POST",
            "/url",
            "navigateTo",
            json!({ "url": "https://x.test" }),
        )],
        responses: vec![json!(null)],
    };
    let mut engine = SessionReplayEngine::new(logs, executor.clone());
    engine.start_session("{}").await.unwrap();

    let step = engine.execute_next_request().await.unwrap().unwrap();
    let ReplayStep::Failed { error, .. } = step else {
        panic!("expected failure");
    };
    assert!(error.contains("boom"));
    assert_eq!(executor.calls().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sleep_marker_waits_recorded_gap() {
    let executor = MockExecutor::new(vec![]);
    let logs = ParsedTextLogs {
        capabilities: vec![json!({})],
        requests: vec![LogRequest::Sleep(3)],
        responses: vec![],
    };
    let mut engine = SessionReplayEngine::new(logs, executor);
    engine.start_session("{}").await.unwrap();

    let before = tokio::time::Instant::now();
    let step = engine.execute_next_request().await.unwrap().unwrap();
    assert!(matches!(step, ReplayStep::Slept { seconds: 3 }));
    assert!(before.elapsed() >= Duration::from_secs(3));
}

#[tokio::test]
async fn test_root_endpoint_is_skipped_without_hub_call() {
    let executor = MockExecutor::new(vec![]);
    let logs = ParsedTextLogs {
        capabilities: vec![json!({})],
        requests: vec![command("DELETE", "/", "deleteSession", json!({}))],
        responses: vec![json!(null)],
    };
    let mut engine = SessionReplayEngine::new(logs, executor.clone());
    engine.start_session("{}").await.unwrap();

    let step = engine.execute_next_request().await.unwrap().unwrap();
    assert!(matches!(step, ReplayStep::Skipped { .. }));
    assert!(executor.calls().await.is_empty());
}

#[tokio::test]
async fn test_invalid_capabilities_rejected_locally() {
    let executor = MockExecutor::new(vec![]);
    let mut engine = SessionReplayEngine::new(ParsedTextLogs::default(), executor);
    let err = engine.start_session("not json").await.unwrap_err();
    assert!(matches!(err, ScopeError::InvalidCapabilities(_)));
    assert!(engine.session_id().is_none());
}

#[tokio::test]
async fn test_stepping_without_session_errors() {
    let executor = MockExecutor::new(vec![]);
    let logs = ParsedTextLogs {
        capabilities: vec![json!({})],
        requests: vec![command("GET", "/title", "getTitle", json!({}))],
        responses: vec![json!("t")],
    };
    let mut engine = SessionReplayEngine::new(logs, executor);
    let err = engine.execute_next_request().await.unwrap_err();
    assert!(matches!(err, ScopeError::SessionNotStarted));
}

#[tokio::test]
async fn test_stop_session_forwards_to_executor() {
    let executor = MockExecutor::new(vec![]);
    let mut engine = SessionReplayEngine::new(ParsedTextLogs::default(), executor.clone());
    engine.start_session("{}").await.unwrap();
    engine.stop_session().await.unwrap();
    assert_eq!(*executor.stopped.lock().await, vec!["live-session"]);

    // stopping again is a no-op
    engine.stop_session().await.unwrap();
    assert_eq!(executor.stopped.lock().await.len(), 1);
}
