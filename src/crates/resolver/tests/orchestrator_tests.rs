//! Multi-step runs over several integrations

mod common;

use common::*;
use resolver::{
    DeepQuery, EndpointDocument, InMemoryIndex, InMemoryRegistry, Integration, Pipeline,
    PipelineSettings, StepOrchestrator,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FETCH_STEP: &str = "Retrieve all cancelled subscriptions with their cancellation reasons.";
const LOG_STEP: &str = "Create a Jira ticket for each cancelled subscription.";

fn plan_reply(steps: &[&str]) -> String {
    json!({ "steps": steps }).to_string()
}

fn index() -> InMemoryIndex {
    InMemoryIndex::new()
        .with_collection(
            "subs",
            vec![EndpointDocument::new("GET", "/subscriptions", "List cancelled subscriptions")],
        )
        .with_collection(
            "jira",
            vec![EndpointDocument::new("POST", "/issue", "Create a Jira issue")
                .with_body(json!([{"name": "summary", "schema": {"type": "string"}}]))],
        )
}

fn orchestrator(index: InMemoryIndex) -> StepOrchestrator {
    let settings = PipelineSettings::default();
    let pipeline = Pipeline::new(Arc::new(index), executor(), &settings);
    let registry: InMemoryRegistry = vec![
        Integration::new("subs", "Billing"),
        Integration::new("jira", "Jira"),
    ]
    .into_iter()
    .collect();
    StepOrchestrator::new(pipeline, Arc::new(registry), &settings)
}

fn deep_query(subs: &MockServer, jira: &MockServer) -> DeepQuery {
    DeepQuery::new("cancel all subscriptions and log them in Jira")
        .with_integration("subs", subs.uri(), BTreeMap::new())
        .with_integration(
            "jira",
            jira.uri(),
            BTreeMap::from([("authorization".to_string(), "Bearer j".to_string())]),
        )
}

fn two_step_model() -> RoutedModel {
    RoutedModel::new()
        .reply(DECOMPOSE, plan_reply(&[FETCH_STEP, LOG_STEP]))
        .reply(SELECT, r#"{"integration_id": "subs"}"#)
        .reply(SELECT, r#"{"integration_id": "jira"}"#)
        .reply(FILTER, filter_reply(&[("GET", "/subscriptions")]))
        .reply(FILTER, filter_reply(&[("POST", "/issue")]))
        .reply(BODY, r#"{"request_body": {"summary": "sub_1 cancelled: too expensive"}}"#)
        .reply(ANSWER, r#"{"natural_language_response": "sub_1 was cancelled because it was too expensive."}"#)
        .reply(ANSWER, r#"{"natural_language_response": "Created JIRA-1 for sub_1."}"#)
        .reply(CONTEXT_ANSWER, r#"{"response": "One cancelled subscription was logged as JIRA-1."}"#)
}

#[tokio::test]
async fn test_two_steps_run_in_order_with_context() {
    let subs = MockServer::start().await;
    let jira = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "sub_1", "reason": "too expensive"}])))
        .expect(1)
        .mount(&subs)
        .await;
    Mock::given(method("POST"))
        .and(path("/issue"))
        .and(body_partial_json(json!({"summary": "sub_1 cancelled: too expensive"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"key": "JIRA-1"})))
        .expect(1)
        .mount(&jira)
        .await;

    let model = two_step_model();
    let outcome = orchestrator(index())
        .run(&model, &deep_query(&subs, &jira), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.steps, vec![FETCH_STEP, LOG_STEP]);
    let entries = outcome.transcript.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].step, FETCH_STEP);
    assert_eq!(entries[1].step, LOG_STEP);
    assert_eq!(entries[1].response, "Created JIRA-1 for sub_1.");
    assert_eq!(
        outcome.natural_language_response(),
        "One cancelled subscription was logged as JIRA-1."
    );

    // step 2 sees step 1's answer, step 1 sees nothing before it
    let body_input = &model.inputs_for(BODY)[0];
    assert!(body_input.contains("Context from previous steps"));
    assert!(body_input.contains("too expensive"));
    assert!(model.inputs_for(ANSWER)[1].contains("Context from previous steps"));

    // retrieval and filtering see the bare step text only
    let filter_inputs = model.inputs_for(FILTER);
    assert!(filter_inputs[1].contains(LOG_STEP));
    assert!(filter_inputs
        .iter()
        .all(|input| !input.contains("Context from previous steps")));

    // selector was told about both candidates
    let select_input = &model.inputs_for(SELECT)[0];
    assert!(select_input.contains("List cancelled subscriptions"));
    assert!(select_input.contains("Jira"));

    let jira_requests = jira.received_requests().await.unwrap();
    assert_eq!(
        jira_requests[0].headers.get("authorization").unwrap(),
        "Bearer j"
    );
}

#[tokio::test]
async fn test_failed_first_step_halts_before_second() {
    let subs = MockServer::start().await;
    let jira = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("billing down"))
        .expect(1)
        .mount(&subs)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&jira)
        .await;

    let model = two_step_model();
    let outcome = orchestrator(index())
        .run(&model, &deep_query(&subs, &jira), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.transcript.len(), 0);
    assert!(outcome.answer.is_none());
    let failure = outcome.failure.as_ref().unwrap();
    assert_eq!(failure.step_index, 0);
    assert_eq!(failure.stage, "executing");
    assert!(failure.reason.contains("billing down"));
    assert!(outcome.natural_language_response().starts_with("Step 1 failed:"));

    assert_eq!(model.calls(SELECT), 1);
    assert_eq!(model.calls(CONTEXT_ANSWER), 0);
}

#[tokio::test]
async fn test_selector_choosing_outsider_fails_step() {
    let subs = MockServer::start().await;
    let jira = MockServer::start().await;

    let model = RoutedModel::new()
        .reply(DECOMPOSE, plan_reply(&[FETCH_STEP]))
        .reply(SELECT, r#"{"integration_id": "salesforce"}"#);

    let outcome = orchestrator(index())
        .run(&model, &deep_query(&subs, &jira), &CancellationToken::new())
        .await
        .unwrap();

    let failure = outcome.failure.unwrap();
    assert_eq!(failure.step_index, 0);
    assert_eq!(failure.stage, "resolving");
    assert_eq!(model.calls(FILTER), 0);
}

#[tokio::test]
async fn test_cancelled_run_returns_without_steps() {
    let subs = MockServer::start().await;
    let jira = MockServer::start().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let model = two_step_model();
    let outcome = orchestrator(index())
        .run(&model, &deep_query(&subs, &jira), &cancel)
        .await
        .unwrap();

    let failure = outcome.failure.unwrap();
    assert_eq!(failure.step_index, 0);
    assert_eq!(failure.reason, "cancelled");
    assert_eq!(model.calls(SELECT), 0);
    assert!(subs.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_transcript_length_matches_completed_steps() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    for n in 1..=4 {
        let steps: Vec<String> = (0..n).map(|i| format!("Ping the service, round {}", i)).collect();
        let step_refs: Vec<&str> = steps.iter().map(String::as_str).collect();

        let model = RoutedModel::new()
            .reply(DECOMPOSE, plan_reply(&step_refs))
            .reply(FILTER, filter_reply(&[("GET", "/ping")]))
            .reply(ANSWER, r#"{"natural_language_response": "pong"}"#)
            .reply(CONTEXT_ANSWER, r#"{"response": "all pongs"}"#);

        let index = InMemoryIndex::new()
            .with_collection("svc", vec![EndpointDocument::new("GET", "/ping", "Ping")]);
        let deep = DeepQuery::new("ping repeatedly").with_integration("svc", server.uri(), BTreeMap::new());

        let outcome = orchestrator(index)
            .run(&model, &deep, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.transcript.len(), n);
        for (entry, expected) in outcome.transcript.entries().iter().zip(&steps) {
            assert_eq!(&entry.step, expected);
        }
        // one candidate never needs the selector
        assert_eq!(model.calls(SELECT), 0);
    }
}

#[tokio::test]
async fn test_consolidation_failure_falls_back_to_last_answer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let model = RoutedModel::new()
        .reply(DECOMPOSE, plan_reply(&["Ping the service"]))
        .reply(FILTER, filter_reply(&[("GET", "/ping")]))
        .reply(ANSWER, r#"{"natural_language_response": "pong"}"#);

    let index = InMemoryIndex::new()
        .with_collection("svc", vec![EndpointDocument::new("GET", "/ping", "Ping")]);
    let deep = DeepQuery::new("ping").with_integration("svc", server.uri(), BTreeMap::new());

    let outcome = orchestrator(index)
        .run(&model, &deep, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.answer.as_deref(), Some("pong"));
}

#[tokio::test]
async fn test_empty_decomposition_is_error() {
    let model = RoutedModel::new().reply(DECOMPOSE, plan_reply(&[]));
    let deep = DeepQuery::new("nothing").with_integration("svc", "http://127.0.0.1:9", BTreeMap::new());

    let err = orchestrator(InMemoryIndex::new())
        .run(&model, &deep, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, resolver::ResolverError::Decomposition(_)));
}
