//! Single-step pipeline against mocked target APIs

mod common;

use common::*;
use llm::ToolCall;
use resolver::{
    ActionQuery, EndpointDocument, ExecutionError, HttpMethod, InMemoryIndex, ResolverError,
};
use serde_json::json;
use std::collections::BTreeMap;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cart_index() -> InMemoryIndex {
    InMemoryIndex::new().with_collection("X", vec![EndpointDocument::new("GET", "/cart", "get cart")])
}

#[tokio::test]
async fn test_show_my_cart_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let cart_url = format!("{}/cart", server.uri());
    let model = RoutedModel::new()
        .reply(FILTER, filter_reply(&[("GET", &cart_url)]))
        .reply(ANSWER, r#"{"natural_language_response": "Your cart is empty."}"#);

    let query = ActionQuery::new("X", format!("{}/", server.uri()), "show my cart");
    let result = pipeline(cart_index()).run_action(&model, &query).await.unwrap();

    assert_eq!(result.method, HttpMethod::Get);
    assert_eq!(result.url, cart_url);
    assert_eq!(result.endpoint.url, "/cart");
    assert_eq!(result.parameters, json!({}));
    assert_eq!(result.body, json!({}));
    assert_eq!(result.response, json!({"items": []}));
    assert_eq!(result.answer, "Your cart is empty.");
    assert!(result.latency.total >= result.latency.api);

    assert_eq!(model.calls(PARAMETERS), 0);
    assert_eq!(model.calls(BODY), 0);
    assert_eq!(model.calls(REPHRASE), 0);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received[0].url.query(), None);
    assert!(received[0].body.is_empty());
}

#[tokio::test]
async fn test_filter_sees_full_urls_and_answer_sees_response_shape() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 3})))
        .mount(&server)
        .await;

    let index = InMemoryIndex::new().with_collection(
        "X",
        vec![EndpointDocument::new("GET", "/cart", "get cart")
            .with_response(json!({"type": "object", "properties": {"total": {"type": "integer"}}}))],
    );
    let model = RoutedModel::new()
        .reply(FILTER, filter_reply(&[("get", "/cart")]))
        .reply(ANSWER, r#"{"natural_language_response": "3 items."}"#);

    let query = ActionQuery::new("X", server.uri(), "show my cart");
    pipeline(index).run_action(&model, &query).await.unwrap();

    let filter_input = &model.inputs_for(FILTER)[0];
    assert!(filter_input.contains(&format!("{}/cart", server.uri())));

    let answer_input = &model.inputs_for(ANSWER)[0];
    assert!(answer_input.contains("structure_of_data"));
    assert!(answer_input.contains("\"total\": 3"));
}

#[tokio::test]
async fn test_empty_filter_is_no_matching_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let model = RoutedModel::new().reply(FILTER, filter_reply(&[]));
    let query = ActionQuery::new("X", server.uri(), "delete my account");
    let err = pipeline(cart_index()).run_action(&model, &query).await.unwrap_err();

    assert!(matches!(err, ResolverError::NoMatchingEndpoint { integration_id, .. } if integration_id == "X"));
}

#[tokio::test]
async fn test_empty_retrieval_skips_filter() {
    let model = RoutedModel::new();
    let query = ActionQuery::new("unknown", "http://127.0.0.1:9", "show my cart");
    let err = pipeline(cart_index()).run_action(&model, &query).await.unwrap_err();

    assert!(matches!(err, ResolverError::NoMatchingEndpoint { .. }));
    assert_eq!(model.calls(FILTER), 0);
}

#[tokio::test]
async fn test_rephrased_query_drives_retrieval_and_filter() {
    let model = RoutedModel::new()
        .reply(REPHRASE, r#"{"rephrased_query": "show my cart"}"#)
        .reply(FILTER, filter_reply(&[("GET", "https://shop.test/cart")]));

    let query = ActionQuery::new("X", "https://shop.test", "what's in my basket")
        .with_rephraser(Some("Use the shop's vocabulary".into()));
    let identified = pipeline(cart_index())
        .identify_endpoints(&model, &query)
        .await
        .unwrap();

    assert_eq!(identified.rephrased_query, "show my cart");
    assert_eq!(identified.endpoints.len(), 1);
    assert!(model.inputs_for(REPHRASE)[0].contains("Use the shop's vocabulary"));
    assert!(model.inputs_for(FILTER)[0].contains("show my cart"));
}

#[tokio::test]
async fn test_post_fills_path_query_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/carts/7/items"))
        .and(query_param("notify", "true"))
        .and(header("x-shop-token", "secret"))
        .and(body_json(json!({"product_id": 3, "qty": 2})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let index = InMemoryIndex::new().with_collection(
        "shop",
        vec![EndpointDocument::new("POST", "/carts/{id}/items", "Add an item to a cart")
            .with_parameters(json!([
                {"name": "id", "schema": {"type": "integer"}},
                {"name": "notify", "schema": {"type": "boolean"}, "required": false}
            ]))
            .with_body(json!([
                {"name": "product_id", "schema": {"type": "integer"}},
                {"name": "qty", "schema": {"type": "integer"}, "required": false}
            ]))],
    );

    let model = RoutedModel::new()
        .reply(FILTER, filter_reply(&[("POST", "/carts/{id}/items")]))
        .reply(PARAMETERS, r#"{"request_parameters": {"id": 7, "notify": true}}"#)
        .reply(BODY, r#"```json
{"request_body": {"product_id": "3", "qty": 2, "gift": true}}
```"#)
        .reply(ANSWER, r#"{"natural_language_response": "Added."}"#);

    let headers = BTreeMap::from([("x-shop-token".to_string(), "secret".to_string())]);
    let query = ActionQuery::new("shop", server.uri(), "add two of product 3 to cart 7 and notify me")
        .with_headers(headers);
    let result = pipeline(index).run_action(&model, &query).await.unwrap();

    assert_eq!(result.method, HttpMethod::Post);
    assert_eq!(result.url, format!("{}/carts/7/items", server.uri()));
    assert_eq!(result.parameters, json!({"id": 7, "notify": true}));
    assert_eq!(result.body, json!({"product_id": 3, "qty": 2}));

    // synthesizers see the original query
    assert!(model.inputs_for(PARAMETERS)[0].contains("add two of product 3"));
}

#[tokio::test]
async fn test_parameter_synthesis_can_use_lookup_tools() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 42, "name": "Ada"}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(query_param("customer_id", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&server)
        .await;

    let index = InMemoryIndex::new().with_collection(
        "shop",
        vec![
            EndpointDocument::new("GET", "/orders", "List orders of a customer")
                .with_parameters(json!([{"name": "customer_id", "schema": {"type": "integer"}}])),
            EndpointDocument::new("GET", "/customers", "List customers"),
        ],
    );

    let model = RoutedModel::new()
        .reply(FILTER, filter_reply(&[("GET", "/orders")]))
        .reply_tools(PARAMETERS, vec![ToolCall::new("call_1", "get_customers", json!({}))])
        .reply(PARAMETERS, r#"{"request_parameters": {"customer_id": 42}}"#)
        .reply(ANSWER, r#"{"natural_language_response": "Ada has one order."}"#);

    let query = ActionQuery::new("shop", server.uri(), "orders for Ada");
    let result = pipeline(index).run_action(&model, &query).await.unwrap();

    assert_eq!(result.answer, "Ada has one order.");
    let second = &model.requests_for(PARAMETERS)[1];
    assert!(second.messages.iter().any(|m| m.content.contains("Ada")));
}

#[tokio::test]
async fn test_execution_failure_surfaces_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let model = RoutedModel::new().reply(FILTER, filter_reply(&[("GET", "/cart")]));
    let query = ActionQuery::new("X", server.uri(), "show my cart");
    let err = pipeline(cart_index()).run_action(&model, &query).await.unwrap_err();

    assert!(matches!(
        err,
        ResolverError::Execution(ExecutionError::Status { status: 503, ref body }) if body == "maintenance"
    ));
    assert_eq!(model.calls(ANSWER), 0);
}

#[tokio::test]
async fn test_synthesis_failure_stops_before_execution() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let index = InMemoryIndex::new().with_collection(
        "shop",
        vec![EndpointDocument::new("GET", "/orders", "List orders")
            .with_parameters(json!([{"name": "customer_id", "schema": {"type": "integer"}}]))],
    );
    let model = RoutedModel::new()
        .reply(FILTER, filter_reply(&[("GET", "/orders")]))
        .reply(PARAMETERS, r#"{"request_parameters": {"customer_id": "not a number"}}"#);

    let query = ActionQuery::new("shop", server.uri(), "orders please");
    let err = pipeline(index).run_action(&model, &query).await.unwrap_err();
    assert!(matches!(err, ResolverError::Synthesis(_)));
}

#[tokio::test]
async fn test_unsupported_method_rejected_before_io() {
    let index = InMemoryIndex::new().with_collection(
        "shop",
        vec![EndpointDocument::new("PATCH", "/cart", "update cart")],
    );
    let model = RoutedModel::new().reply(FILTER, filter_reply(&[("PATCH", "/cart")]));
    let query = ActionQuery::new("shop", "http://127.0.0.1:9", "update my cart");
    let err = pipeline(index).run_action(&model, &query).await.unwrap_err();

    assert!(matches!(
        err,
        ResolverError::Execution(ExecutionError::UnsupportedMethod(m)) if m == "PATCH"
    ));
}
