//! HTTP Server & Routing Integration Tests
//!
//! Router exercised in-process with `oneshot` against in-memory catalog and
//! photometry services.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use exoseer_vet::advisor::ScriptedAdvisor;
use exoseer_vet::services::StaticCatalog;
use exoseer_vet::workflow::Pipeline;
use exoseer_vet::{build_router, AppState};
use helpers::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app(pipeline: Pipeline) -> Router {
    let state = AppState::new(
        pipeline,
        Arc::new(test_catalog()),
        Arc::new(test_photometry()),
    );
    build_router(state)
}

fn default_app() -> Router {
    test_app(Pipeline::new(seeded_config(17)))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(response).await
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health_reports_module_and_advisor() {
    let (status, body) = get(default_app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "exoseer-vet");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["advisor"], "disabled");

    let app = test_app(Pipeline::new(seeded_config(1)).with_advisor(Arc::new(ScriptedAdvisor::new())));
    let (_, body) = get(app, "/health").await;
    assert_eq!(body["advisor"], "scripted");
}

#[tokio::test]
async fn test_target_search() {
    let (status, body) = post_json(
        default_app(),
        "/api/targets/search",
        json!({"target_name": "TOI-700"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_found"], 2);
    assert_eq!(body["search_type"], "name");
    assert_eq!(body["candidates"][0]["name"], "TOI-700 d");
}

#[tokio::test]
async fn test_target_search_counts_before_limit() {
    let planets = (1..=25)
        .map(|i| period_only_candidate(&format!("Kepler-{} b", i), 5.0))
        .collect();
    let state = AppState::new(
        Pipeline::new(seeded_config(17)),
        Arc::new(StaticCatalog::new(planets)),
        Arc::new(test_photometry()),
    );

    let (status, body) = post_json(
        build_router(state),
        "/api/targets/search",
        json!({"target_name": "Kepler"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_found"], 25);
    assert_eq!(body["candidates"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn test_target_search_rejects_blank_name() {
    let (status, body) = post_json(
        default_app(),
        "/api/targets/search",
        json!({"target_name": "  "}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_target_details_found_and_missing() {
    let (status, body) = get(default_app(), "/api/targets/Kepler-22%20b/details").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["details"]["star_radius"], 1.0);

    let (status, body) = get(default_app(), "/api/targets/Nowhere-1%20b/details").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_light_curve_lookup() {
    let (status, body) = get(default_app(), "/api/lightcurves/TOI-700%20d?mission=TESS").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mission"], "TESS");
    assert_eq!(body["light_curve"]["length"], 6);

    let (status, _) = get(default_app(), "/api/lightcurves/TOI-700%20d?mission=Kepler").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_complete_analysis_from_services() {
    let (status, body) = post_json(
        default_app(),
        "/api/analyze/complete",
        json!({"target_name": "TOI-700 d"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["candidate"]["name"], "TOI-700 d");
    assert_eq!(body["transit_analysis"]["period"], 37.42);
    assert_eq!(body["ensemble_predictions"]["decision"], "candidate");
    assert!(body["analysis_id"].is_string());
}

#[tokio::test]
async fn test_complete_analysis_with_inline_data() {
    let (status, body) = post_json(
        default_app(),
        "/api/analyze/complete",
        json!({
            "target_name": "Custom-1",
            "candidate": {"name": "Custom-1 b", "orbital_period": 10.0},
            "light_curve": {
                "time": [0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
                "flux": [1.0, 1.0, 1.0, 0.999, 1.0, 1.0]
            }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["target_name"], "Custom-1 b");
    assert_eq!(body["transit_analysis"]["period"], 10.0);
}

#[tokio::test]
async fn test_complete_analysis_missing_inputs_is_404() {
    let (status, _) = post_json(
        default_app(),
        "/api/analyze/complete",
        json!({"target_name": "Nowhere-1"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // In the catalog but without a stored light curve
    let (status, body) = post_json(
        default_app(),
        "/api/analyze/complete",
        json!({"target_name": "Kepler-22 b"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_transit_analysis_route() {
    let (status, body) = post_json(
        default_app(),
        "/api/analyze/transit",
        json!({
            "target_name": "TEST-6",
            "light_curve": {
                "time": [0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
                "flux": [1.0, 1.0, 1.0, 0.999, 1.0, 1.0]
            },
            "candidate_params": {"orbital_period": 10.0}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["target_name"], "TEST-6");
    assert_eq!(body["transit_analysis"]["period"], 10.0);
    assert_eq!(body["transit_analysis"]["physics_validation"]["overall_confidence"], 0.85);
    assert_eq!(body["degradations"][0]["stage"], "refinement");
}

#[tokio::test]
async fn test_explain_without_advisor_apologizes() {
    let (status, body) = post_json(
        default_app(),
        "/api/explain",
        json!({"question": "What sets the transit depth?", "context": {"candidate_name": "TOI-700 d"}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["confidence"], 0.3);
}

#[tokio::test]
async fn test_explain_with_advisor() {
    let advisor = ScriptedAdvisor::new()
        .with_reply(r#"{"explanation": "Depth is (Rp/Rs)^2.", "confidence": 0.9}"#);
    let app = test_app(Pipeline::new(seeded_config(1)).with_advisor(Arc::new(advisor)));

    let (status, body) = post_json(
        app,
        "/api/explain",
        json!({"message": "What sets the transit depth?", "conversation_history": []}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["explanation"], "Depth is (Rp/Rs)^2.");
    assert_eq!(body["confidence"], 0.9);
}

#[tokio::test]
async fn test_explain_rejects_empty_question() {
    let (status, _) = post_json(default_app(), "/api/explain", json!({"question": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
