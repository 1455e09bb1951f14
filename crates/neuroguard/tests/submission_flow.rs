//! End-to-end submissions through the public router, with the text generation
//! backend stubbed over HTTP.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use mockito::Matcher;
use serde_json::Value;
use tower::ServiceExt;

use neuroguard::config::AdvisorConfig;
use neuroguard::prediction::{ForestParams, Predictor};
use neuroguard::submissions::{
    submission_router, SqliteSubmissionRepository, SubmissionRepository, SubmissionService,
};
use neuroguard::wellness::WellnessAdvisor;

const FORM: &str = r#"{"sleep_duration": 6, "screen": 300, "activity": 20, "hours": 21,
    "weekday": 3, "sunlight": 1, "safety": 60, "goals": 30}"#;

fn bundled_dataset() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/generated_sample_data.json")
}

fn gemini_reply(text: &str) -> String {
    serde_json::json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    })
    .to_string()
}

async fn post_form(router: axum::Router) -> (StatusCode, Value) {
    let request = Request::post("/api/v1/submissions")
        .header("content-type", "application/json")
        .body(Body::from(FORM))
        .expect("request");
    let response = router.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).expect("json"))
}

#[tokio::test]
async fn online_advice_is_stored_and_fed_back_as_history() {
    let mut gemini = mockito::Server::new_async().await;
    let suggestion_mock = gemini
        .mock("POST", Matcher::Regex("generateContent".to_string()))
        // Prompt without a history section ends right after the goal line.
        .match_body(Matcher::Regex(r#"Daily goal progress: \d+/100\\n""#.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_reply("1) Rest.\n2) Walk.\n3) Read."))
        .expect(1)
        .create_async()
        .await;
    let summary_mock = gemini
        .mock("POST", Matcher::Regex("generateContent".to_string()))
        .match_body(Matcher::Regex("Summarise the following".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_reply("Rest, walk and read."))
        .expect(2)
        .create_async()
        .await;
    let history_mock = gemini
        .mock("POST", Matcher::Regex("generateContent".to_string()))
        .match_body(Matcher::Regex(
            r"User history \(previous advice\):\\n- Rest, walk and read\.".to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_reply("1) Rest.\n2) Walk.\n3) Read."))
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let params = ForestParams {
        n_trees: 24,
        ..ForestParams::default()
    };
    let predictor = Predictor::with_params(dir.path().join("model.bin"), bundled_dataset(), params);
    let repository = Arc::new(
        SqliteSubmissionRepository::open(dir.path().join("User_Data.db")).expect("database"),
    );
    let advisor = WellnessAdvisor::from_config(&AdvisorConfig {
        api_key: Some("integration-key".to_string()),
        model: "models/gemini-2.5-flash".to_string(),
        base_url: gemini.url(),
        timeout: Duration::from_secs(5),
    });
    assert!(advisor.is_online());

    let service = Arc::new(SubmissionService::new(
        Arc::new(predictor),
        Arc::clone(&repository),
        advisor,
    ));
    let router = submission_router(service);

    let (status, first) = post_form(router.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["advice_source"], "gemini");
    assert_eq!(first["suggestion"], "1) Rest.\n2) Walk.\n3) Read.");

    let (status, second) = post_form(router).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["mental_state"], first["mental_state"]);

    assert_eq!(
        repository.history().expect("history"),
        vec!["Rest, walk and read.".to_string(); 2]
    );

    suggestion_mock.assert_async().await;
    summary_mock.assert_async().await;
    history_mock.assert_async().await;
}
