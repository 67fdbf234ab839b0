// tests/api_tests.rs

use std::sync::Arc;

use mastery_tracker::{
    models::subject::Subject,
    routes,
    services::MasteryTracker,
    state::AppState,
    store::{MemoryProgressStore, MemorySubjectResolver},
};

const SUBJECT_ID: i64 = 42;
const SUBJECT_CODE: &str = "MA3251";
const SUBJECT_TITLE: &str = "Linear Algebra";

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // 1. In-memory stores with one known subject
    let subjects = MemorySubjectResolver::new();
    subjects
        .insert(Subject {
            id: SUBJECT_ID,
            subject_code: SUBJECT_CODE.to_string(),
            title: SUBJECT_TITLE.to_string(),
        })
        .await;
    let tracker = MasteryTracker::new(Arc::new(MemoryProgressStore::new()), Arc::new(subjects));

    // 2. Create the router with the app state
    let state = AppState { tracker };
    let app = routes::create_router(state);

    // 3. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 4. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn submit(
    client: &reqwest::Client,
    address: &str,
    user_id: i64,
    body: serde_json::Value,
) -> reqwest::Response {
    client
        .post(&format!("{}/api/users/{}/progress/calculate", address, user_id))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn health_check_works() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/api/health", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn unknown_path_is_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn calculate_returns_updated_record() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = submit(
        &client,
        &address,
        1,
        serde_json::json!({
            "subject_id": SUBJECT_ID,
            "topic": "Loops",
            "results": [true, true, true]
        }),
    )
    .await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let record: serde_json::Value = response.json().await.unwrap();
    assert_eq!(record["total_questions"], 3);
    assert_eq!(record["correct_questions"], 3);
    assert_eq!(record["recent_attempts"], serde_json::json!([true, true, true]));
    assert_eq!(record["current_difficulty"], "hard");
    assert!((record["mastery_score"].as_f64().unwrap() - 1.0).abs() < 1e-9);
    assert!(record["last_practiced"].is_string());
}

#[tokio::test]
async fn subject_code_submission_then_topic_lookup() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = submit(
        &client,
        &address,
        7,
        serde_json::json!({
            "subject_code": SUBJECT_CODE,
            "topic": "Vector Spaces",
            "results": [false, false, false, false]
        }),
    )
    .await;
    assert_eq!(response.status().as_u16(), 200);

    // Topic names travel percent-encoded in the path
    let topic = client
        .get(&format!(
            "{}/api/users/7/progress/topic/{}/Vector%20Spaces",
            address, SUBJECT_ID
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(topic.status().as_u16(), 200);
    let record: serde_json::Value = topic.json().await.unwrap();
    assert_eq!(record["subject_id"], SUBJECT_ID);
    assert_eq!(record["topic"], "Vector Spaces");
    assert_eq!(record["current_difficulty"], "easy");
}

#[tokio::test]
async fn unknown_subject_code_is_404_and_writes_nothing() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = submit(
        &client,
        &address,
        1,
        serde_json::json!({
            "subject_code": "CS0000",
            "topic": "Loops",
            "results": [true]
        }),
    )
    .await;
    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("CS0000"));

    let list: Vec<serde_json::Value> = client
        .get(&format!("{}/api/users/1/progress/subject/{}", address, SUBJECT_ID))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
async fn unknown_subject_id_is_404_and_writes_nothing() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = submit(
        &client,
        &address,
        1,
        serde_json::json!({ "subject_id": 999, "topic": "Loops", "results": [true] }),
    )
    .await;
    assert_eq!(response.status().as_u16(), 404);

    let list: Vec<serde_json::Value> = client
        .get(&format!("{}/api/users/1/progress/subject/999", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
async fn never_practiced_topic_is_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/api/users/1/progress/topic/{}/Loops", address, SUBJECT_ID))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn malformed_submissions_are_400() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let bad_bodies = [
        // blank topic
        serde_json::json!({ "subject_id": SUBJECT_ID, "topic": "  ", "results": [true] }),
        // non-boolean results
        serde_json::json!({ "subject_id": SUBJECT_ID, "topic": "Loops", "results": [1, 0] }),
        // missing results
        serde_json::json!({ "subject_id": SUBJECT_ID, "topic": "Loops" }),
        // both subject references
        serde_json::json!({
            "subject_id": SUBJECT_ID,
            "subject_code": SUBJECT_CODE,
            "topic": "Loops",
            "results": [true]
        }),
        // no subject reference
        serde_json::json!({ "topic": "Loops", "results": [true] }),
    ];

    for body in bad_bodies {
        let response = submit(&client, &address, 1, body.clone()).await;
        assert_eq!(response.status().as_u16(), 400, "body: {}", body);
    }

    // non-positive user id
    let response = submit(
        &client,
        &address,
        0,
        serde_json::json!({ "subject_id": SUBJECT_ID, "topic": "Loops", "results": [true] }),
    )
    .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn subject_listing_and_summary() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    for (topic, results) in [
        ("Trees", serde_json::json!([true, true, true, true])),
        ("Graphs", serde_json::json!([false, false, true])),
    ] {
        let response = submit(
            &client,
            &address,
            3,
            serde_json::json!({ "subject_id": SUBJECT_ID, "topic": topic, "results": results }),
        )
        .await;
        assert_eq!(response.status().as_u16(), 200);
    }

    // Another user's progress stays out of the listing
    submit(
        &client,
        &address,
        4,
        serde_json::json!({ "subject_id": SUBJECT_ID, "topic": "Heaps", "results": [true] }),
    )
    .await;

    let list: Vec<serde_json::Value> = client
        .get(&format!("{}/api/users/3/progress/subject/{}", address, SUBJECT_ID))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let topics: Vec<&str> = list.iter().map(|r| r["topic"].as_str().unwrap()).collect();
    assert_eq!(topics, vec!["Graphs", "Trees"]);
    for entry in &list {
        assert_eq!(entry["subject_id"], SUBJECT_ID);
        assert_eq!(entry["subject"]["id"], SUBJECT_ID);
        assert_eq!(entry["subject"]["subject_code"], SUBJECT_CODE);
        assert_eq!(entry["subject"]["title"], SUBJECT_TITLE);
    }

    let summary: serde_json::Value = client
        .get(&format!(
            "{}/api/users/3/progress/subject/{}/summary",
            address, SUBJECT_ID
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["topics_practiced"], 2);
    assert_eq!(summary["total_questions"], 7);
    assert_eq!(summary["correct_questions"], 5);
    assert_eq!(summary["recommended_topic"]["topic"], "Graphs");
    assert_eq!(summary["recommended_topic"]["difficulty"], "easy");
}

#[tokio::test]
async fn window_slides_across_submissions() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let body = |results: serde_json::Value| {
        serde_json::json!({ "subject_id": SUBJECT_ID, "topic": "Loops", "results": results })
    };

    submit(&client, &address, 5, body(serde_json::Value::from(vec![true; 10]))).await;
    let record: serde_json::Value = submit(&client, &address, 5, body(serde_json::json!([false])))
        .await
        .json()
        .await
        .unwrap();

    let window = record["recent_attempts"].as_array().unwrap();
    assert_eq!(window.len(), 10);
    assert_eq!(window[9], false);
    assert_eq!(record["total_questions"], 11);
    assert_eq!(record["correct_questions"], 10);
    assert!((record["recent_accuracy"].as_f64().unwrap() - 0.9).abs() < 1e-9);
    assert_eq!(record["current_difficulty"], "hard");
}
