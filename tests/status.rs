mod support;

#[tokio::test]
async fn status_reports_lobby_before_any_match() {
    let base_url = support::ensure_server();
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{base_url}/status"))
        .send()
        .await
        .expect("request should succeed");

    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = res.json().await.expect("json body");
    assert_eq!(body, serde_json::json!("Lobby"));
}

#[tokio::test]
async fn highscores_route_reports_missing_backend() {
    // No HIGHSCORE_BASE_URL is configured in the test environment.
    let base_url = support::ensure_server();
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{base_url}/highscores"))
        .send()
        .await
        .expect("request should succeed");

    assert_eq!(res.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = res.json().await.expect("json body");
    assert!(body["error"].as_str().unwrap_or("").contains("not configured"));
}
