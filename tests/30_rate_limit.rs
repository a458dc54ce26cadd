mod common;

use std::time::Duration;

use anyhow::Result;
use axum::Router;
use reqwest::StatusCode;

#[tokio::test]
async fn budget_exhaustion_yields_429_with_retry_hint() -> Result<()> {
    let limiter = common::small_limiter(2, 60_000);
    let server =
        common::serve_with(Router::new(), common::permissive_policy(), Some(limiter)).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/health", server.base_url);

    assert_eq!(client.get(&url).send().await?.status(), StatusCode::OK);
    assert_eq!(client.get(&url).send().await?.status(), StatusCode::OK);

    let res = client.get(&url).send().await?;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    // Blocked responses still carry the security headers and correlation id
    assert_eq!(
        res.headers()
            .get("x-content-type-options")
            .and_then(|v| v.to_str().ok()),
        Some("nosniff")
    );
    assert!(res.headers().contains_key("x-request-id"));

    let body: serde_json::Value = res.json().await?;
    assert_eq!(body["error"], "RATE_LIMIT_EXCEEDED");
    assert!(body["retry_after"].is_u64());
    assert!(body["retry_after"].as_u64().unwrap() >= 1);
    assert!(body["request_id"].is_string());
    Ok(())
}

#[tokio::test]
async fn budget_resets_when_the_window_rolls_over() -> Result<()> {
    let limiter = common::small_limiter(1, 500);
    let server =
        common::serve_with(Router::new(), common::permissive_policy(), Some(limiter)).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/health", server.base_url);

    assert_eq!(client.get(&url).send().await?.status(), StatusCode::OK);
    assert_eq!(
        client.get(&url).send().await?.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(client.get(&url).send().await?.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn budgets_are_per_client_address() -> Result<()> {
    let limiter = common::small_limiter(1, 60_000);
    let server =
        common::serve_with(Router::new(), common::permissive_policy(), Some(limiter)).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/health", server.base_url);

    // Forwarded addresses key separate budgets
    let send = |ip: &'static str| {
        let client = client.clone();
        let url = url.clone();
        async move {
            client
                .get(&url)
                .header("x-forwarded-for", ip)
                .send()
                .await
        }
    };

    assert_eq!(send("203.0.113.7").await?.status(), StatusCode::OK);
    assert_eq!(
        send("203.0.113.7").await?.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(send("203.0.113.8").await?.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn no_limiter_means_no_throttling() -> Result<()> {
    let server = common::serve_with(Router::new(), common::permissive_policy(), None).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/health", server.base_url);

    for _ in 0..20 {
        assert_eq!(client.get(&url).send().await?.status(), StatusCode::OK);
    }
    Ok(())
}
