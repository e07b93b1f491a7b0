mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn unmatched_path_gets_canonical_404() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/no/such/namespace", server.base_url))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["reason"], "Endpoint not found.");
    Ok(())
}

#[tokio::test]
async fn malformed_json_body_is_rejected_before_handlers() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/users", server.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn media_creation_requires_a_session() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    // No token at all
    let res = client
        .post(format!("{}/media", server.base_url))
        .json(&json!({ "title": "Solaris" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // A token the store never issued resolves to no session
    let res = client
        .post(format!("{}/media", server.base_url))
        .header("authorization", "Bearer not-a-real-token")
        .json(&json!({ "title": "Solaris" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], false);
    assert!(body.get("reason").is_some());
    Ok(())
}

#[tokio::test]
async fn wrong_method_on_session_namespace_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/login", server.base_url))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["reason"], "Invalid session endpoint.");
    Ok(())
}

#[tokio::test]
async fn logout_without_session_is_unauthorized() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/logout", server.base_url))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
