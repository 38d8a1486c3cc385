mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn approval_status_requires_a_caller() -> Result<()> {
    let server = common::spawn_server().await?;

    let resp = server.client.get(server.url("/api/ngo/approval-status")).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // userId is ignored while SECURITY_ALLOW_USER_ID_PARAM is off
    let resp = server
        .client
        .get(server.url("/api/ngo/approval-status?userId=user-1"))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn mark_launching_shown_needs_a_user_id() -> Result<()> {
    let server = common::spawn_server().await?;
    let url = server.url("/api/ngo/mark-launching-shown");

    let resp = server.client.post(&url).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "Unauthorized - No user ID provided");

    let resp = server
        .client
        .post(&url)
        .bearer_auth("forged.token.value")
        .json(&json!({}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn recent_opportunities_degrade_to_empty() -> Result<()> {
    let server = common::spawn_server().await?;

    let resp = server.client.get(server.url("/api/opportunities/recent")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    assert_eq!(body, json!([]));
    Ok(())
}

#[tokio::test]
async fn public_ngo_listing_reports_failure_with_empty_list() -> Result<()> {
    let server = common::spawn_server().await?;

    let resp = server.client.get(server.url("/api/public/ngos")).send().await?;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await?;
    assert_eq!(body["ngos"], json!([]));
    assert!(body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn application_update_requires_data() -> Result<()> {
    let server = common::spawn_server().await?;

    let resp = server
        .client
        .put(server.url("/api/opportunities/applications/app-1"))
        .json(&json!({}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "Missing application data");
    Ok(())
}
