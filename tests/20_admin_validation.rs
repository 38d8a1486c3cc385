mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn error_of(resp: reqwest::Response) -> Result<String> {
    let body: Value = resp.json().await?;
    Ok(body["error"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn create_user_rejects_incomplete_payload() -> Result<()> {
    let server = common::spawn_server().await?;

    let resp = server
        .client
        .post(server.url("/api/admin/create-user"))
        .json(&json!({ "email": "someone@example.org" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "Full name, email, password, and user type are required");
    assert!(body["field_errors"]["full_name"].is_string());
    assert!(body["field_errors"]["email"].is_null());
    Ok(())
}

#[tokio::test]
async fn create_user_rejects_unknown_user_type() -> Result<()> {
    let server = common::spawn_server().await?;

    let resp = server
        .client
        .post(server.url("/api/admin/create-user"))
        .json(&json!({
            "full_name": "Amal Haddad",
            "email": "amal@example.org",
            "password": "olive-branch",
            "user_type": "Volunteer"
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Invalid user type");
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() -> Result<()> {
    let server = common::spawn_server().await?;

    let resp = server
        .client
        .post(server.url("/api/admin/create-user"))
        .header("content-type", "application/json")
        .body("{\"full_name\": ")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Invalid JSON body");
    Ok(())
}

#[tokio::test]
async fn saved_source_validation() -> Result<()> {
    let server = common::spawn_server().await?;
    let url = server.url("/api/admin/saved-sources");

    let resp = server.client.post(&url).json(&json!({ "name": "ReliefWeb" })).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Name, URL, and opportunity type are required");

    let resp = server
        .client
        .post(&url)
        .json(&json!({ "name": "ReliefWeb", "url": "https://reliefweb.int/jobs", "opportunity_type": "grant" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Invalid opportunity type. Must be job, funding, or training");

    let resp = server
        .client
        .post(&url)
        .json(&json!({ "name": "ReliefWeb", "url": "reliefweb jobs", "opportunity_type": "job" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Invalid URL format");
    Ok(())
}

#[tokio::test]
async fn deletes_require_an_id() -> Result<()> {
    let server = common::spawn_server().await?;

    for (path, message) in [
        ("/api/admin/evaluation-templates", "Template ID is required"),
        ("/api/admin/process-templates?id=", "Template ID is required"),
        ("/api/admin/ngos", "NGO ID is required"),
    ] {
        let resp = server.client.delete(server.url(path)).send().await?;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", path);
        assert_eq!(error_of(resp).await?, message);
    }
    Ok(())
}

#[tokio::test]
async fn publish_validates_before_touching_templates() -> Result<()> {
    let server = common::spawn_server().await?;
    let url = server.url("/api/admin/templates/publish");

    let resp = server.client.post(&url).json(&json!({ "published": true })).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Template ID and type are required");

    let resp = server
        .client
        .post(&url)
        .json(&json!({ "templateId": "tpl-1", "templateType": "survey", "published": true }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Invalid template type");
    Ok(())
}

#[tokio::test]
async fn extraction_requires_opportunities() -> Result<()> {
    let server = common::spawn_server().await?;

    let resp = server
        .client
        .post(server.url("/api/admin/extract-opportunity"))
        .json(&json!({ "opportunities": [] }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Opportunities array is required");

    let resp = server
        .client
        .patch(server.url("/api/admin/extract-opportunity/42"))
        .json(&json!({ "extraction_status": "completed" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "No valid fields to update");
    Ok(())
}

#[tokio::test]
async fn approval_checks_action_then_caller() -> Result<()> {
    let server = common::spawn_server().await?;
    let url = server.url("/api/admin/ngos/user-1/approval");

    let resp = server.client.patch(&url).json(&json!({ "action": "suspend" })).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Invalid action");

    let resp = server.client.patch(&url).json(&json!({ "action": "approve" })).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_of(resp).await?, "Unauthorized");
    Ok(())
}

#[tokio::test]
async fn ngo_list_requires_a_caller() -> Result<()> {
    let server = common::spawn_server().await?;

    let resp = server.client.get(server.url("/api/admin/ngos")).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = server
        .client
        .get(server.url("/api/admin/ngos"))
        .bearer_auth("not-a-jwt")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
