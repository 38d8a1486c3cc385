mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn error_of(resp: reqwest::Response) -> Result<String> {
    let body: Value = resp.json().await?;
    Ok(body["error"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn applications_need_ids_and_a_seeker() -> Result<()> {
    let server = common::spawn_server().await?;
    let url = server.url("/api/opportunities/applications");

    let resp = server
        .client
        .post(&url)
        .json(&json!({"opportunityId": "o-1", "seekerUserId": "u-1"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Missing required fields");

    let resp = server.client.get(&url).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Missing seekerUserId parameter");
    Ok(())
}

#[tokio::test]
async fn scraped_opportunity_input_is_checked() -> Result<()> {
    let server = common::spawn_server().await?;
    let bulk = server.url("/api/admin/scraped-opportunities/bulk");

    let resp = server
        .client
        .post(&bulk)
        .json(&json!({"opportunities": [{"title": "Field officer"}], "opportunity_type": "volunteering"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Valid opportunity_type is required (job, funding, training)");

    let resp = server.client.delete(&bulk).json(&json!({"ids": []})).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "IDs array is required");

    let resp = server
        .client
        .patch(server.url("/api/admin/scraped-opportunities"))
        .json(&json!({"id": "s-1", "status": "deleted"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Invalid status");
    Ok(())
}

#[tokio::test]
async fn ngo_templates_and_evaluations_validate_bodies() -> Result<()> {
    let server = common::spawn_server().await?;

    let resp = server
        .client
        .post(server.url("/api/offres-templates"))
        .json(&json!({"description": "No title"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Template title is required");

    let resp = server
        .client
        .patch(server.url("/api/offres-templates"))
        .json(&json!({"title": "Offer"}))
        .send()
        .await?;
    assert_eq!(error_of(resp).await?, "Template ID is required");

    let resp = server
        .client
        .post(server.url("/api/evaluations"))
        .json(&json!({"name": "Interview grid"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Name and criteria are required");

    let resp = server.client.get(server.url("/api/evaluations/applications")).send().await?;
    assert_eq!(error_of(resp).await?, "Application ID is required");

    let resp = server
        .client
        .post(server.url("/api/opportunities/o-1/evaluation"))
        .json(&json!({}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "evaluationId is required");
    Ok(())
}

#[tokio::test]
async fn ngo_team_and_applications_need_a_caller() -> Result<()> {
    let server = common::spawn_server().await?;

    let resp = server.client.get(server.url("/api/ngo/team")).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // x-user-id is ignored while SECURITY_ALLOW_USER_ID_PARAM is off
    let resp = server
        .client
        .post(server.url("/api/ngo/team"))
        .header("x-user-id", "owner-1")
        .json(&json!({"full_name": "Karim", "email": "k@olive.org", "password": "pw"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = server.client.get(server.url("/api/ngo/applications")).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_of(resp).await?, "Unauthorized - No user ID provided");

    let resp = server
        .client
        .put(server.url("/api/ngo/applications"))
        .json(&json!({"applicationId": "a-1"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Missing required fields");
    Ok(())
}

#[tokio::test]
async fn seeker_profile_needs_a_user() -> Result<()> {
    let server = common::spawn_server().await?;
    let url = server.url("/api/seeker/profile");

    let resp = server.client.get(&url).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "Missing user ID");
    assert!(body["profile"].is_null());

    let resp = server.client.post(&url).json(&json!({"userId": "u-1"})).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await?, "Missing user ID or profile data");
    Ok(())
}
