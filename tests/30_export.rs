mod common;

use anyhow::Result;
use reqwest::{header, StatusCode};
use serde_json::{json, Value};

#[tokio::test]
async fn export_renders_rows_as_csv() -> Result<()> {
    let server = common::spawn_server().await?;

    let resp = server
        .client
        .post(server.url("/api/export/xlsx"))
        .json(&json!({
            "filename": "applications.xlsx",
            "data": [
                { "name": "Olive Aid", "city": "Gaza, Rimal", "jobs": 3 },
                { "name": "Sunbird", "city": null, "jobs": 0 }
            ]
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"applications.xlsx\""
    );

    let body = resp.text().await?;
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines, vec!["name,city,jobs", "Olive Aid,\"Gaza, Rimal\",3", "Sunbird,,0"]);
    Ok(())
}

#[tokio::test]
async fn export_falls_back_to_default_filename() -> Result<()> {
    let server = common::spawn_server().await?;

    let resp = server
        .client
        .post(server.url("/api/export/xlsx"))
        .json(&json!({ "data": [{ "id": 1 }] }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_DISPOSITION], "attachment; filename=\"export.xlsx\"");
    Ok(())
}

#[tokio::test]
async fn export_without_rows_is_rejected() -> Result<()> {
    let server = common::spawn_server().await?;

    for payload in [json!({}), json!({ "data": [] }), json!({ "data": "rows" })] {
        let resp = server.client.post(server.url("/api/export/xlsx")).json(&payload).send().await?;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await?;
        assert_eq!(body["error"], "No data provided");
    }
    Ok(())
}
