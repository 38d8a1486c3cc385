// services/ngo.rs - Per-NGO activity counters and profile reshaping

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};

use crate::types::ApprovalStatus;

/// Activity counters shown next to an NGO profile
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NgoCounters {
    pub opportunities_count: usize,
    pub applications_count: usize,
    pub active_opportunities_count: usize,
}

/// Profile columns the admin NGO list returns
pub const ADMIN_LIST_COLUMNS: &[&str] = &[
    "id",
    "user_id",
    "name",
    "email",
    "year_created",
    "legal_rep_name",
    "legal_rep_email",
    "legal_rep_phone",
    "legal_rep_function",
    "profile_image_url",
    "created_at",
    "updated_at",
    "approval_status",
    "admin_notes",
    "approved_at",
    "approved_by",
];

/// Fields an admin may set when creating a profile directly
pub const CREATE_FIELDS: &[&str] = &[
    "name",
    "email",
    "year_created",
    "legal_rep_name",
    "legal_rep_email",
    "legal_rep_phone",
    "legal_rep_function",
    "profile_image_url",
    "user_id",
];

fn key(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Counters for the NGO user `user_id`.
///
/// `descriptions` are `opportunity_description` rows carrying `user_id`,
/// `opportunity_id` and `status`; `applications` are application rows
/// carrying `opportunity_id`. Rows belonging to other users are ignored, so
/// both slices may cover a whole batch of NGOs.
pub fn ngo_counters(user_id: &str, descriptions: &[Value], applications: &[Value]) -> NgoCounters {
    let own: Vec<&Value> = descriptions
        .iter()
        .filter(|d| key(d.get("user_id")).as_deref() == Some(user_id))
        .collect();

    let opportunity_ids: HashSet<String> = own.iter().filter_map(|d| key(d.get("opportunity_id"))).collect();
    let active = own
        .iter()
        .filter(|d| matches!(d.get("status").and_then(Value::as_str), Some("published" | "active")))
        .count();
    let applications_count = applications
        .iter()
        .filter(|a| key(a.get("opportunity_id")).map_or(false, |id| opportunity_ids.contains(&id)))
        .count();

    NgoCounters {
        opportunities_count: opportunity_ids.len(),
        applications_count,
        active_opportunities_count: active,
    }
}

/// Merges counters into a profile object and defaults a missing approval
/// status to `pending`
pub fn with_counters(mut profile: Value, counters: NgoCounters) -> Value {
    if let Value::Object(obj) = &mut profile {
        if obj.get("approval_status").map_or(true, Value::is_null) {
            obj.insert("approval_status".into(), json!(ApprovalStatus::Pending.as_str()));
        }
        obj.insert("opportunities_count".into(), json!(counters.opportunities_count));
        obj.insert("applications_count".into(), json!(counters.applications_count));
        obj.insert("active_opportunities_count".into(), json!(counters.active_opportunities_count));
    }
    profile
}

/// Row for a profile created from an admin request body; unknown keys are
/// dropped
pub fn new_profile_record(body: &Value) -> Map<String, Value> {
    CREATE_FIELDS
        .iter()
        .map(|field| (field.to_string(), body.get(*field).cloned().unwrap_or(Value::Null)))
        .collect()
}

/// Public listing entry for one published opportunity
pub fn public_opportunity(row: &Value) -> Value {
    let title = match row.get("title") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => "Untitled Opportunity".to_string(),
    };
    json!({
        "id": row.get("id").cloned().unwrap_or(Value::Null),
        "title": title,
        "type": row.get("opportunity_type").cloned().unwrap_or(Value::Null),
        "created_at": row.get("created_at").cloned().unwrap_or(Value::Null),
    })
}

/// Rows behind the NGO applications view
#[derive(Debug, Default)]
pub struct ApplicationRows {
    /// The NGO's published `opportunity_description` rows
    pub descriptions: Vec<Value>,
    /// `opportunities` rows for those descriptions, newest first
    pub opportunities: Vec<Value>,
    /// Applications to those opportunities, newest first
    pub applications: Vec<Value>,
    /// `forms_templates` rows referenced by the applications
    pub forms: Vec<Value>,
    /// `users` rows of the applicants
    pub seekers: Vec<Value>,
}

fn index_by(rows: &[Value], field: &str) -> HashMap<String, Value> {
    let mut index = HashMap::new();
    for row in rows {
        if let Some(k) = key(row.get(field)) {
            index.entry(k).or_insert_with(|| row.clone());
        }
    }
    index
}

/// One entry per opportunity with its applications, each application
/// carrying its form (`forms_templates`) and applicant (`seeker_profile`)
pub fn group_applications(rows: &ApplicationRows) -> Vec<Value> {
    let descriptions = index_by(&rows.descriptions, "opportunity_id");
    let forms = index_by(&rows.forms, "id");
    let seekers = index_by(&rows.seekers, "id");

    rows.opportunities
        .iter()
        .map(|opportunity| {
            let id = key(opportunity.get("id"));
            let applications: Vec<Value> = rows
                .applications
                .iter()
                .filter(|app| id.is_some() && key(app.get("opportunity_id")) == id)
                .map(|app| {
                    let mut app = app.clone();
                    let form = key(app.get("form_id")).and_then(|f| forms.get(&f).cloned());
                    let seeker = key(app.get("seeker_user_id")).and_then(|s| seekers.get(&s).cloned());
                    if let Value::Object(map) = &mut app {
                        map.insert("forms_templates".into(), form.unwrap_or(Value::Null));
                        map.insert("seeker_profile".into(), seeker.unwrap_or(Value::Null));
                    }
                    app
                })
                .collect();

            let description = id.as_ref().and_then(|id| descriptions.get(id));
            let from_description = |field: &str| {
                description
                    .and_then(|d| d.get(field))
                    .filter(|v| v.as_str().map_or(!v.is_null(), |s| !s.is_empty()))
                    .cloned()
            };
            let field = |field: &str| opportunity.get(field).cloned().unwrap_or(Value::Null);
            json!({
                "opportunity_id": field("id"),
                "title": from_description("title").unwrap_or_else(|| field("title")),
                "description": from_description("description").unwrap_or_else(|| json!("")),
                "location": from_description("location").unwrap_or_else(|| json!("")),
                "created_at": from_description("created_at").unwrap_or_else(|| field("created_at")),
                "opportunities": {
                    "id": field("id"),
                    "title": field("title"),
                    "opportunity_type": field("opportunity_type"),
                    "created_at": field("created_at"),
                },
                "application_count": applications.len(),
                "applications": applications,
            })
        })
        .collect()
}

pub const DEFAULT_TEAM_ROLE: &str = "member";
pub const DEFAULT_TEAM_STATUS: &str = "active";

/// Team list entry for an `ngo_users` row
pub fn team_member_view(row: &Value) -> Value {
    let field = |name: &str| row.get(name).filter(|v| !v.is_null()).cloned();
    json!({
        "id": field("user_id").or_else(|| field("id")),
        "full_name": field("full_name"),
        "email": field("email"),
        "role": field("role").unwrap_or_else(|| json!(DEFAULT_TEAM_ROLE)),
        "status": field("status").unwrap_or_else(|| json!(DEFAULT_TEAM_STATUS)),
        "created_at": field("created_at"),
        "created_by": field("created_by"),
    })
}

/// Auto-approved `ngo_profile` row for a team member account created by
/// the NGO user `approver`
pub fn team_profile_record(user_id: &Value, email: &str, approver: &str, now: DateTime<Utc>) -> Map<String, Value> {
    const NOT_SPECIFIED: &str = "Not specified";
    let mut record = Map::new();
    record.insert("user_id".into(), user_id.clone());
    record.insert("name".into(), json!("Team Member"));
    record.insert("email".into(), json!(email));
    record.insert("year_created".into(), json!(now.year().to_string()));
    record.insert("legal_rep_name".into(), json!(NOT_SPECIFIED));
    record.insert("legal_rep_email".into(), json!(email));
    record.insert("legal_rep_phone".into(), json!(NOT_SPECIFIED));
    record.insert("legal_rep_function".into(), json!(NOT_SPECIFIED));
    record.insert("approval_status".into(), json!(ApprovalStatus::Approved.as_str()));
    record.insert("approved_at".into(), json!(now.to_rfc3339()));
    record.insert("approved_by".into(), json!(approver));
    record
}
