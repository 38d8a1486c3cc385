use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::deserialize_timestamp;

/// `opportunity_applications (status, submitted_at)`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationRow {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// `forms_templates (published, status, created_at)`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormRow {
    #[serde(default)]
    pub published: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserTypeRow {
    #[serde(default)]
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CvOwnerRow {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// An opportunity joined to its first description
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpportunityStatsRow {
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description_status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub description_created_at: Option<DateTime<Utc>>,
}
