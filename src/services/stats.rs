// services/stats.rs - Dashboard aggregation over rows already fetched
//
// Every function takes `now` so windows are deterministic under test.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::database::models::parse_timestamp;
use crate::database::models::stats::{ApplicationRow, CvOwnerRow, FormRow, OpportunityStatsRow, UserTypeRow};
use crate::types::{OpportunityType, UserType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplicationStats {
    pub total_applications: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub other: usize,
    pub this_week: usize,
    pub last_week: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormsStats {
    pub total_forms: usize,
    pub published_forms: usize,
    pub draft_forms: usize,
    pub recent_forms: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total_users: usize,
    pub ngo_users: usize,
    pub seeker_users: usize,
    pub ngo_profiles: usize,
    pub users_with_cvs: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpportunityStats {
    pub total_opportunities: usize,
    pub active_opportunities: usize,
    pub this_month: usize,
    pub last_month: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub jobs_count: usize,
    pub fundings_count: usize,
    pub trainings_count: usize,
    pub total_opportunities: usize,
}

/// `start <= ts < end`, where a missing timestamp is never inside
fn within(ts: Option<DateTime<Utc>>, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> bool {
    match ts {
        Some(ts) => ts >= start && end.map_or(true, |end| ts < end),
        None => false,
    }
}

pub fn application_stats(rows: &[ApplicationRow], now: DateTime<Utc>) -> ApplicationStats {
    let one_week_ago = now - Duration::days(7);
    let two_weeks_ago = now - Duration::days(14);

    let mut stats = ApplicationStats { total_applications: rows.len(), ..Default::default() };
    for row in rows {
        match row.status.as_deref() {
            Some("submitted") => stats.pending += 1,
            Some("approved") => stats.approved += 1,
            Some("rejected") => stats.rejected += 1,
            _ => stats.other += 1,
        }
        if within(row.submitted_at, one_week_ago, None) {
            stats.this_week += 1;
        } else if within(row.submitted_at, two_weeks_ago, Some(one_week_ago)) {
            stats.last_week += 1;
        }
    }
    stats
}

pub fn forms_stats(rows: &[FormRow], now: DateTime<Utc>) -> FormsStats {
    let one_month_ago = now - Duration::days(30);
    FormsStats {
        total_forms: rows.len(),
        published_forms: rows.iter().filter(|f| f.published == Some(true)).count(),
        draft_forms: rows.iter().filter(|f| f.status.as_deref() == Some("draft")).count(),
        recent_forms: rows.iter().filter(|f| within(f.created_at, one_month_ago, None)).count(),
    }
}

pub fn user_stats(users: &[UserTypeRow], ngo_profiles: usize, cv_owners: &[CvOwnerRow]) -> UserStats {
    let types: Vec<Option<UserType>> = users
        .iter()
        .map(|u| u.user_type.as_deref().and_then(|t| t.parse().ok()))
        .collect();
    let distinct_owners: HashSet<&str> = cv_owners.iter().filter_map(|cv| cv.user_id.as_deref()).collect();

    UserStats {
        total_users: users.len(),
        ngo_users: types.iter().filter(|t| t.map_or(false, |t| t.is_ngo())).count(),
        seeker_users: types.iter().filter(|t| **t == Some(UserType::Personne)).count(),
        ngo_profiles,
        users_with_cvs: distinct_owners.len(),
    }
}

pub fn opportunity_stats(rows: &[OpportunityStatsRow], now: DateTime<Utc>) -> OpportunityStats {
    let one_month_ago = now - Duration::days(30);
    let two_months_ago = now - Duration::days(60);

    let mut stats = OpportunityStats { total_opportunities: rows.len(), ..Default::default() };
    for row in rows {
        if row.description_status.as_deref() == Some("published") {
            stats.active_opportunities += 1;
        }
        let created = row.description_created_at.or(row.created_at);
        if within(created, one_month_ago, None) {
            stats.this_month += 1;
        } else if within(created, two_months_ago, Some(one_month_ago)) {
            stats.last_month += 1;
        }
    }
    stats
}

pub fn type_counts<'a>(types: impl IntoIterator<Item = Option<&'a str>>) -> TypeCounts {
    let mut counts = TypeCounts::default();
    for ty in types {
        counts.total_opportunities += 1;
        match ty.and_then(|t| t.parse::<OpportunityType>().ok()) {
            Some(OpportunityType::Job) => counts.jobs_count += 1,
            Some(OpportunityType::Funding) => counts.fundings_count += 1,
            Some(OpportunityType::Training) => counts.trainings_count += 1,
            None => {}
        }
    }
    counts
}

/// A recent application with its opportunity title and applicant name resolved
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecentApplication {
    pub id: String,
    pub status: Option<String>,
    pub submitted_at: Option<String>,
    pub opportunity_title: Option<String>,
    pub applicant_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecentDescription {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityItem {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub title: String,
    pub description: String,
    pub timestamp: Option<String>,
    pub status: Option<String>,
}

pub const MAX_ACTIVITIES: usize = 10;

pub fn recent_activities(applications: Vec<RecentApplication>, descriptions: Vec<RecentDescription>) -> Vec<ActivityItem> {
    let mut items: Vec<ActivityItem> = applications
        .into_iter()
        .map(|app| ActivityItem {
            kind: "application",
            id: app.id,
            title: format!(
                "New application for \"{}\"",
                app.opportunity_title.as_deref().unwrap_or("Unknown Opportunity")
            ),
            description: format!(
                "Application submitted by {}",
                app.applicant_name.as_deref().unwrap_or("Unknown User")
            ),
            timestamp: app.submitted_at,
            status: app.status,
        })
        .chain(descriptions.into_iter().map(|desc| ActivityItem {
            kind: "opportunity",
            id: desc.id,
            title: format!("Opportunity \"{}\" created", desc.title.as_deref().unwrap_or("Untitled Opportunity")),
            description: match desc.description.as_deref() {
                Some(text) if !text.is_empty() => format!("{}...", text.chars().take(100).collect::<String>()),
                _ => "No description available".to_string(),
            },
            timestamp: desc.created_at,
            status: desc.status,
        }))
        .collect();

    // Newest first; undated items sink to the end
    items.sort_by(|a, b| {
        let a_ts = a.timestamp.as_deref().and_then(parse_timestamp);
        let b_ts = b.timestamp.as_deref().and_then(parse_timestamp);
        b_ts.cmp(&a_ts)
    });
    items.truncate(MAX_ACTIVITIES);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    fn app(status: &str, days_ago: Option<i64>) -> ApplicationRow {
        ApplicationRow {
            status: Some(status.to_string()),
            submitted_at: days_ago.map(|d| now() - Duration::days(d)),
        }
    }

    #[test]
    fn application_buckets_partition_total() {
        let rows = vec![
            app("submitted", Some(1)),
            app("approved", Some(8)),
            app("rejected", Some(20)),
            app("reviewing", None),
            app("submitted", Some(7)),
        ];
        let stats = application_stats(&rows, now());
        assert_eq!(stats.total_applications, 5);
        assert_eq!((stats.pending, stats.approved, stats.rejected, stats.other), (2, 1, 1, 1));
        assert_eq!(stats.pending + stats.approved + stats.rejected + stats.other, stats.total_applications);
        // exactly seven days ago is still this week
        assert_eq!(stats.this_week, 2);
        assert_eq!(stats.last_week, 1);
    }

    #[test]
    fn empty_inputs_give_zeroes() {
        assert_eq!(application_stats(&[], now()), ApplicationStats::default());
        assert_eq!(forms_stats(&[], now()), FormsStats::default());
        assert_eq!(opportunity_stats(&[], now()), OpportunityStats::default());
    }

    #[test]
    fn forms_counts() {
        let rows = vec![
            FormRow { published: Some(true), status: Some("published".into()), created_at: Some(now() - Duration::days(2)) },
            FormRow { published: Some(false), status: Some("draft".into()), created_at: Some(now() - Duration::days(45)) },
            FormRow { published: None, status: None, created_at: None },
        ];
        let stats = forms_stats(&rows, now());
        assert_eq!(stats, FormsStats { total_forms: 3, published_forms: 1, draft_forms: 1, recent_forms: 1 });
    }

    #[test]
    fn user_counts_distinct_cv_owners() {
        let users: Vec<UserTypeRow> = ["NGO", "admin_ngo", "Personne", "Personne", "Admin", "assistant_ngo"]
            .iter()
            .map(|t| UserTypeRow { user_type: Some(t.to_string()) })
            .collect();
        let owners = vec![
            CvOwnerRow { user_id: Some("a".into()) },
            CvOwnerRow { user_id: Some("a".into()) },
            CvOwnerRow { user_id: Some("b".into()) },
            CvOwnerRow { user_id: None },
        ];
        let stats = user_stats(&users, 4, &owners);
        assert_eq!(stats.total_users, 6);
        assert_eq!(stats.ngo_users, 3);
        assert_eq!(stats.seeker_users, 2);
        assert_eq!(stats.ngo_profiles, 4);
        assert_eq!(stats.users_with_cvs, 2);
    }

    #[test]
    fn opportunity_windows_prefer_description_timestamp() {
        let rows = vec![
            OpportunityStatsRow {
                created_at: Some(now() - Duration::days(90)),
                description_status: Some("published".into()),
                description_created_at: Some(now() - Duration::days(3)),
            },
            OpportunityStatsRow {
                created_at: Some(now() - Duration::days(40)),
                description_status: Some("draft".into()),
                description_created_at: None,
            },
            OpportunityStatsRow { created_at: Some(now() - Duration::days(61)), ..Default::default() },
        ];
        let stats = opportunity_stats(&rows, now());
        assert_eq!(stats.total_opportunities, 3);
        assert_eq!(stats.active_opportunities, 1);
        assert_eq!(stats.this_month, 1);
        assert_eq!(stats.last_month, 1);
    }

    #[test]
    fn type_counts_ignore_unknown_types() {
        let counts = type_counts(vec![Some("job"), Some("job"), Some("funding"), Some("volunteer"), None]);
        assert_eq!(counts, TypeCounts { jobs_count: 2, fundings_count: 1, trainings_count: 0, total_opportunities: 5 });
    }

    #[test]
    fn activities_are_merged_sorted_and_capped() {
        let applications: Vec<RecentApplication> = (0..5)
            .map(|i| RecentApplication {
                id: format!("app-{i}"),
                status: Some("submitted".into()),
                submitted_at: Some(format!("2024-06-{:02}T10:00:00+00:00", 10 + i * 2)),
                opportunity_title: if i == 0 { None } else { Some("Field Officer".into()) },
                applicant_name: if i == 0 { None } else { Some("Nadia".into()) },
            })
            .collect();
        let descriptions: Vec<RecentDescription> = (0..6)
            .map(|i| RecentDescription {
                id: format!("opp-{i}"),
                title: Some(format!("Grant {i}")),
                description: if i == 0 { None } else { Some("x".repeat(150)) },
                created_at: Some(format!("2024-06-{:02}T09:00:00", 11 + i * 2)),
                status: Some("published".into()),
            })
            .collect();

        let items = recent_activities(applications, descriptions);
        assert_eq!(items.len(), MAX_ACTIVITIES);
        assert_eq!(items[0].id, "opp-5");
        assert!(items.windows(2).all(|w| {
            parse_timestamp(w[0].timestamp.as_deref().unwrap()) >= parse_timestamp(w[1].timestamp.as_deref().unwrap())
        }));

        let opp = items.iter().find(|i| i.id == "opp-1").unwrap();
        assert_eq!(opp.title, "Opportunity \"Grant 1\" created");
        assert_eq!(opp.description.chars().count(), 103);

        let first_app = items.iter().find(|i| i.id == "app-1").unwrap();
        assert_eq!(first_app.title, "New application for \"Field Officer\"");
        assert_eq!(first_app.description, "Application submitted by Nadia");
        assert!(items.iter().all(|i| i.id != "app-0"));
    }

    #[test]
    fn activity_fallbacks() {
        let items = recent_activities(
            vec![RecentApplication { id: "a".into(), ..Default::default() }],
            vec![RecentDescription { id: "d".into(), ..Default::default() }],
        );
        let app = items.iter().find(|i| i.kind == "application").unwrap();
        assert_eq!(app.title, "New application for \"Unknown Opportunity\"");
        assert_eq!(app.description, "Application submitted by Unknown User");
        let opp = items.iter().find(|i| i.kind == "opportunity").unwrap();
        assert_eq!(opp.description, "No description available");
    }
}
