/// Shared domain enumerations used across handlers and services

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a string does not name a known enum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Implements `as_str`, `Display` and `FromStr` for a unit enum from a
/// variant <-> wire-string table.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

/// Account type stored in `users.user_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    #[serde(rename = "Personne")]
    Personne,
    #[serde(rename = "NGO")]
    Ngo,
    #[serde(rename = "Admin")]
    Admin,
    #[serde(rename = "admin_ngo")]
    AdminNgo,
    #[serde(rename = "assistant_ngo")]
    AssistantNgo,
}

string_enum!(UserType, "user type", {
    Personne => "Personne",
    Ngo => "NGO",
    Admin => "Admin",
    AdminNgo => "admin_ngo",
    AssistantNgo => "assistant_ngo",
});

impl UserType {
    /// NGO owners and their team members
    pub fn is_ngo(&self) -> bool {
        matches!(self, UserType::Ngo | UserType::AdminNgo | UserType::AssistantNgo)
    }
}

/// NGO approval workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

string_enum!(ApprovalStatus, "approval status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// Admin decision on a pending NGO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Approve,
    Reject,
}

string_enum!(ApprovalAction, "approval action", {
    Approve => "approve",
    Reject => "reject",
});

impl ApprovalAction {
    pub fn resulting_status(&self) -> ApprovalStatus {
        match self {
            ApprovalAction::Approve => ApprovalStatus::Approved,
            ApprovalAction::Reject => ApprovalStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityType {
    Job,
    Funding,
    Training,
}

string_enum!(OpportunityType, "opportunity type", {
    Job => "job",
    Funding => "funding",
    Training => "training",
});

impl OpportunityType {
    /// Structured fields requested from the scraper for table display
    pub fn main_info_fields(&self) -> &'static [&'static str] {
        match self {
            OpportunityType::Job => &[
                "title",
                "company",
                "organization",
                "location",
                "salary_range",
                "salary",
                "contract_type",
                "job_type",
                "employment_type",
                "deadline",
                "application_deadline",
            ],
            OpportunityType::Funding => &[
                "title",
                "organization",
                "location",
                "amount",
                "deadline",
                "application_deadline",
            ],
            OpportunityType::Training => &[
                "title",
                "provider",
                "organization",
                "location",
                "cost",
                "deadline",
                "application_deadline",
            ],
        }
    }
}

/// Lifecycle of a row in `extracted_opportunity_content`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

string_enum!(ExtractionStatus, "extraction status", {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
});

/// Visibility of a row in `scraped_opportunities`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapedStatus {
    Active,
    Inactive,
    Archived,
}

string_enum!(ScrapedStatus, "scraped opportunity status", {
    Active => "active",
    Inactive => "inactive",
    Archived => "archived",
});

/// Admin-owned template families, each backed by its own table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Forms,
    Offres,
    Evaluation,
    Process,
}

string_enum!(TemplateKind, "template type", {
    Forms => "forms",
    Offres => "offres",
    Evaluation => "evaluation",
    Process => "process",
});

impl TemplateKind {
    pub fn table_name(&self) -> &'static str {
        match self {
            TemplateKind::Forms => "forms_templates",
            TemplateKind::Offres => "offres_templates",
            TemplateKind::Evaluation => "evaluation_templates",
            TemplateKind::Process => "process_templates",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_type_round_trips_wire_names() {
        for ty in UserType::ALL {
            assert_eq!(ty.as_str().parse::<UserType>().unwrap(), *ty);
        }
        assert!("ngo".parse::<UserType>().is_err());
        assert!("NGO".parse::<UserType>().unwrap().is_ngo());
        assert!(!UserType::Personne.is_ngo());
    }

    #[test]
    fn approval_action_maps_to_status() {
        assert_eq!(ApprovalAction::Approve.resulting_status(), ApprovalStatus::Approved);
        assert_eq!(ApprovalAction::Reject.resulting_status(), ApprovalStatus::Rejected);
        assert!("archive".parse::<ApprovalAction>().is_err());
    }

    #[test]
    fn template_kinds_map_to_tables() {
        assert_eq!("offres".parse::<TemplateKind>().unwrap().table_name(), "offres_templates");
        assert_eq!(TemplateKind::Process.table_name(), "process_templates");
        let err = "quiz".parse::<TemplateKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown template type: quiz");
    }

    #[test]
    fn funding_fields_do_not_ask_for_salary() {
        let fields = OpportunityType::Funding.main_info_fields();
        assert!(fields.contains(&"amount"));
        assert!(!fields.contains(&"salary"));
    }

    #[test]
    fn scraped_status_rejects_unknown_values() {
        assert_eq!("archived".parse::<ScrapedStatus>().unwrap(), ScrapedStatus::Archived);
        assert!("deleted".parse::<ScrapedStatus>().is_err());
    }
}
