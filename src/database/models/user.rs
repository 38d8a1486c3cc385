use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::UserType;

/// Subset of `users` needed for identity and role checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub auth_provider: Option<String>,
}

impl User {
    pub fn user_type(&self) -> Option<UserType> {
        self.user_type.as_deref().and_then(|t| t.parse().ok())
    }

    pub fn is_admin(&self) -> bool {
        self.user_type() == Some(UserType::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_row_json() {
        let user: User = serde_json::from_value(json!({
            "id": "7f7d2b0e-2d4c-4e0e-9b7a-3f1f1f1f1f1f",
            "full_name": "Amal",
            "email": "amal@example.org",
            "user_type": "Admin",
            "created_at": "2024-01-01T00:00:00+00:00"
        }))
        .unwrap();
        assert!(user.is_admin());
        assert_eq!(user.auth_provider, None);
    }
}
