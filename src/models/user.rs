use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::UserRole;

/// Role-specific profile data. Each role's mandatory fields live in its own
/// variant, so an account can never carry a half-filled shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleProfile {
    Patient {
        date_of_birth: NaiveDate,
        blood_type: String,
        /// Assigned once by the repository on first save, never changed after.
        health_card_id: Option<String>,
    },
    Doctor {
        specialization: String,
        consultation_fee: f64,
        department: Option<String>,
    },
    Staff {
        department: String,
    },
    Manager {
        department: String,
    },
    Admin,
}

impl RoleProfile {
    pub fn role(&self) -> UserRole {
        match self {
            RoleProfile::Patient { .. } => UserRole::Patient,
            RoleProfile::Doctor { .. } => UserRole::Doctor,
            RoleProfile::Staff { .. } => UserRole::Staff,
            RoleProfile::Manager { .. } => UserRole::Manager,
            RoleProfile::Admin => UserRole::Admin,
        }
    }

    pub fn health_card_id(&self) -> Option<&str> {
        match self {
            RoleProfile::Patient { health_card_id, .. } => health_card_id.as_deref(),
            _ => None,
        }
    }

    pub fn department(&self) -> Option<&str> {
        match self {
            RoleProfile::Doctor { department, .. } => department.as_deref(),
            RoleProfile::Staff { department } | RoleProfile::Manager { department } => {
                Some(department)
            }
            _ => None,
        }
    }
}

/// Full account row, password hash included. Never serialized to the API —
/// handlers convert to [`UserPublic`] first.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub profile: RoleProfile,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn role(&self) -> UserRole {
        self.profile.role()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            is_active: self.is_active,
            email_verified: self.email_verified,
            profile: self.profile.clone(),
            created_at: self.created_at,
        }
    }
}

/// Account shape exposed over the API (no credential material).
#[derive(Debug, Clone, Serialize)]
pub struct UserPublic {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    #[serde(flatten)]
    pub profile: RoleProfile,
    pub created_at: NaiveDateTime,
}

/// Directory entry for the public doctor listing.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorListing {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub consultation_fee: f64,
    pub department: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_role_matches_variant() {
        let p = RoleProfile::Patient {
            date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 2).unwrap(),
            blood_type: "O+".into(),
            health_card_id: None,
        };
        assert_eq!(p.role(), UserRole::Patient);
        assert_eq!(RoleProfile::Admin.role(), UserRole::Admin);
    }

    #[test]
    fn profile_serde_tagging() {
        let p = RoleProfile::Doctor {
            specialization: "Cardiology".into(),
            consultation_fee: 150.0,
            department: Some("Cardiology".into()),
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["role"], "doctor");
        assert_eq!(json["specialization"], "Cardiology");

        let back: RoleProfile = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn department_accessor_covers_staff_roles() {
        let staff = RoleProfile::Staff {
            department: "Radiology".into(),
        };
        assert_eq!(staff.department(), Some("Radiology"));
        assert_eq!(RoleProfile::Admin.department(), None);
    }
}
