use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(UserRole {
    Patient => "patient",
    Doctor => "doctor",
    Staff => "staff",
    Manager => "manager",
    Admin => "admin",
});

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Confirmed => "confirmed",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl AppointmentStatus {
    /// Completed and cancelled appointments accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

str_enum!(RecordType {
    Consultation => "consultation",
    LabReport => "lab_report",
    Prescription => "prescription",
    Imaging => "imaging",
    Vaccination => "vaccination",
    Other => "other",
});

str_enum!(RecordStatus {
    Active => "active",
    Deleted => "deleted",
});

str_enum!(PaymentMethod {
    Cash => "cash",
    Card => "card",
    Insurance => "insurance",
    Online => "online",
});

str_enum!(PaymentStatus {
    Pending => "pending",
    Completed => "completed",
    Refunded => "refunded",
});

str_enum!(AuditAction {
    Create => "create",
    Read => "read",
    Update => "update",
    SoftDelete => "soft_delete",
    List => "list",
});

str_enum!(AuditOutcome {
    Success => "success",
    Denied => "denied",
});

str_enum!(AuditResource {
    MedicalRecord => "medical_record",
    PatientProfile => "patient_profile",
});

str_enum!(TokenPurpose {
    EmailVerify => "email_verify",
    PasswordReset => "password_reset",
});
