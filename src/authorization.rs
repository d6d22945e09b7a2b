//! Role-based access control: a declarative capability table per role.
//!
//! Handlers gate on capabilities; ownership and treating-relationship
//! checks layer on top inside the services.

use thiserror::Error;
use uuid::Uuid;

use crate::models::UserRole;

/// The authenticated subject of an access-control decision.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    BookAppointment,
    ViewOwnAppointments,
    ViewAllAppointments,
    ManageAppointmentStatus,
    CreateRecord,
    ViewOwnRecords,
    ViewPatientRecords,
    UpdateRecord,
    DeleteRecord,
    ViewDoctorDirectory,
    SearchUsers,
    ManageUsers,
    ViewReports,
    ViewUserReport,
    ViewManagerReports,
    RecordPayment,
    ViewOwnPayments,
    ViewAllPayments,
    UseChatbot,
}

#[derive(Error, Debug)]
#[error("Role {role:?} is not permitted to {capability:?}")]
pub struct Denied {
    pub role: UserRole,
    pub capability: Capability,
}

/// The capability set for each role.
pub fn capabilities(role: UserRole) -> &'static [Capability] {
    use Capability::*;
    match role {
        UserRole::Patient => &[
            BookAppointment,
            ViewOwnAppointments,
            ViewOwnRecords,
            ViewDoctorDirectory,
            ViewOwnPayments,
            UseChatbot,
        ],
        UserRole::Doctor => &[
            ViewOwnAppointments,
            ManageAppointmentStatus,
            CreateRecord,
            ViewPatientRecords,
            UpdateRecord,
            ViewDoctorDirectory,
            ViewReports,
            UseChatbot,
        ],
        UserRole::Staff => &[
            BookAppointment,
            ViewAllAppointments,
            ManageAppointmentStatus,
            CreateRecord,
            ViewPatientRecords,
            UpdateRecord,
            ViewDoctorDirectory,
            SearchUsers,
            ViewReports,
            RecordPayment,
            ViewAllPayments,
            UseChatbot,
        ],
        UserRole::Manager => &[
            ViewAllAppointments,
            ViewDoctorDirectory,
            SearchUsers,
            ViewReports,
            ViewManagerReports,
            ViewAllPayments,
            RecordPayment,
            UseChatbot,
        ],
        UserRole::Admin => &[
            BookAppointment,
            ViewOwnAppointments,
            ViewAllAppointments,
            ManageAppointmentStatus,
            CreateRecord,
            ViewOwnRecords,
            ViewPatientRecords,
            UpdateRecord,
            DeleteRecord,
            ViewDoctorDirectory,
            SearchUsers,
            ManageUsers,
            ViewReports,
            ViewUserReport,
            ViewManagerReports,
            RecordPayment,
            ViewOwnPayments,
            ViewAllPayments,
            UseChatbot,
        ],
    }
}

pub fn allowed(role: UserRole, capability: Capability) -> bool {
    capabilities(role).contains(&capability)
}

pub fn require(role: UserRole, capability: Capability) -> Result<(), Denied> {
    if allowed(role, capability) {
        Ok(())
    } else {
        Err(Denied { role, capability })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Capability::*;

    #[test]
    fn patient_scope() {
        assert!(allowed(UserRole::Patient, BookAppointment));
        assert!(allowed(UserRole::Patient, ViewOwnRecords));
        assert!(!allowed(UserRole::Patient, CreateRecord));
        assert!(!allowed(UserRole::Patient, ViewAllAppointments));
        assert!(!allowed(UserRole::Patient, ViewReports));
    }

    #[test]
    fn doctor_can_manage_clinical_flow_but_not_admin_surfaces() {
        assert!(allowed(UserRole::Doctor, CreateRecord));
        assert!(allowed(UserRole::Doctor, UpdateRecord));
        assert!(!allowed(UserRole::Doctor, DeleteRecord));
        assert!(!allowed(UserRole::Doctor, ViewUserReport));
        assert!(!allowed(UserRole::Doctor, SearchUsers));
    }

    #[test]
    fn user_report_is_admin_only() {
        assert!(allowed(UserRole::Admin, ViewUserReport));
        for role in [
            UserRole::Patient,
            UserRole::Doctor,
            UserRole::Staff,
            UserRole::Manager,
        ] {
            assert!(!allowed(role, ViewUserReport), "{role:?} should be denied");
        }
    }

    #[test]
    fn manager_reports_restricted_to_manager_and_admin() {
        assert!(allowed(UserRole::Manager, ViewManagerReports));
        assert!(allowed(UserRole::Admin, ViewManagerReports));
        assert!(!allowed(UserRole::Staff, ViewManagerReports));
    }

    #[test]
    fn record_deletion_is_admin_only() {
        assert!(allowed(UserRole::Admin, DeleteRecord));
        assert!(!allowed(UserRole::Staff, DeleteRecord));
        assert!(!allowed(UserRole::Doctor, DeleteRecord));
    }

    #[test]
    fn require_reports_denial_detail() {
        let err = require(UserRole::Staff, ViewUserReport).unwrap_err();
        assert_eq!(err.role, UserRole::Staff);
        assert_eq!(err.capability, ViewUserReport);
    }
}
