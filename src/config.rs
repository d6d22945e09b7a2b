use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "UrbanCare";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Assumed appointment capacity per staff member per reporting period.
/// Fixed business rule used by the staff-utilization report.
pub const STAFF_PERIOD_CAPACITY: u32 = 40;

/// Clinic working hours used to derive doctor availability slots.
pub const WORK_DAY_START_MINUTE: u16 = 9 * 60;
pub const WORK_DAY_END_MINUTE: u16 = 17 * 60;
pub const DEFAULT_SLOT_MINUTES: u16 = 30;

/// Get the application data directory
/// ~/UrbanCare/ on all platforms (user-visible, per deployment requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("UrbanCare")
}

/// Database path: `URBANCARE_DB` env override, else `<data dir>/urbancare.db`
pub fn database_path() -> PathBuf {
    std::env::var("URBANCARE_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| app_data_dir().join("urbancare.db"))
}

/// Default tracing filter when `RUST_LOG` is unset
pub fn default_log_filter() -> String {
    "urbancare=info,tower_http=info".into()
}

/// Bind address: `URBANCARE_ADDR` env override, else 127.0.0.1:8080
pub fn bind_addr() -> SocketAddr {
    std::env::var("URBANCARE_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("UrbanCare"));
    }

    #[test]
    fn default_bind_addr_is_loopback() {
        if std::env::var("URBANCARE_ADDR").is_err() {
            assert!(bind_addr().ip().is_loopback());
        }
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn working_day_is_eight_hours() {
        assert_eq!(WORK_DAY_END_MINUTE - WORK_DAY_START_MINUTE, 480);
    }
}
