//! Transport-agnostic shared application state.
//!
//! `AppState` owns the database path, the outbound mail seam, and the
//! real-time notification registry. Requests open their own short-lived
//! connection through [`AppState::open_db`]; no domain state is cached
//! in memory between requests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;

use crate::db::{self, DatabaseError};
use crate::mailer::Mailer;
use crate::notifications::Notifier;

pub struct AppState {
    db_path: PathBuf,
    pub mailer: Arc<dyn Mailer>,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(db_path: PathBuf, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db_path,
            mailer,
            notifier: Notifier::new(),
        }
    }

    /// Open a connection for the current request. Migrations are
    /// version-guarded, so reopening an up-to-date database is cheap.
    pub fn open_db(&self) -> Result<Connection, DatabaseError> {
        db::open_database(&self.db_path)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::LogMailer;

    #[test]
    fn open_db_creates_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(dir.path().join("state.db"), Arc::new(LogMailer));

        let conn = state.open_db().unwrap();
        assert!(db::count_tables(&conn).unwrap() >= 9);
        drop(conn);

        // Second open hits the already-migrated file
        assert!(state.open_db().is_ok());
        assert!(state.db_path().ends_with("state.db"));
    }
}
