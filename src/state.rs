//! Application state management
//!
//! Contains shared state accessible across all handlers. Nothing here is
//! mutated after startup; each request opens its own database connection.

use crate::alerts::{AlertSource, PgAlertSource};
use crate::clock::{Clock, SystemClock};
use crate::db::Database;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Connection factory, used directly by the readiness check
    pub database: Database,

    /// Source of the report rows
    pub alerts: Arc<dyn AlertSource>,

    /// Reference time for the lab result window
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Production state: report rows come from PostgreSQL, time from the host
    pub fn new(database: Database) -> Self {
        let alerts = Arc::new(PgAlertSource::new(database.clone()));
        Self::from_parts(database, alerts, Arc::new(SystemClock))
    }

    pub fn from_parts(
        database: Database,
        alerts: Arc<dyn AlertSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            database,
            alerts,
            clock,
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
