//! Hospitalized patients overdue for a lab test
//!
//! A patient is on the report when they have an open admission (neither a
//! release date nor a release time recorded) and no lab result performed
//! inside the trailing [`NEW_TEST_WINDOW_HOURS`] window.

#[cfg(test)]
pub mod memory;

use crate::db::queries::{
    HOSPITALIZED_PATIENTS_NEW_TEST_REQUIRED, HOSPITALIZED_PATIENTS_NEW_TEST_REQUIRED_NAME,
};
use crate::db::Database;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use postgres_types::Type;
use serde::Serialize;
use tokio_postgres::Row;
use tracing::debug;

/// How far back a lab result still counts as recent
pub const NEW_TEST_WINDOW_HOURS: i64 = 48;

/// Oldest `performed_at` that still counts as recent, relative to `now`
pub fn window_cutoff(now: NaiveDateTime) -> NaiveDateTime {
    now - chrono::Duration::hours(NEW_TEST_WINDOW_HOURS)
}

/// One row of the report. Field names match the database columns.
///
/// Admission details may be missing; they serialize as `null` so one
/// incomplete admission does not hide the rest of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientAlert {
    pub patient_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub department: Option<String>,
    pub room_number: Option<String>,
}

impl PatientAlert {
    pub fn from_row(row: &Row) -> Result<Self, AppError> {
        Ok(Self {
            patient_id: integer_column(row, "patient_id")?,
            first_name: text_column(row, "first_name")?,
            last_name: text_column(row, "last_name")?,
            department: nullable_text_column(row, "department")?,
            room_number: nullable_text_column(row, "room_number")?,
        })
    }
}

/// Where the report rows come from
#[async_trait]
pub trait AlertSource: Send + Sync {
    /// Patients with an open admission and no lab result performed at or
    /// after `cutoff`, ordered by department.
    async fn patients_needing_test(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<PatientAlert>, AppError>;
}

/// Runs the report query on a connection opened for this call only
pub struct PgAlertSource {
    db: Database,
}

impl PgAlertSource {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AlertSource for PgAlertSource {
    async fn patients_needing_test(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<PatientAlert>, AppError> {
        let conn = self.db.open().await?;

        let rows = conn
            .client()
            .query(HOSPITALIZED_PATIENTS_NEW_TEST_REQUIRED, &[&cutoff])
            .await
            .map_err(AppError::query(HOSPITALIZED_PATIENTS_NEW_TEST_REQUIRED_NAME));

        // Released before rows are inspected, whatever the outcome
        conn.close().await;

        let rows = rows?;
        debug!("Report query returned {} rows", rows.len());
        rows.iter().map(PatientAlert::from_row).collect()
    }
}

fn conversion_error(column: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Serialization(format!("Column '{}' could not be converted: {}", column, e))
}

fn column_type<'a>(row: &'a Row, column: &str) -> Result<&'a Type, AppError> {
    row.columns()
        .iter()
        .find(|c| c.name() == column)
        .map(|c| c.type_())
        .ok_or_else(|| conversion_error(column, "column missing from result"))
}

/// Any integer width, as i64
fn nullable_integer_column(row: &Row, column: &str) -> Result<Option<i64>, AppError> {
    let ty = column_type(row, column)?;
    let value = if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(column).map(|v| v.map(i64::from))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(column).map(|v| v.map(i64::from))
    } else {
        row.try_get::<_, Option<i64>>(column)
    };
    value.map_err(|e| conversion_error(column, e))
}

fn integer_column(row: &Row, column: &str) -> Result<i64, AppError> {
    nullable_integer_column(row, column)?
        .ok_or_else(|| conversion_error(column, "unexpected NULL"))
}

/// Text columns as-is; integer columns (e.g. room numbers) as decimal strings
fn nullable_text_column(row: &Row, column: &str) -> Result<Option<String>, AppError> {
    let ty = column_type(row, column)?;
    if *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8 {
        return nullable_integer_column(row, column).map(|n| n.map(|n| n.to_string()));
    }
    row.try_get::<_, Option<String>>(column)
        .map_err(|e| conversion_error(column, e))
}

fn text_column(row: &Row, column: &str) -> Result<String, AppError> {
    nullable_text_column(row, column)?
        .ok_or_else(|| conversion_error(column, "unexpected NULL"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_window_cutoff_is_48_hours_back() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 3, 8)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(window_cutoff(now), expected);
    }

    #[test]
    fn test_alert_serializes_with_column_names() {
        let alert = PatientAlert {
            patient_id: 7,
            first_name: "Dana".to_string(),
            last_name: "Levi".to_string(),
            department: Some("Cardiology".to_string()),
            room_number: Some("12B".to_string()),
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "patient_id": 7,
                "first_name": "Dana",
                "last_name": "Levi",
                "department": "Cardiology",
                "room_number": "12B"
            })
        );
    }

    #[test]
    fn test_missing_room_serializes_as_null() {
        let alert = PatientAlert {
            patient_id: 8,
            first_name: "Noa".to_string(),
            last_name: "Peretz".to_string(),
            department: Some("Surgery".to_string()),
            room_number: None,
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["room_number"], serde_json::Value::Null);
        assert_eq!(json["department"], serde_json::json!("Surgery"));
    }
}
