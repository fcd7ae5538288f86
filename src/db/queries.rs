//! SQL query constants
//!
//! Contains all SQL queries used by the application. Every statement is
//! read-only; the service never writes to the patient database.

/// Open admissions whose patient has no lab result performed at or after `$1`.
///
/// `$1` is the window cutoff (now minus 48 hours). A result performed exactly
/// at the cutoff still counts as recent. Results with a missing date or time
/// never count as recent.
pub const HOSPITALIZED_PATIENTS_NEW_TEST_REQUIRED: &str = r#"
    SELECT p.patient_id, p.first_name, p.last_name, a.department, a.room_number
    FROM patients p
    JOIN admissions a ON p.patient_id = a.patient_id
    WHERE a.release_date IS NULL
        AND a.release_time IS NULL
        AND NOT EXISTS (
            SELECT 1
            FROM lab_tests lt
            JOIN lab_results lr ON lt.test_id = lr.test_id
            WHERE lt.patient_id = p.patient_id
                AND (lr.performed_date + lr.performed_time) >= $1::timestamp
        )
    ORDER BY a.department, p.patient_id
"#;

/// Name used in logs and errors for the report query
pub const HOSPITALIZED_PATIENTS_NEW_TEST_REQUIRED_NAME: &str =
    "hospitalized_patients_new_test_required";

/// Server version, used by the readiness check
pub const SERVER_VERSION: &str = "SELECT version()";

pub const SERVER_VERSION_NAME: &str = "server_version";
