//! In-memory mirror of the patient schema for handler tests
//!
//! Re-implements the report query's rule in Rust. It must stay in step with
//! `HOSPITALIZED_PATIENTS_NEW_TEST_REQUIRED`, including PostgreSQL's
//! NULLS LAST for an ascending department order.

use super::{AlertSource, PatientAlert};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Patient {
    patient_id: i64,
    first_name: String,
    last_name: String,
}

struct Admission {
    patient_id: i64,
    department: Option<String>,
    room_number: Option<String>,
    release_date: Option<NaiveDate>,
    release_time: Option<NaiveTime>,
}

struct LabResult {
    patient_id: i64,
    performed_date: Option<NaiveDate>,
    performed_time: Option<NaiveTime>,
}

type Failure = Box<dyn Fn() -> AppError + Send + Sync>;

#[derive(Default)]
pub struct MemoryAlertSource {
    patients: Vec<Patient>,
    admissions: Vec<Admission>,
    results: Vec<LabResult>,
    failure: Option<Failure>,
    calls: AtomicUsize,
}

impl MemoryAlertSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with the error built by `make`
    pub fn failing(make: impl Fn() -> AppError + Send + Sync + 'static) -> Self {
        Self {
            failure: Some(Box::new(make)),
            ..Self::default()
        }
    }

    pub fn patient(mut self, patient_id: i64, first_name: &str, last_name: &str) -> Self {
        self.patients.push(Patient {
            patient_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        });
        self
    }

    pub fn admitted(mut self, patient_id: i64, department: &str, room_number: &str) -> Self {
        self.admissions.push(Admission {
            patient_id,
            department: Some(department.to_string()),
            room_number: Some(room_number.to_string()),
            release_date: None,
            release_time: None,
        });
        self
    }

    /// An open admission with no room recorded
    pub fn admitted_without_room(mut self, patient_id: i64, department: &str) -> Self {
        self.admissions.push(Admission {
            patient_id,
            department: Some(department.to_string()),
            room_number: None,
            release_date: None,
            release_time: None,
        });
        self
    }

    /// An open admission with neither department nor room recorded
    pub fn admitted_unassigned(mut self, patient_id: i64) -> Self {
        self.admissions.push(Admission {
            patient_id,
            department: None,
            room_number: None,
            release_date: None,
            release_time: None,
        });
        self
    }

    pub fn released(
        mut self,
        patient_id: i64,
        department: &str,
        room_number: &str,
        at: NaiveDateTime,
    ) -> Self {
        self.admissions.push(Admission {
            patient_id,
            department: Some(department.to_string()),
            room_number: Some(room_number.to_string()),
            release_date: Some(at.date()),
            release_time: Some(at.time()),
        });
        self
    }

    pub fn lab_result(mut self, patient_id: i64, performed_at: NaiveDateTime) -> Self {
        self.results.push(LabResult {
            patient_id,
            performed_date: Some(performed_at.date()),
            performed_time: Some(performed_at.time()),
        });
        self
    }

    /// A result row with no recorded time
    pub fn undated_lab_result(mut self, patient_id: i64, performed_date: NaiveDate) -> Self {
        self.results.push(LabResult {
            patient_id,
            performed_date: Some(performed_date),
            performed_time: None,
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn has_recent_result(&self, patient_id: i64, cutoff: NaiveDateTime) -> bool {
        self.results.iter().any(|r| {
            r.patient_id == patient_id
                && match (r.performed_date, r.performed_time) {
                    (Some(date), Some(time)) => date.and_time(time) >= cutoff,
                    _ => false,
                }
        })
    }
}

#[async_trait]
impl AlertSource for MemoryAlertSource {
    async fn patients_needing_test(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<PatientAlert>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(make) = &self.failure {
            return Err(make());
        }

        let mut alerts: Vec<PatientAlert> = self
            .admissions
            .iter()
            .filter(|a| a.release_date.is_none() && a.release_time.is_none())
            .filter_map(|a| {
                let p = self.patients.iter().find(|p| p.patient_id == a.patient_id)?;
                Some(PatientAlert {
                    patient_id: p.patient_id,
                    first_name: p.first_name.clone(),
                    last_name: p.last_name.clone(),
                    department: a.department.clone(),
                    room_number: a.room_number.clone(),
                })
            })
            .filter(|alert| !self.has_recent_result(alert.patient_id, cutoff))
            .collect();

        alerts.sort_by(|a, b| {
            nulls_last(&a.department, &b.department).then(a.patient_id.cmp(&b.patient_id))
        });
        Ok(alerts)
    }
}

fn nulls_last(a: &Option<String>, b: &Option<String>) -> CmpOrdering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => CmpOrdering::Less,
        (None, Some(_)) => CmpOrdering::Greater,
        (None, None) => CmpOrdering::Equal,
    }
}
