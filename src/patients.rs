//! Patients resource: records, the data-access capability, queries and the listing hook.

pub mod hook;
pub mod queries;
pub mod service;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::query::{QueryError, ResourceKeys};

pub use hook::{PatientHook, PatientView, PatientsHook, PatientsView, use_patient, use_patients};
pub use queries::PatientsQueries;
pub use service::PatientsService;

/// Cache keys of the patients resource.
///
/// `["patients"]` → `["patients", "list"]` → `["patients", "list", {"filters": ...}]`,
/// `["patients", "detail", id]` and `["patients", "stats"]`.
pub const PATIENT_KEYS: ResourceKeys = ResourceKeys::new("patients");

/// A patient registered in the hospital system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    /// National identity document number.
    pub dni: String,
    pub age: u32,
    pub diagnostic: String,
    /// ISO 8601 timestamp.
    pub entry_date: String,
    /// ISO 8601 timestamp, `None` while still admitted.
    pub departure_date: Option<String>,
}

impl Patient {
    pub const fn is_admitted(&self) -> bool {
        self.departure_date.is_none()
    }

    /// Case-insensitive substring match on name, DNI and diagnostic.
    ///
    /// `needle` must already be lowercase.
    fn matches_lowercase(&self, needle: &str) -> bool {
        [&self.name, &self.dni, &self.diagnostic]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Filters `patients` by `term`. A blank term keeps everyone.
pub fn filter_patients(patients: &[Patient], term: &str) -> Vec<Patient> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return patients.to_vec();
    }
    patients
        .iter()
        .filter(|p| p.matches_lowercase(&needle))
        .cloned()
        .collect()
}

/// Data access for patients.
#[async_trait]
pub trait PatientsApi: Send + Sync {
    /// Fetches every patient (`GET /api/patients`).
    async fn get_all_patients(&self) -> Result<Vec<Patient>, QueryError>;

    /// Fetches one patient (`GET /api/patients/:id`). A missing patient is a 404 error.
    async fn get_patient(&self, id: &str) -> Result<Patient, QueryError>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn patient(id: &str, name: &str, dni: &str, discharged: bool) -> Patient {
        Patient {
            id: id.to_string(),
            name: name.to_string(),
            dni: dni.to_string(),
            age: 40,
            diagnostic: "Hypertension".to_string(),
            entry_date: "2025-01-10T08:30:00Z".to_string(),
            departure_date: discharged.then(|| "2025-01-12T14:00:00Z".to_string()),
        }
    }

    fn sample() -> Vec<Patient> {
        vec![
            patient("1", "Maria Rodriguez", "12345678-9", true),
            patient("2", "John Smith", "98765432-1", false),
        ]
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let filtered = filter_patients(&sample(), "MARIA");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "Maria Rodriguez");
    }

    #[test]
    fn test_filter_by_dni() {
        let filtered = filter_patients(&sample(), "98765432");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "2");
    }

    #[test]
    fn test_blank_term_keeps_everyone() {
        assert_eq!(filter_patients(&sample(), "").len(), 2);
        assert_eq!(filter_patients(&sample(), "   ").len(), 2);
    }

    #[test]
    fn test_no_match() {
        assert!(filter_patients(&sample(), "zzz").is_empty());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{"id":"7","name":"Sofia Garcia","dni":"67890123-4","age":52,
            "diagnostic":"Gastritis","entryDate":"2025-01-13T07:15:00Z","departureDate":null}"#;
        let patient: Patient = serde_json::from_str(json).expect("valid patient");
        assert_eq!(patient.entry_date, "2025-01-13T07:15:00Z");
        assert!(patient.is_admitted());
    }
}
