use std::sync::Arc;
use std::time::Duration;

use super::{PATIENT_KEYS, Patient, PatientsApi};
use crate::query::QueryOptions;

const PATIENTS_STALE_TIME: Duration = Duration::from_secs(5 * 60);

/// Query factories of the patients resource.
///
/// Each call builds fresh [`QueryOptions`]; nothing is fetched until the
/// options are subscribed to.
#[derive(Clone)]
pub struct PatientsQueries {
    service: Arc<dyn PatientsApi>,
}

impl PatientsQueries {
    pub fn new(service: Arc<dyn PatientsApi>) -> Self {
        Self { service }
    }

    /// Every patient, under `["patients"]`, fresh for 5 minutes.
    pub fn all(&self) -> QueryOptions<Vec<Patient>> {
        let service = self.service.clone();
        QueryOptions::new(PATIENT_KEYS.all(), move || {
            let service = service.clone();
            async move { service.get_all_patients().await }
        })
        .stale_time(PATIENTS_STALE_TIME)
    }

    /// One patient, under `["patients", "detail", id]`. Disabled for an empty id.
    pub fn detail(&self, id: &str) -> QueryOptions<Patient> {
        let service = self.service.clone();
        let patient_id = id.to_string();
        QueryOptions::new(PATIENT_KEYS.detail(id), move || {
            let service = service.clone();
            let patient_id = patient_id.clone();
            async move { service.get_patient(&patient_id).await }
        })
        .stale_time(PATIENTS_STALE_TIME)
        .enabled(!id.is_empty())
    }
}
