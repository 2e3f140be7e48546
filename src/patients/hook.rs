//! Consumer-facing state for the patient list and patient detail screens.

use std::sync::Arc;

use serde::Serialize;

use super::{Patient, PatientsApi, PatientsQueries, filter_patients};
use crate::query::{QueryClient, QueryObserver, QueryState};

/// What the patient list renders for one search term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientsView {
    pub search: String,
    /// Patients matching `search`.
    pub patients: Vec<Patient>,
    /// Number of patients before filtering.
    pub total: usize,
    pub admitted_count: usize,
    pub discharged_count: usize,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl PatientsView {
    fn from_state(state: &QueryState<Vec<Patient>>, search: &str) -> Self {
        let all = state.data().map(Vec::as_slice).unwrap_or_default();
        let patients = filter_patients(all, search);
        let admitted_count = patients.iter().filter(|p| p.is_admitted()).count();
        Self {
            search: search.to_string(),
            discharged_count: patients.len() - admitted_count,
            admitted_count,
            total: all.len(),
            patients,
            is_loading: state.is_loading(),
            error: state.error_message(),
        }
    }

    /// Returns `true` when loading finished without error and nothing matches.
    pub fn is_empty(&self) -> bool {
        !self.is_loading && self.error.is_none() && self.patients.is_empty()
    }

    /// The empty-state message, if the view is empty.
    pub fn empty_message(&self) -> Option<String> {
        if !self.is_empty() {
            return None;
        }
        let term = self.search.trim();
        Some(if term.is_empty() {
            "No patients registered".to_string()
        } else {
            format!("No patients match \"{term}\"")
        })
    }
}

/// Subscription to the patient list.
#[derive(Debug)]
pub struct PatientsHook {
    observer: QueryObserver<Vec<Patient>>,
}

/// Subscribes to every patient. The list is fetched if nothing fresh is cached.
pub fn use_patients(client: &QueryClient, service: Arc<dyn PatientsApi>) -> PatientsHook {
    let observer = client.subscribe(&PatientsQueries::new(service).all());
    PatientsHook { observer }
}

impl PatientsHook {
    pub fn view(&self, search: &str) -> PatientsView {
        PatientsView::from_state(&self.observer.state(), search)
    }

    /// Waits until the list is no longer fetching.
    pub async fn settled(&mut self, search: &str) -> PatientsView {
        PatientsView::from_state(&self.observer.wait_settled().await, search)
    }

    /// Waits for the next change of the underlying entry.
    pub async fn changed(&mut self, search: &str) -> Option<PatientsView> {
        let state = self.observer.changed().await?;
        Some(PatientsView::from_state(&state, search))
    }

    /// Fetches the list again regardless of staleness.
    pub async fn refetch(&mut self, search: &str) -> PatientsView {
        PatientsView::from_state(&self.observer.refetch().await, search)
    }
}

/// What the patient detail screen renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientView {
    pub patient: Option<Patient>,
    pub is_loading: bool,
    /// `false` when no id was given and nothing will be fetched.
    pub is_enabled: bool,
    pub error: Option<String>,
}

impl PatientView {
    fn from_state(state: &QueryState<Patient>, is_enabled: bool) -> Self {
        Self {
            patient: state.data().cloned(),
            is_loading: state.is_loading(),
            is_enabled,
            error: state.error_message(),
        }
    }
}

/// Subscription to one patient.
#[derive(Debug)]
pub struct PatientHook {
    observer: QueryObserver<Patient>,
    enabled: bool,
}

/// Subscribes to the patient with `id`. An empty id subscribes to a disabled
/// query that stays idle.
pub fn use_patient(client: &QueryClient, service: Arc<dyn PatientsApi>, id: &str) -> PatientHook {
    let options = PatientsQueries::new(service).detail(id);
    PatientHook {
        enabled: options.is_enabled(),
        observer: client.subscribe(&options),
    }
}

impl PatientHook {
    pub fn view(&self) -> PatientView {
        PatientView::from_state(&self.observer.state(), self.enabled)
    }

    pub async fn settled(&mut self) -> PatientView {
        if !self.enabled {
            return self.view();
        }
        PatientView::from_state(&self.observer.wait_settled().await, self.enabled)
    }

    pub async fn refetch(&mut self) -> PatientView {
        PatientView::from_state(&self.observer.refetch().await, self.enabled)
    }
}
