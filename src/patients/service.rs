use async_trait::async_trait;

use super::{Patient, PatientsApi};
use crate::query::QueryError;
use crate::transport::Transport;

/// [`PatientsApi`] over HTTP.
///
/// Which [`Transport`] answers (the mock responder or a real endpoint) is
/// decided by whoever constructs the service.
#[derive(Debug, Clone)]
pub struct PatientsService<T> {
    transport: T,
}

impl<T: Transport> PatientsService<T> {
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<T: Transport> PatientsApi for PatientsService<T> {
    async fn get_all_patients(&self) -> Result<Vec<Patient>, QueryError> {
        self.transport
            .get("/api/patients")
            .await?
            .error_for_status()?
            .json()
    }

    async fn get_patient(&self, id: &str) -> Result<Patient, QueryError> {
        self.transport
            .get(&format!("/api/patients/{id}"))
            .await?
            .error_for_status()?
            .json()
    }
}
