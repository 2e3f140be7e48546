use async_trait::async_trait;

use super::{DashboardApi, DashboardData};
use crate::query::QueryError;
use crate::transport::Transport;

/// [`DashboardApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct LandingService<T> {
    transport: T,
}

impl<T: Transport> LandingService<T> {
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<T: Transport> DashboardApi for LandingService<T> {
    async fn get_dashboard_data(&self) -> Result<DashboardData, QueryError> {
        self.transport
            .get("/api/dashboard")
            .await?
            .error_for_status()?
            .json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landing::QuickActionVariant;
    use crate::transport::mock::MockResponder;

    #[tokio::test]
    async fn test_get_dashboard_data() {
        let service = LandingService::new(MockResponder::instant());
        let data = service.get_dashboard_data().await.expect("fixture loads");
        assert_eq!(data.statistics.total_patients, 1247);
        assert_eq!(data.statistics.emergency_cases, Some(4));
        assert_eq!(data.features.len(), 4);
        assert_eq!(data.quick_actions[2].variant, QuickActionVariant::Danger);
    }
}
