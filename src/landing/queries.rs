use std::sync::Arc;
use std::time::Duration;

use super::{DashboardApi, DashboardData, LandingKeys};
use crate::query::QueryOptions;

/// Dashboard data changes slowly.
const DASHBOARD_STALE_TIME: Duration = Duration::from_secs(5 * 60);

/// Query factories of the dashboard.
#[derive(Clone)]
pub struct DashboardQueries {
    service: Arc<dyn DashboardApi>,
}

impl DashboardQueries {
    pub fn new(service: Arc<dyn DashboardApi>) -> Self {
        Self { service }
    }

    /// Statistics, features and quick actions under `["dashboard", "data"]`.
    pub fn dashboard(&self) -> QueryOptions<DashboardData> {
        let service = self.service.clone();
        QueryOptions::new(LandingKeys::data(), move || {
            let service = service.clone();
            async move { service.get_dashboard_data().await }
        })
        .stale_time(DASHBOARD_STALE_TIME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landing::LandingService;
    use crate::query::QueryKey;
    use crate::transport::mock::MockResponder;

    #[test]
    fn test_dashboard_options() {
        let queries = DashboardQueries::new(Arc::new(LandingService::new(MockResponder::instant())));
        let options = queries.dashboard();
        assert_eq!(options.key(), &QueryKey::new(["dashboard", "data"]));
        assert_eq!(options.stale_time_override(), Some(DASHBOARD_STALE_TIME));
        assert!(options.is_enabled());
    }
}
