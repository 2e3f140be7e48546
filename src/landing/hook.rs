use std::sync::Arc;

use serde::Serialize;

use super::{DashboardApi, DashboardData, DashboardQueries, DashboardStatistics, FeatureHighlight, QuickAction};
use crate::query::{QueryClient, QueryObserver, QueryState};

/// What the landing page renders.
///
/// Before the first successful fetch, statistics default to zero and the
/// lists are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LandingView {
    pub statistics: DashboardStatistics,
    pub features: Vec<FeatureHighlight>,
    pub quick_actions: Vec<QuickAction>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl LandingView {
    fn from_state(state: &QueryState<DashboardData>) -> Self {
        let data = state.data();
        Self {
            statistics: data.map(|d| d.statistics.clone()).unwrap_or_default(),
            features: data.map(|d| d.features.clone()).unwrap_or_default(),
            quick_actions: data.map(|d| d.quick_actions.clone()).unwrap_or_default(),
            is_loading: state.is_loading(),
            error: state.error_message(),
        }
    }
}

/// Subscription to the dashboard.
#[derive(Debug)]
pub struct LandingHook {
    observer: QueryObserver<DashboardData>,
}

/// Subscribes to the dashboard data.
pub fn use_landing(client: &QueryClient, service: Arc<dyn DashboardApi>) -> LandingHook {
    let observer = client.subscribe(&DashboardQueries::new(service).dashboard());
    LandingHook { observer }
}

impl LandingHook {
    pub fn view(&self) -> LandingView {
        LandingView::from_state(&self.observer.state())
    }

    pub async fn settled(&mut self) -> LandingView {
        LandingView::from_state(&self.observer.wait_settled().await)
    }

    /// Fetches the dashboard again and waits for it.
    pub async fn refresh_statistics(&mut self) -> LandingView {
        LandingView::from_state(&self.observer.refetch().await)
    }
}
