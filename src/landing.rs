//! Landing dashboard: statistics, feature highlights and quick actions.

pub mod hook;
pub mod queries;
pub mod service;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::query::{QueryError, QueryKey, ResourceKeys};

pub use hook::{LandingHook, LandingView, use_landing};
pub use queries::DashboardQueries;
pub use service::LandingService;

const DASHBOARD: ResourceKeys = ResourceKeys::new("dashboard");

/// Cache keys of the dashboard. Invalidating [`all`](Self::all) invalidates every one of them.
#[derive(Debug, Clone, Copy)]
pub struct LandingKeys;

impl LandingKeys {
    pub fn all() -> QueryKey {
        DASHBOARD.all()
    }

    pub fn data() -> QueryKey {
        DASHBOARD.scoped("data")
    }

    pub fn statistics() -> QueryKey {
        DASHBOARD.scoped("statistics")
    }

    pub fn features() -> QueryKey {
        DASHBOARD.scoped("features")
    }

    pub fn quick_actions() -> QueryKey {
        DASHBOARD.scoped("quick-actions")
    }
}

/// Hospital-wide counters shown on the dashboard.
///
/// Only `total_patients` is guaranteed; the other counters are shown when the
/// server provides them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStatistics {
    pub total_patients: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todays_appointments: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_staff: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_cases: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureHighlight {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Name of the icon to render.
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuickActionVariant {
    Primary,
    Secondary,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAction {
    pub id: String,
    pub label: String,
    pub variant: QuickActionVariant,
    /// Where the action navigates to, if anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Everything the landing page needs, fetched in one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub statistics: DashboardStatistics,
    pub features: Vec<FeatureHighlight>,
    pub quick_actions: Vec<QuickAction>,
}

/// Data access for the dashboard.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// Fetches statistics, features and quick actions (`GET /api/dashboard`).
    async fn get_dashboard_data(&self) -> Result<DashboardData, QueryError>;
}
