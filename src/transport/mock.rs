//! Development-mode mock responder.
//!
//! Intercepts API requests and answers them from the JSON fixtures after a
//! simulated network delay.
//!
//! | Route                           | Delay   | Response                      |
//! |---------------------------------|---------|-------------------------------|
//! | `GET /api/dashboard`            | 1000 ms | statistics, features, actions |
//! | `GET /api/dashboard/statistics` | 300 ms  | statistics                    |
//! | `GET /api/dashboard/features`   | 300 ms  | features                      |
//! | `GET /api/dashboard/quick-actions` | 300 ms | quick actions              |
//! | `GET /api/patients`             | 500 ms  | every patient                 |
//! | `GET /api/patients/:id`         | 300 ms  | one patient, or 404           |

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Response, Transport};
use crate::query::QueryError;

const PATIENTS_FIXTURE: &str = include_str!("../../fixtures/patients.json");
const DASHBOARD_FIXTURE: &str = include_str!("../../fixtures/dashboard.json");

const DASHBOARD_DELAY: Duration = Duration::from_millis(1000);
const PATIENTS_DELAY: Duration = Duration::from_millis(500);
const DETAIL_DELAY: Duration = Duration::from_millis(300);

/// A [`Transport`] answering from fixtures.
#[derive(Debug, Default)]
pub struct MockResponder {
    /// Overrides every route's delay when set.
    latency: Option<Duration>,
    requests: AtomicUsize,
}

enum Route<'a> {
    Dashboard,
    DashboardPart(&'static str),
    Patients,
    Patient(&'a str),
    Unknown,
}

impl MockResponder {
    /// A responder using the per-route delays.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A responder answering every route after `latency`.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            requests: AtomicUsize::new(0),
        }
    }

    /// A responder answering without any delay.
    #[must_use]
    pub fn instant() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// Number of requests answered so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn route(path: &str) -> Route<'_> {
        let path = path.split('?').next().unwrap_or_default().trim_end_matches('/');
        match path {
            "/api/dashboard" => Route::Dashboard,
            "/api/dashboard/statistics" => Route::DashboardPart("statistics"),
            "/api/dashboard/features" => Route::DashboardPart("features"),
            "/api/dashboard/quick-actions" => Route::DashboardPart("quickActions"),
            "/api/patients" => Route::Patients,
            _ => match path.strip_prefix("/api/patients/") {
                Some(id) if !id.is_empty() && !id.contains('/') => Route::Patient(id),
                _ => Route::Unknown,
            },
        }
    }

    fn delay_for(&self, route: &Route<'_>) -> Duration {
        if let Some(latency) = self.latency {
            return latency;
        }
        match route {
            Route::Dashboard => DASHBOARD_DELAY,
            Route::Patients => PATIENTS_DELAY,
            Route::DashboardPart(_) | Route::Patient(_) | Route::Unknown => DETAIL_DELAY,
        }
    }

    fn respond(route: &Route<'_>) -> Response {
        match route {
            Route::Dashboard => Response::ok(DASHBOARD_FIXTURE),
            Route::DashboardPart(field) => {
                match serde_json::from_str::<Value>(DASHBOARD_FIXTURE) {
                    Ok(Value::Object(mut dashboard)) => match dashboard.remove(*field) {
                        Some(part) => Response::ok(part.to_string()),
                        None => Response::not_found("Not Found"),
                    },
                    _ => Self::broken_fixture("dashboard"),
                }
            }
            Route::Patients => Response::ok(PATIENTS_FIXTURE),
            Route::Patient(id) => match serde_json::from_str::<Vec<Value>>(PATIENTS_FIXTURE) {
                Ok(patients) => patients
                    .into_iter()
                    .find(|p| p.get("id").and_then(Value::as_str) == Some(*id))
                    .map_or_else(
                        || Response::not_found("Patient not found"),
                        |patient| Response::ok(patient.to_string()),
                    ),
                Err(_) => Self::broken_fixture("patients"),
            },
            Route::Unknown => Response::not_found("Not Found"),
        }
    }

    fn broken_fixture(name: &str) -> Response {
        warn!(fixture = name, "fixture is not valid JSON");
        Response::new(500, "Internal Server Error", "")
    }
}

#[async_trait]
impl Transport for MockResponder {
    async fn get(&self, path: &str) -> Result<Response, QueryError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let route = Self::route(path);
        let delay = self.delay_for(&route);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let response = Self::respond(&route);
        debug!(path, status = response.status, "mock response");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_patients_route() {
        let mock = MockResponder::instant();
        let response = mock.get("/api/patients").await.expect("mock never fails");
        assert_eq!(response.status, 200);
        let patients: Vec<Value> = response.json().expect("fixture is valid");
        assert_eq!(patients.len(), 10);
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_patient_detail_route() {
        let mock = MockResponder::instant();
        let response = mock.get("/api/patients/2").await.unwrap();
        let patient: Value = response.json().unwrap();
        assert_eq!(patient["name"], "John Smith");

        let missing = mock.get("/api/patients/99").await.unwrap();
        assert_eq!(missing.status, 404);
        assert_eq!(missing.status_text, "Patient not found");
    }

    #[tokio::test]
    async fn test_dashboard_routes() {
        let mock = MockResponder::instant();
        let dashboard: Value = mock.get("/api/dashboard").await.unwrap().json().unwrap();
        assert!(dashboard.get("statistics").is_some());
        assert!(dashboard.get("features").is_some());
        assert!(dashboard.get("quickActions").is_some());

        let actions: Vec<Value> = mock
            .get("/api/dashboard/quick-actions")
            .await
            .unwrap()
            .json()
            .unwrap();
        assert_eq!(actions.len(), 3);

        let stats: Value = mock
            .get("/api/dashboard/statistics?fresh=1")
            .await
            .unwrap()
            .json()
            .unwrap();
        assert_eq!(stats["totalPatients"], 1247);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let mock = MockResponder::instant();
        for path in ["/api/unknown", "/api/patients/1/notes", "/api/dashboard/other"] {
            let response = mock.get(path).await.unwrap();
            assert_eq!(response.status, 404, "{path}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_delays() {
        let mock = MockResponder::new();
        let start = tokio::time::Instant::now();
        mock.get("/api/patients").await.unwrap();
        assert!(start.elapsed() >= PATIENTS_DELAY);
    }
}
