//! # Ward - data layer for a hospital dashboard
//!
//! Ward fetches, caches and shares the data a hospital front end shows: the
//! patient list, patient details and the landing dashboard. Consumers
//! subscribe to declarative queries; a shared [`QueryClient`](query::QueryClient)
//! deduplicates requests, keeps results fresh and drops what nobody uses.
//!
//! ## Core Components
//!
//! - [`query`]: the query cache (keys, options, observers, retries, garbage collection, mutations)
//! - [`patients`] and [`landing`]: typed resources with services, query factories and hooks
//! - [`transport`]: how requests are answered, by the mock responder or a real endpoint
//! - [`subscription`]: streams of query results and lifecycle events
//! - [`settings`] and [`telemetry`]: configuration and logging for the binary
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use ward::patients::{PatientsService, use_patients};
//! use ward::query::QueryClient;
//! use ward::transport::mock::MockResponder;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let client = QueryClient::new();
//! let service = Arc::new(PatientsService::new(MockResponder::instant()));
//! let mut patients = use_patients(&client, service);
//!
//! let view = patients.settled("maria").await;
//! assert_eq!(view.patients.len(), 1);
//! assert_eq!(view.patients[0].dni, "12345678-9");
//! # }
//! ```

pub mod landing;
pub mod patients;
pub mod prelude;
pub mod query;
pub mod settings;
pub mod subscription;
pub mod telemetry;
pub mod transport;
