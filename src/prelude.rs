//! Prelude module for convenient imports.
//!
//! ```
//! use ward::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`QueryClient`], [`QueryOptions`], [`QueryKey`] and [`QueryObserver`] - the query cache
//! - [`Mutation`] - side effects that invalidate queries
//! - [`PatientsApi`] and [`DashboardApi`] - the data-access capabilities
//! - [`use_patients`], [`use_patient`] and [`use_landing`] - the hooks
//! - [`Subscription`] - streams of query results

pub use crate::landing::{DashboardApi, use_landing};
pub use crate::patients::{PatientsApi, use_patient, use_patients};
pub use crate::query::{
    Mutation, QueryClient, QueryError, QueryKey, QueryObserver, QueryOptions, QueryStatus,
};
pub use crate::subscription::Subscription;
