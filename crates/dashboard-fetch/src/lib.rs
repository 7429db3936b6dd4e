//! Data-fetching hooks for the dashboard REST API.
//!
//! Provides:
//! - `HttpTransport` seam with a reqwest implementation (feature: reqwest)
//! - `ApiClient` - auth headers, 401 eviction, failure notices
//! - `RequestHook` - single request/response cycle with observable state
//! - Polling on a fixed interval
//! - Typed mutations used by the dashboard forms
//! - Scripted transport for downstream tests (feature: mock)

pub mod api;
pub mod client;
pub mod error;
pub mod hook;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod polling;
pub mod transport;

pub use api::DashboardApi;
pub use client::ApiClient;
pub use error::{ErrorKind, FetchError};
pub use hook::{ExecuteOverrides, FetchOptions, RequestHook, RequestState};
pub use polling::PollTimer;
pub use transport::{FormPart, HttpRequest, HttpResponse, HttpTransport, Method, RequestBody};

#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
