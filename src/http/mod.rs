//! HTTP fetch module
//!
//! Provides the rate-limited fetcher every other component goes through.
//!
//! # Features
//!
//! - **Bounded Retries**: linear backoff on throttle statuses, fixed interval on
//!   transport failures
//! - **End-of-data**: `422` is reported as `Ok(None)` and never retried
//! - **Request Spacing**: minimum interval between requests using governor
//! - **Credential Injection**: appended as a query parameter when missing

mod client;
mod rate_limit;

pub use client::{Fetcher, HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use rate_limit::RequestSpacer;
