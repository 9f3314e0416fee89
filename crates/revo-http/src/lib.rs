//! # revo-http
//!
//! Typed REST client for the dashboard API.
//!
//! - [`ApiClient::request`] attaches JSON and bearer-auth headers, retries
//!   5xx/network/timeout failures, and decodes JSON into the caller's type
//! - [`ApiError`] separates client (4xx), server (5xx) and network failures
//! - [`ApiClient::reachability`] publishes an "is reachable" flag for
//!   offline indicators
//! - [`TokenStore`] supplies the bearer token (in memory or `~/.revo/auth.json`)

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod token;

pub use client::{ApiClient, RequestOptions};
pub use config::ApiConfig;
pub use dashboard::DashboardApi;
pub use errors::ApiError;
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError};
pub use reqwest::Method;
