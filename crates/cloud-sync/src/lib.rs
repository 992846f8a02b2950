//! HTTP client for the Bloomtrack cloud document API.

mod client;
mod error;
mod types;

pub use client::{AccessTokenProvider, DocumentApiClient, StaticAccessToken};
pub use error::{ApiRetryClass, CloudSyncError, Result};
pub use types::*;
