//! Indico connector: blocking entry points over the asynchronous Indico
//! submissions service.
//!
//! Hosts such as RPA bots can only call plain functions and display a
//! message when something goes wrong. This crate bridges that world to a
//! service whose work completes eventually:
//!
//! - [`status`]: the closed submission status vocabulary and its parsers
//! - [`readiness`]: whether a fetched snapshot lets polling stop
//! - [`awaiter`]: fixed-interval polling bounded by a deadline and a
//!   cancellation token
//! - [`review`]: submit a review, then wait for the job applying it
//! - [`facade`]: the synchronous [`Connector`] and its error flattening
//!
//! The remote service itself sits behind [`client::SubmissionsClient`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use indico_connector::client::SubmissionsClient;
//! use indico_connector::{Connector, ConnectorConfig};
//!
//! # fn client(token: &str, uri: &url::Url) -> indico_connector::Result<Arc<dyn SubmissionsClient>> { unimplemented!() }
//! let connector = Connector::new(ConnectorConfig::default(), client)?;
//! connector.init("my-token", "https://app.indico.io")?;
//! let snapshot = connector.submission_result(42, Some("COMPLETE"), None, None)?;
//! println!("{snapshot}");
//! # Ok::<(), indico_connector::HostError>(())
//! ```

pub mod awaiter;
pub mod client;
pub mod config;
pub mod error;
pub mod facade;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;
pub mod model;
pub mod readiness;
pub mod review;
pub mod status;

pub use client::{ClientFactory, SubmissionsClient};
pub use config::ConnectorConfig;
pub use error::{ConnectorError, HostError, Result};
pub use facade::Connector;
pub use model::{
    JobId, ListQuery, ReviewRequest, Snapshot, Submission, SubmissionFilter, SubmissionSources,
};
pub use status::SubmissionStatus;
