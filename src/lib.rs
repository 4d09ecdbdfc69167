//! `rec-helper` wraps a recommendation-platform SDK client with the control
//! flow its data endpoints need:
//! - [`RequestHelper::do_with_retry`] retries timeouts under one request id
//! - [`RequestHelper::do_with_retry_although_overload`] backs off while the
//!   server is overloaded
//! - [`RequestHelper::do_import`] submits an import and polls its operation
//! - [`ConcurrentHelper`] runs writes, imports, done markers and callbacks on
//!   a fixed pool of background workers

mod client;
mod dispatcher;
mod error;
mod helper;
mod options;
pub mod protocol;
pub mod status;

pub use client::{Client, RequestKind, Vertical};
pub use dispatcher::{ConcurrentHelper, Observer, Submission, TaskOutcome, TaskReport};
pub use error::RecError;
pub use helper::RequestHelper;
pub use options::{ensure_request_id, HelperOptions, RequestOptions};

pub type Result<T> = std::result::Result<T, RecError>;
