//! Client-side sync for a remote record collection.
//!
//! # Overview
//! Lists, creates, updates and deletes records of one record type in a remote
//! store and keeps a local, ordered list of display items consistent with it.
//! A small account monitor reports whether the cloud account is usable.
//!
//! # Design
//! - `RecordClient` is stateless: `build_*` produces a plain-data request,
//!   `parse_*` consumes a plain-data response (host-does-IO).
//! - `RecordStore` / `AccountService` are the seams to the remote service;
//!   `HttpRecordStore` implements both over a `Transport`.
//! - `RecordSync` is a single-owner actor: only it mutates `ViewState`, and
//!   observers read it through a `watch` channel.
//! - Local list state only changes on confirmed completions.

pub mod account;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod item;
pub mod store;
pub mod sync;
pub mod transport;
pub mod types;

pub use account::{AccountError, AccountMonitor, AccountState};
pub use client::RecordClient;
pub use config::SyncConfig;
pub use error::{ApiError, SyncError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use item::{Item, NAME_FIELD};
pub use store::{AccountService, RecordStore};
pub use sync::{RecordSync, ViewState};
pub use transport::{HttpRecordStore, Transport, UreqTransport};
pub use types::{
    AccountStatus, PermissionStatus, QueryOutcome, Record, RecordFailure, RecordId, UserIdentity,
};
