//! The seams between the sync logic and the remote service.
//!
//! `RecordSync` and `AccountMonitor` only ever talk to these traits. The
//! HTTP-backed implementation lives in `transport.rs`; tests plug in
//! in-memory fakes.

use std::future::Future;

use crate::error::ApiError;
use crate::types::{AccountStatus, PermissionStatus, QueryOutcome, Record, RecordId, UserIdentity};

/// A remote collection of records addressed by identity.
pub trait RecordStore: Send + Sync + 'static {
    /// Fetch every record of `record_type`. Individual records may come back
    /// as failures without failing the whole query.
    fn query_all(&self, record_type: &str) -> impl Future<Output = Result<QueryOutcome, ApiError>> + Send;

    /// Create or replace `record` by its id and return what was stored.
    fn save(&self, record: Record) -> impl Future<Output = Result<Record, ApiError>> + Send;

    /// Delete the record with `id`, returning the id on success.
    fn delete(&self, id: RecordId) -> impl Future<Output = Result<RecordId, ApiError>> + Send;
}

/// Account and permission queries. Only used to set display flags.
pub trait AccountService: Send + Sync + 'static {
    fn account_status(&self) -> impl Future<Output = Result<AccountStatus, ApiError>> + Send;

    fn request_discoverability(&self) -> impl Future<Output = Result<PermissionStatus, ApiError>> + Send;

    fn fetch_user_record_id(&self) -> impl Future<Output = Result<RecordId, ApiError>> + Send;

    /// `None` when the user is not discoverable.
    fn discover_user_identity(
        &self,
        user: RecordId,
    ) -> impl Future<Output = Result<Option<UserIdentity>, ApiError>> + Send;
}
