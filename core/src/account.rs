//! Cloud account status and user discoverability, as display flags.
//!
//! `AccountMonitor` runs three independent checks (account status, the
//! discoverability permission request, and the signed-in user's identity) and
//! publishes each answer into an `AccountState` as soon as it arrives. None of
//! it gates record operations.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::store::AccountService;
use crate::types::{AccountStatus, PermissionStatus};

/// Why the cloud account cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountError {
    NotFound,
    NotDetermined,
    Restricted,
    Unknown,
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AccountError::NotFound => "no cloud account is signed in",
            AccountError::NotDetermined => "cloud account status could not be determined",
            AccountError::Restricted => "cloud account is restricted",
            AccountError::Unknown => "cloud account status is unknown",
        };
        f.write_str(text)
    }
}

impl AccountStatus {
    /// `Ok` only for an available account.
    pub fn check(self) -> Result<(), AccountError> {
        match self {
            AccountStatus::Available => Ok(()),
            AccountStatus::NoAccount => Err(AccountError::NotFound),
            AccountStatus::CouldNotDetermine => Err(AccountError::NotDetermined),
            AccountStatus::Restricted => Err(AccountError::Restricted),
            AccountStatus::Unknown => Err(AccountError::Unknown),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountState {
    pub signed_in: bool,
    pub error: Option<SyncError>,
    pub permission_granted: bool,
    pub user_name: Option<String>,
    /// Checks still running; zero once everything has reported.
    pub pending: usize,
}

const CHECKS: usize = 3;

pub struct AccountMonitor {
    state: watch::Receiver<AccountState>,
}

impl AccountMonitor {
    /// Start all checks on the current tokio runtime.
    pub fn spawn<A: AccountService>(service: Arc<A>) -> Self {
        let (publisher, state) = watch::channel(AccountState {
            pending: CHECKS,
            ..AccountState::default()
        });
        let publisher = Arc::new(publisher);

        let (svc, tx) = (Arc::clone(&service), Arc::clone(&publisher));
        tokio::spawn(async move {
            let result = svc.account_status().await;
            tx.send_modify(|s| {
                apply_status(s, result);
                s.pending -= 1;
            });
        });

        let (svc, tx) = (Arc::clone(&service), Arc::clone(&publisher));
        tokio::spawn(async move {
            let granted = match svc.request_discoverability().await {
                Ok(status) => status == PermissionStatus::Granted,
                Err(e) => {
                    warn!(error = %e, "discoverability request failed");
                    false
                }
            };
            tx.send_modify(|s| {
                s.permission_granted = granted;
                s.pending -= 1;
            });
        });

        let (svc, tx) = (service, publisher);
        tokio::spawn(async move {
            let name = discover_given_name(svc.as_ref()).await;
            tx.send_modify(|s| {
                s.user_name = name;
                s.pending -= 1;
            });
        });

        Self { state }
    }

    pub fn state(&self) -> AccountState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AccountState> {
        self.state.clone()
    }

    /// Wait until every check has reported and return the final state.
    pub async fn settled(&self) -> AccountState {
        let mut state = self.state.clone();
        let settled = state.wait_for(|s| s.pending == 0).await.map(|s| s.clone());
        // A check task died before reporting; hand back what we have.
        settled.unwrap_or_else(|_| self.state.borrow().clone())
    }
}

fn apply_status(state: &mut AccountState, result: Result<AccountStatus, crate::error::ApiError>) {
    let status = match result {
        Ok(status) => status,
        Err(e) => {
            warn!(error = %e, "account status unavailable");
            AccountStatus::Unknown
        }
    };
    debug!(?status, "account status");
    match status.check() {
        Ok(()) => state.signed_in = true,
        Err(e) => state.error = Some(SyncError::AccountUnavailable(e)),
    }
}

async fn discover_given_name<A: AccountService>(service: &A) -> Option<String> {
    let user = match service.fetch_user_record_id().await {
        Ok(user) => user,
        Err(e) => {
            debug!(error = %e, "no user record id");
            return None;
        }
    };
    match service.discover_user_identity(user).await {
        Ok(identity) => identity.and_then(|identity| identity.given_name),
        Err(e) => {
            warn!(error = %e, "identity discovery failed");
            None
        }
    }
}
