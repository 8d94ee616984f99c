//! Keeps a displayable list consistent with the remote record collection.
//!
//! # Design
//! One actor task owns `ViewState` and is the only code that mutates it.
//! `RecordSync` handles send commands over an `mpsc` channel; the actor turns
//! each command into a network call spawned on a `JoinSet`, and applies the
//! call's completion when it comes back. Every change is published on a
//! `watch` channel, so a UI observes state without sharing it.
//!
//! Reconciliation rules:
//! - refresh replaces the whole list; failed refreshes leave it alone;
//! - create and update never touch the list directly, a successful save
//!   clears the input buffer and triggers a refresh;
//! - delete removes the deleted record from the list only once the store
//!   confirms it, matching by record id rather than by position.
//!
//! Completions apply in arrival order. Two overlapping refreshes are not
//! de-duplicated: whichever completes last determines the list.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::{ApiError, SyncError};
use crate::item::{self, Item, NAME_FIELD};
use crate::store::RecordStore;
use crate::types::{QueryOutcome, Record, RecordId};

/// Everything a UI renders, published after each change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub items: Vec<Item>,
    /// Pending text input.
    pub input: String,
    /// The most recent operation failure, cleared by a successful refresh.
    pub last_error: Option<SyncError>,
    /// Records left out of `items` by the last successful refresh.
    pub skipped: Vec<SyncError>,
    /// Network calls issued and not yet completed.
    pub in_flight: usize,
}

type Reply<T> = oneshot::Sender<Result<T, SyncError>>;

enum Command {
    Refresh(Reply<Vec<Item>>),
    SetInput { text: String, reply: Reply<()> },
    Submit(Reply<Record>),
    Create { name: String, reply: Reply<Record> },
    Update { item: Item, name: String, reply: Reply<Record> },
    Delete { index: usize, reply: Reply<RecordId> },
    ClearError(Reply<()>),
    Shutdown,
}

enum Completion {
    Listed {
        result: Result<QueryOutcome, SyncError>,
        then: AfterList,
    },
    Saved {
        result: Result<Record, SyncError>,
        reply: Reply<Record>,
    },
    Deleted {
        result: Result<RecordId, SyncError>,
        reply: Reply<RecordId>,
    },
}

/// Who is waiting on a refresh.
enum AfterList {
    Caller(Reply<Vec<Item>>),
    /// A save succeeded; its caller gets the saved record once the list is
    /// resynced, even if the resync itself fails.
    Save(Record, Reply<Record>),
    /// Initial load requested by `spawn_and_refresh`.
    Startup,
}

/// Handle to the sync actor. Cheap to clone; the actor stops when the last
/// handle is dropped or `shutdown` is called.
#[derive(Clone)]
pub struct RecordSync {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ViewState>,
}

impl RecordSync {
    /// Start the actor on the current tokio runtime.
    pub fn spawn<S: RecordStore>(store: Arc<S>, config: SyncConfig) -> Self {
        Self::start(store, config, false)
    }

    /// Start the actor and have it load the list right away. Progress shows
    /// up in the published state; a failed load lands in `last_error`.
    pub fn spawn_and_refresh<S: RecordStore>(store: Arc<S>, config: SyncConfig) -> Self {
        Self::start(store, config, true)
    }

    fn start<S: RecordStore>(store: Arc<S>, config: SyncConfig, load: bool) -> Self {
        let (commands, inbox) = mpsc::channel(config.command_buffer.max(1));
        let (publisher, state) = watch::channel(ViewState::default());
        let mut actor = Actor {
            store,
            config,
            state: publisher,
            tasks: JoinSet::new(),
        };
        if load {
            actor.start_refresh(AfterList::Startup);
        }
        tokio::spawn(actor.run(inbox));
        Self { commands, state }
    }

    /// Fetch every record and replace the list with the displayable ones.
    pub async fn refresh(&self) -> Result<Vec<Item>, SyncError> {
        self.request(Command::Refresh).await
    }

    pub async fn set_input(&self, text: impl Into<String>) -> Result<(), SyncError> {
        let text = text.into();
        self.request(|reply| Command::SetInput { text, reply }).await
    }

    /// Create a record named after the current input buffer.
    pub async fn submit(&self) -> Result<Record, SyncError> {
        self.request(Command::Submit).await
    }

    /// Save a new record called `name`, then resync the list.
    pub async fn create(&self, name: impl Into<String>) -> Result<Record, SyncError> {
        let name = name.into();
        self.request(|reply| Command::Create { name, reply }).await
    }

    /// Rename the record behind `item`, then resync the list.
    pub async fn update(&self, item: &Item, new_name: impl Into<String>) -> Result<Record, SyncError> {
        let item = item.clone();
        let name = new_name.into();
        self.request(|reply| Command::Update { item, name, reply }).await
    }

    /// Delete the item at `index` in the current list.
    pub async fn delete(&self, index: usize) -> Result<RecordId, SyncError> {
        self.request(|reply| Command::Delete { index, reply }).await
    }

    /// Delete using a list selection. Only the first selected index is used;
    /// an empty selection does nothing.
    pub async fn delete_selection(&self, selection: &BTreeSet<usize>) -> Result<Option<RecordId>, SyncError> {
        match selection.first() {
            Some(&index) => self.delete(index).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn clear_error(&self) -> Result<(), SyncError> {
        self.request(Command::ClearError).await
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.clone()
    }

    /// Stop the actor. In-flight calls are aborted and their callers get
    /// `SyncError::Closed`.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, SyncError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| SyncError::Closed)?;
        response.await.map_err(|_| SyncError::Closed)?
    }
}

struct Actor<S> {
    store: Arc<S>,
    config: SyncConfig,
    state: watch::Sender<ViewState>,
    tasks: JoinSet<Completion>,
}

impl<S: RecordStore> Actor<S> {
    async fn run(mut self, mut inbox: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                command = inbox.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.state.send_modify(|s| s.in_flight -= 1);
                    match joined {
                        Ok(completion) => self.handle_completion(completion),
                        // Only reachable if building the completion panicked.
                        Err(e) => warn!(error = %e, "record completion lost"),
                    }
                }
            }
        }
        debug!(aborted = self.tasks.len(), "record sync stopped");
        self.tasks.shutdown().await;
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Refresh(reply) => self.start_refresh(AfterList::Caller(reply)),
            Command::SetInput { text, reply } => {
                self.state.send_modify(|s| s.input = text);
                let _ = reply.send(Ok(()));
            }
            Command::Submit(reply) => {
                let name = self.state.borrow().input.clone();
                self.start_create(name, reply);
            }
            Command::Create { name, reply } => self.start_create(name, reply),
            Command::Update { item, name, reply } => {
                if let Err(e) = validate_name(&name) {
                    let _ = reply.send(Err(e));
                    return;
                }
                let mut record = item.record;
                record.set(NAME_FIELD, name);
                self.start_save(record, reply);
            }
            Command::Delete { index, reply } => self.start_delete(index, reply),
            Command::ClearError(reply) => {
                self.state.send_modify(|s| s.last_error = None);
                let _ = reply.send(Ok(()));
            }
            Command::Shutdown => {}
        }
    }

    fn start_refresh(&mut self, then: AfterList) {
        let store = Arc::clone(&self.store);
        let record_type = self.config.record_type.clone();
        debug!(record_type = %record_type, "refreshing");
        self.spawn_call(
            "refresh",
            async move { store.query_all(&record_type).await },
            move |result| Completion::Listed { result, then },
        );
    }

    fn start_create(&mut self, name: String, reply: Reply<Record>) {
        if let Err(e) = validate_name(&name) {
            debug!("create skipped: empty name");
            let _ = reply.send(Err(e));
            return;
        }
        let record = Record::new(self.config.record_type.clone()).with(NAME_FIELD, name);
        self.start_save(record, reply);
    }

    fn start_save(&mut self, record: Record, reply: Reply<Record>) {
        let store = Arc::clone(&self.store);
        debug!(record_id = %record.id, "saving record");
        self.spawn_call(
            "save",
            async move { store.save(record).await },
            move |result| Completion::Saved { result, reply },
        );
    }

    fn start_delete(&mut self, index: usize, reply: Reply<RecordId>) {
        let target = {
            let state = self.state.borrow();
            state
                .items
                .get(index)
                .map(Item::id)
                .ok_or(SyncError::IndexOutOfRange {
                    index,
                    len: state.items.len(),
                })
        };
        let id = match target {
            Ok(id) => id,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };
        let store = Arc::clone(&self.store);
        debug!(record_id = %id, index, "deleting record");
        self.spawn_call(
            "delete",
            async move { store.delete(id).await },
            move |result| Completion::Deleted { result, reply },
        );
    }

    /// Run `call` off the actor, bounded by the configured timeout.
    ///
    /// The call runs in its own task, so a panicking store still yields a
    /// completion. Dropping the handle aborts the call on timeout or shutdown.
    fn spawn_call<T, F, C>(&mut self, operation: &'static str, call: F, complete: C)
    where
        T: Send + 'static,
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
        C: FnOnce(Result<T, SyncError>) -> Completion + Send + 'static,
    {
        let timeout = self.config.call_timeout;
        self.tasks.spawn(async move {
            let call = AbortOnDropHandle::new(tokio::spawn(call));
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(Ok(result)) => result.map_err(SyncError::from),
                Ok(Err(e)) => {
                    warn!(operation, error = %e, "record call task failed");
                    Err(SyncError::CallFailed {
                        operation,
                        message: e.to_string(),
                    })
                }
                Err(_) => Err(SyncError::Timeout(timeout)),
            };
            complete(result)
        });
        self.state.send_modify(|s| s.in_flight += 1);
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Listed { result, then } => self.finish_refresh(result, then),
            Completion::Saved { result: Ok(record), reply } => {
                self.state.send_modify(|s| s.input.clear());
                self.start_refresh(AfterList::Save(record, reply));
            }
            Completion::Saved { result: Err(e), reply } => {
                warn!(error = %e, "save failed");
                self.record_error(&e);
                let _ = reply.send(Err(e));
            }
            Completion::Deleted { result: Ok(id), reply } => {
                self.state.send_modify(|s| s.items.retain(|item| item.id() != id));
                let _ = reply.send(Ok(id));
            }
            Completion::Deleted { result: Err(e), reply } => {
                warn!(error = %e, "delete failed");
                self.record_error(&e);
                let _ = reply.send(Err(e));
            }
        }
    }

    fn finish_refresh(&mut self, result: Result<QueryOutcome, SyncError>, then: AfterList) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "refresh failed");
                self.record_error(&e);
                match then {
                    AfterList::Caller(reply) => {
                        let _ = reply.send(Err(e));
                    }
                    AfterList::Save(record, reply) => {
                        let _ = reply.send(Ok(record));
                    }
                    AfterList::Startup => {}
                }
                return;
            }
        };
        let projection = item::project(outcome);
        let items = projection.items.clone();
        debug!(items = items.len(), skipped = projection.skipped.len(), "list refreshed");
        self.state.send_modify(|s| {
            s.items = projection.items;
            s.skipped = projection.skipped;
            s.last_error = None;
        });
        match then {
            AfterList::Caller(reply) => {
                let _ = reply.send(Ok(items));
            }
            AfterList::Save(record, reply) => {
                let _ = reply.send(Ok(record));
            }
            AfterList::Startup => {}
        }
    }

    fn record_error(&self, error: &SyncError) {
        self.state.send_modify(|s| s.last_error = Some(error.clone()));
    }
}

fn validate_name(name: &str) -> Result<(), SyncError> {
    if name.is_empty() {
        return Err(SyncError::Validation("name must not be empty".to_string()));
    }
    Ok(())
}
