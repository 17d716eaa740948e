//! Active-scope guard for the knowledge base upload widget.
//!
//! The guard binds the widget's file list, readiness and loading flags to the
//! knowledge base currently selected from the outside. Each scope transition
//! bumps a generation counter and cancels the previous resolution request, so
//! an asynchronous result is only applied when the [`ScopeTicket`] it was
//! issued with still carries the current generation.
//!
//! State lives behind a short-lived `std::sync::Mutex` that is never held
//! across an `.await`. Notifier and observer callbacks run after the lock is
//! released.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ServiceError, UploadError};
use crate::file_types::is_accepted_file;
use crate::models::{FileEntry, FileStatus, Readiness, StagedFile};
use crate::name_check::{NameAvailability, NameStatus};
use crate::notify::{Notifier, TracingNotifier};
use crate::services::{CollectionResolver, NameChecker};

/// generic message for failures whose root cause is only logged
pub const RETRY_LATER: &str = "Failed to load the knowledge base, please try again later";

/// identity of the scope an asynchronous task was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTicket {
    pub generation: u64,
    /// last-seen scope at issue time, empty when none
    pub scope: String,
}

/// how a resolution request ended
#[derive(Debug)]
pub enum ResolutionOutcome {
    Ready,
    NotReady,
    Failed(ServiceError),
    Cancelled,
}

/// callbacks into the component that owns the widget
pub trait UploadObserver: Send + Sync {
    /// a batch of uploads just left the "uploading" state
    fn upload_complete(&self) {}

    /// every raw file currently in the list, in list order
    fn files_selected(&self, _files: &[StagedFile]) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl UploadObserver for NoopObserver {}

/// point-in-time copy of the guard's state
#[derive(Debug, Clone, Default)]
pub struct ScopeSnapshot {
    pub scope: Option<String>,
    pub generation: u64,
    pub creating: bool,
    pub ready: bool,
    pub loading: bool,
    pub entries: Vec<FileEntry>,
}

/// true when a list leaves the uploading state
pub fn upload_finished(previous: &[FileEntry], next: &[FileEntry]) -> bool {
    previous.iter().any(|e| e.status == FileStatus::Uploading)
        && !next.is_empty()
        && next.iter().all(|e| e.status != FileStatus::Uploading)
}

struct InFlight {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct ScopeState {
    generation: u64,
    last_seen: Option<String>,
    creating: bool,
    in_flight: Option<InFlight>,
    entries: Vec<FileEntry>,
    ready: bool,
    loading: bool,
}

impl ScopeState {
    fn ticket(&self) -> ScopeTicket {
        ScopeTicket {
            generation: self.generation,
            scope: self.last_seen.clone().unwrap_or_default(),
        }
    }

    fn snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            scope: self.last_seen.clone(),
            generation: self.generation,
            creating: self.creating,
            ready: self.ready,
            loading: self.loading,
            entries: self.entries.clone(),
        }
    }

    fn cancel_in_flight(&mut self) {
        if let Some(prev) = self.in_flight.take() {
            tracing::debug!("Cancelling resolution request of generation {}", prev.generation);
            prev.cancel.cancel();
        }
    }
}

struct GuardInner {
    state: Mutex<ScopeState>,
    resolver: Arc<dyn CollectionResolver>,
    names: NameAvailability,
    notifier: Arc<dyn Notifier>,
    observer: Arc<dyn UploadObserver>,
    snapshot_tx: watch::Sender<ScopeSnapshot>,
}

impl GuardInner {
    fn lock(&self) -> MutexGuard<'_, ScopeState> {
        // state is only ever assigned whole values, a poisoned lock is still consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, state: &ScopeState) {
        self.snapshot_tx.send_replace(state.snapshot());
    }
}

impl Drop for GuardInner {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            state.cancel_in_flight();
        }
    }
}

/// builder for [`ActiveScopeGuard`]
pub struct GuardBuilder {
    resolver: Arc<dyn CollectionResolver>,
    names: Arc<dyn NameChecker>,
    notifier: Arc<dyn Notifier>,
    observer: Arc<dyn UploadObserver>,
}

impl GuardBuilder {
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn UploadObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> ActiveScopeGuard {
        let (snapshot_tx, _rx) = watch::channel(ScopeSnapshot::default());
        ActiveScopeGuard {
            inner: Arc::new(GuardInner {
                state: Mutex::new(ScopeState::default()),
                resolver: self.resolver,
                names: NameAvailability::new(self.names),
                notifier: self.notifier,
                observer: self.observer,
                snapshot_tx,
            }),
        }
    }
}

/// cheaply cloneable handle, all clones share one scope
#[derive(Clone)]
pub struct ActiveScopeGuard {
    inner: Arc<GuardInner>,
}

impl ActiveScopeGuard {
    pub fn builder(resolver: Arc<dyn CollectionResolver>, names: Arc<dyn NameChecker>) -> GuardBuilder {
        GuardBuilder {
            resolver,
            names,
            notifier: Arc::new(TracingNotifier),
            observer: Arc::new(NoopObserver),
        }
    }

    /// bind to `scope`, explicit counterpart of mounting the widget
    pub fn start(&self, scope: &str, creating: bool) -> ScopeTicket {
        tracing::info!("📚 Binding upload widget to knowledge base '{}' (creating: {})", scope, creating);
        self.on_scope_change(scope, creating)
    }

    /// cancel outstanding work and forget the bound scope
    pub fn stop(&self) {
        let mut state = self.inner.lock();
        state.cancel_in_flight();
        state.generation += 1;
        state.last_seen = None;
        state.creating = false;
        state.entries.clear();
        state.ready = false;
        state.loading = false;
        self.inner.names.invalidate();
        self.inner.publish(&state);
        tracing::info!("Upload widget unbound (generation {})", state.generation);
    }

    /// react to the externally supplied scope, must run inside a tokio runtime
    pub fn on_scope_change(&self, new_scope: &str, creating: bool) -> ScopeTicket {
        let mut state = self.inner.lock();

        if state.creating != creating {
            state.creating = creating;
            self.inner.names.invalidate();
            self.inner.publish(&state);
        }

        if state.last_seen.as_deref() == Some(new_scope) {
            tracing::trace!("Scope '{}' unchanged, nothing to do", new_scope);
            return state.ticket();
        }

        state.cancel_in_flight();
        state.generation += 1;
        state.last_seen = Some(new_scope.to_string());
        state.entries.clear();
        state.ready = false;
        state.loading = true;
        self.inner.names.invalidate();

        let ticket = state.ticket();
        tracing::debug!("Scope changed to '{}' (generation {})", new_scope, ticket.generation);

        if new_scope.is_empty() || creating {
            // nothing to resolve yet, files are staged locally
            state.ready = true;
            state.loading = false;
        } else {
            let cancel = CancellationToken::new();
            state.in_flight = Some(InFlight {
                generation: ticket.generation,
                cancel: cancel.clone(),
            });
            self.spawn_resolution(ticket.clone(), cancel);
        }

        self.inner.publish(&state);
        ticket
    }

    fn spawn_resolution(&self, ticket: ScopeTicket, cancel: CancellationToken) {
        let weak: Weak<GuardInner> = Arc::downgrade(&self.inner);
        let resolver = Arc::clone(&self.inner.resolver);

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => ResolutionOutcome::Cancelled,
                res = resolver.resolve(&ticket.scope, cancel.clone()) => match res {
                    Ok(Readiness::Ready) => ResolutionOutcome::Ready,
                    Ok(Readiness::NotReady) => ResolutionOutcome::NotReady,
                    Err(_) if cancel.is_cancelled() => ResolutionOutcome::Cancelled,
                    Err(ServiceError::Cancelled) => ResolutionOutcome::Cancelled,
                    Err(e) => ResolutionOutcome::Failed(e),
                },
            };

            match weak.upgrade() {
                Some(inner) => {
                    ActiveScopeGuard { inner }.on_resolution_complete(&ticket, outcome);
                }
                None => tracing::trace!("Guard dropped before resolution of '{}' finished", ticket.scope),
            }
        });
    }

    /// apply a resolution result, returns false when it was discarded
    pub fn on_resolution_complete(&self, ticket: &ScopeTicket, outcome: ResolutionOutcome) -> bool {
        let mut state = self.inner.lock();

        if state.generation != ticket.generation {
            tracing::debug!(
                "Discarding stale resolution for '{}' (generation {}, current {})",
                ticket.scope,
                ticket.generation,
                state.generation
            );
            return false;
        }

        let failure = match outcome {
            ResolutionOutcome::Cancelled => {
                // the resolver gave up on its own, nothing is outstanding anymore
                tracing::trace!("Resolution for '{}' cancelled", ticket.scope);
                state.in_flight = None;
                return false;
            }
            ResolutionOutcome::Ready => {
                state.ready = true;
                None
            }
            ResolutionOutcome::NotReady => {
                tracing::info!("Knowledge base '{}' is not ready for uploads yet", ticket.scope);
                state.ready = false;
                None
            }
            ResolutionOutcome::Failed(e) => {
                tracing::error!("Failed to resolve knowledge base '{}': {}", ticket.scope, e);
                state.ready = false;
                Some(e)
            }
        };
        state.loading = false;
        state.in_flight = None;
        self.inner.publish(&state);
        drop(state);

        if failure.is_some() {
            self.inner.notifier.error(RETRY_LATER);
        }
        true
    }

    /// replace the whole file list, returns false when the change was discarded
    pub fn on_file_list_change(&self, origin: &str, entries: Vec<FileEntry>) -> bool {
        self.modify_entries(origin, move |_| entries)
    }

    /// compute the next list from the current one under a single lock
    pub fn modify_entries<F>(&self, origin: &str, f: F) -> bool
    where
        F: FnOnce(&[FileEntry]) -> Vec<FileEntry>,
    {
        let mut state = self.inner.lock();

        if !(state.creating || state.last_seen.as_deref() == Some(origin)) {
            tracing::debug!(
                "Ignoring file list change from '{}', bound to {:?}",
                origin,
                state.last_seen
            );
            return false;
        }

        let next = f(&state.entries);
        let finished = upload_finished(&state.entries, &next);
        state.entries = next;
        let selected: Vec<StagedFile> = state.entries.iter().filter_map(|e| e.file.clone()).collect();
        self.inner.publish(&state);
        drop(state);

        if finished {
            tracing::info!("📦 Upload batch finished for '{}'", origin);
            self.inner.observer.upload_complete();
        }
        self.inner.observer.files_selected(&selected);
        true
    }

    /// set the status of one entry
    pub fn set_status(&self, origin: &str, uid: Uuid, status: FileStatus) -> bool {
        self.modify_entries(origin, |entries| {
            entries
                .iter()
                .cloned()
                .map(|e| if e.uid == uid { e.with_status(status) } else { e })
                .collect()
        })
    }

    /// gate files by type and append the accepted ones as pending entries
    pub fn stage_files(&self, origin: &str, files: Vec<StagedFile>) -> usize {
        let mut accepted = Vec::new();
        for file in files {
            if is_accepted_file(&file) {
                accepted.push(FileEntry::pending(file));
            } else {
                tracing::warn!("Rejected {} ({:?})", file.name, file.media_type);
                let err = UploadError::UnsupportedFileType(file.name);
                self.inner.notifier.error(&err.to_string());
            }
        }

        if accepted.is_empty() {
            return 0;
        }

        let count = accepted.len();
        let applied = self.modify_entries(origin, move |entries| {
            let mut next = entries.to_vec();
            next.extend(accepted);
            next
        });
        if applied {
            tracing::debug!("Staged {} files for '{}'", count, origin);
            count
        } else {
            0
        }
    }

    /// check whether a new knowledge base name is already taken
    pub async fn check_name(&self, name: &str) -> Result<NameStatus, UploadError> {
        let status = self.inner.names.check(name).await.map_err(|e| {
            self.inner.notifier.error(&e.to_string());
            e
        })?;
        if status == NameStatus::Taken {
            self.inner
                .notifier
                .warning(&format!("Knowledge base '{}' already exists", name.trim()));
        }
        Ok(status)
    }

    pub fn ticket(&self) -> ScopeTicket {
        self.inner.lock().ticket()
    }

    /// ticket of the bound scope, `None` after [`stop`](Self::stop) or before any start
    pub fn bound_ticket(&self) -> Option<ScopeTicket> {
        let state = self.inner.lock();
        state.last_seen.as_ref().map(|_| state.ticket())
    }

    /// true while no scope transition or stop happened since `ticket` was issued
    pub fn is_current(&self, ticket: &ScopeTicket) -> bool {
        self.inner.lock().generation == ticket.generation
    }

    pub fn last_seen(&self) -> Option<String> {
        self.inner.lock().last_seen.clone()
    }

    pub fn is_creating(&self) -> bool {
        self.inner.lock().creating
    }

    pub fn is_ready(&self) -> bool {
        self.inner.lock().ready
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().loading
    }

    pub fn has_pending_resolution(&self) -> bool {
        self.inner.lock().in_flight.is_some()
    }

    pub fn entries(&self) -> Vec<FileEntry> {
        self.inner.lock().entries.clone()
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.inner.notifier)
    }

    pub fn snapshot(&self) -> ScopeSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScopeSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// wait until the current scope is no longer loading
    pub async fn wait_settled(&self) -> ScopeSnapshot {
        let mut rx = self.subscribe();
        let settled = rx.wait_for(|s| !s.loading).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }
}
