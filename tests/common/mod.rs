#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;

use kb_upload_guard::error::ServiceError;
use kb_upload_guard::models::{Readiness, StagedFile};
use kb_upload_guard::notify::{Level, Notification, Notifier};
use kb_upload_guard::scope::{ActiveScopeGuard, UploadObserver};
use kb_upload_guard::services::{CollectionResolver, NameChecker, UploadTransport};

// let spawned tasks run on the current-thread test runtime
pub async fn flush() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub struct ResolveCall {
    pub scope: String,
    pub cancel: CancellationToken,
    reply: Option<oneshot::Sender<Result<Readiness, ServiceError>>>,
}

/// resolver whose requests stay open until the test answers them
#[derive(Default)]
pub struct ControlledResolver {
    calls: Mutex<Vec<ResolveCall>>,
}

impl ControlledResolver {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn scopes(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.scope.clone()).collect()
    }

    /// requests whose cancellation token has not fired
    pub fn live_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !c.cancel.is_cancelled())
            .count()
    }

    pub fn is_cancelled(&self, index: usize) -> bool {
        self.calls.lock().unwrap()[index].cancel.is_cancelled()
    }

    pub fn complete(&self, index: usize, result: Result<Readiness, ServiceError>) {
        let reply = self.calls.lock().unwrap()[index].reply.take();
        if let Some(tx) = reply {
            let _ = tx.send(result);
        }
    }
}

#[async_trait]
impl CollectionResolver for ControlledResolver {
    async fn resolve(&self, scope: &str, cancel: CancellationToken) -> Result<Readiness, ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push(ResolveCall {
            scope: scope.to_string(),
            cancel,
            reply: Some(tx),
        });
        rx.await.unwrap_or(Err(ServiceError::Cancelled))
    }
}

/// name checker with a fixed answer
pub struct StaticNames {
    pub answer: Mutex<Option<Result<bool, ServiceError>>>,
    pub gate: Option<Arc<Notify>>,
    pub calls: AtomicUsize,
}

impl StaticNames {
    pub fn new(answer: Result<bool, ServiceError>) -> Self {
        Self {
            answer: Mutex::new(Some(answer)),
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn gated(answer: Result<bool, ServiceError>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(answer)
        }
    }
}

#[async_trait]
impl NameChecker for StaticNames {
    async fn name_exists(&self, _name: &str) -> Result<bool, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.answer.lock().unwrap().take().unwrap_or(Ok(false))
    }
}

/// transport returning queued outcomes, optionally held until released
pub struct MockTransport {
    pub outcomes: Mutex<VecDeque<Result<serde_json::Value, ServiceError>>>,
    pub calls: Mutex<Vec<(String, String)>>,
    pub started: Arc<Notify>,
    pub gate: Option<Arc<Notify>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            started: Arc::new(Notify::new()),
            gate: None,
        }
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn push(&self, outcome: Result<serde_json::Value, ServiceError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl UploadTransport for MockTransport {
    async fn upload(&self, file: &StagedFile, target: &str) -> Result<serde_json::Value, ServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push((file.name.clone(), target.to_string()));
        self.started.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(serde_json::json!({ "success": true })))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn count(&self, level: Level) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.level == level)
            .count()
    }

    pub fn errors(&self) -> usize {
        self.count(Level::Error)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub completed: AtomicUsize,
    pub selections: Mutex<Vec<Vec<String>>>,
}

impl RecordingObserver {
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn last_selection(&self) -> Option<Vec<String>> {
        self.selections.lock().unwrap().last().cloned()
    }
}

impl UploadObserver for RecordingObserver {
    fn upload_complete(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn files_selected(&self, files: &[StagedFile]) {
        self.selections
            .lock()
            .unwrap()
            .push(files.iter().map(|f| f.name.clone()).collect());
    }
}

pub struct Harness {
    pub guard: ActiveScopeGuard,
    pub resolver: Arc<ControlledResolver>,
    pub names: Arc<StaticNames>,
    pub notifier: Arc<RecordingNotifier>,
    pub observer: Arc<RecordingObserver>,
}

pub fn harness() -> Harness {
    harness_with_names(StaticNames::new(Ok(false)))
}

pub fn harness_with_names(names: StaticNames) -> Harness {
    let resolver = Arc::new(ControlledResolver::default());
    let names = Arc::new(names);
    let notifier = Arc::new(RecordingNotifier::default());
    let observer = Arc::new(RecordingObserver::default());
    let guard = ActiveScopeGuard::builder(resolver.clone(), names.clone())
        .notifier(notifier.clone())
        .observer(observer.clone())
        .build();
    Harness {
        guard,
        resolver,
        names,
        notifier,
        observer,
    }
}

pub fn text_file(name: &str) -> StagedFile {
    StagedFile::new(name, Some("text/plain"), b"hello world".to_vec())
}
