//! In-memory collaborators for orchestrator tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use peduli_core::error::CoreError;
use peduli_core::lifecycle::EntityKind;
use peduli_core::list_view::ListController;
use peduli_core::notify::{Notification, Notifier, Severity};
use peduli_core::remote::{Confirmer, EntityApi, ListPage, ListQuery, ListRow};
use peduli_core::types::DbId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("server rejected {call} for {id}")]
pub struct FakeError {
    pub call: &'static str,
    pub id: DbId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Delete(DbId),
    PatchStatus(DbId, String),
    Update(DbId),
}

/// Table of rows for one entity kind, with scripted failures.
#[derive(Default)]
pub struct FakeApi {
    rows: Mutex<BTreeMap<DbId, ListRow>>,
    failing: Mutex<HashSet<DbId>>,
    calls: Mutex<Vec<Call>>,
    fail_list: AtomicBool,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeApi {
    pub fn with_rows(rows: &[(DbId, Option<&str>)]) -> Arc<Self> {
        let api = Self::default();
        {
            let mut table = api.rows.lock().unwrap();
            for (id, status) in rows {
                table.insert(*id, ListRow::new(*id, *status));
            }
        }
        Arc::new(api)
    }

    pub fn fail_on(&self, ids: &[DbId]) {
        self.failing.lock().unwrap().extend(ids.iter().copied());
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ids(&self) -> Vec<DbId> {
        self.rows.lock().unwrap().keys().copied().collect()
    }

    pub fn status_of(&self, id: DbId) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .get(&id)
            .and_then(|row| row.status.clone())
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn remote_call(&self, call: Call, id: DbId, name: &'static str) -> Result<(), FakeError> {
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        for _ in 0..(id % 3 + 1) {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&id) {
            Err(FakeError { call: name, id })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EntityApi for FakeApi {
    type Error = FakeError;

    async fn list(&self, _kind: EntityKind, query: &ListQuery) -> Result<ListPage, FakeError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(FakeError { call: "list", id: 0 });
        }
        let rows = self.rows.lock().unwrap();
        let matching: Vec<ListRow> = rows
            .values()
            .filter(|row| match &query.status {
                Some(status) => row.status.as_deref() == Some(status.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok(ListPage { items, total })
    }

    async fn delete(&self, _kind: EntityKind, id: DbId) -> Result<(), FakeError> {
        self.remote_call(Call::Delete(id), id, "delete").await?;
        self.rows.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn patch_status(
        &self,
        _kind: EntityKind,
        id: DbId,
        status: &str,
        _metadata: &serde_json::Value,
    ) -> Result<(), FakeError> {
        self.remote_call(Call::PatchStatus(id, status.to_string()), id, "patch_status")
            .await?;
        if let Some(row) = self.rows.lock().unwrap().get_mut(&id) {
            row.status = Some(status.to_string());
        }
        Ok(())
    }

    async fn update(
        &self,
        _kind: EntityKind,
        id: DbId,
        _fields: &serde_json::Value,
    ) -> Result<(), FakeError> {
        self.remote_call(Call::Update(id), id, "update").await
    }
}

/// Notifier that keeps every notification for inspection.
#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<(Severity, String)> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|n| (n.severity, n.message.clone()))
            .collect()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.all().iter().filter(|(s, _)| *s == severity).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

/// Confirmer with a fixed answer that remembers the prompts it was shown.
pub struct ScriptedConfirmer {
    answer: bool,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer
    }
}

/// Confirmer that tries to toggle a row on the view while its prompt is
/// open, then confirms. Each attempt's result is kept.
pub struct TogglingConfirmer {
    view: Arc<ListController<FakeApi>>,
    toggle: DbId,
    attempts: Mutex<Vec<Result<(), CoreError>>>,
}

impl TogglingConfirmer {
    pub fn new(view: Arc<ListController<FakeApi>>, toggle: DbId) -> Arc<Self> {
        Arc::new(Self {
            view,
            toggle,
            attempts: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> Vec<Result<(), CoreError>> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Confirmer for TogglingConfirmer {
    async fn confirm(&self, _prompt: &str) -> bool {
        let attempt = self.view.toggle(self.toggle);
        self.attempts.lock().unwrap().push(attempt);
        true
    }
}
