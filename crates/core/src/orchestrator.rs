//! Batch and single-row actions for list screens.
//!
//! [`BatchActionOrchestrator`] ties a [`ListController`]'s selection to the
//! batch executor and the lifecycle table:
//!
//! 1. Read the selection; nothing selected is a no-op.
//! 2. Drop rows whose status does not allow the action (one warning).
//! 3. Ask the [`Confirmer`], if one is configured.
//! 4. Raise the view's busy flag for the rest of the run.
//! 5. Run the per-row remote call with a bounded number in flight.
//! 6. Keep only failed rows selected (or clear), report the counts.
//! 7. Refetch the list regardless of failures, then drop the busy flag.

use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::batch::{run_with_concurrency, BatchOutcome};
use crate::error::CoreError;
use crate::lifecycle::{self, EntityKind};
use crate::list_view::{ListController, ViewError};
use crate::notify::{Notification, Notifier};
use crate::remote::{Confirmer, EntityApi, ListRow};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Remote calls in flight per batch action.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 4;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What a batch applies to each selected row.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchAction {
    Delete,
    PatchStatus {
        status: String,
        metadata: serde_json::Value,
    },
}

impl BatchAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::PatchStatus { .. } => "patch_status",
        }
    }

    /// Lifecycle gate for one row.
    pub fn allows(&self, kind: EntityKind, row: &ListRow) -> bool {
        match self {
            Self::Delete => lifecycle::row_is_deletable(kind, row.status.as_deref()),
            Self::PatchStatus { status, .. } => row
                .status
                .as_deref()
                .is_some_and(|from| lifecycle::can_transition(kind, from, status)),
        }
    }

    fn past_tense(&self) -> String {
        match self {
            Self::Delete => "deleted".to_string(),
            Self::PatchStatus { status, .. } => format!("moved to '{status}'"),
        }
    }

    fn prompt(&self, kind: EntityKind, count: usize) -> String {
        match self {
            Self::Delete => format!(
                "Delete {count} selected {}? This cannot be undone.",
                plural(kind, count)
            ),
            Self::PatchStatus { status, .. } => format!(
                "Move {count} selected {} to '{status}'?",
                plural(kind, count)
            ),
        }
    }
}

/// Result of a batch run that got as far as the executor.
#[derive(Debug)]
pub struct BatchReport<E> {
    /// Correlates log lines of one run.
    pub run_id: Uuid,
    pub action: BatchAction,
    pub outcome: BatchOutcome<DbId, E>,
    /// Selected rows left out because their status does not allow the action.
    pub skipped: Vec<DbId>,
    /// Set when the post-batch refetch failed.
    pub refresh_error: Option<String>,
}

/// How a batch request ended.
#[derive(Debug)]
pub enum BatchRun<E> {
    NothingSelected,
    /// Every selected row was ineligible; nothing was sent.
    NothingEligible { skipped: Vec<DbId> },
    Declined,
    Completed(BatchReport<E>),
}

/// How a single-row request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Applied,
    /// Rejected locally by the lifecycle table; no request was made.
    Rejected(CoreError),
    Declined,
}

enum RowMutation<'a> {
    Delete,
    PatchStatus {
        status: &'a str,
        metadata: &'a serde_json::Value,
    },
    Update {
        fields: &'a serde_json::Value,
    },
}

fn plural(kind: EntityKind, count: usize) -> String {
    let label = kind.label().to_lowercase();
    if count == 1 {
        label
    } else {
        format!("{label}s")
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs gated, bounded-concurrency actions against a list view's selection.
pub struct BatchActionOrchestrator {
    notifier: Arc<dyn Notifier>,
    confirmer: Option<Arc<dyn Confirmer>>,
    concurrency: usize,
}

impl BatchActionOrchestrator {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            confirmer: None,
            concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }

    /// Ask before destructive actions.
    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self, CoreError> {
        if concurrency == 0 {
            return Err(CoreError::Validation(
                "Batch concurrency must be at least 1".to_string(),
            ));
        }
        self.concurrency = concurrency;
        Ok(self)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    // -- batch actions ----------------------------------------------------------

    /// Delete every selected row whose status allows deletion.
    ///
    /// # Errors
    ///
    /// [`CoreError::Conflict`] when the view is already running a batch.
    pub async fn delete_selected<A: EntityApi>(
        &self,
        view: &ListController<A>,
    ) -> Result<BatchRun<A::Error>, CoreError> {
        self.run_batch(view, BatchAction::Delete).await
    }

    /// Move every selected row that may transition to `status`.
    ///
    /// # Errors
    ///
    /// [`CoreError::Validation`] when `status` is not a state of the view's
    /// entity kind, [`CoreError::Conflict`] when the view is busy.
    pub async fn patch_status_selected<A: EntityApi>(
        &self,
        view: &ListController<A>,
        status: &str,
        metadata: serde_json::Value,
    ) -> Result<BatchRun<A::Error>, CoreError> {
        let kind = view.kind();
        let known = kind
            .lifecycle()
            .is_some_and(|l| l.rule(status).is_some());
        if !known {
            return Err(CoreError::Validation(format!(
                "'{status}' is not a {} status",
                kind.as_str()
            )));
        }
        let action = BatchAction::PatchStatus {
            status: status.to_string(),
            metadata,
        };
        self.run_batch(view, action).await
    }

    async fn run_batch<A: EntityApi>(
        &self,
        view: &ListController<A>,
        action: BatchAction,
    ) -> Result<BatchRun<A::Error>, CoreError> {
        let kind = view.kind();
        // Held from the selection snapshot through the prompt and the run, so
        // the operator cannot change what is about to be acted on.
        let _busy = view.begin_batch()?;
        let selected = view.selected_rows();
        if selected.is_empty() {
            return Ok(BatchRun::NothingSelected);
        }

        let (eligible, skipped): (Vec<ListRow>, Vec<ListRow>) = selected
            .into_iter()
            .partition(|row| action.allows(kind, row));
        let eligible: Vec<DbId> = eligible.iter().map(|row| row.id).collect();
        let skipped: Vec<DbId> = skipped.iter().map(|row| row.id).collect();

        if !skipped.is_empty() {
            self.notifier.notify(Notification::warning(format!(
                "{} selected {} skipped: status does not allow {}",
                skipped.len(),
                plural(kind, skipped.len()),
                action.name().replace('_', " "),
            )));
        }
        if eligible.is_empty() {
            return Ok(BatchRun::NothingEligible { skipped });
        }

        if let Some(confirmer) = &self.confirmer {
            if !confirmer.confirm(&action.prompt(kind, eligible.len())).await {
                tracing::info!(kind = %kind, action = action.name(), "Batch action declined");
                return Ok(BatchRun::Declined);
            }
        }

        let run_id = Uuid::now_v7();
        let span = tracing::info_span!(
            "batch_action",
            %run_id,
            kind = %kind,
            action = action.name(),
            requested = eligible.len(),
        );

        async move {
            let api = Arc::clone(view.api());
            let outcome = run_with_concurrency(eligible, self.concurrency, |id| {
                let api = &api;
                let action = &action;
                async move {
                    match action {
                        BatchAction::Delete => api.delete(kind, id).await,
                        BatchAction::PatchStatus { status, metadata } => {
                            api.patch_status(kind, id, status, metadata).await
                        }
                    }
                }
            })
            .await?;

            for failure in &outcome.failed {
                tracing::warn!(id = failure.id, error = %failure.error, "Batch item failed");
            }
            tracing::info!(
                succeeded = outcome.succeeded.len(),
                failed = outcome.failed.len(),
                "Batch action finished"
            );

            view.retain_for_retry(outcome.failed_ids());
            self.notifier.notify(self.summary(kind, &action, &outcome));

            let refresh_error = self.refresh_after(view).await;

            Ok::<_, CoreError>(BatchRun::Completed(BatchReport {
                run_id,
                action,
                outcome,
                skipped,
                refresh_error,
            }))
        }
        .instrument(span)
        .await
    }

    fn summary<E>(
        &self,
        kind: EntityKind,
        action: &BatchAction,
        outcome: &BatchOutcome<DbId, E>,
    ) -> Notification {
        let succeeded = outcome.succeeded.len();
        let failed = outcome.failed.len();
        if outcome.is_complete_success() {
            Notification::success(format!(
                "{succeeded} {} {}",
                plural(kind, succeeded),
                action.past_tense()
            ))
        } else {
            Notification::error(format!(
                "{succeeded} of {} {} {}; {failed} failed and remain selected for retry",
                outcome.requested(),
                plural(kind, outcome.requested()),
                action.past_tense()
            ))
        }
    }

    /// Refetch after a mutation. Failure is reported on its own and returned
    /// as a message; it never touches the selection already established.
    async fn refresh_after<A: EntityApi>(&self, view: &ListController<A>) -> Option<String> {
        match view.refresh().await {
            Ok(()) => None,
            Err(err) => {
                tracing::error!(kind = %view.kind(), error = %err, "List refresh failed");
                let message = format!("Failed to reload the list: {err}");
                self.notifier.notify(Notification::error(message.clone()));
                Some(message)
            }
        }
    }

    // -- single-row actions -----------------------------------------------------

    /// Delete one visible row if its status allows it.
    pub async fn delete_one<A: EntityApi>(
        &self,
        view: &ListController<A>,
        id: DbId,
    ) -> Result<RowOutcome, ViewError<A::Error>> {
        self.mutate_row(view, id, RowMutation::Delete).await
    }

    /// Move one visible row to `status` if the lifecycle allows it.
    pub async fn patch_status_one<A: EntityApi>(
        &self,
        view: &ListController<A>,
        id: DbId,
        status: &str,
        metadata: &serde_json::Value,
    ) -> Result<RowOutcome, ViewError<A::Error>> {
        self.mutate_row(view, id, RowMutation::PatchStatus { status, metadata })
            .await
    }

    /// Save edited fields of one visible row if its status allows edits.
    pub async fn update_one<A: EntityApi>(
        &self,
        view: &ListController<A>,
        id: DbId,
        fields: &serde_json::Value,
    ) -> Result<RowOutcome, ViewError<A::Error>> {
        self.mutate_row(view, id, RowMutation::Update { fields }).await
    }

    async fn mutate_row<A: EntityApi>(
        &self,
        view: &ListController<A>,
        id: DbId,
        mutation: RowMutation<'_>,
    ) -> Result<RowOutcome, ViewError<A::Error>> {
        let kind = view.kind();
        let row = view.row(id).ok_or(CoreError::NotFound {
            entity: kind.label(),
            id,
        })?;
        let status = row.status.as_deref();

        let gate = match &mutation {
            RowMutation::Delete => lifecycle::ensure_deletable(kind, id, status),
            RowMutation::PatchStatus { status: to, .. } => {
                lifecycle::ensure_transition(kind, id, status, to)
            }
            RowMutation::Update { .. } => lifecycle::ensure_editable(kind, id, status),
        };
        if let Err(err) = gate {
            tracing::info!(kind = %kind, id, error = %err, "Mutation rejected locally");
            self.notifier.notify(Notification::warning(err.to_string()));
            return Ok(RowOutcome::Rejected(err));
        }

        let _busy = view.begin_batch()?;
        if let (RowMutation::Delete, Some(confirmer)) = (&mutation, &self.confirmer) {
            let prompt = format!("Delete {} {id}? This cannot be undone.", kind.label().to_lowercase());
            if !confirmer.confirm(&prompt).await {
                return Ok(RowOutcome::Declined);
            }
        }

        let api = view.api();
        let (result, done) = match mutation {
            RowMutation::Delete => (api.delete(kind, id).await, "deleted".to_string()),
            RowMutation::PatchStatus { status, metadata } => (
                api.patch_status(kind, id, status, metadata).await,
                format!("moved to '{status}'"),
            ),
            RowMutation::Update { fields } => {
                (api.update(kind, id, fields).await, "updated".to_string())
            }
        };

        if let Err(err) = result {
            tracing::warn!(kind = %kind, id, error = %err, "Row mutation failed");
            self.notifier.notify(Notification::error(format!(
                "{} {id} could not be {done}: {err}",
                kind.label()
            )));
            return Err(ViewError::Remote(err));
        }

        self.notifier
            .notify(Notification::success(format!("{} {id} {done}", kind.label())));
        self.refresh_after(view).await;
        Ok(RowOutcome::Applied)
    }
}
