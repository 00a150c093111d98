//! List-view controller: one per screen.
//!
//! Owns the screen's query, the last fetched page, the [`SelectionStore`]
//! and the busy flag raised while a batch action runs. The selection is
//! reconciled against the visible rows on every fetch, so it never holds an
//! id the operator cannot see.
//!
//! State sits behind a plain mutex that is never held across an `.await`;
//! remote calls happen with the lock released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::CoreError;
use crate::lifecycle::EntityKind;
use crate::remote::{EntityApi, ListPage, ListQuery, ListRow};
use crate::selection::{SelectAllState, SelectionStore};
use crate::types::DbId;

/// Error from a list-view operation that may involve a remote call.
#[derive(Debug, thiserror::Error)]
pub enum ViewError<E> {
    /// Rejected locally before any I/O.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Remote call failed: {0}")]
    Remote(#[source] E),
}

#[derive(Debug, Default)]
struct ListState {
    query: ListQuery,
    page: ListPage,
    selection: SelectionStore<DbId>,
    busy: bool,
    /// Generation handed to the most recently started fetch.
    fetch_started: u64,
    /// Generation of the page currently shown.
    fetch_applied: u64,
}

impl ListState {
    fn ensure_idle(&self) -> Result<(), CoreError> {
        if self.busy {
            Err(CoreError::Conflict(
                "A batch action is in progress for this list".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Claim the next fetch generation.
    fn start_fetch(&mut self) -> u64 {
        self.fetch_started += 1;
        self.fetch_started
    }

    /// Show `page` unless a newer fetch has already been applied.
    fn apply_page(&mut self, generation: u64, page: ListPage) -> bool {
        if generation <= self.fetch_applied {
            return false;
        }
        self.selection.keep_only(&page.ids());
        self.page = page;
        self.fetch_applied = generation;
        true
    }
}

/// Controller for one list screen of a single entity kind.
pub struct ListController<A> {
    api: Arc<A>,
    kind: EntityKind,
    state: Mutex<ListState>,
}

impl<A: EntityApi> ListController<A> {
    pub fn new(api: Arc<A>, kind: EntityKind) -> Self {
        Self::with_query(api, kind, ListQuery::default())
    }

    pub fn with_query(api: Arc<A>, kind: EntityKind, query: ListQuery) -> Self {
        Self {
            api,
            kind,
            state: Mutex::new(ListState {
                query: query.clamped(),
                ..Default::default()
            }),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    fn lock(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- fetching -------------------------------------------------------------

    /// Fetch the current query's page and reconcile the selection with it.
    ///
    /// On failure the previous rows and selection stay as they were. A
    /// response is discarded when the query has since been replaced or a
    /// fetch started after it has already landed.
    pub async fn refresh(&self) -> Result<(), ViewError<A::Error>> {
        let (generation, query) = {
            let mut state = self.lock();
            (state.start_fetch(), state.query.clone())
        };
        let page = self
            .api
            .list(self.kind, &query)
            .await
            .map_err(ViewError::Remote)?;

        let mut state = self.lock();
        if state.query != query {
            tracing::debug!(kind = %self.kind, "Discarding list response for a stale query");
            return Ok(());
        }
        let (rows, total) = (page.items.len(), page.total);
        if state.apply_page(generation, page) {
            tracing::debug!(kind = %self.kind, rows, total, "List refreshed");
        } else {
            tracing::debug!(
                kind = %self.kind,
                generation,
                applied = state.fetch_applied,
                "Discarding list response overtaken by a newer fetch"
            );
        }
        Ok(())
    }

    /// Replace filter, sort or page and refetch.
    pub async fn set_query(&self, query: ListQuery) -> Result<(), ViewError<A::Error>> {
        {
            let mut state = self.lock();
            state.ensure_idle()?;
            state.query = query.clamped();
        }
        self.refresh().await
    }

    // -- selection ------------------------------------------------------------

    /// Flip selection of a visible row.
    pub fn toggle(&self, id: DbId) -> Result<(), CoreError> {
        let mut state = self.lock();
        state.ensure_idle()?;
        if state.page.row(id).is_none() {
            return Err(CoreError::NotFound {
                entity: self.kind.label(),
                id,
            });
        }
        state.selection.toggle(id);
        Ok(())
    }

    /// Select every visible row, or none if all are already selected.
    pub fn toggle_all(&self) -> Result<(), CoreError> {
        let mut state = self.lock();
        state.ensure_idle()?;
        let visible = state.page.ids();
        state.selection.toggle_all(&visible);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CoreError> {
        let mut state = self.lock();
        state.ensure_idle()?;
        state.selection.clear();
        Ok(())
    }

    // -- read-only ------------------------------------------------------------

    pub fn selected_ids(&self) -> Vec<DbId> {
        self.lock().selection.ids()
    }

    pub fn selection_count(&self) -> usize {
        self.lock().selection.count()
    }

    pub fn is_selected(&self, id: DbId) -> bool {
        self.lock().selection.is_selected(&id)
    }

    pub fn select_all_state(&self) -> SelectAllState {
        let state = self.lock();
        state.selection.select_all_state(&state.page.ids())
    }

    pub fn rows(&self) -> Vec<ListRow> {
        self.lock().page.items.clone()
    }

    pub fn row(&self, id: DbId) -> Option<ListRow> {
        self.lock().page.row(id).cloned()
    }

    pub fn total(&self) -> u64 {
        self.lock().page.total
    }

    pub fn query(&self) -> ListQuery {
        self.lock().query.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    // -- batch hooks ----------------------------------------------------------

    /// Selected rows in display order.
    pub(crate) fn selected_rows(&self) -> Vec<ListRow> {
        let state = self.lock();
        state
            .page
            .items
            .iter()
            .filter(|row| state.selection.is_selected(&row.id))
            .cloned()
            .collect()
    }

    /// Raise the busy flag. The flag drops with the returned guard.
    pub(crate) fn begin_batch(&self) -> Result<BusyGuard<'_, A>, CoreError> {
        let mut state = self.lock();
        state.ensure_idle()?;
        state.busy = true;
        Ok(BusyGuard { view: self })
    }

    /// Keep only `failed` selected for a retry, or clear when nothing failed.
    pub(crate) fn retain_for_retry(&self, failed: Vec<DbId>) {
        let mut state = self.lock();
        if failed.is_empty() {
            state.selection.clear();
        } else {
            state.selection.set_selected(failed);
            let visible = state.page.ids();
            state.selection.keep_only(&visible);
        }
    }
}

/// Holds a list view busy until dropped.
pub(crate) struct BusyGuard<'a, A> {
    view: &'a ListController<A>,
}

impl<A> Drop for BusyGuard<'_, A> {
    fn drop(&mut self) {
        let mut state = self
            .view
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        state.busy = false;
    }
}
