//! Collaborator interfaces the coordination layer calls through.
//!
//! The platform API owns persistence; these traits describe only the calls
//! the list views and batch actions need. `peduli-client` provides the HTTP
//! implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::lifecycle::EntityKind;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default rows per page.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Largest page the platform API serves.
pub const MAX_PAGE_LIMIT: u32 = 100;

// ---------------------------------------------------------------------------
// List types
// ---------------------------------------------------------------------------

/// Filter, sort and page of one list screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    pub limit: u32,
    pub offset: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Column name, prefixed with `-` for descending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
            status: None,
            search: None,
            sort: None,
        }
    }
}

impl ListQuery {
    /// Clamp the page size into `1..=MAX_PAGE_LIMIT`.
    pub fn clamped(mut self) -> Self {
        self.limit = self.limit.clamp(1, MAX_PAGE_LIMIT);
        self
    }
}

/// One visible row. Only the fields the coordination layer needs are typed;
/// everything else the API returns is kept in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRow {
    pub id: DbId,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl ListRow {
    pub fn new(id: DbId, status: Option<&str>) -> Self {
        Self {
            id,
            status: status.map(str::to_string),
            title: None,
            fields: serde_json::Map::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A fetched page of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    pub items: Vec<ListRow>,
    pub total: u64,
}

impl ListPage {
    pub fn ids(&self) -> Vec<DbId> {
        self.items.iter().map(|row| row.id).collect()
    }

    pub fn row(&self, id: DbId) -> Option<&ListRow> {
        self.items.iter().find(|row| row.id == id)
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Remote calls against the platform API. Each call is one round trip.
#[async_trait]
pub trait EntityApi: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the rows visible under `query`.
    async fn list(&self, kind: EntityKind, query: &ListQuery) -> Result<ListPage, Self::Error>;

    async fn delete(&self, kind: EntityKind, id: DbId) -> Result<(), Self::Error>;

    /// Move a row to `status`, sending `metadata` (notes, schedule, ...) along.
    async fn patch_status(
        &self,
        kind: EntityKind,
        id: DbId,
        status: &str,
        metadata: &serde_json::Value,
    ) -> Result<(), Self::Error>;

    /// Replace editable fields of a row.
    async fn update(
        &self,
        kind: EntityKind,
        id: DbId,
        fields: &serde_json::Value,
    ) -> Result<(), Self::Error>;
}

/// Yes/no prompt shown before destructive batch actions.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Confirmer for non-interactive runs.
pub struct AlwaysConfirm;

#[async_trait]
impl Confirmer for AlwaysConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}
