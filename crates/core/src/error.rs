use crate::types::DbId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The row is in a locked lifecycle state and may not be mutated.
    #[error("{entity} {id} is locked in status '{status}'")]
    Locked {
        entity: &'static str,
        id: DbId,
        status: String,
    },

    #[error("{entity} {id} cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        id: DbId,
        from: String,
        to: String,
    },
}
