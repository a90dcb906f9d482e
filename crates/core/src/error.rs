use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// The column list handed to a schema definition is unusable.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A payload referenced a column the defined schema does not have.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Columnar batch arrays of unequal length.
    #[error("Length mismatch: {0}")]
    LengthMismatch(String),

    /// The task (or project) is not in the state the operation requires.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Task {task_id} is already completed")]
    AlreadyCompleted { task_id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
