/// All errors that can be returned by a TokoStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict -- another transaction
    /// modified the record concurrently. The expected version was not found.
    #[error("concurrent conflict on {entity} {id}: expected version {expected_version}")]
    ConcurrentConflict {
        entity: &'static str,
        id: String,
        expected_version: i64,
    },

    /// No record with the given key.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique constraint was violated (username, product name, invoice
    /// number, top-up order id).
    #[error("duplicate {entity} key: {key}")]
    DuplicateKey { entity: &'static str, key: String },

    /// A backend-specific storage error (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
