use crate::store::StoreError;

/// Errors surfaced by lifecycle operations. All of them are local to one
/// invocation; the service holds no state that needs rollback beyond "don't
/// proceed to the next write".
#[derive(thiserror::Error, Debug)]
pub enum LifecycleError {
    /// Malformed identifier or missing required input. Not retryable.
    #[error("{0}")]
    Validation(String),
    /// The request, or the subject dataset's ownership, could not be resolved.
    #[error("{0}")]
    NotFound(String),
    /// A non-owner attempted an approval transition. No write has happened
    /// when this is returned; the ownership check precedes all writes.
    #[error("Only owners are allowed to approve data access requests.")]
    NotAuthorized,
    /// The entity store failed before any aspect of this call was written.
    #[error("entity store failure: {0}")]
    Store(#[from] StoreError),
    /// The entity store failed mid-sequence: the named aspects of this call
    /// were already written. Callers decide on compensating writes; the
    /// service never retries, since retrying a partially completed
    /// multi-aspect write would duplicate history entries.
    #[error("entity store failed after writing {written:?}: {source}")]
    PartialWrite {
        written: Vec<&'static str>,
        source: StoreError,
    },
}
