//! Dataset ownership resolution for approval gating
use crate::error::LifecycleError;
use crate::store::{DATASET_ENTITY, EntityStore, OWNERSHIP_ASPECT};
use std::collections::BTreeSet;
use std::sync::Arc;

const NO_OWNERS: &str = "No owners of dataset to approve data access requests.";

/// Kind of principal recorded as a dataset owner.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalKind {
    #[n(0)]
    User,
    #[n(1)]
    Group,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    #[n(0)]
    pub principal: String,
    #[n(1)]
    pub kind: PrincipalKind,
}

/// Ownership aspect recorded against a dataset entity.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Ownership {
    #[n(0)]
    pub owners: Vec<Owner>,
}

/// Answers "who may approve requests against this dataset" by reading the
/// dataset's ownership aspect through the entity store.
pub struct OwnershipGate {
    store: Arc<dyn EntityStore>,
}

impl OwnershipGate {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Resolve the user principals currently recorded as owners of a dataset.
    ///
    /// Group owners are ignored; only user principals may approve requests
    /// (known limitation carried over, not to be silently fixed). Fails with
    /// `NotFound` when the dataset has no ownership record or no user owner
    /// remains after filtering; an un-owned dataset cannot have access
    /// requests approved.
    pub fn owners_of(&self, dataset: &str) -> Result<BTreeSet<String>, LifecycleError> {
        let aspects = self
            .store
            .get_aspects(DATASET_ENTITY, dataset, &[OWNERSHIP_ASPECT])?
            .ok_or_else(|| LifecycleError::NotFound(NO_OWNERS.to_string()))?;
        let record = aspects
            .get(OWNERSHIP_ASPECT)
            .ok_or_else(|| LifecycleError::NotFound(NO_OWNERS.to_string()))?;

        let ownership: Ownership = record.decode()?;
        let owners: BTreeSet<String> = ownership
            .owners
            .iter()
            .filter(|owner| owner.kind == PrincipalKind::User)
            .map(|owner| owner.principal.clone())
            .collect();

        if owners.is_empty() {
            return Err(LifecycleError::NotFound(NO_OWNERS.to_string()));
        }
        Ok(owners)
    }

    /// Ownership is looked up fresh on every call so a revoked owner loses
    /// approval rights immediately; nothing is cached.
    pub fn is_owner(&self, dataset: &str, actor: &str) -> Result<bool, LifecycleError> {
        Ok(self.owners_of(dataset)?.contains(actor))
    }
}
