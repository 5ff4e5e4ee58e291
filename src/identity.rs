//! Actor identity resolution for history presentation
use crate::error::LifecycleError;
use crate::store::{EntityStore, USER_ENTITY, USER_INFO_ASPECT};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Identity of an actor as presented to readers of request history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorIdentity {
    pub id: String,
    pub display_name: Option<String>,
}

impl ActorIdentity {
    pub fn bare(id: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: None,
        }
    }
}

/// Maps actor identifiers to displayable identities.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, id: &str) -> Result<ActorIdentity, LifecycleError>;

    /// One lookup for a whole page of history; avoids a query per record.
    fn batch_resolve(
        &self,
        ids: &BTreeSet<String>,
    ) -> Result<HashMap<String, ActorIdentity>, LifecycleError>;
}

/// Display profile stored against a user entity.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    #[n(0)]
    pub display_name: String,
    #[n(1)]
    pub active: bool,
}

/// Resolver reading user-info aspects through the entity store. Unknown
/// users resolve to a bare identity rather than an error, so history never
/// fails to render because an actor was deleted.
pub struct StoreIdentityResolver {
    store: Arc<dyn EntityStore>,
}

impl StoreIdentityResolver {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }
}

impl IdentityResolver for StoreIdentityResolver {
    fn resolve(&self, id: &str) -> Result<ActorIdentity, LifecycleError> {
        let aspects = self
            .store
            .get_aspects(USER_ENTITY, id, &[USER_INFO_ASPECT])?;
        let display_name = match aspects.as_ref().and_then(|map| map.get(USER_INFO_ASPECT)) {
            Some(record) => Some(record.decode::<UserInfo>()?.display_name),
            None => None,
        };
        Ok(ActorIdentity {
            id: id.to_string(),
            display_name,
        })
    }

    fn batch_resolve(
        &self,
        ids: &BTreeSet<String>,
    ) -> Result<HashMap<String, ActorIdentity>, LifecycleError> {
        let urns: Vec<String> = ids.iter().cloned().collect();
        let responses = self
            .store
            .batch_get_aspects(USER_ENTITY, &urns, &[USER_INFO_ASPECT])?;

        let mut identities = HashMap::with_capacity(ids.len());
        for id in ids {
            let display_name = match responses
                .get(id)
                .and_then(|aspects| aspects.get(USER_INFO_ASPECT))
            {
                Some(record) => Some(record.decode::<UserInfo>()?.display_name),
                None => None,
            };
            identities.insert(
                id.clone(),
                ActorIdentity {
                    id: id.clone(),
                    display_name,
                },
            );
        }
        Ok(identities)
    }
}
