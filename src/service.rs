//! Service layer API for access request lifecycle operations
use crate::authz::OwnershipGate;
use crate::diff;
use crate::error::LifecycleError;
use crate::identity::{ActorIdentity, IdentityResolver};
use crate::request::{
    AuditStamp, Parties, PropertiesUpdate, RequestProperties, RequestStatus, StatusChange,
    StatusInfo, TimeStamp,
};
use crate::store::{self, EntityStore, VersionedAspect};
use crate::urn::{RequestKey, RequestUrn};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_HISTORY_START: usize = 0;
pub const DEFAULT_HISTORY_COUNT: usize = 20;

const CREATED_BANNER: &str = "<SYSTEM MESSAGE>\nNew request for data access created.";
const NO_MESSAGE: &str = "<NO MESSAGE>";
const REQUEST_NOT_FOUND: &str = "Data access request not found.";

/// One status-history record, zipped with the resolved actor identity.
#[derive(Debug, Clone)]
pub struct StatusHistoryEntry {
    pub status_info: StatusInfo,
    pub last_updated_by: ActorIdentity,
}

/// One page of status history in store-preserved order.
#[derive(Debug, Clone)]
pub struct StatusHistoryPage {
    pub urn: String,
    pub start: usize,
    pub count: usize,
    pub entries: Vec<StatusHistoryEntry>,
}

/// Orchestrates create and update of data access requests: validates the
/// requested transition, gates approvals on dataset ownership, computes the
/// audit diff, and issues the aspect upserts. The entity store and identity
/// resolver are explicit collaborators; there is no ambient state.
///
/// There is no transaction spanning the aspect writes of one call. Within a
/// call, properties are always written before status info, so a reader
/// diffing against the property state never sees the transition earlier than
/// the properties it was diffed with.
pub struct AccessRequestService {
    store: Arc<dyn EntityStore>,
    gate: OwnershipGate,
    identity: Arc<dyn IdentityResolver>,
}

impl AccessRequestService {
    pub fn new(store: Arc<dyn EntityStore>, identity: Arc<dyn IdentityResolver>) -> Self {
        let gate = OwnershipGate::new(Arc::clone(&store));
        Self {
            store,
            gate,
            identity,
        }
    }

    /// Create a new access request in `PENDING` status.
    ///
    /// Owner resolution must succeed before anything is written; the approver
    /// set is snapshotted from dataset ownership at this moment and never
    /// recomputed. Returns the canonical urn string of the new request.
    pub fn create(
        &self,
        key: &RequestKey,
        properties: RequestProperties,
        initial: StatusChange,
        actor: &str,
    ) -> Result<String, LifecycleError> {
        if initial.status != RequestStatus::Pending {
            return Err(LifecycleError::Validation(format!(
                "new requests must start in PENDING, got {}",
                initial.status
            )));
        }

        let owners = self.gate.owners_of(&key.dataset)?;
        let parties = Parties {
            requester: actor.to_string(),
            grantor: None,
            authorized_approvers: owners.into_iter().collect(),
        };

        let message = initial
            .message
            .or_else(|| properties.purpose.clone())
            .unwrap_or_default();
        let status_info = StatusInfo {
            status: RequestStatus::Pending,
            message,
            audit_stamp: AuditStamp {
                actor: actor.to_string(),
                time: TimeStamp::new(),
                message: Some(CREATED_BANNER.to_string()),
            },
        };

        let urn = key.to_urn();
        debug!(urn = %urn, actor, "creating data access request");
        self.publish(&urn, Some(key), Some(&properties), Some(&parties), &status_info)?;
        Ok(urn.to_string())
    }

    /// Apply a status transition, and optionally a partial properties update,
    /// to an existing request.
    ///
    /// `APPROVED` and `PROVISIONED` targets require the actor to be a current
    /// owner of the subject dataset, checked fresh before any write; the
    /// approving owner is recorded as grantor, overwritten on every gated
    /// transition. Every call appends a new status-history entry, even when
    /// nothing else changed.
    pub fn update(
        &self,
        urn: &RequestUrn,
        properties_update: Option<&PropertiesUpdate>,
        change: &StatusChange,
        actor: &str,
    ) -> Result<String, LifecycleError> {
        let urn_str = urn.to_string();
        if !self.store.exists(store::ACCESS_REQUEST_ENTITY, &urn_str)? {
            return Err(LifecycleError::NotFound(REQUEST_NOT_FOUND.to_string()));
        }

        let aspects = self
            .store
            .get_aspects(
                store::ACCESS_REQUEST_ENTITY,
                &urn_str,
                &[
                    store::KEY_ASPECT,
                    store::PROPERTIES_ASPECT,
                    store::STATUS_INFO_ASPECT,
                    store::PARTIES_ASPECT,
                ],
            )?
            .ok_or_else(|| LifecycleError::NotFound(REQUEST_NOT_FOUND.to_string()))?;

        // the immutable key aspect carries the subject dataset
        let key: RequestKey = decode_aspect(&aspects, store::KEY_ASPECT)?;
        let existing_properties: RequestProperties =
            decode_aspect(&aspects, store::PROPERTIES_ASPECT)?;
        let existing_status: StatusInfo = decode_aspect(&aspects, store::STATUS_INFO_ASPECT)?;

        let mut parties: Option<Parties> = None;
        if change.status.requires_approval_rights() {
            if !self.gate.is_owner(&key.dataset, actor)? {
                warn!(urn = %urn_str, actor, status = %change.status, "approval attempt by non-owner");
                return Err(LifecycleError::NotAuthorized);
            }
            let mut existing_parties: Parties = decode_aspect(&aspects, store::PARTIES_ASPECT)?;
            // the latest approver becomes the grantor, repeated approvals included
            existing_parties.grantor = Some(actor.to_string());
            parties = Some(existing_parties);
        }

        let merged = properties_update.map(|update| update.merge_onto(&existing_properties));
        let diff_message = match &merged {
            Some(updated) => format!(
                "* {}",
                diff::format_properties_difference(&existing_properties, updated)
            ),
            None => String::new(),
        };

        let status_info = StatusInfo {
            status: change.status,
            message: change
                .message
                .clone()
                .unwrap_or_else(|| NO_MESSAGE.to_string()),
            audit_stamp: AuditStamp {
                actor: actor.to_string(),
                time: TimeStamp::new(),
                message: Some(format!(
                    "<SYSTEM MESSAGE>\n* Status change from {} to {}\n{}",
                    existing_status.status, change.status, diff_message
                )),
            },
        };

        debug!(urn = %urn_str, actor, status = %change.status, "updating data access request");
        self.publish(urn, None, merged.as_ref(), parties.as_ref(), &status_info)?;
        Ok(urn_str)
    }

    /// Paginated status history in store-preserved insertion order, each
    /// record zipped with its actor's identity. Distinct actors of the page
    /// are resolved in one batched lookup.
    pub fn history(
        &self,
        urn: &RequestUrn,
        start: Option<usize>,
        count: Option<usize>,
    ) -> Result<StatusHistoryPage, LifecycleError> {
        let start = start.unwrap_or(DEFAULT_HISTORY_START);
        let count = count.unwrap_or(DEFAULT_HISTORY_COUNT);
        if count == 0 {
            return Err(LifecycleError::Validation(
                "history page count must be greater than zero".to_string(),
            ));
        }

        let urn_str = urn.to_string();
        let records = self.store.list_aspect_history(
            store::ACCESS_REQUEST_ENTITY,
            &urn_str,
            store::STATUS_INFO_ASPECT,
            start,
            count,
        )?;

        let mut infos = Vec::with_capacity(records.len());
        for record in &records {
            infos.push(record.decode::<StatusInfo>()?);
        }

        let actors: BTreeSet<String> = infos
            .iter()
            .map(|info| info.audit_stamp.actor.clone())
            .collect();
        let identities = self.identity.batch_resolve(&actors)?;

        let entries = infos
            .into_iter()
            .map(|info| {
                let last_updated_by = identities
                    .get(&info.audit_stamp.actor)
                    .cloned()
                    .unwrap_or_else(|| ActorIdentity::bare(&info.audit_stamp.actor));
                StatusHistoryEntry {
                    status_info: info,
                    last_updated_by,
                }
            })
            .collect();

        Ok(StatusHistoryPage {
            urn: urn_str,
            start,
            count,
            entries,
        })
    }

    // Write order is fixed: key, properties, parties, status info. The status
    // info write is unconditional; the others are skipped when not supplied.
    fn publish(
        &self,
        urn: &RequestUrn,
        key: Option<&RequestKey>,
        properties: Option<&RequestProperties>,
        parties: Option<&Parties>,
        status_info: &StatusInfo,
    ) -> Result<(), LifecycleError> {
        let urn_str = urn.to_string();
        let mut written: Vec<&'static str> = Vec::new();

        if let Some(key) = key {
            self.write_aspect(&urn_str, store::KEY_ASPECT, minicbor::to_vec(key), &mut written)?;
        }
        if let Some(properties) = properties {
            self.write_aspect(
                &urn_str,
                store::PROPERTIES_ASPECT,
                minicbor::to_vec(properties),
                &mut written,
            )?;
        }
        if let Some(parties) = parties {
            self.write_aspect(
                &urn_str,
                store::PARTIES_ASPECT,
                minicbor::to_vec(parties),
                &mut written,
            )?;
        }
        self.write_aspect(
            &urn_str,
            store::STATUS_INFO_ASPECT,
            minicbor::to_vec(status_info),
            &mut written,
        )?;
        Ok(())
    }

    fn write_aspect(
        &self,
        urn: &str,
        aspect: &'static str,
        encoded: Result<Vec<u8>, minicbor::encode::Error<std::convert::Infallible>>,
        written: &mut Vec<&'static str>,
    ) -> Result<(), LifecycleError> {
        let data = encoded.map_err(crate::store::StoreError::from)?;
        match self
            .store
            .upsert_aspect(store::ACCESS_REQUEST_ENTITY, urn, aspect, data)
        {
            Ok(()) => {
                written.push(aspect);
                Ok(())
            }
            // a failure after a successful write in the same call is surfaced
            // as a distinguishable partial success
            Err(source) if !written.is_empty() => Err(LifecycleError::PartialWrite {
                written: written.clone(),
                source,
            }),
            Err(source) => Err(LifecycleError::Store(source)),
        }
    }
}

fn decode_aspect<T: for<'b> minicbor::Decode<'b, ()>>(
    aspects: &HashMap<String, VersionedAspect>,
    name: &str,
) -> Result<T, LifecycleError> {
    let record = aspects
        .get(name)
        .ok_or_else(|| LifecycleError::NotFound(format!("request is missing its {name} aspect")))?;
    Ok(record.decode()?)
}
