//! Versioned aspect store backed by sled
//!
//! Entities are addressed by `(entity_type, urn)` and carry named aspects.
//! Every upsert appends a new historical version of the aspect; reads return
//! the latest version, and history listing preserves insertion order. Each
//! stored version carries a sha256 digest of its payload which is verified on
//! read, failing closed on corruption.

use sled::{Batch, Db};
use std::collections::HashMap;
use std::sync::Arc;

pub const ACCESS_REQUEST_ENTITY: &str = "accessRequest";
pub const DATASET_ENTITY: &str = "dataset";
pub const USER_ENTITY: &str = "user";

pub const KEY_ASPECT: &str = "accessRequestKey";
pub const PROPERTIES_ASPECT: &str = "accessRequestProperties";
pub const STATUS_INFO_ASPECT: &str = "accessRequestStatusInfo";
pub const PARTIES_ASPECT: &str = "accessRequestParties";
pub const OWNERSHIP_ASPECT: &str = "ownership";
pub const USER_INFO_ASPECT: &str = "userInfo";

// key namespaces; US (0x1f) separates path segments
const VERSION_NS: char = 'a';
const COUNTER_NS: char = 'n';
const SEP: char = '\u{1f}';

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(#[from] sled::Error),
    #[error("failed to decode stored aspect: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("failed to encode aspect: {0}")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),
    #[error("stored aspect {aspect} of {urn} failed its integrity check")]
    Corrupted { urn: String, aspect: String },
}

/// One historical version of an aspect, as returned by reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedAspect {
    pub version: u64,
    pub data: Vec<u8>,
}

impl VersionedAspect {
    pub fn decode<'b, T: minicbor::Decode<'b, ()>>(&'b self) -> Result<T, StoreError> {
        Ok(minicbor::decode(&self.data)?)
    }
}

// on-disk record: payload plus its digest
#[derive(minicbor::Encode, minicbor::Decode, Debug)]
struct StoredRecord {
    #[n(0)]
    digest: String,
    #[cbor(n(1), with = "minicbor::bytes")]
    data: Vec<u8>,
}

/// Contract the lifecycle service consumes. Writes are idempotent upserts of
/// one aspect at a time; there is no compare-and-swap and no transaction
/// spanning multiple aspects. An empty `aspects` slice on reads means "all
/// aspects of the entity".
pub trait EntityStore: Send + Sync {
    fn exists(&self, entity_type: &str, urn: &str) -> Result<bool, StoreError>;

    /// Latest version of each requested aspect, or `None` when the entity
    /// itself is absent. Aspects the entity does not carry are simply left
    /// out of the map.
    fn get_aspects(
        &self,
        entity_type: &str,
        urn: &str,
        aspects: &[&str],
    ) -> Result<Option<HashMap<String, VersionedAspect>>, StoreError>;

    fn batch_get_aspects(
        &self,
        entity_type: &str,
        urns: &[String],
        aspects: &[&str],
    ) -> Result<HashMap<String, HashMap<String, VersionedAspect>>, StoreError>;

    fn upsert_aspect(
        &self,
        entity_type: &str,
        urn: &str,
        aspect: &str,
        data: Vec<u8>,
    ) -> Result<(), StoreError>;

    /// Historical versions of one aspect in insertion order, paginated.
    fn list_aspect_history(
        &self,
        entity_type: &str,
        urn: &str,
        aspect: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<VersionedAspect>, StoreError>;
}

pub struct SledEntityStore {
    db: Arc<Db>,
}

impl SledEntityStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    fn aspect_prefix(entity_type: &str, urn: &str, aspect: &str) -> Vec<u8> {
        format!("{VERSION_NS}{SEP}{entity_type}{SEP}{urn}{SEP}{aspect}{SEP}").into_bytes()
    }

    fn version_key(entity_type: &str, urn: &str, aspect: &str, version: u64) -> Vec<u8> {
        let mut key = Self::aspect_prefix(entity_type, urn, aspect);
        key.extend_from_slice(&version.to_be_bytes());
        key
    }

    fn counter_key(entity_type: &str, urn: &str, aspect: &str) -> Vec<u8> {
        format!("{COUNTER_NS}{SEP}{entity_type}{SEP}{urn}{SEP}{aspect}").into_bytes()
    }

    fn entity_counter_prefix(entity_type: &str, urn: &str) -> Vec<u8> {
        format!("{COUNTER_NS}{SEP}{entity_type}{SEP}{urn}{SEP}").into_bytes()
    }

    // number of versions written so far, which is also the next version index
    fn next_version(
        &self,
        entity_type: &str,
        urn: &str,
        aspect: &str,
    ) -> Result<u64, StoreError> {
        match self.db.get(Self::counter_key(entity_type, urn, aspect))? {
            Some(raw) => decode_counter(&raw, urn, aspect),
            None => Ok(0),
        }
    }

    fn decode_record(
        &self,
        raw: &[u8],
        version: u64,
        urn: &str,
        aspect: &str,
    ) -> Result<VersionedAspect, StoreError> {
        let record: StoredRecord = minicbor::decode(raw)?;
        if sha256::digest(&record.data) != record.digest {
            return Err(StoreError::Corrupted {
                urn: urn.to_string(),
                aspect: aspect.to_string(),
            });
        }
        Ok(VersionedAspect {
            version,
            data: record.data,
        })
    }

    fn latest(
        &self,
        entity_type: &str,
        urn: &str,
        aspect: &str,
    ) -> Result<Option<VersionedAspect>, StoreError> {
        let next = self.next_version(entity_type, urn, aspect)?;
        if next == 0 {
            return Ok(None);
        }
        let version = next - 1;
        let raw = self
            .db
            .get(Self::version_key(entity_type, urn, aspect, version))?
            .ok_or_else(|| StoreError::Corrupted {
                urn: urn.to_string(),
                aspect: aspect.to_string(),
            })?;
        Ok(Some(self.decode_record(&raw, version, urn, aspect)?))
    }

    // names of every aspect the entity carries, derived from counter keys
    fn aspect_names(&self, entity_type: &str, urn: &str) -> Result<Vec<String>, StoreError> {
        let prefix = Self::entity_counter_prefix(entity_type, urn);
        let mut names = Vec::new();
        for item in self.db.scan_prefix(&prefix) {
            let (key, _) = item?;
            let name = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            names.push(name);
        }
        Ok(names)
    }
}

impl EntityStore for SledEntityStore {
    fn exists(&self, entity_type: &str, urn: &str) -> Result<bool, StoreError> {
        let prefix = Self::entity_counter_prefix(entity_type, urn);
        match self.db.scan_prefix(&prefix).next() {
            Some(item) => {
                item?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get_aspects(
        &self,
        entity_type: &str,
        urn: &str,
        aspects: &[&str],
    ) -> Result<Option<HashMap<String, VersionedAspect>>, StoreError> {
        let names: Vec<String> = if aspects.is_empty() {
            self.aspect_names(entity_type, urn)?
        } else {
            aspects.iter().map(|name| (*name).to_string()).collect()
        };

        let mut found = HashMap::new();
        for name in &names {
            if let Some(value) = self.latest(entity_type, urn, name)? {
                found.insert(name.clone(), value);
            }
        }
        if found.is_empty() && !self.exists(entity_type, urn)? {
            return Ok(None);
        }
        Ok(Some(found))
    }

    fn batch_get_aspects(
        &self,
        entity_type: &str,
        urns: &[String],
        aspects: &[&str],
    ) -> Result<HashMap<String, HashMap<String, VersionedAspect>>, StoreError> {
        let mut results = HashMap::new();
        for urn in urns {
            if let Some(found) = self.get_aspects(entity_type, urn, aspects)? {
                results.insert(urn.clone(), found);
            }
        }
        Ok(results)
    }

    fn upsert_aspect(
        &self,
        entity_type: &str,
        urn: &str,
        aspect: &str,
        data: Vec<u8>,
    ) -> Result<(), StoreError> {
        let version = self.next_version(entity_type, urn, aspect)?;
        let record = StoredRecord {
            digest: sha256::digest(&data),
            data,
        };

        // version payload and counter bump land in one batch
        let mut batch = Batch::default();
        batch.insert(
            Self::version_key(entity_type, urn, aspect, version),
            minicbor::to_vec(&record)?,
        );
        batch.insert(
            Self::counter_key(entity_type, urn, aspect),
            (version + 1).to_be_bytes().to_vec(),
        );
        self.db.apply_batch(batch)?;
        Ok(())
    }

    fn list_aspect_history(
        &self,
        entity_type: &str,
        urn: &str,
        aspect: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<VersionedAspect>, StoreError> {
        let prefix = Self::aspect_prefix(entity_type, urn, aspect);
        let mut out = Vec::new();
        // big-endian version suffixes keep the scan in insertion order
        for (index, item) in self.db.scan_prefix(&prefix).enumerate() {
            let (key, value) = item?;
            if index < start {
                continue;
            }
            if out.len() == count {
                break;
            }
            let version = decode_counter(&key[prefix.len()..], urn, aspect)?;
            out.push(self.decode_record(&value, version, urn, aspect)?);
        }
        Ok(out)
    }
}

fn decode_counter(raw: &[u8], urn: &str, aspect: &str) -> Result<u64, StoreError> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| StoreError::Corrupted {
        urn: urn.to_string(),
        aspect: aspect.to_string(),
    })?;
    Ok(u64::from_be_bytes(bytes))
}
