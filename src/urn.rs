//! Canonical identifiers for access request entities
use crate::error::LifecycleError;
use std::fmt;
use std::str::FromStr;

const URN_PREFIX: &str = "urn:ar:accessRequest:(";

/// Composite key of one access request: the protected dataset and the
/// principal asking for access. Immutable once created; the order of the two
/// components is significant and never swapped.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    #[n(0)]
    pub dataset: String,
    #[n(1)]
    pub principal: String,
}

impl RequestKey {
    pub fn new(dataset: &str, principal: &str) -> Result<Self, LifecycleError> {
        validate_component("dataset", dataset)?;
        validate_component("principal", principal)?;
        Ok(Self {
            dataset: dataset.to_string(),
            principal: principal.to_string(),
        })
    }

    pub fn to_urn(&self) -> RequestUrn {
        RequestUrn { key: self.clone() }
    }
}

// key components must not collide with the urn tuple delimiters
fn validate_component(name: &str, value: &str) -> Result<(), LifecycleError> {
    if value.is_empty() {
        return Err(LifecycleError::Validation(format!(
            "{name} identifier must not be empty"
        )));
    }
    if value
        .chars()
        .any(|c| matches!(c, '(' | ')' | ',') || c.is_whitespace())
    {
        return Err(LifecycleError::Validation(format!(
            "{name} identifier contains reserved characters: {value}"
        )));
    }
    Ok(())
}

/// Canonical string form of a [`RequestKey`]:
/// `urn:ar:accessRequest:(<dataset>,<principal>)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestUrn {
    key: RequestKey,
}

impl RequestUrn {
    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn dataset(&self) -> &str {
        &self.key.dataset
    }

    pub fn principal(&self) -> &str {
        &self.key.principal
    }
}

impl From<RequestKey> for RequestUrn {
    fn from(key: RequestKey) -> Self {
        Self { key }
    }
}

impl fmt::Display for RequestUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{URN_PREFIX}{},{})",
            self.key.dataset, self.key.principal
        )
    }
}

impl FromStr for RequestUrn {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix(URN_PREFIX).ok_or_else(|| {
            LifecycleError::Validation(format!("not an accessRequest urn: {s}"))
        })?;
        let inner = rest.strip_suffix(')').ok_or_else(|| {
            LifecycleError::Validation(format!("urn key tuple is not closed: {s}"))
        })?;
        let (dataset, principal) = inner.split_once(',').ok_or_else(|| {
            LifecycleError::Validation(format!("urn must carry two key components: {s}"))
        })?;
        let key = RequestKey::new(dataset, principal)?;
        Ok(Self { key })
    }
}
