//! Core data model for access request aspects
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

/// Lifecycle status of one data access request.
///
/// `Pending` is the only status a request may be created in. `Approved` and
/// `Provisioned` are gated on dataset ownership; every other transition is
/// accepted as requested, with no forward-only ordering enforced.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Denied,
    #[n(3)]
    Provisioned,
    #[n(4)]
    Revoked,
}

impl RequestStatus {
    /// Statuses that only a dataset owner may set.
    pub fn requires_approval_rights(self) -> bool {
        matches!(self, Self::Approved | Self::Provisioned)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Denied => "DENIED",
            Self::Provisioned => "PROVISIONED",
            Self::Revoked => "REVOKED",
        };
        f.write_str(name)
    }
}

/// Data type of a schema field named in a field access grant.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDataType {
    #[n(0)]
    Bytes,
    #[n(1)]
    Fixed,
    #[n(2)]
    Boolean,
    #[n(3)]
    String,
    #[n(4)]
    Number,
    #[n(5)]
    Date,
    #[n(6)]
    Time,
    #[n(7)]
    Enum,
    #[n(8)]
    Null,
    #[n(9)]
    Array,
    #[n(10)]
    Map,
    #[n(11)]
    Struct,
    #[n(12)]
    Union,
}

impl fmt::Display for FieldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bytes => "BYTES",
            Self::Fixed => "FIXED",
            Self::Boolean => "BOOLEAN",
            Self::String => "STRING",
            Self::Number => "NUMBER",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Enum => "ENUM",
            Self::Null => "NULL",
            Self::Array => "ARRAY",
            Self::Map => "MAP",
            Self::Struct => "STRUCT",
            Self::Union => "UNION",
        };
        f.write_str(name)
    }
}

/// One schema field the requester wants access to.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct FieldAccess {
    #[n(0)]
    pub field_path: String,
    #[n(1)]
    pub data_type: FieldDataType,
}

/// Mutable properties aspect of a request.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestProperties {
    #[n(0)]
    pub purpose: Option<String>,
    #[n(1)]
    pub details: Option<String>,
    // a dataset being granted access to, distinct from the subject dataset
    #[n(2)]
    pub target: Option<String>,
    #[n(3)]
    pub field_accesses: Vec<FieldAccess>,
}

impl RequestProperties {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_purpose(mut self, purpose: &str) -> Self {
        self.purpose = Some(purpose.to_string());
        self
    }
    pub fn set_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }
    pub fn set_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }
    pub fn add_field_access(mut self, field_path: &str, data_type: FieldDataType) -> Self {
        self.field_accesses.push(FieldAccess {
            field_path: field_path.to_string(),
            data_type,
        });
        self
    }
}

/// Partial update for [`RequestProperties`]. Fields left as `None` keep the
/// stored value; the update is merged onto the freshly read aspect, so a
/// client never clobbers fields it did not send. Status info, by contrast,
/// is always replaced whole.
#[derive(Debug, Clone, Default)]
pub struct PropertiesUpdate {
    pub purpose: Option<String>,
    pub details: Option<String>,
    pub target: Option<String>,
    pub field_accesses: Option<Vec<FieldAccess>>,
}

impl PropertiesUpdate {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_purpose(mut self, purpose: &str) -> Self {
        self.purpose = Some(purpose.to_string());
        self
    }
    pub fn set_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }
    pub fn set_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }
    pub fn set_field_accesses(mut self, field_accesses: Vec<FieldAccess>) -> Self {
        self.field_accesses = Some(field_accesses);
        self
    }

    pub fn merge_onto(&self, existing: &RequestProperties) -> RequestProperties {
        let mut merged = existing.clone();
        if let Some(purpose) = &self.purpose {
            merged.purpose = Some(purpose.clone());
        }
        if let Some(details) = &self.details {
            merged.details = Some(details.clone());
        }
        if let Some(target) = &self.target {
            merged.target = Some(target.clone());
        }
        if let Some(field_accesses) = &self.field_accesses {
            merged.field_accesses = field_accesses.clone();
        }
        merged
    }
}

/// Caller-facing status input: the requested status plus an optional
/// user-supplied message. The audit stamp is never taken from the caller.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: RequestStatus,
    pub message: Option<String>,
}

impl StatusChange {
    pub fn new(status: RequestStatus) -> Self {
        Self {
            status,
            message: None,
        }
    }
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

/// Who did what, when. Always server-assigned: actor is the caller performing
/// the write and time is the write time, never client-supplied.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct AuditStamp {
    #[n(0)]
    pub actor: String,
    #[n(1)]
    pub time: TimeStamp<Utc>,
    #[n(2)]
    pub message: Option<String>,
}

/// Status aspect of a request. Append-only in effect: every write creates a
/// new historical version.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct StatusInfo {
    #[n(0)]
    pub status: RequestStatus,
    #[n(1)]
    pub message: String,
    #[n(2)]
    pub audit_stamp: AuditStamp,
}

/// Parties aspect of a request. The requester is set once at creation and the
/// approver set is a snapshot of dataset ownership at creation time; only the
/// grantor changes afterwards, overwritten by whichever owner performs a
/// gated transition.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Parties {
    #[n(0)]
    pub requester: String,
    #[n(1)]
    pub grantor: Option<String>,
    #[n(2)]
    pub authorized_approvers: Vec<String>,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(TimeStamp)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

// persisted as epoch milliseconds; sub-millisecond precision is dropped
impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i64(self.0.timestamp_millis())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let millis = d.i64()?;

        DateTime::from_timestamp_millis(millis)
            .map(TimeStamp)
            .ok_or(minicbor::decode::Error::message(
                "timestamp out of range for utc datetime",
            ))
    }
}
