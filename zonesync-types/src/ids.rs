//! Identifier types: primary keys, zones and record identifiers.
//!
//! A record identifier is derived deterministically from a local primary key,
//! so the same row always maps onto the same remote record.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner name used when a zone belongs to the current user.
pub const DEFAULT_ZONE_OWNER: &str = "__defaultOwner__";

/// Upper bound on the length of a record name, in bytes.
pub const MAX_RECORD_NAME_LEN: usize = 255;

/// The declared type of a model's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    String,
    Int,
}

/// A local primary key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Int(i64),
    String(String),
}

impl PrimaryKey {
    /// Returns the kind of this key.
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::String(_) => KeyKind::String,
            Self::Int(_) => KeyKind::Int,
        }
    }

    /// Converts the key into a remote record name.
    ///
    /// String keys must be non-empty ASCII, at most [`MAX_RECORD_NAME_LEN`]
    /// bytes, and must not start with an underscore.
    pub fn to_record_name(&self) -> Result<String> {
        match self {
            Self::Int(v) => Ok(v.to_string()),
            Self::String(s) => {
                validate_record_name(s)?;
                Ok(s.clone())
            }
        }
    }

    /// Parses a record name back into a key of the given kind.
    pub fn from_record_name(name: &str, kind: KeyKind) -> Result<Self> {
        match kind {
            KeyKind::String => {
                validate_record_name(name)?;
                Ok(Self::String(name.to_string()))
            }
            KeyKind::Int => name.parse::<i64>().map(Self::Int).map_err(|_| {
                Error::InvalidRecordName {
                    name: name.to_string(),
                    reason: "not an integer key",
                }
            }),
        }
    }

    /// Stable string form used as a storage key.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Int(v) => format!("i:{v}"),
            Self::String(s) => format!("s:{s}"),
        }
    }
}

fn validate_record_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "empty"
    } else if !name.is_ascii() {
        "not ASCII"
    } else if name.len() > MAX_RECORD_NAME_LEN {
        "longer than 255 characters"
    } else if name.starts_with('_') {
        "starts with an underscore"
    } else {
        return Ok(());
    };
    Err(Error::InvalidRecordName {
        name: name.to_string(),
        reason,
    })
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for PrimaryKey {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for PrimaryKey {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

/// Identifies a remote partition (zone) by name and owner.
///
/// A zone with an empty name is a placeholder for "not yet known".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId {
    zone_name: String,
    owner_name: String,
}

impl ZoneId {
    /// Creates a zone ID with an explicit owner.
    pub fn new(zone_name: impl Into<String>, owner_name: impl Into<String>) -> Self {
        Self {
            zone_name: zone_name.into(),
            owner_name: owner_name.into(),
        }
    }

    /// Creates a zone ID owned by the current user.
    pub fn with_default_owner(zone_name: impl Into<String>) -> Self {
        Self::new(zone_name, DEFAULT_ZONE_OWNER)
    }

    pub fn zone_name(&self) -> &str {
        &self.zone_name
    }

    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    /// Returns false for the "not yet known" placeholder.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.zone_name.is_empty()
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner_name, self.zone_name)
    }
}

/// Identifies a remote record. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId {
    record_name: String,
    zone_id: ZoneId,
}

impl RecordId {
    /// Builds the record ID for a local primary key.
    pub fn for_key(key: &PrimaryKey, zone_id: ZoneId) -> Result<Self> {
        Ok(Self {
            record_name: key.to_record_name()?,
            zone_id,
        })
    }

    /// Builds a record ID from a raw name, e.g. one received from the server.
    pub fn new(record_name: impl Into<String>, zone_id: ZoneId) -> Self {
        Self {
            record_name: record_name.into(),
            zone_id,
        }
    }

    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    pub fn zone_id(&self) -> &ZoneId {
        &self.zone_id
    }

    /// Parses the record name back into a primary key of the given kind.
    pub fn primary_key(&self, kind: KeyKind) -> Result<PrimaryKey> {
        PrimaryKey::from_record_name(&self.record_name, kind)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zone_id, self.record_name)
    }
}
