use chrono::NaiveDate;

use crate::types::{FullNameKey, LastnameKey};

/// Shared key accessors of every source record.
pub trait Keyed {
    fn firstname(&self) -> &str;

    fn lastname(&self) -> &str;

    /// Returns the normalized sort and grouping key.
    fn lastname_key(&self) -> LastnameKey {
        LastnameKey::new(self.lastname())
    }

    /// Returns the normalized match key.
    fn full_name_key(&self) -> FullNameKey {
        FullNameKey::new(self.firstname(), self.lastname())
    }
}

/// Position of a remote record in the directory listing.
///
/// Both numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteProvenance {
    pub page: u32,
    pub row: u32,
}

/// A user read from the remote paginated directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub id: u64,
    pub firstname: String,
    pub lastname: String,
    pub practice_location: String,
    pub specialty: String,
    /// User type classification label.
    pub classification: String,
    pub last_active_date: NaiveDate,
    pub provenance: RemoteProvenance,
}

impl Keyed for RemoteRecord {
    fn firstname(&self) -> &str {
        &self.firstname
    }

    fn lastname(&self) -> &str {
        &self.lastname
    }
}

/// A user read from the relational user table joined with its practice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalRecord {
    pub id: u64,
    pub firstname: String,
    pub lastname: String,
    pub location: String,
    pub specialty: String,
    pub classification: String,
    pub last_active_date: NaiveDate,
}

impl Keyed for RelationalRecord {
    fn firstname(&self) -> &str {
        &self.firstname
    }

    fn lastname(&self) -> &str {
        &self.lastname
    }
}

/// A record from either source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRecord {
    Remote(RemoteRecord),
    Relational(RelationalRecord),
}

impl Keyed for SourceRecord {
    fn firstname(&self) -> &str {
        match self {
            SourceRecord::Remote(record) => record.firstname(),
            SourceRecord::Relational(record) => record.firstname(),
        }
    }

    fn lastname(&self) -> &str {
        match self {
            SourceRecord::Remote(record) => record.lastname(),
            SourceRecord::Relational(record) => record.lastname(),
        }
    }
}

impl From<RemoteRecord> for SourceRecord {
    fn from(record: RemoteRecord) -> Self {
        SourceRecord::Remote(record)
    }
}

impl From<RelationalRecord> for SourceRecord {
    fn from(record: RelationalRecord) -> Self {
        SourceRecord::Relational(record)
    }
}
