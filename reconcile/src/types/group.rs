use crate::types::{Keyed, LastnameKey, RelationalRecord, RemoteRecord, SourceRecord};

/// All records of both sources sharing one [`LastnameKey`].
///
/// The merger builds exactly one group per key present on both sides and hands it to the match
/// engine, which consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastnameGroup {
    key: LastnameKey,
    remote: Vec<RemoteRecord>,
    relational: Vec<RelationalRecord>,
}

impl LastnameGroup {
    pub fn new(key: LastnameKey) -> Self {
        Self {
            key,
            remote: Vec::new(),
            relational: Vec::new(),
        }
    }

    /// Adds a record to the side matching its variant.
    ///
    /// The caller guarantees the record carries this group's key.
    pub fn push(&mut self, record: SourceRecord) {
        debug_assert_eq!(record.lastname_key(), self.key);

        match record {
            SourceRecord::Remote(record) => self.remote.push(record),
            SourceRecord::Relational(record) => self.relational.push(record),
        }
    }

    pub fn key(&self) -> &LastnameKey {
        &self.key
    }

    pub fn remote(&self) -> &[RemoteRecord] {
        &self.remote
    }

    pub fn relational(&self) -> &[RelationalRecord] {
        &self.relational
    }

    /// Returns the total number of records on both sides.
    pub fn len(&self) -> usize {
        self.remote.len() + self.relational.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remote.is_empty() && self.relational.is_empty()
    }

    /// Splits the group into its remote and relational records.
    pub fn into_parts(self) -> (LastnameKey, Vec<RemoteRecord>, Vec<RelationalRecord>) {
        (self.key, self.remote, self.relational)
    }
}
