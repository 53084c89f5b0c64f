use chrono::NaiveDate;
use serde::Serialize;

use crate::types::{RelationalRecord, RemoteProvenance, RemoteRecord, ReportContext, fields_match};

/// Derived comparison record for one matched pair of users.
///
/// Flags are `0`/`1`. Dates serialize as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub report_date: NaiveDate,
    pub relational_user_id: u64,
    pub remote_user_id: u64,
    pub location_match: u8,
    pub specialty_match: u8,
    pub classification_match: u8,
    pub is_relational_user_active: u8,
    pub is_remote_user_active: u8,
    pub relational_last_active_date: NaiveDate,
    pub remote_last_active_date: NaiveDate,
    #[serde(rename = "_remote_page")]
    pub remote_page: u32,
    #[serde(rename = "_remote_row")]
    pub remote_row: u32,
}

impl MatchRecord {
    /// Builds the comparison record for a remote and relational user sharing a full name.
    pub fn derive(
        context: &ReportContext,
        remote: &RemoteRecord,
        relational: &RelationalRecord,
    ) -> Self {
        let RemoteProvenance { page, row } = remote.provenance;

        Self {
            report_date: context.report_date(),
            relational_user_id: relational.id,
            remote_user_id: remote.id,
            location_match: fields_match(&relational.location, &remote.practice_location),
            specialty_match: fields_match(&relational.specialty, &remote.specialty),
            classification_match: fields_match(
                &relational.classification,
                &remote.classification,
            ),
            is_relational_user_active: context.activity_flag(relational.last_active_date),
            is_remote_user_active: context.activity_flag(remote.last_active_date),
            relational_last_active_date: relational.last_active_date,
            remote_last_active_date: remote.last_active_date,
            remote_page: page,
            remote_row: row,
        }
    }
}
