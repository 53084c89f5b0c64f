//! Builders and fake collaborators for testing reconciliation runs.
//!
//! - [`source`] has directory and user table doubles that fail or stall on demand.
//! - [`store`] has a match store that rejects every write.
//!
//! The functions in this module build records with fixed, valid descriptive fields so tests only
//! spell out the names and ids they care about.

use chrono::NaiveDate;

use crate::source::DirectoryUser;
use crate::types::{
    LastnameGroup, LastnameKey, MatchRecord, RelationalRecord, RemoteProvenance, RemoteRecord,
};

pub mod source;
pub mod store;

/// Report date used by all fixtures.
pub fn report_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 2, 2).expect("valid fixture date")
}

/// Last activity date of fixture users, 28 days before [`report_date`].
pub fn last_active_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 1, 5).expect("valid fixture date")
}

/// A directory user as served by a remote page.
pub fn directory_user(id: u64, firstname: &str, lastname: &str) -> DirectoryUser {
    DirectoryUser {
        id,
        firstname: firstname.to_string(),
        lastname: lastname.to_string(),
        practice_location: "arab".to_string(),
        specialty: "Family_Medicine".to_string(),
        classification: "Contributor".to_string(),
        last_active_date: last_active_date(),
    }
}

/// A remote record on page 1, row 1.
pub fn remote_user(id: u64, firstname: &str, lastname: &str) -> RemoteRecord {
    let user = directory_user(id, firstname, lastname);

    RemoteRecord {
        id: user.id,
        firstname: user.firstname,
        lastname: user.lastname,
        practice_location: user.practice_location,
        specialty: user.specialty,
        classification: user.classification,
        last_active_date: user.last_active_date,
        provenance: RemoteProvenance { page: 1, row: 1 },
    }
}

/// A relational record whose descriptive fields match [`directory_user`].
pub fn relational_user(id: u64, firstname: &str, lastname: &str) -> RelationalRecord {
    RelationalRecord {
        id,
        firstname: firstname.to_string(),
        lastname: lastname.to_string(),
        location: "arab".to_string(),
        specialty: "Family Medicine".to_string(),
        classification: "contributor".to_string(),
        last_active_date: last_active_date(),
    }
}

/// A match record for report date 2017-02-02 with the given remote id.
pub fn match_record(remote_user_id: u64) -> MatchRecord {
    MatchRecord {
        report_date: report_date(),
        relational_user_id: remote_user_id + 1_000,
        remote_user_id,
        location_match: 1,
        specialty_match: 1,
        classification_match: 1,
        is_relational_user_active: 1,
        is_remote_user_active: 1,
        relational_last_active_date: last_active_date(),
        remote_last_active_date: last_active_date(),
        remote_page: 1,
        remote_row: remote_user_id as u32 + 1,
    }
}

/// Remote id of Kyle Nistler in the Nistler fixture.
pub const NISTLER_REMOTE_KYLE_ID: u64 = 93519;
/// Relational id of Kyle Nistler in the Nistler fixture.
pub const NISTLER_RELATIONAL_KYLE_ID: u64 = 916915;

/// Remote side of the Nistler fixture: Rona and Kyle.
pub fn nistler_directory_users() -> Vec<DirectoryUser> {
    vec![
        directory_user(93518, "Rona", "Nistler"),
        directory_user(NISTLER_REMOTE_KYLE_ID, "Kyle", "Nistler"),
    ]
}

/// Relational side of the Nistler fixture: Anthony, Judy and Kyle.
pub fn nistler_table_users() -> Vec<RelationalRecord> {
    vec![
        relational_user(916913, "Anthony", "Nistler"),
        relational_user(916914, "Judy", "Nistler"),
        relational_user(NISTLER_RELATIONAL_KYLE_ID, "Kyle", "Nistler"),
    ]
}

/// The Nistler group, where only Kyle exists on both sides.
pub fn nistler_group() -> LastnameGroup {
    let mut group = LastnameGroup::new(LastnameKey::new("Nistler"));

    group.push(remote_user(93518, "Rona", "Nistler").into());
    group.push(remote_user(NISTLER_REMOTE_KYLE_ID, "Kyle", "Nistler").into());
    for user in nistler_table_users() {
        group.push(user.into());
    }

    group
}
