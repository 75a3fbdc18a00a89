use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a catalog entry did not end up in its collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    NotFound,
    AddFailed,
    ServerUnavailable,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MissReason::NotFound => "not_found",
            MissReason::AddFailed => "add_failed",
            MissReason::ServerUnavailable => "server_unavailable",
        };
        f.write_str(s)
    }
}

/// A catalog entry that was reported as missing from the library.
///
/// Written to the missing-items report, one row per miss.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissingRecord {
    pub collection: String,
    pub title: String,
    pub year: Option<u32>,
    pub reason: MissReason,
    pub importer: String,
    pub recorded_at: DateTime<Utc>,
}
