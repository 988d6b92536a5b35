use serde::{Deserialize, Serialize};

use crate::dao::models::GameRecord;

pub const GAME_PREFIX: &str = "game::";

/// Game record as stored in CouchDB: the record body plus CouchDB bookkeeping fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub record: GameRecord,
}

impl From<(GameRecord, Option<String>)> for CouchGameDocument {
    fn from((record, rev): (GameRecord, Option<String>)) -> Self {
        Self {
            id: game_doc_id(&record.code),
            rev,
            record,
        }
    }
}

/// Only the revision of a document; avoids decoding the whole record to overwrite it.
#[derive(Debug, Deserialize)]
pub struct RevisionOnly {
    #[serde(rename = "_rev")]
    pub rev: String,
}

pub fn game_doc_id(code: &str) -> String {
    format!("{GAME_PREFIX}{code}")
}
