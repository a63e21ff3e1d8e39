use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single Airtable record. `fields` is left untyped because lookup and
/// attachment fields vary in shape between bases; see [`crate::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirtableRecord {
    pub id: String,
    #[serde(rename = "createdTime", default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// One page of `GET /v0/{base}/{table}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse {
    #[serde(default)]
    pub records: Vec<AirtableRecord>,
    /// Cursor for the next page; absent on the last page.
    pub offset: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeletedRecord {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
}

/// Options for [`crate::AirtableClient::list_records`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Stop after this many records across all pages.
    pub max_records: Option<usize>,
    /// Records per page; Airtable caps this at 100.
    pub page_size: Option<u32>,
    pub filter_by_formula: Option<String>,
    pub view: Option<String>,
}

impl ListOptions {
    #[must_use]
    pub fn limited(max_records: usize) -> Self {
        Self {
            max_records: Some(max_records),
            ..Self::default()
        }
    }
}
