//! `_msearch` request bodies

use super::types::PageQuery;
use serde_json::{json, Value};

/// Field that marks document-upload events
pub const EVENT_MARKER_FIELD: &str = "MESSAGE_ID";

/// Marker value of document-upload events
pub const EVENT_MARKER: &str = "uploaded_document";

/// Unique per document; breaks ties between hits logged in the same millisecond.
/// 5.x clusters sort on `_uid`, not `_id`.
pub const TIEBREAK_FIELD: &str = "_uid";

/// Fields projected from each hit
pub const SOURCE_FIELDS: [&str; 6] = [
    "USER",
    "REMOTE_ADDR",
    "DOC_ID",
    "DOC_HASH",
    "TIMESTAMP",
    "@timestamp",
];

/// Build the NDJSON body of one page request
///
/// `search_after` carries the sort values of the previous page's last hit: its event time
/// and its unique id, so hits sharing a millisecond are never skipped at a page boundary.
pub fn msearch_body(query: &PageQuery, search_after: Option<&[Value]>) -> String {
    let header = json!({ "index": [query.index] });

    let mut search = json!({
        "query": {
            "bool": {
                "must": [
                    { "match_phrase": { EVENT_MARKER_FIELD: { "query": EVENT_MARKER } } },
                    { "range": { "@timestamp": {
                        "gte": query.start_millis,
                        "lte": query.end_millis,
                        "format": "epoch_millis"
                    } } }
                ]
            }
        },
        "size": query.page_size,
        "sort": [
            { "@timestamp": { "order": "asc", "unmapped_type": "boolean" } },
            { TIEBREAK_FIELD: { "order": "asc" } }
        ],
        "_source": { "includes": SOURCE_FIELDS },
    });

    if let Some(after) = search_after {
        search["search_after"] = Value::Array(after.to_vec());
    }

    format!("{}\n{}\n", header, search)
}
