//! Lenient request parsing for the agent-facing endpoints
//!
//! Callers are conversational agents that send loosely shaped JSON. A body
//! that is not a JSON object is treated as an empty object, and several
//! historical field names are accepted for the same value.

use serde_json::{Map, Value};
use ticket_keeper_core::{NewTicket, TransitionSource};

/// Parsed top-level fields of a request body
pub type Fields = Map<String, Value>;

/// Accepted names for the requester identifier, in order of preference
pub const REQUESTER_FIELDS: &[&str] = &["reporter_id", "user_id", "requester_id"];

/// Accepted names for the free-text description
pub const DESCRIPTION_FIELDS: &[&str] = &["issue", "justification", "description"];

/// Accepted names for a ticket identifier
pub const ID_FIELDS: &[&str] = &["id", "issue_id", "request_id", "supplier_id", "order_id"];

const PRIORITY_FIELD: &str = "priority";
const LIFECYCLE_FIELD: &str = "lifecycle";

/// Parse a body into its top-level fields
///
/// Malformed JSON and non-object documents yield no fields.
pub fn parse_fields(body: &[u8]) -> Fields {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => fields,
        _ => Fields::new(),
    }
}

/// Scalar value rendered as text; objects, arrays and null have none
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First non-blank scalar among `names`
pub fn first_text(fields: &Fields, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| fields.get(*name))
        .filter_map(scalar_text)
        .find(|text| !text.trim().is_empty())
}

/// Submission built from a `/submit` body
///
/// Every scalar field that is not one of the recognized names becomes an
/// attribute.
pub fn new_ticket(fields: &Fields) -> NewTicket {
    let reserved = |key: &str| {
        REQUESTER_FIELDS.contains(&key)
            || DESCRIPTION_FIELDS.contains(&key)
            || key == PRIORITY_FIELD
            || key == LIFECYCLE_FIELD
    };

    let attributes = fields
        .iter()
        .filter(|(key, _)| !reserved(key.as_str()))
        .filter_map(|(key, value)| {
            scalar_text(value)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .map(|text| (key.clone(), text))
        })
        .collect();

    NewTicket {
        requester_id: first_text(fields, REQUESTER_FIELDS),
        description: first_text(fields, DESCRIPTION_FIELDS),
        priority: first_text(fields, &[PRIORITY_FIELD]),
        lifecycle: first_text(fields, &[LIFECYCLE_FIELD]),
        attributes,
    }
}

/// Ticket identifier from a body or query string
pub fn ticket_id(fields: &Fields) -> Option<String> {
    first_text(fields, ID_FIELDS).map(|id| id.trim().to_string())
}

/// Parsed `/advance-status` body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceRequest {
    pub id: Option<String>,
    pub status: Option<String>,
    pub source: TransitionSource,
}

/// Parse an `/advance-status` body
///
/// A missing or unrecognized `source` counts as an operator action.
pub fn advance_request(fields: &Fields) -> AdvanceRequest {
    let source = first_text(fields, &["source"])
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(TransitionSource::Operator);

    AdvanceRequest {
        id: ticket_id(fields),
        status: first_text(fields, &["status", "new_status"]).map(|s| s.trim().to_string()),
        source,
    }
}

#[cfg(test)]
#[path = "requests_tests.rs"]
mod tests;
