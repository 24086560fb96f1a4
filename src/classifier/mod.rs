use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::{Map, Value};

use crate::dispatcher::ReplayResponse;
use crate::log_parser::log_events::{is_blank, AccessLogRecord};

#[derive(PartialEq, Debug, Clone, Copy)]
enum HeaderCheck {
    /// The recorded value has to survive the replay unchanged
    Value,
    /// Only present or absent on both sides, redirects point at other hosts
    Presence,
}

/// Checked in this order, which is also the order mismatches are reported in.
const COMPARED_HEADERS: [(&str, HeaderCheck); 4] = [
    ("x-continuation-token", HeaderCheck::Value),
    ("content-type", HeaderCheck::Value),
    ("location", HeaderCheck::Presence),
    ("x-total-count", HeaderCheck::Value),
];

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum Classification {
    Success,
    Failed,
    Skipped,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum DiscrepancyKind {
    None,
    Status,
    Headers,
    Body,
    RequestBodyParseError,
    NetworkError,
}

impl DiscrepancyKind {
    pub fn name(&self) -> &'static str {
        match *self {
            DiscrepancyKind::None => "none",
            DiscrepancyKind::Status => "status",
            DiscrepancyKind::Headers => "headers",
            DiscrepancyKind::Body => "body",
            DiscrepancyKind::RequestBodyParseError => "request_body_parse_error",
            DiscrepancyKind::NetworkError => "network_error",
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    /// Offending header names, differing body entries or the error message
    pub details: Vec<String>,
}

impl Discrepancy {
    pub fn none() -> Discrepancy {
        Discrepancy {
            kind: DiscrepancyKind::None,
            details: Vec::new(),
        }
    }

    pub fn new(kind: DiscrepancyKind, details: Vec<String>) -> Discrepancy {
        Discrepancy { kind, details }
    }

    pub fn classification(&self) -> Classification {
        match self.kind {
            DiscrepancyKind::None => Classification::Success,
            _ => Classification::Failed,
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.details.is_empty() {
            write!(f, "{}", self.kind.name())
        } else {
            write!(f, "{} ({})", self.kind.name(), self.details.join(", "))
        }
    }
}

/// Compares a replayed response with the recorded one. Checks run in order
/// and the first mismatch wins: status, headers, then body for non-POST.
pub fn classify(original: &AccessLogRecord, replay: &ReplayResponse) -> Discrepancy {
    let replay_status = replay.status.to_string();
    if original.status != replay_status {
        return Discrepancy::new(
            DiscrepancyKind::Status,
            vec![format!("{} != {}", original.status, replay_status)],
        );
    }

    let header_mismatches = compare_headers(&original.response_header_map(), &replay.headers);
    if !header_mismatches.is_empty() {
        return Discrepancy::new(DiscrepancyKind::Headers, header_mismatches);
    }

    if original.method != "POST" {
        let original_body = parse_body(&original.response_body);
        let replay_body = parse_body(&replay.body);

        if !is_empty(&original_body) && !is_empty(&replay_body) && original_body != replay_body {
            return Discrepancy::new(
                DiscrepancyKind::Body,
                top_level_difference(&original_body, &replay_body),
            );
        }
    }

    Discrepancy::none()
}

/// Returns the names of mismatching headers in a fixed order, independent of
/// how either map is laid out.
pub fn compare_headers(
    original: &BTreeMap<String, String>,
    replay: &BTreeMap<String, String>,
) -> Vec<String> {
    COMPARED_HEADERS
        .iter()
        .filter(|(name, check)| match check {
            HeaderCheck::Value => match original.get(*name) {
                Some(value) => replay.get(*name) != Some(value),
                None => false,
            },
            HeaderCheck::Presence => original.contains_key(*name) != replay.contains_key(*name),
        })
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Missing bodies compare as an empty object, non-JSON bodies as strings.
pub fn parse_body(body: &str) -> Value {
    if is_blank(body) {
        return Value::Object(Map::new());
    }

    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Top level keys (objects) or indices (arrays) present on only one side or
/// holding different values.
pub fn top_level_difference(original: &Value, replay: &Value) -> Vec<String> {
    match (original, replay) {
        (Value::Object(left), Value::Object(right)) => {
            let keys: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
            keys.into_iter()
                .filter(|key| left.get(key.as_str()) != right.get(key.as_str()))
                .map(|key| key.to_string())
                .collect()
        }
        (Value::Array(left), Value::Array(right)) => (0..left.len().max(right.len()))
            .filter(|&index| left.get(index) != right.get(index))
            .map(|index| format!("[{}]", index))
            .collect(),
        _ => vec![String::from("<root>")],
    }
}
