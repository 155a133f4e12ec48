//! Element-id bookkeeping for replay.
//!
//! Element ids minted by the original session are meaningless to the live
//! one, so every recorded reference (endpoint segment, request payload,
//! actions origin) must be remapped to the id the live session returned for
//! the same find step.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::parsers::text_logs::ParsedRequest;

/// W3C WebDriver element identifier key.
pub const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Endpoints operating on an element: `/element/<id>/<verb>`.
static ELEMENT_ENDPOINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/element/[0-9a-zA-Z.-]+/[a-z]+").unwrap());

static ELEMENT_SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"element/[0-9a-zA-Z.-]+").unwrap());

/// Swap the element id inside an endpoint, leaving the rest untouched.
pub fn rewrite_endpoint(endpoint: &str, element_id: &str) -> String {
    ELEMENT_SEGMENT_RE
        .replace(endpoint, format!("element/{element_id}"))
        .into_owned()
}

fn element_id_from_endpoint(endpoint: &str) -> Option<&str> {
    let mut segments = endpoint.split('/');
    segments.find(|s| *s == "element")?;
    segments.next()
}

fn id_of_element_object(value: &Value) -> Option<&str> {
    value
        .get(W3C_ELEMENT_KEY)
        .or_else(|| value.get("ELEMENT"))
        .and_then(Value::as_str)
}

/// The element id a recorded request refers to, if any.
///
/// Three places can carry one: the endpoint path, a `pointerMove` origin in
/// a `performActions` payload, and the first script argument of
/// `executeScript` / `executeAsyncScript`.
pub fn referenced_element_id(request: &ParsedRequest) -> Option<String> {
    if ELEMENT_ENDPOINT_RE.is_match(&request.endpoint) {
        return element_id_from_endpoint(&request.endpoint).map(str::to_string);
    }

    match request.command_name.as_str() {
        "performActions" => request
            .data
            .pointer("/actions/0/actions")
            .and_then(Value::as_array)
            .and_then(|actions| {
                actions
                    .iter()
                    .find(|a| a.get("type").and_then(Value::as_str) == Some("pointerMove"))
            })
            .and_then(|a| a.get("origin"))
            .and_then(id_of_element_object)
            .map(str::to_string),
        "executeScript" | "executeAsyncScript" => request
            .data
            .pointer("/args/0")
            .and_then(id_of_element_object)
            .map(str::to_string),
        _ => None,
    }
}

/// Element ids carried by a response `value`: either one element object or
/// an array of them (findElements).
pub fn element_ids_from_value(value: &Value) -> Vec<String> {
    if let Some(id) = id_of_element_object(value) {
        return vec![id.to_string()];
    }
    if let Some(items) = value.as_array() {
        if items
            .first()
            .and_then(id_of_element_object)
            .is_some()
        {
            return items
                .iter()
                .filter_map(id_of_element_object)
                .map(str::to_string)
                .collect();
        }
    }
    Vec::new()
}

/// Whether a response payload carries element references at all.
pub fn mentions_element(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.contains_key("ELEMENT")
                || map.contains_key(W3C_ELEMENT_KEY)
                || map.values().any(mentions_element)
        }
        Value::Array(items) => items.iter().any(mentions_element),
        _ => false,
    }
}

const MAX_REWRITE_DEPTH: usize = 64;

/// Return a copy of `value` with every element reference pointing at
/// `element_id`: `ELEMENT` and W3C keys are overwritten, and a
/// `pointerMove` origin object collapses to the bare id string. The input
/// is never mutated.
pub fn rewrite_element_ids(value: &Value, element_id: &str) -> Value {
    rewrite_at_depth(value, element_id, 0)
}

fn rewrite_at_depth(value: &Value, element_id: &str, depth: usize) -> Value {
    if depth >= MAX_REWRITE_DEPTH {
        return value.clone();
    }
    match value {
        Value::Object(map) => {
            let is_pointer_move =
                map.get("type").and_then(Value::as_str) == Some("pointerMove");
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                let rewritten = if key == "ELEMENT" || key == W3C_ELEMENT_KEY {
                    Value::String(element_id.to_string())
                } else if key == "origin"
                    && is_pointer_move
                    && val.as_object().is_some_and(|o| {
                        o.contains_key("ELEMENT") || o.contains_key(W3C_ELEMENT_KEY)
                    })
                {
                    Value::String(element_id.to_string())
                } else {
                    rewrite_at_depth(val, element_id, depth + 1)
                };
                out.insert(key.clone(), rewritten);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| rewrite_at_depth(item, element_id, depth + 1))
                .collect(),
        ),
        other => other.clone(),
    }
}
