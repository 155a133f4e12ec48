//! Tokenizer for raw WebDriver proxy text logs.
//!
//! The upstream format is fixed and external: whitespace-separated lines
//! where token 2 is a type tag, token 5 the HTTP method, token 6 the raw
//! endpoint, and the remainder a JSON payload. Idle gaps between a response
//! and the next request are materialized as `SLEEP <seconds>` markers so a
//! replay reproduces the original pacing.

use regex::Regex;
use serde::ser::{Serialize, Serializer};
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

use crate::catalog::resolve_command_name;
use crate::parsers::parse_timestamp_ms;

/// One tokenized WebDriver command from the log. `endpoint` has the leading
/// `/session/<id>` prefix stripped; `data` is best-effort parsed (an
/// unparsable body degrades to an empty object, never an error).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRequest {
    pub method: String,
    pub endpoint: String,
    pub data: Value,
    pub command_name: String,
}

/// A request-stream entry: either a real command or a synthetic sleep
/// marker. Sleep markers serialize as the sentinel string `"SLEEP <n>"` and
/// have no paired response.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRequest {
    Sleep(u64),
    Command(ParsedRequest),
}

impl LogRequest {
    pub fn as_command(&self) -> Option<&ParsedRequest> {
        match self {
            LogRequest::Command(req) => Some(req),
            LogRequest::Sleep(_) => None,
        }
    }
}

impl Serialize for LogRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LogRequest::Sleep(seconds) => serializer.serialize_str(&format!("SLEEP {seconds}")),
            LogRequest::Command(req) => req.serialize(serializer),
        }
    }
}

/// Tokenized log: `requests` and `responses` are index-aligned once sleep
/// markers are removed from `requests`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ParsedTextLogs {
    pub capabilities: Vec<Value>,
    pub requests: Vec<LogRequest>,
    pub responses: Vec<Value>,
}

impl ParsedTextLogs {
    /// The command entries, in order, with sleep markers skipped. Position
    /// `k` here pairs with `responses[k]`.
    pub fn commands(&self) -> impl Iterator<Item = &ParsedRequest> {
        self.requests.iter().filter_map(LogRequest::as_command)
    }
}

/// Named-field view over one whitespace-split log line. The positions are
/// the upstream contract: 0-1 timestamp, 2 type tag, 5 method, 6 endpoint.
struct LineRecord<'a> {
    tokens: Vec<&'a str>,
}

impl<'a> LineRecord<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            tokens: line.split_whitespace().collect(),
        }
    }

    fn tag(&self) -> Option<&'a str> {
        self.tokens.get(2).copied()
    }

    fn method(&self) -> Option<&'a str> {
        self.tokens.get(5).copied()
    }

    fn raw_endpoint(&self) -> Option<&'a str> {
        self.tokens.get(6).copied()
    }

    fn timestamp_ms(&self) -> Option<i64> {
        parse_timestamp_ms(self.tokens.first()?, self.tokens.get(1)?)
    }

    /// Remaining tokens from `index` on, rejoined as the payload text.
    fn payload_from(&self, index: usize) -> String {
        if self.tokens.len() <= index {
            return String::new();
        }
        self.tokens[index..].join(" ")
    }
}

/// Strip the first three path segments (`/session/<id>`) from a raw
/// endpoint, keeping the command path. `/session/<id>` itself becomes `/`.
fn strip_session_prefix(raw: &str) -> String {
    let tail: Vec<&str> = raw.split('/').skip(3).collect();
    format!("/{}", tail.join("/"))
}

/// Capabilities payload: the first JSON object after the literal `/session`
/// on the line.
fn extract_capabilities(line: &str, app_automate: bool) -> Option<Value> {
    let (_, tail) = line.split_once("/session")?;
    let start = tail.find('{')?;
    let caps: Value = serde_json::Deserializer::from_str(&tail[start..])
        .into_iter::<Value>()
        .next()?
        .ok()?;
    if app_automate {
        Some(caps)
    } else {
        Some(caps.get("desiredCapabilities").cloned().unwrap_or(Value::Null))
    }
}

/// Best-effort body parse; `null` and failures both degrade to `{}`.
fn parse_request_data(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Null) | Err(_) => {
            if !raw.is_empty() {
                debug!("Unparsable request body left empty: {raw}");
            }
            Value::Object(serde_json::Map::new())
        }
        Ok(value) => value,
    }
}

fn sleep_gap(last_response_ms: Option<i64>, request_ms: Option<i64>) -> Option<u64> {
    let gap_seconds = (request_ms? - last_response_ms?) / 1000;
    if gap_seconds > 0 {
        Some(gap_seconds as u64)
    } else {
        None
    }
}

fn push_request(result: &mut ParsedTextLogs, record: &LineRecord<'_>, body: String) {
    let (Some(method), Some(raw_endpoint)) = (record.method(), record.raw_endpoint()) else {
        debug!("Request line too short, skipped");
        return;
    };
    result.requests.push(LogRequest::Command(ParsedRequest {
        method: method.to_string(),
        endpoint: strip_session_prefix(raw_endpoint),
        data: parse_request_data(&body),
        command_name: resolve_command_name(method, raw_endpoint).to_string(),
    }));
}

fn push_response(result: &mut ParsedTextLogs, record: &LineRecord<'_>) {
    let value = match serde_json::from_str::<Value>(&record.payload_from(3)) {
        Ok(json) => json.get("value").cloned().unwrap_or(Value::Null),
        Err(_) => Value::String(String::new()),
    };
    result.responses.push(value);
}

/// Tokenize an Automate text log. Line 0 carries the capabilities payload;
/// lines 1-3 are fixed header lines. Lines with an unrecognized type tag
/// are ignored silently.
pub fn parse_automate_text_logs<S: AsRef<str>>(lines: &[S]) -> ParsedTextLogs {
    let mut result = ParsedTextLogs::default();
    let mut last_response_ms: Option<i64> = None;

    for (i, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if (1..=3).contains(&i) {
            continue;
        }
        if i == 0 {
            match extract_capabilities(line, false) {
                Some(caps) => result.capabilities.push(caps),
                None => debug!("No capabilities payload on first line"),
            }
            continue;
        }

        let record = LineRecord::new(line);
        match record.tag() {
            Some("REQUEST") => {
                if let Some(seconds) = sleep_gap(last_response_ms, record.timestamp_ms()) {
                    result.requests.push(LogRequest::Sleep(seconds));
                }
                let body = record.payload_from(7);
                push_request(&mut result, &record, body);
            }
            Some("RESPONSE") => {
                push_response(&mut result, &record);
                last_response_ms = record.timestamp_ms();
            }
            _ => {}
        }
    }

    result
}

/// Tokenize an App-Automate text log. `REQUEST` lines before
/// `START_SESSION` carry capabilities rather than commands, and request
/// bodies may contain embedded-JSON strings needing repair first.
pub fn parse_app_automate_text_logs<S: AsRef<str>>(lines: &[S]) -> ParsedTextLogs {
    let mut result = ParsedTextLogs::default();
    let mut last_response_ms: Option<i64> = None;
    let mut session_started = false;

    for line in lines {
        let line = line.as_ref();
        let record = LineRecord::new(line);
        match record.tag() {
            Some("SESSION_SETUP_TIME") | Some("DEBUG") | Some("STOP_SESSION") => {}
            Some("START_SESSION") => session_started = true,
            Some("REQUEST") => {
                if let Some(seconds) = sleep_gap(last_response_ms, record.timestamp_ms()) {
                    result.requests.push(LogRequest::Sleep(seconds));
                }
                if !session_started {
                    match extract_capabilities(line, true) {
                        Some(caps) => result.capabilities.push(caps),
                        None => debug!("No capabilities payload on pre-session request line"),
                    }
                    continue;
                }
                let body = fix_embedded_json(&record.payload_from(7));
                push_request(&mut result, &record, body);
            }
            Some("RESPONSE") => {
                push_response(&mut result, &record);
                last_response_ms = record.timestamp_ms();
            }
            _ => {}
        }
    }

    result
}

// A quoted value containing literal `{...}` blocks, i.e. device payloads
// logged without escaping.
static EMBEDDED_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)":"([^"]*\{[^"]*\}[^"]*)""#).unwrap());
static BRACE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^{}]*\}").unwrap());

/// Re-stringify literal `{...}` blocks embedded inside quoted string
/// values so the surrounding JSON parses. Heuristic: if any block inside a
/// matched value is not itself valid JSON, that value is left unchanged.
pub fn fix_embedded_json(input: &str) -> String {
    EMBEDDED_VALUE_RE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let full = &caps[0];
            let blocks: Vec<&str> = BRACE_BLOCK_RE
                .find_iter(full)
                .map(|m| m.as_str())
                .collect();
            if blocks
                .iter()
                .any(|block| serde_json::from_str::<Value>(block).is_err())
            {
                return full.to_string();
            }
            BRACE_BLOCK_RE
                .replace_all(full, |block: &regex::Captures<'_>| {
                    match serde_json::from_str::<Value>(&block[0]) {
                        Ok(parsed) => {
                            serde_json::to_string(&parsed).unwrap_or_else(|_| block[0].to_string())
                        }
                        Err(_) => block[0].to_string(),
                    }
                })
                .into_owned()
        })
        .into_owned()
}
