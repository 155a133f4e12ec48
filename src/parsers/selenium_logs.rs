//! Phase parser for Selenium hub logs.
//!
//! Hub lines carry a bare time-of-day and no date or zone, so the parser
//! first infers the hub's UTC offset from a known session creation instant,
//! then walks the lines with a two-level state machine: a `Phase` set by
//! marker lines and a `row` cursor tracking position inside one
//! request/response cycle.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::parsers::session_logs::RequestStatus;
use crate::parsers::{
    average, epoch_ms_with_offset, or_sentinel, parse_time_of_day, percentage, Summary, SENTINEL,
};
use chrono::{FixedOffset, NaiveDate};

#[derive(Debug, Clone, Serialize)]
pub struct SeleniumScanResult {
    pub summary: SeleniumSummary,
    pub exchanges: Vec<SeleniumExchange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeleniumSummary {
    #[serde(flatten)]
    pub base: Summary,
    pub dialect: String,
    pub setup_polls: usize,
    pub tear_down_polls: usize,
    pub driver_started_at: i64,
    pub driver_init_time: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeleniumExchange {
    pub id: u64,
    pub request: HubRequest,
    pub response: HubResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct HubRequest {
    pub created_at: i64,
    pub line_number: usize,
    pub out_time: i64,
    pub params: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HubResponse {
    pub created_at: i64,
    pub line_number: usize,
    pub in_time: i64,
    pub params: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
    pub status: RequestStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    None,
    Setup,
    Session,
    TearDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    StartSession,
    Polling,
    Dialect,
    StartDriver,
    Request,
    RequestHandler,
    Upstream,
    HttpRequest,
    HttpResponse,
    Downstream,
    StopSession,
}

/// Marker substrings in table order. A matching marker classifies the
/// line; markers carrying a phase also switch the machine's phase. When
/// several markers occur on one line, the last table entry wins.
const MARKERS: &[(&str, Event, Option<Phase>)] = &[
    ("/session: Executing POST on /session ", Event::StartSession, Some(Phase::Setup)),
    ("Polling http://localhost", Event::Polling, None),
    ("Detected dialect", Event::Dialect, None),
    ("Started new session", Event::StartDriver, Some(Phase::Session)),
    ("Found handler", Event::Request, None),
    ("Handler thread for session", Event::RequestHandler, None),
    ("To upstream", Event::Upstream, None),
    ("writeRequests", Event::HttpRequest, None),
    ("getInputStream0", Event::HttpResponse, None),
    ("To downstream", Event::Downstream, None),
    ("Removing session", Event::StopSession, Some(Phase::TearDown)),
];

/// Candidate hub UTC offsets, in seconds east of UTC. Covers the data
/// centers sessions are scheduled into.
const OFFSET_TABLE: &[i32] = &[
    -8 * 3600,
    -7 * 3600,
    -5 * 3600,
    -4 * 3600,
    3600,
    2 * 3600,
    5 * 3600 + 1800,
    10 * 3600,
];

/// Pick the offset whose interpretation of the first log line lands closest
/// to the session's known creation instant. Ties keep the earlier table
/// entry; an empty log falls back to UTC.
fn infer_offset(lines: &[&str], date: NaiveDate, session_created_at: i64) -> FixedOffset {
    let utc = FixedOffset::east_opt(0).unwrap();

    let Some(first_line) = lines.iter().map(|l| l.trim()).find(|l| !l.is_empty()) else {
        return utc;
    };
    let Some(time) = first_line
        .split_whitespace()
        .next()
        .and_then(parse_time_of_day)
    else {
        return utc;
    };

    let mut best = utc;
    let mut min_diff = i64::MAX;
    for &seconds in OFFSET_TABLE {
        let Some(offset) = FixedOffset::east_opt(seconds) else {
            continue;
        };
        let candidate = epoch_ms_with_offset(date, time, offset);
        let diff = (session_created_at - candidate).abs();
        if diff < min_diff {
            min_diff = diff;
            best = offset;
        }
    }
    best
}

/// Hub header dumps look like `{Key: value}{Key: value}`. Four textual
/// repairs turn that into a JSON object. A dump the repair cannot fix is
/// dropped rather than failing the parse.
fn parse_header_pairs(pairs: &str) -> Option<Value> {
    let repaired = pairs
        .replace("}{", "\",\"")
        .replace(": ", "\": \"")
        .replace('{', "{\"")
        .replace('}', "\"}");
    match serde_json::from_str(&repaired) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!("Unrepairable header dump ({err}): {pairs}");
            None
        }
    }
}

/// Body after a marker, parsed as JSON when possible. Unparsable payloads
/// are kept verbatim under a `message` key.
fn parse_tail_json(line: &str, marker: &str) -> Value {
    let Some((_, tail)) = line.split_once(marker) else {
        return Value::Object(serde_json::Map::new());
    };
    serde_json::from_str(tail).unwrap_or_else(|_| serde_json::json!({ "message": tail }))
}

/// The hub proxies the driver's raw HTTP status line under a null header
/// key; that is the only status signal the log carries.
fn classify_headers(headers: Option<&Value>) -> RequestStatus {
    match headers.and_then(|h| h.get("null")).and_then(Value::as_str) {
        None => RequestStatus::Unknown,
        Some(status_line) if status_line.contains("200 OK") => RequestStatus::Passed,
        Some(_) => RequestStatus::Failed,
    }
}

#[derive(Default)]
struct ExchangeBuilder {
    id: u64,
    request: Option<HubRequest>,
    response_headers: Option<Value>,
}

/// Parse a Selenium hub log.
///
/// `date` is the session's calendar date (hub lines only carry times);
/// `session_created_at` is the known creation instant in epoch ms, used to
/// infer the hub's UTC offset.
pub fn parse_automate_selenium_logs(
    log_text: &str,
    date: NaiveDate,
    session_created_at: i64,
) -> SeleniumScanResult {
    let lines: Vec<&str> = log_text.lines().collect();
    let offset = infer_offset(&lines, date, session_created_at);

    let mut phase = Phase::None;
    let mut row: u8 = 1;

    let mut session_started_at: Option<i64> = None;
    let mut session_completed_at: Option<i64> = None;
    let mut driver_started_at: Option<i64> = None;
    let mut dialect = "Unknown".to_string();
    let mut setup_polls = 0usize;
    let mut tear_down_polls = 0usize;

    let mut exchanges: Vec<SeleniumExchange> = Vec::new();
    let mut current = ExchangeBuilder::default();
    let mut exchange_id: u64 = 0;
    let mut previous_closed_at: Option<i64> = None;

    let mut total_in_time: i64 = 0;
    let mut total_out_time: i64 = 0;
    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut unknown = 0usize;

    for (index, raw_line) in lines.iter().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let line_number = index + 1;

        let Some(time) = line.split_whitespace().next().and_then(parse_time_of_day) else {
            debug!("Line {line_number} has no parsable time, skipped");
            continue;
        };
        let created_at = epoch_ms_with_offset(date, time, offset);

        let mut event: Option<Event> = None;
        for (marker, marker_event, marker_phase) in MARKERS {
            if line.contains(marker) {
                event = Some(*marker_event);
                if let Some(p) = marker_phase {
                    phase = *p;
                }
            }
        }

        session_completed_at = Some(created_at);

        let Some(event) = event else {
            debug!("Line {line_number} matched no marker, skipped");
            continue;
        };

        match (phase, event, row) {
            (Phase::Setup, Event::StartSession, 1) => {
                session_started_at = Some(created_at);
            }
            (Phase::Setup, Event::Polling, 1) => {
                setup_polls += 1;
            }
            (Phase::Setup, Event::Dialect, 1) => {
                if let Some((_, tail)) = line.split_once("Detected dialect:") {
                    let tail = tail.trim();
                    if !tail.is_empty() {
                        dialect = tail.to_string();
                    }
                }
            }

            (Phase::Session, Event::StartDriver, 1) => {
                driver_started_at = Some(created_at);
            }
            // One full Session cycle: request open, upstream body, request
            // headers, response headers, downstream body (close).
            (Phase::Session, Event::Request, 1) => {
                let out_time = created_at - previous_closed_at.unwrap_or(created_at);
                total_out_time += out_time;
                exchange_id += 1;
                current = ExchangeBuilder {
                    id: exchange_id,
                    request: Some(HubRequest {
                        created_at,
                        line_number,
                        out_time,
                        params: Value::Object(serde_json::Map::new()),
                        headers: None,
                    }),
                    response_headers: None,
                };
                row = 2;
            }
            (Phase::Session, Event::Upstream, 2) => {
                if let Some(request) = current.request.as_mut() {
                    request.params = parse_tail_json(line, "To upstream:");
                }
                row = 3;
            }
            (Phase::Session, Event::HttpRequest, 3) => {
                if let Some((_, pairs)) = line.split_once("pairs:") {
                    if let Some(request) = current.request.as_mut() {
                        request.headers = parse_header_pairs(pairs);
                    }
                }
                row = 4;
            }
            (Phase::Session, Event::HttpResponse, 4) => {
                if let Some((_, pairs)) = line.split_once("pairs:") {
                    current.response_headers = parse_header_pairs(pairs);
                }
                row = 5;
            }
            (Phase::Session, Event::Downstream, 5) => {
                previous_closed_at = Some(created_at);
                let Some(request) = current.request.take() else {
                    debug!("Downstream body with no open request, skipped");
                    row = 1;
                    continue;
                };
                let headers = current.response_headers.take();
                let status = classify_headers(headers.as_ref());
                match status {
                    RequestStatus::Passed => passed += 1,
                    RequestStatus::Failed => failed += 1,
                    RequestStatus::Unknown => unknown += 1,
                }
                let in_time = created_at - request.created_at;
                total_in_time += in_time;
                exchanges.push(SeleniumExchange {
                    id: current.id,
                    request,
                    response: HubResponse {
                        created_at,
                        line_number,
                        in_time,
                        params: parse_tail_json(line, "To downstream:"),
                        headers,
                        status,
                    },
                });
                current = ExchangeBuilder::default();
                row = 1;
            }

            // Tear-down cycle: no upstream body, and the row cursor parks
            // on 5 after closing, where a poll line resets it to 1.
            (Phase::TearDown, Event::StopSession, 1) => {
                let out_time = created_at - previous_closed_at.unwrap_or(created_at);
                total_out_time += out_time;
                exchange_id += 1;
                current = ExchangeBuilder {
                    id: exchange_id,
                    request: Some(HubRequest {
                        created_at,
                        line_number,
                        out_time,
                        params: Value::Object(serde_json::Map::new()),
                        headers: None,
                    }),
                    response_headers: None,
                };
                row = 2;
            }
            (Phase::TearDown, Event::HttpRequest, 2) => {
                if let Some((_, pairs)) = line.split_once("pairs:") {
                    if let Some(request) = current.request.as_mut() {
                        request.headers = parse_header_pairs(pairs);
                    }
                }
                row = 3;
            }
            (Phase::TearDown, Event::HttpResponse, 3) => {
                if let Some((_, pairs)) = line.split_once("pairs:") {
                    current.response_headers = parse_header_pairs(pairs);
                }
                row = 4;
            }
            (Phase::TearDown, Event::Downstream, 4) => {
                previous_closed_at = Some(created_at);
                let Some(request) = current.request.take() else {
                    debug!("Downstream body with no open request, skipped");
                    row = 5;
                    continue;
                };
                let headers = current.response_headers.take();
                let status = classify_headers(headers.as_ref());
                match status {
                    RequestStatus::Passed => passed += 1,
                    RequestStatus::Failed => failed += 1,
                    RequestStatus::Unknown => unknown += 1,
                }
                let in_time = created_at - request.created_at;
                total_in_time += in_time;
                exchanges.push(SeleniumExchange {
                    id: current.id,
                    request,
                    response: HubResponse {
                        created_at,
                        line_number,
                        in_time,
                        params: parse_tail_json(line, "To downstream:"),
                        headers,
                        status,
                    },
                });
                current = ExchangeBuilder::default();
                row = 5;
            }
            (Phase::TearDown, Event::Polling, 5) => {
                tear_down_polls += 1;
                row = 1;
            }

            (phase, event, row) => {
                debug!("Line {line_number} out of cycle ({phase:?}, {event:?}, row {row}), skipped");
            }
        }
    }

    let session_duration = match (session_started_at, session_completed_at) {
        (Some(start), Some(end)) => Some(end - start),
        _ => None,
    };
    let driver_init_time = match (driver_started_at, session_started_at) {
        (Some(driver), Some(start)) => Some(driver - start),
        _ => None,
    };
    let execution_time = total_in_time + total_out_time;
    let setup_time = session_duration.map(|d| d - execution_time);
    let total = exchanges.len();
    let duration = or_sentinel(session_duration);

    let base = Summary {
        total_requests: total,
        session_started_at: or_sentinel(session_started_at),
        session_completed_at: or_sentinel(session_completed_at),
        session_duration: duration,
        setup_time: or_sentinel(setup_time),
        execution_time,
        // zero totals are indistinguishable from "nothing measured"
        in_time: if total_in_time == 0 { SENTINEL } else { total_in_time },
        out_time: if total_out_time == 0 { SENTINEL } else { total_out_time },
        passed_requests: passed,
        failed_requests: failed,
        unknown_requests: unknown,
        log_length: lines.len(),
        setup_time_perc: percentage(or_sentinel(setup_time), duration),
        in_time_perc: percentage(total_in_time, duration),
        out_time_perc: percentage(total_out_time, duration),
        average_cycle_time: average(execution_time, total),
        average_serve_time: average(total_in_time, total),
        average_wait_time: average(total_out_time, total),
        passed_perc: percentage(passed as i64, total as i64),
        failed_perc: percentage(failed as i64, total as i64),
        unknown_perc: percentage(unknown as i64, total as i64),
    };

    SeleniumScanResult {
        summary: SeleniumSummary {
            base,
            dialect,
            setup_polls,
            tear_down_polls,
            driver_started_at: or_sentinel(driver_started_at),
            driver_init_time: or_sentinel(driver_init_time),
        },
        exchanges,
    }
}
