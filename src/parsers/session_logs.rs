//! Phase parser for session logs (`REQUEST` / `START_SESSION` / `DEBUG` /
//! `RESPONSE` / `STOP_SESSION` tagged lines) producing request/response
//! exchanges with latency statistics.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::parsers::{average, parse_timestamp_ms, percentage, Summary, SENTINEL};

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub summary: Summary,
    pub exchanges: Vec<Exchange>,
}

/// One request/response pairing extracted from the log. `id` values
/// strictly increase in emission order, starting at 1.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub id: u64,
    pub request: ExchangeRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<ExchangeDebug>,
    pub response: ExchangeResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRequest {
    pub created_at: i64,
    pub line_number: usize,
    /// Gap since the previous response close: time spent outside the
    /// service (client think time).
    pub out_time: i64,
    pub http_type: String,
    pub action: String,
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeResponse {
    pub created_at: i64,
    pub line_number: usize,
    /// Gap since the paired request open: service-side processing time.
    pub in_time: i64,
    pub params: Value,
    pub status: RequestStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeDebug {
    pub created_at: i64,
    pub line_number: usize,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestStatus {
    Passed,
    Failed,
    Unknown,
}

/// Classify a response payload: an `value.error` field fails the exchange,
/// JSONWire `status: 0` passes it, anything else is unknown.
fn classify_response(params: &Value) -> RequestStatus {
    if params
        .get("value")
        .and_then(|v| v.get("error"))
        .is_some()
    {
        return RequestStatus::Failed;
    }
    match params.get("status").and_then(Value::as_i64) {
        Some(0) => RequestStatus::Passed,
        _ => RequestStatus::Unknown,
    }
}

/// Best-effort payload parse from the first `{` on the line. The preceding
/// character is checked against `[` to avoid treating an array literal's
/// first member as the payload.
fn extract_params(line: &str) -> Value {
    let Some(index) = line.find('{') else {
        return Value::Object(serde_json::Map::new());
    };
    if index > 0 && line.as_bytes()[index - 1] == b'[' {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(&line[index..]).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

#[derive(Default)]
struct PendingExchange {
    request: Option<ExchangeRequest>,
    debug: Option<ExchangeDebug>,
}

struct Tally {
    in_time: i64,
    out_time: i64,
    passed: usize,
    failed: usize,
    unknown: usize,
    first_response_seen: bool,
}

/// Parse a session log into exchanges plus a timing summary.
///
/// Tolerance contract: unrecognized tags, unparsable timestamps, and
/// responses with no pending request are logged and skipped; the parse
/// always completes.
pub fn parse_automate_session_logs(log_text: &str) -> ScanResult {
    let lines: Vec<&str> = log_text.lines().collect();

    let mut session_started_at: Option<i64> = None;
    let mut session_completed_at: Option<i64> = None;

    let mut exchanges: Vec<Exchange> = Vec::new();
    let mut pending = PendingExchange::default();
    let mut exchange_id: u64 = 0;
    let mut previous_response_at: Option<i64> = None;

    let mut tally = Tally {
        in_time: 0,
        out_time: 0,
        passed: 0,
        failed: 0,
        unknown: 0,
        first_response_seen: false,
    };

    for (index, raw_line) in lines.iter().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let line_number = index + 1;

        let Some(created_at) = tokens
            .first()
            .zip(tokens.get(1))
            .and_then(|(date, time)| parse_timestamp_ms(date, time))
        else {
            debug!("Line {line_number} has no parsable timestamp, skipped");
            continue;
        };

        session_started_at.get_or_insert(created_at);
        session_completed_at = Some(created_at);

        let params = extract_params(line);

        match tokens.get(2).copied() {
            Some("REQUEST") => {
                let out_time = created_at - previous_response_at.unwrap_or(created_at);
                tally.out_time += out_time;
                pending.request = Some(ExchangeRequest {
                    created_at,
                    line_number,
                    out_time,
                    http_type: tokens.get(5).unwrap_or(&"").to_string(),
                    action: tokens.get(6).unwrap_or(&"").to_string(),
                    params,
                });
            }
            Some("DEBUG") => {
                pending.debug = Some(ExchangeDebug {
                    created_at,
                    line_number,
                    url: tokens.get(3).unwrap_or(&"").to_string(),
                });
            }
            Some("START_SESSION") => {
                let Some(request) = pending.request.take() else {
                    debug!("START_SESSION with no pending request, skipped");
                    continue;
                };
                let response = ExchangeResponse {
                    created_at,
                    line_number,
                    in_time: created_at - request.created_at,
                    params,
                    status: RequestStatus::Unknown,
                };
                tally.unknown += 1;
                exchange_id += 1;
                exchanges.push(Exchange {
                    id: exchange_id,
                    request,
                    debug: pending.debug.take(),
                    response,
                });
            }
            Some("RESPONSE") => {
                previous_response_at = Some(created_at);
                let Some(request) = pending.request.take() else {
                    debug!("RESPONSE with no pending request, skipped");
                    continue;
                };
                let in_time = created_at - request.created_at;

                // The very first response closes session setup; its serve
                // time is not execution time.
                if tally.first_response_seen {
                    tally.in_time += in_time;
                } else {
                    tally.first_response_seen = true;
                }

                let status = classify_response(&params);
                match status {
                    RequestStatus::Passed => tally.passed += 1,
                    RequestStatus::Failed => tally.failed += 1,
                    RequestStatus::Unknown => tally.unknown += 1,
                }

                exchange_id += 1;
                exchanges.push(Exchange {
                    id: exchange_id,
                    request,
                    debug: pending.debug.take(),
                    response: ExchangeResponse {
                        created_at,
                        line_number,
                        in_time,
                        params,
                        status,
                    },
                });
            }
            Some("STOP_SESSION") => {
                // Synthesize a closed exchange for the stop marker itself.
                let out_time = created_at - previous_response_at.unwrap_or(created_at);
                tally.out_time += out_time;
                tally.unknown += 1;
                exchange_id += 1;
                exchanges.push(Exchange {
                    id: exchange_id,
                    request: ExchangeRequest {
                        created_at,
                        line_number,
                        out_time,
                        http_type: String::new(),
                        action: "bs_stop".to_string(),
                        params: Value::Object(serde_json::Map::new()),
                    },
                    debug: None,
                    response: ExchangeResponse {
                        created_at,
                        line_number,
                        in_time: 0,
                        params,
                        status: RequestStatus::Unknown,
                    },
                });
                pending = PendingExchange::default();
            }
            other => {
                debug!("Line {line_number} with tag {other:?} skipped");
            }
        }
    }

    let session_duration = match (session_started_at, session_completed_at) {
        (Some(start), Some(end)) => end - start,
        _ => SENTINEL,
    };
    let execution_time = tally.in_time + tally.out_time;
    let setup_time = if session_duration >= 0 {
        session_duration - execution_time
    } else {
        SENTINEL
    };
    let total = exchanges.len();

    let summary = Summary {
        total_requests: total,
        session_started_at: session_started_at.unwrap_or(SENTINEL),
        session_completed_at: session_completed_at.unwrap_or(SENTINEL),
        session_duration,
        setup_time,
        execution_time,
        in_time: tally.in_time,
        out_time: tally.out_time,
        passed_requests: tally.passed,
        failed_requests: tally.failed,
        unknown_requests: tally.unknown,
        log_length: lines.len(),
        setup_time_perc: percentage(setup_time, session_duration),
        in_time_perc: percentage(tally.in_time, session_duration),
        out_time_perc: percentage(tally.out_time, session_duration),
        average_cycle_time: average(execution_time, total),
        average_serve_time: average(tally.in_time, total),
        average_wait_time: average(tally.out_time, total),
        passed_perc: percentage(tally.passed as i64, total as i64),
        failed_perc: percentage(tally.failed as i64, total as i64),
        unknown_perc: percentage(tally.unknown as i64, total as i64),
    };

    ScanResult { summary, exchanges }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
2024-05-14 10:00:00:000 REQUEST [x] DEBUG POST /session {\"desiredCapabilities\":{}}
2024-05-14 10:00:04:000 START_SESSION {\"hashed_id\":\"abc\"}
2024-05-14 10:00:05:000 REQUEST [x] DEBUG POST url {\"url\":\"https://x.test\"}
2024-05-14 10:00:06:000 RESPONSE {\"status\":0,\"value\":null}
2024-05-14 10:00:08:000 REQUEST [x] DEBUG GET title
2024-05-14 10:00:09:000 RESPONSE {\"status\":13,\"value\":{\"error\":\"boom\"}}
2024-05-14 10:00:10:000 STOP_SESSION {}
";

    #[test]
    fn test_exchange_ids_are_monotonic() {
        let result = parse_automate_session_logs(LOG);
        let ids: Vec<u64> = result.exchanges.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_timing_invariants() {
        let result = parse_automate_session_logs(LOG);
        let s = &result.summary;
        assert_eq!(s.execution_time, s.in_time + s.out_time);
        assert_eq!(s.setup_time, s.session_duration - s.execution_time);
        assert_eq!(s.session_duration, 10_000);
    }

    #[test]
    fn test_first_response_in_time_excluded() {
        let result = parse_automate_session_logs(LOG);
        // first RESPONSE (1000ms) excluded; second RESPONSE contributes 1000ms
        assert_eq!(result.summary.in_time, 1_000);
    }

    #[test]
    fn test_out_time_is_gap_since_previous_response() {
        let result = parse_automate_session_logs(LOG);
        // third REQUEST at 10:00:08 follows the response at 10:00:06
        assert_eq!(result.exchanges[2].request.out_time, 2_000);
    }

    #[test]
    fn test_status_classification() {
        let result = parse_automate_session_logs(LOG);
        assert_eq!(result.exchanges[1].response.status, RequestStatus::Passed);
        assert_eq!(result.exchanges[2].response.status, RequestStatus::Failed);
        assert_eq!(result.summary.passed_requests, 1);
        assert_eq!(result.summary.failed_requests, 1);
        // START_SESSION + STOP_SESSION both count as unknown
        assert_eq!(result.summary.unknown_requests, 2);
    }

    #[test]
    fn test_stop_session_synthesizes_exchange() {
        let result = parse_automate_session_logs(LOG);
        let last = result.exchanges.last().unwrap();
        assert_eq!(last.request.action, "bs_stop");
        assert_eq!(last.response.in_time, 0);
    }

    #[test]
    fn test_empty_log_yields_sentinels_not_nan() {
        let result = parse_automate_session_logs("");
        let s = &result.summary;
        assert_eq!(s.total_requests, 0);
        assert_eq!(s.passed_perc, -1.0);
        assert_eq!(s.average_cycle_time, -1.0);
        assert_eq!(s.setup_time_perc, -1.0);
        assert!(s.passed_perc.is_finite());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let log = "garbage line without timestamp\n2024-05-14 10:00:00:000 NOISE tag\n";
        let result = parse_automate_session_logs(log);
        assert!(result.exchanges.is_empty());
        assert_eq!(result.summary.log_length, 2);
    }

    #[test]
    fn test_array_literal_not_mistaken_for_params() {
        let log = "2024-05-14 10:00:00:000 REQUEST [x] DEBUG POST actions [{\"type\":\"pointer\"}]\n";
        let result = parse_automate_session_logs(log);
        // no exchange closes, but the pending request must carry empty params
        assert!(result.exchanges.is_empty());
    }
}
