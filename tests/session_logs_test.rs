use sessionscope::parsers::session_logs::{parse_automate_session_logs, RequestStatus};

const LOG: &str = "\
2024-05-14 12:00:00:000 REQUEST [queue] DEBUG POST /session {\"desiredCapabilities\":{\"browserName\":\"chrome\"}}
2024-05-14 12:00:00:500 DEBUG https://hub.test/wd/hub/session queued
2024-05-14 12:00:06:000 START_SESSION {\"hashed_id\":\"a1b2c3\"}
2024-05-14 12:00:07:000 REQUEST [worker] DEBUG POST url {\"url\":\"https://shop.test\"}
2024-05-14 12:00:09:500 RESPONSE {\"status\":0,\"value\":null}
2024-05-14 12:00:10:000 REQUEST [worker] DEBUG POST element {\"using\":\"css selector\",\"value\":\"#cart\"}
2024-05-14 12:00:10:800 RESPONSE {\"status\":0,\"value\":{\"ELEMENT\":\"0.1\"}}
2024-05-14 12:00:11:000 REQUEST [worker] DEBUG GET title
2024-05-14 12:00:12:000 RESPONSE {\"value\":{\"error\":\"no such window\"}}
2024-05-14 12:00:13:000 STOP_SESSION {}
";

#[test]
fn test_exchange_structure() {
    let result = parse_automate_session_logs(LOG);
    assert_eq!(result.exchanges.len(), 5);
    assert_eq!(result.summary.total_requests, 5);

    // ids are 1-based and strictly increasing
    let ids: Vec<u64> = result.exchanges.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    // the DEBUG line attaches to the first exchange
    let first = &result.exchanges[0];
    assert_eq!(first.request.action, "/session");
    assert_eq!(
        first.debug.as_ref().unwrap().url,
        "https://hub.test/wd/hub/session"
    );
}

#[test]
fn test_status_counts() {
    let result = parse_automate_session_logs(LOG);
    assert_eq!(result.summary.passed_requests, 2);
    assert_eq!(result.summary.failed_requests, 1);
    // START_SESSION + STOP_SESSION
    assert_eq!(result.summary.unknown_requests, 2);

    assert_eq!(result.exchanges[3].response.status, RequestStatus::Failed);
}

#[test]
fn test_timing_breakdown() {
    let result = parse_automate_session_logs(LOG);
    let s = &result.summary;

    assert_eq!(s.session_duration, 13_000);
    assert_eq!(s.execution_time, s.in_time + s.out_time);
    assert_eq!(s.setup_time, s.session_duration - s.execution_time);

    // first response (START_SESSION close) is setup, not serve time
    // in: (12:00:10.8 - 12:00:10) + (12:00:12 - 12:00:11) = 1800
    assert_eq!(s.in_time, 2_500 + 800 + 1_000 - 2_500);
}

#[test]
fn test_percentages_are_bounded_or_sentinel() {
    let result = parse_automate_session_logs(LOG);
    let s = &result.summary;
    for perc in [
        s.setup_time_perc,
        s.in_time_perc,
        s.out_time_perc,
        s.passed_perc,
        s.failed_perc,
        s.unknown_perc,
    ] {
        assert!(perc.is_finite());
        assert!(perc == -1.0 || (0.0..=100.0).contains(&perc), "perc {perc}");
    }
    assert!((s.passed_perc - 40.0).abs() < 1e-9);
}

#[test]
fn test_degenerate_inputs() {
    for log in ["", "\n\n", "no timestamps here at all"] {
        let result = parse_automate_session_logs(log);
        assert!(result.exchanges.is_empty());
        assert_eq!(result.summary.average_cycle_time, -1.0);
        assert_eq!(result.summary.passed_perc, -1.0);
    }
}
