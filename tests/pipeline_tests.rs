//! End-to-end pipeline tests against the scripted session factory.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use report2pdf_api::prelude::*;
use report2pdf_api::service::TIMEOUT_GRACE;
use report2pdf_api::session::mock::{MOCK_PDF, MockSessionFactory};

fn test_config() -> ExportConfig {
    ExportConfigBuilder::new()
        .frontend_url("http://localhost:3000")
        .settle_delay(Duration::from_millis(1))
        .build()
        .unwrap()
}

fn exporter_with(factory: MockSessionFactory) -> Arc<ReportExporter> {
    Arc::new(ReportExporter::new(test_config(), Arc::new(factory)))
}

/// Every exit path releases exactly the sessions it acquired.
#[tokio::test]
async fn test_no_session_leak_on_any_exit_path() {
    let cases: Vec<(&str, MockSessionFactory, Option<&str>)> = vec![
        ("success", MockSessionFactory::new(), None),
        (
            "navigation",
            MockSessionFactory::failing_navigation("net::ERR_NAME_NOT_RESOLVED"),
            Some("NavigationError"),
        ),
        (
            "readiness",
            MockSessionFactory::never_ready(),
            Some("ReadinessTimeoutError"),
        ),
        (
            "capture",
            MockSessionFactory::failing_capture("Printing failed"),
            Some("CaptureError"),
        ),
        (
            "invalid output",
            MockSessionFactory::returning_bytes(b"<html>error</html>".to_vec()),
            Some("InvalidOutputError"),
        ),
        (
            "release",
            MockSessionFactory::new().with_release_error("kill failed"),
            None,
        ),
        (
            "panic",
            MockSessionFactory::panicking_capture(),
            Some("InternalError"),
        ),
    ];

    for (name, factory, expected_kind) in cases {
        let launches = factory.launch_counter();
        let closes = factory.close_counter();
        let exporter = exporter_with(factory);

        let request = ExportRequest::new("abc123", None, false).unwrap();
        let result = Arc::clone(&exporter).export_async(request).await;

        match expected_kind {
            None => assert!(result.is_ok(), "{}: expected success, got {:?}", name, result),
            Some(kind) => assert_eq!(
                result.as_ref().map_err(|e| e.kind()).err(),
                Some(kind),
                "{}: wrong error",
                name
            ),
        }

        assert_eq!(launches.load(Ordering::SeqCst), 1, "{}: launches", name);
        assert_eq!(closes.load(Ordering::SeqCst), 1, "{}: closes", name);

        let stats = exporter.session_stats();
        assert!(stats.is_balanced(), "{}: {}", name, stats);
        assert!(stats.is_idle(), "{}: {}", name, stats);
    }
}

/// A launch failure acquires nothing, so nothing is released.
#[tokio::test]
async fn test_launch_failure() {
    let factory = MockSessionFactory::failing_launch("chrome not found");
    let closes = factory.close_counter();
    let exporter = exporter_with(factory);

    let request = ExportRequest::new("abc123", None, false).unwrap();
    let result = Arc::clone(&exporter).export_async(request).await;

    assert_eq!(
        result.unwrap_err(),
        ExportError::Launch("chrome not found".to_string())
    );
    assert_eq!(closes.load(Ordering::SeqCst), 0);
    assert_eq!(exporter.session_stats().launch_failures, 1);
}

/// Stages run in order and the page is closed last.
#[tokio::test]
async fn test_stage_order() {
    let factory = MockSessionFactory::new();
    let log = factory.call_log();
    let exporter = exporter_with(factory);

    let request = ExportRequest::new("abc123", Some("ar"), false).unwrap();
    let response = Arc::clone(&exporter).export_async(request).await.unwrap();

    assert_eq!(response.data, MOCK_PDF);
    assert_eq!(response.filename, "report-abc123-ar.pdf");

    let calls = report2pdf_api::session::mock::snapshot(&log);
    let steps: Vec<&str> = calls
        .iter()
        .map(|c| c.split_whitespace().next().unwrap_or_default())
        .collect();
    assert_eq!(
        steps,
        vec!["launch", "navigate", "wait_ready", "fonts", "frame", "frame", "print", "close"]
    );
    assert_eq!(
        calls[1],
        "navigate http://localhost:3000/print-report?attemptId=abc123&lang=ar&puppeteer=1"
    );
}

/// Readiness failure never reaches capture.
#[tokio::test]
async fn test_readiness_timeout_skips_capture() {
    let factory = MockSessionFactory::never_ready();
    let log = factory.call_log();
    let exporter = exporter_with(factory);

    let request = ExportRequest::new("xyz", Some("ar"), false).unwrap();
    let result = Arc::clone(&exporter).export_async(request).await;

    assert!(matches!(result, Err(ExportError::ReadinessTimeout(_))));
    let calls = report2pdf_api::session::mock::snapshot(&log);
    assert!(!calls.iter().any(|c| c == "print"));
    assert_eq!(calls.last().map(String::as_str), Some("close"));
}

/// Font signal failure is tolerated and still yields a PDF.
#[tokio::test]
async fn test_unsupported_font_signal_still_exports() {
    let exporter = exporter_with(MockSessionFactory::new().with_fonts_error("document.fonts undefined"));

    let request = ExportRequest::new("abc123", None, false).unwrap();
    let response = Arc::clone(&exporter).export_async(request).await.unwrap();

    assert!(response.data.starts_with(b"%PDF-"));
}

/// The path route shape is honored when configured.
#[tokio::test]
async fn test_path_route() {
    let factory = MockSessionFactory::new();
    let log = factory.call_log();
    let config = ExportConfigBuilder::new()
        .frontend_url("https://reports.example.com/")
        .report_route(ReportRoute::Path)
        .settle_delay(Duration::from_millis(1))
        .build()
        .unwrap();
    let exporter = Arc::new(ReportExporter::new(config, Arc::new(factory)));

    let request = ExportRequest::new("a b", None, false).unwrap();
    Arc::clone(&exporter).export_async(request).await.unwrap();

    let calls = report2pdf_api::session::mock::snapshot(&log);
    assert_eq!(
        calls[1],
        "navigate https://reports.example.com/reports/pdf/a%20b?lang=en&puppeteer=1"
    );
}

fn one_second_config() -> ExportConfig {
    let second = Duration::from_secs(1);
    ExportConfigBuilder::new()
        .frontend_url("http://localhost:3000")
        .launch_timeout(second)
        .navigation_timeout(second)
        .ready_timeout(second)
        .fonts_timeout(second)
        .settle_delay(Duration::from_millis(1))
        .request_timeout(second)
        .build()
        .unwrap()
}

/// A capture slower than the request deadline is cut off at the deadline,
/// and its session is already released when the error comes back.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_capture_times_out_at_deadline() {
    let factory = MockSessionFactory::new().with_capture_delay(Duration::from_secs(7));
    let closes = factory.close_counter();
    let exporter = Arc::new(ReportExporter::new(one_second_config(), Arc::new(factory)));

    let start = std::time::Instant::now();
    let request = ExportRequest::new("slow", None, true).unwrap();
    let err = Arc::clone(&exporter).export_async(request).await.unwrap_err();

    assert_eq!(err.kind(), "TimeoutError");
    assert!(start.elapsed() < Duration::from_secs(3), "took {:?}", start.elapsed());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    let stats = exporter.session_stats();
    assert!(stats.is_idle(), "{}", stats);
    assert!(stats.is_balanced());
}

/// When a stage overruns its budget, the overall timeout still waits for
/// teardown before it reports the failure.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overall_timeout_waits_for_teardown() {
    let factory = MockSessionFactory::new().with_capture_stall(Duration::from_millis(6500));
    let closes = factory.close_counter();
    let exporter = Arc::new(ReportExporter::new(one_second_config(), Arc::new(factory)));

    let request = ExportRequest::new("stalled", None, false).unwrap();
    let err = Arc::clone(&exporter).export_async(request).await.unwrap_err();

    assert_eq!(
        err,
        ExportError::Timeout(format!(
            "export did not finish within {:?}",
            Duration::from_secs(1) + TIMEOUT_GRACE
        ))
    );
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    let stats = exporter.session_stats();
    assert_eq!(stats.acquired, 1);
    assert_eq!(stats.released, 1);
    assert!(stats.is_idle());
}
