//! Integration tests for the global logging setup

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CapturingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CapturingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

// The global subscriber can only be installed once per process, so every
// assertion that depends on it lives in this test.
#[test]
fn test_init_logging_forwards_workspace_events_to_sink() {
    let sink = Arc::new(CapturingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());

    init_logging(config.clone()).expect("first initialization succeeds");

    tracing::warn!(
        target: "core_auth::client",
        endpoint = "/me",
        refresh_token = "AQB-secret",
        "Session invalidated"
    );
    tracing::debug!(target: "some_dependency", "filtered out by the default filter");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Session invalidated");
        assert_eq!(entries[0].fields.get("endpoint"), Some(&"/me".to_string()));
        assert_eq!(
            entries[0].fields.get("refresh_token"),
            Some(&"[REDACTED]".to_string())
        );
    }

    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}

#[test]
fn test_redaction_of_credential_fields() {
    assert_eq!(redact_if_sensitive("access_token", "BQD..."), "[REDACTED]");
    assert_eq!(redact_if_sensitive("refresh_token", "AQB..."), "[REDACTED]");
    assert_eq!(redact_if_sensitive("client_secret", "s3cr3t"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("time_range", "short_term"), "short_term");
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_redaction(false)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_sensitive);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
