//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    init_logging, redact_headers, redact_if_sensitive, LogFormat, LoggingConfig,
};
use std::collections::HashMap;

#[test]
fn test_logging_initializes_once() {
    // Only one global subscriber per process; the second attempt must fail
    // instead of silently replacing the first.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn);

    init_logging(config.clone()).expect("first initialization succeeds");
    let second = init_logging(config);
    assert!(second.is_err());

    tracing::warn!(target: "core_request", "visible after init");
}

#[test]
fn test_invalid_filter_is_config_error() {
    let config = LoggingConfig::default().with_filter("core_request=notalevel");
    let err = init_logging(config).unwrap_err();
    assert!(err.to_string().contains("Invalid log filter"));
}

#[test]
fn test_credentials_are_redacted() {
    assert_eq!(
        redact_if_sensitive("authorization", "Bearer t0k3n"),
        "[REDACTED]"
    );
    assert_eq!(redact_if_sensitive("x-auth-token", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("Set-Cookie", "sid=1"), "[REDACTED]");
}

#[test]
fn test_cache_headers_pass_through() {
    let mut headers = HashMap::new();
    headers.insert("If-None-Match".to_string(), "\"abc\"".to_string());
    headers.insert(
        "If-Modified-Since".to_string(),
        "Wed, 21 Oct 2015 07:28:00 GMT".to_string(),
    );

    let rendered = redact_headers(&headers);
    assert!(rendered.contains("If-None-Match: \"abc\""));
    assert!(rendered.contains("If-Modified-Since: Wed, 21 Oct 2015 07:28:00 GMT"));
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Debug)
        .with_filter("core_request=trace")
        .with_spans(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Debug);
    assert_eq!(config.filter.as_deref(), Some("core_request=trace"));
    assert!(config.enable_spans);
    assert!(config.logger_sink.is_none());
}
